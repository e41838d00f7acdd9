use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const CONFIRMATION_TOKEN_LENGTH: usize = 48;

pub fn generate_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn generate_confirmation_token() -> String {
    generate_token(CONFIRMATION_TOKEN_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_distinct() {
        let a = generate_confirmation_token();
        let b = generate_confirmation_token();
        assert_eq!(a.len(), CONFIRMATION_TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
