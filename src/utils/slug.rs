/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed into one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("listing");
    }
    slug
}

/// Appends `-2`, `-3`, ... until `taken` reports the candidate free.
pub async fn unique_slug<F, Fut, E>(title: &str, mut taken: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<bool, E>>,
{
    let base = slugify(title);
    let mut candidate = base.clone();
    let mut n = 2;
    while taken(candidate.clone()).await? {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    Ok(candidate)
}
