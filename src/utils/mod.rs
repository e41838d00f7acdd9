pub mod slug;
pub mod time;
pub mod token;
