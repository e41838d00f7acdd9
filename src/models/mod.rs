pub mod account;
pub mod choices;
pub mod click;
pub mod listing;
pub mod partner;
pub mod subscription;
