pub mod account_dto;
pub mod analytics_dto;
pub mod listing_dto;
pub mod partner_dto;
pub mod subscription_dto;
