pub mod click_service;
pub mod dispatch;
pub mod email_client;
pub mod filter;
pub mod listing_service;
pub mod notification_service;
pub mod partner_service;
pub mod scheduler;
pub mod subscription_service;
pub mod user_service;
