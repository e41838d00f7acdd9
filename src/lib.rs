pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::repository::Repositories;
use crate::services::{
    click_service::ClickService,
    dispatch::{self, JobDispatcher},
    email_client::Mailer,
    listing_service::ListingService,
    notification_service::NotificationService,
    partner_service::PartnerService,
    subscription_service::SubscriptionService,
    user_service::AccountService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub listing_service: ListingService,
    pub click_service: ClickService,
    pub subscription_service: SubscriptionService,
    pub account_service: AccountService,
    pub partner_service: PartnerService,
    pub notification_service: NotificationService,
    pub dispatcher: Arc<dyn JobDispatcher>,
}

impl AppState {
    /// Wires every service. With `SEND_EMAILS_ASYNC` this spawns the notification
    /// worker, so it must run inside a tokio runtime.
    pub fn new(config: Config, repositories: Repositories, mailer: Arc<dyn Mailer>) -> Self {
        let account_service = AccountService::new(&repositories);
        let notification_service = NotificationService::new(
            &repositories,
            account_service.clone(),
            mailer,
            &config.frontend_url,
            &config.platform_disclaimer,
        );
        let dispatcher = dispatch::from_config(&config, notification_service.clone());

        Self {
            listing_service: ListingService::new(
                &repositories,
                dispatcher.clone(),
                config.default_page_size,
            ),
            click_service: ClickService::new(&repositories),
            subscription_service: SubscriptionService::new(&repositories, dispatcher.clone()),
            partner_service: PartnerService::new(&repositories),
            account_service,
            notification_service,
            dispatcher,
            config: Arc::new(config),
        }
    }

    pub fn storage_backend_name(&self) -> &'static str {
        match self.config.storage_backend {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}
