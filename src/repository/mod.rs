use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::error::{Error, Result};
use crate::models::{
    account::{Account, NewAccount},
    choices::{Category, ClickType},
    click::{ClickRecord, ListingClicks},
    listing::{Listing, NewListing},
    partner::{NewPartner, Partner},
    subscription::{SubscribeOutcome, Subscription, Transition, TransitionOutcome},
};
use crate::services::filter::{ListingQuery, Page};

pub mod memory;
pub mod postgres;

/// Lower and upper bound on `created_at` for the notification window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedWindow {
    pub start: DateTime<Utc>,
    pub start_inclusive: bool,
    pub end: DateTime<Utc>,
}

impl CreatedWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let after_start = if self.start_inclusive {
            at >= self.start
        } else {
            at > self.start
        };
        after_start && at <= self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingStats {
    pub active: i64,
    pub verified: i64,
    pub featured: i64,
}

#[async_trait::async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert(&self, listing: NewListing) -> Result<Listing>;
    /// Writes every mutable column and bumps `updated_at`.
    async fn save(&self, listing: &Listing) -> Result<Listing>;
    async fn get(&self, id: i64) -> Result<Option<Listing>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Listing>>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
    async fn search(&self, query: &ListingQuery, now: DateTime<Utc>) -> Result<Page<Listing>>;
    async fn featured(&self, limit: i64) -> Result<Vec<Listing>>;
    /// Active listings created inside `window`, oldest first.
    async fn created_in(&self, window: CreatedWindow) -> Result<Vec<Listing>>;
    async fn stats(&self) -> Result<ListingStats>;
    async fn category_counts(&self) -> Result<HashMap<Category, i64>>;
    async fn active_count_by_organization(&self) -> Result<HashMap<String, i64>>;
}

#[async_trait::async_trait]
pub trait ClickRepository: Send + Sync {
    /// Atomically bumps the (listing, type) counter and returns the new count.
    async fn increment(
        &self,
        listing_id: i64,
        click_type: ClickType,
        now: DateTime<Utc>,
    ) -> Result<i64>;
    async fn for_listing(&self, listing_id: i64) -> Result<Vec<ClickRecord>>;
    async fn top_listings(&self, limit: i64) -> Result<Vec<ListingClicks>>;
    async fn total_clicks(&self) -> Result<i64>;
}

#[async_trait::async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn subscribe(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, SubscribeOutcome)>;
    /// `None` when no subscription holds `token`.
    async fn transition(
        &self,
        token: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<(Subscription, TransitionOutcome)>>;
    async fn get(&self, id: Uuid) -> Result<Option<Subscription>>;
    async fn active(&self) -> Result<Vec<Subscription>>;
    async fn advance_watermark(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    /// Creates or reactivates a confirmed subscription for `email`.
    async fn ensure_confirmed(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<Subscription>;
}

#[async_trait::async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert(&self, account: NewAccount) -> Result<Account>;
    async fn save(&self, account: &Account) -> Result<Account>;
    async fn get(&self, id: Uuid) -> Result<Option<Account>>;
    async fn list(&self) -> Result<Vec<Account>>;
}

#[async_trait::async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn insert(&self, partner: NewPartner) -> Result<Partner>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn list(&self) -> Result<Vec<Partner>>;
    async fn count(&self) -> Result<i64>;
}

#[derive(Clone)]
pub struct Repositories {
    pub listings: Arc<dyn ListingRepository>,
    pub clicks: Arc<dyn ClickRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub partners: Arc<dyn PartnerRepository>,
}

impl Repositories {
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            listings: store.clone(),
            clicks: store.clone(),
            subscriptions: store.clone(),
            accounts: store.clone(),
            partners: store,
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            listings: store.clone(),
            clicks: store.clone(),
            subscriptions: store.clone(),
            accounts: store.clone(),
            partners: store,
        }
    }

    /// Opens the configured backend. Postgres connections run pending migrations first.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage backend");
                Ok(Self::memory())
            }
            StorageBackend::Postgres => {
                let pool = crate::database::pool::create_pool(config).await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("Using Postgres storage backend");
                Ok(Self::postgres(pool))
            }
        }
    }
}

pub(crate) fn corrupt_row(err: impl std::fmt::Display) -> Error {
    Error::Internal(format!("stored row could not be decoded: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn created_window_bounds() {
        let now = Utc::now();
        let watermark = CreatedWindow {
            start: now - Duration::hours(1),
            start_inclusive: false,
            end: now,
        };
        assert!(!watermark.contains(now - Duration::hours(1)));
        assert!(watermark.contains(now));
        assert!(!watermark.contains(now + Duration::seconds(1)));

        let first_run = CreatedWindow {
            start_inclusive: true,
            ..watermark
        };
        assert!(first_run.contains(now - Duration::hours(1)));
    }
}
