//! In-process storage used by tests and `STORAGE_BACKEND=memory`.
//!
//! All tables live behind one lock so multi-table rules (click rows require a listing,
//! unique emails and tokens) are checked and applied in a single critical section.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountRepository, ClickRepository, CreatedWindow, ListingRepository, ListingStats,
    PartnerRepository, SubscriptionRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    account::{Account, NewAccount},
    choices::{Category, ClickType},
    click::{ClickRecord, ListingClicks},
    listing::{Listing, NewListing},
    partner::{NewPartner, Partner},
    subscription::{SubscribeOutcome, Subscription, Transition, TransitionOutcome},
};
use crate::services::filter::{self, compare_by, default_ordering, ListingQuery, Page};

#[derive(Default)]
struct State {
    listings: Vec<Listing>,
    next_listing_id: i64,
    clicks: HashMap<(i64, ClickType), ClickRecord>,
    subscriptions: Vec<Subscription>,
    accounts: Vec<Account>,
    partners: Vec<Partner>,
    next_partner_id: i64,
}

impl State {
    fn subscription_by_email(&mut self, email: &str) -> Option<&mut Subscription> {
        self.subscriptions.iter_mut().find(|s| s.email == email)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[async_trait::async_trait]
impl ListingRepository for MemoryStore {
    async fn insert(&self, listing: NewListing) -> Result<Listing> {
        let mut state = self.state.write().await;
        if state.listings.iter().any(|l| l.slug == listing.slug) {
            return Err(Error::Conflict(format!("slug `{}` is taken", listing.slug)));
        }
        state.next_listing_id += 1;
        let stored = listing.into_listing(state.next_listing_id, Utc::now());
        state.listings.push(stored.clone());
        Ok(stored)
    }

    async fn save(&self, listing: &Listing) -> Result<Listing> {
        let mut state = self.state.write().await;
        if state
            .listings
            .iter()
            .any(|l| l.slug == listing.slug && l.id != listing.id)
        {
            return Err(Error::Conflict(format!("slug `{}` is taken", listing.slug)));
        }
        let slot = state
            .listings
            .iter_mut()
            .find(|l| l.id == listing.id)
            .ok_or_else(|| Error::NotFound(format!("listing {} not found", listing.id)))?;
        let created_at = slot.created_at;
        *slot = Listing {
            created_at,
            updated_at: Utc::now(),
            ..listing.clone()
        };
        Ok(slot.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<Listing>> {
        let state = self.state.read().await;
        Ok(state.listings.iter().find(|l| l.id == id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Listing>> {
        let state = self.state.read().await;
        Ok(state.listings.iter().find(|l| l.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.listings.iter().any(|l| l.slug == slug))
    }

    async fn search(&self, query: &ListingQuery, now: DateTime<Utc>) -> Result<Page<Listing>> {
        let state = self.state.read().await;
        Ok(filter::apply(query, &state.listings, now))
    }

    async fn featured(&self, limit: i64) -> Result<Vec<Listing>> {
        let state = self.state.read().await;
        let ordering = default_ordering();
        let mut featured: Vec<&Listing> = state
            .listings
            .iter()
            .filter(|l| l.is_active && l.is_featured)
            .collect();
        featured.sort_by(|a, b| compare_by(&ordering, a, b));
        Ok(featured
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn created_in(&self, window: CreatedWindow) -> Result<Vec<Listing>> {
        let state = self.state.read().await;
        let mut found: Vec<Listing> = state
            .listings
            .iter()
            .filter(|l| l.is_active && window.contains(l.created_at))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn stats(&self) -> Result<ListingStats> {
        let state = self.state.read().await;
        let active = state.listings.iter().filter(|l| l.is_active);
        Ok(active.fold(ListingStats::default(), |mut stats, l| {
            stats.active += 1;
            stats.verified += i64::from(l.is_verified);
            stats.featured += i64::from(l.is_featured);
            stats
        }))
    }

    async fn category_counts(&self) -> Result<HashMap<Category, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for listing in state.listings.iter().filter(|l| l.is_active) {
            *counts.entry(listing.category).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn active_count_by_organization(&self) -> Result<HashMap<String, i64>> {
        let state = self.state.read().await;
        let mut counts = HashMap::new();
        for listing in state.listings.iter().filter(|l| l.is_active) {
            *counts.entry(listing.organization_name.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait::async_trait]
impl ClickRepository for MemoryStore {
    async fn increment(
        &self,
        listing_id: i64,
        click_type: ClickType,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut state = self.state.write().await;
        if !state.listings.iter().any(|l| l.id == listing_id) {
            return Err(Error::NotFound(format!("listing {} not found", listing_id)));
        }
        let record = state
            .clicks
            .entry((listing_id, click_type))
            .or_insert_with(|| ClickRecord {
                listing_id,
                click_type,
                click_count: 0,
                last_clicked_at: now,
            });
        record.click_count += 1;
        record.last_clicked_at = now;
        Ok(record.click_count)
    }

    async fn for_listing(&self, listing_id: i64) -> Result<Vec<ClickRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<ClickRecord> = state
            .clicks
            .values()
            .filter(|r| r.listing_id == listing_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.click_type);
        Ok(records)
    }

    async fn top_listings(&self, limit: i64) -> Result<Vec<ListingClicks>> {
        let state = self.state.read().await;
        let mut totals: HashMap<i64, i64> = HashMap::new();
        for record in state.clicks.values() {
            *totals.entry(record.listing_id).or_insert(0) += record.click_count;
        }
        let mut ranked: Vec<ListingClicks> = state
            .listings
            .iter()
            .filter_map(|l| {
                totals.get(&l.id).map(|total| ListingClicks {
                    id: l.id,
                    title: l.title.clone(),
                    organization: l.organization_name.clone(),
                    total_clicks: *total,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.total_clicks.cmp(&a.total_clicks).then(a.id.cmp(&b.id)));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn total_clicks(&self) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.clicks.values().map(|r| r.click_count).sum())
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn subscribe(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, SubscribeOutcome)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.subscription_by_email(email) {
            let outcome = existing.resubscribe(fresh_token);
            return Ok((existing.clone(), outcome));
        }
        let created = Subscription::pending(email.to_string(), fresh_token, now);
        state.subscriptions.push(created.clone());
        Ok((created, SubscribeOutcome::Created))
    }

    async fn transition(
        &self,
        token: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<(Subscription, TransitionOutcome)>> {
        let mut state = self.state.write().await;
        Ok(state
            .subscriptions
            .iter_mut()
            .find(|s| s.confirmation_token == token)
            .map(|subscription| {
                let outcome = transition.apply(subscription, now);
                (subscription.clone(), outcome)
            }))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Subscription>> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn active(&self) -> Result<Vec<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn advance_watermark(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound(format!("subscription {} not found", id)))?;
        subscription.last_notified_at = Some(at);
        Ok(())
    }

    async fn ensure_confirmed(
        &self,
        email: &str,
        fresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.subscription_by_email(email) {
            existing.ensure_confirmed(now);
            return Ok(existing.clone());
        }
        let mut created = Subscription::pending(email.to_string(), fresh_token, now);
        created.ensure_confirmed(now);
        state.subscriptions.push(created.clone());
        Ok(created)
    }
}

#[async_trait::async_trait]
impl AccountRepository for MemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut state = self.state.write().await;
        if state.accounts.iter().any(|a| a.email == account.email) {
            return Err(Error::Conflict(format!(
                "account `{}` already exists",
                account.email
            )));
        }
        let stored = account.into_account(Uuid::new_v4(), Utc::now());
        state.accounts.push(stored.clone());
        Ok(stored)
    }

    async fn save(&self, account: &Account) -> Result<Account> {
        let mut state = self.state.write().await;
        if state
            .accounts
            .iter()
            .any(|a| a.email == account.email && a.id != account.id)
        {
            return Err(Error::Conflict(format!(
                "account `{}` already exists",
                account.email
            )));
        }
        let slot = state
            .accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| Error::NotFound(format!("account {} not found", account.id)))?;
        *slot = Account {
            created_at: slot.created_at,
            updated_at: Utc::now(),
            ..account.clone()
        };
        Ok(slot.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.clone())
    }
}

#[async_trait::async_trait]
impl PartnerRepository for MemoryStore {
    async fn insert(&self, partner: NewPartner) -> Result<Partner> {
        let mut state = self.state.write().await;
        if state.partners.iter().any(|p| p.name == partner.name) {
            return Err(Error::Conflict(format!(
                "partner `{}` already exists",
                partner.name
            )));
        }
        state.next_partner_id += 1;
        let stored = Partner {
            id: state.next_partner_id,
            name: partner.name,
            logo_url: partner.logo_url,
            website_url: partner.website_url,
            is_featured: partner.is_featured,
            created_at: Utc::now(),
        };
        state.partners.push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.partners.len();
        state.partners.retain(|p| p.id != id);
        Ok(state.partners.len() != before)
    }

    async fn list(&self) -> Result<Vec<Partner>> {
        let state = self.state.read().await;
        let mut partners = state.partners.clone();
        partners.sort_by(|a, b| b.is_featured.cmp(&a.is_featured).then(a.name.cmp(&b.name)));
        Ok(partners)
    }

    async fn count(&self) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.partners.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::fixtures::listing;
    use std::sync::Arc;

    fn draft(title: &str, slug: &str) -> NewListing {
        let template = listing(0, title, Utc::now());
        NewListing {
            slug: slug.to_string(),
            title: template.title,
            organization_name: template.organization_name,
            description: template.description,
            category: template.category,
            location: None,
            city: None,
            work_mode: None,
            commitment: None,
            target_group: None,
            education_level: None,
            funding_type: None,
            is_paid: false,
            stipend_min: None,
            stipend_max: None,
            required_documents: Vec::new(),
            application_type: template.application_type,
            external_url: template.external_url,
            application_email: None,
            email_subject_line: None,
            brochure_url: None,
            prep_checklist: Vec::new(),
            deadline: None,
            is_rolling: false,
            is_verified: false,
            is_active: true,
            is_featured: false,
            raw_data: String::new(),
            created_by: None,
        }
    }

    #[tokio::test]
    async fn clicks_require_an_existing_listing() {
        let store = MemoryStore::default();
        let result = store.increment(42, ClickType::Apply, Utc::now()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_clicks_are_not_lost() {
        let store = Arc::new(MemoryStore::default());
        let stored = ListingRepository::insert(store.as_ref(), draft("Clerk", "clerk"))
            .await
            .unwrap();
        let id = stored.id;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment(id, ClickType::Apply, Utc::now())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = store.for_listing(id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].click_count, 50);
        assert_eq!(store.total_clicks().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let store = MemoryStore::default();
        ListingRepository::insert(&store, draft("A", "same")).await.unwrap();
        let second = ListingRepository::insert(&store, draft("B", "same")).await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn top_listings_rank_by_total_then_id() {
        let store = MemoryStore::default();
        let a = ListingRepository::insert(&store, draft("A", "a")).await.unwrap();
        let b = ListingRepository::insert(&store, draft("B", "b")).await.unwrap();
        let now = Utc::now();
        store.increment(b.id, ClickType::Apply, now).await.unwrap();
        store.increment(a.id, ClickType::ViewDetails, now).await.unwrap();

        let top = store.top_listings(10).await.unwrap();
        assert_eq!(top.iter().map(|t| t.id).collect::<Vec<_>>(), vec![a.id, b.id]);

        store.increment(b.id, ClickType::ComposeEmail, now).await.unwrap();
        let top = store.top_listings(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, b.id);
        assert_eq!(top[0].total_clicks, 2);
    }

    #[tokio::test]
    async fn resubscribing_rotates_the_token() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let (first, outcome) = store.subscribe("a@x.com", "t1".into(), now).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Created);

        let (second, outcome) = store.subscribe("a@x.com", "t2".into(), now).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Resent);
        assert_eq!(second.id, first.id);

        assert!(store
            .transition("t1", Transition::Confirm, now)
            .await
            .unwrap()
            .is_none());
        let (_, outcome) = store
            .transition("t2", Transition::Confirm, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Confirmed);
    }
}
