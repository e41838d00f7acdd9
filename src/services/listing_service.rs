use crate::dto::listing_dto::{CreateListingPayload, UpdateListingPayload};
use crate::error::{Error, Result};
use crate::models::listing::Listing;
use crate::repository::{ListingRepository, ListingStats, Repositories};
use crate::services::dispatch::{Job, JobDispatcher};
use crate::services::filter::{ListingQuery, Page};
use crate::utils::{slug::unique_slug, time::now};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
    dispatcher: Arc<dyn JobDispatcher>,
    default_page_size: i64,
}

impl ListingService {
    pub fn new(
        repositories: &Repositories,
        dispatcher: Arc<dyn JobDispatcher>,
        default_page_size: i64,
    ) -> Self {
        Self {
            listings: repositories.listings.clone(),
            dispatcher,
            default_page_size,
        }
    }

    pub async fn search(&self, params: &HashMap<String, String>) -> Result<Page<Listing>> {
        let query = ListingQuery::from_params(params, self.default_page_size)?;
        self.listings.search(&query, now()).await
    }

    pub async fn featured(&self) -> Result<Vec<Listing>> {
        self.listings.featured(self.default_page_size).await
    }

    /// Public lookup by numeric id or slug. Inactive listings are hidden.
    pub async fn get_public(&self, key: &str) -> Result<Listing> {
        let found = match key.parse::<i64>() {
            Ok(id) => self.listings.get(id).await?,
            Err(_) => self.listings.get_by_slug(key).await?,
        };
        found
            .filter(|listing| listing.is_active)
            .ok_or_else(|| Error::NotFound(format!("Opportunity `{}` not found", key)))
    }

    pub async fn get(&self, id: i64) -> Result<Listing> {
        self.listings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Opportunity {} not found", id)))
    }

    /// Active listing with a brochure to redirect to.
    pub async fn brochure(&self, id: i64) -> Result<(Listing, String)> {
        let listing = self.get_public(&id.to_string()).await?;
        let url = listing
            .brochure_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("Opportunity {} has no brochure", id)))?;
        Ok((listing, url))
    }

    #[tracing::instrument(skip(self, payload), fields(title = %payload.title))]
    pub async fn create(
        &self,
        payload: CreateListingPayload,
        created_by: Option<Uuid>,
    ) -> Result<Listing> {
        let listings = self.listings.clone();
        let slug = unique_slug(&payload.title, |candidate| {
            let listings = listings.clone();
            async move { listings.slug_exists(&candidate).await }
        })
        .await?;

        let draft = payload.into_new_listing(slug, created_by);
        draft.check_invariants()?;
        let listing = self.listings.insert(draft).await?;
        info!(listing_id = listing.id, slug = %listing.slug, "Opportunity created");

        if listing.is_active {
            if let Err(e) = self.dispatcher.dispatch(Job::NotifyListing(listing.id)).await {
                error!(listing_id = listing.id, error = %e, "Failed to announce new opportunity");
            }
        }
        Ok(listing)
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: UpdateListingPayload) -> Result<Listing> {
        let mut listing = self.get(id).await?;
        payload.apply_to(&mut listing);
        listing.check_invariants()?;
        self.listings.save(&listing).await
    }

    /// Listings are never removed; deleting one deactivates it.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: i64) -> Result<Listing> {
        let mut listing = self.get(id).await?;
        if !listing.is_active {
            return Ok(listing);
        }
        listing.is_active = false;
        let listing = self.listings.save(&listing).await?;
        info!("Opportunity deactivated");
        Ok(listing)
    }

    pub async fn stats(&self) -> Result<ListingStats> {
        self.listings.stats().await
    }
}
