use crate::dto::analytics_dto::{AnalyticsOverview, ClickTypeCount, ListingClickSummary};
use crate::error::{Error, Result};
use crate::models::choices::ClickType;
use crate::repository::{ClickRepository, ListingRepository, Repositories};
use crate::utils::time::now;
use std::sync::Arc;
use tracing::debug;

pub const TOP_CLICKED_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct ClickService {
    listings: Arc<dyn ListingRepository>,
    clicks: Arc<dyn ClickRepository>,
}

impl ClickService {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            listings: repositories.listings.clone(),
            clicks: repositories.clicks.clone(),
        }
    }

    /// Bumps the counter for (listing, type) and returns the new count.
    pub async fn track(&self, listing_id: i64, click_type: ClickType) -> Result<i64> {
        let count = self.clicks.increment(listing_id, click_type, now()).await?;
        debug!(listing_id, %click_type, count, "Click recorded");
        Ok(count)
    }

    pub async fn listing_summary(&self, listing_id: i64) -> Result<ListingClickSummary> {
        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Opportunity {} not found", listing_id)))?;
        let clicks: Vec<ClickTypeCount> = self
            .clicks
            .for_listing(listing_id)
            .await?
            .into_iter()
            .map(|record| ClickTypeCount {
                click_type: record.click_type,
                click_count: record.click_count,
                last_clicked_at: record.last_clicked_at,
            })
            .collect();

        Ok(ListingClickSummary {
            listing_id,
            title: listing.title,
            total_clicks: clicks.iter().map(|c| c.click_count).sum(),
            clicks,
        })
    }

    pub async fn overview(&self) -> Result<AnalyticsOverview> {
        let stats = self.listings.stats().await?;
        Ok(AnalyticsOverview {
            total_opportunities: stats.active,
            verified_opportunities: stats.verified,
            featured_opportunities: stats.featured,
            total_clicks: self.clicks.total_clicks().await?,
            top_clicked: self.clicks.top_listings(TOP_CLICKED_LIMIT).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::fixtures::new_listing;

    #[tokio::test]
    async fn summary_totals_every_click_type() {
        let repositories = Repositories::memory();
        let service = ClickService::new(&repositories);
        let listing = repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();

        assert_eq!(service.track(listing.id, ClickType::Apply).await.unwrap(), 1);
        assert_eq!(service.track(listing.id, ClickType::Apply).await.unwrap(), 2);
        assert_eq!(
            service.track(listing.id, ClickType::ViewDetails).await.unwrap(),
            1
        );

        let summary = service.listing_summary(listing.id).await.unwrap();
        assert_eq!(summary.total_clicks, 3);
        assert_eq!(summary.clicks.len(), 2);
    }

    #[tokio::test]
    async fn clicks_on_unknown_listings_are_not_found() {
        let service = ClickService::new(&Repositories::memory());
        assert!(matches!(
            service.track(404, ClickType::Apply).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.listing_summary(404).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn overview_ranks_top_listings() {
        let repositories = Repositories::memory();
        let service = ClickService::new(&repositories);
        let quiet = repositories
            .listings
            .insert(new_listing("Data Clerk"))
            .await
            .unwrap();
        let mut draft = new_listing("Field Officer");
        draft.is_verified = true;
        draft.is_featured = true;
        let busy = repositories.listings.insert(draft).await.unwrap();

        service.track(quiet.id, ClickType::Apply).await.unwrap();
        for _ in 0..3 {
            service.track(busy.id, ClickType::ComposeEmail).await.unwrap();
        }

        let overview = service.overview().await.unwrap();
        assert_eq!(overview.total_opportunities, 2);
        assert_eq!(overview.verified_opportunities, 1);
        assert_eq!(overview.featured_opportunities, 1);
        assert_eq!(overview.total_clicks, 4);
        assert_eq!(overview.top_clicked[0].id, busy.id);
        assert_eq!(overview.top_clicked[0].total_clicks, 3);
    }
}
