use crate::dto::partner_dto::{CategoryCounts, CreatePartnerPayload, PartnerResponse};
use crate::error::{Error, Result};
use crate::models::choices::Category;
use crate::models::partner::Partner;
use crate::repository::{ListingRepository, PartnerRepository, Repositories};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct PartnerService {
    partners: Arc<dyn PartnerRepository>,
    listings: Arc<dyn ListingRepository>,
}

impl PartnerService {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            partners: repositories.partners.clone(),
            listings: repositories.listings.clone(),
        }
    }

    /// Partners with the number of active listings published under their name.
    pub async fn list(&self) -> Result<Vec<PartnerResponse>> {
        let counts = self.listings.active_count_by_organization().await?;
        let partners = self.partners.list().await?;
        Ok(partners
            .into_iter()
            .map(|partner| {
                let count = counts.get(&partner.name).copied().unwrap_or(0);
                PartnerResponse::new(partner, count)
            })
            .collect())
    }

    pub async fn create(&self, payload: CreatePartnerPayload) -> Result<Partner> {
        let partner = self.partners.insert(payload.into()).await?;
        info!(partner_id = partner.id, name = %partner.name, "Partner created");
        Ok(partner)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.partners.delete(id).await? {
            return Err(Error::NotFound(format!("Partner {} not found", id)));
        }
        info!(partner_id = id, "Partner deleted");
        Ok(())
    }

    pub async fn category_counts(&self) -> Result<CategoryCounts> {
        let by_category = self.listings.category_counts().await?;
        let count = |category: Category| by_category.get(&category).copied().unwrap_or(0);
        Ok(CategoryCounts {
            jobs: count(Category::Job),
            scholarships: count(Category::Scholarship),
            internships: count(Category::Internship),
            fellowships: count(Category::Fellowship),
            training: count(Category::Training),
            partners: self.partners.count().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::fixtures::new_listing;

    fn payload(name: &str) -> CreatePartnerPayload {
        CreatePartnerPayload {
            name: name.to_string(),
            logo_url: "https://cdn.example.org/logo.png".to_string(),
            website_url: None,
            is_featured: false,
        }
    }

    #[tokio::test]
    async fn partners_report_their_active_listings() {
        let repositories = Repositories::memory();
        let service = PartnerService::new(&repositories);
        service.create(payload("UNHCR")).await.unwrap();
        service.create(payload("RefugePoint")).await.unwrap();

        repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();
        let mut inactive = new_listing("Data Clerk");
        inactive.is_active = false;
        repositories.listings.insert(inactive).await.unwrap();

        let partners = service.list().await.unwrap();
        let unhcr = partners.iter().find(|p| p.name == "UNHCR").unwrap();
        let other = partners.iter().find(|p| p.name == "RefugePoint").unwrap();
        assert_eq!(unhcr.opportunity_count, 1);
        assert_eq!(other.opportunity_count, 0);
    }

    #[tokio::test]
    async fn category_counts_cover_every_category_and_partners() {
        let repositories = Repositories::memory();
        let service = PartnerService::new(&repositories);
        service.create(payload("UNHCR")).await.unwrap();

        let mut scholarship = new_listing("Masters Scholarship");
        scholarship.category = Category::Scholarship;
        repositories.listings.insert(scholarship).await.unwrap();
        repositories
            .listings
            .insert(new_listing("Field Officer"))
            .await
            .unwrap();

        let counts = service.category_counts().await.unwrap();
        assert_eq!(
            counts,
            CategoryCounts {
                jobs: 1,
                scholarships: 1,
                partners: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn deleting_a_missing_partner_is_not_found() {
        let service = PartnerService::new(&Repositories::memory());
        assert!(matches!(service.delete(9).await, Err(Error::NotFound(_))));
    }
}
