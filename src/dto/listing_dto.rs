use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::choices::{
    ApplicationType, Category, Commitment, DocumentType, EducationLevel, FundingType, Location,
    TargetGroup, WorkMode,
};
use crate::models::listing::{Listing, NewListing, PrepChecklistItem};
use crate::services::filter::Page;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateListingPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub organization_name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub location: Option<Location>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub commitment: Option<Commitment>,
    pub target_group: Option<TargetGroup>,
    pub education_level: Option<EducationLevel>,
    pub funding_type: Option<FundingType>,
    #[serde(default)]
    pub is_paid: bool,
    pub stipend_min: Option<Decimal>,
    pub stipend_max: Option<Decimal>,
    #[serde(default)]
    pub required_documents: Vec<DocumentType>,
    pub application_type: ApplicationType,
    #[validate(url)]
    pub external_url: Option<String>,
    #[validate(email)]
    pub application_email: Option<String>,
    #[validate(length(max = 255))]
    pub email_subject_line: Option<String>,
    #[validate(url)]
    pub brochure_url: Option<String>,
    #[serde(default)]
    pub prep_checklist: Vec<PrepChecklistItem>,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_rolling: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub raw_data: String,
}

impl CreateListingPayload {
    pub fn into_new_listing(self, slug: String, created_by: Option<Uuid>) -> NewListing {
        let mut required_documents = self.required_documents;
        required_documents.sort();
        required_documents.dedup();

        NewListing {
            slug,
            title: self.title.trim().to_string(),
            organization_name: self.organization_name.trim().to_string(),
            description: self.description,
            category: self.category,
            location: self.location,
            city: self.city,
            work_mode: self.work_mode,
            commitment: self.commitment,
            target_group: self.target_group,
            education_level: self.education_level,
            funding_type: self.funding_type,
            is_paid: self.is_paid,
            stipend_min: self.stipend_min,
            stipend_max: self.stipend_max,
            required_documents,
            application_type: self.application_type,
            external_url: self.external_url,
            application_email: self.application_email,
            email_subject_line: self.email_subject_line,
            brochure_url: self.brochure_url,
            prep_checklist: self.prep_checklist,
            deadline: self.deadline,
            is_rolling: self.is_rolling,
            is_verified: self.is_verified,
            is_active: self.is_active,
            is_featured: self.is_featured,
            raw_data: self.raw_data,
            created_by,
        }
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateListingPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub organization_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub commitment: Option<Commitment>,
    pub target_group: Option<TargetGroup>,
    pub education_level: Option<EducationLevel>,
    pub funding_type: Option<FundingType>,
    pub is_paid: Option<bool>,
    pub stipend_min: Option<Decimal>,
    pub stipend_max: Option<Decimal>,
    pub required_documents: Option<Vec<DocumentType>>,
    pub application_type: Option<ApplicationType>,
    #[validate(url)]
    pub external_url: Option<String>,
    #[validate(email)]
    pub application_email: Option<String>,
    #[validate(length(max = 255))]
    pub email_subject_line: Option<String>,
    #[validate(url)]
    pub brochure_url: Option<String>,
    pub prep_checklist: Option<Vec<PrepChecklistItem>>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_rolling: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub raw_data: Option<String>,
}

impl UpdateListingPayload {
    pub fn apply_to(self, listing: &mut Listing) {
        macro_rules! patch {
            ($from:ident => $to:ident; $($field:ident),+ $(,)?) => {
                $(if let Some(value) = $from.$field {
                    $to.$field = value;
                })+
            };
        }
        macro_rules! patch_optional {
            ($from:ident => $to:ident; $($field:ident),+ $(,)?) => {
                $(if let Some(value) = $from.$field {
                    $to.$field = Some(value);
                })+
            };
        }

        let update = self;
        if let Some(title) = &update.title {
            listing.title = title.trim().to_string();
        }
        if let Some(organization_name) = &update.organization_name {
            listing.organization_name = organization_name.trim().to_string();
        }
        if let Some(mut documents) = update.required_documents {
            documents.sort();
            documents.dedup();
            listing.required_documents = documents;
        }
        patch!(update => listing;
            description,
            category,
            is_paid,
            application_type,
            prep_checklist,
            is_rolling,
            is_verified,
            is_active,
            is_featured,
            raw_data,
        );
        patch_optional!(update => listing;
            location,
            city,
            work_mode,
            commitment,
            target_group,
            education_level,
            funding_type,
            stipend_min,
            stipend_max,
            external_url,
            application_email,
            email_subject_line,
            brochure_url,
            deadline,
        );
    }
}

/// Card shown in list views.
#[derive(Debug, Clone, Serialize)]
pub struct ListingSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub organization_name: String,
    pub category: Category,
    pub category_display: &'static str,
    pub location: Option<Location>,
    pub city: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub commitment: Option<Commitment>,
    pub is_paid: bool,
    pub stipend_min: Option<Decimal>,
    pub stipend_max: Option<Decimal>,
    pub application_type: ApplicationType,
    pub deadline: Option<DateTime<Utc>>,
    pub days_until_deadline: Option<i64>,
    pub is_expired: bool,
    pub is_rolling: bool,
    pub is_verified: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl ListingSummary {
    pub fn new(listing: &Listing, now: DateTime<Utc>) -> Self {
        Self {
            id: listing.id,
            slug: listing.slug.clone(),
            title: listing.title.clone(),
            organization_name: listing.organization_name.clone(),
            category: listing.category,
            category_display: listing.category.label(),
            location: listing.location,
            city: listing.city.clone(),
            work_mode: listing.work_mode,
            commitment: listing.commitment,
            is_paid: listing.is_paid,
            stipend_min: listing.stipend_min,
            stipend_max: listing.stipend_max,
            application_type: listing.application_type,
            deadline: listing.deadline,
            days_until_deadline: listing.days_until_deadline(now),
            is_expired: listing.is_expired(now),
            is_rolling: listing.is_rolling,
            is_verified: listing.is_verified,
            is_featured: listing.is_featured,
            created_at: listing.created_at,
        }
    }
}

/// Public detail view. `raw_data` and `created_by` stay private.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub summary: ListingSummary,
    pub description: String,
    pub target_group: Option<TargetGroup>,
    pub education_level: Option<EducationLevel>,
    pub funding_type: Option<FundingType>,
    pub required_documents: Vec<DocumentType>,
    pub external_url: Option<String>,
    pub application_email: Option<String>,
    pub email_subject_line: Option<String>,
    pub brochure_url: Option<String>,
    pub application_destination: Option<String>,
    pub prep_checklist: Vec<PrepChecklistItem>,
    pub updated_at: DateTime<Utc>,
}

impl ListingDetail {
    pub fn new(listing: &Listing, now: DateTime<Utc>) -> Self {
        Self {
            summary: ListingSummary::new(listing, now),
            description: listing.description.clone(),
            target_group: listing.target_group,
            education_level: listing.education_level,
            funding_type: listing.funding_type,
            required_documents: listing.required_documents.clone(),
            external_url: listing.external_url.clone(),
            application_email: listing.application_email.clone(),
            email_subject_line: listing.email_subject_line.clone(),
            brochure_url: listing.brochure_url.clone(),
            application_destination: listing.destination().map(str::to_string),
            prep_checklist: listing.prep_checklist.clone(),
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingListResponse {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub results: Vec<ListingSummary>,
    pub disclaimer: String,
}

impl ListingListResponse {
    pub fn new(page: Page<Listing>, now: DateTime<Utc>, disclaimer: &str) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(|listing| ListingSummary::new(&listing, now));
        Self {
            count: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
            results: page.items,
            disclaimer: disclaimer.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturedListResponse {
    pub count: usize,
    pub results: Vec<ListingSummary>,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingDetailResponse {
    #[serde(flatten)]
    pub listing: ListingDetail,
    pub disclaimer: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing::fixtures::listing;

    #[test]
    fn patch_touches_only_present_fields() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        let payload = UpdateListingPayload {
            title: Some("  Senior Field Officer ".to_string()),
            city: Some("Kakuma".to_string()),
            is_featured: Some(true),
            required_documents: Some(vec![
                DocumentType::Passport,
                DocumentType::AlienCard,
                DocumentType::Passport,
            ]),
            ..Default::default()
        };
        payload.apply_to(&mut item);

        assert_eq!(item.title, "Senior Field Officer");
        assert_eq!(item.city.as_deref(), Some("Kakuma"));
        assert!(item.is_featured);
        assert_eq!(item.organization_name, "UNHCR");
        assert_eq!(item.required_documents.len(), 2);
        assert_eq!(item.external_url.as_deref(), Some("https://example.org/apply"));
    }

    #[test]
    fn detail_exposes_destination_and_hides_raw_data() {
        let now = Utc::now();
        let mut item = listing(7, "Data Clerk", now);
        item.raw_data = "pasted source".to_string();

        let body = serde_json::to_value(ListingDetail::new(&item, now)).unwrap();
        assert_eq!(body["id"], 7);
        assert_eq!(body["category_display"], "Job");
        assert_eq!(body["application_destination"], "https://example.org/apply");
        assert!(body.get("raw_data").is_none());
    }
}
