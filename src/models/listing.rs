use crate::error::{Error, Result};
use crate::models::choices::{
    ApplicationType, Category, Commitment, DocumentType, EducationLevel, FundingType, Location,
    TargetGroup, WorkMode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepChecklistItem {
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub organization_name: String,
    pub description: String,
    pub category: Category,
    pub location: Option<Location>,
    pub city: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub commitment: Option<Commitment>,
    pub target_group: Option<TargetGroup>,
    pub education_level: Option<EducationLevel>,
    pub funding_type: Option<FundingType>,
    pub is_paid: bool,
    pub stipend_min: Option<Decimal>,
    pub stipend_max: Option<Decimal>,
    pub required_documents: Vec<DocumentType>,
    pub application_type: ApplicationType,
    pub external_url: Option<String>,
    pub application_email: Option<String>,
    pub email_subject_line: Option<String>,
    pub brochure_url: Option<String>,
    pub prep_checklist: Vec<PrepChecklistItem>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_rolling: bool,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_featured: bool,
    pub raw_data: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listing that has not been stored yet. The store assigns `id` and timestamps.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub slug: String,
    pub title: String,
    pub organization_name: String,
    pub description: String,
    pub category: Category,
    pub location: Option<Location>,
    pub city: Option<String>,
    pub work_mode: Option<WorkMode>,
    pub commitment: Option<Commitment>,
    pub target_group: Option<TargetGroup>,
    pub education_level: Option<EducationLevel>,
    pub funding_type: Option<FundingType>,
    pub is_paid: bool,
    pub stipend_min: Option<Decimal>,
    pub stipend_max: Option<Decimal>,
    pub required_documents: Vec<DocumentType>,
    pub application_type: ApplicationType,
    pub external_url: Option<String>,
    pub application_email: Option<String>,
    pub email_subject_line: Option<String>,
    pub brochure_url: Option<String>,
    pub prep_checklist: Vec<PrepChecklistItem>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_rolling: bool,
    pub is_verified: bool,
    pub is_active: bool,
    pub is_featured: bool,
    pub raw_data: String,
    pub created_by: Option<Uuid>,
}

impl NewListing {
    pub fn check_invariants(&self) -> Result<()> {
        check_destination(
            self.application_type,
            self.external_url.as_deref(),
            self.application_email.as_deref(),
            self.brochure_url.as_deref(),
        )?;
        check_stipend(self.stipend_min, self.stipend_max)
    }

    pub fn into_listing(self, id: i64, now: DateTime<Utc>) -> Listing {
        Listing {
            id,
            slug: self.slug,
            title: self.title,
            organization_name: self.organization_name,
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
            required_documents: self.required_documents,
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
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Listing {
    /// The application channel selected by `application_type`, if it was filled in.
    pub fn destination(&self) -> Option<&str> {
        match self.application_type {
            ApplicationType::Link => self.external_url.as_deref(),
            ApplicationType::Email => self.application_email.as_deref(),
            ApplicationType::Pdf => self.brochure_url.as_deref(),
        }
    }

    pub fn days_until_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline
            .map(|deadline| (deadline - now).num_days().max(0))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.deadline, Some(deadline) if deadline < now)
    }

    /// Write-time rules shared by create and update.
    pub fn check_invariants(&self) -> Result<()> {
        check_destination(
            self.application_type,
            self.external_url.as_deref(),
            self.application_email.as_deref(),
            self.brochure_url.as_deref(),
        )?;
        check_stipend(self.stipend_min, self.stipend_max)
    }
}

fn check_destination(
    application_type: ApplicationType,
    external_url: Option<&str>,
    application_email: Option<&str>,
    brochure_url: Option<&str>,
) -> Result<()> {
    match application_type {
        ApplicationType::Link => {
            let raw = present(external_url).ok_or_else(|| {
                Error::invalid_field("external_url", "required when application_type is link")
            })?;
            let parsed = url::Url::parse(raw)
                .map_err(|e| Error::invalid_field("external_url", e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::invalid_field(
                    "external_url",
                    "must be an http or https URL",
                ));
            }
        }
        ApplicationType::Email => {
            let raw = present(application_email).ok_or_else(|| {
                Error::invalid_field(
                    "application_email",
                    "required when application_type is email",
                )
            })?;
            if !raw.validate_email() {
                return Err(Error::invalid_field(
                    "application_email",
                    "must be a valid email address",
                ));
            }
        }
        ApplicationType::Pdf => {
            present(brochure_url).ok_or_else(|| {
                Error::invalid_field("brochure_url", "required when application_type is pdf")
            })?;
        }
    }
    Ok(())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Stipends are stored as `NUMERIC(12, 2)`: at most ten integer digits.
fn check_stipend_magnitude(field: &str, value: Option<Decimal>) -> Result<()> {
    let limit = Decimal::from(10_000_000_000_i64);
    match value {
        Some(v) if v.round_dp(2).abs() >= limit => Err(Error::invalid_field(
            field,
            "must have at most 10 digits before the decimal point",
        )),
        _ => Ok(()),
    }
}

fn check_stipend(min: Option<Decimal>, max: Option<Decimal>) -> Result<()> {
    check_stipend_magnitude("stipend_min", min)?;
    check_stipend_magnitude("stipend_max", max)?;
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(Error::invalid_field(
                "stipend_min",
                "must not exceed stipend_max",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn listing(id: i64, title: &str, now: DateTime<Utc>) -> Listing {
        let mut draft = new_listing(title);
        draft.slug = format!("listing-{}", id);
        draft.into_listing(id, now)
    }

    pub fn new_listing(title: &str) -> NewListing {
        NewListing {
            slug: crate::utils::slug::slugify(title),
            title: title.to_string(),
            organization_name: "UNHCR".to_string(),
            description: String::new(),
            category: Category::Job,
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
            application_type: ApplicationType::Link,
            external_url: Some("https://example.org/apply".to_string()),
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
}

#[cfg(test)]
mod tests {
    use super::fixtures::listing;
    use super::*;
    use chrono::Duration;
    use claims::{assert_err, assert_ok};

    #[test]
    fn destination_follows_application_type() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        assert_eq!(item.destination(), Some("https://example.org/apply"));

        item.application_type = ApplicationType::Pdf;
        assert_eq!(item.destination(), None);

        item.brochure_url = Some("https://cdn.example.org/b.pdf".to_string());
        assert_eq!(item.destination(), Some("https://cdn.example.org/b.pdf"));
    }

    #[test]
    fn days_until_deadline_is_floored_at_zero() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        assert_eq!(item.days_until_deadline(now), None);
        assert!(!item.is_expired(now));

        item.deadline = Some(now + Duration::days(3) + Duration::hours(5));
        assert_eq!(item.days_until_deadline(now), Some(3));

        item.deadline = Some(now - Duration::days(2));
        assert_eq!(item.days_until_deadline(now), Some(0));
        assert!(item.is_expired(now));
    }

    #[test]
    fn link_listings_need_http_url() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        assert_ok!(item.check_invariants());

        item.external_url = Some("ftp://example.org".to_string());
        assert_err!(item.check_invariants());

        item.external_url = None;
        assert!(matches!(
            item.check_invariants(),
            Err(Error::InvalidField { field, .. }) if field == "external_url"
        ));
    }

    #[test]
    fn email_listings_need_valid_address() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        item.application_type = ApplicationType::Email;
        item.application_email = Some("not-an-email".to_string());
        assert_err!(item.check_invariants());

        item.application_email = Some("jobs@example.org".to_string());
        assert_ok!(item.check_invariants());
    }

    #[test]
    fn stipend_range_must_be_ordered() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        item.stipend_min = Some(Decimal::from(500));
        item.stipend_max = Some(Decimal::from(100));
        assert!(matches!(
            item.check_invariants(),
            Err(Error::InvalidField { field, .. }) if field == "stipend_min"
        ));

        item.stipend_max = Some(Decimal::from(500));
        assert_ok!(item.check_invariants());
    }

    #[test]
    fn stipend_must_fit_the_stored_precision() {
        let now = Utc::now();
        let mut item = listing(1, "Field Officer", now);
        item.stipend_max = Some(Decimal::new(999_999_999_999, 2));
        assert_ok!(item.check_invariants());

        item.stipend_max = Some(Decimal::from(10_000_000_000_i64));
        assert!(matches!(
            item.check_invariants(),
            Err(Error::InvalidField { field, .. }) if field == "stipend_max"
        ));

        item.stipend_max = None;
        item.stipend_min = Some(Decimal::new(-10_000_000_000_00, 2));
        assert!(matches!(
            item.check_invariants(),
            Err(Error::InvalidField { field, .. }) if field == "stipend_min"
        ));
    }
}
