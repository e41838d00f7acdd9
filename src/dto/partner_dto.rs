use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::partner::{NewPartner, Partner};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePartnerPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(url)]
    pub logo_url: String,
    #[validate(url)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl From<CreatePartnerPayload> for NewPartner {
    fn from(payload: CreatePartnerPayload) -> Self {
        Self {
            name: payload.name.trim().to_string(),
            logo_url: payload.logo_url,
            website_url: payload.website_url,
            is_featured: payload.is_featured,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerResponse {
    pub id: i64,
    pub name: String,
    pub logo_url: String,
    pub website_url: Option<String>,
    pub is_featured: bool,
    pub opportunity_count: i64,
    pub created_at: DateTime<Utc>,
}

impl PartnerResponse {
    pub fn new(partner: Partner, opportunity_count: i64) -> Self {
        Self {
            id: partner.id,
            name: partner.name,
            logo_url: partner.logo_url,
            website_url: partner.website_url,
            is_featured: partner.is_featured,
            opportunity_count,
            created_at: partner.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub jobs: i64,
    pub scholarships: i64,
    pub internships: i64,
    pub fellowships: i64,
    pub training: i64,
    pub partners: i64,
}
