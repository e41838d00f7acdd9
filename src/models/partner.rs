use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub logo_url: String,
    pub website_url: Option<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPartner {
    pub name: String,
    pub logo_url: String,
    pub website_url: Option<String>,
    pub is_featured: bool,
}
