use crate::models::choices::ClickType;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counter for one (listing, click type) pair.
#[derive(Debug, Clone, Serialize)]
pub struct ClickRecord {
    pub listing_id: i64,
    pub click_type: ClickType,
    pub click_count: i64,
    pub last_clicked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingClicks {
    pub id: i64,
    pub title: String,
    pub organization: String,
    pub total_clicks: i64,
}
