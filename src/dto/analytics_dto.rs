use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::choices::ClickType;
use crate::models::click::ListingClicks;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackClickPayload {
    #[serde(alias = "job_id")]
    pub listing_id: i64,
    pub click_type: ClickType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackClickResponse {
    pub success: bool,
    pub click_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClickTypeCount {
    pub click_type: ClickType,
    pub click_count: i64,
    pub last_clicked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingClickSummary {
    pub listing_id: i64,
    pub title: String,
    pub total_clicks: i64,
    pub clicks: Vec<ClickTypeCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsOverview {
    pub total_opportunities: i64,
    pub verified_opportunities: i64,
    pub featured_opportunities: i64,
    pub total_clicks: i64,
    pub top_clicked: Vec<ListingClicks>,
}
