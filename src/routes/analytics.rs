use axum::{extract::State, response::IntoResponse};

use crate::{
    dto::analytics_dto::{TrackClickPayload, TrackClickResponse},
    error::Result,
    routes::extract::{Json, Path},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/track-click",
    responses(
        (status = 200, description = "Click recorded"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Opportunity not found")
    )
)]
#[axum::debug_handler]
pub async fn track_click(
    State(state): State<AppState>,
    Json(payload): Json<TrackClickPayload>,
) -> Result<impl IntoResponse> {
    let click_count = state
        .click_service
        .track(payload.listing_id, payload.click_type)
        .await?;
    Ok(Json(TrackClickResponse {
        success: true,
        click_count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/analytics",
    responses(
        (status = 200, description = "Platform analytics overview"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrator role required")
    )
)]
#[axum::debug_handler]
pub async fn overview(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.click_service.overview().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/opportunities/{id}/clicks",
    params(("id" = i64, Path, description = "Opportunity id")),
    responses(
        (status = 200, description = "Per-type click counts"),
        (status = 404, description = "Opportunity not found")
    )
)]
#[axum::debug_handler]
pub async fn listing_clicks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.click_service.listing_summary(id).await?))
}
