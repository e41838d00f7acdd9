use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::listing_dto::{
        CreateListingPayload, FeaturedListResponse, ListingDetail, ListingDetailResponse,
        ListingListResponse, ListingSummary, UpdateListingPayload,
    },
    error::Result,
    middleware::auth::Claims,
    models::choices::ClickType,
    routes::extract::{Json, Path, Query},
    utils::time::now,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/opportunities",
    responses(
        (status = 200, description = "Filtered, paginated active opportunities"),
        (status = 400, description = "Invalid filter value")
    )
)]
#[axum::debug_handler]
pub async fn list_opportunities(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let page = state.listing_service.search(&params).await?;
    Ok(Json(ListingListResponse::new(
        page,
        now(),
        &state.config.platform_disclaimer,
    )))
}

#[utoipa::path(
    get,
    path = "/api/opportunities/featured",
    responses((status = 200, description = "Active featured opportunities"))
)]
#[axum::debug_handler]
pub async fn featured_opportunities(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let now = now();
    let results: Vec<ListingSummary> = state
        .listing_service
        .featured()
        .await?
        .iter()
        .map(|listing| ListingSummary::new(listing, now))
        .collect();
    Ok(Json(FeaturedListResponse {
        count: results.len(),
        results,
        disclaimer: state.config.platform_disclaimer.clone(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/opportunities/{key}",
    params(("key" = String, Path, description = "Opportunity id or slug")),
    responses(
        (status = 200, description = "Opportunity detail"),
        (status = 404, description = "Opportunity not found or inactive")
    )
)]
#[axum::debug_handler]
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let listing = state.listing_service.get_public(&key).await?;
    Ok(Json(ListingDetailResponse {
        listing: ListingDetail::new(&listing, now()),
        disclaimer: state.config.platform_disclaimer.clone(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/opportunities/{key}/brochure",
    params(("key" = i64, Path, description = "Opportunity id")),
    responses(
        (status = 307, description = "Redirect to the brochure"),
        (status = 404, description = "Opportunity or brochure not found")
    )
)]
#[axum::debug_handler]
pub async fn brochure_redirect(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (listing, url) = state.listing_service.brochure(id).await?;
    state
        .click_service
        .track(listing.id, ClickType::ViewBrochure)
        .await?;
    Ok(Redirect::temporary(&url))
}

#[utoipa::path(
    post,
    path = "/api/admin/opportunities",
    responses(
        (status = 201, description = "Opportunity created"),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrator role required")
    )
)]
#[axum::debug_handler]
pub async fn create_opportunity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateListingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created_by = match Uuid::parse_str(&claims.sub) {
        Ok(id) => state.account_service.get(id).await.ok().map(|account| account.id),
        Err(_) => None,
    };
    let listing = state.listing_service.create(payload, created_by).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/opportunities/{id}",
    params(("id" = i64, Path, description = "Opportunity id")),
    responses(
        (status = 200, description = "Opportunity updated"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Opportunity not found")
    )
)]
#[axum::debug_handler]
pub async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateListingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let listing = state.listing_service.update(id, payload).await?;
    Ok(Json(listing))
}

#[utoipa::path(
    delete,
    path = "/api/admin/opportunities/{id}",
    params(("id" = i64, Path, description = "Opportunity id")),
    responses(
        (status = 200, description = "Opportunity deactivated"),
        (status = 404, description = "Opportunity not found")
    )
)]
#[axum::debug_handler]
pub async fn deactivate_opportunity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let listing = state.listing_service.deactivate(id).await?;
    Ok(Json(listing))
}
