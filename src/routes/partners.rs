use axum::{extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    dto::partner_dto::CreatePartnerPayload,
    error::Result,
    routes::extract::{Json, Path},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/partners",
    responses((status = 200, description = "Partners with their active opportunity counts"))
)]
#[axum::debug_handler]
pub async fn list_partners(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.partner_service.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/category-counts",
    responses((status = 200, description = "Active opportunities per category, plus partner count"))
)]
#[axum::debug_handler]
pub async fn category_counts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.partner_service.category_counts().await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/partners",
    responses(
        (status = 201, description = "Partner created"),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Partner name already exists")
    )
)]
#[axum::debug_handler]
pub async fn create_partner(
    State(state): State<AppState>,
    Json(payload): Json<CreatePartnerPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let partner = state.partner_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/partners/{id}",
    params(("id" = i64, Path, description = "Partner id")),
    responses(
        (status = 204, description = "Partner deleted"),
        (status = 404, description = "Partner not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_partner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.partner_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
