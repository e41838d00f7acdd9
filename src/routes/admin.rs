use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::account_dto::{CreateAccountPayload, UpdateAccountPayload},
    error::Result,
    routes::extract::{Json, Path},
    services::dispatch::{Job, JobDispatcher},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/accounts",
    responses((status = 200, description = "All accounts"))
)]
#[axum::debug_handler]
pub async fn list_accounts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.account_service.list().await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/accounts",
    responses(
        (status = 201, description = "Account created and its subscription reconciled"),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already in use")
    )
)]
#[axum::debug_handler]
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let account = state.account_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/accounts/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account updated and its subscription reconciled"),
        (status = 404, description = "Account not found")
    )
)]
#[axum::debug_handler]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccountPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let account = state.account_service.update(id, payload).await?;
    Ok(Json(account))
}

#[utoipa::path(
    post,
    path = "/api/admin/notifications/digest",
    responses(
        (status = 202, description = "Digest run accepted"),
        (status = 502, description = "Mail delivery failed")
    )
)]
#[axum::debug_handler]
pub async fn run_digest(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.dispatcher.dispatch(Job::NotifyDue).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"success": true, "message": "Digest run accepted"})),
    ))
}
