use axum::{extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    dto::subscription_dto::{SubscribePayload, SubscriptionResponse},
    error::Result,
    models::subscription::SubscribeOutcome,
    routes::extract::{Json, Path},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/subscriptions",
    responses(
        (status = 201, description = "Subscription created; confirmation sent"),
        (status = 200, description = "Already subscribed, or confirmation re-sent"),
        (status = 400, description = "Invalid email")
    )
)]
#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (_, outcome) = state.subscription_service.subscribe(&payload.email).await?;
    let status = match outcome {
        SubscribeOutcome::Created => StatusCode::CREATED,
        SubscribeOutcome::AlreadySubscribed | SubscribeOutcome::Resent => StatusCode::OK,
    };
    Ok((status, Json(SubscriptionResponse::from(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/subscriptions/confirm/{token}",
    params(("token" = String, Path, description = "Confirmation token")),
    responses(
        (status = 200, description = "Subscription confirmed"),
        (status = 404, description = "Invalid token")
    )
)]
#[axum::debug_handler]
pub async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let outcome = state.subscription_service.confirm(&token).await?;
    Ok(Json(SubscriptionResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/subscriptions/unsubscribe/{token}",
    params(("token" = String, Path, description = "Subscription token")),
    responses(
        (status = 200, description = "Unsubscribed"),
        (status = 404, description = "Invalid token")
    )
)]
#[axum::debug_handler]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let outcome = state.subscription_service.unsubscribe(&token).await?;
    Ok(Json(SubscriptionResponse::from(outcome)))
}
