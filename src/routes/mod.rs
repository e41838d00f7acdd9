pub mod admin;
pub mod analytics;
pub mod extract;
pub mod health;
pub mod opportunities;
pub mod partners;
pub mod subscriptions;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    middleware::{auth::require_admin, cors::frontend_cors},
    AppState,
};

pub fn router(state: AppState) -> Router {
    let privileged = Router::new()
        .route("/api/analytics", get(analytics::overview))
        .route(
            "/api/admin/opportunities",
            post(opportunities::create_opportunity),
        )
        .route(
            "/api/admin/opportunities/:id",
            patch(opportunities::update_opportunity).delete(opportunities::deactivate_opportunity),
        )
        .route(
            "/api/admin/opportunities/:id/clicks",
            get(analytics::listing_clicks),
        )
        .route("/api/admin/partners", post(partners::create_partner))
        .route(
            "/api/admin/partners/:id",
            axum::routing::delete(partners::delete_partner),
        )
        .route(
            "/api/admin/accounts",
            get(admin::list_accounts).post(admin::create_account),
        )
        .route("/api/admin/accounts/:id", patch(admin::update_account))
        .route(
            "/api/admin/notifications/digest",
            post(admin::run_digest),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/opportunities", get(opportunities::list_opportunities))
        .route(
            "/api/opportunities/featured",
            get(opportunities::featured_opportunities),
        )
        .route("/api/opportunities/:key", get(opportunities::get_opportunity))
        .route(
            "/api/opportunities/:key/brochure",
            get(opportunities::brochure_redirect),
        )
        .route("/api/track-click", post(analytics::track_click))
        .route("/api/category-counts", get(partners::category_counts))
        .route("/api/partners", get(partners::list_partners))
        .route("/api/subscriptions", post(subscriptions::subscribe))
        .route(
            "/api/subscriptions/confirm/:token",
            get(subscriptions::confirm),
        )
        .route(
            "/api/subscriptions/unsubscribe/:token",
            get(subscriptions::unsubscribe),
        );

    public
        .merge(privileged)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(frontend_cors(&state.config.frontend_url))
        .with_state(state)
}
