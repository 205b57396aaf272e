// Route definitions

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;

// The state is provided here; the returned router needs nothing more to be served
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/search", get(api::search_listings))
        .route("/facets", get(api::get_facets))
        .route("/brands", get(api::get_brands))
        .route("/brands/active", get(api::get_active_brands))
        .route("/brands/:brand/models", get(api::get_models))
        .route("/stats", get(api::get_stats))
        .route("/options", get(api::get_options));

    Router::new()
        .route("/health", get(api::health))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
