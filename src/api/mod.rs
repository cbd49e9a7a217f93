use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Public router: feature submission/listing, voting, the roadmap view
/// and the OAuth callback. Everything is anonymous — identity is derived
/// from request metadata, never from credentials.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/feature",
            get(handlers::list_features).post(handlers::submit_feature),
        )
        .route("/api/feature/:uuid/vote", post(handlers::record_vote))
        .route("/api/roadmap", get(handlers::get_roadmap))
        .route("/oauth/callback", get(handlers::oauth_callback))
        // The roadmap is embedded by third-party pages; serve it (and the
        // rest of the public surface) with an open CORS policy.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
