//! roadmap-api — public feature-voting roadmap backend.
//!
//! Visitors submit feature requests and vote on existing ones (once per
//! pseudonymous identity). The record of truth is a shared spreadsheet;
//! Redis mirrors recent votes and the OAuth tokens used to write to it.

use std::sync::Arc;

use axum::{routing::get, Router};

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod roadmap;
pub mod store;

use cache::KvStore;
use config::Config;
use store::SheetStore;

/// Shared application state passed to handlers. No request-scoped state
/// survives between requests except what is externalized to the cache.
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub sheet: SheetStore,
    pub config: Config,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>, config: Config) -> Self {
        let sheet = SheetStore::new(
            config.sheets_api_base.clone(),
            config.sheets_csv_base.clone(),
            config.spreadsheet_id.clone(),
        );
        Self { kv, sheet, config }
    }
}

/// Full application router, shared by the binary and integration tests.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(api::api_router())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// Middleware: injects a unique X-Request-Id into every response so
/// clients can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
