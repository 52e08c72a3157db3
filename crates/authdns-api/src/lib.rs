//! HTTP/JSON zone management API
//!
//! Every route lives under `/zones/:name` and requires a bearer token.
//! GET fetches, PUT/POST upserts, PATCH runs the version-guarded update,
//! DELETE removes. Error distinctions surface as status codes: 401 for
//! missing/bad credentials, 400 for a bad body, 404 for absent zones,
//! 422 for schema and version violations, 500 for storage or replication
//! failures.

mod auth;
mod error;
mod handlers;

use authdns_zone::ZoneCache;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub cache: ZoneCache,
    pub token: String,
}

impl ApiState {
    pub fn new(cache: ZoneCache, token: impl Into<String>) -> Self {
        Self { cache, token: token.into() }
    }
}

/// Build the API router
///
/// The auth layer wraps the whole router, so unauthenticated requests are
/// rejected with 401 regardless of whether the path matches a route.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/zones/:name",
            get(handlers::get_zone)
                .put(handlers::upsert_zone)
                .post(handlers::upsert_zone)
                .patch(handlers::patch_zone)
                .delete(handlers::delete_zone),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
