//! Route modules for the RDFS worker node

pub mod chunks;
pub mod health;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::state::AppState;

/// Build the full node router.
///
/// The auth middleware is a route layer, so it runs before any extractor
/// touches the request body, and unknown paths still answer 404.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config()
        .storage
        .max_body_bytes()
        .unwrap_or(usize::MAX);

    Router::new()
        .merge(health::router())
        .merge(chunks::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authorise))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
