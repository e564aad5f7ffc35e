//! Resource CRUD routes. Handlers resolve the resource from the first path segment.

use crate::handlers::resource::{bulk_delete, create, delete, list, read, read_by_slug, update};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Resource routes with the default 1 MiB body cap.
pub fn resource_routes(state: AppState) -> Router {
    resource_routes_with_limit(state, DEFAULT_BODY_LIMIT)
}

pub fn resource_routes_with_limit(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/:resource", get(list).post(create))
        .route("/:resource/bulk-delete", post(bulk_delete))
        .route("/:resource/slug/:slug", get(read_by_slug))
        .route(
            "/:resource/:id",
            get(read).patch(update).put(update).delete(delete),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
