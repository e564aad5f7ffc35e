//! Routers: resource CRUD plus health and version.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::{resource_routes, resource_routes_with_limit, DEFAULT_BODY_LIMIT};
