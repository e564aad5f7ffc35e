//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::error::AppError;
use crate::flavor::{Flavor, Rejection};
use crate::service::ResourceService;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<ResolvedModel>,
    pub flavor: Flavor,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, model: Arc<ResolvedModel>, flavor: Flavor) -> Self {
        AppState { store, model, flavor }
    }

    /// Service for the resource named by a path segment.
    pub fn service(&self, resource: &str) -> Result<ResourceService, AppError> {
        ResourceService::new(self.store.clone(), self.model.clone(), resource, self.flavor)
            .map_err(|_| AppError::NotFound(format!("unknown resource '{}'", resource)))
    }

    /// Pair an error with this state's flavor for rendering.
    pub fn reject(&self, error: AppError) -> Rejection {
        Rejection {
            flavor: self.flavor,
            error,
        }
    }
}
