//! Row storage behind the resource service: PostgreSQL, or an in-process store for tests and demos.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::ResolvedResource;
use crate::error::AppError;
use crate::query::{Page, Pagination, SelectQuery};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Executes query trees and writes for configured resources. Rows are JSON objects keyed by column.
#[async_trait]
pub trait Store: Send + Sync {
    /// One page of matching rows plus the total match count.
    async fn fetch_page(&self, query: &SelectQuery, pagination: Pagination) -> Result<Page<Value>, AppError>;

    async fn fetch_first(&self, query: &SelectQuery) -> Result<Option<Value>, AppError>;

    /// Inserts the configured columns present in `data`; returns the stored row.
    async fn insert(&self, resource: &ResolvedResource, data: &Map<String, Value>) -> Result<Value, AppError>;

    /// None when no live row has this id.
    async fn update(
        &self,
        resource: &ResolvedResource,
        id: &Value,
        data: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError>;

    /// Soft or hard delete by id; returns the affected row.
    async fn delete(&self, resource: &ResolvedResource, id: &Value) -> Result<Option<Value>, AppError>;

    /// Deletes every live row whose key is in `ids`; returns how many were affected.
    async fn delete_in(&self, resource: &ResolvedResource, ids: &[Value]) -> Result<u64, AppError>;
}
