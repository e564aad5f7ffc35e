//! PostgreSQL store: renders with `sql::builder` and decodes rows to JSON.

use crate::config::{ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::query::{Page, Pagination, SelectQuery};
use crate::sql::{self, QueryBuf};
use crate::store::Store;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PgStore {
    pool: PgPool,
    model: Arc<ResolvedModel>,
}

impl PgStore {
    pub fn new(pool: PgPool, model: Arc<ResolvedModel>) -> Self {
        PgStore { pool, model }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn query_count(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "count");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let done = query.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_page(&self, query: &SelectQuery, pagination: Pagination) -> Result<Page<Value>, AppError> {
        let (page_q, count_q) = sql::select_page(&self.model, query, pagination)?;
        let total = self.query_count(&count_q).await?;
        let items = self.query_many(&page_q).await?;
        Ok(Page::new(items, total, pagination))
    }

    async fn fetch_first(&self, query: &SelectQuery) -> Result<Option<Value>, AppError> {
        let q = sql::select_first(&self.model, query)?;
        self.query_optional(&q).await
    }

    async fn insert(&self, resource: &ResolvedResource, data: &Map<String, Value>) -> Result<Value, AppError> {
        let q = sql::insert(resource, data);
        self.query_optional(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(
        &self,
        resource: &ResolvedResource,
        id: &Value,
        data: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::update(resource, id, data);
        self.query_optional(&q).await
    }

    async fn delete(&self, resource: &ResolvedResource, id: &Value) -> Result<Option<Value>, AppError> {
        let q = sql::delete(resource, id);
        self.query_optional(&q).await
    }

    async fn delete_in(&self, resource: &ResolvedResource, ids: &[Value]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let q = sql::delete_in(resource, ids);
        self.execute(&q).await
    }
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    // json / jsonb, including eager-loaded relations
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
