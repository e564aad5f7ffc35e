//! ResourceService: list, lookups and writes for one configured resource.

use crate::config::{KeyType, ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::flavor::Flavor;
use crate::params::ParamBag;
use crate::query::{ConditionOp, Page, Predicate, QueryAssembler, SelectQuery};
use crate::store::Store;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn Store>,
    model: Arc<ResolvedModel>,
    resource: String,
    flavor: Flavor,
}

impl ResourceService {
    /// Fails with BadRequest when `resource` is not configured.
    pub fn new(
        store: Arc<dyn Store>,
        model: Arc<ResolvedModel>,
        resource: &str,
        flavor: Flavor,
    ) -> Result<Self, AppError> {
        let name = model.require_resource(resource)?.name.clone();
        Ok(ResourceService {
            store,
            model,
            resource: name,
            flavor,
        })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn resource(&self) -> Result<&ResolvedResource, AppError> {
        self.model.require_resource(&self.resource)
    }

    /// Parse an id from a path segment per the resource's key type.
    pub fn parse_id(&self, raw: &str) -> Result<Value, AppError> {
        Ok(match self.resource()?.key_type {
            KeyType::Uuid => {
                let u = uuid::Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
                Value::String(u.to_string())
            }
            KeyType::BigInt | KeyType::Int => {
                let n: i64 = raw.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
                Value::Number(n.into())
            }
            KeyType::Text => Value::String(raw.to_string()),
        })
    }

    /// Ids from a JSON body: strings are parsed like path ids, integers pass for integer keys.
    pub fn coerce_id(&self, value: &Value) -> Result<Value, AppError> {
        match value {
            Value::String(s) => self.parse_id(s),
            Value::Number(n) if n.is_i64() => match self.resource()?.key_type {
                KeyType::BigInt | KeyType::Int => Ok(value.clone()),
                KeyType::Text => Ok(Value::String(n.to_string())),
                KeyType::Uuid => Err(AppError::BadRequest("invalid uuid".into())),
            },
            _ => Err(AppError::BadRequest("invalid id".into())),
        }
    }

    fn assembler(&self) -> Result<QueryAssembler<'_>, AppError> {
        Ok(QueryAssembler::new(&self.model, self.resource()?, self.flavor))
    }

    pub async fn list(
        &self,
        params: &ParamBag,
        with_relations: &[String],
        select_columns: &[String],
    ) -> Result<Page<Value>, AppError> {
        let q = self.assembler()?.assemble(params, with_relations, select_columns)?;
        self.store.fetch_page(&q.select, q.pagination).await
    }

    async fn first_where(&self, mut query: SelectQuery, column: &str, value: &Value) -> Result<Value, AppError> {
        query.clause.and(Predicate::Condition {
            column: column.to_string(),
            op: ConditionOp::Equals(value.clone()),
        });
        self.store
            .fetch_first(&query)
            .await?
            .ok_or_else(AppError::resource_not_found)
    }

    pub async fn get_by_id(
        &self,
        id: &Value,
        with_relations: &[String],
        select_columns: &[String],
    ) -> Result<Value, AppError> {
        let query = self.assembler()?.base(with_relations, select_columns)?;
        let pk = self.resource()?.primary_key.clone();
        self.first_where(query, &pk, id).await
    }

    pub async fn get_by_slug(
        &self,
        slug: &str,
        with_relations: &[String],
        select_columns: &[String],
    ) -> Result<Value, AppError> {
        let column = self
            .resource()?
            .slug_column
            .clone()
            .ok_or_else(|| AppError::BadRequest(format!("resource '{}' has no slug column", self.resource)))?;
        let query = self.assembler()?.base(with_relations, select_columns)?;
        self.first_where(query, &column, &Value::String(slug.to_string())).await
    }

    pub async fn create(&self, data: Map<String, Value>) -> Result<Value, AppError> {
        let resource = self.resource()?;
        let row = self.store.insert(resource, &data).await?;
        tracing::debug!(resource = %resource.name, "created");
        Ok(row)
    }

    pub async fn update(&self, id: &Value, data: Map<String, Value>) -> Result<Value, AppError> {
        let resource = self.resource()?;
        self.store
            .update(resource, id, &data)
            .await?
            .ok_or_else(AppError::resource_not_found)
    }

    /// Existence is checked before deleting, so a missing id is NotFound under both flavors.
    pub async fn delete(&self, id: &Value) -> Result<Value, AppError> {
        self.get_by_id(id, &[], &[]).await?;
        let resource = self.resource()?;
        let row = self
            .store
            .delete(resource, id)
            .await?
            .ok_or_else(AppError::resource_not_found)?;
        tracing::debug!(resource = %resource.name, soft = resource.soft_delete_column.is_some(), "deleted");
        Ok(row)
    }

    /// Deletes whichever of `ids` exist; returns the affected count.
    pub async fn bulk_delete(&self, ids: &[Value]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let resource = self.resource()?;
        let n = self.store.delete_in(resource, ids).await?;
        tracing::debug!(resource = %resource.name, requested = ids.len(), deleted = n, "bulk delete");
        Ok(n)
    }
}
