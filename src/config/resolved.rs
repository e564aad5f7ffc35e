//! Resolved resource model: config validated and flattened for runtime use.

use crate::config::RelationKind;
use crate::error::AppError;
use std::collections::HashMap;

/// Key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding values.
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    pub kind: RelationKind,
    /// Related resource name (key into `ResolvedModel`).
    pub related: String,
    pub local_key: String,
    pub foreign_key: String,
}

impl RelationSpec {
    /// (parent column, child column) pair for the correlated join.
    pub fn join_columns(&self) -> (&str, &str) {
        (&self.local_key, &self.foreign_key)
    }

    pub fn is_many(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub primary_key: String,
    pub key_type: KeyType,
    pub columns: Vec<ColumnInfo>,
    pub slug_column: Option<String>,
    pub timestamp_column: String,
    pub soft_delete_column: Option<String>,
    pub searchable: Vec<String>,
    pub relations: Vec<RelationSpec>,
}

impl ResolvedResource {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column lookup for identifiers that arrive from a request.
    pub fn require_column(&self, name: &str) -> Result<&ColumnInfo, AppError> {
        self.column(name).ok_or_else(|| {
            AppError::BadRequest(format!("unknown column '{}' on {}", name, self.name))
        })
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn require_relation(&self, name: &str) -> Result<&RelationSpec, AppError> {
        self.relation(name).ok_or_else(|| {
            AppError::BadRequest(format!("unknown relation '{}' on {}", name, self.name))
        })
    }

    pub fn pg_type(&self, column: &str) -> Option<&str> {
        self.column(column).and_then(|c| c.pg_type.as_deref())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub resources: Vec<ResolvedResource>,
    pub resource_by_name: HashMap<String, ResolvedResource>,
}

impl ResolvedModel {
    pub fn resource(&self, name: &str) -> Option<&ResolvedResource> {
        self.resource_by_name.get(name)
    }

    pub fn require_resource(&self, name: &str) -> Result<&ResolvedResource, AppError> {
        self.resource(name)
            .ok_or_else(|| AppError::BadRequest(format!("unknown resource '{}'", name)))
    }

    /// Target resource of `relation` declared on `owner`.
    pub fn related<'m>(
        &'m self,
        owner: &'m ResolvedResource,
        relation: &str,
    ) -> Result<(&'m RelationSpec, &'m ResolvedResource), AppError> {
        let spec = owner.require_relation(relation)?;
        let target = self.require_resource(&spec.related)?;
        Ok((spec, target))
    }
}
