//! Load resource definitions from JSON and resolve them into the runtime model.

use crate::config::resolved::{ColumnInfo, KeyType, RelationSpec, ResolvedModel, ResolvedResource};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Build resolved model from resource definitions (validates first).
pub fn resolve(config: &ResourcesConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut resources = Vec::with_capacity(config.resources.len());
    let mut resource_by_name = HashMap::new();

    for r in &config.resources {
        let mut columns: Vec<ColumnInfo> = r
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                pg_type: c.type_name().and_then(column_pg_type_name),
            })
            .collect();

        let implicit = std::iter::once(r.timestamp_column.as_str()).chain(r.soft_delete_column.as_deref());
        for name in implicit {
            if !columns.iter().any(|c| c.name == name) {
                columns.push(ColumnInfo {
                    name: name.to_string(),
                    pg_type: Some("timestamptz".into()),
                });
            }
        }

        let key_type = infer_key_type(r, &columns);
        let relations = r
            .relations
            .iter()
            .map(|rel| RelationSpec {
                name: rel.name.clone(),
                kind: rel.kind,
                related: rel.resource.clone(),
                local_key: rel.local_key.clone(),
                foreign_key: rel.foreign_key.clone(),
            })
            .collect();

        let resource = ResolvedResource {
            name: r.name.clone(),
            schema_name: r.schema.clone(),
            table_name: r.table.clone(),
            primary_key: r.primary_key.clone(),
            key_type,
            columns,
            slug_column: r.slug_column.clone(),
            timestamp_column: r.timestamp_column.clone(),
            soft_delete_column: r.soft_delete_column.clone(),
            searchable: r.searchable.clone(),
            relations,
        };
        resource_by_name.insert(r.name.clone(), resource.clone());
        resources.push(resource);
    }

    tracing::debug!(count = resources.len(), "resolved resource model");
    Ok(ResolvedModel {
        resources,
        resource_by_name,
    })
}

/// Parse resource definitions from a JSON string.
pub fn from_json_str(raw: &str) -> Result<ResourcesConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read resource definitions from a JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ResourcesConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&raw)
}

fn column_pg_type_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    if lower == "timestamptz" || lower == "timestamp with time zone" {
        Some("timestamptz".into())
    } else if lower == "timestamp" || lower.starts_with("timestamp ") {
        Some("timestamp".into())
    } else if lower == "date" {
        Some("date".into())
    } else if lower.contains("uuid") {
        Some("uuid".into())
    } else if lower == "bigint" || lower == "bigserial" || lower == "int8" {
        Some("bigint".into())
    } else if lower == "integer" || lower == "int" || lower == "serial" || lower == "int4" {
        Some("integer".into())
    } else if lower.starts_with("bool") {
        Some("boolean".into())
    } else if lower == "json" || lower == "jsonb" {
        Some("jsonb".into())
    } else if lower == "double precision" || lower == "float8" {
        Some("double precision".into())
    } else if name.contains('.') {
        // Schema-qualified custom type (e.g. blog.post_status); cast so text binds correctly
        Some(name.to_string())
    } else {
        None
    }
}

fn infer_key_type(r: &ResourceConfig, columns: &[ColumnInfo]) -> KeyType {
    let declared = r.key_type.as_deref().map(str::to_lowercase);
    let from_column = columns
        .iter()
        .find(|c| c.name == r.primary_key)
        .and_then(|c| c.pg_type.clone());
    match declared.or(from_column).as_deref() {
        Some(t) if t.contains("uuid") => KeyType::Uuid,
        Some(t) if t.contains("bigint") || t.contains("bigserial") => KeyType::BigInt,
        Some(t) if t.contains("int") || t.contains("serial") => KeyType::Int,
        _ => KeyType::Text,
    }
}
