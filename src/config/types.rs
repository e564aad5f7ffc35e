//! Raw resource definitions as they appear in the resources JSON file.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnConfig {
    Name(String),
    Typed {
        name: String,
        #[serde(default, rename = "type")]
        type_: Option<String>,
    },
}

impl ColumnConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnConfig::Name(n) => n,
            ColumnConfig::Typed { name, .. } => name,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            ColumnConfig::Name(_) => None,
            ColumnConfig::Typed { type_, .. } => type_.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    /// Name of the related resource definition.
    pub resource: String,
    pub kind: RelationKind,
    /// Column on this resource. For belongs_to the FK, otherwise the referenced key.
    pub local_key: String,
    /// Column on the related resource. For belongs_to the referenced key, otherwise the FK.
    pub foreign_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub table: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// uuid | bigint | int | text. Used to parse ids from paths.
    #[serde(default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub slug_column: Option<String>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default)]
    pub soft_delete_column: Option<String>,
    pub columns: Vec<ColumnConfig>,
    /// Columns matched by `search`; `relation.column` searches one relation deep.
    #[serde(default)]
    pub searchable: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

fn default_schema() -> String {
    "public".into()
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_timestamp_column() -> String {
    "created_at".into()
}

/// Top-level resources file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    pub resources: Vec<ResourceConfig>,
}
