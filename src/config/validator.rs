//! Config validation: referential integrity between resources, relations and columns.

use crate::config::{ResourceConfig, ResourcesConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Column names of a resource, including the timestamp and soft-delete columns added at resolve time.
pub(crate) fn column_names(resource: &ResourceConfig) -> HashSet<&str> {
    let mut names: HashSet<&str> = resource.columns.iter().map(|c| c.name()).collect();
    names.insert(resource.timestamp_column.as_str());
    if let Some(col) = &resource.soft_delete_column {
        names.insert(col.as_str());
    }
    names
}

fn require(resource: &ResourceConfig, columns: &HashSet<&str>, column: &str) -> Result<(), ConfigError> {
    if columns.contains(column) {
        Ok(())
    } else {
        Err(ConfigError::UnknownColumn {
            resource: resource.name.clone(),
            column: column.to_string(),
        })
    }
}

pub fn validate(config: &ResourcesConfig) -> Result<(), ConfigError> {
    let mut by_name: HashMap<&str, &ResourceConfig> = HashMap::new();
    for r in &config.resources {
        if by_name.insert(r.name.as_str(), r).is_some() {
            return Err(ConfigError::DuplicateResource(r.name.clone()));
        }
    }

    for r in &config.resources {
        let columns = column_names(r);
        require(r, &columns, &r.primary_key)?;
        if let Some(slug) = &r.slug_column {
            require(r, &columns, slug)?;
        }

        let mut relation_names = HashSet::new();
        for rel in &r.relations {
            if !relation_names.insert(rel.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate relation '{}' on {}",
                    rel.name, r.name
                )));
            }
            let target = by_name.get(rel.resource.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "resource",
                id: rel.resource.clone(),
            })?;
            require(r, &columns, &rel.local_key)?;
            require(target, &column_names(target), &rel.foreign_key)?;
        }

        for field in &r.searchable {
            match field.split_once('.') {
                None => require(r, &columns, field)?,
                Some((relation, column)) => {
                    let rel = r.relations.iter().find(|x| x.name == relation).ok_or_else(|| {
                        ConfigError::MissingReference {
                            kind: "relation",
                            id: format!("{}.{}", r.name, relation),
                        }
                    })?;
                    if column.contains('.') {
                        return Err(ConfigError::Validation(format!(
                            "searchable field '{}' may traverse one relation only",
                            field
                        )));
                    }
                    if let Some(target) = by_name.get(rel.resource.as_str()) {
                        require(target, &column_names(target), column)?;
                    }
                }
            }
        }
    }

    Ok(())
}
