#![allow(dead_code)]

use resource_kit::{from_json_str, resolve, MemoryStore, ResolvedModel};
use serde_json::{json, Value};
use std::sync::Arc;

pub const RESOURCES: &str = r#"{
  "resources": [
    {
      "name": "users", "table": "users", "key_type": "bigint",
      "soft_delete_column": "deleted_at",
      "columns": [{"name": "id", "type": "bigint"}, "name", "email", "status"],
      "searchable": ["name", "email"],
      "relations": [
        {"name": "posts", "resource": "posts", "kind": "has_many", "local_key": "id", "foreign_key": "author_id"}
      ]
    },
    {
      "name": "posts", "table": "posts", "slug_column": "slug",
      "columns": [{"name": "id", "type": "bigint"}, {"name": "author_id", "type": "bigint"}, "title", "slug"],
      "searchable": ["title", "author.name"],
      "relations": [
        {"name": "author", "resource": "users", "kind": "belongs_to", "local_key": "author_id", "foreign_key": "id"}
      ]
    }
  ]
}"#;

pub fn model() -> Arc<ResolvedModel> {
    Arc::new(resolve(&from_json_str(RESOURCES).unwrap()).unwrap())
}

/// Users 1..=30 alternate "Bob NN" / "Alice NN"; every fourth is inactive.
/// 31 is "Zed" with an alice address, 32 is a soft-deleted Alice.
pub fn users() -> Vec<Value> {
    let mut rows: Vec<Value> = (1..=30)
        .map(|i| {
            let name = if i % 2 == 0 { format!("Alice {:02}", i) } else { format!("Bob {:02}", i) };
            let status = if i % 4 == 0 { "inactive" } else { "active" };
            json!({
                "id": i,
                "name": name,
                "email": format!("user{}@example.com", i),
                "status": status,
                "created_at": format!("2025-01-{:02}T09:00:00Z", i),
            })
        })
        .collect();
    rows.push(json!({"id": 31, "name": "Zed", "email": "alice.z@example.com", "status": "active"}));
    rows.push(json!({
        "id": 32, "name": "Alice 99", "email": "gone@example.com", "status": "active",
        "deleted_at": "2025-02-01T00:00:00Z"
    }));
    rows
}

pub fn posts() -> Vec<Value> {
    vec![
        json!({"id": 1, "author_id": 2, "title": "Hello", "slug": "hello"}),
        json!({"id": 2, "author_id": 3, "title": "World", "slug": "world"}),
        json!({"id": 3, "author_id": 2, "title": "Again", "slug": "again"}),
    ]
}

pub async fn seeded_store(model: Arc<ResolvedModel>) -> MemoryStore {
    let store = MemoryStore::new(model);
    store.seed("users", users()).await.unwrap();
    store.seed("posts", posts()).await.unwrap();
    store
}
