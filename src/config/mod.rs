pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;

/// Blog-shaped model shared by unit tests: users, companies, posts, comments.
#[cfg(test)]
pub(crate) const TEST_RESOURCES: &str = r#"{
  "resources": [
    {
      "name": "users", "table": "users", "key_type": "bigint",
      "soft_delete_column": "deleted_at",
      "columns": [
        {"name": "id", "type": "bigint"}, "name", "email", "country", "status", "role",
        {"name": "company_id", "type": "bigint"}
      ],
      "searchable": ["name", "email"],
      "relations": [
        {"name": "posts", "resource": "posts", "kind": "has_many", "local_key": "id", "foreign_key": "author_id"},
        {"name": "company", "resource": "companies", "kind": "belongs_to", "local_key": "company_id", "foreign_key": "id"}
      ]
    },
    {
      "name": "companies", "table": "companies",
      "columns": [{"name": "id", "type": "bigint"}, "name", "country"]
    },
    {
      "name": "posts", "table": "posts", "slug_column": "slug",
      "soft_delete_column": "deleted_at",
      "columns": [
        {"name": "id", "type": "bigint"}, {"name": "author_id", "type": "bigint"},
        "title", "slug", "status", {"name": "category", "type": "integer"},
        {"name": "published_on", "type": "date"}
      ],
      "searchable": ["title", "author.name"],
      "relations": [
        {"name": "author", "resource": "users", "kind": "belongs_to", "local_key": "author_id", "foreign_key": "id"},
        {"name": "comments", "resource": "comments", "kind": "has_many", "local_key": "id", "foreign_key": "post_id"}
      ]
    },
    {
      "name": "comments", "table": "comments",
      "columns": [{"name": "id", "type": "bigint"}, {"name": "post_id", "type": "bigint"}, "body", "approved"]
    }
  ]
}"#;

#[cfg(test)]
pub(crate) fn test_model() -> ResolvedModel {
    resolve(&from_json_str(TEST_RESOURCES).unwrap()).unwrap()
}
