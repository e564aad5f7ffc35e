//! In-process store that evaluates query trees over JSON rows with PostgreSQL's semantics:
//! AND before OR, comparisons with NULL never match, ASC puts NULLs last.

use crate::config::{KeyType, RelationSpec, ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::query::{
    Clause, ConditionOp, DateBound, Joiner, Page, Pagination, Predicate, SelectQuery, SortDirection, Trashed,
};
use crate::store::Store;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Row = Map<String, Value>;
type Tables = HashMap<String, Vec<Row>>;

pub struct MemoryStore {
    model: Arc<ResolvedModel>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(model: Arc<ResolvedModel>) -> Self {
        MemoryStore {
            model,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Appends rows as stored; configured columns missing from a row are stored as null.
    pub async fn seed(&self, resource: &str, rows: impl IntoIterator<Item = Value>) -> Result<(), AppError> {
        let res = self.model.require_resource(resource)?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(res.name.clone()).or_default();
        for row in rows {
            let Value::Object(mut row) = row else {
                return Err(AppError::BadRequest(format!("seed rows for '{}' must be objects", resource)));
            };
            for col in &res.columns {
                row.entry(col.name.clone()).or_insert(Value::Null);
            }
            table.push(row);
        }
        Ok(())
    }

    /// Every stored row, soft-deleted ones included.
    pub async fn rows(&self, resource: &str) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(resource)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn select(&self, tables: &Tables, query: &SelectQuery) -> Result<(Vec<Row>, &ResolvedResource), AppError> {
        let resource = self.model.require_resource(&query.resource)?;
        let eval = Eval {
            model: &self.model,
            tables,
        };
        let mut matched = Vec::new();
        for row in eval.rows_of(&resource.name) {
            let visible = match query.trashed {
                Trashed::Without => is_live(resource, row),
                Trashed::Only => !is_live(resource, row),
            };
            if visible && eval.clause(resource, row, &query.clause)? {
                matched.push(row.clone());
            }
        }
        matched.sort_by(|a, b| {
            for (col, dir) in &query.order {
                let ord = compare_nullable(a.get(col), b.get(col));
                let ord = match dir {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        tracing::debug!(resource = %resource.name, matched = matched.len(), "memory select");
        Ok((matched, resource))
    }

    fn project(&self, tables: &Tables, resource: &ResolvedResource, query: &SelectQuery, row: &Row) -> Result<Value, AppError> {
        let eval = Eval {
            model: &self.model,
            tables,
        };
        let mut out: Row = if query.columns.is_empty() {
            row.clone()
        } else {
            query
                .columns
                .iter()
                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                .collect()
        };
        for name in &query.with {
            let (spec, target) = self.model.related(resource, name)?;
            let related = eval.related_rows(spec, target, row);
            let value = if spec.is_many() {
                Value::Array(related.into_iter().map(|r| Value::Object(r.clone())).collect())
            } else {
                related
                    .first()
                    .map(|r| Value::Object((*r).clone()))
                    .unwrap_or(Value::Null)
            };
            out.insert(name.clone(), value);
        }
        Ok(Value::Object(out))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_page(&self, query: &SelectQuery, pagination: Pagination) -> Result<Page<Value>, AppError> {
        let tables = self.tables.read().await;
        let (matched, resource) = self.select(&tables, query)?;
        let total = matched.len() as u64;
        let items = matched
            .iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .map(|row| self.project(&tables, resource, query, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, pagination))
    }

    async fn fetch_first(&self, query: &SelectQuery) -> Result<Option<Value>, AppError> {
        let tables = self.tables.read().await;
        let (matched, resource) = self.select(&tables, query)?;
        matched
            .first()
            .map(|row| self.project(&tables, resource, query, row))
            .transpose()
    }

    async fn insert(&self, resource: &ResolvedResource, data: &Map<String, Value>) -> Result<Value, AppError> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(resource.name.clone()).or_default();
        let mut row: Row = resource
            .columns
            .iter()
            .map(|c| (c.name.clone(), data.get(&c.name).cloned().unwrap_or(Value::Null)))
            .collect();
        let pk = &resource.primary_key;
        if row.get(pk).map_or(true, Value::is_null) {
            if let Some(id) = next_key(resource, rows) {
                row.insert(pk.clone(), id);
            }
        }
        let now = Value::String(chrono::Utc::now().to_rfc3339());
        for col in [resource.timestamp_column.as_str(), "updated_at"] {
            if resource.has_column(col) && row.get(col).map_or(true, Value::is_null) {
                row.insert(col.to_string(), now.clone());
            }
        }
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        resource: &ResolvedResource,
        id: &Value,
        data: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(row) = find_live_mut(&mut tables, resource, id) else {
            return Ok(None);
        };
        let mut touched = false;
        for (k, v) in data {
            if k == &resource.primary_key || !resource.has_column(k) {
                continue;
            }
            row.insert(k.clone(), v.clone());
            touched = true;
        }
        if touched && resource.has_column("updated_at") && !data.contains_key("updated_at") {
            row.insert("updated_at".into(), Value::String(chrono::Utc::now().to_rfc3339()));
        }
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(&self, resource: &ResolvedResource, id: &Value) -> Result<Option<Value>, AppError> {
        let mut tables = self.tables.write().await;
        match &resource.soft_delete_column {
            Some(col) => Ok(find_live_mut(&mut tables, resource, id).map(|row| {
                row.insert(col.clone(), Value::String(chrono::Utc::now().to_rfc3339()));
                Value::Object(row.clone())
            })),
            None => {
                let Some(rows) = tables.get_mut(&resource.name) else {
                    return Ok(None);
                };
                let pos = rows
                    .iter()
                    .position(|r| r.get(&resource.primary_key).is_some_and(|k| loose_eq(k, id)));
                Ok(pos.map(|i| Value::Object(rows.remove(i))))
            }
        }
    }

    async fn delete_in(&self, resource: &ResolvedResource, ids: &[Value]) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(&resource.name) else {
            return Ok(0);
        };
        let pk = &resource.primary_key;
        let hit = |r: &Row| r.get(pk).is_some_and(|k| ids.iter().any(|id| loose_eq(k, id)));
        match &resource.soft_delete_column {
            Some(col) => {
                let now = Value::String(chrono::Utc::now().to_rfc3339());
                let mut n = 0;
                for row in rows.iter_mut().filter(|r| is_live(resource, r) && hit(&**r)) {
                    row.insert(col.clone(), now.clone());
                    n += 1;
                }
                Ok(n)
            }
            None => {
                let before = rows.len();
                rows.retain(|r| !hit(r));
                Ok((before - rows.len()) as u64)
            }
        }
    }
}

/// Read-only evaluation context over a snapshot of the tables.
struct Eval<'a> {
    model: &'a ResolvedModel,
    tables: &'a Tables,
}

impl<'a> Eval<'a> {
    fn rows_of(&self, resource: &str) -> &'a [Row] {
        self.tables.get(resource).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Live related rows joined to `row` through `spec`.
    fn related_rows(&self, spec: &RelationSpec, target: &ResolvedResource, row: &Row) -> Vec<&'a Row> {
        let (local, foreign) = spec.join_columns();
        let Some(key) = row.get(local).filter(|v| !v.is_null()) else {
            return Vec::new();
        };
        self.rows_of(&target.name)
            .iter()
            .filter(|child| is_live(target, child))
            .filter(|child| child.get(foreign).is_some_and(|v| loose_eq(v, key)))
            .collect()
    }

    /// OR of AND-runs; an empty clause holds.
    fn clause(&self, resource: &ResolvedResource, row: &Row, clause: &Clause) -> Result<bool, AppError> {
        let mut any = false;
        let mut run = true;
        for (i, (joiner, predicate)) in clause.entries.iter().enumerate() {
            if i > 0 && *joiner == Joiner::Or {
                any |= run;
                run = true;
            }
            if run {
                run = self.predicate(resource, row, predicate)?;
            }
        }
        Ok(any || run)
    }

    fn predicate(&self, resource: &ResolvedResource, row: &Row, predicate: &Predicate) -> Result<bool, AppError> {
        Ok(match predicate {
            Predicate::Condition { column, op } => {
                let field = row.get(column).filter(|v| !v.is_null());
                match (op, field) {
                    (ConditionOp::Equals(Value::Null), f) => f.is_none(),
                    (ConditionOp::NotEquals(Value::Null), f) => f.is_some(),
                    (ConditionOp::In(items), _) if items.is_empty() => false,
                    (ConditionOp::NotIn(items), _) if items.is_empty() => true,
                    (_, None) => false,
                    (ConditionOp::Equals(v), Some(f)) => loose_eq(f, v),
                    (ConditionOp::NotEquals(v), Some(f)) => !loose_eq(f, v),
                    (ConditionOp::In(items), Some(f)) => items.iter().any(|v| loose_eq(f, v)),
                    (ConditionOp::NotIn(items), Some(f)) => !items.iter().any(|v| loose_eq(f, v)),
                }
            }
            Predicate::Date { column, bound, date } => match row.get(column).and_then(text_of) {
                Some(text) => {
                    let day = text.get(..10).unwrap_or(&text);
                    match bound {
                        DateBound::From => day >= date.as_str(),
                        DateBound::To => day <= date.as_str(),
                    }
                }
                None => false,
            },
            Predicate::Contains { column, term } => row
                .get(column)
                .and_then(text_of)
                .is_some_and(|text| text.to_lowercase().contains(&term.to_lowercase())),
            Predicate::Exists { relation, negated, clause } => {
                let (spec, target) = self.model.related(resource, relation)?;
                let mut found = false;
                for child in self.related_rows(spec, target, row) {
                    if self.clause(target, child, clause)? {
                        found = true;
                        break;
                    }
                }
                found != *negated
            }
            Predicate::Count { relation, comparator, count } => {
                let (spec, target) = self.model.related(resource, relation)?;
                let n = self.related_rows(spec, target, row).len() as i64;
                comparator.holds(n, *count)
            }
            Predicate::Group(inner) => self.clause(resource, row, inner)?,
        })
    }
}

fn is_live(resource: &ResolvedResource, row: &Row) -> bool {
    match &resource.soft_delete_column {
        Some(col) => row.get(col).map_or(true, Value::is_null),
        None => true,
    }
}

fn find_live_mut<'t>(tables: &'t mut Tables, resource: &ResolvedResource, id: &Value) -> Option<&'t mut Row> {
    tables.get_mut(&resource.name)?.iter_mut().find(|r| {
        is_live(resource, r) && r.get(&resource.primary_key).is_some_and(|k| loose_eq(k, id))
    })
}

/// Generated key for rows inserted without one; text keys are left to the caller.
fn next_key(resource: &ResolvedResource, rows: &[Row]) -> Option<Value> {
    match resource.key_type {
        KeyType::Int | KeyType::BigInt => {
            let max = rows
                .iter()
                .filter_map(|r| r.get(&resource.primary_key))
                .filter_map(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .max()
                .unwrap_or(0);
            Some(Value::from(max + 1))
        }
        KeyType::Uuid => Some(Value::String(uuid::Uuid::new_v4().to_string())),
        KeyType::Text => None,
    }
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Equality across JSON kinds, so `1` matches `"1"` the way a cast parameter would.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => text_of(a).is_some() && text_of(a) == text_of(b),
    }
}

fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_model;
    use crate::flavor::Flavor;
    use crate::params::ParamBag;
    use crate::query::QueryAssembler;
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new(Arc::new(test_model()));
        store
            .seed(
                "users",
                vec![
                    json!({"id": 1, "name": "Alice", "status": "active", "role": "admin", "country": "US", "company_id": 1, "created_at": "2025-01-01T10:00:00Z"}),
                    json!({"id": 2, "name": "Bob", "status": "inactive", "role": "editor", "country": "DE", "created_at": "2025-01-05T10:00:00Z"}),
                    json!({"id": 3, "name": "Carol", "status": "active", "role": "editor", "country": "US", "created_at": "2025-01-09T10:00:00Z"}),
                    json!({"id": 4, "name": "Dave", "status": "active", "role": "admin", "deleted_at": "2025-01-10T00:00:00Z", "created_at": "2025-01-02T10:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        store
            .seed("companies", vec![json!({"id": 1, "name": "Acme", "country": "DE"})])
            .await
            .unwrap();
        store
            .seed(
                "posts",
                vec![
                    json!({"id": 10, "author_id": 1, "title": "Intro to Rust", "slug": "intro", "status": "published", "created_at": "2025-02-01T08:00:00Z"}),
                    json!({"id": 11, "author_id": 3, "title": "Borrowing", "slug": "borrowing", "status": "draft", "created_at": "2025-02-03T08:00:00Z"}),
                    json!({"id": 12, "author_id": 2, "title": "Async", "slug": "async", "status": "published", "created_at": "2025-02-05T08:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        store
            .seed(
                "comments",
                vec![
                    json!({"id": 100, "post_id": 10, "body": "nice"}),
                    json!({"id": 101, "post_id": 10, "body": "thanks"}),
                    json!({"id": 102, "post_id": 12, "body": "hmm"}),
                ],
            )
            .await
            .unwrap();
        store
    }

    async fn ids(store: &MemoryStore, resource: &str, params: Value) -> Vec<i64> {
        let model = test_model();
        let res = model.resource(resource).unwrap();
        let bag = ParamBag::from_value(&params).unwrap();
        let q = QueryAssembler::new(&model, res, Flavor::Api).assemble(&bag, &[], &[]).unwrap();
        let page = store.fetch_page(&q.select, q.pagination).await.unwrap();
        page.items.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn default_listing_hides_trashed_newest_first() {
        let store = seeded().await;
        assert_eq!(ids(&store, "users", json!({})).await, vec![3, 2, 1]);
        assert_eq!(ids(&store, "users", json!({"filters": {"status": "trashed"}})).await, vec![4]);
    }

    #[tokio::test]
    async fn and_binds_tighter_than_or() {
        let store = seeded().await;
        let got = ids(
            &store,
            "users",
            json!({"filters": {"country": "US", "role": "admin", "or:status": "inactive"}, "sort": {"key": "id", "value": "asc"}}),
        )
        .await;
        assert_eq!(got, vec![1, 2]);
    }

    #[tokio::test]
    async fn relation_filters_and_counts() {
        let store = seeded().await;
        assert_eq!(ids(&store, "posts", json!({"filters": {"author.country": "US"}})).await, vec![11, 10]);
        assert_eq!(ids(&store, "posts", json!({"filters": {"not:author.country": "US"}})).await, vec![12]);
        assert_eq!(ids(&store, "posts", json!({"filters": {"author.company.country": "DE"}})).await, vec![10]);
        assert_eq!(ids(&store, "posts", json!({"counts": {"comments": 2}})).await, vec![10]);
        assert_eq!(ids(&store, "posts", json!({"counts": {"comments": {"max": 0}}})).await, vec![11]);
    }

    #[tokio::test]
    async fn search_and_date_range() {
        let store = seeded().await;
        assert_eq!(ids(&store, "posts", json!({"search": "carol"})).await, vec![11]);
        assert_eq!(ids(&store, "posts", json!({"search": "RUST"})).await, vec![10]);
        assert_eq!(
            ids(&store, "posts", json!({"filters": {"from": "02-02-2025", "to": "2025/02/04"}})).await,
            vec![11]
        );
    }

    #[tokio::test]
    async fn eager_relations_and_projection() {
        let store = seeded().await;
        let model = test_model();
        let res = model.resource("posts").unwrap();
        let mut q = QueryAssembler::new(&model, res, Flavor::Api)
            .base(&["author".into(), "comments".into()], &["id".into(), "title".into()])
            .unwrap();
        q.order.push(("id".into(), SortDirection::Asc));
        let row = store.fetch_first(&q).await.unwrap().unwrap();
        assert_eq!(row["title"], "Intro to Rust");
        assert!(row.get("slug").is_none());
        assert_eq!(row["author"]["name"], "Alice");
        assert_eq!(row["comments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn writes_respect_soft_delete() {
        let store = seeded().await;
        let model = test_model();
        let users = model.resource("users").unwrap();

        let created = store
            .insert(users, json!({"name": "Eve", "bogus": 1}).as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(created["id"], 5);
        assert!(created.get("bogus").is_none());
        assert!(created["created_at"].is_string());

        let updated = store
            .update(users, &json!("5"), json!({"status": "active", "id": 99}).as_object().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["id"], 5);
        assert_eq!(updated["status"], "active");
        assert!(store.update(users, &json!(4), &Map::new()).await.unwrap().is_none());

        let deleted = store.delete(users, &json!(5)).await.unwrap().unwrap();
        assert!(deleted["deleted_at"].is_string());
        assert!(store.delete(users, &json!(5)).await.unwrap().is_none());
        assert_eq!(store.rows("users").await.len(), 5);

        assert_eq!(store.delete_in(users, &[json!(1), json!(4), json!(42)]).await.unwrap(), 1);

        let comments = model.resource("comments").unwrap();
        assert_eq!(store.delete_in(comments, &[json!(100), json!(102)]).await.unwrap(), 2);
        assert_eq!(store.rows("comments").await.len(), 1);
    }
}
