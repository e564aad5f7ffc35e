//! Renders query trees and writes into parameterized PostgreSQL. Identifiers come from config only, values are parameters.

use crate::config::{RelationSpec, ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::query::{Clause, ConditionOp, DateBound, Pagination, Predicate, SelectQuery, Trashed};
use crate::sql::PgBindValue;
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(resource: &ResolvedResource) -> String {
    format!("{}.{}", quoted(&resource.schema_name), quoted(&resource.table_name))
}

#[derive(Clone, Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder for a value compared with or written to `column`; cast when the column type is known.
    fn placeholder(&mut self, resource: &ResolvedResource, column: &str, v: &Value) -> String {
        match resource.pg_type(column) {
            Some(t) => format!("${}::{}", self.push_param(PgBindValue::from_json(v)), t),
            None => format!("${}", self.push_param(PgBindValue::text_from_json(v))),
        }
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

struct Renderer<'a> {
    model: &'a ResolvedModel,
    buf: QueryBuf,
    aliases: u32,
}

impl<'a> Renderer<'a> {
    fn new(model: &'a ResolvedModel) -> Self {
        Renderer {
            model,
            buf: QueryBuf::new(),
            aliases: 0,
        }
    }

    fn next_alias(&mut self) -> String {
        self.aliases += 1;
        format!("r{}", self.aliases)
    }

    /// Correlation between a parent row and related rows, plus the related soft-delete scope.
    fn relation_scope(spec: &RelationSpec, target: &ResolvedResource, parent: &str, child: &str) -> String {
        let (local, foreign) = spec.join_columns();
        let mut scope = format!("{}.{} = {}.{}", child, quoted(foreign), parent, quoted(local));
        if let Some(col) = &target.soft_delete_column {
            scope.push_str(&format!(" AND {}.{} IS NULL", child, quoted(col)));
        }
        scope
    }

    fn clause(&mut self, resource: &ResolvedResource, alias: &str, clause: &Clause) -> Result<String, AppError> {
        let mut out = String::new();
        for (i, (joiner, predicate)) in clause.entries.iter().enumerate() {
            if i > 0 {
                out.push(' ');
                out.push_str(joiner.sql());
                out.push(' ');
            }
            out.push_str(&self.predicate(resource, alias, predicate)?);
        }
        Ok(out)
    }

    fn predicate(&mut self, resource: &ResolvedResource, alias: &str, predicate: &Predicate) -> Result<String, AppError> {
        let model = self.model;
        Ok(match predicate {
            Predicate::Condition { column, op } => {
                let col = format!("{}.{}", alias, quoted(column));
                match op {
                    ConditionOp::Equals(Value::Null) => format!("{} IS NULL", col),
                    ConditionOp::NotEquals(Value::Null) => format!("{} IS NOT NULL", col),
                    ConditionOp::Equals(v) => format!("{} = {}", col, self.buf.placeholder(resource, column, v)),
                    ConditionOp::NotEquals(v) => format!("{} <> {}", col, self.buf.placeholder(resource, column, v)),
                    ConditionOp::In(items) if items.is_empty() => "1 = 0".to_string(),
                    ConditionOp::NotIn(items) if items.is_empty() => "1 = 1".to_string(),
                    ConditionOp::In(items) | ConditionOp::NotIn(items) => {
                        let placeholders: Vec<String> = items
                            .iter()
                            .map(|v| self.buf.placeholder(resource, column, v))
                            .collect();
                        let keyword = if matches!(op, ConditionOp::In(_)) { "IN" } else { "NOT IN" };
                        format!("{} {} ({})", col, keyword, placeholders.join(", "))
                    }
                }
            }
            Predicate::Date { column, bound, date } => {
                let n = self.buf.push_param(PgBindValue::String(date.clone()));
                let cmp = match bound {
                    DateBound::From => ">=",
                    DateBound::To => "<=",
                };
                format!("CAST({}.{} AS date) {} ${}::date", alias, quoted(column), cmp, n)
            }
            Predicate::Contains { column, term } => {
                let n = self.buf.push_param(PgBindValue::String(like_pattern(term)));
                format!("CAST({}.{} AS text) ILIKE ${}", alias, quoted(column), n)
            }
            Predicate::Exists { relation, negated, clause } => {
                let (spec, target) = model.related(resource, relation)?;
                let child = self.next_alias();
                let mut sub = format!(
                    "SELECT 1 FROM {} {} WHERE {}",
                    qualified_table(target),
                    child,
                    Self::relation_scope(spec, target, alias, &child)
                );
                if !clause.is_empty() {
                    sub.push_str(&format!(" AND ({})", self.clause(target, &child, clause)?));
                }
                format!("{}EXISTS ({})", if *negated { "NOT " } else { "" }, sub)
            }
            Predicate::Count { relation, comparator, count } => {
                let (spec, target) = model.related(resource, relation)?;
                let child = self.next_alias();
                let n = self.buf.push_param(PgBindValue::I64(*count));
                format!(
                    "(SELECT COUNT(*) FROM {} {} WHERE {}) {} ${}",
                    qualified_table(target),
                    child,
                    Self::relation_scope(spec, target, alias, &child),
                    comparator.sql(),
                    n
                )
            }
            Predicate::Group(inner) => format!("({})", self.clause(resource, alias, inner)?),
        })
    }

    /// " WHERE ..." for the root resource, or empty.
    fn where_clause(&mut self, resource: &ResolvedResource, query: &SelectQuery) -> Result<String, AppError> {
        let mut parts = Vec::new();
        if let Some(col) = &resource.soft_delete_column {
            let check = match query.trashed {
                Trashed::Without => "IS NULL",
                Trashed::Only => "IS NOT NULL",
            };
            parts.push(format!("{}.{} {}", MAIN_ALIAS, quoted(col), check));
        }
        if !query.clause.is_empty() {
            let rendered = self.clause(resource, MAIN_ALIAS, &query.clause)?;
            if query.clause.has_disjunction() {
                parts.push(format!("({})", rendered));
            } else {
                parts.push(rendered);
            }
        }
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        })
    }

    /// Projected columns plus one JSON sub-select per eager relation.
    fn select_list(&mut self, resource: &ResolvedResource, query: &SelectQuery) -> Result<String, AppError> {
        let model = self.model;
        let mut parts: Vec<String> = if query.columns.is_empty() {
            vec![format!("{}.*", MAIN_ALIAS)]
        } else {
            query
                .columns
                .iter()
                .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
                .collect()
        };
        for name in &query.with {
            let (spec, target) = model.related(resource, name)?;
            let child = self.next_alias();
            let scope = Self::relation_scope(spec, target, MAIN_ALIAS, &child);
            let sub = if spec.is_many() {
                format!(
                    "(SELECT COALESCE(json_agg(row_to_json({c})), '[]'::json) FROM {} {c} WHERE {})",
                    qualified_table(target),
                    scope,
                    c = child
                )
            } else {
                format!(
                    "(SELECT row_to_json({c}) FROM {} {c} WHERE {} LIMIT 1)",
                    qualified_table(target),
                    scope,
                    c = child
                )
            };
            parts.push(format!("{} AS {}", sub, quoted(name)));
        }
        Ok(parts.join(", "))
    }

    fn order_clause(query: &SelectQuery) -> String {
        if query.order.is_empty() {
            return String::new();
        }
        let keys: Vec<String> = query
            .order
            .iter()
            .map(|(col, dir)| format!("{}.{} {}", MAIN_ALIAS, quoted(col), dir.sql()))
            .collect();
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// Page query and its matching COUNT(*) query.
pub fn select_page(
    model: &ResolvedModel,
    query: &SelectQuery,
    pagination: Pagination,
) -> Result<(QueryBuf, QueryBuf), AppError> {
    let resource = model.require_resource(&query.resource)?;
    let mut r = Renderer::new(model);
    let where_sql = r.where_clause(resource, query)?;
    let from = format!("{} {}", qualified_table(resource), MAIN_ALIAS);

    let count = QueryBuf {
        sql: format!("SELECT COUNT(*) FROM {}{}", from, where_sql),
        params: r.buf.params.clone(),
    };

    let cols = r.select_list(resource, query)?;
    let per_page = i64::try_from(pagination.per_page)
        .map_err(|_| AppError::Validation("per_page is too large".into()))?;
    // offset() saturates at u64::MAX, which never fits
    let skip = i64::try_from(pagination.offset())
        .map_err(|_| AppError::Validation("page is too large".into()))?;
    let limit = r.buf.push_param(PgBindValue::I64(per_page));
    let offset = r.buf.push_param(PgBindValue::I64(skip));
    r.buf.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT ${} OFFSET ${}",
        cols,
        from,
        where_sql,
        Renderer::order_clause(query),
        limit,
        offset
    );
    Ok((r.buf, count))
}

/// First matching row (LIMIT 1).
pub fn select_first(model: &ResolvedModel, query: &SelectQuery) -> Result<QueryBuf, AppError> {
    let resource = model.require_resource(&query.resource)?;
    let mut r = Renderer::new(model);
    let where_sql = r.where_clause(resource, query)?;
    let cols = r.select_list(resource, query)?;
    r.buf.sql = format!(
        "SELECT {} FROM {} {}{}{} LIMIT 1",
        cols,
        qualified_table(resource),
        MAIN_ALIAS,
        where_sql,
        Renderer::order_clause(query)
    );
    Ok(r.buf)
}

/// INSERT of the configured columns present in `data`; unknown keys are dropped.
pub fn insert(resource: &ResolvedResource, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(resource);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in data {
        if !resource.has_column(name) {
            continue;
        }
        placeholders.push(q.placeholder(resource, name, val));
        cols.push(quoted(name));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

fn live_row_filter(resource: &ResolvedResource) -> String {
    resource
        .soft_delete_column
        .as_deref()
        .map(|c| format!(" AND {} IS NULL", quoted(c)))
        .unwrap_or_default()
}

/// UPDATE by id: SET only configured columns present in data (never the key).
/// With nothing to set, selects the row instead so callers still see it.
pub fn update(resource: &ResolvedResource, id: &Value, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(resource);
    let pk = &resource.primary_key;
    let mut sets = Vec::new();
    for (k, v) in data {
        if k == pk || !resource.has_column(k) {
            continue;
        }
        let rhs = q.placeholder(resource, k, v);
        sets.push(format!("{} = {}", quoted(k), rhs));
    }
    if sets.is_empty() {
        let ph = q.placeholder(resource, pk, id);
        q.sql = format!(
            "SELECT * FROM {} WHERE {} = {}{}",
            table,
            quoted(pk),
            ph,
            live_row_filter(resource)
        );
        return q;
    }
    if resource.has_column("updated_at") && !data.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let ph = q.placeholder(resource, pk, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}{} RETURNING *",
        table,
        sets.join(", "),
        quoted(pk),
        ph,
        live_row_filter(resource)
    );
    q
}

/// DELETE by id; soft-deleting resources stamp their delete column instead.
pub fn delete(resource: &ResolvedResource, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(resource);
    let pk = quoted(&resource.primary_key);
    let ph = q.placeholder(resource, &resource.primary_key, id);
    q.sql = match &resource.soft_delete_column {
        Some(col) => format!(
            "UPDATE {} SET {} = NOW() WHERE {} = {}{} RETURNING *",
            table,
            quoted(col),
            pk,
            ph,
            live_row_filter(resource)
        ),
        None => format!("DELETE FROM {} WHERE {} = {} RETURNING *", table, pk, ph),
    };
    q
}

/// Set-based delete of every id present; missing ids are ignored.
pub fn delete_in(resource: &ResolvedResource, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(resource);
    let pk = quoted(&resource.primary_key);
    let target = if ids.is_empty() {
        "1 = 0".to_string()
    } else {
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| q.placeholder(resource, &resource.primary_key, id))
            .collect();
        format!("{} IN ({})", pk, placeholders.join(", "))
    };
    q.sql = match &resource.soft_delete_column {
        Some(col) => format!(
            "UPDATE {} SET {} = NOW() WHERE {}{}",
            table,
            quoted(col),
            target,
            live_row_filter(resource)
        ),
        None => format!("DELETE FROM {} WHERE {}", table, target),
    };
    q
}
