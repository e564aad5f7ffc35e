//! Store-neutral query tree. `sql::builder` renders it for PostgreSQL, `store::memory` evaluates it directly.

use serde::Serialize;
use serde_json::Value;

/// How a predicate combines with the one before it. The first entry's joiner is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    pub fn sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionOp {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
}

impl ConditionOp {
    /// Scalar or list comparison, negated or not.
    pub fn for_value(value: &Value, negated: bool) -> Self {
        match (value, negated) {
            (Value::Array(items), false) => ConditionOp::In(items.clone()),
            (Value::Array(items), true) => ConditionOp::NotIn(items.clone()),
            (v, false) => ConditionOp::Equals(v.clone()),
            (v, true) => ConditionOp::NotEquals(v.clone()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateBound {
    /// column >= date
    From,
    /// column <= date
    To,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountComparator {
    Gte,
    Lte,
    Eq,
}

impl CountComparator {
    pub fn sql(self) -> &'static str {
        match self {
            CountComparator::Gte => ">=",
            CountComparator::Lte => "<=",
            CountComparator::Eq => "=",
        }
    }

    pub fn holds(self, actual: i64, expected: i64) -> bool {
        match self {
            CountComparator::Gte => actual >= expected,
            CountComparator::Lte => actual <= expected,
            CountComparator::Eq => actual == expected,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Condition { column: String, op: ConditionOp },
    /// Compares the date part of `column` with a canonical `YYYY-MM-DD` date.
    Date { column: String, bound: DateBound, date: String },
    /// Case-insensitive substring match.
    Contains { column: String, term: String },
    /// Related rows exist (or not) that satisfy `clause`.
    Exists { relation: String, negated: bool, clause: Clause },
    /// Number of related rows compared with `count`.
    Count { relation: String, comparator: CountComparator, count: i64 },
    Group(Clause),
}

/// Flat list of predicates combined left to right with SQL precedence (AND binds tighter than OR).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clause {
    pub entries: Vec<(Joiner, Predicate)>,
}

impl Clause {
    pub fn push(&mut self, joiner: Joiner, predicate: Predicate) {
        self.entries.push((joiner, predicate));
    }

    pub fn and(&mut self, predicate: Predicate) {
        self.push(Joiner::And, predicate);
    }

    pub fn or(&mut self, predicate: Predicate) {
        self.push(Joiner::Or, predicate);
    }

    /// Appends `other` as one parenthesized group; no-op when it is empty.
    pub fn push_group(&mut self, joiner: Joiner, other: Clause) {
        if !other.is_empty() {
            self.push(joiner, Predicate::Group(other));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when an OR appears between top-level entries.
    pub fn has_disjunction(&self) -> bool {
        self.entries.iter().skip(1).any(|(j, _)| *j == Joiner::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Soft-delete visibility of the root resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Trashed {
    /// Soft-deleted rows are hidden (no-op for resources without a soft-delete column).
    #[default]
    Without,
    Only,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    pub resource: String,
    /// Projected columns; empty selects all.
    pub columns: Vec<String>,
    pub clause: Clause,
    pub trashed: Trashed,
    /// Relations attached to each row under their own name.
    pub with: Vec<String>,
    pub order: Vec<(String, SortDirection)>,
}

impl SelectQuery {
    pub fn new(resource: impl Into<String>) -> Self {
        SelectQuery {
            resource: resource.into(),
            columns: Vec::new(),
            clause: Clause::default(),
            trashed: Trashed::Without,
            with: Vec::new(),
            order: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of results plus the counts a paginator needs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let per_page = pagination.per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        Page {
            items,
            total,
            current_page: pagination.page,
            per_page: pagination.per_page,
            last_page,
        }
    }
}
