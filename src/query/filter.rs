//! Filter compiler: turns a parsed `FilterTree` into predicates on a `SelectQuery`.

use crate::config::{ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::params::{FilterEntry, FilterTree, FilterValue, Segment};
use crate::query::date::format_date;
use crate::query::{Clause, ConditionOp, DateBound, Joiner, Predicate, SelectQuery, Trashed};
use serde_json::Value;

pub struct FilterCompiler<'a> {
    model: &'a ResolvedModel,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(model: &'a ResolvedModel) -> Self {
        FilterCompiler { model }
    }

    /// Compile `filters` into one group conjoined with the query's existing predicates.
    pub fn compile(
        &self,
        resource: &ResolvedResource,
        query: &mut SelectQuery,
        filters: &FilterTree,
    ) -> Result<(), AppError> {
        let mut clause = Clause::default();

        if let Some(from) = &filters.from {
            clause.and(Predicate::Date {
                column: resource.timestamp_column.clone(),
                bound: DateBound::From,
                date: format_date(from)?,
            });
        }
        if let Some(to) = &filters.to {
            clause.and(Predicate::Date {
                column: resource.timestamp_column.clone(),
                bound: DateBound::To,
                date: format_date(to)?,
            });
        }

        if filters.trashed {
            if resource.soft_delete_column.is_none() {
                return Err(AppError::BadRequest(format!(
                    "{} does not keep trashed records",
                    resource.name
                )));
            }
            query.trashed = Trashed::Only;
        }

        for entry in &filters.entries {
            self.apply_entry(resource, &mut clause, entry, Joiner::And)?;
        }

        tracing::debug!(resource = %resource.name, predicates = clause.entries.len(), "compiled filters");
        query.clause.push_group(Joiner::And, clause);
        Ok(())
    }

    fn apply_entry(
        &self,
        resource: &ResolvedResource,
        clause: &mut Clause,
        entry: &FilterEntry,
        boolean: Joiner,
    ) -> Result<(), AppError> {
        match entry {
            FilterEntry::OrGroup(entries) => {
                let mut group = Clause::default();
                for e in entries {
                    self.apply_entry(resource, &mut group, e, Joiner::Or)?;
                }
                clause.push_group(Joiner::And, group);
                Ok(())
            }
            FilterEntry::Condition { key, value } if key.relations.is_empty() => {
                apply_where_condition(resource, clause, &key.column, value, boolean)
            }
            FilterEntry::Condition { key, value } => {
                self.apply_where_has_condition(resource, clause, &key.relations, &key.column, value, boolean)
            }
        }
    }

    /// Existence (or non-existence) of the first relation, with the rest of the path scoped inside it.
    fn apply_where_has_condition(
        &self,
        resource: &ResolvedResource,
        clause: &mut Clause,
        relations: &[Segment],
        column: &Segment,
        value: &FilterValue,
        boolean: Joiner,
    ) -> Result<(), AppError> {
        let Some((relation, rest)) = relations.split_first() else {
            return apply_where_condition(resource, clause, column, value, boolean);
        };
        let (_, target) = self.model.related(resource, &relation.name)?;

        let mut inner = Clause::default();
        if rest.is_empty() {
            apply_where_condition(target, &mut inner, column, value, Joiner::And)?;
        } else {
            self.apply_where_has_condition(target, &mut inner, rest, column, value, Joiner::And)?;
        }

        let joiner = if relation.disjoin { Joiner::Or } else { boolean };
        clause.push(
            joiner,
            Predicate::Exists {
                relation: relation.name.clone(),
                negated: relation.negated,
                clause: inner,
            },
        );
        Ok(())
    }
}

/// Equality, membership or date range on one column of `resource`.
fn apply_where_condition(
    resource: &ResolvedResource,
    clause: &mut Clause,
    column: &Segment,
    value: &FilterValue,
    boolean: Joiner,
) -> Result<(), AppError> {
    let name = resource.require_column(&column.name)?.name.clone();
    let joiner = if column.disjoin { Joiner::Or } else { boolean };

    let op = match value {
        FilterValue::Range { from, to } => {
            if column.negated {
                return Err(AppError::BadRequest(format!(
                    "date range on '{}' cannot be negated",
                    name
                )));
            }
            let range = date_range(&name, from.as_deref(), to.as_deref())?;
            match joiner {
                Joiner::And => clause.entries.extend(range.entries),
                Joiner::Or => clause.push_group(Joiner::Or, range),
            }
            return Ok(());
        }
        FilterValue::List(items) => ConditionOp::for_value(&Value::Array(items.clone()), column.negated),
        FilterValue::Scalar(v) => ConditionOp::for_value(v, column.negated),
    };
    clause.push(joiner, Predicate::Condition { column: name, op });
    Ok(())
}

fn date_range(column: &str, from: Option<&str>, to: Option<&str>) -> Result<Clause, AppError> {
    let mut range = Clause::default();
    for (raw, bound) in [(from, DateBound::From), (to, DateBound::To)] {
        if let Some(raw) = raw {
            range.and(Predicate::Date {
                column: column.to_string(),
                bound,
                date: format_date(raw)?,
            });
        }
    }
    Ok(range)
}
