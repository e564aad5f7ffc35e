//! Listing query assembly: projection, search, filters, eager relations, order, counts and paging.

use crate::config::{ResolvedModel, ResolvedResource};
use crate::error::AppError;
use crate::flavor::Flavor;
use crate::params::ParamBag;
use crate::query::filter::FilterCompiler;
use crate::query::{Clause, Joiner, Pagination, Predicate, SelectQuery, SortDirection};

/// A listing query ready for `Store::fetch_page`.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub select: SelectQuery,
    pub pagination: Pagination,
}

pub struct QueryAssembler<'a> {
    model: &'a ResolvedModel,
    resource: &'a ResolvedResource,
    flavor: Flavor,
}

impl<'a> QueryAssembler<'a> {
    pub fn new(model: &'a ResolvedModel, resource: &'a ResolvedResource, flavor: Flavor) -> Self {
        QueryAssembler {
            model,
            resource,
            flavor,
        }
    }

    /// Unrestricted query with projection and eager relations; shared by list and single lookups.
    pub fn base(&self, with_relations: &[String], select_columns: &[String]) -> Result<SelectQuery, AppError> {
        let mut query = SelectQuery::new(self.resource.name.clone());
        for col in select_columns {
            query.columns.push(self.resource.require_column(col)?.name.clone());
        }
        for rel in with_relations {
            query.with.push(self.resource.require_relation(rel)?.name.clone());
        }
        Ok(query)
    }

    pub fn assemble(
        &self,
        params: &ParamBag,
        with_relations: &[String],
        select_columns: &[String],
    ) -> Result<ListQuery, AppError> {
        let mut query = self.base(with_relations, select_columns)?;

        if let Some(term) = params.search.as_deref().filter(|t| !t.is_empty()) {
            self.apply_search(&mut query, term)?;
        }

        if !params.filters.is_empty() {
            FilterCompiler::new(self.model).compile(self.resource, &mut query, &params.filters)?;
        }

        let pk = self.resource.primary_key.clone();
        let (key, direction) = match &params.sort {
            Some(sort) => (self.resource.require_column(&sort.key)?.name.clone(), sort.direction),
            None => (self.resource.timestamp_column.clone(), SortDirection::Desc),
        };
        let tiebreak = key != pk;
        query.order.push((key, direction));
        if tiebreak {
            query.order.push((pk, direction));
        }

        if !params.counts.is_empty() {
            let mut counts = Clause::default();
            for c in &params.counts {
                self.resource.require_relation(&c.relation)?;
                let joiner = if c.disjoin { Joiner::Or } else { Joiner::And };
                counts.push(
                    joiner,
                    Predicate::Count {
                        relation: c.relation.clone(),
                        comparator: c.comparator,
                        count: c.count,
                    },
                );
            }
            query.clause.push_group(Joiner::And, counts);
        }

        let pagination = Pagination {
            page: params.page_number(),
            per_page: params.page_size(self.flavor),
        };
        tracing::debug!(
            resource = %self.resource.name,
            page = pagination.page,
            per_page = pagination.per_page,
            "assembled listing query"
        );
        Ok(ListQuery {
            select: query,
            pagination,
        })
    }

    /// One OR group over every searchable field; dotted fields search one relation deep.
    fn apply_search(&self, query: &mut SelectQuery, term: &str) -> Result<(), AppError> {
        let mut group = Clause::default();
        for field in &self.resource.searchable {
            let predicate = match field.split_once('.') {
                Some((relation, column)) => {
                    let mut inner = Clause::default();
                    inner.and(Predicate::Contains {
                        column: column.to_string(),
                        term: term.to_string(),
                    });
                    self.resource.require_relation(relation)?;
                    Predicate::Exists {
                        relation: relation.to_string(),
                        negated: false,
                        clause: inner,
                    }
                }
                None => Predicate::Contains {
                    column: field.clone(),
                    term: term.to_string(),
                },
            };
            group.or(predicate);
        }
        query.clause.push_group(Joiner::And, group);
        Ok(())
    }
}
