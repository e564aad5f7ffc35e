//! Resource CRUD handlers. The path segment names the resource; errors render per the state's flavor.

use crate::error::AppError;
use crate::flavor::Rejection;
use crate::params::{from_query_pairs, ParamBag};
use crate::response::{success_one, success_one_ok, success_page};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

type Pairs = Query<Vec<(String, String)>>;

/// `with` / `select` lists pulled out of the query string; the rest is the listing bag.
#[derive(Debug, Default)]
struct ListArgs {
    with: Vec<String>,
    select: Vec<String>,
    rest: Vec<(String, String)>,
}

impl ListArgs {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut args = ListArgs::default();
        for (k, v) in pairs {
            let list = match k.as_str() {
                "with" | "with[]" => &mut args.with,
                "select" | "select[]" => &mut args.select,
                _ => {
                    args.rest.push((k, v));
                    continue;
                }
            };
            list.extend(v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
        }
        args
    }

    fn params(&self) -> Result<ParamBag, AppError> {
        ParamBag::from_value(&from_query_pairs(&self.rest)?)
    }
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    pub ids: Vec<Value>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(pairs): Pairs,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let args = ListArgs::from_pairs(pairs);
        let page = svc.list(&args.params()?, &args.with, &args.select).await?;
        Ok::<_, AppError>(success_page(page))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let row = svc.create(body_to_map(body)?).await?;
        Ok::<_, AppError>(success_one(row))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn read(
    State(state): State<AppState>,
    Path((resource, id_str)): Path<(String, String)>,
    Query(pairs): Pairs,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let id = svc.parse_id(&id_str)?;
        let args = ListArgs::from_pairs(pairs);
        let row = svc.get_by_id(&id, &args.with, &args.select).await?;
        Ok::<_, AppError>(success_one_ok(row))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn read_by_slug(
    State(state): State<AppState>,
    Path((resource, slug)): Path<(String, String)>,
    Query(pairs): Pairs,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let args = ListArgs::from_pairs(pairs);
        let row = svc.get_by_slug(&slug, &args.with, &args.select).await?;
        Ok::<_, AppError>(success_one_ok(row))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn update(
    State(state): State<AppState>,
    Path((resource, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let id = svc.parse_id(&id_str)?;
        let row = svc.update(&id, body_to_map(body)?).await?;
        Ok::<_, AppError>(success_one_ok(row))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let id = svc.parse_id(&id_str)?;
        let row = svc.delete(&id).await?;
        Ok::<_, AppError>(success_one_ok(row))
    };
    run.await.map_err(|e| state.reject(e))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<BulkDeleteBody>,
) -> Result<impl IntoResponse, Rejection> {
    let run = async {
        let svc = state.service(&resource)?;
        let ids = body
            .ids
            .iter()
            .map(|v| svc.coerce_id(v))
            .collect::<Result<Vec<_>, _>>()?;
        let deleted = svc.bulk_delete(&ids).await?;
        Ok::<_, AppError>(success_one_ok(serde_json::json!({ "deleted": deleted })))
    };
    run.await.map_err(|e| state.reject(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn with_and_select_are_split_out() {
        let args = ListArgs::from_pairs(pairs(&[
            ("with", "author, comments"),
            ("select", "id,title"),
            ("with[]", "tags"),
            ("filters[status]", "active"),
            ("page", "2"),
        ]));
        assert_eq!(args.with, vec!["author", "comments", "tags"]);
        assert_eq!(args.select, vec!["id", "title"]);
        let params = args.params().unwrap();
        assert_eq!(params.page, Some(2));
        assert!(!params.filters.is_empty());
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(matches!(body_to_map(serde_json::json!([1])), Err(AppError::BadRequest(_))));
    }
}
