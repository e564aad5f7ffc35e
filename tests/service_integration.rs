mod common;

use resource_kit::params::from_query_pairs;
use resource_kit::{AppError, Flavor, ParamBag, ResourceService, Store};
use serde_json::{json, Value};
use std::sync::Arc;

async fn service(resource: &str, flavor: Flavor) -> ResourceService {
    let model = common::model();
    let store: Arc<dyn Store> = Arc::new(common::seeded_store(model.clone()).await);
    ResourceService::new(store, model, resource, flavor).unwrap()
}

fn names(items: &[Value]) -> Vec<&str> {
    items.iter().map(|r| r["name"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn web_listing_searches_filters_sorts_and_pages() {
    let svc = service("users", Flavor::Web).await;
    let params = ParamBag::from_value(&json!({
        "search": "alice",
        "filters": {"status": "active"},
        "sort": {"key": "name", "value": "asc"},
        "page": 2,
        "limit": 5,
        "per_page": 50
    }))
    .unwrap();
    let page = svc.list(&params, &[], &[]).await.unwrap();
    assert_eq!(page.total, 9);
    assert_eq!(page.per_page, 5);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page, 2);
    assert_eq!(names(&page.items), vec!["Alice 22", "Alice 26", "Alice 30", "Zed"]);
    assert!(page.items.iter().all(|r| r["status"] == "active"));
}

#[tokio::test]
async fn api_listing_uses_per_page() {
    let svc = service("users", Flavor::Api).await;
    let params = ParamBag::from_value(&json!({"limit": 5, "per_page": 7})).unwrap();
    let page = svc.list(&params, &[], &[]).await.unwrap();
    assert_eq!(page.items.len(), 7);
    assert_eq!(page.total, 31);
    // newest first by default; a missing timestamp sorts first under DESC
    assert_eq!(page.items[0]["id"], 31);
    assert_eq!(page.items[1]["id"], 30);
}

#[tokio::test]
async fn bracket_query_matches_json_bag() {
    let pairs: Vec<(String, String)> = [
        ("search", "alice"),
        ("filters[status]", "active"),
        ("filters[not:id][]", "2"),
        ("filters[not:id][]", "6"),
        ("sort[key]", "name"),
        ("sort[value]", "asc"),
        ("page", "2"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let from_query = ParamBag::from_value(&from_query_pairs(&pairs).unwrap()).unwrap();
    let from_json = ParamBag::from_value(&json!({
        "search": "alice",
        "filters": {"status": "active", "not:id": ["2", "6"]},
        "sort": {"key": "name", "value": "asc"},
        "page": "2"
    }))
    .unwrap();
    assert_eq!(from_query, from_json);
}

#[tokio::test]
async fn relation_search_and_eager_loading() {
    let svc = service("posts", Flavor::Api).await;
    let params = ParamBag::from_value(&json!({"search": "alice 02", "sort": {"key": "id", "value": "asc"}})).unwrap();
    let page = svc.list(&params, &["author".into()], &["id".into(), "title".into()]).await.unwrap();
    let ids: Vec<i64> = page.items.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(page.items[0]["author"]["name"], "Alice 02");
    assert!(page.items[0].get("slug").is_none());
}

#[tokio::test]
async fn missing_ids_and_bulk_delete() {
    let svc = service("users", Flavor::Api).await;
    assert!(matches!(svc.get_by_id(&json!(404), &[], &[]).await, Err(AppError::NotFound(_))));
    assert!(matches!(svc.get_by_id(&json!(32), &[], &[]).await, Err(AppError::NotFound(_))));

    let deleted = svc.bulk_delete(&[json!(1), json!(2), json!(500), json!(32)]).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(matches!(svc.get_by_id(&json!(1), &[], &[]).await, Err(AppError::NotFound(_))));
    assert_eq!(svc.get_by_id(&json!(3), &[], &[]).await.unwrap()["name"], "Bob 03");
}

#[tokio::test]
async fn create_then_update_then_delete() {
    let svc = service("posts", Flavor::Web).await;
    let created = svc
        .create(json!({"author_id": 3, "title": "Fresh", "slug": "fresh", "unknown": 1}).as_object().cloned().unwrap())
        .await
        .unwrap();
    assert_eq!(created["id"], 4);
    assert!(created.get("unknown").is_none());

    let updated = svc
        .update(&json!(4), json!({"title": "Fresher"}).as_object().cloned().unwrap())
        .await
        .unwrap();
    assert_eq!(updated["title"], "Fresher");
    assert_eq!(svc.get_by_slug("fresh", &[], &[]).await.unwrap()["title"], "Fresher");

    svc.delete(&json!(4)).await.unwrap();
    assert!(matches!(svc.delete(&json!(4)).await, Err(AppError::NotFound(_))));
}
