mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use resource_kit::{common_routes, resource_routes, resource_routes_with_limit, AppState, Flavor};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app(flavor: Flavor) -> Router {
    let model = common::model();
    let store = Arc::new(common::seeded_store(model.clone()).await);
    common_routes().merge(resource_routes(AppState::new(store, model, flavor)))
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn not_found_renders_per_flavor() {
    let (status, body) = send(app(Flavor::Api).await, Method::GET, "/users/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse(&body), json!({"success": false, "message": "Resource not found"}));

    let (status, body) = send(app(Flavor::Web).await, Method::GET, "/users/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}

#[tokio::test]
async fn listing_from_bracket_query() {
    let uri = "/users?search=alice&filters%5Bstatus%5D=active&sort%5Bkey%5D=name&sort%5Bvalue%5D=asc&per_page=3&page=1";
    let (status, body) = send(app(Flavor::Api).await, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let body = parse(&body);
    assert_eq!(body["meta"], json!({"total": 9, "current_page": 1, "per_page": 3, "last_page": 3}));
    let names: Vec<&str> = body["data"].as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Alice 02", "Alice 06", "Alice 10"]);
}

#[tokio::test]
async fn invalid_dates_and_unknown_columns_are_client_errors() {
    let (status, body) = send(app(Flavor::Api).await, Method::GET, "/users?filters%5Bfrom%5D=Jan%201", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse(&body)["message"].as_str().unwrap().contains("Invalid date format"));

    let (status, _) = send(app(Flavor::Api).await, Method::GET, "/users?filters%5Bpassword%5D=x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app(Flavor::Web).await, Method::GET, "/users?page=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, "Unprocessable Entity");
}

#[tokio::test]
async fn read_with_relations_and_slug() {
    let (status, body) = send(app(Flavor::Api).await, Method::GET, "/posts/slug/hello?with=author", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = parse(&body);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["author"]["name"], "Alice 02");

    let (status, _) = send(app(Flavor::Api).await, Method::GET, "/users/slug/alice", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(Flavor::Api).await, Method::GET, "/users/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app(Flavor::Api).await, Method::GET, "/widgets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn write_routes() {
    let app = app(Flavor::Api).await;

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/posts",
        Some(json!({"author_id": 3, "title": "New", "slug": "new"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parse(&body)["data"]["id"], 4);

    let (status, body) = send(app.clone(), Method::PATCH, "/posts/4", Some(json!({"title": "Newer"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["data"]["title"], "Newer");

    let (status, _) = send(app.clone(), Method::PUT, "/posts/40", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app.clone(), Method::POST, "/posts", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app.clone(), Method::DELETE, "/posts/4", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app.clone(), Method::DELETE, "/posts/4", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/posts/bulk-delete",
        Some(json!({"ids": [1, "2", 99]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["data"], json!({"deleted": 2}));

    let (_, body) = send(app, Method::GET, "/posts", None).await;
    assert_eq!(parse(&body)["meta"]["total"], 1);
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let model = common::model();
    let store = Arc::new(common::seeded_store(model.clone()).await);
    let app = resource_routes_with_limit(AppState::new(store, model, Flavor::Api), 64);
    let big = json!({"title": "x".repeat(256)});
    let (status, _) = send(app, Method::POST, "/posts", Some(big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn health_and_version() {
    let (status, body) = send(app(Flavor::Web).await, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body), json!({"status": "ok"}));

    let (_, body) = send(app(Flavor::Web).await, Method::GET, "/version", None).await;
    assert_eq!(parse(&body)["name"], "resource-kit");
}
