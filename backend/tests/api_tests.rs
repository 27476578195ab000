//! Integration tests for the REST read API
//!
//! Each test builds the full router over a seeded in-memory database and
//! drives it with `oneshot` requests.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use learnhub::api::auth::issue_token;
use learnhub::config::Config;
use learnhub::db::{Database, seed};
use learnhub::{AppState, build_app};

const SECRET: &str = "integration-secret";

async fn app() -> Router {
    let db = Database::in_memory().await.unwrap();
    seed::seed_demo_data(db.pool()).await.unwrap();
    let config = Config {
        jwt_secret: Some(SECRET.to_string()),
        ..Config::default()
    };
    build_app(AppState::new(config, db))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app().await, request).await
}

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_healthz() {
    let (status, body) = get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readyz() {
    let (status, body) = get("/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ready": true, "database": true }));
}

// ============================================================================
// List endpoints
// ============================================================================

#[tokio::test]
async fn test_list_search_and_filter() {
    let (status, body) =
        get("/api/courses?search=algo&column_filters%5Bactive%5D=1").await;
    assert_eq!(status, StatusCode::OK);
    // newest first
    assert_eq!(ids(&body), vec![3, 1]);
    assert_eq!(
        body["meta"],
        json!({ "total": 2, "current_page": 1, "per_page": 10, "last_page": 1 })
    );
}

#[tokio::test]
async fn test_list_page_size_all() {
    let (_, body) = get("/api/courses?page_size=all&sort_by=id,asc").await;
    assert_eq!(ids(&body), vec![1, 2, 3]);
    assert_eq!(
        body["meta"],
        json!({ "total": 3, "current_page": 1, "per_page": 3, "last_page": 1 })
    );
}

#[tokio::test]
async fn test_list_clamps_oversized_pages() {
    let (_, body) = get("/api/users?page_size=100000").await;
    assert_eq!(body["meta"]["per_page"], 100);
}

#[tokio::test]
async fn test_list_ignores_unknown_parameters() {
    let (status, plain) = get("/api/schools").await;
    assert_eq!(status, StatusCode::OK);
    let (status, noisy) =
        get("/api/schools?sort_by=password,asc&relations=secrets&column_filters%5Bpassword%5D=x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&plain), ids(&noisy));
}

#[tokio::test]
async fn test_list_field_selection() {
    let (_, body) = get("/api/schools?school_resource=id,name&sort_by=id,asc").await;
    let first = body["data"][0].as_object().unwrap();
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name"]);
}

#[tokio::test]
async fn test_list_top_level_fields() {
    let (_, body) = get("/api/schools?fields=id&school_resource=id,name,address&sort_by=id,asc").await;
    assert_eq!(body["data"][0], json!({ "id": 1 }));
}

#[tokio::test]
async fn test_list_huge_page_is_empty() {
    let (status, body) = get("/api/courses?page=9223372036854775807&page_size=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["total"], 3);
}

#[tokio::test]
async fn test_list_relation_counts() {
    let (_, body) =
        get("/api/class-rooms?relations_count=students&sort_by_relation_count=students&sort_dir_relation_count=desc").await;
    assert_eq!(body["data"][0]["id"], 1);
    assert_eq!(body["data"][0]["students_count"], 2);
}

#[tokio::test]
async fn test_list_user_relation_array_filter() {
    let (_, body) = get("/api/users?roles%5B%5D=teacher").await;
    assert_eq!(ids(&body), vec![2]);
}

// ============================================================================
// Show endpoints
// ============================================================================

#[tokio::test]
async fn test_show_with_nested_relation() {
    let (status, body) =
        get("/api/courses/1?relations=classroom.school&course_resource=id,name,deletable,classroom&school_resource=name").await;
    assert_eq!(status, StatusCode::OK);

    let course = &body["data"];
    assert_eq!(course["name"], "Algorithms");
    assert_eq!(course["deletable"], false);
    assert_eq!(course["classroom"]["name"], "Class 1A");
    assert_eq!(
        course["classroom"]["school"],
        json!({ "name": "Northfield High School" })
    );
}

#[tokio::test]
async fn test_show_file_url() {
    let (_, body) = get("/api/learning-materials/1?learning_material_resource=file,file_url").await;
    assert_eq!(
        body["data"],
        json!({
            "file": "sorting.pdf",
            "file_url": "/storage/learning-materials/sorting.pdf",
        })
    );
}

#[tokio::test]
async fn test_show_not_found() {
    let (status, body) = get("/api/courses/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "course 999 not found" }));
}

// ============================================================================
// Caller context
// ============================================================================

#[tokio::test]
async fn test_student_token_limits_scores() {
    let token = issue_token(3, &["student"], SECRET, 3600).unwrap();
    let request = Request::builder()
        .uri("/api/student-scores?sort_by=id,asc")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(app().await, request).await;
    assert_eq!(ids(&body), vec![1, 2]);
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let request = Request::builder()
        .uri("/api/student-scores")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 4);
}

#[tokio::test]
async fn test_student_cannot_show_other_scores() {
    let token = issue_token(3, &["student"], SECRET, 3600).unwrap();
    let request = Request::builder()
        .uri("/api/student-scores/4")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app().await, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
