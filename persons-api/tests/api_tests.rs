//! Integration tests for persons-api HTTP endpoints

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    count_rows, setup_app, setup_app_with_timeout, wait_for_finished, Reply, StubClassifier,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: send a request with an optional raw body
async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = body.map(|b| b.to_string());
    send_raw(app, method, uri, body.as_deref()).await
}

async fn create(app: &Router, name: &str, surname: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": name, "surname": surname })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["id"].as_i64().expect("id in response")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "persons-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_no_api_docs_route() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    let (status, _) = send(&app, "GET", "/swagger/index.html", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_person() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    let id = create(&app, "Ivan", "Ivanov").await;
    assert!(id > 0);

    let (status, body) = send(&app, "GET", &format!("/api/v1/persons/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let person = &body["person"];
    assert_eq!(person["id"], id);
    assert_eq!(person["name"], "Ivan");
    assert_eq!(person["surname"], "Ivanov");
    assert!(person.get("patronymic").is_none());
    assert_eq!(person["age"], 18);
    assert_eq!(person["gender"], "male");
    assert_eq!(
        person["nationalize"],
        json!([
            { "country_id": "RU", "probability": 0.9 },
            { "country_id": "KZ", "probability": 0.05 }
        ])
    );
}

#[tokio::test]
async fn test_create_rejects_bad_bodies() {
    let (app, pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    let (status, body) = send_raw(&app, "POST", "/api/v1/persons", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid input parameters"));

    // Enrichment attributes cannot be supplied by the client
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": "Ivan", "surname": "Ivanov", "age": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": "I", "surname": "Ivanov" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "surname": "Ivanov" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(count_rows(&pool, "person").await, 0);
}

#[tokio::test]
async fn test_create_with_classifier_failure() {
    let classifier = Arc::new(StubClassifier::new(
        Reply::Value(18),
        Reply::Fail,
        Reply::Value(common::ivan_nationalities()),
    ));
    let (app, pool) = setup_app(classifier).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": "Ivan", "surname": "Ivanov" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "failed to enrich person (gender)" }));
    assert_eq!(count_rows(&pool, "person").await, 0);
}

#[tokio::test]
async fn test_create_past_deadline_cancels_enrichment() {
    let classifier = Arc::new(StubClassifier::new(Reply::Hang, Reply::Hang, Reply::Hang));
    let (app, pool) = setup_app_with_timeout(classifier.clone(), Duration::from_millis(100)).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": "Ivan", "surname": "Ivanov" })),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({ "error": "request timed out" }));

    wait_for_finished(&classifier, 3).await;
    assert_eq!(classifier.calls(), 3);
    assert_eq!(classifier.cancelled(), 3);
    assert_eq!(count_rows(&pool, "person").await, 0);
}

#[tokio::test]
async fn test_create_client_disconnect_cancels_enrichment() {
    let classifier = Arc::new(StubClassifier::new(
        Reply::Value(18),
        Reply::Hang,
        Reply::Hang,
    ));
    let (app, pool) = setup_app(classifier.clone()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/persons")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "name": "Ivan", "surname": "Ivanov" }).to_string()))
        .unwrap();

    // The client gives up first; the in-flight request future is dropped
    let outcome = tokio::time::timeout(Duration::from_millis(50), app.oneshot(request)).await;
    assert!(outcome.is_err(), "request should still be pending");

    wait_for_finished(&classifier, 3).await;
    assert_eq!(classifier.cancelled(), 2);
    assert_eq!(count_rows(&pool, "person").await, 0);
}

// =============================================================================
// Get
// =============================================================================

#[tokio::test]
async fn test_get_invalid_and_missing_ids() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    for uri in ["/api/v1/persons/abc", "/api/v1/persons/0", "/api/v1/persons/-3"] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body, json!({ "error": "invalid ID" }));
    }

    let (status, body) = send(&app, "GET", "/api/v1/persons/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "person doesn't exist" }));
}

// =============================================================================
// List
// =============================================================================

#[tokio::test]
async fn test_list_with_filters_and_pages() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    let mut ids = Vec::new();
    for name in ["Anna", "Boris", "Carl", "Dmitry", "Elena", "Fedor", "Galina"] {
        ids.push(create(&app, name, "Petrov").await);
    }

    // Default page size is 5
    let (status, body) = send(&app, "GET", "/api/v1/persons", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["persons"].as_array().unwrap().len(), 5);

    let (_, body) = send(&app, "GET", "/api/v1/persons?limit=5&page=2", None).await;
    let page_two: Vec<i64> = body["persons"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(page_two, ids[5..7]);

    let (_, body) = send(&app, "GET", "/api/v1/persons?name=Carl&nationalize=RU", None).await;
    let persons = body["persons"].as_array().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0]["id"], ids[2]);
    assert_eq!(persons[0]["nationalize"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, "GET", "/api/v1/persons?age=18&gender=male&limit=100", None).await;
    assert_eq!(body["persons"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_list_no_match_is_empty() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;
    create(&app, "Ivan", "Ivanov").await;

    let (status, body) = send(&app, "GET", "/api/v1/persons?gender=female", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "persons": [] }));
}

#[tokio::test]
async fn test_list_rejects_bad_query_values() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;

    for uri in [
        "/api/v1/persons?age=old",
        "/api/v1/persons?gender=robot",
        "/api/v1/persons?limit=0",
        "/api/v1/persons?limit=1000",
        "/api/v1/persons?page=0",
    ] {
        let (status, body) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string());
    }
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_person() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;
    let id = create(&app, "Ivan", "Ivanov").await;
    let uri = format!("/api/v1/persons/{}", id);

    let (status, body) = send(&app, "PATCH", &uri, Some(json!({ "surname": "Sidorov" }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "person updated successfully");

    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(body["person"]["surname"], "Sidorov");
    assert_eq!(body["person"]["name"], "Ivan");
    assert_eq!(body["person"]["age"], 18);
}

#[tokio::test]
async fn test_update_clears_patronymic() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;
    let (_, body) = send(
        &app,
        "POST",
        "/api/v1/persons",
        Some(json!({ "name": "Ivan", "surname": "Ivanov", "patronymic": "Petrovich" })),
    )
    .await;
    let uri = format!("/api/v1/persons/{}", body["id"]);

    let (_, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(body["person"]["patronymic"], "Petrovich");

    let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "patronymic": null }))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = send(&app, "GET", &uri, None).await;
    assert!(body["person"].get("patronymic").is_none());
    assert_eq!(body["person"]["surname"], "Ivanov");
}

#[tokio::test]
async fn test_update_errors() {
    let (app, _pool) = setup_app(Arc::new(StubClassifier::ivan())).await;
    let id = create(&app, "Ivan", "Ivanov").await;

    let uri = format!("/api/v1/persons/{}", id);
    let (status, _) = send(&app, "PATCH", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Age is immutable after creation
    let (status, _) = send(&app, "PATCH", &uri, Some(json!({ "age": 40 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/persons/999",
        Some(json!({ "name": "Oleg" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "person doesn't exist");

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/v1/persons/x",
        Some(json!({ "name": "Oleg" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_person() {
    let (app, pool) = setup_app(Arc::new(StubClassifier::ivan())).await;
    let id = create(&app, "Ivan", "Ivanov").await;
    let uri = format!("/api/v1/persons/{}", id);

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "person deleted successfully");

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(count_rows(&pool, "person_nationality").await, 0);
}
