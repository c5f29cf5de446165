mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{build_test_app, MACHINE};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_and_ping() {
    let app = build_test_app(Duration::ZERO);

    let (status, json) = send(&app.router, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");

    let (status, json) = send(&app.router, "GET", "/api/v1/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reply"], "pong");
    assert_eq!(json["data"]["machine_name"], MACHINE);
}

#[tokio::test]
async fn info_returns_report_and_text() {
    let app = build_test_app(Duration::ZERO);

    let (status, json) = send(&app.router, "GET", "/api/v1/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["report"]["cpu_count"], 4);
    assert!(json["data"]["text"]
        .as_str()
        .unwrap()
        .contains("CPUs:    4"));
}

#[tokio::test]
async fn observer_start_stop_cycle() {
    let app = build_test_app(Duration::ZERO);

    let (status, json) = send(&app.router, "POST", "/api/v1/observer/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["changed"], true);
    assert_eq!(json["data"]["running"], true);

    let (_, json) = send(&app.router, "POST", "/api/v1/observer/start").await;
    assert_eq!(json["data"]["changed"], false);
    assert_eq!(json["data"]["message"], "Observer is already running");

    let (_, json) = send(&app.router, "GET", "/api/v1/observer/status").await;
    assert_eq!(json["data"]["running"], true);
    assert_eq!(json["data"]["limits"], 1);
    assert!(json["data"]["text"]
        .as_str()
        .unwrap()
        .starts_with("**Observer status for** `test-box` [`running`]"));

    let (_, json) = send(&app.router, "POST", "/api/v1/observer/stop").await;
    assert_eq!(json["data"]["changed"], true);
    assert!(!app.observer.is_running());

    let (_, json) = send(&app.router, "POST", "/api/v1/observer/stop").await;
    assert_eq!(json["data"]["changed"], false);
}

#[tokio::test]
async fn repeated_command_inside_cooldown_is_rejected() {
    let app = build_test_app(Duration::from_secs(60));

    let (status, _) = send(&app.router, "POST", "/api/v1/observer/start").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app.router, "POST", "/api/v1/observer/start").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "COOLDOWN");

    // Different command, separate window.
    let (status, _) = send(&app.router, "POST", "/api/v1/observer/stop").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn badness_and_limits_reflect_evaluation() {
    let app = build_test_app(Duration::ZERO);
    app.dial.set(99.0);
    app.observer.evaluate_once().await;

    let (_, json) = send(&app.router, "GET", "/api/v1/observer/badness").await;
    assert_eq!(json["data"]["cpu"], 3);

    let (_, json) = send(&app.router, "GET", "/api/v1/observer/limits").await;
    let limit = &json["data"][0];
    assert_eq!(limit["limit_id"], "cpu");
    assert_eq!(limit["currently_exceeded"], true);
    assert_eq!(limit["notified"], true);
    assert_eq!(limit["state"], "bad_notified");
    assert_eq!(app.sink.messages().len(), 1);
}

#[tokio::test]
async fn history_endpoints() {
    let app = build_test_app(Duration::ZERO);
    for _ in 0..4 {
        app.history.sample_once().await;
    }

    let (status, json) = send(&app.router, "GET", "/api/v1/history").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["sequence_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let (_, json) = send(&app.router, "GET", "/api/v1/history/series").await;
    assert_eq!(json["data"]["sequence_ids"], serde_json::json!([1, 2, 3]));
    assert_eq!(json["data"]["series"]["load"], serde_json::json!([1.0, 2.0, 3.0]));

    let (_, json) = send(&app.router, "GET", "/api/v1/history/status").await;
    assert_eq!(json["data"]["len"], 3);
    assert_eq!(json["data"]["running"], false);

    let (_, json) = send(&app.router, "POST", "/api/v1/history/start").await;
    assert_eq!(json["data"]["changed"], true);
    let (_, json) = send(&app.router, "POST", "/api/v1/history/stop").await;
    assert_eq!(json["data"]["changed"], true);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_test_app(Duration::ZERO);
    let (status, _) = send(&app.router, "GET", "/api/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
