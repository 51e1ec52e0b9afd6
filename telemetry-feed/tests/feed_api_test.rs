// Integration tests for the telemetry feed endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use telemetry_feed::{create_router, FeedState, FeedValues};
use tower::ServiceExt;

fn fixed_app() -> Router {
    create_router(Arc::new(FeedState::fixed(FeedValues {
        temperature: 21.5,
        latitude: 48.0,
        longitude: 11.0,
    })))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// GET /get-temperature returns a temperature field.
#[tokio::test]
async fn test_get_temperature() {
    let (status, json) = get_json(fixed_app(), "/get-temperature").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["temperature"], 21.5);
}

/// GET /get-location returns latitude and longitude.
#[tokio::test]
async fn test_get_location() {
    let (status, json) = get_json(fixed_app(), "/get-location").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["latitude"], 48.0);
    assert_eq!(json["longitude"], 11.0);
}

/// Walking feed stays within one step of the previous value.
#[tokio::test]
async fn test_walk_is_bounded() {
    let app = create_router(Arc::new(FeedState::new(FeedValues::default())));

    let mut previous = FeedValues::default().temperature;
    for _ in 0..20 {
        let (_, json) = get_json(app.clone(), "/get-temperature").await;
        let current = json["temperature"].as_f64().unwrap();
        assert!((current - previous).abs() <= 0.5 + f64::EPSILON);
        previous = current;
    }
}

/// Unknown paths are 404.
#[tokio::test]
async fn test_unknown_path() {
    let (status, _) = get_json(fixed_app(), "/get-humidity").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
