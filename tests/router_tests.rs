// tests/router_tests.rs
//
// Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use timeline::{
    cache::MemoryCache,
    config::{CacheSettings, Config},
    create_router,
    dao::memory::MemorySource,
    models::post::Visibility,
    services::LooseService,
    state::AppState,
};
use tower::ServiceExt;

fn app() -> axum::Router {
    let source = Arc::new(MemorySource::new());
    source
        .add_user(1, "alice")
        .add_post(1, 1, Visibility::Public, "hello");

    let config = Config {
        database_url: String::new(),
        jwt_secret: "secret".to_string(),
        rust_log: "error".to_string(),
        port: 0,
        cache: CacheSettings::default(),
    };

    create_router(AppState {
        service: Arc::new(LooseService::new(
            source,
            Arc::new(MemoryCache::new(16)),
            config.cache.clone(),
        )),
        config,
    })
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn responses_are_json_envelopes() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/post?id=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let body = json_body(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["contents"][0]["content"], "hello");
    assert_eq!(body["data"]["visibility"], "public");
}

#[tokio::test]
async fn missing_required_query_is_a_client_error() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/post/comments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], 10001);
}

#[tokio::test]
async fn malformed_query_answers_with_the_error_envelope() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/posts?page=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = json_body(response).await;
    assert_eq!(body["code"], 10001);
    assert!(body["msg"].as_str().unwrap().starts_with("invalid parameters"));
}

#[tokio::test]
async fn cors_allows_the_frontend_origin() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/posts")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}
