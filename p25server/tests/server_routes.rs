use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use p25server::Server;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_info_route() {
    let mut server = Server::new("P25Dcodr", "http://localhost:8080", 8080);
    server.add_info_route().await;

    let response = server
        .router()
        .await
        .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let info = body_json(response).await;
    assert_eq!(info["name"], "P25Dcodr");
    assert_eq!(info["http_port"], 8080);
}

#[tokio::test]
async fn test_openapi_mounting() {
    #[derive(utoipa::OpenApi)]
    #[openapi()]
    struct EmptyDoc;

    use utoipa::OpenApi;
    let mut server = Server::new("P25Dcodr", "http://localhost:8080", 8080);
    server
        .add_openapi(
            Router::new().route("/ping", get(|| async { "pong" })),
            EmptyDoc::openapi(),
            "test",
        )
        .await;
    let router = server.router().await;

    let ping = router
        .clone()
        .oneshot(Request::get("/api/test/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ping.status(), StatusCode::OK);

    let doc = router
        .oneshot(Request::get("/api-docs/test.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(doc.status(), StatusCode::OK);
    assert!(body_json(doc).await.get("openapi").is_some());
}

#[tokio::test]
async fn test_log_level_api() {
    let mut server = Server::new("P25Dcodr", "http://localhost:8080", 8080);
    server
        .init_logging(p25server::LoggingOptions {
            enable_console: false,
            ..Default::default()
        })
        .await;
    let router = server.router().await;

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/logs/log_setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"level":"debug"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["current_level"], "DEBUG");

    let invalid = router
        .oneshot(
            Request::post("/api/logs/log_setup")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"level":"loud"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}
