use super::*;
use crate::api::{handler_fn, ApiError, ApiRequest, ApiRoutes};
use crate::cluster::{StandaloneWorker, WorkerHandle};
use crate::config::ServerConfig;
use crate::core::ShutdownGate;
use crate::fault::{FaultDomain, FaultReceiver, RequestContext};
use crate::pipeline::RequestPipeline;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_config() -> ServerConfig {
    ServerConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        max_body_bytes: 1024,
    }
}

fn create_test_server() -> (ApiServer, Arc<RequestPipeline>, FaultReceiver) {
    create_test_server_with(create_test_config())
}

fn create_test_server_with(
    config: ServerConfig,
) -> (ApiServer, Arc<RequestPipeline>, FaultReceiver) {
    let gate = ShutdownGate::new();
    let (domain, faults) = FaultDomain::new("api");

    let routes = ApiRoutes::new()
        .get(
            "/attractions",
            handler_fn(|req: ApiRequest, _: RequestContext| async move {
                Ok(json!({ "lang": req.query_param("lang") }))
            }),
        )
        .post(
            "/echo",
            handler_fn(|req: ApiRequest, _: RequestContext| async move {
                match req.body {
                    Value::Null => Err(ApiError::bad_request("Body required.")),
                    body => Ok(body),
                }
            }),
        )
        .get(
            "/",
            handler_fn(|_: ApiRequest, _: RequestContext| async move {
                Ok(json!("api root"))
            }),
        )
        .get(
            "/broken",
            handler_fn(|_: ApiRequest, _: RequestContext| async move {
                let attractions: Vec<Value> = Vec::new();
                Ok(attractions[0].clone())
            }),
        );

    let pipeline = Arc::new(RequestPipeline::new(routes, domain, gate));
    let worker = Arc::new(WorkerHandle::new(Arc::new(StandaloneWorker)));
    let server = ApiServer::new(config, Arc::clone(&pipeline), worker);

    (server, pipeline, faults)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_api_requests_reach_pipeline() {
    let (server, _pipeline, _faults) = create_test_server();

    let (status, body) = send(server.router(), get("/api/attractions?lang=en")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "lang": "en" }));

    let (status, body) = send(server.router(), get("/api")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("api root"));
}

#[tokio::test]
async fn test_json_bodies() {
    let (server, _pipeline, _faults) = create_test_server();

    let (status, body) = send(server.router(), post("/api/echo", r#"{"name":"Zoo"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "Zoo" }));

    let (status, body) = send(server.router(), post("/api/echo", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body." }));

    let (status, body) = send(server.router(), post("/api/echo", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Body required." }));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (server, _pipeline, _faults) = create_test_server();
    let payload = format!(r#"{{"description":"{}"}}"#, "x".repeat(4096));

    let (status, _) = send(server.router(), post("/api/echo", &payload)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_draining_refuses_before_reading_body() {
    let (server, pipeline, _faults) = create_test_server();
    let payload = format!(r#"{{"description":"{}"}}"#, "x".repeat(4096));

    assert!(pipeline.gate().begin_draining());

    let (status, body) = send(server.router(), post("/api/echo", &payload)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "Service unavailable." }));

    let (status, _) = send(server.router(), post("/api/echo", "{not json")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_declared_length_over_limit_is_rejected() {
    let (server, _pipeline, _faults) = create_test_server();
    let request = Request::builder()
        .method("POST")
        .uri("/api/echo")
        .header(header::CONTENT_LENGTH, "4096")
        .body(Body::from("{}"))
        .unwrap();

    let (status, body) = send(server.router(), request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "error": "Payload too large." }));
}

#[tokio::test]
async fn test_api_prefix_with_trailing_slash_reaches_pipeline() {
    let (server, pipeline, _faults) = create_test_server();

    let (status, body) = send(server.router(), get("/api/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("api root"));

    let response = server.router().oneshot(get("/apiary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(pipeline.gate().begin_draining());

    let (status, body) = send(server.router(), get("/api/")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "Service unavailable." }));
}

#[tokio::test]
async fn test_unknown_api_route_and_method() {
    let (server, _pipeline, _faults) = create_test_server();

    let (status, body) = send(server.router(), get("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not found." }));

    let (status, body) = send(server.router(), post("/api/attractions", "{}")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method not allowed." }));
}

#[tokio::test]
async fn test_handler_fault_returns_generic_error() {
    let (server, pipeline, mut faults) = create_test_server();

    let (status, body) = send(server.router(), get("/api/broken")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal error." }));
    assert!(faults.try_recv().is_some());
    assert_eq!(pipeline.domain().fault_count(), 1);
}

#[tokio::test]
async fn test_draining_refuses_api_and_reports_health() {
    let (server, pipeline, _faults) = create_test_server();

    let (status, body) = send(server.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["in_flight"], 0);
    assert_eq!(body["worker"], "connected");

    assert!(pipeline.gate().begin_draining());

    let response = server
        .router()
        .oneshot(get("/api/attractions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::CONNECTION], "close");

    let (status, body) = send(server.router(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "draining");
}

#[tokio::test]
async fn test_non_api_routes_bypass_pipeline() {
    let (server, _pipeline, _faults) = create_test_server();

    let response = server.router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.router().oneshot(get("/about")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bind_spawn_and_close() {
    let (server, _pipeline, _faults) = create_test_server();

    let bound = server.bind().await.unwrap();
    let addr = bound.local_addr();
    assert_ne!(addr.port(), 0);

    let mut listener = bound.spawn();
    assert!(!listener.is_closed());

    listener.close();
    tokio::time::timeout(std::time::Duration::from_secs(5), listener.wait_closed())
        .await
        .expect("server should stop after close");

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_bind_failure_names_address() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let (server, _pipeline, _faults) = create_test_server_with(ServerConfig {
        port,
        ..create_test_config()
    });

    match server.bind().await {
        Err(crate::error::AppError::Bind { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", port))
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("second bind on the same port should fail"),
    }
}
