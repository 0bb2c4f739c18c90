use super::*;
use crate::api::{handler_fn, ApiError, ApiRequest, ApiResponse, ApiRoutes};
use crate::core::{ShutdownGate, ShutdownState};
use crate::fault::{FaultDomain, FaultOrigin, FaultReceiver, RequestContext};
use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn create_test_pipeline(calls: Arc<AtomicUsize>) -> (RequestPipeline, FaultReceiver) {
    let gate = ShutdownGate::new();
    let (domain, faults) = FaultDomain::new("api");

    let counted = Arc::clone(&calls);
    let routes = ApiRoutes::new()
        .get(
            "/attractions",
            handler_fn(move |_: ApiRequest, _: RequestContext| {
                counted.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!([{ "name": "Multnomah Falls" }])) }
            }),
        )
        .get(
            "/attraction/:id",
            handler_fn(|req: ApiRequest, _: RequestContext| async move {
                match req.param("id") {
                    Some("1") => Ok(json!({ "id": 1 })),
                    _ => Err(ApiError::not_found("No such attraction.")),
                }
            }),
        )
        .get(
            "/slow",
            handler_fn(|_: ApiRequest, _: RequestContext| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!("done"))
            }),
        )
        .get(
            "/broken",
            handler_fn(|_: ApiRequest, _: RequestContext| async move {
                tokio::task::yield_now().await;
                let missing: Option<u32> = None;
                Ok(json!(missing.expect("attraction lookup returned nothing")))
            }),
        );

    (RequestPipeline::new(routes, domain, gate), faults)
}

#[tokio::test]
async fn test_dispatches_to_matching_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _faults) = create_test_pipeline(Arc::clone(&calls));

    let response = pipeline
        .handle(ApiRequest::new(Method::GET, "/attractions"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!([{ "name": "Multnomah Falls" }]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_route_params_and_declared_errors() {
    let (pipeline, mut faults) = create_test_pipeline(Arc::new(AtomicUsize::new(0)));

    let found = pipeline
        .handle(ApiRequest::new(Method::GET, "/attraction/1"))
        .await;
    assert_eq!(found.body, json!({ "id": 1 }));

    let missing = pipeline
        .handle(ApiRequest::new(Method::GET, "/attraction/9"))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body, json!({ "error": "No such attraction." }));
    assert!(faults.try_recv().is_none());
}

#[tokio::test]
async fn test_unknown_routes_do_not_reach_handlers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _faults) = create_test_pipeline(Arc::clone(&calls));

    let response = pipeline.handle(ApiRequest::new(Method::GET, "/nowhere")).await;
    assert_eq!(response, ApiResponse::not_found());

    let response = pipeline
        .handle(ApiRequest::new(Method::POST, "/attractions"))
        .await;
    assert_eq!(response, ApiResponse::method_not_allowed());

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_fault_yields_generic_error_and_notification() {
    let (pipeline, mut faults) = create_test_pipeline(Arc::new(AtomicUsize::new(0)));

    let response = pipeline.handle(ApiRequest::new(Method::GET, "/broken")).await;

    assert_eq!(response, ApiResponse::internal_error());
    let fault = faults.try_recv().expect("fault notification");
    assert_eq!(fault.origin, FaultOrigin::Handler);
    assert_eq!(fault.request.as_deref(), Some("GET /broken"));
    assert_eq!(pipeline.domain().fault_count(), 1);

    // The pipeline keeps serving; escalation is the supervisor's decision
    let response = pipeline
        .handle(ApiRequest::new(Method::GET, "/attractions"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refuses_new_requests_once_draining() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (pipeline, _faults) = create_test_pipeline(Arc::clone(&calls));

    assert!(pipeline.gate().begin_draining());
    assert_eq!(pipeline.state(), ShutdownState::Draining);

    let response = pipeline
        .handle(ApiRequest::new(Method::GET, "/attractions"))
        .await;

    assert_eq!(response, ApiResponse::unavailable());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Unknown routes are refused the same way
    let response = pipeline.handle(ApiRequest::new(Method::GET, "/nowhere")).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_in_flight_request_completes_during_drain() {
    let (pipeline, _faults) = create_test_pipeline(Arc::new(AtomicUsize::new(0)));
    let pipeline = Arc::new(pipeline);

    let slow = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.handle(ApiRequest::new(Method::GET, "/slow")).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pipeline.gate().in_flight(), 1);
    assert!(pipeline.gate().begin_draining());

    let refused = pipeline
        .handle(ApiRequest::new(Method::GET, "/attractions"))
        .await;
    assert_eq!(refused.status, StatusCode::SERVICE_UNAVAILABLE);

    let response = slow.await.unwrap();
    assert_eq!(response.body, json!("done"));
    assert_eq!(pipeline.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_handler() {
    let (pipeline, _faults) = create_test_pipeline(Arc::new(AtomicUsize::new(0)));
    let pipeline = Arc::new(pipeline);

    let caller = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.handle(ApiRequest::new(Method::GET, "/slow")).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.abort();
    let _ = caller.await;

    // The handler still owns its slot until it finishes on its own
    assert_eq!(pipeline.gate().in_flight(), 1);
    tokio::time::timeout(Duration::from_secs(1), pipeline.gate().drained())
        .await
        .expect("handler should run to completion");
}
