use super::http::ServerState;
use crate::api::{ApiRequest, ApiResponse, API_PREFIX};
use crate::core::ShutdownState;
use axum::{
    body::to_bytes,
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Bridge from HTTP into the request pipeline.
///
/// The shutdown phase is checked before the query string or body is
/// touched, so a draining worker answers 503 without reading the request.
pub async fn api_handler(State(state): State<ServerState>, request: Request) -> ApiResponse {
    if state.pipeline.state() != ShutdownState::Running {
        return ApiResponse::unavailable();
    }

    let (parts, body) = request.into_parts();
    let path = api_path(parts.uri.path());

    let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        Ok(Query(query)) => query,
        Err(e) => {
            debug!("Rejecting {} {}: invalid query string: {}", parts.method, path, e);
            return ApiResponse::bad_request("Invalid query string.");
        }
    };

    if declared_length(&parts.headers).is_some_and(|length| length > state.max_body_bytes) {
        return ApiResponse::payload_too_large();
    }

    let bytes = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Rejecting {} {}: body not read: {}", parts.method, path, e);
            return ApiResponse::payload_too_large();
        }
    };

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(e) => {
                debug!("Rejecting {} {}: invalid JSON body: {}", parts.method, path, e);
                return ApiResponse::bad_request("Invalid JSON body.");
            }
        }
    };

    let request = ApiRequest::new(parts.method, path)
        .with_query(query)
        .with_body(body);

    state.pipeline.handle(request).await
}

/// Everything the router did not match. `/api/` lands here too, since an
/// empty wildcard does not match `/api/*path`.
pub async fn fallback_handler(state: State<ServerState>, request: Request) -> Response {
    if is_api_path(request.uri().path()) {
        api_handler(state, request).await.into_response()
    } else {
        (StatusCode::NOT_FOUND, Html("<h1>404 - Not Found</h1>")).into_response()
    }
}

fn is_api_path(path: &str) -> bool {
    match path.strip_prefix(API_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Path below the API prefix, `/` for the prefix itself
fn api_path(path: &str) -> &str {
    match path.strip_prefix(API_PREFIX) {
        Some("") | None => "/",
        Some(path) => path,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let (shutdown_state, in_flight) = state.pipeline.gate().snapshot();
    let domain = state.pipeline.domain();

    let health_info = serde_json::json!({
        "status": shutdown_state,
        "in_flight": in_flight,
        "fault_domain": {
            "name": domain.name(),
            "faults_observed": domain.fault_count(),
        },
        "worker": state.worker.state(),
    });

    let status = if shutdown_state == ShutdownState::Running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health_info))
}

pub async fn home_handler() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Meadowlark Travel</title>
</head>
<body>
    <h1>Welcome to Meadowlark Travel</h1>
    <p>Attractions are served from <a href="/api/attractions">/api/attractions</a>.</p>
</body>
</html>
"#,
    )
}
