//! Request/response middleware for the HTTP surfaces.
//!
//! The debug-print hook logs `remoteAddr -> method path` at entry and
//! `remoteAddr <- method path [status]` at exit. At debug level it
//! additionally echoes any JSON request body (re-serialized, pretty) and the
//! response body. Middleware failures are logged and never break the chain.

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use super::AppState;

/// Bodies larger than this are passed through without echoing.
const BODY_ECHO_LIMIT: usize = 1024 * 1024;

pub(crate) async fn debug_print(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    tracing::info!("{} -> {} {}", addr, method, path);

    let request = if tracing::enabled!(tracing::Level::DEBUG) {
        echo_request_body(request).await
    } else {
        request
    };

    let response = next.run(request).await;
    let status = response.status();

    let response = if tracing::enabled!(tracing::Level::DEBUG) {
        echo_response_body(response).await
    } else {
        response
    };

    tracing::info!("{} <- {} {} [{}]", addr, method, path, status.as_u16());
    response
}

async fn echo_request_body(request: Request) -> Request {
    let (parts, body) = request.into_parts();
    match to_bytes(body, BODY_ECHO_LIMIT).await {
        Ok(bytes) => {
            if !bytes.is_empty() {
                match serde_json::from_slice::<serde_json::Value>(&bytes) {
                    Ok(value) => tracing::debug!(
                        "request body:\n{}",
                        serde_json::to_string_pretty(&value).unwrap_or_default()
                    ),
                    Err(_) => tracing::debug!("request body: {} bytes (not json)", bytes.len()),
                }
            }
            Request::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!("failed to buffer request body for echo: {}", e);
            Request::from_parts(parts, Body::empty())
        }
    }
}

async fn echo_response_body(response: Response) -> Response {
    let (parts, body) = response.into_parts();
    match to_bytes(body, BODY_ECHO_LIMIT).await {
        Ok(bytes) => {
            if !bytes.is_empty() {
                tracing::debug!("response body:\n{}", String::from_utf8_lossy(&bytes));
            }
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!("failed to buffer response body for echo: {}", e);
            Response::from_parts(parts, Body::empty())
        }
    }
}

/// Copy the server's configured default headers onto every response.
pub(crate) async fn apply_default_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    for (key, value) in state.default_headers.iter() {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!("skipping invalid default header `{}`", key),
        }
    }
    response
}
