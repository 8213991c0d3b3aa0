//! Queue CRUD and message endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::types::Error;

use super::request::{is_valid_queue_name, MessageRequest, QueueCreateRequest};
use super::response::{empty_response, json_response, ApiError, QueueGetResponse};
use super::AppState;

/// `GET /queues` — per-queue stats for every registered queue.
pub(crate) async fn get_queues(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, &state.broker.stats())
}

/// `POST /queues` — create a queue.
pub(crate) async fn create_queue(
    State(state): State<AppState>,
    body: Result<Json<QueueCreateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => {
            return ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("failed to decode request body: {}", e),
            )
            .into_response()
        }
    };

    if state.broker.queue_exists(&request.name) {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("failed to create queue `{}` as it already exists", request.name),
        )
        .into_response();
    }
    if !is_valid_queue_name(&request.name) {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("the queue name `{}` is not valid", request.name),
        )
        .into_response();
    }

    if let Err(e) = state.broker.add_queue(&request.name, request.options) {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("failed to create queue `{}`: {}", request.name, e),
        )
        .into_response();
    }
    empty_response(StatusCode::CREATED)
}

/// `GET /queues/{name}` — consume the next live message. An empty queue is
/// not an error: it renders as an empty `data` field.
pub(crate) async fn consume_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if let Some(rejection) = reject_bad_name(&name) {
        return rejection.into_response();
    }
    if !state.broker.queue_exists(&name) {
        return queue_not_found(&name).into_response();
    }

    match state.broker.consume(&name) {
        Ok(data) => json_response(StatusCode::OK, &QueueGetResponse { data }),
        Err(Error::QueueEmpty) => json_response(
            StatusCode::OK,
            &QueueGetResponse {
                data: String::new(),
            },
        ),
        Err(e) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            .into_response(),
    }
}

/// `POST /queues/{name}` — publish a message.
pub(crate) async fn publish_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Response {
    if let Some(rejection) = reject_bad_name(&name) {
        return rejection.into_response();
    }
    if !state.broker.queue_exists(&name) {
        return queue_not_found(&name).into_response();
    }

    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => {
            return ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("failed to decode request body: {}", e),
            )
            .into_response()
        }
    };

    if let Err(e) =
        state
            .broker
            .publish_with_ttl(&request.message, request.ttl_duration(), &[&name])
    {
        return ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to publish message: {}", e),
        )
        .into_response();
    }
    empty_response(StatusCode::OK)
}

/// `DELETE /queues/{name}` — remove the queue and its counters.
pub(crate) async fn delete_queue(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if let Some(rejection) = reject_bad_name(&name) {
        return rejection.into_response();
    }
    match state.broker.remove_queue(&name) {
        Ok(()) => empty_response(StatusCode::OK),
        Err(Error::NotFound(_)) => queue_not_found(&name).into_response(),
        Err(e) => ApiError::from_error(&e).into_response(),
    }
}

fn queue_not_found(name: &str) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        format!("queue `{}` does not exist", name),
    )
}

/// Reserved or malformed names are a 400 before any registry lookup.
fn reject_bad_name(name: &str) -> Option<ApiError> {
    if is_valid_queue_name(name) {
        return None;
    }
    Some(ApiError::new(
        StatusCode::BAD_REQUEST,
        format!("the queue name `{}` is not valid", name),
    ))
}
