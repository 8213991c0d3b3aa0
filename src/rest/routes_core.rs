//! Home, stats and configuration endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::Configuration;

use super::response::{empty_response, json_response, ApiError, HomeResponse};
use super::AppState;

/// `GET /` — version and uptime.
pub(crate) async fn home(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        &HomeResponse {
            uptime: humantime::format_duration(state.started_at.elapsed()).to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}

/// `GET /stats` — every queue's counters.
pub(crate) async fn stats(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, &state.broker.stats())
}

/// `GET /running_config`.
pub(crate) async fn get_running_config(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, &state.config.running_config())
}

/// `POST /running_config` — replace the running configuration.
pub(crate) async fn set_running_config(
    State(state): State<AppState>,
    body: Result<Json<Configuration>, JsonRejection>,
) -> Response {
    let Json(config) = match body {
        Ok(body) => body,
        Err(e) => {
            return ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("failed to decode request body: {}", e),
            )
            .into_response()
        }
    };
    state.config.set_running_config(config);
    empty_response(StatusCode::OK)
}

/// `GET /startup_config` — reload and return the file contents.
pub(crate) async fn get_startup_config(State(state): State<AppState>) -> Response {
    match state.config.startup_config() {
        Ok(config) => json_response(StatusCode::OK, &config),
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ApiError::new(status, format!("failed to get startup config: {}", e))
                .into_response()
        }
    }
}

/// `PUT /running_config/save` — persist running → startup.
pub(crate) async fn save_running_config(State(state): State<AppState>) -> Response {
    if let Err(e) = state.config.copy_running_config_to_startup_config() {
        return ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to copy running config to startup config: {}", e),
        )
        .into_response();
    }
    json_response(StatusCode::OK, &state.config.running_config())
}
