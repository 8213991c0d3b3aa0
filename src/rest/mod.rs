//! REST API server.
//!
//! The router is the external collaborator here; the server owns the broker
//! handle, the configuration state, a map of default response headers and a
//! start timestamp captured when serving begins. Handlers return typed
//! responses rendered as indented JSON; a request method missing from a
//! route's dispatch set produces a 405 body listing the allowed methods.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use axum::routing::{get, put};
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::config::ConfigState;
use crate::types::{Error, Result};

pub mod request;
pub mod response;

mod middleware;
mod routes_core;
mod routes_queues;

use response::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) broker: Arc<Broker>,
    pub(crate) config: Arc<ConfigState>,
    pub(crate) started_at: Instant,
    pub(crate) default_headers: Arc<HashMap<String, String>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// The REST API server.
#[derive(Debug)]
pub struct RestServer {
    broker: Arc<Broker>,
    config: Arc<ConfigState>,
    default_headers: HashMap<String, String>,
}

impl RestServer {
    pub fn new(
        broker: Arc<Broker>,
        config: Arc<ConfigState>,
        default_headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            broker,
            config,
            default_headers: default_headers.unwrap_or_default(),
        }
    }

    /// Serve plaintext HTTP.
    pub async fn listen_and_serve_insecure(
        &self,
        port: u16,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.listen_and_serve(port, "", "", cancel).await
    }

    /// Serve with TLS when both key-pair paths are non-empty, plaintext
    /// otherwise.
    pub async fn listen_and_serve(
        &self,
        port: u16,
        cert_file: &str,
        key_file: &str,
        cancel: CancellationToken,
    ) -> Result<()> {
        let state = AppState {
            broker: Arc::clone(&self.broker),
            config: Arc::clone(&self.config),
            started_at: Instant::now(),
            default_headers: Arc::new(self.default_headers.clone()),
        };
        let app = router(state);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            watcher.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
        });

        let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
        if cert_file.is_empty() || key_file.is_empty() {
            tracing::info!("starting Yambol REST API with http (insecure) at [{}]", port);
            axum_server::bind(addr)
                .handle(handle)
                .serve(make_service)
                .await?;
        } else {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_file, key_file)
                .await
                .map_err(|e| {
                    Error::config(format!("failed to load TLS key pair: {}", e))
                })?;
            tracing::info!("starting Yambol REST API with https (secure) at [{}]", port);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(make_service)
                .await?;
        }
        Ok(())
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(routes_core::home).fallback(home_method_not_allowed),
        )
        .route(
            "/stats",
            get(routes_core::stats).fallback(stats_method_not_allowed),
        )
        .route(
            "/queues",
            get(routes_queues::get_queues)
                .post(routes_queues::create_queue)
                .fallback(queues_method_not_allowed),
        )
        .route(
            "/queues/{name}",
            get(routes_queues::consume_queue)
                .post(routes_queues::publish_queue)
                .delete(routes_queues::delete_queue)
                .fallback(queue_method_not_allowed),
        )
        .route(
            "/running_config",
            get(routes_core::get_running_config)
                .post(routes_core::set_running_config)
                .fallback(running_config_method_not_allowed),
        )
        .route(
            "/startup_config",
            get(routes_core::get_startup_config).fallback(startup_config_method_not_allowed),
        )
        .route(
            "/running_config/save",
            put(routes_core::save_running_config).fallback(save_method_not_allowed),
        )
        .layer(axum::middleware::from_fn(middleware::debug_print))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::apply_default_headers,
        ))
        .with_state(state)
}

fn method_not_allowed(method: &Method, allowed: &[&str]) -> ApiError {
    ApiError::from_error(&Error::MethodNotAllowed {
        method: method.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    })
}

async fn home_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET"])
}

async fn stats_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET"])
}

async fn queues_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET", "POST"])
}

async fn queue_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET", "POST", "DELETE"])
}

async fn running_config_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET", "POST"])
}

async fn startup_config_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["GET"])
}

async fn save_method_not_allowed(method: Method) -> ApiError {
    method_not_allowed(&method, &["PUT"])
}
