//! HTML frontend server.
//!
//! Renders the home and queues pages from embedded minijinja templates and
//! serves the stylesheet from an embedded asset. A failed template render
//! falls back to the error page, and failing even that, to a plaintext body.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use minijinja::{context, Environment};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::types::{Error, Result};

const HOME_TEMPLATE: &str = include_str!("../../templates/home.html");
const QUEUES_TEMPLATE: &str = include_str!("../../templates/queues.html");
const ERROR_TEMPLATE: &str = include_str!("../../templates/error.html");
const STYLESHEET: &str = include_str!("../../static/style.css");

#[derive(Clone)]
struct FrontendState {
    broker: Arc<Broker>,
    started_at: Instant,
    env: Arc<Environment<'static>>,
    default_headers: Arc<HashMap<String, String>>,
}

impl std::fmt::Debug for FrontendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendState")
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// The HTML frontend server.
#[derive(Debug)]
pub struct FrontendServer {
    broker: Arc<Broker>,
    default_headers: HashMap<String, String>,
    env: Arc<Environment<'static>>,
}

impl FrontendServer {
    pub fn new(
        broker: Arc<Broker>,
        default_headers: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("home", HOME_TEMPLATE),
            ("queues", QUEUES_TEMPLATE),
            ("error", ERROR_TEMPLATE),
        ] {
            env.add_template(name, source)
                .map_err(|e| Error::internal(format!("bad template `{}`: {}", name, e)))?;
        }
        Ok(Self {
            broker,
            default_headers: default_headers.unwrap_or_default(),
            env: Arc::new(env),
        })
    }

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
        let state = FrontendState {
            broker: Arc::clone(&self.broker),
            started_at: Instant::now(),
            env: Arc::clone(&self.env),
            default_headers: Arc::new(self.default_headers.clone()),
        };
        let app = Router::new()
            .route("/", get(home))
            .route("/queues", get(queues))
            .route("/static/style.css", get(stylesheet))
            .with_state(state);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            watcher.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
        });

        if cert_file.is_empty() || key_file.is_empty() {
            tracing::info!("starting Yambol frontend with http (insecure) at [{}]", port);
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        } else {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_file, key_file)
                .await
                .map_err(|e| {
                    Error::config(format!("failed to load TLS key pair: {}", e))
                })?;
            tracing::info!("starting Yambol frontend with https (secure) at [{}]", port);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct QueueRow {
    name: String,
    processed: u64,
    dropped: u64,
    total_time_in_queue_ms: u64,
    max_time_in_queue_ms: u64,
    average_time_in_queue_ms: u64,
}

async fn home(State(state): State<FrontendState>) -> Response {
    let page = render_page(
        &state.env,
        "home",
        context! {
            version => env!("CARGO_PKG_VERSION"),
            uptime => humantime::format_duration(state.started_at.elapsed()).to_string(),
        },
    );
    with_default_headers(page, &state.default_headers)
}

async fn queues(State(state): State<FrontendState>) -> Response {
    let mut rows: Vec<QueueRow> = state
        .broker
        .stats()
        .into_iter()
        .map(|(name, snap)| QueueRow {
            name,
            processed: snap.processed,
            dropped: snap.dropped,
            total_time_in_queue_ms: snap.total_time_in_queue_ms,
            max_time_in_queue_ms: snap.max_time_in_queue_ms,
            average_time_in_queue_ms: snap.average_time_in_queue_ms,
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    let page = render_page(&state.env, "queues", context! { queues => rows });
    with_default_headers(page, &state.default_headers)
}

async fn stylesheet() -> Response {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET).into_response()
}

fn render_page(env: &Environment<'_>, name: &str, ctx: minijinja::Value) -> Response {
    match env.get_template(name).and_then(|t| t.render(ctx)) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("failed to render `{}` template: {}", name, e);
            render_error_page(env, format!("failed to render page: {}", e))
        }
    }
}

fn render_error_page(env: &Environment<'_>, message: String) -> Response {
    match env
        .get_template("error")
        .and_then(|t| t.render(context! { error => message.clone() }))
    {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
        // Best effort: the error page itself failed, write plain text.
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, message).into_response(),
    }
}

fn with_default_headers(mut response: Response, headers: &HashMap<String, String>) -> Response {
    for (key, value) in headers {
        match (
            axum::http::HeaderName::from_bytes(key.as_bytes()),
            axum::http::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!("skipping invalid default header `{}`", key),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigState, Configuration};
    use tempfile::TempDir;

    fn test_env() -> Arc<Environment<'static>> {
        let dir = TempDir::new().unwrap();
        let mut cfg = Configuration::default();
        cfg.disable_auto_save = true;
        let state = Arc::new(ConfigState::new(cfg, dir.path().join("config.json")));
        let broker = Arc::new(Broker::new(state));
        FrontendServer::new(broker, None).unwrap().env
    }

    #[test]
    fn test_home_template_renders() {
        let env = test_env();
        let html = env
            .get_template("home")
            .unwrap()
            .render(context! { version => "0.1.0", uptime => "5s" })
            .unwrap();
        assert!(html.contains("0.1.0"));
        assert!(html.contains("5s"));
    }

    #[test]
    fn test_queues_template_renders_rows() {
        let env = test_env();
        let rows = vec![QueueRow {
            name: "jobs".to_string(),
            processed: 3,
            dropped: 1,
            total_time_in_queue_ms: 40,
            max_time_in_queue_ms: 25,
            average_time_in_queue_ms: 10,
        }];
        let html = env
            .get_template("queues")
            .unwrap()
            .render(context! { queues => rows })
            .unwrap();
        assert!(html.contains("jobs"));
        assert!(html.contains("<td>25</td>"));
    }

    #[test]
    fn test_queues_template_handles_empty_registry() {
        let env = test_env();
        let html = env
            .get_template("queues")
            .unwrap()
            .render(context! { queues => Vec::<QueueRow>::new() })
            .unwrap();
        assert!(html.contains("No queues registered"));
    }

    #[test]
    fn test_error_template_renders_message() {
        let env = test_env();
        let html = env
            .get_template("error")
            .unwrap()
            .render(context! { error => "boom" })
            .unwrap();
        assert!(html.contains("boom"));
    }
}
