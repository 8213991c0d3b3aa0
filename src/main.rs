//! Yambol broker — main entry point.
//!
//! Loads the startup configuration, builds the broker and starts every
//! enabled API surface in parallel. A missing configuration file means an
//! empty default; a malformed one is a hard startup error.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use yambol::broker::Broker;
use yambol::config::{
    self, ConfigState, Configuration, DEFAULT_FRONTEND_PORT, DEFAULT_FRONTEND_TLS_PORT,
    DEFAULT_GRPC_PORT, DEFAULT_GRPC_TLS_PORT, DEFAULT_REST_PORT, DEFAULT_REST_TLS_PORT,
};
use yambol::frontend::FrontendServer;
use yambol::grpc::GrpcServer;
use yambol::rest::RestServer;
use yambol::types::Error;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let path = config::config_path();
    let (configuration, from_file) = match Configuration::from_file(&path) {
        Ok(cfg) => (cfg, true),
        Err(Error::NotFound(_)) => (Configuration::default(), false),
        Err(e) => {
            eprintln!("failed to load config file: {}", e);
            return Err(e.into());
        }
    };

    yambol::observability::init_tracing(&configuration.log);
    if from_file {
        tracing::info!("loaded configuration from {}", path.display());
    } else {
        tracing::warn!(
            "no configuration file at {}, starting with defaults",
            path.display()
        );
    }

    let state = Arc::new(ConfigState::new(configuration.clone(), &path));
    let broker = Arc::new(Broker::new(Arc::clone(&state)));
    for (name, queue_config) in &configuration.broker.queues {
        if let Err(e) = broker.add_queue(name, *queue_config) {
            tracing::error!("failed to create configured queue `{}`: {}", name, e);
        }
    }

    let cancel = CancellationToken::new();
    let mut servers: JoinSet<(&'static str, yambol::Result<()>)> = JoinSet::new();
    let api = configuration.api.clone();
    let tls_key_pair = |tls_enabled: bool| {
        if tls_enabled {
            (api.certificate.clone(), api.key.clone())
        } else {
            (String::new(), String::new())
        }
    };

    if api.rest.enabled {
        let server = RestServer::new(Arc::clone(&broker), Arc::clone(&state), None);
        let port = api.rest.resolve_port(DEFAULT_REST_PORT, DEFAULT_REST_TLS_PORT);
        let (cert, key) = tls_key_pair(api.rest.tls_enabled);
        let cancel = cancel.clone();
        servers.spawn(async move {
            ("rest", server.listen_and_serve(port, &cert, &key, cancel).await)
        });
    }

    if api.grpc.enabled {
        let server = GrpcServer::new(Arc::clone(&broker));
        let port = api.grpc.resolve_port(DEFAULT_GRPC_PORT, DEFAULT_GRPC_TLS_PORT);
        let (cert, key) = tls_key_pair(api.grpc.tls_enabled);
        let cancel = cancel.clone();
        servers.spawn(async move {
            ("grpc", server.listen_and_serve(port, &cert, &key, cancel).await)
        });
    }

    if api.http.enabled {
        let server = FrontendServer::new(Arc::clone(&broker), None)?;
        let port = api
            .http
            .resolve_port(DEFAULT_FRONTEND_PORT, DEFAULT_FRONTEND_TLS_PORT);
        let (cert, key) = tls_key_pair(api.http.tls_enabled);
        let cancel = cancel.clone();
        servers.spawn(async move {
            ("frontend", server.listen_and_serve(port, &cert, &key, cancel).await)
        });
    }

    if servers.is_empty() {
        tracing::warn!("no API surface enabled, nothing to serve");
        return Ok(());
    }

    let mut failure: Option<Error> = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping servers");
        }
        Some(result) = servers.join_next() => {
            match result {
                Ok((name, Ok(()))) => tracing::info!("{} server exited", name),
                Ok((name, Err(e))) => {
                    tracing::error!("{} server failed: {}", name, e);
                    failure = Some(e);
                }
                Err(e) => {
                    tracing::error!("server task failed: {}", e);
                    failure = Some(Error::internal(e.to_string()));
                }
            }
        }
    }

    cancel.cancel();
    while let Some(result) = servers.join_next().await {
        if let Ok((name, Err(e))) = result {
            tracing::error!("{} server failed: {}", name, e);
        }
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
