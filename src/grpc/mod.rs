//! gRPC surface.
//!
//! One service mirroring the basic REST operations. TLS is chosen the same
//! way as on the HTTP side: both key-pair paths non-empty. Shutdown is
//! graceful via the cancellation token; a forced stop is the caller
//! aborting the serve task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

use crate::broker::{is_valid_queue_name, Broker};
use crate::proto::yambol_server::{Yambol, YambolServer};
use crate::proto::{
    ConsumeRequest, ConsumeResponse, CreateQueueRequest, CreateQueueResponse, HomeRequest,
    HomeResponse, PublishRequest, PublishResponse, QueueStats, RemoveQueueRequest,
    RemoveQueueResponse, StatsRequest, StatsResponse,
};
use crate::types::{Error, Result};

mod peer;

pub use peer::PeerInfo;

/// The gRPC server wrapping the broker.
#[derive(Debug)]
pub struct GrpcServer {
    broker: Arc<Broker>,
}

impl GrpcServer {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    pub async fn listen_and_serve_insecure(
        &self,
        port: u16,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.listen_and_serve(port, "", "", cancel).await
    }

    /// Serve with TLS when both key-pair paths are non-empty, plaintext
    /// otherwise. Runs until the token is cancelled (graceful stop).
    pub async fn listen_and_serve(
        &self,
        port: u16,
        cert_file: &str,
        key_file: &str,
        cancel: CancellationToken,
    ) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let service = YambolService {
            broker: Arc::clone(&self.broker),
            started_at: Instant::now(),
        };

        let mut builder = Server::builder();
        if !cert_file.is_empty() && !key_file.is_empty() {
            let cert = tokio::fs::read(cert_file).await?;
            let key = tokio::fs::read(key_file).await?;
            builder = builder
                .tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
                .map_err(|e| Error::config(format!("failed to load TLS key pair: {}", e)))?;
            tracing::info!("starting Yambol gRPC API with TLS (secure) at [{}]", port);
        } else {
            tracing::info!("starting Yambol gRPC API without TLS (insecure) at [{}]", port);
        }

        builder
            .add_service(YambolServer::new(service))
            .serve_with_shutdown(addr, async move { cancel.cancelled().await })
            .await
            .map_err(|e| Error::internal(format!("grpc server error: {}", e)))
    }
}

/// Service implementation; holds the broker handle and the start timestamp.
#[derive(Debug)]
struct YambolService {
    broker: Arc<Broker>,
    started_at: Instant,
}

#[tonic::async_trait]
impl Yambol for YambolService {
    async fn home(
        &self,
        request: Request<HomeRequest>,
    ) -> std::result::Result<Response<HomeResponse>, Status> {
        let peer = PeerInfo::from_request(&request);
        tracing::debug!("home rpc from {}", peer);

        Ok(Response::new(HomeResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime: humantime::format_duration(self.started_at.elapsed()).to_string(),
        }))
    }

    async fn publish(
        &self,
        request: Request<PublishRequest>,
    ) -> std::result::Result<Response<PublishResponse>, Status> {
        let req = request.into_inner();
        if req.message.is_empty() {
            return Err(Error::invalid_request("message is required").into());
        }

        let ttl = (req.ttl_seconds > 0).then(|| Duration::seconds(req.ttl_seconds));
        let names: Vec<&str> = req.queues.iter().map(String::as_str).collect();
        self.broker.publish_with_ttl(&req.message, ttl, &names)?;
        Ok(Response::new(PublishResponse {}))
    }

    async fn consume(
        &self,
        request: Request<ConsumeRequest>,
    ) -> std::result::Result<Response<ConsumeResponse>, Status> {
        let req = request.into_inner();
        // An empty queue mirrors the REST surface: success with empty data.
        match self.broker.consume(&req.queue) {
            Ok(data) => Ok(Response::new(ConsumeResponse { data })),
            Err(Error::QueueEmpty) => Ok(Response::new(ConsumeResponse {
                data: String::new(),
            })),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_queue(
        &self,
        request: Request<CreateQueueRequest>,
    ) -> std::result::Result<Response<CreateQueueResponse>, Status> {
        let req = request.into_inner();
        if !is_valid_queue_name(&req.name) {
            return Err(
                Error::invalid_name(format!("the queue name `{}` is not valid", req.name)).into(),
            );
        }

        self.broker.add_queue(
            &req.name,
            crate::config::QueueConfig {
                min_length: req.min_length,
                max_length: req.max_length,
                max_size_bytes: req.max_size_bytes,
                ttl: req.ttl_seconds,
            },
        )?;
        Ok(Response::new(CreateQueueResponse {}))
    }

    async fn remove_queue(
        &self,
        request: Request<RemoveQueueRequest>,
    ) -> std::result::Result<Response<RemoveQueueResponse>, Status> {
        let req = request.into_inner();
        self.broker.remove_queue(&req.name)?;
        Ok(Response::new(RemoveQueueResponse {}))
    }

    async fn stats(
        &self,
        _request: Request<StatsRequest>,
    ) -> std::result::Result<Response<StatsResponse>, Status> {
        let queues = self
            .broker
            .stats()
            .into_iter()
            .map(|(name, snap)| {
                (
                    name,
                    QueueStats {
                        processed: snap.processed,
                        dropped: snap.dropped,
                        total_time_in_queue_ms: snap.total_time_in_queue_ms,
                        max_time_in_queue_ms: snap.max_time_in_queue_ms,
                        average_time_in_queue_ms: snap.average_time_in_queue_ms,
                    },
                )
            })
            .collect();
        Ok(Response::new(StatsResponse { queues }))
    }
}
