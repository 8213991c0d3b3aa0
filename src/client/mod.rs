//! REST client mirroring every server endpoint.
//!
//! Each operation comes in two flavors: one that applies the client's
//! configured default timeout (capped at one minute) and one that takes an
//! explicit timeout. Non-2xx responses are decoded as `{"error": ...}`
//! bodies where possible and surfaced as structured errors.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header;

use crate::config::{Configuration, QueueConfig};
use crate::rest::request::{MessageRequest, QueueCreateRequest};
use crate::rest::response::{ErrorResponse, HomeResponse, QueueGetResponse};
use crate::telemetry::QueueStatsSnapshot;
use crate::types::{Error, Result};

/// User agent sent with every request.
pub const CLIENT_USER_AGENT: &str = "yambol-client";

/// Hard cap on any single request's timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// Join URL components with single slashes, regardless of leading or
/// trailing slashes on either side.
pub fn url_join(url: &str, components: &[&str]) -> String {
    let mut out = url.trim_end_matches('/').to_string();
    for component in components {
        out.push('/');
        out.push_str(component.trim_matches('/'));
    }
    out
}

/// Client for the Yambol REST API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    default_timeout: Duration,
}

impl Client {
    pub fn new(base_url: &str, default_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            default_timeout,
        }
    }

    /// The effective default timeout: the configured one, capped at
    /// [`MAX_TIMEOUT`]; zero means "use the cap".
    fn timeout(&self) -> Duration {
        if self.default_timeout.is_zero() {
            MAX_TIMEOUT
        } else {
            self.default_timeout.min(MAX_TIMEOUT)
        }
    }

    /// `GET /` — version and uptime.
    pub async fn home(&self) -> Result<HomeResponse> {
        self.home_with_timeout(self.timeout()).await
    }

    pub async fn home_with_timeout(&self, timeout: Duration) -> Result<HomeResponse> {
        let response = self.get(&url_join(&self.base_url, &[]), timeout, "ping").await?;
        decode(response, "ping response").await
    }

    /// `GET /stats`.
    pub async fn stats(&self) -> Result<HashMap<String, QueueStatsSnapshot>> {
        self.stats_with_timeout(self.timeout()).await
    }

    pub async fn stats_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<HashMap<String, QueueStatsSnapshot>> {
        let url = url_join(&self.base_url, &["stats"]);
        let response = self.get(&url, timeout, "get stats").await?;
        decode(response, "stats response").await
    }

    /// `GET /queues` — stats for every queue.
    pub async fn get_queues(&self) -> Result<HashMap<String, QueueStatsSnapshot>> {
        self.get_queues_with_timeout(self.timeout()).await
    }

    pub async fn get_queues_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<HashMap<String, QueueStatsSnapshot>> {
        let url = url_join(&self.base_url, &["queues"]);
        let response = self.get(&url, timeout, "get queues").await?;
        decode(response, "queues response").await
    }

    /// `POST /queues` — create a queue.
    pub async fn create_queue(&self, queue: &str, options: QueueConfig) -> Result<()> {
        self.create_queue_with_timeout(queue, options, self.timeout())
            .await
    }

    pub async fn create_queue_with_timeout(
        &self,
        queue: &str,
        options: QueueConfig,
        timeout: Duration,
    ) -> Result<()> {
        let url = url_join(&self.base_url, &["queues"]);
        let body = QueueCreateRequest {
            name: queue.to_string(),
            options,
        };
        self.post_json(&url, &body, timeout, &format!("create queue {}", queue))
            .await?;
        Ok(())
    }

    /// `DELETE /queues/{name}`.
    pub async fn delete_queue(&self, queue: &str) -> Result<()> {
        self.delete_queue_with_timeout(queue, self.timeout()).await
    }

    pub async fn delete_queue_with_timeout(&self, queue: &str, timeout: Duration) -> Result<()> {
        let url = url_join(&self.base_url, &["queues", queue]);
        let context = format!("delete queue {}", queue);
        let response = self
            .send(self.http.delete(&url), timeout, &context)
            .await?;
        check_status(response, &context).await?;
        Ok(())
    }

    /// `POST /queues/{name}` — publish a message.
    pub async fn publish(&self, queue: &str, message: &str) -> Result<()> {
        self.publish_with_timeout(queue, message, self.timeout())
            .await
    }

    pub async fn publish_with_timeout(
        &self,
        queue: &str,
        message: &str,
        timeout: Duration,
    ) -> Result<()> {
        let url = url_join(&self.base_url, &["queues", queue]);
        let body = MessageRequest {
            message: message.to_string(),
            ttl: None,
        };
        self.post_json(&url, &body, timeout, &format!("publish to queue {}", queue))
            .await?;
        Ok(())
    }

    /// `GET /queues/{name}` — consume the next message. Empty string when
    /// the queue held nothing.
    pub async fn consume(&self, queue: &str) -> Result<String> {
        self.consume_with_timeout(queue, self.timeout()).await
    }

    pub async fn consume_with_timeout(&self, queue: &str, timeout: Duration) -> Result<String> {
        let url = url_join(&self.base_url, &["queues", queue]);
        let response = self
            .get(&url, timeout, &format!("consume from queue {}", queue))
            .await?;
        let body: QueueGetResponse = decode(response, "consume response").await?;
        Ok(body.data)
    }

    /// `GET /running_config`.
    pub async fn get_running_config(&self) -> Result<Configuration> {
        self.get_running_config_with_timeout(self.timeout()).await
    }

    pub async fn get_running_config_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Configuration> {
        let url = url_join(&self.base_url, &["running_config"]);
        let response = self.get(&url, timeout, "get running config").await?;
        decode(response, "running config response").await
    }

    /// `POST /running_config` — replace the running configuration.
    pub async fn set_running_config(&self, config: &Configuration) -> Result<()> {
        self.set_running_config_with_timeout(config, self.timeout())
            .await
    }

    pub async fn set_running_config_with_timeout(
        &self,
        config: &Configuration,
        timeout: Duration,
    ) -> Result<()> {
        let url = url_join(&self.base_url, &["running_config"]);
        self.post_json(&url, config, timeout, "set running config")
            .await?;
        Ok(())
    }

    /// `GET /startup_config`.
    pub async fn get_startup_config(&self) -> Result<Configuration> {
        self.get_startup_config_with_timeout(self.timeout()).await
    }

    pub async fn get_startup_config_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Configuration> {
        let url = url_join(&self.base_url, &["startup_config"]);
        let response = self.get(&url, timeout, "get startup config").await?;
        decode(response, "startup config response").await
    }

    /// `PUT /running_config/save` — persist running → startup; returns the
    /// persisted configuration.
    pub async fn save_running_config(&self) -> Result<Configuration> {
        self.save_running_config_with_timeout(self.timeout()).await
    }

    pub async fn save_running_config_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Configuration> {
        let url = url_join(&self.base_url, &["running_config", "save"]);
        let context = "save running config";
        let response = self.send(self.http.put(&url), timeout, context).await?;
        let response = check_status(response, context).await?;
        decode_body(response, "saved config response").await
    }

    async fn get(&self, url: &str, timeout: Duration, context: &str) -> Result<reqwest::Response> {
        self.send(self.http.get(url), timeout, context).await
    }

    async fn post_json<B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
        context: &str,
    ) -> Result<reqwest::Response> {
        let response = self
            .send(self.http.post(url).json(body), timeout, context)
            .await?;
        check_status(response, context).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
        context: &str,
    ) -> Result<reqwest::Response> {
        request
            .header(header::USER_AGENT, CLIENT_USER_AGENT)
            .header(header::ACCEPT, "application/json; charset=utf-8")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::internal(format!("failed to {}: {}", context, e)))
    }
}

/// Map a non-2xx response to a structured error, decoding the server's
/// `{"error": ...}` body when present.
async fn check_status(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    let message = format!("[{}] failed to {}: {}", status.as_u16(), context, reason);
    Err(match status.as_u16() {
        404 => Error::not_found(message),
        400 => Error::invalid_request(message),
        _ => Error::internal(message),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let response = check_status(response, context).await?;
    decode_body(response, context).await
}

async fn decode_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::internal(format!("failed to decode {}: {}", context, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_normalizes_slashes() {
        assert_eq!(url_join("http://h/", &["a/", "/b", "3"]), "http://h/a/b/3");
        assert_eq!(url_join("http://h", &[]), "http://h");
        assert_eq!(url_join("http://h", &["queues", "jobs"]), "http://h/queues/jobs");
    }

    #[test]
    fn test_timeout_is_capped() {
        let client = Client::new("http://localhost", Duration::from_secs(3600));
        assert_eq!(client.timeout(), MAX_TIMEOUT);

        let client = Client::new("http://localhost", Duration::ZERO);
        assert_eq!(client.timeout(), MAX_TIMEOUT);

        let client = Client::new("http://localhost", Duration::from_secs(5));
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = Client::new("http://localhost:21419/", Duration::from_secs(1));
        assert_eq!(client.base_url, "http://localhost:21419");
    }
}
