//! Request bodies for the REST API.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::QueueConfig;

pub use crate::broker::is_valid_queue_name;

/// `POST /queues/{name}` body. TTL is in seconds; zero or absent means
/// "use the queue default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl MessageRequest {
    /// Explicit TTL for the broker, when one was requested.
    pub(crate) fn ttl_duration(&self) -> Option<Duration> {
        self.ttl.filter(|&t| t > 0).map(Duration::seconds)
    }
}

/// `POST /queues` body: a name plus the per-queue options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCreateRequest {
    pub name: String,

    #[serde(flatten)]
    pub options: QueueConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_request_ttl_resolution() {
        let with_ttl: MessageRequest =
            serde_json::from_str(r#"{"message": "m", "ttl": 5}"#).unwrap();
        assert_eq!(with_ttl.ttl_duration(), Some(Duration::seconds(5)));

        let no_ttl: MessageRequest = serde_json::from_str(r#"{"message": "m"}"#).unwrap();
        assert_eq!(no_ttl.ttl_duration(), None);

        let zero_ttl: MessageRequest =
            serde_json::from_str(r#"{"message": "m", "ttl": 0}"#).unwrap();
        assert_eq!(zero_ttl.ttl_duration(), None, "zero means queue default");
    }

    #[test]
    fn test_queue_create_request_flattens_options() {
        let req: QueueCreateRequest = serde_json::from_str(
            r#"{"name": "t", "min_length": 10, "max_length": 100, "ttl": 0}"#,
        )
        .unwrap();
        assert_eq!(req.name, "t");
        assert_eq!(req.options.min_length, 10);
        assert_eq!(req.options.max_length, 100);
        assert_eq!(req.options.max_size_bytes, 0);
        assert_eq!(req.options.ttl, 0);
    }
}
