//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. One variant per failure kind; the REST
//! and gRPC layers map them onto wire status codes.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

fn publish_failure_summary(failures: &[(String, String)]) -> String {
    let mut out = String::from("one or more queues failed to accept the message:");
    for (queue, reason) in failures {
        out.push_str(&format!("\n [{}] -> {}", queue, reason));
    }
    out
}

/// Main error enum for the Yambol broker.
#[derive(Error, Debug)]
pub enum Error {
    /// Push against a queue at its maximum length.
    #[error("queue is full")]
    QueueFull,

    /// Pop from a queue with no live items.
    #[error("queue is empty")]
    QueueEmpty,

    /// Unknown queue name, or a missing startup configuration file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate queue creation.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Queue name failed validation (map to HTTP 400).
    #[error("invalid queue name: {0}")]
    InvalidName(String),

    /// Malformed request body or parameters (map to HTTP 400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request method missing from a route's dispatch map (map to HTTP 405).
    #[error("method {method} not allowed, allowed methods: [{}]", .allowed.join(", "))]
    MethodNotAllowed {
        method: String,
        allowed: Vec<String>,
    },

    /// Multi-queue publish with at least one failing queue.
    /// Carries each failing queue's reason.
    #[error("{}", publish_failure_summary(.0))]
    PublishFailed(Vec<(String, String)>),

    /// Configuration load or save failures.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors (map to HTTP 500 / gRPC INTERNAL).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to gRPC status code.
    pub fn to_grpc_status(&self) -> tonic::Status {
        match self {
            Error::QueueFull => tonic::Status::resource_exhausted(self.to_string()),
            Error::QueueEmpty => tonic::Status::failed_precondition(self.to_string()),
            Error::NotFound(msg) => tonic::Status::not_found(msg),
            Error::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            Error::InvalidName(msg) => tonic::Status::invalid_argument(msg),
            Error::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            Error::MethodNotAllowed { .. } => tonic::Status::unimplemented(self.to_string()),
            Error::PublishFailed(_) => tonic::Status::internal(self.to_string()),
            Error::Config(msg) => tonic::Status::internal(msg),
            Error::Serialization(e) => {
                tonic::Status::internal(format!("serialization error: {}", e))
            }
            Error::Io(e) => tonic::Status::internal(format!("io error: {}", e)),
            Error::Internal(msg) => tonic::Status::internal(msg),
        }
    }

    /// HTTP status code for the REST layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) | Error::InvalidName(_) | Error::InvalidRequest(_) => 400,
            Error::MethodNotAllowed { .. } => 405,
            _ => 500,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

// Implement From<Error> for Status to enable ? operator in gRPC handlers
impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        err.to_grpc_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_failure_lists_every_queue() {
        let err = Error::PublishFailed(vec![
            ("q1".to_string(), "queue is full".to_string()),
            ("q2".to_string(), "not found: q2".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("[q1] -> queue is full"));
        assert!(msg.contains("[q2] -> not found: q2"));
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::not_found("q").http_status(), 404);
        assert_eq!(Error::already_exists("q").http_status(), 400);
        assert_eq!(Error::invalid_name("q").http_status(), 400);
        assert_eq!(Error::invalid_request("bad body").http_status(), 400);
        assert_eq!(Error::QueueFull.http_status(), 500);
        assert_eq!(
            Error::MethodNotAllowed {
                method: "PATCH".to_string(),
                allowed: vec!["GET".to_string(), "POST".to_string()],
            }
            .http_status(),
            405
        );
    }

    #[test]
    fn test_method_not_allowed_names_allowed_methods() {
        let err = Error::MethodNotAllowed {
            method: "PATCH".to_string(),
            allowed: vec!["GET".to_string(), "POST".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "method PATCH not allowed, allowed methods: [GET, POST]"
        );
    }
}
