//! Peer information extraction for RPC handlers.

use std::fmt;

/// Transport-level information about the calling peer.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    pub host: String,
    pub port: u16,
    pub protocol: &'static str,
    pub security: &'static str,
}

impl PeerInfo {
    pub fn from_request<T>(request: &tonic::Request<T>) -> Self {
        let mut info = PeerInfo::default();
        if let Some(addr) = request.remote_addr() {
            info.host = addr.ip().to_string();
            info.port = addr.port();
            info.protocol = "tcp";
        }
        if request.peer_certs().is_some() {
            info.security = "tls";
        }
        info
    }

    pub fn is_secure(&self) -> bool {
        !self.security.is_empty()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            return write!(f, "unknown peer");
        }
        if self.is_secure() {
            write!(f, "{} (with {}) {}", self.protocol, self.security, self.addr())
        } else {
            write!(f, "{} {}", self.protocol, self.addr())
        }
    }
}
