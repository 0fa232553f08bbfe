use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The OS refused to bind or listen on a management socket.
    #[error("failed to bind management socket on {address}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve {target}")]
    Resolution {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("{target} did not resolve to any address")]
    NoAddress { target: String },

    #[error("authentication setup failed: {0}")]
    Auth(String),

    #[error("failed to read credential file {}", path.display())]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid entry in {} at line {line}", path.display())]
    InvalidCredentialEntry { path: PathBuf, line: usize },

    #[error("invalid service url '{0}'")]
    InvalidServiceUrl(String),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    /// Transport-level failure: refused, unreachable, timed out.
    #[error("connection to {endpoint} failed")]
    Io {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("service '{0}' is not available")]
    ServiceUnavailable(String),

    #[error("security error: {0}")]
    Security(String),

    #[error("unexpected response from {endpoint}: {status}")]
    Protocol { endpoint: String, status: u16 },
}

impl ConnectError {
    pub fn is_security(&self) -> bool {
        matches!(self, ConnectError::Security(_))
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ConnectError::ServiceUnavailable(_) | ConnectError::Io { .. }
        )
    }
}
