//! Error types for teamsync-gitea.

use thiserror::Error;

use crate::transport::TransportError;

/// All errors that can arise from remote store calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Every credential in the pool was rejected.
    #[error("no valid credential: all {attempted} credential(s) were rejected")]
    NoValidCredential { attempted: usize },

    /// The request did not complete within the transport timeout.
    #[error("request to {url} timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: TransportError,
    },

    /// Any other transport failure (DNS, refused connection, TLS, ...).
    #[error("transport failure calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// Non-success status whose payload could not be used.
    #[error("{url} answered HTTP {status}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    /// Success status with a payload of the wrong shape.
    #[error("unexpected payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    pub(crate) fn from_transport(url: String, source: TransportError) -> Self {
        if matches!(source, TransportError::Timeout(_)) {
            RemoteError::Timeout { url, source }
        } else {
            RemoteError::Transport { url, source }
        }
    }

    /// Errors that end the current run: the remote store is unreachable or no
    /// credential works, so continuing with other teams cannot succeed.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            RemoteError::NoValidCredential { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::Transport { .. }
        )
    }

    /// Timeouts and dropped connections; a later run may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout { .. } => true,
            RemoteError::Transport { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
