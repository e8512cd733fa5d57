//! Request/response seam below the client.
//!
//! The client builds [`Request`]s and interprets [`RawResponse`]s; a
//! [`Transport`] only moves bytes. Non-2xx statuses are responses, not errors:
//! the client decides what a status means.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Name of the query parameter carrying the credential.
pub const CREDENTIAL_PARAM: &str = "access_token";

/// HTTP methods used against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing call. `url` is base plus path without a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Full URL with the credential masked, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| {
                if k == CREDENTIAL_PARAM {
                    format!("{k}=***")
                } else {
                    format!("{k}={}", urlencoding::encode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }
}

/// Status and body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The call did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and dropped connections. Never retried by the adapter itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::ConnectionClosed(_)
        )
    }
}

/// Executes a single request.
pub trait Transport {
    fn execute(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// ureq
// ---------------------------------------------------------------------------

/// Blocking HTTP transport with one overall timeout per call.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("teamsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let mut call = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.query {
            call = call.query(name, value);
        }

        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(classify_transport(&transport)),
        };

        let status = response.status();
        let body = response.into_string().map_err(|e| classify_io(&e))?;
        Ok(RawResponse { status, body })
    }
}

/// Socket failures, timeouts included, arrive as `Io` or `ConnectionFailed`
/// with the `io::Error` as source.
fn classify_transport(err: &ureq::Transport) -> TransportError {
    let io = match err.kind() {
        ureq::ErrorKind::Io | ureq::ErrorKind::ConnectionFailed => {
            std::error::Error::source(err).and_then(|s| s.downcast_ref::<io::Error>())
        }
        _ => None,
    };
    match io {
        Some(io) => classify_kind(io.kind(), err.to_string()),
        None => TransportError::Other(err.to_string()),
    }
}

fn classify_io(err: &io::Error) -> TransportError {
    classify_kind(err.kind(), err.to_string())
}

fn classify_kind(kind: io::ErrorKind, message: String) -> TransportError {
    match kind {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout(message),
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TransportError::ConnectionClosed(message),
        _ => TransportError::Other(message),
    }
}
