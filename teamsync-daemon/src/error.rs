use thiserror::Error;

/// Error surface for schedule parsing and the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid schedule '{expr}': {reason}")]
    Schedule { expr: String, reason: String },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("ctrl-c handler failed: {0}")]
    Signal(#[source] std::io::Error),
}

pub(crate) fn schedule_err(expr: &str, reason: impl Into<String>) -> DaemonError {
    DaemonError::Schedule {
        expr: expr.to_owned(),
        reason: reason.into(),
    }
}
