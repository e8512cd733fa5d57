//! Error types for teamsync-sync.

use thiserror::Error;

use teamsync_core::ConfigError;
use teamsync_directory::DirectoryError;
use teamsync_gitea::RemoteError;

/// Errors that abort a run. Per-team failures never surface here; they are
/// logged and recorded in the run summary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The directory is unreachable or rejected the bind.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// The remote store is unreachable, rejected every credential, or failed
    /// while listing organizations or teams.
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),
}
