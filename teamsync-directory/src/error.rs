//! Error types for teamsync-directory.

use thiserror::Error;

/// All errors that can arise from directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Connecting failed or the connection dropped mid-run.
    #[error("directory at {url} is unavailable: {source}")]
    Unavailable {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// The bind was rejected.
    #[error("bind as '{dn}' failed: {source}")]
    Bind {
        dn: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// One search failed (malformed filter, referral, missing base, ...).
    #[error("search with filter {filter} failed: {reason}")]
    Search { filter: String, reason: String },
}

impl DirectoryError {
    /// `true` when the whole directory is unusable for the rest of the run,
    /// as opposed to a single team's search failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DirectoryError::Unavailable { .. } | DirectoryError::Bind { .. }
        )
    }
}
