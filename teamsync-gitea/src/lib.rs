//! # teamsync-gitea
//!
//! Remote team store adapter for the Gitea REST API.
//!
//! [`GiteaClient`] lists organizations, teams and members (following
//! pagination), searches users, and adds or removes single team members.
//! Every call goes through the [`CredentialPool`] with fallback on 401/403;
//! mutations are suppressed and logged when the client is in dry-run mode.
//! HTTP sits behind the [`Transport`] trait: [`UreqTransport`] in production,
//! [`MemoryTransport`] (feature `test-util`) for scripted offline runs.

pub mod client;
pub mod credentials;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;
pub mod transport;

pub use client::{GiteaClient, MutationOutcome, UserQuery};
pub use credentials::{CredentialPool, CredentialSelector};
pub use error::RemoteError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryTransport;
pub use transport::{Method, RawResponse, Request, Transport, TransportError, UreqTransport};
