//! teamsync core library: domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: identities, memberships, organizations, teams, matching policy
//! - [`config`]: YAML / environment loading and validation into [`Settings`]
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, GiteaSettings, LdapSettings, Settings};
pub use error::ConfigError;
pub use types::{
    ExternalKey, Identity, Matching, Membership, Organization, RemoteUser, Team, TeamExclusion,
};
