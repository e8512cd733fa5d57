//! # teamsync-directory
//!
//! Directory side of the sync: one attribute search per team, normalized into
//! a [`Membership`](teamsync_core::Membership).
//!
//! [`fetch_desired_members`] works against any [`DirectorySource`];
//! [`LdapDirectory`] is the ldap3-backed session opened once per run.

pub mod error;
pub mod filter;
pub mod ldap;
pub mod members;

pub use error::DirectoryError;
pub use filter::build_filter;
pub use ldap::LdapDirectory;
pub use members::{fetch_desired_members, DirectoryEntry, DirectorySource, MemberQuery};
