//! # teamsync-sync
//!
//! Reconciler and sync orchestration.
//!
//! [`compute_delta`] is the pure diff between desired and observed team
//! membership. [`reconcile_all`] walks every organization and team, feeds the
//! reconciler from a directory source and the remote store, and applies the
//! result. [`run_once`] wires the production adapters for one scheduled run.

pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use error::SyncError;
pub use pipeline::{reconcile_all, run_once, SyncOptions};
pub use reconcile::{compute_delta, Delta};
pub use teamsync_gitea::MutationOutcome;
pub use report::{ChangeAction, MembershipChange, RunSummary, TeamOutcome, TeamReport};
