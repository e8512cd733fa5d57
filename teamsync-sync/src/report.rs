//! Run summary returned by [`reconcile_all`](crate::reconcile_all).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use teamsync_gitea::MutationOutcome;

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Remove,
}

/// One add/remove call that was issued (or, in dry-run, would have been).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub organization: String,
    pub team: String,
    pub team_id: i64,
    pub login: String,
    pub action: ChangeAction,
    #[serde(serialize_with = "serialize_outcome")]
    pub outcome: MutationOutcome,
}

/// What happened to one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TeamOutcome {
    /// Delta computed and applied. `failed` counts identities that could not be
    /// resolved or whose mutation was rejected.
    Synced {
        added: usize,
        removed: usize,
        failed: usize,
    },
    /// Desired or observed membership could not be fetched.
    Skipped { reason: String },
    /// Matched the team exclusion policy.
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamReport {
    pub organization: String,
    pub team: String,
    pub team_id: i64,
    pub outcome: TeamOutcome,
}

/// Outcome of one full pass over every organization and team.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub organizations: usize,
    pub teams: Vec<TeamReport>,
    pub changes: Vec<MembershipChange>,
}

impl RunSummary {
    pub fn new(dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            dry_run,
            started_at,
            duration: Duration::ZERO,
            organizations: 0,
            teams: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn synced(&self) -> usize {
        self.count(|o| matches!(o, TeamOutcome::Synced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TeamOutcome::Skipped { .. }))
    }

    pub fn excluded(&self) -> usize {
        self.count(|o| matches!(o, TeamOutcome::Excluded))
    }

    pub fn changes_for(&self, action: ChangeAction) -> impl Iterator<Item = &MembershipChange> {
        self.changes.iter().filter(move |c| c.action == action)
    }

    fn count(&self, pred: impl Fn(&TeamOutcome) -> bool) -> usize {
        self.teams.iter().filter(|t| pred(&t.outcome)).count()
    }
}

fn serialize_outcome<S: serde::Serializer>(
    outcome: &MutationOutcome,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(match outcome {
        MutationOutcome::Applied => "applied",
        MutationOutcome::AlreadySatisfied => "already_satisfied",
        MutationOutcome::WouldApply => "would_apply",
    })
}
