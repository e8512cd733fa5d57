//! Sync orchestration.
//!
//! ## Per run
//!
//! 1. List organizations (abort the run on failure).
//! 2. For each organization: reset the credential selector, list teams (abort
//!    the run on failure), skip excluded teams.
//! 3. For each team: fetch desired members from the directory, fetch observed
//!    members from the remote store, diff, apply additions, apply removals.
//!
//! A team whose desired or observed membership cannot be fetched is skipped;
//! a failed directory search never reaches the reconciler as an empty set.
//! Only run-fatal errors (directory unavailable, credentials exhausted,
//! remote store unreachable) end the run early. Everything is sequential.

use std::time::{Duration, Instant};

use chrono::Utc;

use teamsync_core::{
    Identity, Matching, Organization, RemoteUser, Settings, Team, TeamExclusion,
};
use teamsync_directory::{fetch_desired_members, DirectorySource, LdapDirectory, MemberQuery};
use teamsync_gitea::{
    CredentialSelector, GiteaClient, MutationOutcome, RemoteError, Transport, UreqTransport,
    UserQuery,
};

use crate::error::SyncError;
use crate::reconcile::compute_delta;
use crate::report::{ChangeAction, MembershipChange, RunSummary, TeamOutcome, TeamReport};

/// Bound on connecting to the directory and on each search.
pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Policy knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub query: MemberQuery,
    pub exclusion: TeamExclusion,
    /// Join-key comparison inside the reconciler.
    pub key_matching: Matching,
    /// Login confirmation of user-search candidates.
    pub login_matching: Matching,
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            query: MemberQuery::from_settings(&settings.ldap),
            exclusion: settings.exclusion.clone(),
            key_matching: settings.key_matching,
            login_matching: settings.login_matching,
        }
    }
}

/// One scheduled run against the real directory and remote store.
///
/// The directory session lives for the duration of the run and is unbound on
/// every exit path.
pub fn run_once(settings: &Settings, dry_run: bool) -> Result<RunSummary, SyncError> {
    let mut directory = LdapDirectory::connect(&settings.ldap, DIRECTORY_TIMEOUT)?;
    let transport = UreqTransport::new(settings.gitea.request_timeout);
    let client = GiteaClient::new(&settings.gitea, transport, dry_run);
    reconcile_all(&mut directory, &client, &SyncOptions::from_settings(settings))
}

/// Walk every organization and team and converge team membership.
pub fn reconcile_all<D, T>(
    directory: &mut D,
    client: &GiteaClient<T>,
    options: &SyncOptions,
) -> Result<RunSummary, SyncError>
where
    D: DirectorySource + ?Sized,
    T: Transport,
{
    let clock = Instant::now();
    let mut summary = RunSummary::new(client.is_dry_run(), Utc::now());
    let mut selector = CredentialSelector::new();

    let orgs = client.list_organizations(&mut selector)?;
    tracing::debug!(
        count = orgs.len(),
        url = %client.base_url(),
        "organizations found"
    );

    for org in &orgs {
        selector.reset();
        tracing::debug!(org = %org.name, org_id = org.id, "reviewing organization");

        let teams = client.list_teams(org, &mut selector)?;
        tracing::debug!(org = %org.name, count = teams.len(), "teams found");
        summary.organizations += 1;

        for team in teams {
            let outcome = if options.exclusion.excludes(&team) {
                tracing::debug!(org = %org.name, team = %team.name, "team excluded from synchronization");
                TeamOutcome::Excluded
            } else {
                let mut sync = TeamSync {
                    client,
                    options,
                    org,
                    team: &team,
                    selector: &mut selector,
                    changes: &mut summary.changes,
                    members: Vec::new(),
                    resolved: Vec::new(),
                };
                sync.run(&mut *directory)?
            };
            summary.teams.push(TeamReport {
                organization: org.name.clone(),
                team: team.name,
                team_id: team.id,
                outcome,
            });
        }
    }

    summary.duration = clock.elapsed();
    tracing::info!(
        organizations = summary.organizations,
        synced = summary.synced(),
        skipped = summary.skipped(),
        changes = summary.changes.len(),
        dry_run = summary.dry_run,
        "run complete"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Per team
// ---------------------------------------------------------------------------

struct TeamSync<'a, T> {
    client: &'a GiteaClient<T>,
    options: &'a SyncOptions,
    org: &'a Organization,
    team: &'a Team,
    selector: &'a mut CredentialSelector,
    changes: &'a mut Vec<MembershipChange>,
    /// Logins currently in the team.
    members: Vec<String>,
    /// Logins the add step resolved in this team; never removed afterwards.
    resolved: Vec<String>,
}

/// Result of one membership step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Changed,
    Unchanged,
    Failed,
}

impl<T: Transport> TeamSync<'_, T> {
    /// `Err` only for run-fatal failures.
    fn run<D: DirectorySource + ?Sized>(&mut self, directory: &mut D) -> Result<TeamOutcome, SyncError> {
        let (org, team) = (&self.org.name, &self.team.name);

        let desired = match fetch_desired_members(directory, team, &self.options.query) {
            Ok(members) => members,
            Err(err) if err.is_unavailable() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(org = %org, team = %team, error = %err, "directory search failed; skipping team");
                return Ok(TeamOutcome::Skipped {
                    reason: err.to_string(),
                });
            }
        };

        let observed = match self.client.list_members(self.team, self.selector) {
            Ok(members) => members,
            Err(err) if err.is_run_fatal() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(org = %org, team = %team, error = %err, "listing team members failed; skipping team");
                return Ok(TeamOutcome::Skipped {
                    reason: err.to_string(),
                });
            }
        };

        tracing::info!(
            org = %org,
            team = %team,
            team_id = self.team.id,
            desired = desired.len(),
            observed = observed.len(),
            "membership fetched"
        );

        self.members = observed.values().map(|m| m.login.clone()).collect();
        let delta = compute_delta(&desired, &observed, self.options.key_matching);
        tracing::debug!(
            team = %team,
            to_add = ?delta.to_add.iter().map(|i| &i.login).collect::<Vec<_>>(),
            to_remove = ?delta.to_remove.iter().map(|i| &i.login).collect::<Vec<_>>(),
            "delta computed"
        );

        let mut failed = 0;
        let mut added = 0;
        for identity in &delta.to_add {
            match self.add(identity)? {
                Step::Changed => added += 1,
                Step::Unchanged => {}
                Step::Failed => failed += 1,
            }
        }
        let mut removed = 0;
        for identity in &delta.to_remove {
            if self.was_resolved(&identity.login) {
                tracing::debug!(
                    team = %self.team.name,
                    login = %identity.login,
                    "member matched a desired identity; not removed"
                );
                continue;
            }
            match self.remove(identity)? {
                Step::Changed => removed += 1,
                Step::Unchanged => {}
                Step::Failed => failed += 1,
            }
        }

        Ok(TeamOutcome::Synced {
            added,
            removed,
            failed,
        })
    }

    /// Resolve by display name, confirm the login, then add. A resolved login
    /// that is already a member is left alone.
    fn add(&mut self, identity: &Identity) -> Result<Step, SyncError> {
        let mut user = self.confirmed_candidate(identity, &identity.display_name)?;
        if user.is_none() && identity.display_name != identity.login {
            user = self.confirmed_candidate(identity, &identity.login)?;
        }
        let Some(user) = user else {
            tracing::warn!(
                team = %self.team.name,
                login = %identity.login,
                display_name = %identity.display_name,
                "no remote user with a matching login; not added"
            );
            return Ok(Step::Failed);
        };

        self.resolved.push(user.login.clone());
        if self
            .members
            .iter()
            .any(|m| self.options.login_matching.matches(m, &user.login))
        {
            tracing::debug!(team = %self.team.name, login = %user.login, "already a member");
            return Ok(Step::Unchanged);
        }
        let result = self.client.add_member(self.team, &user.login, self.selector);
        self.record(ChangeAction::Add, &user.login, result)
    }

    fn was_resolved(&self, login: &str) -> bool {
        self.resolved
            .iter()
            .any(|r| self.options.login_matching.matches(r, login))
    }

    /// Search `term` and keep the first candidate whose login matches.
    /// The search is a substring match, so candidates must be confirmed.
    fn confirmed_candidate(
        &mut self,
        identity: &Identity,
        term: &str,
    ) -> Result<Option<RemoteUser>, SyncError> {
        let candidates = match self
            .client
            .search_users(UserQuery::DisplayName(term), self.selector)
        {
            Ok(candidates) => candidates,
            Err(err) => return self.contain(err).map(|()| None),
        };
        Ok(candidates
            .into_iter()
            .find(|c| self.options.login_matching.matches(&c.login, &identity.login)))
    }

    /// Resolve by numeric id, then remove.
    fn remove(&mut self, identity: &Identity) -> Result<Step, SyncError> {
        let Some(remote_id) = identity.remote_id else {
            tracing::warn!(team = %self.team.name, login = %identity.login, "member has no remote id; not removed");
            return Ok(Step::Failed);
        };

        let users = match self.client.search_users(UserQuery::Id(remote_id), self.selector) {
            Ok(users) => users,
            Err(err) => return self.contain(err).map(|()| Step::Failed),
        };
        let Some(user) = users
            .iter()
            .find(|u| u.id == remote_id)
            .or_else(|| users.first())
        else {
            tracing::warn!(team = %self.team.name, login = %identity.login, remote_id, "user search returned nothing; not removed");
            return Ok(Step::Failed);
        };

        let result = self.client.remove_member(self.team, &user.login, self.selector);
        self.record(ChangeAction::Remove, &user.login, result)
    }

    fn record(
        &mut self,
        action: ChangeAction,
        login: &str,
        result: Result<MutationOutcome, RemoteError>,
    ) -> Result<Step, SyncError> {
        match result {
            Ok(outcome) => {
                self.changes.push(MembershipChange {
                    organization: self.org.name.clone(),
                    team: self.team.name.clone(),
                    team_id: self.team.id,
                    login: login.to_owned(),
                    action,
                    outcome,
                });
                Ok(Step::Changed)
            }
            Err(err) => self.contain(err).map(|()| Step::Failed),
        }
    }

    /// Propagate run-fatal errors, log the rest.
    fn contain(&self, err: RemoteError) -> Result<(), SyncError> {
        if err.is_run_fatal() {
            return Err(err.into());
        }
        tracing::error!(
            org = %self.org.name,
            team = %self.team.name,
            error = %err,
            "remote store call failed"
        );
        Ok(())
    }
}
