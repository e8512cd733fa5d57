//! Gitea client: listing, user search, and idempotent membership mutations.
//!
//! ## Call protocol
//!
//! 1. Pick the credential the [`CredentialSelector`] points at.
//! 2. Execute the request through the [`Transport`].
//! 3. On 401/403 advance the selector and go back to 1; when the pool is
//!    exhausted fail with [`RemoteError::NoValidCredential`].
//! 4. Log 3xx/4xx/5xx statuses and hand the response to the caller, which
//!    parses the payload defensively.
//!
//! Timeouts and other transport failures are returned as-is; this adapter
//! never retries them.

use serde::de::DeserializeOwned;

use teamsync_core::{GiteaSettings, Identity, Membership, Organization, RemoteUser, Team};

use crate::credentials::{CredentialPool, CredentialSelector};
use crate::error::RemoteError;
use crate::models::{error_message, OrgPayload, SearchResults, TeamPayload};
use crate::transport::{Method, RawResponse, Request, Transport, CREDENTIAL_PARAM};

/// Upper bound on pages followed for a single listing.
const MAX_PAGES: u32 = 10_000;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a single add/remove call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote store accepted the change.
    Applied,
    /// The remote store answered 404; membership already matches.
    AlreadySatisfied,
    /// Dry-run: the call was logged but not sent.
    WouldApply,
}

/// User search criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery<'a> {
    /// Substring search on login / full name (`q=`).
    DisplayName(&'a str),
    /// Exact numeric id (`uid=`).
    Id(i64),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Remote team store adapter.
pub struct GiteaClient<T> {
    base_url: String,
    credentials: CredentialPool,
    transport: T,
    page_limit: u32,
    dry_run: bool,
}

impl<T: Transport> GiteaClient<T> {
    pub fn new(settings: &GiteaSettings, transport: T, dry_run: bool) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            credentials: CredentialPool::new(settings.tokens.clone()),
            transport,
            page_limit: settings.page_limit.max(1),
            dry_run,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -- reads --------------------------------------------------------------

    /// All organizations, following pagination until an empty page.
    /// Each page starts again from the first credential.
    pub fn list_organizations(
        &self,
        selector: &mut CredentialSelector,
    ) -> Result<Vec<Organization>, RemoteError> {
        let orgs: Vec<OrgPayload> = self.get_paginated("/api/v1/admin/orgs", selector, true)?;
        Ok(orgs.into_iter().map(Organization::from).collect())
    }

    /// Every team of `org`, in server order. Exclusion is the caller's policy.
    pub fn list_teams(
        &self,
        org: &Organization,
        selector: &mut CredentialSelector,
    ) -> Result<Vec<Team>, RemoteError> {
        let path = format!("/api/v1/orgs/{}/teams", urlencoding::encode(&org.name));
        let teams: Vec<TeamPayload> = self.get_paginated(&path, selector, false)?;
        Ok(teams.into_iter().map(Team::from).collect())
    }

    /// Current members of `team`, keyed by login.
    pub fn list_members(
        &self,
        team: &Team,
        selector: &mut CredentialSelector,
    ) -> Result<Membership, RemoteError> {
        let path = format!("/api/v1/teams/{}/members", team.id);
        let users: Vec<RemoteUser> = self.get_paginated(&path, selector, false)?;
        Ok(users
            .iter()
            .map(Identity::from_remote)
            .map(|identity| (identity.key.clone(), identity))
            .collect())
    }

    /// Search users. A response flagged `ok: false` is logged and its (usually
    /// empty) data returned.
    pub fn search_users(
        &self,
        query: UserQuery<'_>,
        selector: &mut CredentialSelector,
    ) -> Result<Vec<RemoteUser>, RemoteError> {
        let param = match query {
            UserQuery::DisplayName(name) => ("q", name.to_owned()),
            UserQuery::Id(id) => ("uid", id.to_string()),
        };
        let results: SearchResults =
            self.get_json("/api/v1/users/search", &[param], selector)?;
        if !results.ok {
            tracing::warn!(?query, "user search reported ok=false");
        }
        Ok(results.data)
    }

    // -- mutations ----------------------------------------------------------

    /// Add `login` to `team`.
    pub fn add_member(
        &self,
        team: &Team,
        login: &str,
        selector: &mut CredentialSelector,
    ) -> Result<MutationOutcome, RemoteError> {
        self.mutate(Method::Put, team, login, selector)
    }

    /// Remove `login` from `team`.
    pub fn remove_member(
        &self,
        team: &Team,
        login: &str,
        selector: &mut CredentialSelector,
    ) -> Result<MutationOutcome, RemoteError> {
        self.mutate(Method::Delete, team, login, selector)
    }

    fn mutate(
        &self,
        method: Method,
        team: &Team,
        login: &str,
        selector: &mut CredentialSelector,
    ) -> Result<MutationOutcome, RemoteError> {
        let path = format!(
            "/api/v1/teams/{}/members/{}",
            team.id,
            urlencoding::encode(login)
        );

        if self.dry_run {
            let shape = Request {
                method,
                url: format!("{}{path}", self.base_url),
                query: vec![(CREDENTIAL_PARAM.to_owned(), String::new())],
            }
            .redacted_url();
            tracing::info!(
                method = %method,
                url = %shape,
                team = %team.name,
                team_id = team.id,
                login = %login,
                "[dry-run] would call"
            );
            return Ok(MutationOutcome::WouldApply);
        }

        let (request, response) = self.send(method, &path, &[], selector)?;
        match response.status {
            200..=299 => {
                tracing::info!(
                    method = %method,
                    team = %team.name,
                    team_id = team.id,
                    login = %login,
                    "applied"
                );
                Ok(MutationOutcome::Applied)
            }
            404 => {
                tracing::warn!(
                    method = %method,
                    url = %request.redacted_url(),
                    login = %login,
                    "remote store answered 404; treating membership as already settled"
                );
                Ok(MutationOutcome::AlreadySatisfied)
            }
            status => Err(RemoteError::Api {
                url: request.redacted_url(),
                status,
                message: error_message(&response.body),
            }),
        }
    }

    // -- protocol -----------------------------------------------------------

    fn get_paginated<R: DeserializeOwned>(
        &self,
        path: &str,
        selector: &mut CredentialSelector,
        reset_per_page: bool,
    ) -> Result<Vec<R>, RemoteError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            if reset_per_page {
                selector.reset();
            }
            let query = [
                ("page", page.to_string()),
                ("limit", self.page_limit.to_string()),
            ];
            let batch: Vec<R> = self.get_json(path, &query, selector)?;
            if batch.is_empty() {
                return Ok(items);
            }
            items.extend(batch);
        }
        tracing::warn!(path = %path, pages = MAX_PAGES, "pagination limit reached; listing truncated");
        Ok(items)
    }

    /// GET and decode. The payload is parsed whatever the status; a payload
    /// that does not decode is an error tagged with the status.
    fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        selector: &mut CredentialSelector,
    ) -> Result<R, RemoteError> {
        let (request, response) = self.send(Method::Get, path, query, selector)?;
        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(value),
            Err(source) if response.is_success() => Err(RemoteError::Decode {
                url: request.redacted_url(),
                source,
            }),
            Err(_) => Err(RemoteError::Api {
                url: request.redacted_url(),
                status: response.status,
                message: error_message(&response.body),
            }),
        }
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        selector: &mut CredentialSelector,
    ) -> Result<(Request, RawResponse), RemoteError> {
        loop {
            let Some(token) = self.credentials.get(selector) else {
                return Err(RemoteError::NoValidCredential {
                    attempted: self.credentials.len(),
                });
            };

            let mut params: Vec<(String, String)> = query
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect();
            params.push((CREDENTIAL_PARAM.to_owned(), token.to_owned()));
            let request = Request {
                method,
                url: format!("{}{path}", self.base_url),
                query: params,
            };

            tracing::debug!(method = %method, url = %request.redacted_url(), "request");
            let response = self
                .transport
                .execute(&request)
                .map_err(|source| RemoteError::from_transport(request.redacted_url(), source))?;

            match response.status {
                401 | 403 => {
                    tracing::warn!(
                        status = response.status,
                        credential = selector.index(),
                        url = %request.redacted_url(),
                        "credential rejected; falling back to next credential"
                    );
                    selector.advance();
                    continue;
                }
                300..=399 => {
                    tracing::info!(status = response.status, url = %request.redacted_url(), "redirect response")
                }
                400..=499 => {
                    tracing::warn!(status = response.status, url = %request.redacted_url(), "client error response")
                }
                500..=599 => {
                    tracing::warn!(status = response.status, url = %request.redacted_url(), "server error response")
                }
                _ => {}
            }
            return Ok((request, response));
        }
    }
}
