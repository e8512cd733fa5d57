//! Gitea JSON payloads.

use serde::Deserialize;

use teamsync_core::{Organization, RemoteUser, Team};

/// `GET /api/v1/admin/orgs` item. The organization name is in `username`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrgPayload {
    pub id: i64,
    pub username: String,
}

impl From<OrgPayload> for Organization {
    fn from(p: OrgPayload) -> Self {
        Organization {
            id: p.id,
            name: p.username,
        }
    }
}

/// `GET /api/v1/orgs/{org}/teams` item.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamPayload {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub permission: Option<String>,
}

impl From<TeamPayload> for Team {
    fn from(p: TeamPayload) -> Self {
        Team {
            id: p.id,
            name: p.name,
            permission: p.permission,
        }
    }
}

/// `GET /api/v1/users/search` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub data: Vec<RemoteUser>,
    #[serde(default)]
    pub ok: bool,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

/// Human-readable reason from an error body, or the raw body when it is not
/// the usual `{"message": ...}` shape.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiMessage>(body) {
        Ok(m) if !m.message.is_empty() => m.message,
        _ => body.trim().chars().take(200).collect(),
    }
}
