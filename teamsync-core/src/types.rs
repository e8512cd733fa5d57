//! Domain types shared by the directory adapter, the remote store adapter and
//! the reconciler.
//!
//! Organizations and teams are read-only snapshots re-fetched on every run.
//! Memberships are built per team, diffed, and discarded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The join key between the directory and the remote store
/// (a directory uid on one side, a remote login on the other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalKey(pub String);

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExternalKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Matching policy
// ---------------------------------------------------------------------------

/// How two identifiers are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Matching {
    #[default]
    Exact,
    CaseInsensitive,
}

impl Matching {
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            Matching::Exact => a == b,
            Matching::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }

    /// Canonical form of `value` under this policy, used as a map key.
    pub fn normalize(self, value: &str) -> String {
        match self {
            Matching::Exact => value.to_owned(),
            Matching::CaseInsensitive => value.to_lowercase(),
        }
    }
}

impl fmt::Display for Matching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matching::Exact => write!(f, "exact"),
            Matching::CaseInsensitive => write!(f, "case_insensitive"),
        }
    }
}

impl FromStr for Matching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "case_insensitive" | "insensitive" => Ok(Self::CaseInsensitive),
            other => Err(format!(
                "unknown matching mode '{other}'; expected: exact, case_insensitive"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Identities and memberships
// ---------------------------------------------------------------------------

/// One person as seen by either side of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub key: ExternalKey,
    pub login: String,
    /// Only used to look the person up in the remote store, never as a join key.
    pub display_name: String,
    /// Present once the identity has been resolved against the remote store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
}

impl Identity {
    /// An identity sourced from the directory; the login is the key itself.
    pub fn from_directory(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            login: key.clone(),
            key: ExternalKey(key),
            display_name: display_name.into(),
            remote_id: None,
        }
    }

    /// An identity sourced from a remote team member listing.
    pub fn from_remote(user: &RemoteUser) -> Self {
        Self {
            key: ExternalKey(user.login.clone()),
            login: user.login.clone(),
            display_name: user.full_name.clone(),
            remote_id: Some(user.id),
        }
    }
}

/// Membership of one team keyed by [`ExternalKey`]. Built fresh per team;
/// an empty map is a legitimate "no members" state.
pub type Membership = BTreeMap<ExternalKey, Identity>;

// ---------------------------------------------------------------------------
// Remote store entities
// ---------------------------------------------------------------------------

/// An organization in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

/// A team inside one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

/// A user record returned by the remote store's member listing or user search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub full_name: String,
}

// ---------------------------------------------------------------------------
// Team exclusion
// ---------------------------------------------------------------------------

/// Teams that are never synchronized, matched by name or permission level
/// (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamExclusion {
    pub names: Vec<String>,
    pub permissions: Vec<String>,
}

impl Default for TeamExclusion {
    fn default() -> Self {
        Self {
            names: vec!["Owners".to_owned()],
            permissions: vec!["owner".to_owned(), "admin".to_owned()],
        }
    }
}

impl TeamExclusion {
    pub fn excludes(&self, team: &Team) -> bool {
        let by_name = self
            .names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&team.name));
        let by_permission = team.permission.as_deref().is_some_and(|permission| {
            self.permissions
                .iter()
                .any(|p| p.eq_ignore_ascii_case(permission))
        });
        by_name || by_permission
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn team(name: &str, permission: Option<&str>) -> Team {
        Team {
            id: 1,
            name: name.to_owned(),
            permission: permission.map(str::to_owned),
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ExternalKey::from("alice").to_string(), "alice");
    }

    #[test]
    fn directory_identity_uses_key_as_login() {
        let id = Identity::from_directory("alice", "Alice A");
        assert_eq!(id.key, ExternalKey::from("alice"));
        assert_eq!(id.login, "alice");
        assert_eq!(id.remote_id, None);
    }

    #[test]
    fn remote_identity_carries_numeric_id() {
        let user = RemoteUser {
            id: 42,
            login: "bob".into(),
            full_name: "Bob B".into(),
        };
        let id = Identity::from_remote(&user);
        assert_eq!(id.key.0, "bob");
        assert_eq!(id.remote_id, Some(42));
    }

    #[test]
    fn matching_modes() {
        assert!(Matching::Exact.matches("alice", "alice"));
        assert!(!Matching::Exact.matches("Alice", "alice"));
        assert!(Matching::CaseInsensitive.matches("Alice", "alice"));
        assert_eq!(Matching::CaseInsensitive.normalize("ALICE"), "alice");
        assert_eq!(Matching::Exact.normalize("ALICE"), "ALICE");
    }

    #[test]
    fn matching_parses_from_str() {
        assert_eq!("exact".parse::<Matching>(), Ok(Matching::Exact));
        assert_eq!(
            "Case_Insensitive".parse::<Matching>(),
            Ok(Matching::CaseInsensitive)
        );
        assert!("fuzzy".parse::<Matching>().is_err());
    }

    #[test]
    fn default_exclusion_skips_owners_by_name_and_permission() {
        let exclusion = TeamExclusion::default();
        assert!(exclusion.excludes(&team("Owners", None)));
        assert!(exclusion.excludes(&team("owners", Some("read"))));
        assert!(exclusion.excludes(&team("Admins", Some("owner"))));
        assert!(exclusion.excludes(&team("Maintainers", Some("admin"))));
        assert!(!exclusion.excludes(&team("eng", Some("write"))));
        assert!(!exclusion.excludes(&team("eng", None)));
    }
}
