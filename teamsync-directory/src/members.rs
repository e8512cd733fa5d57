//! Desired membership for one team.

use std::collections::HashMap;

use teamsync_core::{Identity, LdapSettings, Membership};

use crate::error::DirectoryError;
use crate::filter::build_filter;

/// One search result: DN plus textual attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `attribute`. Attribute names compare case-insensitively,
    /// servers are free to echo them back in a different case.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// Executes subtree searches. Implemented by [`LdapDirectory`](crate::LdapDirectory)
/// and by in-memory fakes in tests.
pub trait DirectorySource {
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;
}

/// Per-team query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberQuery {
    pub filter_template: String,
    pub search_base: String,
    pub identity_attribute: String,
    pub full_name_attribute: String,
}

impl MemberQuery {
    pub fn from_settings(settings: &LdapSettings) -> Self {
        Self {
            filter_template: settings.filter_template.clone(),
            search_base: settings.search_base.clone(),
            identity_attribute: settings.identity_attribute.clone(),
            full_name_attribute: settings.full_name_attribute.clone(),
        }
    }
}

/// Search the directory for the members of `team_name`.
///
/// A search that succeeds with zero entries yields an empty membership; only a
/// failed search is an error. Entries without the identity attribute are
/// skipped. When the full-name attribute is absent the key doubles as the
/// display name.
pub fn fetch_desired_members<D>(
    source: &mut D,
    team_name: &str,
    query: &MemberQuery,
) -> Result<Membership, DirectoryError>
where
    D: DirectorySource + ?Sized,
{
    let filter = build_filter(&query.filter_template, team_name);
    let attributes = [
        query.identity_attribute.as_str(),
        query.full_name_attribute.as_str(),
    ];
    let entries = source.search(&query.search_base, &filter, &attributes)?;

    let mut members = Membership::new();
    for entry in entries {
        let Some(key) = entry
            .first(&query.identity_attribute)
            .map(str::trim)
            .filter(|k| !k.is_empty())
        else {
            tracing::warn!(
                dn = %entry.dn,
                attribute = %query.identity_attribute,
                "directory entry has no identity attribute; skipping"
            );
            continue;
        };
        let display_name = entry
            .first(&query.full_name_attribute)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(key);
        let identity = Identity::from_directory(key, display_name);
        members.insert(identity.key.clone(), identity);
    }

    tracing::info!(
        team = %team_name,
        members = members.len(),
        "directory search complete"
    );
    Ok(members)
}

#[cfg(test)]
mod tests {
    use teamsync_core::ExternalKey;

    use super::*;

    struct StaticDirectory {
        result: Option<Vec<DirectoryEntry>>,
        seen: Vec<(String, String, Vec<String>)>,
    }

    impl DirectorySource for StaticDirectory {
        fn search(
            &mut self,
            base: &str,
            filter: &str,
            attributes: &[&str],
        ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
            self.seen.push((
                base.to_owned(),
                filter.to_owned(),
                attributes.iter().map(|a| a.to_string()).collect(),
            ));
            self.result
                .clone()
                .ok_or_else(|| DirectoryError::Search {
                    filter: filter.to_owned(),
                    reason: "noSuchObject".to_owned(),
                })
        }
    }

    fn entry(dn: &str, attrs: &[(&str, &str)]) -> DirectoryEntry {
        DirectoryEntry {
            dn: dn.to_owned(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
        }
    }

    fn query() -> MemberQuery {
        MemberQuery {
            filter_template: "(memberOf=cn=%s,ou=groups,dc=example,dc=org)".into(),
            search_base: "ou=people,dc=example,dc=org".into(),
            identity_attribute: "uid".into(),
            full_name_attribute: "sn".into(),
        }
    }

    #[test]
    fn entries_become_identities_keyed_by_uid() {
        let mut dir = StaticDirectory {
            result: Some(vec![
                entry("uid=alice", &[("uid", "alice"), ("sn", "Alice A")]),
                entry("uid=carol", &[("UID", "carol"), ("SN", "Carol C")]),
            ]),
            seen: vec![],
        };

        let members = fetch_desired_members(&mut dir, "eng", &query()).expect("fetch");
        assert_eq!(members.len(), 2);
        let alice = &members[&ExternalKey::from("alice")];
        assert_eq!(alice.display_name, "Alice A");
        assert_eq!(alice.login, "alice");
        assert_eq!(members[&ExternalKey::from("carol")].display_name, "Carol C");

        let (base, filter, attrs) = &dir.seen[0];
        assert_eq!(base, "ou=people,dc=example,dc=org");
        assert_eq!(filter, "(memberOf=cn=eng,ou=groups,dc=example,dc=org)");
        assert_eq!(attrs, &vec!["uid".to_string(), "sn".to_string()]);
    }

    #[test]
    fn zero_entries_is_an_empty_membership_not_an_error() {
        let mut dir = StaticDirectory {
            result: Some(vec![]),
            seen: vec![],
        };
        let members = fetch_desired_members(&mut dir, "eng", &query()).expect("fetch");
        assert!(members.is_empty());
    }

    #[test]
    fn failed_search_is_an_error() {
        let mut dir = StaticDirectory {
            result: None,
            seen: vec![],
        };
        let err = fetch_desired_members(&mut dir, "eng", &query()).unwrap_err();
        assert!(matches!(err, DirectoryError::Search { .. }));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn entries_without_identity_are_skipped_and_missing_name_falls_back() {
        let mut dir = StaticDirectory {
            result: Some(vec![
                entry("cn=nobody", &[("sn", "No Body")]),
                entry("uid=dave", &[("uid", "dave")]),
            ]),
            seen: vec![],
        };
        let members = fetch_desired_members(&mut dir, "eng", &query()).expect("fetch");
        assert_eq!(members.len(), 1);
        assert_eq!(members[&ExternalKey::from("dave")].display_name, "dave");
    }

    #[test]
    fn team_name_is_escaped_in_filter() {
        let mut dir = StaticDirectory {
            result: Some(vec![]),
            seen: vec![],
        };
        fetch_desired_members(&mut dir, "ops*", &query()).expect("fetch");
        assert_eq!(
            dir.seen[0].1,
            "(memberOf=cn=ops\\2a,ou=groups,dc=example,dc=org)"
        );
    }
}
