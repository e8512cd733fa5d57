//! Per-team search filter construction.

use ldap3::ldap_escape;

use teamsync_core::config::FILTER_PLACEHOLDER;

/// Substitute the team name into `template`, escaping the characters that are
/// special in filter syntax (RFC 4515) first.
///
/// Only the first placeholder is replaced; config validation guarantees there
/// is exactly one.
pub fn build_filter(template: &str, team_name: &str) -> String {
    template.replacen(FILTER_PLACEHOLDER, &ldap_escape(team_name), 1)
}
