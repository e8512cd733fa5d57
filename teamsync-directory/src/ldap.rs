//! ldap3-backed directory session.
//!
//! One [`LdapDirectory`] is opened and bound at the start of a run and
//! unbound when dropped, on success and error paths alike.

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};

use teamsync_core::LdapSettings;

use crate::error::DirectoryError;
use crate::members::{DirectoryEntry, DirectorySource};

/// A bound LDAP connection.
pub struct LdapDirectory {
    conn: LdapConn,
    url: String,
    timeout: Duration,
}

impl LdapDirectory {
    /// Connect to `settings.url()` and bind with the configured DN.
    ///
    /// Connection failures are [`DirectoryError::Unavailable`], a rejected bind
    /// is [`DirectoryError::Bind`]; both abort the run.
    pub fn connect(settings: &LdapSettings, timeout: Duration) -> Result<Self, DirectoryError> {
        let url = settings.url();
        tracing::debug!(url = %url, "connecting to LDAP server");

        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_no_tls_verify(settings.tls_insecure);
        let mut conn = LdapConn::with_settings(conn_settings, &url).map_err(|source| {
            DirectoryError::Unavailable {
                url: url.clone(),
                source,
            }
        })?;

        tracing::debug!(bind_dn = %settings.bind_dn, "performing LDAP bind");
        conn.with_timeout(timeout)
            .simple_bind(&settings.bind_dn, &settings.bind_password)
            .and_then(|result| result.success())
            .map_err(|source| DirectoryError::Bind {
                dn: settings.bind_dn.clone(),
                source,
            })?;

        tracing::info!(url = %url, "LDAP connection established");
        Ok(Self { conn, url, timeout })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DirectorySource for LdapDirectory {
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        tracing::debug!(base = %base, filter = %filter, "LDAP search");

        let result = self
            .conn
            .with_timeout(self.timeout)
            .search(base, Scope::Subtree, filter, attributes.to_vec())
            .and_then(|result| result.success());

        match result {
            Ok((entries, _)) => Ok(entries
                .into_iter()
                .map(SearchEntry::construct)
                .map(|entry| DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                })
                .collect()),
            // A non-success result code concerns this search only.
            Err(LdapError::LdapResult { result }) => Err(DirectoryError::Search {
                filter: filter.to_owned(),
                reason: format!("rc={} {}", result.rc, result.text),
            }),
            Err(LdapError::FilterParsing) => Err(DirectoryError::Search {
                filter: filter.to_owned(),
                reason: "filter does not parse".to_owned(),
            }),
            Err(source) => Err(DirectoryError::Unavailable {
                url: self.url.clone(),
                source,
            }),
        }
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        if let Err(err) = self.conn.unbind() {
            tracing::warn!(error = %err, "error during LDAP unbind");
        }
    }
}
