//! Configuration loading.
//!
//! # Sources
//!
//! 1. YAML file (`--config`, default `config.yaml`) using the historical
//!    PascalCase key names (`ApiKeys.TokenKey`, `LdapURL`, ...).
//! 2. Environment variables (`GITEA_TOKEN`, `GITEA_URL`, `LDAP_URL`, ...) when
//!    the file cannot be read or parsed.
//!
//! # API pattern
//!
//! Environment loading has two forms:
//! - `from_lookup(f)`: explicit variable lookup; used in tests
//! - `from_env()`: reads the process environment, delegates to `from_lookup`
//!
//! A raw [`Config`] is turned into typed [`Settings`] by [`Config::validate`],
//! which is where defaults are applied and unsafe gaps are rejected.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Matching, TeamExclusion};

pub const DEFAULT_IDENTITY_ATTRIBUTE: &str = "uid";
pub const DEFAULT_FULL_NAME_ATTRIBUTE: &str = "sn";
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 2;
pub const LDAP_PORT: u16 = 389;
pub const LDAPS_PORT: u16 = 636;

/// Placeholder in `LDAP_FILTER` replaced by the (escaped) team name.
pub const FILTER_PLACEHOLDER: &str = "%s";

// ---------------------------------------------------------------------------
// 1. Raw configuration
// ---------------------------------------------------------------------------

/// Remote store credentials and endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(rename = "TokenKey", default)]
    pub token_key: Vec<String>,
    #[serde(rename = "BaseUrl", default)]
    pub base_url: String,
}

/// Configuration exactly as read from YAML or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "ApiKeys")]
    pub api_keys: ApiKeys,
    #[serde(rename = "LdapURL")]
    pub ldap_url: String,
    #[serde(rename = "LdapPort")]
    pub ldap_port: Option<i64>,
    #[serde(rename = "LdapTLS")]
    pub ldap_tls: bool,
    #[serde(rename = "LdapTLSInsecure")]
    pub ldap_tls_insecure: bool,
    #[serde(rename = "LdapBindDN")]
    pub ldap_bind_dn: String,
    #[serde(rename = "LdapBindPassword")]
    pub ldap_bind_password: String,
    #[serde(rename = "LdapFilter")]
    pub ldap_filter: String,
    #[serde(rename = "LdapUserSearchBase")]
    pub ldap_user_search_base: String,
    #[serde(rename = "ReqTime")]
    pub req_time: Option<String>,
    #[serde(rename = "LdapUserIdentityAttribute")]
    pub ldap_user_identity_attribute: String,
    #[serde(rename = "LdapUserFullName")]
    pub ldap_user_full_name: String,
    #[serde(rename = "ExcludedTeams")]
    pub excluded_teams: Option<Vec<String>>,
    #[serde(rename = "ExcludedPermissions")]
    pub excluded_permissions: Option<Vec<String>>,
    #[serde(rename = "KeyMatching")]
    pub key_matching: Option<Matching>,
    #[serde(rename = "LoginMatching")]
    pub login_matching: Option<Matching>,
    #[serde(rename = "PageLimit")]
    pub page_limit: Option<u32>,
    #[serde(rename = "RequestTimeoutSecs")]
    pub request_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

impl Config {
    /// Load from `path`, falling back to the environment when the file is
    /// missing or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match Self::from_yaml_file(path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "imported YAML config");
                Ok(config)
            }
            Err(err) => {
                tracing::warn!(error = %err, "falling back to settings from environment variables");
                Self::from_env()
            }
        }
    }

    /// Parse a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `from_lookup` over the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from environment-style variables. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config {
            api_keys: ApiKeys {
                token_key: var("GITEA_TOKEN")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                base_url: var("GITEA_URL").unwrap_or_default(),
            },
            ldap_url: var("LDAP_URL").unwrap_or_default(),
            ldap_bind_dn: var("BIND_DN").unwrap_or_default(),
            ldap_bind_password: var("BIND_PASSWORD").unwrap_or_default(),
            ldap_filter: var("LDAP_FILTER").unwrap_or_default(),
            ldap_user_search_base: var("LDAP_USER_SEARCH_BASE").unwrap_or_default(),
            ldap_user_identity_attribute: var("LDAP_USER_IDENTITY_ATTRIBUTE").unwrap_or_default(),
            ldap_user_full_name: var("LDAP_USER_FULL_NAME").unwrap_or_default(),
            req_time: var("REP_TIME"),
            excluded_teams: var("EXCLUDED_TEAMS").map(|v| split_list(&v)),
            excluded_permissions: var("EXCLUDED_PERMISSIONS").map(|v| split_list(&v)),
            ..Config::default()
        };

        // LDAP_TLS_PORT wins over LDAP_PORT and implies TLS.
        if let Some(port) = var("LDAP_TLS_PORT") {
            config.ldap_port = Some(parse_number("LDAP_TLS_PORT", &port)?);
            config.ldap_tls = true;
        } else if let Some(port) = var("LDAP_PORT") {
            config.ldap_port = Some(parse_number("LDAP_PORT", &port)?);
        }

        if let Some(value) = var("LDAP_TLS_INSECURE") {
            config.ldap_tls_insecure = parse_bool("LDAP_TLS_INSECURE", &value)?;
        }
        if let Some(value) = var("KEY_MATCHING") {
            config.key_matching = Some(parse_matching("KEY_MATCHING", &value)?);
        }
        if let Some(value) = var("LOGIN_MATCHING") {
            config.login_matching = Some(parse_matching("LOGIN_MATCHING", &value)?);
        }
        if let Some(value) = var("PAGE_LIMIT") {
            config.page_limit = Some(parse_number("PAGE_LIMIT", &value)?);
        }
        if let Some(value) = var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(parse_number("REQUEST_TIMEOUT_SECS", &value)?);
        }

        Ok(config)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("'{value}' is not a valid number: {e}"),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

fn parse_matching(key: &'static str, value: &str) -> Result<Matching, ConfigError> {
    value
        .parse()
        .map_err(|reason| ConfigError::Invalid { key, reason })
}

// ---------------------------------------------------------------------------
// 3. Validated settings
// ---------------------------------------------------------------------------

/// Remote store endpoint, credential pool and transport limits.
#[derive(Clone, PartialEq, Eq)]
pub struct GiteaSettings {
    pub base_url: String,
    pub tokens: Vec<String>,
    pub page_limit: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for GiteaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GiteaSettings")
            .field("base_url", &self.base_url)
            .field("tokens", &format_args!("<{} redacted>", self.tokens.len()))
            .field("page_limit", &self.page_limit)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Directory connection and per-team query settings.
#[derive(Clone, PartialEq, Eq)]
pub struct LdapSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub tls_insecure: bool,
    pub bind_dn: String,
    pub bind_password: String,
    pub filter_template: String,
    pub search_base: String,
    pub identity_attribute: String,
    pub full_name_attribute: String,
}

impl LdapSettings {
    /// `ldap://host:port` or `ldaps://host:port`.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapSettings")
            .field("url", &self.url())
            .field("tls_insecure", &self.tls_insecure)
            .field("bind_dn", &self.bind_dn)
            .field("filter_template", &self.filter_template)
            .field("search_base", &self.search_base)
            .field("identity_attribute", &self.identity_attribute)
            .field("full_name_attribute", &self.full_name_attribute)
            .finish_non_exhaustive()
    }
}

/// Everything a run needs, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gitea: GiteaSettings,
    pub ldap: LdapSettings,
    pub schedule: Option<String>,
    pub exclusion: TeamExclusion,
    pub key_matching: Matching,
    pub login_matching: Matching,
}

impl Config {
    /// Check every setting, apply defaults where safe and reject the rest.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let tokens = split_list(&self.api_keys.token_key.join(","));
        if tokens.is_empty() {
            return Err(ConfigError::Missing { key: "GITEA_TOKEN" });
        }

        let base_url = self.api_keys.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ConfigError::Missing { key: "GITEA_URL" });
        }

        let (host, tls) = split_ldap_url(&self.ldap_url, self.ldap_tls);
        if host.is_empty() {
            return Err(ConfigError::Missing { key: "LDAP_URL" });
        }

        let search_base = self.ldap_user_search_base.trim();
        if search_base.is_empty() {
            return Err(ConfigError::Missing {
                key: "LDAP_USER_SEARCH_BASE",
            });
        }

        let filter_template = self.ldap_filter.trim();
        if filter_template.is_empty() {
            return Err(ConfigError::Missing { key: "LDAP_FILTER" });
        }
        let placeholders = filter_template.matches(FILTER_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(ConfigError::Invalid {
                key: "LDAP_FILTER",
                reason: format!(
                    "expected exactly one '{FILTER_PLACEHOLDER}' placeholder, found {placeholders}"
                ),
            });
        }

        let port = match self.ldap_port {
            Some(port) => u16::try_from(port)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: if tls { "LDAP_TLS_PORT" } else { "LDAP_PORT" },
                    reason: format!("{port} is not a valid port"),
                })?,
            None => {
                let port = if tls { LDAPS_PORT } else { LDAP_PORT };
                tracing::warn!(port, "no LDAP port configured, using default");
                port
            }
        };

        if self.ldap_bind_dn.is_empty() {
            tracing::warn!("BIND_DN is empty");
        }
        if self.ldap_bind_password.is_empty() {
            tracing::warn!("BIND_PASSWORD is empty");
        }

        let identity_attribute = or_default(
            &self.ldap_user_identity_attribute,
            "LDAP_USER_IDENTITY_ATTRIBUTE",
            DEFAULT_IDENTITY_ATTRIBUTE,
        );
        let full_name_attribute = or_default(
            &self.ldap_user_full_name,
            "LDAP_USER_FULL_NAME",
            DEFAULT_FULL_NAME_ATTRIBUTE,
        );

        let page_limit = self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "PAGE_LIMIT",
                reason: "must be greater than zero".to_owned(),
            });
        }

        let timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                reason: "must be greater than zero".to_owned(),
            });
        }

        let defaults = TeamExclusion::default();
        let exclusion = TeamExclusion {
            names: self.excluded_teams.clone().unwrap_or(defaults.names),
            permissions: self
                .excluded_permissions
                .clone()
                .unwrap_or(defaults.permissions),
        };

        Ok(Settings {
            gitea: GiteaSettings {
                base_url: base_url.to_owned(),
                tokens,
                page_limit,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            ldap: LdapSettings {
                host,
                port,
                tls,
                tls_insecure: self.ldap_tls_insecure,
                bind_dn: self.ldap_bind_dn.clone(),
                bind_password: self.ldap_bind_password.clone(),
                filter_template: filter_template.to_owned(),
                search_base: search_base.to_owned(),
                identity_attribute,
                full_name_attribute,
            },
            schedule: self
                .req_time
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            exclusion,
            key_matching: self.key_matching.unwrap_or(Matching::CaseInsensitive),
            login_matching: self.login_matching.unwrap_or(Matching::CaseInsensitive),
        })
    }
}

fn or_default(value: &str, key: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        tracing::warn!("{key} not set, using '{default}'");
        default.to_owned()
    } else {
        value.to_owned()
    }
}

/// Accepts a bare host or an `ldap://` / `ldaps://` URL; the `ldaps` scheme
/// implies TLS.
fn split_ldap_url(raw: &str, tls: bool) -> (String, bool) {
    let raw = raw.trim();
    let (rest, tls) = if let Some(rest) = raw.strip_prefix("ldaps://") {
        (rest, true)
    } else if let Some(rest) = raw.strip_prefix("ldap://") {
        (rest, tls)
    } else {
        (raw, tls)
    };
    (rest.trim_end_matches('/').to_owned(), tls)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
