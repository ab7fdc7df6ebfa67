//! Configuration formats and loaders
//!
//! Three JSON documents configure the engine:
//!
//! - the role-class policy table ([`PolicyConfig`]), loaded at start and on
//!   explicit reload
//! - an identity directory ([`IdentityDirectoryConfig`]) for deployments
//!   without an external identity store
//! - a grant seed (a JSON array of [`GrantRow`]) for the in-memory grant
//!   source
//!
//! [`ServerConfig`] reads the HTTP server's environment.

use crate::error::{AccessError, Result};
use crate::grant::{CacheConfig, GrantRow};
use crate::identity::{Credential, InMemoryIdentityStore, RoleClass, SubjectRecord};
use crate::path::ResourcePath;
use crate::policy::PolicyMode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One role-class entry of the policy table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleClassEntry {
    /// Role class name
    pub role_class: RoleClass,

    /// Evaluation mode
    pub mode: PolicyMode,

    /// Allow-listed prefixes (`AllowListOnly` only)
    #[serde(default)]
    pub allowed_prefixes: Vec<ResourcePath>,
}

/// Policy table file format
///
/// ```json
/// {
///   "publicPaths": ["/logout", "/home"],
///   "roleClasses": [
///     { "roleClass": "director", "mode": "FullBypass" },
///     { "roleClass": "accountant", "mode": "AllowListOnly", "allowedPrefixes": ["/payments"] },
///     { "roleClass": "caseworker", "mode": "Standard" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Paths reachable by any authenticated subject
    #[serde(default)]
    pub public_paths: Vec<ResourcePath>,

    /// Per-role-class policies
    #[serde(default)]
    pub role_classes: Vec<RoleClassEntry>,
}

impl PolicyConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        parse_json(json, "policy table")
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref(), "policy table")
    }
}

/// Identity directory file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDirectoryConfig {
    /// Known subjects
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,

    /// Session credential -> subject id
    #[serde(default)]
    pub sessions: HashMap<String, String>,
}

impl IdentityDirectoryConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref(), "identity directory")
    }

    /// Build the in-memory identity store
    pub fn into_store(self) -> InMemoryIdentityStore {
        InMemoryIdentityStore::with_records(
            self.subjects,
            self.sessions
                .into_iter()
                .map(|(credential, subject_id)| (Credential::new(credential), subject_id)),
        )
    }
}

/// Load grant rows for the in-memory grant source
pub fn load_grant_seed(path: impl AsRef<Path>) -> Result<Vec<GrantRow>> {
    read_json(path.as_ref(), "grant seed")
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    parse_json(&raw, what).map_err(|e| match e {
        AccessError::InvalidConfig(msg) => {
            AccessError::InvalidConfig(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

fn parse_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| AccessError::InvalidConfig(format!("invalid {}: {}", what, e)))
}

/// HTTP server configuration from the environment
///
/// | variable                 | default |
/// |--------------------------|---------|
/// | `PORT`                   | 8080    |
/// | `METRICS_PORT`           | 9090    |
/// | `ACCESS_POLICY_FILE`     | unset: empty table (everything but super admins denied) |
/// | `ACCESS_SUBJECTS_FILE`   | unset: empty directory |
/// | `ACCESS_GRANTS_FILE`     | unset: no grants |
/// | `GRANT_CACHE_TTL`        | 1800 (seconds) |
/// | `GRANT_CACHE_SIZE`       | 10000 |
/// | `GRANT_FETCH_TIMEOUT_MS` | 2000 |
/// | `DATABASE_URL`           | unset (postgres feature only) |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub policy_file: Option<PathBuf>,
    pub subjects_file: Option<PathBuf>,
    pub grants_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub cache: CacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            metrics_port: 9090,
            policy_file: None,
            subjects_file: None,
            grants_file: None,
            database_url: None,
            cache: CacheConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            metrics_port: lookup("METRICS_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metrics_port),
            policy_file: lookup("ACCESS_POLICY_FILE").map(PathBuf::from),
            subjects_file: lookup("ACCESS_SUBJECTS_FILE").map(PathBuf::from),
            grants_file: lookup("ACCESS_GRANTS_FILE").map(PathBuf::from),
            database_url: lookup("DATABASE_URL"),
            cache: CacheConfig {
                capacity: parsed("GRANT_CACHE_SIZE")
                    .map(|n| n as usize)
                    .unwrap_or(defaults.cache.capacity),
                ttl: parsed("GRANT_CACHE_TTL")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.ttl),
                fetch_timeout: parsed("GRANT_FETCH_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.cache.fetch_timeout),
            },
        }
    }

    /// Load the policy configuration, or an empty one if no file is set
    pub fn load_policy_config(&self) -> Result<PolicyConfig> {
        match &self.policy_file {
            Some(path) => PolicyConfig::from_file(path),
            None => Ok(PolicyConfig::default()),
        }
    }
}
