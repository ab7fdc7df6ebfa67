//! Role-class policy table
//!
//! Static configuration mapping each role class to exactly one
//! [`PolicyMode`], plus the public bypass list. Unknown role classes get
//! the `Deny` mode with an empty allow-list.

use crate::config::PolicyConfig;
use crate::error::{AccessError, Result};
use crate::identity::RoleClass;
use crate::path::{PathTrie, ResourcePath};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// How a role class is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyMode {
    /// Every resource is allowed
    #[serde(alias = "full_bypass")]
    FullBypass,
    /// Only resources under `allowed_prefixes`; grants are never consulted
    #[serde(alias = "allow_list_only")]
    AllowListOnly,
    /// Fine-grained permission grants decide
    #[serde(alias = "standard")]
    Standard,
    /// Nothing beyond public resources
    #[serde(alias = "deny")]
    Deny,
}

/// Policy for one role class
#[derive(Debug, Clone)]
pub struct RoleClassPolicy {
    /// Role class this policy applies to
    pub role_class: RoleClass,

    /// Evaluation mode
    pub mode: PolicyMode,

    /// Allow-listed prefixes (only meaningful for `AllowListOnly`)
    pub allowed_prefixes: Vec<ResourcePath>,

    prefix_trie: PathTrie<()>,
}

impl RoleClassPolicy {
    /// Build a policy
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when prefixes are given for a mode other than
    /// `AllowListOnly`.
    pub fn new(
        role_class: RoleClass,
        mode: PolicyMode,
        allowed_prefixes: Vec<ResourcePath>,
    ) -> Result<Self> {
        if mode != PolicyMode::AllowListOnly && !allowed_prefixes.is_empty() {
            return Err(AccessError::InvalidConfig(format!(
                "role class '{}' has allowedPrefixes but mode {:?}",
                role_class, mode
            )));
        }

        let prefix_trie = allowed_prefixes.iter().map(|p| (p.clone(), ())).collect();

        Ok(Self {
            role_class,
            mode,
            allowed_prefixes,
            prefix_trie,
        })
    }

    /// Full-bypass policy
    pub fn full_bypass(role_class: impl Into<RoleClass>) -> Self {
        Self::unlisted(role_class.into(), PolicyMode::FullBypass)
    }

    /// Grant-driven policy
    pub fn standard(role_class: impl Into<RoleClass>) -> Self {
        Self::unlisted(role_class.into(), PolicyMode::Standard)
    }

    /// Deny-everything policy
    pub fn deny(role_class: impl Into<RoleClass>) -> Self {
        Self::unlisted(role_class.into(), PolicyMode::Deny)
    }

    /// Closed allow-list policy
    pub fn allow_list<I>(role_class: impl Into<RoleClass>, prefixes: I) -> Self
    where
        I: IntoIterator<Item = ResourcePath>,
    {
        let allowed_prefixes: Vec<ResourcePath> = prefixes.into_iter().collect();
        let prefix_trie = allowed_prefixes.iter().map(|p| (p.clone(), ())).collect();

        Self {
            role_class: role_class.into(),
            mode: PolicyMode::AllowListOnly,
            allowed_prefixes,
            prefix_trie,
        }
    }

    fn unlisted(role_class: RoleClass, mode: PolicyMode) -> Self {
        Self {
            role_class,
            mode,
            allowed_prefixes: Vec::new(),
            prefix_trie: PathTrie::new(),
        }
    }

    /// Whether an allow-list prefix covers `path`
    pub fn allow_list_covers(&self, path: &ResourcePath) -> bool {
        self.prefix_trie.covers(path)
    }
}

/// The consolidated role-class policy table
#[derive(Debug, Clone)]
pub struct RoleClassPolicyTable {
    policies: HashMap<RoleClass, RoleClassPolicy>,
    public_paths: HashSet<ResourcePath>,
    fallback: RoleClassPolicy,
}

impl RoleClassPolicyTable {
    /// Build a table from policies and public paths
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if a role class appears twice.
    pub fn new<P, R>(public_paths: P, policies: R) -> Result<Self>
    where
        P: IntoIterator<Item = ResourcePath>,
        R: IntoIterator<Item = RoleClassPolicy>,
    {
        let mut table = HashMap::new();
        for policy in policies {
            let role_class = policy.role_class.clone();
            if table.insert(role_class.clone(), policy).is_some() {
                return Err(AccessError::InvalidConfig(format!(
                    "duplicate role class '{}'",
                    role_class
                )));
            }
        }

        Ok(Self {
            policies: table,
            public_paths: public_paths.into_iter().collect(),
            fallback: RoleClassPolicy::deny("<unknown>"),
        })
    }

    /// Build a table from its configuration format
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let mut policies = Vec::with_capacity(config.role_classes.len());
        for entry in &config.role_classes {
            policies.push(RoleClassPolicy::new(
                entry.role_class.clone(),
                entry.mode,
                entry.allowed_prefixes.clone(),
            )?);
        }

        let table = Self::new(config.public_paths.iter().cloned(), policies)?;
        info!(
            "Loaded role-class policy table: {} role classes, {} public paths",
            table.len(),
            table.public_paths.len()
        );
        Ok(table)
    }

    /// An empty table: every role class is denied, nothing is public
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
            public_paths: HashSet::new(),
            fallback: RoleClassPolicy::deny("<unknown>"),
        }
    }

    /// Policy for a role class; unknown classes resolve to `Deny`
    pub fn lookup(&self, role_class: &RoleClass) -> &RoleClassPolicy {
        self.policies.get(role_class).unwrap_or(&self.fallback)
    }

    /// Whether `path` is on the public bypass list (exact match)
    pub fn is_public(&self, path: &ResourcePath) -> bool {
        self.public_paths.contains(path)
    }

    /// Public bypass paths
    pub fn public_paths(&self) -> impl Iterator<Item = &ResourcePath> {
        self.public_paths.iter()
    }

    /// Number of configured role classes
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no role class is configured
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for RoleClassPolicyTable {
    fn default() -> Self {
        Self::empty()
    }
}
