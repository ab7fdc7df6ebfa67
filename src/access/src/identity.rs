//! Subjects and identity resolution
//!
//! Session issuance lives outside this crate. An [`IdentityStore`] answers
//! "who is behind this credential / subject id", and the
//! [`IdentityResolver`] turns the answer into a complete [`Subject`] or an
//! `Unauthenticated` error. It never produces a partially populated subject
//! and never treats a store failure as anything but unauthenticated.

use crate::error::{AccessError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Coarse role class assigned to a subject (e.g. "caseworker", "auditor")
///
/// Role classes are open-ended data; their behavior comes from the
/// [`crate::policy::RoleClassPolicyTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleClass(String);

impl RoleClass {
    /// Create a role class from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Role class name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleClass {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for RoleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated actor an access decision is made for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Stable subject identifier from the identity supplier
    pub id: String,

    /// Coarse role class
    pub role_class: RoleClass,

    /// Super-admin override flag
    #[serde(default)]
    pub is_super_admin: bool,
}

impl Subject {
    /// Create a non-admin subject
    pub fn new(id: impl Into<String>, role_class: impl Into<RoleClass>) -> Self {
        Self {
            id: id.into(),
            role_class: role_class.into(),
            is_super_admin: false,
        }
    }

    /// Set the super-admin flag
    pub fn with_super_admin(mut self, is_super_admin: bool) -> Self {
        self.is_super_admin = is_super_admin;
        self
    }
}

/// Opaque session credential issued outside this crate
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw credential string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw credential value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Identity record as held by the external identity store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Subject identifier
    pub id: String,

    /// Role class name
    #[serde(default)]
    pub role_class: String,

    /// Super-admin flag
    #[serde(default)]
    pub super_admin: bool,
}

/// External identity store seam
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the subject behind a session credential
    async fn session(&self, credential: &Credential) -> Result<Option<SubjectRecord>>;

    /// Look up a subject by its identifier
    async fn subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>>;
}

/// In-memory identity directory
pub struct InMemoryIdentityStore {
    subjects: Arc<RwLock<HashMap<String, SubjectRecord>>>,
    sessions: Arc<RwLock<HashMap<Credential, String>>>,
}

impl InMemoryIdentityStore {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            subjects: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a directory seeded with subjects and `(credential, subject id)` sessions
    pub fn with_records<S, C>(subjects: S, sessions: C) -> Self
    where
        S: IntoIterator<Item = SubjectRecord>,
        C: IntoIterator<Item = (Credential, String)>,
    {
        let subjects = subjects.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            subjects: Arc::new(RwLock::new(subjects)),
            sessions: Arc::new(RwLock::new(sessions.into_iter().collect())),
        }
    }

    /// Register or replace a subject
    pub async fn add_subject(&self, record: SubjectRecord) {
        let mut subjects = self.subjects.write().await;
        subjects.insert(record.id.clone(), record);
    }

    /// Bind a session credential to a subject id
    pub async fn add_session(&self, credential: Credential, subject_id: impl Into<String>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(credential, subject_id.into());
    }

    /// Drop a session credential
    pub async fn revoke_session(&self, credential: &Credential) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(credential);
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn session(&self, credential: &Credential) -> Result<Option<SubjectRecord>> {
        let subject_id = {
            let sessions = self.sessions.read().await;
            match sessions.get(credential) {
                Some(id) => id.clone(),
                None => return Ok(None),
            }
        };
        self.subject(&subject_id).await
    }

    async fn subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>> {
        let subjects = self.subjects.read().await;
        Ok(subjects.get(subject_id).cloned())
    }
}

/// Resolves credentials and subject ids into complete subjects
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    /// Create a resolver over an identity store
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Resolve a session credential
    ///
    /// # Returns
    ///
    /// A complete `Subject`, or `AccessError::Unauthenticated` when the
    /// credential is unknown, the record is incomplete, or the store fails.
    pub async fn resolve(&self, credential: &Credential) -> Result<Subject> {
        let lookup = self.store.session(credential).await;
        Self::into_subject(lookup, "session credential")
    }

    /// Resolve a subject by identifier
    pub async fn resolve_subject(&self, subject_id: &str) -> Result<Subject> {
        if subject_id.trim().is_empty() {
            return Err(AccessError::Unauthenticated("empty subject id".to_string()));
        }
        let lookup = self.store.subject(subject_id).await;
        Self::into_subject(lookup, subject_id)
    }

    fn into_subject(lookup: Result<Option<SubjectRecord>>, what: &str) -> Result<Subject> {
        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No identity for {}", what);
                return Err(AccessError::Unauthenticated(format!("unknown {}", what)));
            }
            Err(e) => {
                warn!("Identity store lookup failed: {}", e);
                return Err(AccessError::Unauthenticated("identity store unavailable".to_string()));
            }
        };

        if record.id.trim().is_empty() || record.role_class.trim().is_empty() {
            warn!("Incomplete identity record for {}", what);
            return Err(AccessError::Unauthenticated("incomplete identity record".to_string()));
        }

        Ok(Subject {
            id: record.id,
            role_class: RoleClass::new(record.role_class),
            is_super_admin: record.super_admin,
        })
    }
}
