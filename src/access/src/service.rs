//! Access service: the entry points the embedding application calls
//!
//! Route guards call [`AccessService::check`] (or [`AccessService::guard`])
//! before running any business handler; navigation rendering calls
//! [`AccessService::menu`]. The administrative workflow that mutates grants
//! calls [`AccessService::invalidate`] afterwards.

use crate::config::PolicyConfig;
use crate::engine::{Decision, DecisionReason, ResolutionEngine};
use crate::error::{AccessError, Result};
use crate::identity::{Credential, IdentityResolver};
use crate::menu::{MenuDeriver, ResourceNode};
use crate::policy::RoleClassPolicyTable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Result of a `check` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Whether access is permitted
    pub allowed: bool,

    /// Precedence rule that decided (internal diagnostics only)
    pub reason: String,
}

impl From<Decision> for CheckOutcome {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: decision.allowed,
            reason: decision.reason.as_str().to_string(),
        }
    }
}

/// What a route guard should do, without the reason behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Run the handler
    Proceed,
    /// Generic forbidden response
    Forbidden,
    /// Not logged in
    Unauthenticated,
    /// Authorization system degraded; retryable
    Unavailable,
}

impl From<Decision> for GuardOutcome {
    fn from(decision: Decision) -> Self {
        match (decision.allowed, decision.reason) {
            (true, _) => Self::Proceed,
            (false, DecisionReason::StoreUnavailable) => Self::Unavailable,
            (false, _) => Self::Forbidden,
        }
    }
}

/// Facade over identity resolution, the engine and menu derivation
#[derive(Clone)]
pub struct AccessService {
    identity: IdentityResolver,
    engine: Arc<ResolutionEngine>,
    menus: MenuDeriver,
}

impl AccessService {
    /// Create the service
    pub fn new(identity: IdentityResolver, engine: Arc<ResolutionEngine>) -> Self {
        let menus = MenuDeriver::new(engine.clone());
        Self {
            identity,
            engine,
            menus,
        }
    }

    /// Check access for a subject id
    ///
    /// # Errors
    ///
    /// `Unauthenticated` if the subject cannot be resolved. Denials are
    /// returned as `Ok` outcomes.
    pub async fn check(
        &self,
        subject_id: &str,
        resource_path: &str,
        action: Option<&str>,
    ) -> Result<CheckOutcome> {
        let subject = self.identity.resolve_subject(subject_id).await?;
        let decision = self.engine.decide(&subject, resource_path, action).await;
        Ok(decision.into())
    }

    /// Check access for a session credential
    pub async fn check_credential(
        &self,
        credential: &Credential,
        resource_path: &str,
        action: Option<&str>,
    ) -> Result<CheckOutcome> {
        let subject = self.identity.resolve(credential).await?;
        let decision = self.engine.decide(&subject, resource_path, action).await;
        Ok(decision.into())
    }

    /// Route-guard variant of `check` that hides the reason
    pub async fn guard(&self, subject_id: &str, resource_path: &str, action: Option<&str>) -> GuardOutcome {
        match self.identity.resolve_subject(subject_id).await {
            Ok(subject) => self.engine.decide(&subject, resource_path, action).await.into(),
            Err(e) => {
                debug!("Guard rejected unauthenticated request: {}", e);
                GuardOutcome::Unauthenticated
            }
        }
    }

    /// Navigation menu for a subject id
    pub async fn menu(&self, subject_id: &str, catalog: &ResourceNode) -> Result<ResourceNode> {
        let subject = self.identity.resolve_subject(subject_id).await?;
        Ok(self.menus.derive_menu(&subject, catalog).await)
    }

    /// Invalidate a subject's cached grants after an administrative change
    pub fn invalidate(&self, subject_id: &str) {
        self.engine.invalidate(subject_id);
    }

    /// Replace the role-class policy table
    ///
    /// The current table stays in place if the new configuration is invalid.
    pub fn reload_policies(&self, config: &PolicyConfig) -> Result<()> {
        let table = RoleClassPolicyTable::from_config(config)?;
        self.engine.reload_policies(table);
        Ok(())
    }

    /// The underlying engine
    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }
}

impl GuardOutcome {
    /// Convert a `check` result into a guard outcome
    pub fn from_check(result: &Result<CheckOutcome>) -> Self {
        match result {
            Ok(outcome) if outcome.allowed => Self::Proceed,
            Ok(outcome) if outcome.reason == DecisionReason::StoreUnavailable.as_str() => Self::Unavailable,
            Ok(_) => Self::Forbidden,
            Err(AccessError::Unauthenticated(_)) => Self::Unauthenticated,
            Err(_) => Self::Unavailable,
        }
    }
}
