//! Resolution engine
//!
//! Reconciles the public bypass list, the super-admin override, the
//! role-class policy table and fine-grained grants into one decision.

pub mod decision;
pub mod metrics;

pub use decision::{Decision, DecisionReason};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::grant::{CacheConfig, CacheStats, GrantSet, GrantSource, GrantStore};
use crate::identity::Subject;
use crate::path::ResourcePath;
use crate::policy::{PolicyMode, RoleClassPolicyTable};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Grant cache configuration
    pub cache_config: CacheConfig,

    /// Enable decision counters
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_config: CacheConfig::default(),
            enable_metrics: true,
        }
    }
}

/// The access decision function
///
/// # Precedence
///
/// Evaluated top to bottom, first match wins:
///
/// ```text
/// 1. public bypass list (exact path)      -> Allow  PublicResource
/// 2. subject.is_super_admin               -> Allow  SuperAdminOverride
/// 3. mode FullBypass                      -> Allow  RoleClassBypass
/// 4. mode AllowListOnly, prefix covers    -> Allow  RoleClassAllowList
///    mode AllowListOnly, no prefix        -> Deny   RoleClassAllowListMiss
/// 5. mode Standard, granted grant covers  -> Allow  ExplicitGrant
///    mode Standard, otherwise             -> Deny   NoMatchingGrant
///    mode Standard, grants unavailable    -> Deny   StoreUnavailable
/// 6. anything else                        -> Deny   DefaultDeny
/// ```
pub struct ResolutionEngine {
    /// Policy table snapshot; replaced wholesale on reload
    policies: RwLock<Arc<RoleClassPolicyTable>>,

    /// Fine-grained grants
    grants: Arc<GrantStore>,

    /// Decision counters
    metrics: Option<Arc<MetricsCollector>>,
}

impl ResolutionEngine {
    /// Create an engine over a policy table and a grant store
    pub fn new(policies: RoleClassPolicyTable, grants: Arc<GrantStore>) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            grants,
            metrics: Some(Arc::new(MetricsCollector::new())),
        }
    }

    /// Create an engine from configuration, building the grant store
    pub fn with_config(
        policies: RoleClassPolicyTable,
        source: Arc<dyn GrantSource>,
        config: EngineConfig,
    ) -> Self {
        let grants = Arc::new(GrantStore::new(source, &config.cache_config));
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        info!(
            "ResolutionEngine initialized with {} role classes, grant ttl={:?}, metrics={}",
            policies.len(),
            config.cache_config.ttl,
            config.enable_metrics
        );

        Self {
            policies: RwLock::new(Arc::new(policies)),
            grants,
            metrics,
        }
    }

    /// Decide whether `subject` may access `resource_path`
    ///
    /// An unparseable path is denied with `DefaultDeny`.
    pub async fn decide(&self, subject: &Subject, resource_path: &str, action: Option<&str>) -> Decision {
        match ResourcePath::new(resource_path) {
            Ok(path) => self.decide_path(subject, &path, action).await,
            Err(e) => {
                debug!("Denying unparseable resource path '{}': {}", resource_path, e);
                self.finish(subject, resource_path, action, Decision::deny(DecisionReason::DefaultDeny))
            }
        }
    }

    /// Decide for an already parsed path
    pub async fn decide_path(
        &self,
        subject: &Subject,
        path: &ResourcePath,
        action: Option<&str>,
    ) -> Decision {
        let policies = self.policies();

        let decision = match Self::precedence(&policies, subject, path) {
            Some(decision) => decision,
            None => {
                let grants = self.grants.grants_for(&subject.id).await.ok();
                Self::grant_decision(grants.as_deref(), path, action)
            }
        };

        self.finish(subject, path.as_str(), action, decision)
    }

    /// Decide several paths (no action) against one policy snapshot
    ///
    /// Grants are fetched at most once, and only if some path reaches the
    /// grant rule. Decisions are returned in input order.
    pub async fn decide_many(&self, subject: &Subject, paths: &[ResourcePath]) -> Vec<Decision> {
        let policies = self.policies();
        let mut grants: Option<Option<Arc<GrantSet>>> = None;
        let mut decisions = Vec::with_capacity(paths.len());

        for path in paths {
            let decision = match Self::precedence(&policies, subject, path) {
                Some(decision) => decision,
                None => {
                    if grants.is_none() {
                        grants = Some(self.grants.grants_for(&subject.id).await.ok());
                    }
                    let fetched = grants.as_ref().and_then(|g| g.as_deref());
                    Self::grant_decision(fetched, path, None)
                }
            };
            decisions.push(self.finish(subject, path.as_str(), None, decision));
        }

        decisions
    }

    /// Rules 1-4 and 6; `None` means the grant rule (5) must decide
    fn precedence(
        policies: &RoleClassPolicyTable,
        subject: &Subject,
        path: &ResourcePath,
    ) -> Option<Decision> {
        // 1. Public bypass is a property of the resource
        if policies.is_public(path) {
            return Some(Decision::allow(DecisionReason::PublicResource));
        }

        // 2. Super admin dominates everything else
        if subject.is_super_admin {
            return Some(Decision::allow(DecisionReason::SuperAdminOverride));
        }

        let policy = policies.lookup(&subject.role_class);
        match policy.mode {
            // 3.
            PolicyMode::FullBypass => Some(Decision::allow(DecisionReason::RoleClassBypass)),
            // 4. Closed list, never falls through to grants
            PolicyMode::AllowListOnly => {
                if policy.allow_list_covers(path) {
                    Some(Decision::allow(DecisionReason::RoleClassAllowList))
                } else {
                    Some(Decision::deny(DecisionReason::RoleClassAllowListMiss))
                }
            }
            // 5.
            PolicyMode::Standard => None,
            // 6.
            PolicyMode::Deny => Some(Decision::deny(DecisionReason::DefaultDeny)),
        }
    }

    /// Rule 5; `None` grants means the store was unavailable
    fn grant_decision(grants: Option<&GrantSet>, path: &ResourcePath, action: Option<&str>) -> Decision {
        let Some(grants) = grants else {
            return Decision::deny(DecisionReason::StoreUnavailable);
        };

        match grants.resolve(path, action) {
            Some(value) if value.is_granted() => Decision::allow(DecisionReason::ExplicitGrant),
            _ => Decision::deny(DecisionReason::NoMatchingGrant),
        }
    }

    fn finish(&self, subject: &Subject, path: &str, action: Option<&str>, decision: Decision) -> Decision {
        debug!(
            "Decision: {} subject={} role_class={} path={} action={} reason={}",
            if decision.allowed { "ALLOW" } else { "DENY" },
            subject.id,
            subject.role_class,
            path,
            action.unwrap_or("-"),
            decision.reason
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&decision);
        }

        decision
    }

    /// Current policy table snapshot
    pub fn policies(&self) -> Arc<RoleClassPolicyTable> {
        self.policies.read().clone()
    }

    /// Swap in a new policy table
    ///
    /// Decisions already in flight finish against the table they started
    /// with.
    pub fn reload_policies(&self, policies: RoleClassPolicyTable) {
        let role_classes = policies.len();
        *self.policies.write() = Arc::new(policies);
        info!("Role-class policy table reloaded: {} role classes", role_classes);
    }

    /// Invalidate a subject's cached grants
    pub fn invalidate(&self, subject_id: &str) {
        self.grants.invalidate(subject_id);
    }

    /// The grant store
    pub fn grant_store(&self) -> &GrantStore {
        &self.grants
    }

    /// Grant cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.grants.cache_stats()
    }

    /// Decision counters, if enabled
    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{GrantRow, InMemoryGrantSource};
    use crate::policy::RoleClassPolicy;
    use serde_json::json;

    fn p(s: &str) -> ResourcePath {
        ResourcePath::new(s).unwrap()
    }

    fn engine(rows: Vec<GrantRow>) -> ResolutionEngine {
        let table = RoleClassPolicyTable::new(
            vec![p("/logout")],
            vec![
                RoleClassPolicy::full_bypass("director"),
                RoleClassPolicy::allow_list("accountant", vec![p("/payments")]),
                RoleClassPolicy::standard("caseworker"),
                RoleClassPolicy::deny("suspended"),
            ],
        )
        .unwrap();

        ResolutionEngine::with_config(
            table,
            Arc::new(InMemoryGrantSource::with_rows(rows)),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_each_rule_in_order() {
        let engine = engine(vec![GrantRow::new("cw", "/families", None, json!("Yes"))]);
        let caseworker = Subject::new("cw", "caseworker");

        let cases = [
            (Subject::new("x", "suspended"), "/logout", DecisionReason::PublicResource),
            (Subject::new("x", "suspended").with_super_admin(true), "/anything", DecisionReason::SuperAdminOverride),
            (Subject::new("x", "director"), "/anything", DecisionReason::RoleClassBypass),
            (Subject::new("x", "accountant"), "/payments/1", DecisionReason::RoleClassAllowList),
            (Subject::new("x", "accountant"), "/families", DecisionReason::RoleClassAllowListMiss),
            (caseworker.clone(), "/families/9", DecisionReason::ExplicitGrant),
            (caseworker, "/loans", DecisionReason::NoMatchingGrant),
            (Subject::new("x", "suspended"), "/families", DecisionReason::DefaultDeny),
            (Subject::new("x", "unknown"), "/families", DecisionReason::DefaultDeny),
        ];

        for (subject, path, reason) in cases {
            let decision = engine.decide(&subject, path, None).await;
            assert_eq!(decision.reason, reason, "{} {}", subject.role_class, path);
        }
    }

    #[tokio::test]
    async fn test_unparseable_path_is_denied() {
        let engine = engine(Vec::new());
        let decision = engine.decide(&Subject::new("x", "director"), "no-slash", None).await;
        assert_eq!(decision, Decision::deny(DecisionReason::DefaultDeny));
    }

    #[tokio::test]
    async fn test_decide_many_preserves_order() {
        let engine = engine(vec![GrantRow::new("cw", "/families", None, json!(1))]);
        let subject = Subject::new("cw", "caseworker");

        let decisions = engine
            .decide_many(&subject, &[p("/loans"), p("/logout"), p("/families/2")])
            .await;

        let reasons: Vec<_> = decisions.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DecisionReason::NoMatchingGrant,
                DecisionReason::PublicResource,
                DecisionReason::ExplicitGrant
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_policies() {
        let engine = engine(Vec::new());
        let subject = Subject::new("x", "director");
        assert!(engine.decide(&subject, "/reports", None).await.allowed);

        engine.reload_policies(RoleClassPolicyTable::empty());
        let decision = engine.decide(&subject, "/reports", None).await;
        assert_eq!(decision, Decision::deny(DecisionReason::DefaultDeny));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let engine = engine(Vec::new());
        engine.decide(&Subject::new("x", "director"), "/a", None).await;
        engine.decide(&Subject::new("x", "suspended"), "/a", None).await;

        let metrics = engine.metrics().unwrap().get_metrics();
        assert_eq!(metrics.total_decisions, 2);
        assert_eq!(metrics.allowed_decisions, 1);
    }
}
