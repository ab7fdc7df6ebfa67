//! Access decisions and the reasons behind them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which precedence rule produced a decision
///
/// For diagnostics and logging only; end users see a generic outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionReason {
    /// Resource is on the public bypass list
    PublicResource,
    /// Subject is a super admin
    SuperAdminOverride,
    /// Role class has full bypass
    RoleClassBypass,
    /// Role-class allow-list covers the resource
    RoleClassAllowList,
    /// Role class is allow-list only and nothing covers the resource
    RoleClassAllowListMiss,
    /// A granted permission covers the resource
    ExplicitGrant,
    /// No granted permission covers the resource
    NoMatchingGrant,
    /// Grants could not be fetched
    StoreUnavailable,
    /// Nothing allowed the request
    DefaultDeny,
}

impl DecisionReason {
    /// All reasons, in precedence order
    pub const ALL: [DecisionReason; 9] = [
        Self::PublicResource,
        Self::SuperAdminOverride,
        Self::RoleClassBypass,
        Self::RoleClassAllowList,
        Self::RoleClassAllowListMiss,
        Self::ExplicitGrant,
        Self::NoMatchingGrant,
        Self::StoreUnavailable,
        Self::DefaultDeny,
    ];

    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicResource => "PublicResource",
            Self::SuperAdminOverride => "SuperAdminOverride",
            Self::RoleClassBypass => "RoleClassBypass",
            Self::RoleClassAllowList => "RoleClassAllowList",
            Self::RoleClassAllowListMiss => "RoleClassAllowListMiss",
            Self::ExplicitGrant => "ExplicitGrant",
            Self::NoMatchingGrant => "NoMatchingGrant",
            Self::StoreUnavailable => "StoreUnavailable",
            Self::DefaultDeny => "DefaultDeny",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one access check
///
/// A plain value: identical inputs produce equal decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is permitted
    pub allowed: bool,

    /// Rule that decided
    pub reason: DecisionReason,
}

impl Decision {
    /// Allow decision
    pub fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    /// Deny decision
    pub fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    /// Whether the grant store was unavailable for this decision
    pub fn is_degraded(&self) -> bool {
        self.reason == DecisionReason::StoreUnavailable
    }
}
