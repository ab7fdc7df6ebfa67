//! Decision counters for the `/metrics` endpoint

use super::decision::{Decision, DecisionReason};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Write;

/// Snapshot of decision counters
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total decisions
    pub total_decisions: u64,

    /// Allowed decisions
    pub allowed_decisions: u64,

    /// Denied decisions
    pub denied_decisions: u64,

    /// Decisions per reason
    pub by_reason: HashMap<DecisionReason, u64>,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        if self.total_decisions == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / self.total_decisions as f64
        }
    }

    /// Decisions denied because the grant store was unavailable
    pub fn store_unavailable(&self) -> u64 {
        self.by_reason
            .get(&DecisionReason::StoreUnavailable)
            .copied()
            .unwrap_or(0)
    }
}

/// Thread-safe decision counter
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<EngineMetrics>,
}

impl MetricsCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision
    pub fn record_decision(&self, decision: &Decision) {
        let mut metrics = self.metrics.write();
        metrics.total_decisions += 1;

        if decision.allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }

        *metrics.by_reason.entry(decision.reason).or_insert(0) += 1;
    }

    /// Current metrics snapshot
    pub fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().clone()
    }

    /// Reset all counters
    pub fn reset(&self) {
        *self.metrics.write() = EngineMetrics::default();
    }

    /// Export counters in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read();

        let mut out = format!(
            "# HELP access_decisions_total Total number of access decisions\n\
             # TYPE access_decisions_total counter\n\
             access_decisions_total {}\n\
             \n\
             # HELP access_allowed_total Number of allowed decisions\n\
             # TYPE access_allowed_total counter\n\
             access_allowed_total {}\n\
             \n\
             # HELP access_denied_total Number of denied decisions\n\
             # TYPE access_denied_total counter\n\
             access_denied_total {}\n\
             \n\
             # HELP access_decisions_by_reason_total Decisions per precedence rule\n\
             # TYPE access_decisions_by_reason_total counter\n",
            metrics.total_decisions, metrics.allowed_decisions, metrics.denied_decisions,
        );

        for reason in DecisionReason::ALL {
            let count = metrics.by_reason.get(&reason).copied().unwrap_or(0);
            let _ = writeln!(
                out,
                "access_decisions_by_reason_total{{reason=\"{}\"}} {}",
                reason, count
            );
        }

        out
    }
}
