//! Orchestration counters.
//!
//! The aggregator is created by the caller and handed to the orchestrator.
//! Clones share the same counters.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde::Serialize;

use crate::types::Usage;

/// Per-operation call counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub failures: u64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub invocations: u64,
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub attempts: u64,
    pub retries: u64,
    pub rounds: u64,
    pub round_cap_hits: u64,
    pub early_extractions: u64,
    pub decoder_violations: u64,
    pub operations: BTreeMap<String, OperationStats>,
    pub usage: Usage,
}

/// Shared, explicitly flushed counter set.
#[derive(Clone, Default)]
pub struct TelemetryAggregator {
    inner: Arc<RwLock<TelemetrySnapshot>>,
}

impl std::fmt::Debug for TelemetryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TelemetryAggregator")
            .field(&self.snapshot())
            .finish()
    }
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, TelemetrySnapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_invocation(&self) {
        self.write().invocations += 1;
    }

    pub fn record_attempt(&self) {
        self.write().attempts += 1;
    }

    pub fn record_retry(&self) {
        self.write().retries += 1;
    }

    /// Record one finished round with its decoder violation count and usage.
    pub fn record_round(&self, violations: usize, usage: Option<&Usage>) {
        let mut inner = self.write();
        inner.rounds += 1;
        inner.decoder_violations += violations as u64;
        if let Some(usage) = usage {
            inner.usage.merge(usage);
        }
    }

    pub fn record_operation(&self, name: &str, failed: bool) {
        let mut inner = self.write();
        let stats = inner.operations.entry(name.to_string()).or_default();
        stats.calls += 1;
        if failed {
            stats.failures += 1;
        }
    }

    pub fn record_early_extraction(&self) {
        self.write().early_extractions += 1;
    }

    pub fn record_round_cap(&self) {
        self.write().round_cap_hits += 1;
    }

    pub fn record_completed(&self) {
        self.write().completed += 1;
    }

    pub fn record_failed(&self) {
        self.write().failed += 1;
    }

    pub fn record_canceled(&self) {
        self.write().canceled += 1;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the current counters and reset them to zero.
    pub fn flush(&self) -> TelemetrySnapshot {
        std::mem::take(&mut *self.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters_and_flush_resets() {
        let telemetry = TelemetryAggregator::new();
        let handle = telemetry.clone();
        handle.record_invocation();
        handle.record_operation("lookup", false);
        handle.record_operation("lookup", true);
        handle.record_round(
            2,
            Some(&Usage {
                input_tokens: 10,
                output_tokens: 5,
                ..Default::default()
            }),
        );

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.invocations, 1);
        assert_eq!(snapshot.decoder_violations, 2);
        assert_eq!(snapshot.usage.total_tokens(), 15);
        assert_eq!(
            snapshot.operations["lookup"],
            OperationStats {
                calls: 2,
                failures: 1
            }
        );

        assert_eq!(telemetry.flush(), snapshot);
        assert_eq!(telemetry.snapshot(), TelemetrySnapshot::default());
    }
}
