//! Command metrics.
//!
//! Counts applied and rejected commands, with rejections broken down by
//! error kind. One instance is owned by each store and exposed through the
//! metrics endpoint.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CommandMetrics {
    /// Commands that validated and were applied
    applied: AtomicUsize,

    /// Commands rejected for malformed input
    rejected_validation: AtomicUsize,

    /// Commands rejected for violating an invariant
    rejected_conflict: AtomicUsize,

    /// Commands referencing a missing entity
    rejected_not_found: AtomicUsize,

    /// Commands that failed to persist
    rejected_storage: AtomicUsize,
}

impl CommandMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::Validation => &self.rejected_validation,
            ErrorKind::Conflict => &self.rejected_conflict,
            ErrorKind::NotFound => &self.rejected_not_found,
            ErrorKind::Storage => &self.rejected_storage,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    /// Total rejections across all kinds.
    pub fn rejected(&self) -> usize {
        self.rejected_validation.load(Ordering::Relaxed)
            + self.rejected_conflict.load(Ordering::Relaxed)
            + self.rejected_not_found.load(Ordering::Relaxed)
            + self.rejected_storage.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> MetricsReport {
        let applied = self.applied();
        let rejected = self.rejected();
        let total = applied + rejected;
        let acceptance_rate = if total > 0 {
            (applied as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            commands_applied: applied,
            commands_rejected: rejected,
            rejected_validation: self.rejected_validation.load(Ordering::Relaxed),
            rejected_conflict: self.rejected_conflict.load(Ordering::Relaxed),
            rejected_not_found: self.rejected_not_found.load(Ordering::Relaxed),
            rejected_storage: self.rejected_storage.load(Ordering::Relaxed),
            acceptance_rate,
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub commands_applied: usize,

    pub commands_rejected: usize,

    pub rejected_validation: usize,

    pub rejected_conflict: usize,

    pub rejected_not_found: usize,

    pub rejected_storage: usize,

    /// Applied commands as a percentage of all commands (0-100)
    pub acceptance_rate: f64,
}
