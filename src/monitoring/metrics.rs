/*!
 * Gateway Metrics
 * Lock-free per-syscall counters with a serializable snapshot
 */

use crate::syscalls::{ErrorCategory, SyscallNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

const SYSCALLS: usize = SyscallNumber::ALL.len();
const CATEGORIES: usize = ErrorCategory::ALL.len();

/// Counters for one syscall
#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: [AtomicU64; CATEGORIES],
}

/// Call and failure counters for every socket syscall
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    per_syscall: [Counters; SYSCALLS],
    unknown_syscalls: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_success(&self, call: SyscallNumber) {
        let counters = &self.per_syscall[call.index()];
        counters.calls.fetch_add(1, Ordering::Relaxed);
        counters.successes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self, call: SyscallNumber, category: ErrorCategory) {
        let counters = &self.per_syscall[call.index()];
        counters.calls.fetch_add(1, Ordering::Relaxed);
        counters.failures[category.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown(&self) {
        self.unknown_syscalls.fetch_add(1, Ordering::Relaxed);
    }

    /// Failures of one category summed over all syscalls
    pub fn failures(&self, category: ErrorCategory) -> u64 {
        self.per_syscall
            .iter()
            .map(|c| c.failures[category.index()].load(Ordering::Relaxed))
            .sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut syscalls = BTreeMap::new();
        let mut failures_by_category = BTreeMap::new();

        for call in SyscallNumber::ALL {
            let counters = &self.per_syscall[call.index()];
            let mut failures = BTreeMap::new();
            for category in ErrorCategory::ALL {
                let count = counters.failures[category.index()].load(Ordering::Relaxed);
                if count > 0 {
                    failures.insert(category.as_str().to_string(), count);
                    *failures_by_category
                        .entry(category.as_str().to_string())
                        .or_insert(0) += count;
                }
            }
            syscalls.insert(
                call.name().to_string(),
                SyscallCounters {
                    calls: counters.calls.load(Ordering::Relaxed),
                    successes: counters.successes.load(Ordering::Relaxed),
                    failures,
                },
            );
        }

        MetricsSnapshot {
            syscalls,
            failures_by_category,
            unknown_syscalls: self.unknown_syscalls.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counters for one syscall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallCounters {
    pub calls: u64,
    pub successes: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, u64>,
}

/// Point-in-time view of all gateway counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub syscalls: BTreeMap<String, SyscallCounters>,
    pub failures_by_category: BTreeMap<String, u64>,
    pub unknown_syscalls: u64,
}

impl MetricsSnapshot {
    pub fn total_calls(&self) -> u64 {
        self.syscalls.values().map(|c| c.calls).sum()
    }
}
