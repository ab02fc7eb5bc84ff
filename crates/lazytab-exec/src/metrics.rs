//! Backend counters and tracing hooks.
//!
//! Counters are plain atomics; the span hook compiles to nothing unless the
//! `tracing` feature is on.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct BackendMetrics {
    execute_calls: AtomicU64,
    values_emitted: AtomicU64,
    aggregates_computed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub execute_calls: u64,
    pub values_emitted: u64,
    pub aggregates_computed: u64,
}

impl BackendMetrics {
    pub fn record_execute(&self) {
        self.execute_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_value(&self) {
        self.values_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregate(&self) {
        self.aggregates_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn execute_calls(&self) -> u64 {
        self.execute_calls.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            execute_calls: self.execute_calls.load(Ordering::Relaxed),
            values_emitted: self.values_emitted.load(Ordering::Relaxed),
            aggregates_computed: self.aggregates_computed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "tracing")]
pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "lazytab", event);
    let _enter = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "metric");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn emit_span(_event: &str, _key_values: &[(&str, String)]) { /* no-op */
}
