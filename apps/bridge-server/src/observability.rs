use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::StopReason;

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("craftlink_bridge=debug,tower_http=trace"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Process-lifetime counters, reported on `/health`.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    events_admitted: AtomicU64,
    reactions_fired: AtomicU64,
    reactions_failed: AtomicU64,
    runs_reached: AtomicU64,
    runs_stuck: AtomicU64,
    runs_timeout: AtomicU64,
    runs_unknown: AtomicU64,
    runs_failed: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub events_admitted: u64,
    pub reactions_fired: u64,
    pub reactions_failed: u64,
    pub movement_reached_target: u64,
    pub movement_stuck: u64,
    pub movement_timeout: u64,
    pub movement_unknown: u64,
    pub movement_failed: u64,
}

impl BridgeMetrics {
    pub fn event_admitted(&self) {
        self.events_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reaction_fired(&self) {
        self.reactions_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reaction_failed(&self) {
        self.reactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn movement_finished(&self, reason: StopReason) {
        let counter = match reason {
            StopReason::ReachedTarget => &self.runs_reached,
            StopReason::Stuck => &self.runs_stuck,
            StopReason::Timeout => &self.runs_timeout,
            StopReason::Unknown => &self.runs_unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn movement_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_admitted: self.events_admitted.load(Ordering::Relaxed),
            reactions_fired: self.reactions_fired.load(Ordering::Relaxed),
            reactions_failed: self.reactions_failed.load(Ordering::Relaxed),
            movement_reached_target: self.runs_reached.load(Ordering::Relaxed),
            movement_stuck: self.runs_stuck.load(Ordering::Relaxed),
            movement_timeout: self.runs_timeout.load(Ordering::Relaxed),
            movement_unknown: self.runs_unknown.load(Ordering::Relaxed),
            movement_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }
}
