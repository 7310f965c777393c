//! Per-destination hit counters for the admin API.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Lock-free resolution counters, shared by all request handlers.
#[derive(Debug, Default)]
pub struct RewriteStats {
    hits: DashMap<String, AtomicU64>,
    unmatched: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: BTreeMap<String, u64>,
    pub unmatched: u64,
}

impl RewriteStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, destination: &str) {
        if let Some(counter) = self.hits.get(destination) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.hits
            .entry(destination.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self
                .hits
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        }
    }
}
