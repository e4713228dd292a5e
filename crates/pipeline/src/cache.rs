//! In-memory report cache keyed by batch content hash.
//!
//! Entries expire after a fixed TTL. Only reports backed by real service
//! answers are stored; fallback reports are never cached. Nothing is
//! persisted across process restarts.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::outcome::AnalysisOutcome;

/// Shared cache of recent outcomes. Wrap in an `Arc` to share.
pub struct ReportCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    stored_at: Instant,
    outcome: AnalysisOutcome,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<AnalysisOutcome> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.outcome.clone())
    }

    /// Store `outcome` under `key`. Fallback outcomes are ignored.
    pub async fn insert(&self, key: String, outcome: &AnalysisOutcome) {
        if outcome.is_fallback() || self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                outcome: outcome.clone(),
            },
        );
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
