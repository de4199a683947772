use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded record of accepted HMAC timestamps.
///
/// Keys are `"<ts>:<sig>"` pairs so two distinct requests signed within the
/// same second do not reject each other. Overflow evicts the oldest fifth of
/// the entries — eviction, never rejection, handles cache pressure.
#[derive(Debug)]
pub struct ReplayCache {
    seen: HashMap<String, f64>,
    capacity: usize,
    window: Duration,
}

impl ReplayCache {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            capacity,
            window,
        }
    }

    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains_key(key)
    }

    /// Insert `key` unless it was already accepted. Returns false on replay.
    ///
    /// Membership check and insert happen in one call so the caller can hold
    /// a single lock across both — two concurrent requests must never both
    /// pass for the same key.
    pub fn check_and_record(&mut self, key: &str, ts: f64, now: f64) -> bool {
        if self.seen.contains_key(key) {
            warn!(key = %key, "replay detected");
            return false;
        }
        self.seen.insert(key.to_string(), ts);

        self.purge_stale(now);
        if self.seen.len() > self.capacity {
            self.evict_oldest();
        }
        true
    }

    /// Drop entries that aged out of the replay window; they can no longer
    /// pass the drift check anyway.
    fn purge_stale(&mut self, now: f64) {
        let cutoff = now - self.window.as_secs_f64();
        self.seen.retain(|_, ts| *ts >= cutoff);
    }

    /// Remove the oldest 20% of entries.
    fn evict_oldest(&mut self) {
        let mut by_age: Vec<(String, f64)> =
            self.seen.iter().map(|(k, v)| (k.clone(), *v)).collect();
        by_age.sort_by(|a, b| a.1.total_cmp(&b.1));

        let to_remove = by_age.len() / 5;
        for (key, _) in by_age.into_iter().take(to_remove.max(1)) {
            self.seen.remove(&key);
        }
        debug!(remaining = self.seen.len(), "replay cache trimmed");
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
