//! Response cache keyed by `METHOD:url`.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use kbase_api::types::Envelope;

struct Slot {
    envelope: Envelope,
    stored_at: Instant,
    ttl: Duration,
}

impl Slot {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Concurrent store of decoded response envelopes.
///
/// Every slot remembers its own lifetime. Reading a stale slot evicts it;
/// [`ResponseCache::evict_stale`] sweeps the rest.
pub struct ResponseCache {
    slots: DashMap<String, Slot>,
    fallback_ttl: Duration,
}

impl ResponseCache {
    pub fn new(fallback_ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            fallback_ttl,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Envelope> {
        let now = Instant::now();
        if let Some(slot) = self.slots.get(key) {
            if slot.is_fresh(now) {
                return Some(slot.envelope.clone());
            }
        }
        self.slots.remove_if(key, |_, slot| !slot.is_fresh(now));
        None
    }

    /// Stores `envelope` for `ttl`, or for the fallback lifetime when `None`.
    pub fn store(&self, key: impl Into<String>, envelope: Envelope, ttl: Option<Duration>) {
        let slot = Slot {
            envelope,
            stored_at: Instant::now(),
            ttl: ttl.unwrap_or(self.fallback_ttl),
        };
        self.slots.insert(key.into(), slot);
    }

    /// Drops every slot whose key contains `needle`; `None` drops all.
    pub fn invalidate(&self, needle: Option<&str>) -> usize {
        let before = self.slots.len();
        match needle {
            Some(needle) => self.slots.retain(|key, _| !key.contains(needle)),
            None => self.slots.clear(),
        }
        before.saturating_sub(self.slots.len())
    }

    pub fn evict_stale(&self) -> usize {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_fresh(now));
        before.saturating_sub(self.slots.len())
    }

    /// Stored keys, sorted. Stale slots not yet evicted are included.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
