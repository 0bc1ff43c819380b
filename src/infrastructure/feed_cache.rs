// Time-bounded single-slot cache in front of the global feed
// Entries leave only by expiry; writes elsewhere never touch the slot

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }
}

/// One shared value with a fixed lifetime. Concurrent misses may both
/// recompute; the last `put` wins.
#[derive(Debug)]
pub struct TimedSlot<T> {
    slot: RwLock<Option<CacheEntry<T>>>,
    ttl: Duration,
    metrics: CacheMetrics,
}

impl<T: Clone + Send + Sync> TimedSlot<T> {
    /// A zero `ttl` disables the slot.
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            metrics: CacheMetrics::default(),
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(entry) if !entry.is_expired() => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                debug!(age_ms = entry.inserted_at.elapsed().as_millis() as u64, "slot hit");
                Some(entry.value.clone())
            }
            _ => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put(&self, value: T) {
        if self.ttl.is_zero() {
            return;
        }
        *self.slot.write().await = Some(CacheEntry::new(value, self.ttl));
        self.metrics.stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }
}
