use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_TTL: Duration = Duration::from_secs(300);

/// Freshness windows, both measured from when the payload was fetched.
///
/// `stale` is never shorter than `fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    fresh: Duration,
    stale: Duration,
}

impl CacheTtl {
    pub fn new(fresh: Duration, stale: Duration) -> Self {
        Self {
            fresh,
            stale: stale.max(fresh),
        }
    }

    pub fn fresh(&self) -> Duration {
        self.fresh
    }

    pub fn stale(&self) -> Duration {
        self.stale
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::new(DEFAULT_FRESH_TTL, DEFAULT_STALE_TTL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Fresh,
    /// Served as-is while a background refresh runs.
    Stale,
    /// Past the stale window; behaves like a miss.
    Expired,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: V,
    pub created_at: Instant,
    pub fresh_until: Instant,
    pub stale_until: Instant,
    /// Bumped on every write so late refreshes can tell they were superseded.
    pub(crate) generation: u64,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(key: &str, payload: V, ttl: CacheTtl, generation: u64) -> Self {
        let created_at = Instant::now();
        Self {
            key: key.to_string(),
            payload,
            created_at,
            fresh_until: created_at + ttl.fresh(),
            stale_until: created_at + ttl.stale(),
            generation,
        }
    }

    pub fn state_at(&self, now: Instant) -> EntryState {
        if now <= self.fresh_until {
            EntryState::Fresh
        } else if now <= self.stale_until {
            EntryState::Stale
        } else {
            EntryState::Expired
        }
    }
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub foreground_failures: u64,
    pub refreshes_started: u64,
    pub refreshes_succeeded: u64,
    pub refresh_failures: u64,
    /// Refreshes that finished after their entry was invalidated or replaced.
    pub refreshes_discarded: u64,
    /// Foreground fetches returned to the caller but not cached because an
    /// invalidation ran while they were in progress.
    pub fetches_discarded: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub fresh_hits: AtomicU64,
    pub stale_hits: AtomicU64,
    pub misses: AtomicU64,
    pub foreground_failures: AtomicU64,
    pub refreshes_started: AtomicU64,
    pub refreshes_succeeded: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub refreshes_discarded: AtomicU64,
    pub fetches_discarded: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            fresh_hits: load(&self.fresh_hits),
            stale_hits: load(&self.stale_hits),
            misses: load(&self.misses),
            foreground_failures: load(&self.foreground_failures),
            refreshes_started: load(&self.refreshes_started),
            refreshes_succeeded: load(&self.refreshes_succeeded),
            refresh_failures: load(&self.refresh_failures),
            refreshes_discarded: load(&self.refreshes_discarded),
            fetches_discarded: load(&self.fetches_discarded),
        }
    }
}
