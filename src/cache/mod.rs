//! Keyed TTL cache with stale-while-revalidate refreshes.
//!
//! Each key moves through fresh, stale and expired windows measured from the
//! time its payload was fetched:
//!
//! - fresh: served with no fetcher call
//! - stale: served immediately; one background refresh per key at a time
//! - missing or expired: the caller waits for the fetcher, and concurrent
//!   misses on the same key share a single fetch
//!
//! A failed or panicking background refresh keeps the old payload. It is
//! logged and counted in [`CacheStats`], never surfaced to callers. Foreground
//! fetch errors are returned unchanged.
//!
//! A fetch that overlaps an invalidation returns its result to the caller but
//! does not cache it.

mod entry;

pub use entry::{CacheEntry, CacheStats, CacheTtl, EntryState, DEFAULT_FRESH_TTL, DEFAULT_STALE_TTL};

use entry::Counters;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

type Refresh = Shared<BoxFuture<'static, ()>>;

pub struct DashboardCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for DashboardCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<V> {
    ttl: CacheTtl,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    /// Serializes foreground fetches per key.
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    in_flight: Mutex<HashMap<String, Refresh>>,
    generation: AtomicU64,
    /// Bumped by `invalidate` and `clear` while holding the entries lock.
    epoch: AtomicU64,
    counters: Counters,
}

enum Lookup<V, F> {
    Served(V),
    Miss(F),
}

impl<V> DashboardCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                entries: RwLock::new(HashMap::new()),
                key_locks: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// Read through the cache using its default TTL.
    pub async fn get<F, Fut, E>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.get_with_ttl(key, fetcher, self.inner.ttl).await
    }

    /// Read through the cache. `fetcher` runs at most once: in the foreground
    /// on a miss, in the background when the entry is stale and no refresh is
    /// already running, or not at all.
    ///
    /// # Errors
    /// Only a foreground fetch can fail, and its error is returned as-is.
    pub async fn get_with_ttl<F, Fut, E>(&self, key: &str, fetcher: F, ttl: CacheTtl) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let fetcher = match self.serve_cached(key, fetcher, ttl).await {
            Lookup::Served(payload) => return Ok(payload),
            Lookup::Miss(fetcher) => fetcher,
        };

        let lock = self.key_lock(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(key, fetcher, ttl).await
        };
        self.release_key_lock(key, lock).await;
        result
    }

    async fn fetch_locked<F, Fut, E>(&self, key: &str, fetcher: F, ttl: CacheTtl) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        // Another caller may have filled the key while we waited.
        let fetcher = match self.serve_cached(key, fetcher, ttl).await {
            Lookup::Served(payload) => return Ok(payload),
            Lookup::Miss(fetcher) => fetcher,
        };

        Counters::bump(&self.inner.counters.misses);
        let purged = self.inner.purge_expired_entries().await;
        debug!(key = %key, purged, "Cache miss, fetching in foreground");

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        match fetcher().await {
            Ok(payload) => {
                self.inner.store(key, payload.clone(), ttl, epoch).await;
                Ok(payload)
            }
            Err(e) => {
                Counters::bump(&self.inner.counters.foreground_failures);
                warn!(key = %key, error = %e, "Cache fetch failed");
                Err(e)
            }
        }
    }

    async fn serve_cached<F, Fut, E>(&self, key: &str, fetcher: F, ttl: CacheTtl) -> Lookup<V, F>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let cached = {
            let entries = self.inner.entries.read().await;
            entries
                .get(key)
                .map(|e| (e.payload.clone(), e.state_at(Instant::now()), e.generation))
        };

        match cached {
            Some((payload, EntryState::Fresh, _)) => {
                Counters::bump(&self.inner.counters.fresh_hits);
                Lookup::Served(payload)
            }
            Some((payload, EntryState::Stale, generation)) => {
                Counters::bump(&self.inner.counters.stale_hits);
                self.spawn_refresh(key, generation, fetcher, ttl).await;
                Lookup::Served(payload)
            }
            Some((_, EntryState::Expired, _)) | None => Lookup::Miss(fetcher),
        }
    }

    async fn spawn_refresh<F, Fut, E>(&self, key: &str, generation: u64, fetcher: F, ttl: CacheTtl)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight.contains_key(key) {
            return;
        }

        Counters::bump(&self.inner.counters.refreshes_started);
        debug!(key = %key, "Entry stale, refreshing in background");

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let refresh = async move {
            let outcome = AssertUnwindSafe(async move { fetcher().await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => inner.finish_refresh(&owned_key, generation, result, ttl).await,
                Err(_) => {
                    Counters::bump(&inner.counters.refresh_failures);
                    warn!(key = %owned_key, "Background refresh panicked, keeping stale payload");
                }
            }
            inner.in_flight.lock().await.remove(&owned_key);
        }
        .boxed()
        .shared();

        in_flight.insert(key.to_string(), refresh.clone());
        drop(in_flight);
        tokio::spawn(refresh);
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.key_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Give back a lock from `key_lock`, removing it from the table once
    /// no other caller holds it.
    async fn release_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.inner.key_locks.lock().await;
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    /// Drop the named keys. Returns how many were present.
    pub async fn invalidate<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let removed = {
            let mut entries = self.inner.entries.write().await;
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            keys.iter()
                .filter(|k| entries.remove(k.as_ref()).is_some())
                .count()
        };
        self.inner.prune_key_locks().await;
        debug!(requested = keys.len(), removed, "Cache keys invalidated");
        removed
    }

    /// Drop every entry. Returns how many were present.
    pub async fn clear(&self) -> usize {
        let removed = {
            let mut entries = self.inner.entries.write().await;
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            let removed = entries.len();
            entries.clear();
            removed
        };
        self.inner.prune_key_locks().await;
        debug!(removed, "Cache cleared");
        removed
    }

    /// Remove entries past their stale window.
    pub async fn purge_expired(&self) -> usize {
        let removed = self.inner.purge_expired_entries().await;
        self.inner.prune_key_locks().await;
        removed
    }

    pub async fn peek_state(&self, key: &str) -> Option<EntryState> {
        let entries = self.inner.entries.read().await;
        entries.get(key).map(|e| e.state_at(Instant::now()))
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    /// Wait for the background refresh of `key`, if one is running.
    pub async fn settle(&self, key: &str) {
        let pending = self.inner.in_flight.lock().await.get(key).cloned();
        if let Some(refresh) = pending {
            refresh.await;
        }
    }

    /// Wait until no background refresh is running.
    pub async fn drain(&self) {
        loop {
            let pending: Vec<Refresh> = self.inner.in_flight.lock().await.values().cloned().collect();
            if pending.is_empty() {
                return;
            }
            future::join_all(pending).await;
        }
    }
}

impl<V> Inner<V> {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert a foreground result unless an invalidation ran since `epoch`.
    async fn store(&self, key: &str, payload: V, ttl: CacheTtl, epoch: u64) {
        let mut entries = self.entries.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            Counters::bump(&self.counters.fetches_discarded);
            debug!(key = %key, "Foreground fetch not cached, cache was invalidated meanwhile");
            return;
        }
        let entry = CacheEntry::new(key, payload, ttl, self.next_generation());
        entries.insert(key.to_string(), entry);
    }

    async fn purge_expired_entries(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.state_at(now) != EntryState::Expired);
        before - entries.len()
    }

    /// Locks left behind by cancelled callers.
    async fn prune_key_locks(&self) {
        self.key_locks
            .lock()
            .await
            .retain(|_, l| Arc::strong_count(l) > 1);
    }

    async fn finish_refresh<E: Display>(
        &self,
        key: &str,
        generation: u64,
        result: Result<V, E>,
        ttl: CacheTtl,
    ) {
        match result {
            Ok(payload) => {
                let mut entries = self.entries.write().await;
                if entries.get(key).map(|e| e.generation) == Some(generation) {
                    let entry = CacheEntry::new(key, payload, ttl, self.next_generation());
                    entries.insert(key.to_string(), entry);
                    Counters::bump(&self.counters.refreshes_succeeded);
                    debug!(key = %key, "Background refresh stored");
                } else {
                    Counters::bump(&self.counters.refreshes_discarded);
                    debug!(key = %key, "Background refresh discarded, entry was replaced");
                }
            }
            Err(e) => {
                Counters::bump(&self.counters.refresh_failures);
                warn!(key = %key, error = %e, "Background refresh failed, keeping stale payload");
            }
        }
    }
}
