//! Cached dashboard reads over the commission store.
//!
//! The caches are constructed by the caller and injected, so tests and the
//! binary decide their lifetime and TTLs.

use crate::cache::DashboardCache;
use crate::db::{AffiliateFilter, CommissionFilter, Repository};
use crate::engine::{AffiliateCommissionSummary, CommissionAggregator, CommissionStats};
use crate::error::RateError;
use std::sync::Arc;
use tracing::debug;

pub const STATS_KEY: &str = "commissions:stats";
pub const LEADERBOARD_KEY: &str = "commissions:leaderboard";

/// Keys whose payload depends on affiliate rates.
pub const RATE_DEPENDENT_KEYS: [&str; 1] = [STATS_KEY];

#[derive(Clone)]
pub struct DashboardService {
    repo: Arc<Repository>,
    stats_cache: DashboardCache<CommissionStats>,
    leaderboard_cache: DashboardCache<Vec<AffiliateCommissionSummary>>,
}

impl DashboardService {
    pub fn new(
        repo: Arc<Repository>,
        stats_cache: DashboardCache<CommissionStats>,
        leaderboard_cache: DashboardCache<Vec<AffiliateCommissionSummary>>,
    ) -> Self {
        Self {
            repo,
            stats_cache,
            leaderboard_cache,
        }
    }

    pub async fn commission_stats(&self) -> Result<CommissionStats, RateError> {
        let repo = Arc::clone(&self.repo);
        self.stats_cache
            .get(STATS_KEY, move || async move {
                let entries = repo
                    .query_commission_entries(&CommissionFilter::default())
                    .await?;
                let affiliates = repo.list_affiliates(&AffiliateFilter::default()).await?;
                Ok::<_, RateError>(CommissionAggregator::stats(&entries, &affiliates))
            })
            .await
    }

    pub async fn affiliate_leaderboard(&self) -> Result<Vec<AffiliateCommissionSummary>, RateError> {
        let repo = Arc::clone(&self.repo);
        self.leaderboard_cache
            .get(LEADERBOARD_KEY, move || async move {
                let entries = repo
                    .query_commission_entries(&CommissionFilter::default())
                    .await?;
                Ok::<_, RateError>(CommissionAggregator::by_affiliate(&entries))
            })
            .await
    }

    /// Drop cached payloads that a rate change makes outdated.
    pub async fn invalidate_rates(&self) -> usize {
        let removed = self.stats_cache.invalidate(&RATE_DEPENDENT_KEYS).await;
        debug!(removed, "Rate-dependent dashboard entries invalidated");
        removed
    }

    /// Drop the named keys, or everything when `keys` is empty.
    pub async fn invalidate(&self, keys: &[String]) -> usize {
        if keys.is_empty() {
            return self.stats_cache.clear().await + self.leaderboard_cache.clear().await;
        }
        self.stats_cache.invalidate(keys).await + self.leaderboard_cache.invalidate(keys).await
    }

    /// Remove payloads past their stale window from both caches.
    pub async fn purge_expired(&self) -> usize {
        let purged =
            self.stats_cache.purge_expired().await + self.leaderboard_cache.purge_expired().await;
        if purged > 0 {
            debug!(purged, "Expired dashboard entries purged");
        }
        purged
    }

    /// Wait for background refreshes to finish.
    pub async fn drain(&self) {
        self.stats_cache.drain().await;
        self.leaderboard_cache.drain().await;
    }
}
