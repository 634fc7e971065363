//! Affiliate rate ledger: the only writer of affiliate rates.
//!
//! Every successful write updates the affiliate row and appends exactly one
//! history entry in the same transaction. Writes are guarded by the
//! affiliate's `version` column; a lost race surfaces as
//! `RateError::Concurrency` and is retried under the configured policy.

use crate::db::{RateWrite, RateWriteOutcome, Repository};
use crate::domain::{
    Affiliate, AffiliateId, CommissionRates, RateHistoryEntry, TierLevel, TimeMs,
};
use crate::error::RateError;
use crate::rates::{RateTemplateCatalog, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, info};

/// Reason recorded on history entries written by `promote_to_tier`.
pub const TIER_PROMOTION_REASON: &str = "tier promotion";

/// A requested rate change for one affiliate.
#[derive(Debug, Clone)]
pub struct RateChange {
    pub affiliate_id: AffiliateId,
    pub rates: CommissionRates,
    /// Tier to record with the rates, for promotions.
    pub tier: Option<TierLevel>,
    pub reason: String,
    pub changed_by: Option<String>,
}

#[derive(Clone)]
pub struct AffiliateRateLedger {
    repo: Arc<Repository>,
    catalog: Arc<RateTemplateCatalog>,
    retry: RetryPolicy,
}

impl AffiliateRateLedger {
    pub fn new(repo: Arc<Repository>, catalog: Arc<RateTemplateCatalog>, retry: RetryPolicy) -> Self {
        Self {
            repo,
            catalog,
            retry,
        }
    }

    pub async fn get_affiliate(&self, id: &AffiliateId) -> Result<Affiliate, RateError> {
        self.repo
            .get_affiliate(id)
            .await?
            .ok_or_else(|| RateError::NotFound(format!("affiliate {}", id)))
    }

    /// Replace an affiliate's rates and record the change.
    ///
    /// # Errors
    /// `Validation` for out-of-range rates or a blank reason, `NotFound` for an
    /// unknown affiliate, `Concurrency` if the retry policy ran out. State is
    /// unchanged on every error.
    pub async fn set_rates(
        &self,
        id: &AffiliateId,
        rates: CommissionRates,
        reason: &str,
        changed_by: Option<&str>,
    ) -> Result<Affiliate, RateError> {
        self.apply_change(RateChange {
            affiliate_id: id.clone(),
            rates,
            tier: None,
            reason: reason.to_string(),
            changed_by: changed_by.map(str::to_string),
        })
        .await
    }

    /// Move an affiliate onto a tier, taking the tier template's rates.
    ///
    /// # Errors
    /// `NotFound` if the tier has no active template or the affiliate is unknown.
    pub async fn promote_to_tier(
        &self,
        id: &AffiliateId,
        tier: TierLevel,
        changed_by: Option<&str>,
    ) -> Result<Affiliate, RateError> {
        let template = self
            .catalog
            .get_by_tier(tier)
            .await?
            .ok_or_else(|| RateError::NotFound(format!("no active rate template for tier {}", tier)))?;

        self.apply_change(RateChange {
            affiliate_id: id.clone(),
            rates: template.rates(),
            tier: Some(tier),
            reason: TIER_PROMOTION_REASON.to_string(),
            changed_by: changed_by.map(str::to_string),
        })
        .await
    }

    /// Rate history, newest first.
    pub async fn get_history(&self, id: &AffiliateId) -> Result<Vec<RateHistoryEntry>, RateError> {
        if self.repo.get_affiliate(id).await?.is_none() {
            return Err(RateError::NotFound(format!("affiliate {}", id)));
        }
        Ok(self.repo.query_rate_history(id).await?)
    }

    /// Validate and apply a change through the retrying atomic write.
    pub async fn apply_change(&self, change: RateChange) -> Result<Affiliate, RateError> {
        change.rates.validate()?;
        if change.reason.trim().is_empty() {
            return Err(RateError::Validation(
                "a reason is required for rate changes".to_string(),
            ));
        }

        self.retry.run(|| self.write_once(&change)).await
    }

    async fn write_once(&self, change: &RateChange) -> Result<Affiliate, RateError> {
        let current = self.get_affiliate(&change.affiliate_id).await?;

        let write = RateWrite {
            affiliate_id: change.affiliate_id.clone(),
            expected_version: current.version,
            previous: current.rates(),
            next: change.rates,
            tier: change.tier,
            reason: change.reason.clone(),
            changed_by: change.changed_by.clone(),
            effective_date: TimeMs::now(),
        };

        match self.repo.write_rates_versioned(&write).await? {
            RateWriteOutcome::Applied { affiliate, entry } => {
                info!(
                    affiliate_id = %affiliate.id,
                    previous_upfront = %entry.previous_upfront_rate,
                    new_upfront = %entry.new_upfront_rate,
                    previous_residual = %entry.previous_residual_rate,
                    new_residual = %entry.new_residual_rate,
                    reason = %entry.reason,
                    "Affiliate rates updated"
                );
                Ok(affiliate)
            }
            RateWriteOutcome::VersionMismatch => {
                debug!(
                    affiliate_id = %change.affiliate_id,
                    expected_version = current.version,
                    "Affiliate changed during rate write"
                );
                Err(RateError::Concurrency(format!(
                    "affiliate {} changed since version {}",
                    change.affiliate_id, current.version
                )))
            }
            RateWriteOutcome::Contended => Err(RateError::Concurrency(format!(
                "affiliate {} is locked by another writer",
                change.affiliate_id
            ))),
        }
    }
}
