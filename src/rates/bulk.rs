//! Fan-out of one rate change across many affiliates.
//!
//! The patch is resolved once, then each affiliate goes through the ledger's
//! atomic path on its own. There is no batch atomicity: failures are isolated
//! and reported per affiliate.

use crate::domain::{AffiliateId, CommissionRates, TemplateId, TierLevel};
use crate::error::RateError;
use crate::rates::{
    AffiliateRateLedger, ConflictAdvisor, RateChange, RateConflict, RateTemplateCatalog,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// What to apply to every affiliate in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RatePatch {
    /// Explicit upfront/residual rates.
    Rates(CommissionRates),
    /// Promote to a tier, taking its template's rates.
    Tier { tier: TierLevel },
    /// Apply a specific template's rates without changing tier.
    Template {
        #[serde(rename = "templateId")]
        template_id: TemplateId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRateRequest {
    pub patch: RatePatch,
    pub reason: String,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug)]
pub struct BulkFailure {
    pub affiliate_id: AffiliateId,
    pub error: RateError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateAdvisory {
    pub affiliate_id: AffiliateId,
    pub conflicts: Vec<RateConflict>,
}

/// Overall shape of a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Nothing failed.
    Complete,
    /// Some succeeded, some failed.
    Partial,
    /// Everything failed.
    Failed,
}

#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<AffiliateId>,
    pub failed: Vec<BulkFailure>,
    pub advisories: Vec<AffiliateAdvisory>,
}

impl BulkOutcome {
    pub fn status(&self) -> BatchStatus {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (_, true) => BatchStatus::Complete,
            (false, false) => BatchStatus::Partial,
            (true, false) => BatchStatus::Failed,
        }
    }
}

#[derive(Clone)]
pub struct BulkRateOperator {
    ledger: Arc<AffiliateRateLedger>,
    advisor: Arc<ConflictAdvisor>,
    catalog: Arc<RateTemplateCatalog>,
    concurrency: usize,
}

impl BulkRateOperator {
    pub fn new(
        ledger: Arc<AffiliateRateLedger>,
        advisor: Arc<ConflictAdvisor>,
        catalog: Arc<RateTemplateCatalog>,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            advisor,
            catalog,
            concurrency: concurrency.max(1),
        }
    }

    /// Apply `request` to every listed affiliate.
    ///
    /// Duplicate ids are applied once. Results keep the input order.
    ///
    /// # Errors
    /// Only whole-call problems are errors: a blank reason, or a store failure
    /// while resolving the patch. Per-affiliate failures land in `failed`.
    pub async fn apply(
        &self,
        affiliate_ids: &[AffiliateId],
        request: &BulkRateRequest,
    ) -> Result<BulkOutcome, RateError> {
        if request.reason.trim().is_empty() {
            return Err(RateError::Validation(
                "a reason is required for bulk rate changes".to_string(),
            ));
        }

        let resolved = match self.resolve(&request.patch).await {
            Err(RateError::Db(e)) => return Err(RateError::Db(e)),
            other => other,
        };

        let mut seen = HashSet::new();
        let ids: Vec<AffiliateId> = affiliate_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let results: Vec<(AffiliateId, Result<Vec<RateConflict>, RateError>)> =
            stream::iter(ids)
                .map(|id| {
                    let resolved = &resolved;
                    async move {
                        let result = match resolved {
                            Ok((rates, tier)) => self.apply_one(&id, *rates, *tier, request).await,
                            Err(e) => Err(echo(e)),
                        };
                        (id, result)
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut outcome = BulkOutcome::default();
        for (affiliate_id, result) in results {
            match result {
                Ok(conflicts) => {
                    if !conflicts.is_empty() {
                        outcome.advisories.push(AffiliateAdvisory {
                            affiliate_id: affiliate_id.clone(),
                            conflicts,
                        });
                    }
                    outcome.succeeded.push(affiliate_id);
                }
                Err(error) => {
                    warn!(affiliate_id = %affiliate_id, error = %error, "Bulk rate change failed for affiliate");
                    outcome.failed.push(BulkFailure {
                        affiliate_id,
                        error,
                    });
                }
            }
        }

        info!(
            requested = affiliate_ids.len(),
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            status = ?outcome.status(),
            "Bulk rate change finished"
        );
        Ok(outcome)
    }

    /// Turn the patch into concrete rates (and a tier, for promotions).
    async fn resolve(
        &self,
        patch: &RatePatch,
    ) -> Result<(CommissionRates, Option<TierLevel>), RateError> {
        match patch {
            RatePatch::Rates(rates) => {
                rates.validate()?;
                Ok((*rates, None))
            }
            RatePatch::Tier { tier } => {
                let template = self.catalog.get_by_tier(*tier).await?.ok_or_else(|| {
                    RateError::NotFound(format!("no active rate template for tier {}", tier))
                })?;
                Ok((template.rates(), Some(*tier)))
            }
            RatePatch::Template { template_id } => {
                let template = self
                    .catalog
                    .get(template_id)
                    .await?
                    .filter(|t| t.is_active)
                    .ok_or_else(|| {
                        RateError::NotFound(format!("active rate template {}", template_id))
                    })?;
                Ok((template.rates(), None))
            }
        }
    }

    async fn apply_one(
        &self,
        id: &AffiliateId,
        rates: CommissionRates,
        tier: Option<TierLevel>,
        request: &BulkRateRequest,
    ) -> Result<Vec<RateConflict>, RateError> {
        let affiliate = self.ledger.get_affiliate(id).await?;

        let conflicts = match self.advisor.check(&affiliate, &rates).await {
            Ok(conflicts) => conflicts,
            Err(e) => {
                warn!(affiliate_id = %id, error = %e, "Conflict check failed, continuing without advisories");
                Vec::new()
            }
        };

        self.ledger
            .apply_change(RateChange {
                affiliate_id: id.clone(),
                rates,
                tier,
                reason: request.reason.clone(),
                changed_by: request.changed_by.clone(),
            })
            .await?;

        Ok(conflicts)
    }
}

/// Copy a patch-resolution error for each affiliate it applies to.
fn echo(err: &RateError) -> RateError {
    match err {
        RateError::Validation(msg) => RateError::Validation(msg.clone()),
        RateError::NotFound(msg) => RateError::NotFound(msg.clone()),
        RateError::Concurrency(msg) => RateError::Concurrency(msg.clone()),
        RateError::Db(e) => RateError::Db(sqlx::Error::Protocol(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::{make_affiliate, rates, setup_test_db};
    use crate::db::Repository;
    use crate::domain::{Affiliate, Decimal, RateTemplate};
    use crate::rates::{ConflictThresholds, RetryPolicy};
    use tempfile::TempDir;

    struct Fixture {
        repo: Arc<Repository>,
        catalog: Arc<RateTemplateCatalog>,
        ledger: Arc<AffiliateRateLedger>,
        bulk: BulkRateOperator,
        _temp: TempDir,
    }

    async fn setup() -> Fixture {
        let (repo, temp) = setup_test_db().await;
        let repo = Arc::new(repo);
        let catalog = Arc::new(RateTemplateCatalog::new(repo.clone()));
        let ledger = Arc::new(AffiliateRateLedger::new(
            repo.clone(),
            catalog.clone(),
            RetryPolicy::default(),
        ));
        let advisor = Arc::new(ConflictAdvisor::new(
            catalog.clone(),
            ConflictThresholds::default(),
        ));
        let bulk = BulkRateOperator::new(ledger.clone(), advisor, catalog.clone(), 2);
        Fixture {
            repo,
            catalog,
            ledger,
            bulk,
            _temp: temp,
        }
    }

    async fn seed(fx: &Fixture, names: &[&str]) -> Vec<Affiliate> {
        let mut out = Vec::new();
        for name in names {
            let affiliate = make_affiliate(name, TierLevel::Bronze);
            fx.repo.insert_affiliate(&affiliate).await.unwrap();
            out.push(affiliate);
        }
        out
    }

    fn ids(affiliates: &[Affiliate]) -> Vec<AffiliateId> {
        affiliates.iter().map(|a| a.id.clone()).collect()
    }

    fn request(patch: RatePatch) -> BulkRateRequest {
        BulkRateRequest {
            patch,
            reason: "x".to_string(),
            changed_by: None,
        }
    }

    #[tokio::test]
    async fn test_sum_over_hundred_fails_every_affiliate() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a", "b", "c"]).await;

        let patch = RatePatch::Rates(CommissionRates {
            upfront_rate: Decimal::from_i64(40),
            residual_rate: Decimal::from_i64(70),
        });
        let outcome = fx.bulk.apply(&ids(&affiliates), &request(patch)).await.unwrap();

        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.failed.len(), 3);
        assert!(outcome
            .failed
            .iter()
            .all(|f| matches!(f.error, RateError::Validation(_))));
        assert_eq!(outcome.status(), BatchStatus::Failed);

        for affiliate in &affiliates {
            assert!(fx.ledger.get_history(&affiliate.id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_affiliate_fails_alone() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a", "b"]).await;
        let mut targets = ids(&affiliates);
        targets.insert(1, AffiliateId::new("ghost"));

        let outcome = fx
            .bulk
            .apply(&targets, &request(RatePatch::Rates(rates("12", "6"))))
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, ids(&affiliates));
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].affiliate_id, AffiliateId::new("ghost"));
        assert!(matches!(outcome.failed[0].error, RateError::NotFound(_)));
        assert_eq!(outcome.status(), BatchStatus::Partial);

        for affiliate in &affiliates {
            assert_eq!(fx.ledger.get_history(&affiliate.id).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_apply_once() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a"]).await;
        let targets = vec![affiliates[0].id.clone(), affiliates[0].id.clone()];

        let outcome = fx
            .bulk
            .apply(&targets, &request(RatePatch::Rates(rates("12", "6"))))
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(fx.ledger.get_history(&affiliates[0].id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tier_patch_promotes_everyone() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a", "b", "c"]).await;
        fx.catalog
            .upsert(RateTemplate::new("Gold", rates("18", "6"), TierLevel::Gold))
            .await
            .unwrap();

        let outcome = fx
            .bulk
            .apply(&ids(&affiliates), &request(RatePatch::Tier { tier: TierLevel::Gold }))
            .await
            .unwrap();

        assert_eq!(outcome.status(), BatchStatus::Complete);
        for affiliate in &affiliates {
            let stored = fx.ledger.get_affiliate(&affiliate.id).await.unwrap();
            assert_eq!(stored.tier_level, TierLevel::Gold);
            assert_eq!(stored.rates(), rates("18", "6"));
        }
    }

    #[tokio::test]
    async fn test_missing_tier_template_fails_every_affiliate() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a", "b"]).await;

        let outcome = fx
            .bulk
            .apply(
                &ids(&affiliates),
                &request(RatePatch::Tier {
                    tier: TierLevel::Platinum,
                }),
            )
            .await
            .unwrap();

        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome
            .failed
            .iter()
            .all(|f| matches!(f.error, RateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_template_patch_keeps_tier_and_reports_advisories() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a", "b"]).await;
        fx.catalog
            .upsert(RateTemplate::new("Bronze", rates("10", "5"), TierLevel::Bronze))
            .await
            .unwrap();
        let promo = RateTemplate::new("Spring promo", rates("25", "5"), TierLevel::Silver);
        fx.catalog.upsert(promo.clone()).await.unwrap();

        let outcome = fx
            .bulk
            .apply(
                &ids(&affiliates),
                &request(RatePatch::Template {
                    template_id: promo.id.clone(),
                }),
            )
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 2);
        // 25 vs the bronze template's 10 is over the upfront threshold.
        assert_eq!(outcome.advisories.len(), 2);
        assert_eq!(outcome.advisories[0].conflicts.len(), 1);

        let stored = fx.ledger.get_affiliate(&affiliates[0].id).await.unwrap();
        assert_eq!(stored.tier_level, TierLevel::Bronze);
        assert_eq!(stored.rates(), rates("25", "5"));
    }

    #[tokio::test]
    async fn test_blank_reason_rejects_whole_call() {
        let fx = setup().await;
        let affiliates = seed(&fx, &["a"]).await;
        let mut req = request(RatePatch::Rates(rates("12", "6")));
        req.reason = " ".to_string();

        let result = fx.bulk.apply(&ids(&affiliates), &req).await;
        assert!(matches!(result, Err(RateError::Validation(_))));
        assert!(fx.ledger.get_history(&affiliates[0].id).await.unwrap().is_empty());
    }

    #[test]
    fn test_patch_wire_format() {
        let patch: RatePatch =
            serde_json::from_str(r#"{"type":"rates","upfrontRate":40,"residualRate":70}"#).unwrap();
        assert!(matches!(patch, RatePatch::Rates(_)));

        let patch: RatePatch = serde_json::from_str(r#"{"type":"tier","tier":"gold"}"#).unwrap();
        assert_eq!(patch, RatePatch::Tier { tier: TierLevel::Gold });

        let patch: RatePatch =
            serde_json::from_str(r#"{"type":"template","templateId":"t-1"}"#).unwrap();
        assert_eq!(
            patch,
            RatePatch::Template {
                template_id: TemplateId::new("t-1")
            }
        );
    }
}
