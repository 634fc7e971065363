//! Advisory comparison of proposed rates against the affiliate's tier template.
//!
//! Advisories never block a write; they are returned next to the result so a
//! reviewer can see how far a change strays from the tier's preset.

use crate::domain::{Affiliate, CommissionRates, Decimal, RateTemplate};
use crate::error::RateError;
use crate::rates::RateTemplateCatalog;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Default tolerated distance, in percentage points, from the template's upfront rate.
pub const DEFAULT_UPFRONT_THRESHOLD: i64 = 5;
/// Default tolerated distance, in percentage points, from the template's residual rate.
pub const DEFAULT_RESIDUAL_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictThresholds {
    pub upfront: Decimal,
    pub residual: Decimal,
}

impl Default for ConflictThresholds {
    fn default() -> Self {
        Self {
            upfront: Decimal::from_i64(DEFAULT_UPFRONT_THRESHOLD),
            residual: Decimal::from_i64(DEFAULT_RESIDUAL_THRESHOLD),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateField {
    Upfront,
    Residual,
}

/// One threshold violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConflict {
    pub field: RateField,
    pub proposed: Decimal,
    pub template_rate: Decimal,
    pub delta: Decimal,
    pub threshold: Decimal,
    pub template_name: String,
    pub message: String,
}

#[derive(Clone)]
pub struct ConflictAdvisor {
    catalog: Arc<RateTemplateCatalog>,
    thresholds: ConflictThresholds,
}

impl ConflictAdvisor {
    pub fn new(catalog: Arc<RateTemplateCatalog>, thresholds: ConflictThresholds) -> Self {
        Self {
            catalog,
            thresholds,
        }
    }

    /// Compare `proposed` with the template for the affiliate's current tier.
    ///
    /// Returns no advisories when the tier has no active template.
    pub async fn check(
        &self,
        affiliate: &Affiliate,
        proposed: &CommissionRates,
    ) -> Result<Vec<RateConflict>, RateError> {
        let Some(template) = self.catalog.get_by_tier(affiliate.tier_level).await? else {
            debug!(
                affiliate_id = %affiliate.id,
                tier = %affiliate.tier_level,
                "No tier template to compare against"
            );
            return Ok(Vec::new());
        };

        Ok(compare(&template, proposed, &self.thresholds))
    }
}

/// Pure threshold comparison: one advisory per field whose delta exceeds its threshold.
pub fn compare(
    template: &RateTemplate,
    proposed: &CommissionRates,
    thresholds: &ConflictThresholds,
) -> Vec<RateConflict> {
    let checks = [
        (
            RateField::Upfront,
            "Upfront",
            proposed.upfront_rate,
            template.upfront_rate,
            thresholds.upfront,
        ),
        (
            RateField::Residual,
            "Residual",
            proposed.residual_rate,
            template.residual_rate,
            thresholds.residual,
        ),
    ];

    checks
        .into_iter()
        .filter_map(|(field, label, proposed, template_rate, threshold)| {
            let delta = (proposed - template_rate).abs();
            (delta > threshold).then(|| RateConflict {
                field,
                proposed,
                template_rate,
                delta,
                threshold,
                template_name: template.name.clone(),
                message: format!(
                    "{} rate {}% differs from the {} template ({}%) by {} points, above the {} point threshold",
                    label, proposed, template.name, template_rate, delta, threshold
                ),
            })
        })
        .collect()
}
