//! Rate template catalog: named presets per tier, at most one default.

use crate::db::repo::is_lock_contention;
use crate::db::Repository;
use crate::domain::{CommissionRates, RateTemplate, TemplateId, TierLevel};
use crate::error::RateError;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RateTemplateCatalog {
    repo: Arc<Repository>,
}

impl RateTemplateCatalog {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Active templates ordered by tier rank, then name.
    pub async fn list_active(&self) -> Result<Vec<RateTemplate>, RateError> {
        let mut templates = self.repo.list_active_templates(None).await?;
        templates.sort_by(|a, b| {
            a.tier_level
                .cmp(&b.tier_level)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(templates)
    }

    /// The active default template, if any.
    ///
    /// The store normally guarantees uniqueness. If it does not, the most
    /// recently updated default wins and the inconsistency is logged.
    pub async fn get_default(&self) -> Result<Option<RateTemplate>, RateError> {
        let mut defaults = self.repo.list_active_defaults().await?;
        if defaults.len() > 1 {
            warn!(
                count = defaults.len(),
                "Multiple active default rate templates found, using most recently updated"
            );
        }
        Ok(if defaults.is_empty() {
            None
        } else {
            Some(defaults.swap_remove(0))
        })
    }

    /// First active template (oldest) for the tier.
    pub async fn get_by_tier(&self, tier: TierLevel) -> Result<Option<RateTemplate>, RateError> {
        let templates = self.repo.list_active_templates(Some(tier)).await?;
        Ok(templates.into_iter().next())
    }

    /// Template by id, active or not.
    pub async fn get(&self, id: &TemplateId) -> Result<Option<RateTemplate>, RateError> {
        Ok(self.repo.get_template(id).await?)
    }

    /// Validate and store a template.
    ///
    /// Saving an active default demotes any other active default in the same
    /// transaction.
    ///
    /// # Errors
    /// `RateError::Validation` for bad rates, a blank name, or a default
    /// collision reported by the store; `RateError::Concurrency` if the store
    /// stayed locked by another writer.
    pub async fn upsert(&self, template: RateTemplate) -> Result<RateTemplate, RateError> {
        if template.name.trim().is_empty() {
            return Err(RateError::Validation(
                "template name must not be blank".to_string(),
            ));
        }
        CommissionRates::new(template.upfront_rate, template.residual_rate)?;

        let demoted = self
            .repo
            .upsert_template(&template)
            .await
            .map_err(|e| match e {
                e if is_lock_contention(&e) => {
                    RateError::Concurrency(format!("template {} is being modified", template.id))
                }
                sqlx::Error::Database(db) if db.is_unique_violation() => RateError::Validation(
                    format!("template {} conflicts with an existing default", template.id),
                ),
                other => RateError::Db(other),
            })?;

        info!(
            template_id = %template.id,
            tier = %template.tier_level,
            is_default = template.is_default,
            demoted,
            "Rate template saved"
        );
        Ok(template)
    }
}
