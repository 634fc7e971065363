//! Rate template: a named upfront/residual preset for a tier.

use crate::domain::{CommissionRates, Decimal, TemplateId, TemplateMetadata, TierLevel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTemplate {
    pub id: TemplateId,
    pub name: String,
    pub upfront_rate: Decimal,
    pub residual_rate: Decimal,
    pub tier_level: TierLevel,
    pub is_default: bool,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

impl RateTemplate {
    /// Create an active, non-default template with a fresh id.
    pub fn new(name: impl Into<String>, rates: CommissionRates, tier_level: TierLevel) -> Self {
        RateTemplate {
            id: TemplateId::generate(),
            name: name.into(),
            upfront_rate: rates.upfront_rate,
            residual_rate: rates.residual_rate,
            tier_level,
            is_default: false,
            is_active: true,
            metadata: TemplateMetadata::default(),
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn rates(&self) -> CommissionRates {
        CommissionRates {
            upfront_rate: self.upfront_rate,
            residual_rate: self.residual_rate,
        }
    }
}
