//! Typed metadata payloads stored alongside templates and commission entries.
//!
//! Both kinds share one JSON column shape, distinguished by a `kind` tag.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metadata {
    RateTemplate(TemplateMetadata),
    CommissionEntry(CommissionMetadata),
}

impl Metadata {
    /// Serialize for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse a stored column value.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn into_template(self) -> Option<TemplateMetadata> {
        match self {
            Metadata::RateTemplate(m) => Some(m),
            Metadata::CommissionEntry(_) => None,
        }
    }

    pub fn into_commission(self) -> Option<CommissionMetadata> {
        match self {
            Metadata::CommissionEntry(m) => Some(m),
            Metadata::RateTemplate(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sales volume an affiliate is expected to reach before this tier applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_monthly_sales: Option<Decimal>,
}

/// Customer and product details carried on a commission entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}
