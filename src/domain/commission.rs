//! Commission entry: normalized, read-only input to the aggregator.

use crate::domain::affiliate::{string_enum, UnknownVariant};
use crate::domain::{AffiliateId, CommissionMetadata, Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionEntry {
    pub id: String,
    pub affiliate_id: AffiliateId,
    /// Joined from the affiliate record when read from the store.
    #[serde(default)]
    pub affiliate_name: Option<String>,
    #[serde(default)]
    pub affiliate_external_id: Option<String>,
    pub commission_type: CommissionType,
    pub order_total: Decimal,
    pub commission_amount: Decimal,
    pub commission_rate: Decimal,
    pub status: CommissionStatus,
    pub payment_date: Option<TimeMs>,
    pub created_at: TimeMs,
    #[serde(default)]
    pub metadata: CommissionMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Upfront,
    Residual,
}

string_enum!(CommissionType, "commission type", {
    Upfront => "upfront",
    Residual => "residual",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

string_enum!(CommissionStatus, "commission status", {
    Pending => "pending",
    Approved => "approved",
    Paid => "paid",
    Cancelled => "cancelled",
});
