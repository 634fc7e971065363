//! Append-only audit record of a rate change.

use crate::domain::{AffiliateId, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// One row per successful ledger write. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateHistoryEntry {
    pub id: i64,
    pub affiliate_id: AffiliateId,
    pub previous_upfront_rate: Decimal,
    pub new_upfront_rate: Decimal,
    pub previous_residual_rate: Decimal,
    pub new_residual_rate: Decimal,
    pub reason: String,
    pub changed_by: Option<String>,
    pub effective_date: TimeMs,
}
