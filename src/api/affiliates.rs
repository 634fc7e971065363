use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::api::AppState;
use crate::domain::{Affiliate, AffiliateId, CommissionRates, Decimal, RateHistoryEntry, TierLevel};
use crate::error::{AppError, RateError};
use crate::rates::RateConflict;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRatesRequest {
    pub upfront_rate: Decimal,
    pub residual_rate: Decimal,
    pub reason: String,
    pub changed_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    pub tier: String,
    pub changed_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateUpdateResponse {
    pub affiliate: Affiliate,
    pub advisories: Vec<RateConflict>,
}

pub async fn get_affiliate(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Affiliate>, AppError> {
    let affiliate = state.ledger.get_affiliate(&AffiliateId::new(id)).await?;
    Ok(Json(affiliate))
}

pub async fn set_rates(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<SetRatesRequest>,
) -> Result<Json<RateUpdateResponse>, AppError> {
    let id = AffiliateId::new(id);
    let rates = CommissionRates::new(body.upfront_rate, body.residual_rate)?;

    let current = state.ledger.get_affiliate(&id).await?;
    let advisories = match state.advisor.check(&current, &rates).await {
        Ok(conflicts) => conflicts,
        Err(e) => {
            warn!(affiliate_id = %id, error = %e, "Conflict check failed");
            Vec::new()
        }
    };

    let affiliate = state
        .ledger
        .set_rates(&id, rates, &body.reason, body.changed_by.as_deref())
        .await?;
    state.dashboard.invalidate_rates().await;

    Ok(Json(RateUpdateResponse {
        affiliate,
        advisories,
    }))
}

pub async fn promote(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<PromoteRequest>,
) -> Result<Json<Affiliate>, AppError> {
    let tier = TierLevel::from_str(body.tier.trim()).map_err(RateError::from)?;
    let affiliate = state
        .ledger
        .promote_to_tier(&AffiliateId::new(id), tier, body.changed_by.as_deref())
        .await?;
    state.dashboard.invalidate_rates().await;
    Ok(Json(affiliate))
}

pub async fn get_history(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RateHistoryEntry>>, AppError> {
    let history = state.ledger.get_history(&AffiliateId::new(id)).await?;
    Ok(Json(history))
}
