use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::AffiliateId;
use crate::error::{AppError, RateError};
use crate::rates::{AffiliateAdvisory, BatchStatus, BulkOutcome, BulkRateRequest, RatePatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequestBody {
    pub affiliate_ids: Vec<AffiliateId>,
    pub patch: RatePatch,
    pub reason: String,
    pub changed_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub affiliate_id: AffiliateId,
    /// One of `validation`, `not_found`, `concurrency`, `internal`.
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub status: BatchStatus,
    pub succeeded: Vec<AffiliateId>,
    pub failed: Vec<FailedItem>,
    pub advisories: Vec<AffiliateAdvisory>,
}

fn error_kind(err: &RateError) -> &'static str {
    match err {
        RateError::Validation(_) => "validation",
        RateError::NotFound(_) => "not_found",
        RateError::Concurrency(_) => "concurrency",
        RateError::Db(_) => "internal",
    }
}

impl From<BulkOutcome> for BulkResponse {
    fn from(outcome: BulkOutcome) -> Self {
        let status = outcome.status();
        BulkResponse {
            status,
            succeeded: outcome.succeeded,
            failed: outcome
                .failed
                .into_iter()
                .map(|f| FailedItem {
                    affiliate_id: f.affiliate_id,
                    kind: error_kind(&f.error),
                    error: f.error.to_string(),
                })
                .collect(),
            advisories: outcome.advisories,
        }
    }
}

/// 200 when every affiliate was updated, 207 for a partial batch, 422 when
/// nothing could be applied.
pub async fn apply_bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkRequestBody>,
) -> Result<(StatusCode, Json<BulkResponse>), AppError> {
    let request = BulkRateRequest {
        patch: body.patch,
        reason: body.reason,
        changed_by: body.changed_by,
    };
    let outcome = state.bulk.apply(&body.affiliate_ids, &request).await?;

    if !outcome.succeeded.is_empty() {
        state.dashboard.invalidate_rates().await;
    }

    let code = match outcome.status() {
        BatchStatus::Complete => StatusCode::OK,
        BatchStatus::Partial => StatusCode::MULTI_STATUS,
        BatchStatus::Failed => StatusCode::UNPROCESSABLE_ENTITY,
    };
    Ok((code, Json(BulkResponse::from(outcome))))
}
