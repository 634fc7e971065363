use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use crate::api::AppState;
use crate::db::CommissionFilter;
use crate::domain::{AffiliateId, CommissionStatus, TimeMs};
use crate::engine::{export_csv, AffiliateCommissionSummary, CommissionStats};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub status: Option<String>,
    pub affiliate_id: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<CommissionStats>, AppError> {
    let stats = state.dashboard.commission_stats().await?;
    Ok(Json(stats))
}

pub async fn get_leaderboard(
    Query(params): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AffiliateCommissionSummary>>, AppError> {
    let mut board = state.dashboard.affiliate_leaderboard().await?;
    if let Some(limit) = params.limit {
        board.truncate(limit);
    }
    Ok(Json(board))
}

pub async fn export(
    Query(params): Query<ExportQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    if let (Some(from), Some(to)) = (params.from_ms, params.to_ms) {
        if from > to {
            return Err(AppError::BadRequest(
                "fromMs must not be after toMs".to_string(),
            ));
        }
    }

    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(CommissionStatus::from_str)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = CommissionFilter {
        status,
        affiliate_id: params.affiliate_id.map(AffiliateId::new),
        from_ms: params.from_ms.map(TimeMs::new),
        to_ms: params.to_ms.map(TimeMs::new),
    };

    let entries = state.repo.query_commission_entries(&filter).await?;
    let body = export_csv(&entries).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"commissions.csv\"",
            ),
        ],
        body,
    ))
}
