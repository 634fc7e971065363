use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    /// Omitted or empty clears every dashboard entry.
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

pub async fn invalidate(
    State(state): State<AppState>,
    Json(body): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let removed = state.dashboard.invalidate(&body.keys).await;
    Ok(Json(InvalidateResponse { removed }))
}
