use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Decimal, RateTemplate, TemplateId, TemplateMetadata, TierLevel};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTemplateRequest {
    /// Omitted to create a new template.
    pub id: Option<TemplateId>,
    pub name: String,
    pub upfront_rate: Decimal,
    pub residual_rate: Decimal,
    pub tier_level: TierLevel,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

fn default_active() -> bool {
    true
}

impl UpsertTemplateRequest {
    fn into_template(self) -> RateTemplate {
        RateTemplate {
            id: self.id.unwrap_or_else(TemplateId::generate),
            name: self.name,
            upfront_rate: self.upfront_rate,
            residual_rate: self.residual_rate,
            tier_level: self.tier_level,
            is_default: self.is_default,
            is_active: self.is_active,
            metadata: self.metadata,
        }
    }
}

pub async fn list_templates(
    Query(params): Query<TemplateQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RateTemplate>>, AppError> {
    let tier = params
        .tier
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(TierLevel::from_str)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let templates = state.catalog.list_active().await?;
    let templates = match tier {
        Some(tier) => templates.into_iter().filter(|t| t.tier_level == tier).collect(),
        None => templates,
    };
    Ok(Json(templates))
}

pub async fn get_default_template(
    State(state): State<AppState>,
) -> Result<Json<RateTemplate>, AppError> {
    state
        .catalog
        .get_default()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no default rate template".to_string()))
}

pub async fn upsert_template(
    State(state): State<AppState>,
    Json(body): Json<UpsertTemplateRequest>,
) -> Result<Json<RateTemplate>, AppError> {
    let saved = state.catalog.upsert(body.into_template()).await?;
    Ok(Json(saved))
}
