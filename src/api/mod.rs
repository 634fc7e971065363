pub mod affiliates;
pub mod bulk;
pub mod cache;
pub mod commissions;
pub mod health;
pub mod templates;

use crate::cache::DashboardCache;
use crate::config::Config;
use crate::dashboard::DashboardService;
use crate::db::Repository;
use crate::rates::{AffiliateRateLedger, BulkRateOperator, ConflictAdvisor, RateTemplateCatalog};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub catalog: Arc<RateTemplateCatalog>,
    pub ledger: Arc<AffiliateRateLedger>,
    pub advisor: Arc<ConflictAdvisor>,
    pub bulk: Arc<BulkRateOperator>,
    pub dashboard: DashboardService,
}

impl AppState {
    /// Wire the rate core and dashboard caches over one repository.
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        let catalog = Arc::new(RateTemplateCatalog::new(repo.clone()));
        let ledger = Arc::new(AffiliateRateLedger::new(
            repo.clone(),
            catalog.clone(),
            config.ledger_retry,
        ));
        let advisor = Arc::new(ConflictAdvisor::new(
            catalog.clone(),
            config.conflict_thresholds,
        ));
        let bulk = Arc::new(BulkRateOperator::new(
            ledger.clone(),
            advisor.clone(),
            catalog.clone(),
            config.bulk_concurrency,
        ));
        let dashboard = DashboardService::new(
            repo.clone(),
            DashboardCache::new(config.cache_ttl),
            DashboardCache::new(config.cache_ttl),
        );

        Self {
            repo,
            catalog,
            ledger,
            advisor,
            bulk,
            dashboard,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/templates",
            get(templates::list_templates).put(templates::upsert_template),
        )
        .route("/v1/templates/default", get(templates::get_default_template))
        .route("/v1/affiliates/:id", get(affiliates::get_affiliate))
        .route("/v1/affiliates/:id/rates", put(affiliates::set_rates))
        .route("/v1/affiliates/:id/promote", post(affiliates::promote))
        .route("/v1/affiliates/:id/history", get(affiliates::get_history))
        .route("/v1/rates/bulk", post(bulk::apply_bulk))
        .route("/v1/commissions/stats", get(commissions::get_stats))
        .route(
            "/v1/commissions/leaderboard",
            get(commissions::get_leaderboard),
        )
        .route("/v1/commissions/export", get(commissions::export))
        .route("/v1/cache/invalidate", post(cache::invalidate))
        .layer(cors)
        .with_state(state)
}
