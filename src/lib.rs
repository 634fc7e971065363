pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod rates;

pub use cache::{CacheStats, CacheTtl, DashboardCache, EntryState};
pub use config::Config;
pub use dashboard::DashboardService;
pub use db::{init_db, Repository};
pub use domain::{
    Affiliate, AffiliateId, CommissionEntry, CommissionRates, Decimal, RateHistoryEntry,
    RateTemplate, TemplateId, TierLevel, TimeMs,
};
pub use error::{AppError, RateError};
pub use rates::{
    AffiliateRateLedger, BulkRateOperator, ConflictAdvisor, RateTemplateCatalog, RetryPolicy,
};
