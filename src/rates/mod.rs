//! Commission-rate management: template catalog, rate ledger, conflict
//! advisories and bulk operations.

pub mod advisor;
pub mod bulk;
pub mod catalog;
pub mod ledger;
pub mod retry;

pub use advisor::{ConflictAdvisor, ConflictThresholds, RateConflict, RateField};
pub use bulk::{
    AffiliateAdvisory, BatchStatus, BulkFailure, BulkOutcome, BulkRateOperator, BulkRateRequest,
    RatePatch,
};
pub use catalog::RateTemplateCatalog;
pub use ledger::{AffiliateRateLedger, RateChange, TIER_PROMOTION_REASON};
pub use retry::RetryPolicy;
