//! Pure computation over commission entries: rollups and export rows.
//!
//! Nothing here touches the store; callers load entries and pass them in.

pub mod aggregator;
pub mod export;

pub use aggregator::{AffiliateCommissionSummary, CommissionAggregator, CommissionStats};
pub use export::{export_csv, export_rows, ExportError, ExportRow, EXPORT_HEADER};
