//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `affiliates.rs` - Affiliate reads and the versioned rate write + history
//! - `templates.rs` - Rate template catalog storage
//! - `commissions.rs` - Commission entry storage and filtered reads

mod affiliates;
mod commissions;
mod templates;

pub use affiliates::{AffiliateFilter, RateWrite, RateWriteOutcome};
pub use commissions::CommissionFilter;

use crate::domain::Metadata;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip a trivial query to confirm the store is reachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the underlying pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Parse a TEXT column through `FromStr`, reporting failures as decode errors.
///
/// Rates are never defaulted on a bad read: a zero would be written into the
/// next history entry as the "previous" value.
fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Parse a metadata JSON column, falling back to `None` on malformed content.
fn metadata_column(row: &SqliteRow, column: &str, owner: &str) -> Option<Metadata> {
    let raw: String = row.try_get(column).ok()?;
    match Metadata::from_json(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(
                owner = %owner,
                metadata = %raw,
                error = %e,
                "Failed to parse metadata column, using default"
            );
            None
        }
    }
}

/// True when SQLite refused a statement because another writer holds the lock.
///
/// Covers SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
pub(crate) fn is_lock_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}
