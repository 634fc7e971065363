//! Affiliate storage, rate history and the versioned rate write.

use super::{is_lock_contention, parse_column, Repository};
use crate::domain::{
    Affiliate, AffiliateId, AffiliateStatus, CommissionRates, RateHistoryEntry, TierLevel, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

const AFFILIATE_COLUMNS: &str = r#"
    id, external_id, name, email, status, upfront_rate, residual_rate, tier_level,
    total_sales, total_commissions, onboarding_status, created_at, updated_at, version
"#;

/// Optional status/tier filter for affiliate listings.
#[derive(Debug, Clone, Default)]
pub struct AffiliateFilter {
    pub status: Option<AffiliateStatus>,
    pub tier: Option<TierLevel>,
}

/// A rate change to apply only if the affiliate is still at `expected_version`.
#[derive(Debug, Clone)]
pub struct RateWrite {
    pub affiliate_id: AffiliateId,
    pub expected_version: i64,
    pub previous: CommissionRates,
    pub next: CommissionRates,
    /// New tier to record alongside the rates, if the change is a promotion.
    pub tier: Option<TierLevel>,
    pub reason: String,
    pub changed_by: Option<String>,
    pub effective_date: TimeMs,
}

#[derive(Debug, Clone)]
pub enum RateWriteOutcome {
    Applied {
        affiliate: Affiliate,
        entry: RateHistoryEntry,
    },
    /// The row moved past `expected_version` (or vanished) before the write.
    VersionMismatch,
    /// Another writer held the database lock past the busy timeout.
    Contended,
}

impl Repository {
    /// Insert a new affiliate.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including a duplicate id or external id).
    pub async fn insert_affiliate(&self, affiliate: &Affiliate) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO affiliates (
                id, external_id, name, email, status, upfront_rate, residual_rate, tier_level,
                total_sales, total_commissions, onboarding_status, created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(affiliate.id.as_str())
        .bind(&affiliate.external_id)
        .bind(&affiliate.name)
        .bind(&affiliate.email)
        .bind(affiliate.status.as_str())
        .bind(affiliate.upfront_rate.to_canonical_string())
        .bind(affiliate.residual_rate.to_canonical_string())
        .bind(affiliate.tier_level.as_str())
        .bind(affiliate.total_sales.to_canonical_string())
        .bind(affiliate.total_commissions.to_canonical_string())
        .bind(affiliate.onboarding_status.as_str())
        .bind(affiliate.created_at.as_i64())
        .bind(affiliate.updated_at.as_i64())
        .bind(affiliate.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a single affiliate by id.
    pub async fn get_affiliate(&self, id: &AffiliateId) -> Result<Option<Affiliate>, sqlx::Error> {
        let sql = format!("SELECT {} FROM affiliates WHERE id = ?", AFFILIATE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(affiliate_from_row).transpose()
    }

    /// List affiliates matching the filter, ordered by name then id.
    pub async fn list_affiliates(
        &self,
        filter: &AffiliateFilter,
    ) -> Result<Vec<Affiliate>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM affiliates
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR tier_level = ?2)
            ORDER BY name ASC, id ASC
            "#,
            AFFILIATE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.tier.map(|t| t.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(affiliate_from_row).collect()
    }

    /// Apply a rate change and append its history entry in one transaction.
    ///
    /// The update only matches while the stored version equals
    /// `write.expected_version`; otherwise nothing is written and
    /// `VersionMismatch` is returned. Lock timeouts are reported as
    /// `Contended` rather than as errors so callers can retry.
    ///
    /// # Errors
    /// Returns an error for any other database failure.
    pub async fn write_rates_versioned(
        &self,
        write: &RateWrite,
    ) -> Result<RateWriteOutcome, sqlx::Error> {
        match self.write_rates_tx(write).await {
            Err(e) if is_lock_contention(&e) => {
                debug!(affiliate_id = %write.affiliate_id, error = %e, "Rate write hit lock contention");
                Ok(RateWriteOutcome::Contended)
            }
            other => other,
        }
    }

    async fn write_rates_tx(&self, write: &RateWrite) -> Result<RateWriteOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction takes the write lock before reading anything.
        let updated = sqlx::query(
            r#"
            UPDATE affiliates
            SET upfront_rate = ?,
                residual_rate = ?,
                tier_level = COALESCE(?, tier_level),
                updated_at = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(write.next.upfront_rate.to_canonical_string())
        .bind(write.next.residual_rate.to_canonical_string())
        .bind(write.tier.map(|t| t.as_str()))
        .bind(write.effective_date.as_i64())
        .bind(write.affiliate_id.as_str())
        .bind(write.expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RateWriteOutcome::VersionMismatch);
        }

        let history_id = sqlx::query(
            r#"
            INSERT INTO rate_history (
                affiliate_id, previous_upfront_rate, new_upfront_rate,
                previous_residual_rate, new_residual_rate, reason, changed_by, effective_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(write.affiliate_id.as_str())
        .bind(write.previous.upfront_rate.to_canonical_string())
        .bind(write.next.upfront_rate.to_canonical_string())
        .bind(write.previous.residual_rate.to_canonical_string())
        .bind(write.next.residual_rate.to_canonical_string())
        .bind(&write.reason)
        .bind(write.changed_by.as_deref())
        .bind(write.effective_date.as_i64())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let sql = format!("SELECT {} FROM affiliates WHERE id = ?", AFFILIATE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(write.affiliate_id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let affiliate = affiliate_from_row(&row)?;

        tx.commit().await?;

        let entry = RateHistoryEntry {
            id: history_id,
            affiliate_id: write.affiliate_id.clone(),
            previous_upfront_rate: write.previous.upfront_rate,
            new_upfront_rate: write.next.upfront_rate,
            previous_residual_rate: write.previous.residual_rate,
            new_residual_rate: write.next.residual_rate,
            reason: write.reason.clone(),
            changed_by: write.changed_by.clone(),
            effective_date: write.effective_date,
        };

        Ok(RateWriteOutcome::Applied { affiliate, entry })
    }

    /// Rate history for an affiliate, newest first.
    ///
    /// Entries sharing an effective date are ordered by insertion, newest first.
    pub async fn query_rate_history(
        &self,
        affiliate_id: &AffiliateId,
    ) -> Result<Vec<RateHistoryEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, affiliate_id, previous_upfront_rate, new_upfront_rate,
                   previous_residual_rate, new_residual_rate, reason, changed_by, effective_date
            FROM rate_history
            WHERE affiliate_id = ?
            ORDER BY effective_date DESC, id DESC
            "#,
        )
        .bind(affiliate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RateHistoryEntry {
                    id: row.try_get("id")?,
                    affiliate_id: AffiliateId::new(row.try_get::<String, _>("affiliate_id")?),
                    previous_upfront_rate: parse_column(row, "previous_upfront_rate")?,
                    new_upfront_rate: parse_column(row, "new_upfront_rate")?,
                    previous_residual_rate: parse_column(row, "previous_residual_rate")?,
                    new_residual_rate: parse_column(row, "new_residual_rate")?,
                    reason: row.try_get("reason")?,
                    changed_by: row.try_get("changed_by")?,
                    effective_date: TimeMs::new(row.try_get("effective_date")?),
                })
            })
            .collect()
    }
}

fn affiliate_from_row(row: &SqliteRow) -> Result<Affiliate, sqlx::Error> {
    Ok(Affiliate {
        id: AffiliateId::new(row.try_get::<String, _>("id")?),
        external_id: row.try_get("external_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        status: parse_column(row, "status")?,
        upfront_rate: parse_column(row, "upfront_rate")?,
        residual_rate: parse_column(row, "residual_rate")?,
        tier_level: parse_column(row, "tier_level")?,
        total_sales: parse_column(row, "total_sales")?,
        total_commissions: parse_column(row, "total_commissions")?,
        onboarding_status: parse_column(row, "onboarding_status")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        updated_at: TimeMs::new(row.try_get("updated_at")?),
        version: row.try_get("version")?,
    })
}
