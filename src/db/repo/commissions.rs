//! Commission entry storage.
//!
//! Entries are produced upstream from referral events; the core only stores
//! already-normalized records and reads them back for aggregation and export.

use super::{metadata_column, parse_column, Repository};
use crate::domain::{AffiliateId, CommissionEntry, CommissionStatus, Metadata, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Optional filters for commission listings. Time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct CommissionFilter {
    pub status: Option<CommissionStatus>,
    pub affiliate_id: Option<AffiliateId>,
    pub from_ms: Option<TimeMs>,
    pub to_ms: Option<TimeMs>,
}

impl Repository {
    /// Insert multiple commission entries in a single transaction.
    ///
    /// Returns the number of newly inserted entries (existing ids are skipped).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_commission_entries_batch(
        &self,
        entries: &[CommissionEntry],
    ) -> Result<usize, sqlx::Error> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT INTO commission_entries (
                    id, affiliate_id, commission_type, order_total, commission_amount,
                    commission_rate, status, payment_date, created_at, metadata
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&entry.id)
            .bind(entry.affiliate_id.as_str())
            .bind(entry.commission_type.as_str())
            .bind(entry.order_total.to_canonical_string())
            .bind(entry.commission_amount.to_canonical_string())
            .bind(entry.commission_rate.to_canonical_string())
            .bind(entry.status.as_str())
            .bind(entry.payment_date.map(|t| t.as_i64()))
            .bind(entry.created_at.as_i64())
            .bind(Metadata::CommissionEntry(entry.metadata.clone()).to_json())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Query commission entries joined with their affiliate's name and external id.
    ///
    /// Ordered by `created_at` then id so exports are reproducible.
    pub async fn query_commission_entries(
        &self,
        filter: &CommissionFilter,
    ) -> Result<Vec<CommissionEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT ce.id, ce.affiliate_id, a.name AS affiliate_name,
                   a.external_id AS affiliate_external_id, ce.commission_type,
                   ce.order_total, ce.commission_amount, ce.commission_rate, ce.status,
                   ce.payment_date, ce.created_at, ce.metadata
            FROM commission_entries ce
            LEFT JOIN affiliates a ON a.id = ce.affiliate_id
            WHERE (?1 IS NULL OR ce.status = ?1)
              AND (?2 IS NULL OR ce.affiliate_id = ?2)
              AND (?3 IS NULL OR ce.created_at >= ?3)
              AND (?4 IS NULL OR ce.created_at <= ?4)
            ORDER BY ce.created_at ASC, ce.id ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.affiliate_id.as_ref().map(|id| id.as_str()))
        .bind(filter.from_ms.map(|t| t.as_i64()))
        .bind(filter.to_ms.map(|t| t.as_i64()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(commission_from_row).collect()
    }
}

fn commission_from_row(row: &SqliteRow) -> Result<CommissionEntry, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let metadata = metadata_column(row, "metadata", &id)
        .and_then(Metadata::into_commission)
        .unwrap_or_default();

    Ok(CommissionEntry {
        affiliate_id: AffiliateId::new(row.try_get::<String, _>("affiliate_id")?),
        affiliate_name: row.try_get("affiliate_name")?,
        affiliate_external_id: row.try_get("affiliate_external_id")?,
        commission_type: parse_column(row, "commission_type")?,
        order_total: parse_column(row, "order_total")?,
        commission_amount: parse_column(row, "commission_amount")?,
        commission_rate: parse_column(row, "commission_rate")?,
        status: parse_column(row, "status")?,
        payment_date: row.try_get::<Option<i64>, _>("payment_date")?.map(TimeMs::new),
        created_at: TimeMs::new(row.try_get("created_at")?),
        metadata,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{make_affiliate, setup_test_db};
    use super::*;
    use crate::domain::{CommissionMetadata, CommissionType, Decimal, TierLevel};

    fn entry(id: &str, affiliate: &AffiliateId, status: CommissionStatus, at: i64) -> CommissionEntry {
        CommissionEntry {
            id: id.to_string(),
            affiliate_id: affiliate.clone(),
            affiliate_name: None,
            affiliate_external_id: None,
            commission_type: CommissionType::Upfront,
            order_total: Decimal::from_i64(1000),
            commission_amount: Decimal::from_i64(100),
            commission_rate: Decimal::from_i64(10),
            status,
            payment_date: None,
            created_at: TimeMs::new(at),
            metadata: CommissionMetadata {
                customer_name: Some("Acme Corp".to_string()),
                customer_email: None,
                product_name: Some("Solar".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_insert_batch_skips_duplicates_and_joins_affiliate() {
        let (repo, _temp) = setup_test_db().await;
        let affiliate = make_affiliate("ext-9", TierLevel::Gold);
        repo.insert_affiliate(&affiliate).await.unwrap();

        let e1 = entry("c1", &affiliate.id, CommissionStatus::Paid, 1_000);
        let inserted = repo
            .insert_commission_entries_batch(&[e1.clone(), e1.clone()])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = repo
            .query_commission_entries(&CommissionFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].affiliate_name.as_deref(), Some("Affiliate ext-9"));
        assert_eq!(rows[0].affiliate_external_id.as_deref(), Some("ext-9"));
        assert_eq!(rows[0].metadata, e1.metadata);
    }

    #[tokio::test]
    async fn test_query_filters_by_status_and_window() {
        let (repo, _temp) = setup_test_db().await;
        let affiliate = make_affiliate("ext-1", TierLevel::Gold);
        repo.insert_affiliate(&affiliate).await.unwrap();

        repo.insert_commission_entries_batch(&[
            entry("c1", &affiliate.id, CommissionStatus::Paid, 1_000),
            entry("c2", &affiliate.id, CommissionStatus::Pending, 2_000),
            entry("c3", &affiliate.id, CommissionStatus::Paid, 3_000),
        ])
        .await
        .unwrap();

        let paid = repo
            .query_commission_entries(&CommissionFilter {
                status: Some(CommissionStatus::Paid),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<&str> = paid.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);

        let window = repo
            .query_commission_entries(&CommissionFilter {
                from_ms: Some(TimeMs::new(1_500)),
                to_ms: Some(TimeMs::new(3_000)),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<&str> = window.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3"]);
    }
}
