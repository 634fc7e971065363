//! Rate template storage.

use super::{metadata_column, parse_column, Repository};
use crate::domain::{Metadata, RateTemplate, TemplateId, TierLevel, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const TEMPLATE_COLUMNS: &str = r#"
    id, name, upfront_rate, residual_rate, tier_level, is_default, is_active, metadata
"#;

impl Repository {
    /// Insert or update a template in one transaction.
    ///
    /// When the template is an active default, every other active default is
    /// demoted first, inside the same transaction. Returns how many were demoted.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_template(&self, template: &RateTemplate) -> Result<u64, sqlx::Error> {
        let now = TimeMs::now().as_i64();
        let mut tx = self.pool.begin().await?;

        let demoted = if template.is_default && template.is_active {
            sqlx::query(
                r#"
                UPDATE rate_templates
                SET is_default = 0, updated_at = ?
                WHERE is_default = 1 AND is_active = 1 AND id != ?
                "#,
            )
            .bind(now)
            .bind(template.id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            0
        };

        sqlx::query(
            r#"
            INSERT INTO rate_templates (
                id, name, upfront_rate, residual_rate, tier_level,
                is_default, is_active, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                upfront_rate = excluded.upfront_rate,
                residual_rate = excluded.residual_rate,
                tier_level = excluded.tier_level,
                is_default = excluded.is_default,
                is_active = excluded.is_active,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(template.id.as_str())
        .bind(&template.name)
        .bind(template.upfront_rate.to_canonical_string())
        .bind(template.residual_rate.to_canonical_string())
        .bind(template.tier_level.as_str())
        .bind(template.is_default)
        .bind(template.is_active)
        .bind(Metadata::RateTemplate(template.metadata.clone()).to_json())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(demoted)
    }

    /// Fetch a template by id regardless of its active flag.
    pub async fn get_template(&self, id: &TemplateId) -> Result<Option<RateTemplate>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rate_templates WHERE id = ?", TEMPLATE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    /// Active templates in creation order, optionally restricted to one tier.
    pub async fn list_active_templates(
        &self,
        tier: Option<TierLevel>,
    ) -> Result<Vec<RateTemplate>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM rate_templates
            WHERE is_active = 1 AND (?1 IS NULL OR tier_level = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#,
            TEMPLATE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tier.map(|t| t.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(template_from_row).collect()
    }

    /// Every active template flagged default. More than one means the store
    /// constraint is missing; callers decide how to report it.
    pub async fn list_active_defaults(&self) -> Result<Vec<RateTemplate>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM rate_templates
            WHERE is_active = 1 AND is_default = 1
            ORDER BY updated_at DESC, id ASC
            "#,
            TEMPLATE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(template_from_row).collect()
    }
}

fn template_from_row(row: &SqliteRow) -> Result<RateTemplate, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let metadata = metadata_column(row, "metadata", &id)
        .and_then(Metadata::into_template)
        .unwrap_or_default();

    Ok(RateTemplate {
        id: TemplateId::new(id),
        name: row.try_get("name")?,
        upfront_rate: parse_column(row, "upfront_rate")?,
        residual_rate: parse_column(row, "residual_rate")?,
        tier_level: parse_column(row, "tier_level")?,
        is_default: row.try_get("is_default")?,
        is_active: row.try_get("is_active")?,
        metadata,
    })
}
