//! Out-of-band provisioning of predefined categories.

use chrono::{DateTime, Utc};
use pantry_core::{PantryCategory, StoreError, StoreResult};
use sqlx::PgPool;

/// Insert every name in `names` as a predefined category unless one with the
/// same folded name already exists. Returns how many were inserted.
///
/// Safe to run repeatedly and concurrently.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if an insert fails.
pub async fn provision_predefined_categories(
    pool: &PgPool,
    names: &[&str],
    now: DateTime<Utc>,
) -> StoreResult<u64> {
    let mut inserted = 0;
    for name in names {
        let category = PantryCategory::predefined(name, now);
        let result = sqlx::query(
            r"
            INSERT INTO pantry_categories (
                id, name, name_key, kind, group_id, created_by, is_active, created_at
            ) VALUES ($1, $2, $3, 'predefined', NULL, NULL, TRUE, $4)
            ON CONFLICT (name_key) WHERE kind = 'predefined' DO NOTHING
            ",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.name_key())
        .bind(category.created_at)
        .execute(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to provision {name}: {e}")))?;

        if result.rows_affected() > 0 {
            tracing::info!(category = %category.name, "Provisioned predefined category");
        }
        inserted += result.rows_affected();
    }

    metrics::counter!("pantry.category.provisioned").increment(inserted);
    Ok(inserted)
}
