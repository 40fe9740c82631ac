//! `PostgreSQL` implementation of the pantry store.
//!
//! Every [`PostgresTransaction`] wraps one database transaction. Row locks
//! come from `FOR SHARE` / `FOR UPDATE`; logical locks use
//! `pg_advisory_xact_lock` on a 64-bit hash of [`LockScope::key`], so they are
//! released automatically at commit or rollback.

use chrono::{DateTime, Utc};
use pantry_core::{
    CategoryId, CategoryKind, GroupId, HistoryAction, HistoryId, ItemId, LockScope,
    NotificationFilter, NotificationId, NotificationType, PantryCategory, PantryHistory,
    PantryItem, PantryNotification, PantryStore, StoreError, StoreResult, StoreTransaction,
    UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "id, name, kind, group_id, created_by, is_active, created_at";

const ITEM_COLUMNS: &str =
    "id, group_id, name, quantity, unit, category_id, expiration, added_by, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str =
    "id, group_id, item_id, item_name, kind, message, is_read, created_at";

/// Map a driver error, keeping unique violations distinguishable.
fn db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(
                db_err.constraint().unwrap_or("unique constraint").to_string(),
            );
        }
    }
    StoreError::Database(e.to_string())
}

fn decode_error(e: sqlx::Error) -> StoreError {
    StoreError::Decode(e.to_string())
}

fn category_from_row(row: &PgRow) -> StoreResult<PantryCategory> {
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    Ok(PantryCategory {
        id: CategoryId::from_uuid(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        kind: CategoryKind::parse(&kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown category kind: {kind}")))?,
        group_id: row
            .try_get::<Option<Uuid>, _>("group_id")
            .map_err(decode_error)?
            .map(GroupId::from_uuid),
        created_by: row
            .try_get::<Option<Uuid>, _>("created_by")
            .map_err(decode_error)?
            .map(UserId::from_uuid),
        is_active: row.try_get("is_active").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<PantryItem> {
    Ok(PantryItem {
        id: ItemId::from_uuid(row.try_get("id").map_err(decode_error)?),
        group_id: GroupId::from_uuid(row.try_get("group_id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        quantity: row.try_get("quantity").map_err(decode_error)?,
        unit: row.try_get("unit").map_err(decode_error)?,
        category_id: CategoryId::from_uuid(row.try_get("category_id").map_err(decode_error)?),
        expiration: row
            .try_get::<Option<DateTime<Utc>>, _>("expiration")
            .map_err(decode_error)?,
        added_by: UserId::from_uuid(row.try_get("added_by").map_err(decode_error)?),
        created_at: row.try_get("created_at").map_err(decode_error)?,
        updated_at: row.try_get("updated_at").map_err(decode_error)?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<PantryNotification> {
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    Ok(PantryNotification {
        id: NotificationId::from_uuid(row.try_get("id").map_err(decode_error)?),
        group_id: GroupId::from_uuid(row.try_get("group_id").map_err(decode_error)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode_error)?),
        item_name: row.try_get("item_name").map_err(decode_error)?,
        kind: NotificationType::parse(&kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown notification type: {kind}")))?,
        message: row.try_get("message").map_err(decode_error)?,
        is_read: row.try_get("is_read").map_err(decode_error)?,
        created_at: row.try_get("created_at").map_err(decode_error)?,
    })
}

fn history_from_row(row: &PgRow) -> StoreResult<PantryHistory> {
    let action: String = row.try_get("action").map_err(decode_error)?;
    Ok(PantryHistory {
        id: HistoryId::from_uuid(row.try_get("id").map_err(decode_error)?),
        group_id: GroupId::from_uuid(row.try_get("group_id").map_err(decode_error)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode_error)?),
        item_name: row.try_get("item_name").map_err(decode_error)?,
        action: HistoryAction::parse(&action)
            .ok_or_else(|| StoreError::Decode(format!("unknown history action: {action}")))?,
        quantity_delta: row.try_get("quantity_delta").map_err(decode_error)?,
        actor_id: UserId::from_uuid(row.try_get("actor_id").map_err(decode_error)?),
        actor_name: row.try_get("actor_name").map_err(decode_error)?,
        recorded_at: row.try_get("recorded_at").map_err(decode_error)?,
    })
}

fn collect<T>(rows: &[PgRow], decode: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

/// `PostgreSQL`-backed pantry store.
///
/// # Example
///
/// ```no_run
/// use pantry_postgres::PostgresPantryStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresPantryStore::new(pool);
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresPantryStore {
    pool: PgPool,
}

impl PostgresPantryStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PantryStore for PostgresPantryStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> StoreResult<PostgresTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionStart(e.to_string()))?;
        Ok(PostgresTransaction { tx })
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM pantry_categories WHERE id = $1");
        sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(category_from_row)
            .transpose()
    }

    async fn visible_categories(&self, group_id: GroupId) -> StoreResult<Vec<PantryCategory>> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM pantry_categories
             WHERE is_active AND (kind = 'predefined' OR group_id = $1)
             ORDER BY name_key"
        );
        let rows = sqlx::query(&query)
            .bind(group_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        collect(&rows, category_from_row)
    }

    async fn items(
        &self,
        group_id: GroupId,
        category_id: Option<CategoryId>,
    ) -> StoreResult<Vec<PantryItem>> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM pantry_items
             WHERE group_id = $1 AND ($2::uuid IS NULL OR category_id = $2)
             ORDER BY category_id, name_key"
        );
        let rows = sqlx::query(&query)
            .bind(group_id.as_uuid())
            .bind(category_id.map(|id| *id.as_uuid()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        collect(&rows, item_from_row)
    }

    async fn notifications(
        &self,
        group_id: GroupId,
        filter: NotificationFilter,
    ) -> StoreResult<Vec<PantryNotification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pantry_notifications
             WHERE group_id = $1
               AND (NOT $2 OR NOT is_read)
               AND ($3::uuid IS NULL OR item_id = $3)
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query(&query)
            .bind(group_id.as_uuid())
            .bind(filter.unread_only)
            .bind(filter.item_id.map(|id| *id.as_uuid()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        collect(&rows, notification_from_row)
    }

    async fn append_history(&self, entry: &PantryHistory) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO pantry_history (
                id, group_id, item_id, item_name, action, quantity_delta,
                actor_id, actor_name, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.group_id.as_uuid())
        .bind(entry.item_id.as_uuid())
        .bind(&entry.item_name)
        .bind(entry.action.as_str())
        .bind(entry.quantity_delta)
        .bind(entry.actor_id.as_uuid())
        .bind(&entry.actor_name)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn history(
        &self,
        group_id: GroupId,
        item_id: Option<ItemId>,
    ) -> StoreResult<Vec<PantryHistory>> {
        let rows = sqlx::query(
            r"
            SELECT id, group_id, item_id, item_name, action, quantity_delta,
                   actor_id, actor_name, recorded_at
            FROM pantry_history
            WHERE group_id = $1 AND ($2::uuid IS NULL OR item_id = $2)
            ORDER BY recorded_at DESC, seq DESC
            ",
        )
        .bind(group_id.as_uuid())
        .bind(item_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        collect(&rows, history_from_row)
    }
}

/// One database transaction. Dropping it without [`StoreTransaction::commit`]
/// rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn fetch_category(&mut self, id: CategoryId, lock: &str) -> StoreResult<Option<PantryCategory>> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM pantry_categories WHERE id = $1 {lock}");
        sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(category_from_row)
            .transpose()
    }
}

impl StoreTransaction for PostgresTransaction {
    async fn lock(&mut self, scope: &LockScope) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(scope.key())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn category(&mut self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        self.fetch_category(id, "FOR SHARE").await
    }

    async fn category_for_update(&mut self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        self.fetch_category(id, "FOR UPDATE").await
    }

    async fn visible_category_by_name(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        exclude: Option<CategoryId>,
    ) -> StoreResult<Option<PantryCategory>> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM pantry_categories
             WHERE is_active
               AND name_key = $2
               AND (kind = 'predefined' OR group_id = $1)
               AND ($3::uuid IS NULL OR id <> $3)
             LIMIT 1"
        );
        sqlx::query(&query)
            .bind(group_id.as_uuid())
            .bind(name_key)
            .bind(exclude.map(|id| *id.as_uuid()))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(category_from_row)
            .transpose()
    }

    async fn insert_category(&mut self, category: &PantryCategory) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO pantry_categories (
                id, name, name_key, kind, group_id, created_by, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.name_key())
        .bind(category.kind.as_str())
        .bind(category.group_id.map(|id| *id.as_uuid()))
        .bind(category.created_by.map(|id| *id.as_uuid()))
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn rename_category(&mut self, id: CategoryId, name: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE pantry_categories SET name = $2, name_key = $3 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(name)
        .bind(pantry_core::fold_name(name))
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_category(&mut self, id: CategoryId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pantry_categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_items_in_category(&mut self, id: CategoryId) -> StoreResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pantry_items WHERE category_id = $1")
                .bind(id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db_error)?;
        u64::try_from(count).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn item_for_update(&mut self, id: ItemId) -> StoreResult<Option<PantryItem>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM pantry_items WHERE id = $1 FOR UPDATE");
        sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn item_by_key_for_update(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> StoreResult<Option<PantryItem>> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM pantry_items
             WHERE group_id = $1 AND name_key = $2 AND category_id = $3
             FOR UPDATE"
        );
        sqlx::query(&query)
            .bind(group_id.as_uuid())
            .bind(name_key)
            .bind(category_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(item_from_row)
            .transpose()
    }

    async fn item_id_by_key(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> StoreResult<Option<ItemId>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM pantry_items
             WHERE group_id = $1 AND name_key = $2 AND category_id = $3",
        )
        .bind(group_id.as_uuid())
        .bind(name_key)
        .bind(category_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(id.map(ItemId::from_uuid))
    }

    async fn insert_item(&mut self, item: &PantryItem) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO pantry_items (
                id, group_id, name, name_key, quantity, unit, category_id,
                expiration, added_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(item.id.as_uuid())
        .bind(item.group_id.as_uuid())
        .bind(&item.name)
        .bind(item.name_key())
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.category_id.as_uuid())
        .bind(item.expiration)
        .bind(item.added_by.as_uuid())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_item(&mut self, item: &PantryItem) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE pantry_items
            SET name = $2, name_key = $3, quantity = $4, unit = $5,
                category_id = $6, expiration = $7, updated_at = $8
            WHERE id = $1
            ",
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.name_key())
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.category_id.as_uuid())
        .bind(item.expiration)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pantry_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn item_notifications(&mut self, item_id: ItemId) -> StoreResult<Vec<PantryNotification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pantry_notifications
             WHERE item_id = $1
             ORDER BY seq"
        );
        let rows = sqlx::query(&query)
            .bind(item_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
        collect(&rows, notification_from_row)
    }

    async fn insert_notification(&mut self, notification: &PantryNotification) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO pantry_notifications (
                id, group_id, item_id, item_name, kind, message, is_read, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.group_id.as_uuid())
        .bind(notification.item_id.as_uuid())
        .bind(&notification.item_name)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete_item_notifications(
        &mut self,
        item_id: ItemId,
        kinds: &[NotificationType],
    ) -> StoreResult<u64> {
        let kinds: Vec<&str> = kinds.iter().map(NotificationType::as_str).collect();
        let result =
            sqlx::query("DELETE FROM pantry_notifications WHERE item_id = $1 AND kind = ANY($2)")
                .bind(item_id.as_uuid())
                .bind(kinds)
                .execute(&mut *self.tx)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn notification(&mut self, id: NotificationId) -> StoreResult<Option<PantryNotification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pantry_notifications WHERE id = $1 FOR UPDATE"
        );
        sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(notification_from_row)
            .transpose()
    }

    async fn mark_notification_read(&mut self, id: NotificationId) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE pantry_notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_notification(&mut self, id: NotificationId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM pantry_notifications WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Commit(e.to_string()))
    }
}
