//! Store abstraction for the pantry ledger.
//!
//! The store is the single source of truth and the only place where
//! concurrent writers are reconciled. Correctness relies on its transaction
//! isolation, never on process-local locks, since several server instances
//! may share one database.
//!
//! # Design
//!
//! - [`PantryStore`]: the injected client. Opens atomic units and serves the
//!   non-transactional reads used by the query layer. History is appended
//!   here, outside any transaction.
//! - [`StoreTransaction`]: one atomic unit. Every multi-step mutation
//!   (category resolution, quantity write, notification transition) runs on
//!   a single transaction and either commits as a whole or rolls back.
//!   Dropping a transaction without calling [`StoreTransaction::commit`]
//!   rolls it back.
//!
//! # Implementations
//!
//! - `PostgresPantryStore` (in `pantry-postgres`): production implementation
//! - `InMemoryPantryStore` (in `pantry-testing`): fast, deterministic testing
//!
//! # Locking contract
//!
//! - [`StoreTransaction::item_for_update`] and
//!   [`StoreTransaction::item_by_key_for_update`] lock the returned row until
//!   the unit ends, so two concurrent `use` calls on one item serialize.
//!   A unit holds at most one item row lock, so units never wait on each
//!   other's item rows in opposite orders.
//! - [`StoreTransaction::category`] share-locks the category so a concurrent
//!   delete cannot orphan the item being written;
//!   [`StoreTransaction::category_for_update`] locks it exclusively.
//! - [`StoreTransaction::lock`] takes a transaction-scoped lock on a logical
//!   key (see [`LockScope`]) for decisions that span rows which may not
//!   exist yet.

use crate::error::StoreResult;
use crate::types::{
    CategoryId, GroupId, ItemId, NotificationId, NotificationType, PantryCategory,
    PantryHistory, PantryItem, PantryNotification,
};
use std::future::Future;

/// Logical keys serialized by [`StoreTransaction::lock`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockScope {
    /// Category naming decisions within one group.
    CategoryNames(GroupId),
    /// Upserts of one (group, folded name, category) item identity.
    ItemKey {
        /// Owning group
        group_id: GroupId,
        /// Folded item name
        name_key: String,
        /// Category reference
        category_id: CategoryId,
    },
}

impl LockScope {
    /// Stable string form, used by stores that hash it into a lock id.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::CategoryNames(group_id) => format!("pantry:categories:{group_id}"),
            Self::ItemKey {
                group_id,
                name_key,
                category_id,
            } => format!("pantry:item:{group_id}:{category_id}:{name_key}"),
        }
    }
}

/// Filter for notification listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    /// Only unread notifications.
    pub unread_only: bool,
    /// Only notifications about this item.
    pub item_id: Option<ItemId>,
}

/// One atomic unit of work against the store.
pub trait StoreTransaction: Send {
    /// Take a transaction-scoped lock on `scope`, released at commit/rollback.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the lock cannot be taken.
    fn lock(&mut self, scope: &LockScope) -> impl Future<Output = StoreResult<()>> + Send;

    // ═══════════════════════════════════════════════════════════════════════
    // Categories
    // ═══════════════════════════════════════════════════════════════════════

    /// Load a category by id (share-locked), regardless of visibility.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn category(
        &mut self,
        id: CategoryId,
    ) -> impl Future<Output = StoreResult<Option<PantryCategory>>> + Send;

    /// Load a category by id with an exclusive row lock.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn category_for_update(
        &mut self,
        id: CategoryId,
    ) -> impl Future<Output = StoreResult<Option<PantryCategory>>> + Send;

    /// Find an active category visible to `group_id` whose folded name equals
    /// `name_key`, ignoring `exclude`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn visible_category_by_name(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        exclude: Option<CategoryId>,
    ) -> impl Future<Output = StoreResult<Option<PantryCategory>>> + Send;

    /// Insert a new category.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn insert_category(
        &mut self,
        category: &PantryCategory,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Rename a category. Returns `false` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn rename_category(
        &mut self,
        id: CategoryId,
        name: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Delete a category. Returns `false` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn delete_category(&mut self, id: CategoryId)
    -> impl Future<Output = StoreResult<bool>> + Send;

    /// Number of items referencing `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn count_items_in_category(
        &mut self,
        id: CategoryId,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    // ═══════════════════════════════════════════════════════════════════════
    // Items
    // ═══════════════════════════════════════════════════════════════════════

    /// Load and row-lock an item by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn item_for_update(
        &mut self,
        id: ItemId,
    ) -> impl Future<Output = StoreResult<Option<PantryItem>>> + Send;

    /// Load and row-lock the item with the given upsert identity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn item_by_key_for_update(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> impl Future<Output = StoreResult<Option<PantryItem>>> + Send;

    /// Id of the item holding the given upsert identity, without locking it.
    ///
    /// Used by renames, which already hold their own item's row lock and must
    /// not wait on a second row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn item_id_by_key(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> impl Future<Output = StoreResult<Option<ItemId>>> + Send;

    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` if the upsert identity is taken.
    fn insert_item(&mut self, item: &PantryItem) -> impl Future<Output = StoreResult<()>> + Send;

    /// Overwrite every mutable field of an existing item.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` if the new identity is taken.
    fn update_item(&mut self, item: &PantryItem) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete an item. Returns `false` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn delete_item(&mut self, id: ItemId) -> impl Future<Output = StoreResult<bool>> + Send;

    // ═══════════════════════════════════════════════════════════════════════
    // Notifications
    // ═══════════════════════════════════════════════════════════════════════

    /// Every active notification about `item_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn item_notifications(
        &mut self,
        item_id: ItemId,
    ) -> impl Future<Output = StoreResult<Vec<PantryNotification>>> + Send;

    /// Insert a notification.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn insert_notification(
        &mut self,
        notification: &PantryNotification,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete notifications about `item_id` whose kind is in `kinds`.
    /// Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn delete_item_notifications(
        &mut self,
        item_id: ItemId,
        kinds: &[NotificationType],
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Load a notification by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn notification(
        &mut self,
        id: NotificationId,
    ) -> impl Future<Output = StoreResult<Option<PantryNotification>>> + Send;

    /// Set the read flag. Returns `false` if the notification is gone.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn mark_notification_read(
        &mut self,
        id: NotificationId,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Delete one notification. Returns `false` if it is already gone.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn delete_notification(
        &mut self,
        id: NotificationId,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Commit the unit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Commit` if the commit fails; nothing is applied.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Store client shared by every pantry component.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one client is shared by all
/// in-flight requests.
pub trait PantryStore: Send + Sync {
    /// Atomic unit type.
    type Transaction: StoreTransaction;

    /// Open an atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TransactionStart` if no unit can be opened.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Transaction>> + Send;

    /// Load a category by id without locking.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn category(
        &self,
        id: CategoryId,
    ) -> impl Future<Output = StoreResult<Option<PantryCategory>>> + Send;

    /// Active categories visible to `group_id` (predefined and its custom).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn visible_categories(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = StoreResult<Vec<PantryCategory>>> + Send;

    /// Items of a group, optionally restricted to one category, ordered by
    /// (category id, folded name).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn items(
        &self,
        group_id: GroupId,
        category_id: Option<CategoryId>,
    ) -> impl Future<Output = StoreResult<Vec<PantryItem>>> + Send;

    /// Notifications of a group, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn notifications(
        &self,
        group_id: GroupId,
        filter: NotificationFilter,
    ) -> impl Future<Output = StoreResult<Vec<PantryNotification>>> + Send;

    /// Append one history entry, outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    fn append_history(
        &self,
        entry: &PantryHistory,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// History of a group, optionally for one item, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn history(
        &self,
        group_id: GroupId,
        item_id: Option<ItemId>,
    ) -> impl Future<Output = StoreResult<Vec<PantryHistory>>> + Send;
}
