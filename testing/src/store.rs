//! In-memory transactional pantry store.
//!
//! A single async mutex guards every table. [`InMemoryPantryStore::begin`]
//! acquires it for the lifetime of the unit and hands out a working copy;
//! `commit` writes the copy back, dropping the unit discards it. Units are
//! therefore fully serialized, which is stricter than the row locks the
//! production store takes but gives the same observable guarantees.
//!
//! The store mirrors the `PostgreSQL` schema constraints: unique item
//! identity, category foreign keys with `RESTRICT`, and notification rows
//! cascading with their item. History lives outside the transactional
//! tables, like the append path it models.

use pantry_core::store::{LockScope, NotificationFilter, PantryStore, StoreTransaction};
use pantry_core::{
    CategoryId, GroupId, ItemId, NotificationId, NotificationType, PantryCategory, PantryHistory,
    PantryItem, PantryNotification, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: HashMap<CategoryId, PantryCategory>,
    items: HashMap<ItemId, PantryItem>,
    // Insertion order; listings reverse it for newest-first.
    notifications: Vec<PantryNotification>,
}

impl Tables {
    fn check_item_key(&self, item: &PantryItem) -> StoreResult<()> {
        let key = item.name_key();
        let taken = self.items.values().any(|other| {
            other.id != item.id
                && other.group_id == item.group_id
                && other.category_id == item.category_id
                && other.name_key() == key
        });
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "pantry_items_identity: ({}, {key}, {})",
                item.group_id, item.category_id
            )));
        }
        if !self.categories.contains_key(&item.category_id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: category {} does not exist",
                item.category_id
            )));
        }
        Ok(())
    }
}

/// Switches that make the next store calls fail.
#[derive(Debug, Default)]
pub struct FaultPlan {
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_notification_writes: AtomicBool,
    fail_history_appends: AtomicBool,
}

/// In-memory [`PantryStore`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use pantry_testing::{InMemoryPantryStore, test_clock};
/// use pantry_core::{Clock, PantryStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryPantryStore::with_predefined(test_clock().now());
/// assert_eq!(store.category_count().await, pantry_core::PREDEFINED_CATEGORIES.len());
///
/// // An abandoned unit leaves nothing behind.
/// let tx = store.begin().await.unwrap();
/// drop(tx);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryPantryStore {
    tables: Arc<Mutex<Tables>>,
    history: Arc<Mutex<Vec<PantryHistory>>>,
    faults: Arc<FaultPlan>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryPantryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `categories`.
    #[must_use]
    pub fn with_categories(categories: impl IntoIterator<Item = PantryCategory>) -> Self {
        let tables = Tables {
            categories: categories
                .into_iter()
                .map(|category| (category.id, category))
                .collect(),
            ..Tables::default()
        };
        Self {
            tables: Arc::new(Mutex::new(tables)),
            ..Self::default()
        }
    }

    /// Create a store provisioned with [`pantry_core::PREDEFINED_CATEGORIES`].
    #[must_use]
    pub fn with_predefined(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self::with_categories(
            pantry_core::PREDEFINED_CATEGORIES
                .iter()
                .map(|name| PantryCategory::predefined(name, now)),
        )
    }

    /// Make `begin` fail.
    pub fn fail_begin(&self, fail: bool) {
        self.faults.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make `commit` fail (the unit is discarded).
    pub fn fail_commit(&self, fail: bool) {
        self.faults.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Make notification inserts and deletes fail.
    pub fn fail_notification_writes(&self, fail: bool) {
        self.faults.fail_notification_writes.store(fail, Ordering::SeqCst);
    }

    /// Make history appends fail.
    pub fn fail_history_appends(&self, fail: bool) {
        self.faults.fail_history_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of committed units so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Current state of an item.
    pub async fn item(&self, id: ItemId) -> Option<PantryItem> {
        self.tables.lock().await.items.get(&id).cloned()
    }

    /// Every item of every group.
    pub async fn all_items(&self) -> Vec<PantryItem> {
        self.tables.lock().await.items.values().cloned().collect()
    }

    /// Active notifications about `item_id`, oldest first.
    pub async fn notifications_for(&self, item_id: ItemId) -> Vec<PantryNotification> {
        self.tables
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.item_id == item_id)
            .cloned()
            .collect()
    }

    /// Number of stored categories, active or not.
    pub async fn category_count(&self) -> usize {
        self.tables.lock().await.categories.len()
    }

    /// Insert a category directly, bypassing the resolver.
    pub async fn put_category(&self, category: PantryCategory) {
        self.tables
            .lock()
            .await
            .categories
            .insert(category.id, category);
    }

    /// Total history entries across all groups.
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }
}

impl PantryStore for InMemoryPantryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        if self.faults.fail_begin.load(Ordering::SeqCst) {
            tracing::debug!("Injecting begin failure");
            return Err(StoreError::TransactionStart(
                "injected begin failure".to_string(),
            ));
        }
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = (*guard).clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
            commits: Arc::clone(&self.commits),
        })
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn visible_categories(&self, group_id: GroupId) -> StoreResult<Vec<PantryCategory>> {
        let tables = self.tables.lock().await;
        let mut categories: Vec<PantryCategory> = tables
            .categories
            .values()
            .filter(|category| category.is_visible_to(group_id))
            .cloned()
            .collect();
        categories.sort_by_cached_key(PantryCategory::name_key);
        Ok(categories)
    }

    async fn items(
        &self,
        group_id: GroupId,
        category_id: Option<CategoryId>,
    ) -> StoreResult<Vec<PantryItem>> {
        let tables = self.tables.lock().await;
        let mut items: Vec<PantryItem> = tables
            .items
            .values()
            .filter(|item| item.group_id == group_id)
            .filter(|item| category_id.is_none_or(|id| item.category_id == id))
            .cloned()
            .collect();
        items.sort_by_cached_key(|item| (item.category_id, item.name_key()));
        Ok(items)
    }

    async fn notifications(
        &self,
        group_id: GroupId,
        filter: NotificationFilter,
    ) -> StoreResult<Vec<PantryNotification>> {
        let tables = self.tables.lock().await;
        let mut notifications: Vec<PantryNotification> = tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.group_id == group_id)
            .filter(|n| !filter.unread_only || !n.is_read)
            .filter(|n| filter.item_id.is_none_or(|id| n.item_id == id))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn append_history(&self, entry: &PantryHistory) -> StoreResult<()> {
        if self.faults.fail_history_appends.load(Ordering::SeqCst) {
            tracing::debug!(item_id = %entry.item_id, "Injecting history append failure");
            return Err(StoreError::Database("injected history failure".to_string()));
        }
        self.history.lock().await.push(entry.clone());
        Ok(())
    }

    async fn history(
        &self,
        group_id: GroupId,
        item_id: Option<ItemId>,
    ) -> StoreResult<Vec<PantryHistory>> {
        let history = self.history.lock().await;
        let mut entries: Vec<PantryHistory> = history
            .iter()
            .rev()
            .filter(|entry| entry.group_id == group_id)
            .filter(|entry| item_id.is_none_or(|id| entry.item_id == id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

/// Unit of work over an [`InMemoryPantryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<FaultPlan>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryTransaction {
    fn check_notification_write(&self) -> StoreResult<()> {
        if self.faults.fail_notification_writes.load(Ordering::SeqCst) {
            tracing::debug!("Injecting notification write failure");
            return Err(StoreError::Database(
                "injected notification failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl StoreTransaction for InMemoryTransaction {
    async fn lock(&mut self, _scope: &LockScope) -> StoreResult<()> {
        // The whole store is already held exclusively.
        Ok(())
    }

    async fn category(&mut self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn category_for_update(&mut self, id: CategoryId) -> StoreResult<Option<PantryCategory>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn visible_category_by_name(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        exclude: Option<CategoryId>,
    ) -> StoreResult<Option<PantryCategory>> {
        Ok(self
            .working
            .categories
            .values()
            .find(|category| {
                Some(category.id) != exclude
                    && category.is_visible_to(group_id)
                    && category.name_key() == name_key
            })
            .cloned())
    }

    async fn insert_category(&mut self, category: &PantryCategory) -> StoreResult<()> {
        self.working
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn rename_category(&mut self, id: CategoryId, name: &str) -> StoreResult<bool> {
        let Some(category) = self.working.categories.get_mut(&id) else {
            return Ok(false);
        };
        category.name = name.to_string();
        Ok(true)
    }

    async fn delete_category(&mut self, id: CategoryId) -> StoreResult<bool> {
        if self.working.items.values().any(|item| item.category_id == id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: category {id} is still referenced"
            )));
        }
        Ok(self.working.categories.remove(&id).is_some())
    }

    async fn count_items_in_category(&mut self, id: CategoryId) -> StoreResult<u64> {
        let count = self
            .working
            .items
            .values()
            .filter(|item| item.category_id == id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn item_for_update(&mut self, id: ItemId) -> StoreResult<Option<PantryItem>> {
        Ok(self.working.items.get(&id).cloned())
    }

    async fn item_by_key_for_update(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> StoreResult<Option<PantryItem>> {
        Ok(self
            .working
            .items
            .values()
            .find(|item| {
                item.group_id == group_id
                    && item.category_id == category_id
                    && item.name_key() == name_key
            })
            .cloned())
    }

    async fn item_id_by_key(
        &mut self,
        group_id: GroupId,
        name_key: &str,
        category_id: CategoryId,
    ) -> StoreResult<Option<ItemId>> {
        Ok(self
            .item_by_key_for_update(group_id, name_key, category_id)
            .await?
            .map(|item| item.id))
    }

    async fn insert_item(&mut self, item: &PantryItem) -> StoreResult<()> {
        self.working.check_item_key(item)?;
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &PantryItem) -> StoreResult<()> {
        if !self.working.items.contains_key(&item.id) {
            return Err(StoreError::Database(format!("item {} does not exist", item.id)));
        }
        self.working.check_item_key(item)?;
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool> {
        let removed = self.working.items.remove(&id).is_some();
        if removed {
            self.working.notifications.retain(|n| n.item_id != id);
        }
        Ok(removed)
    }

    async fn item_notifications(&mut self, item_id: ItemId) -> StoreResult<Vec<PantryNotification>> {
        Ok(self
            .working
            .notifications
            .iter()
            .filter(|n| n.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn insert_notification(&mut self, notification: &PantryNotification) -> StoreResult<()> {
        self.check_notification_write()?;
        if !self.working.items.contains_key(&notification.item_id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: item {} does not exist",
                notification.item_id
            )));
        }
        self.working.notifications.push(notification.clone());
        Ok(())
    }

    async fn delete_item_notifications(
        &mut self,
        item_id: ItemId,
        kinds: &[NotificationType],
    ) -> StoreResult<u64> {
        self.check_notification_write()?;
        let before = self.working.notifications.len();
        self.working
            .notifications
            .retain(|n| n.item_id != item_id || !kinds.contains(&n.kind));
        let removed = before - self.working.notifications.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn notification(&mut self, id: NotificationId) -> StoreResult<Option<PantryNotification>> {
        Ok(self
            .working
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn mark_notification_read(&mut self, id: NotificationId) -> StoreResult<bool> {
        let Some(notification) = self.working.notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(false);
        };
        notification.is_read = true;
        Ok(true)
    }

    async fn delete_notification(&mut self, id: NotificationId) -> StoreResult<bool> {
        let before = self.working.notifications.len();
        self.working.notifications.retain(|n| n.id != id);
        Ok(self.working.notifications.len() < before)
    }

    async fn commit(mut self) -> StoreResult<()> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            tracing::debug!("Injecting commit failure; unit discarded");
            return Err(StoreError::Commit("injected commit failure".to_string()));
        }
        *self.guard = self.working;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
