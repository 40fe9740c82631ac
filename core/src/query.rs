//! Query/Projection Layer.
//!
//! Read-side assembly of items with their category and contributor. Reads are
//! not transactional; items looked up one after another in the same call may
//! be slightly stale relative to each other.
//!
//! Category and contributor lookups go through a [`ResolutionCache`] that
//! lives for exactly one call, so a listing of fifty items from two
//! categories and three contributors costs five lookups, and nothing learned
//! in one request leaks into the next.

use crate::config::PantryPolicy;
use crate::environment::Clock;
use crate::error::Result;
use crate::membership::MembershipDirectory;
use crate::store::{NotificationFilter, PantryStore};
use crate::types::{
    CategoryId, CategoryKind, GroupId, PantryCategory, PantryItem, PantryNotification, UserId,
    fold_name,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Category summary embedded in item projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    /// Category identifier
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Predefined or custom
    #[serde(rename = "type")]
    pub kind: CategoryKind,
}

impl From<&PantryCategory> for CategoryInfo {
    fn from(category: &PantryCategory) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            kind: category.kind,
        }
    }
}

/// An item enriched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    /// The stored item
    #[serde(flatten)]
    pub item: PantryItem,
    /// Resolved category, `None` if it could not be resolved at read time
    pub category: Option<CategoryInfo>,
    /// Expires within the expiring-soon window and not yet expired
    pub is_expiring_soon: bool,
    /// Expiration lies in the past
    pub is_expired: bool,
    /// Display name of the contributor who created the item
    pub added_by_name: Option<String>,
}

impl ItemView {
    /// Build a view, deriving the expiration flags at `now`.
    #[must_use]
    pub fn new(
        item: PantryItem,
        category: Option<&PantryCategory>,
        added_by_name: Option<String>,
        now: DateTime<Utc>,
        expiring_soon_window: Duration,
    ) -> Self {
        Self {
            is_expiring_soon: item.is_expiring_soon_at(now, expiring_soon_window),
            is_expired: item.is_expired_at(now),
            category: category.map(CategoryInfo::from),
            added_by_name,
            item,
        }
    }

    fn category_sort_key(&self) -> String {
        self.category
            .as_ref()
            .map(|category| fold_name(&category.name))
            .unwrap_or_default()
    }
}

/// Categories visible to a group, partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryListing {
    /// System-provisioned categories, sorted by name
    pub predefined: Vec<PantryCategory>,
    /// The group's own categories, sorted by name
    pub custom: Vec<PantryCategory>,
}

/// Why an item is on the shopping list, in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoppingReason {
    /// Quantity is zero
    OutOfStock,
    /// Quantity is at or below the low-stock threshold
    LowStock,
    /// Stock remains but has expired
    Expired,
}

/// One line of the inferred shopping list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListEntry {
    /// Why the item needs restocking
    pub reason: ShoppingReason,
    /// The item as currently stored
    pub item: ItemView,
}

/// Request-scoped memo of category and contributor lookups.
///
/// Dropped at the end of the call that created it.
pub struct ResolutionCache<'a, S, D> {
    store: &'a S,
    directory: &'a D,
    categories: HashMap<CategoryId, Option<PantryCategory>>,
    contributors: HashMap<UserId, Option<String>>,
}

impl<'a, S: PantryStore, D: MembershipDirectory> ResolutionCache<'a, S, D> {
    /// Start an empty cache.
    #[must_use]
    pub fn new(store: &'a S, directory: &'a D) -> Self {
        Self {
            store,
            directory,
            categories: HashMap::new(),
            contributors: HashMap::new(),
        }
    }

    /// Pre-populate with categories already loaded by the caller.
    pub fn prime_categories(&mut self, categories: impl IntoIterator<Item = PantryCategory>) {
        for category in categories {
            self.categories.insert(category.id, Some(category));
        }
    }

    /// Look up a category, at most once per id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if the lookup fails.
    pub async fn category(&mut self, id: CategoryId) -> Result<Option<&PantryCategory>> {
        if !self.categories.contains_key(&id) {
            let loaded = self.store.category(id).await?;
            self.categories.insert(id, loaded);
        }
        Ok(self.categories.get(&id).and_then(Option::as_ref))
    }

    /// Look up a contributor's display name, at most once per user.
    ///
    /// A failing directory degrades to `None` rather than failing the read.
    pub async fn contributor(&mut self, id: UserId) -> Option<String> {
        if let Some(name) = self.contributors.get(&id) {
            return name.clone();
        }
        let name = match self.directory.member(id).await {
            Ok(member) => member.map(|m| m.display_name),
            Err(e) => {
                tracing::debug!(user_id = %id, error = %e, "Contributor lookup failed");
                None
            }
        };
        self.contributors.insert(id, name.clone());
        name
    }

    /// Number of distinct lookups performed or primed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len() + self.contributors.len()
    }

    /// `true` before the first lookup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-side projections over a group's pantry.
pub struct PantryQuery<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    policy: PantryPolicy,
}

impl<S, D> Clone for PantryQuery<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S: PantryStore, D: MembershipDirectory> PantryQuery<S, D> {
    /// Create a query layer over the shared store and directory.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>, policy: PantryPolicy) -> Self {
        Self {
            store,
            directory,
            clock,
            policy,
        }
    }

    /// Items of `group_id`, optionally restricted to one category, sorted by
    /// (category name, item name).
    ///
    /// An unparsable or invisible `category_filter` yields an empty listing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if a read fails.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn list_items(
        &self,
        group_id: GroupId,
        category_filter: Option<&str>,
    ) -> Result<Vec<ItemView>> {
        let filter = match category_filter.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => None,
            Some(raw) => match CategoryId::parse(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::debug!(filter = raw, "Ignoring unparsable category filter");
                    return Ok(Vec::new());
                }
            },
        };

        let items = self.store.items(group_id, filter).await?;
        let mut views = self.project(group_id, items).await?;
        views.sort_by(|a, b| {
            a.category_sort_key()
                .cmp(&b.category_sort_key())
                .then_with(|| a.item.name_key().cmp(&b.item.name_key()))
        });

        tracing::debug!(count = views.len(), "Listed pantry items");
        Ok(views)
    }

    /// Categories visible to `group_id`, partitioned and sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if the read fails.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn list_categories(&self, group_id: GroupId) -> Result<CategoryListing> {
        let (mut predefined, mut custom): (Vec<_>, Vec<_>) = self
            .store
            .visible_categories(group_id)
            .await?
            .into_iter()
            .filter(|category| category.is_visible_to(group_id))
            .partition(PantryCategory::is_predefined);

        predefined.sort_by_cached_key(PantryCategory::name_key);
        custom.sort_by_cached_key(PantryCategory::name_key);
        Ok(CategoryListing { predefined, custom })
    }

    /// Unread notifications of `group_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if the read fails.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn warnings(&self, group_id: GroupId) -> Result<Vec<PantryNotification>> {
        let filter = NotificationFilter {
            unread_only: true,
            item_id: None,
        };
        Ok(self.store.notifications(group_id, filter).await?)
    }

    /// Items that expire within the window or have expired, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if a read fails.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn expiring_items(&self, group_id: GroupId) -> Result<Vec<ItemView>> {
        let now = self.clock.now();
        let window = self.policy.expiring_soon_window;
        let items: Vec<PantryItem> = self
            .store
            .items(group_id, None)
            .await?
            .into_iter()
            .filter(|item| item.expires_within(now, window))
            .collect();

        let mut views = self.project(group_id, items).await?;
        views.sort_by(|a, b| {
            a.item
                .expiration
                .cmp(&b.item.expiration)
                .then_with(|| a.item.name_key().cmp(&b.item.name_key()))
        });
        Ok(views)
    }

    /// Items that need restocking, sorted by (reason, category, name).
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if a read fails.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn shopping_list(&self, group_id: GroupId) -> Result<Vec<ShoppingListEntry>> {
        let now = self.clock.now();
        let items = self.store.items(group_id, None).await?;
        let views = self.project(group_id, items).await?;

        let mut entries: Vec<ShoppingListEntry> = views
            .into_iter()
            .filter_map(|view| {
                self.shopping_reason(&view.item, now)
                    .map(|reason| ShoppingListEntry { reason, item: view })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.reason
                .cmp(&b.reason)
                .then_with(|| a.item.category_sort_key().cmp(&b.item.category_sort_key()))
                .then_with(|| a.item.item.name_key().cmp(&b.item.item.name_key()))
        });
        Ok(entries)
    }

    fn shopping_reason(&self, item: &PantryItem, now: DateTime<Utc>) -> Option<ShoppingReason> {
        if item.quantity <= 0.0 {
            Some(ShoppingReason::OutOfStock)
        } else if item.quantity <= self.policy.low_stock_threshold {
            Some(ShoppingReason::LowStock)
        } else if item.is_expired_at(now) {
            Some(ShoppingReason::Expired)
        } else {
            None
        }
    }

    /// Enrich raw items using one request-scoped cache.
    async fn project(&self, group_id: GroupId, items: Vec<PantryItem>) -> Result<Vec<ItemView>> {
        let now = self.clock.now();
        let window = self.policy.expiring_soon_window;
        let mut cache = ResolutionCache::new(self.store.as_ref(), self.directory.as_ref());
        if !items.is_empty() {
            cache.prime_categories(self.store.visible_categories(group_id).await?);
        }

        let mut views = Vec::with_capacity(items.len());
        for item in items {
            let category = cache
                .category(item.category_id)
                .await?
                .filter(|category| category.is_visible_to(group_id))
                .cloned();
            let added_by_name = cache.contributor(item.added_by).await;
            views.push(ItemView::new(item, category.as_ref(), added_by_name, now, window));
        }

        tracing::trace!(lookups = cache.len(), "Projection cache released");
        Ok(views)
    }
}
