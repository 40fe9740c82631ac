//! Facade wiring every component from one [`PantryEnvironment`].
//!
//! Mutations are reached through the component accessors, which check
//! membership themselves. The group-scoped reads below add the membership
//! check the raw [`PantryQuery`] and [`HistoryLedger`] leave to their caller.

use crate::category::CategoryResolver;
use crate::environment::PantryEnvironment;
use crate::error::Result;
use crate::history::HistoryLedger;
use crate::item::ItemMutator;
use crate::membership::{MembershipDirectory, require_group_member};
use crate::notification::NotificationInbox;
use crate::query::{CategoryListing, ItemView, PantryQuery, ShoppingListEntry};
use crate::store::PantryStore;
use crate::types::{GroupId, ItemId, PantryHistory, PantryNotification, UserId};
use std::sync::Arc;

/// Entry point for the surrounding request layer.
///
/// # Example
///
/// ```ignore
/// let env = PantryEnvironment::new(store, directory, Arc::new(SystemClock))
///     .with_policy(PantryPolicy::from_env()?);
/// let pantry = Pantry::new(env);
///
/// let outcome = pantry.items().use_item(item_id, 1.5, actor_id).await?;
/// ```
pub struct Pantry<S, D> {
    directory: Arc<D>,
    categories: CategoryResolver<S, D>,
    items: ItemMutator<S, D>,
    notifications: NotificationInbox<S, D>,
    history: HistoryLedger<S>,
    query: PantryQuery<S, D>,
}

impl<S, D> Clone for Pantry<S, D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            categories: self.categories.clone(),
            items: self.items.clone(),
            notifications: self.notifications.clone(),
            history: self.history.clone(),
            query: self.query.clone(),
        }
    }
}

impl<S: PantryStore, D: MembershipDirectory> Pantry<S, D> {
    /// Wire every component from `env`.
    #[must_use]
    pub fn new(env: PantryEnvironment<S, D>) -> Self {
        let PantryEnvironment {
            store,
            directory,
            clock,
            policy,
        } = env;

        Self {
            categories: CategoryResolver::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&clock),
            ),
            items: ItemMutator::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&clock),
                policy,
            ),
            notifications: NotificationInbox::new(Arc::clone(&store), Arc::clone(&directory)),
            history: HistoryLedger::new(Arc::clone(&store), Arc::clone(&clock)),
            query: PantryQuery::new(store, Arc::clone(&directory), clock, policy),
            directory,
        }
    }

    /// Category Resolver.
    #[must_use]
    pub const fn categories(&self) -> &CategoryResolver<S, D> {
        &self.categories
    }

    /// Item Mutator.
    #[must_use]
    pub const fn items(&self) -> &ItemMutator<S, D> {
        &self.items
    }

    /// Notification inbox.
    #[must_use]
    pub const fn notifications(&self) -> &NotificationInbox<S, D> {
        &self.notifications
    }

    /// Unchecked query layer, for callers that authorize on their own.
    #[must_use]
    pub const fn query(&self) -> &PantryQuery<S, D> {
        &self.query
    }

    /// Items of the group, sorted by (category, name).
    ///
    /// # Errors
    ///
    /// - [`crate::PantryError::NotFound`] / [`crate::PantryError::Forbidden`]
    ///   if `actor_id` is not a member of `group_id`
    /// - [`crate::PantryError::Store`] if a read fails
    pub async fn list_items(
        &self,
        actor_id: UserId,
        group_id: GroupId,
        category_filter: Option<&str>,
    ) -> Result<Vec<ItemView>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.query.list_items(group_id, category_filter).await
    }

    /// Categories visible to the group, partitioned by kind.
    ///
    /// # Errors
    ///
    /// Same as [`Pantry::list_items`].
    pub async fn list_categories(&self, actor_id: UserId, group_id: GroupId) -> Result<CategoryListing> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.query.list_categories(group_id).await
    }

    /// Unread notifications of the group.
    ///
    /// # Errors
    ///
    /// Same as [`Pantry::list_items`].
    pub async fn warnings(&self, actor_id: UserId, group_id: GroupId) -> Result<Vec<PantryNotification>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.query.warnings(group_id).await
    }

    /// Items expiring within the window or already expired, soonest first.
    ///
    /// # Errors
    ///
    /// Same as [`Pantry::list_items`].
    pub async fn expiring_items(&self, actor_id: UserId, group_id: GroupId) -> Result<Vec<ItemView>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.query.expiring_items(group_id).await
    }

    /// Inferred shopping list.
    ///
    /// # Errors
    ///
    /// Same as [`Pantry::list_items`].
    pub async fn shopping_list(
        &self,
        actor_id: UserId,
        group_id: GroupId,
    ) -> Result<Vec<ShoppingListEntry>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.query.shopping_list(group_id).await
    }

    /// Audit trail of the group, optionally for one item, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`Pantry::list_items`].
    pub async fn history(
        &self,
        actor_id: UserId,
        group_id: GroupId,
        item_id: Option<ItemId>,
    ) -> Result<Vec<PantryHistory>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        self.history.list(group_id, item_id).await
    }
}
