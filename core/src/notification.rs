//! Notification Engine and inbox.
//!
//! Notifications are derived state. After every item write the engine
//! compares the item's stock level and expiration against the active
//! notifications for that item and applies the difference on the same unit:
//!
//! | quantity                     | stock-level notification |
//! |------------------------------|--------------------------|
//! | `> low_stock_threshold`      | none                     |
//! | `(0, low_stock_threshold]`   | exactly one `low_stock`  |
//! | `0`                          | exactly one `out_of_stock` |
//!
//! Stale kinds are always retracted before the desired kind is ensured, so
//! `low_stock` and `out_of_stock` are never both active for one item.
//! An `expiring_soon` notification exists exactly while the item carries an
//! expiration no later than the end of the expiring-soon window.
//!
//! A failed notification write fails the whole unit; no quantity change is
//! ever committed without its notifications.

use crate::config::PantryPolicy;
use crate::environment::Clock;
use crate::error::{PantryError, Result};
use crate::membership::{MembershipDirectory, ensure_same_group, require_group_member, require_member};
use crate::store::{NotificationFilter, PantryStore, StoreTransaction};
use crate::types::{
    GroupId, NotificationId, NotificationType, PantryItem, PantryNotification, UserId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Stock classification of a quantity under a [`PantryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    /// Above the low-stock threshold.
    Stocked,
    /// In `(0, threshold]`.
    Low,
    /// Exactly zero.
    Out,
}

impl StockLevel {
    /// Notification kind that must be active at this level.
    #[must_use]
    pub const fn notification(self) -> Option<NotificationType> {
        match self {
            Self::Stocked => None,
            Self::Low => Some(NotificationType::LowStock),
            Self::Out => Some(NotificationType::OutOfStock),
        }
    }
}

/// Notifications created and retracted by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationChanges {
    /// Kinds that were inserted
    pub created: Vec<NotificationType>,
    /// Kinds that were removed
    pub retracted: Vec<NotificationType>,
}

impl NotificationChanges {
    /// `true` if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.retracted.is_empty()
    }
}

/// Derives notification transitions from item state.
#[derive(Clone)]
pub struct NotificationEngine {
    policy: PantryPolicy,
    clock: Arc<dyn Clock>,
}

impl NotificationEngine {
    /// Create an engine for `policy`.
    #[must_use]
    pub fn new(policy: PantryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &PantryPolicy {
        &self.policy
    }

    /// Classify a quantity.
    #[must_use]
    pub fn stock_level(&self, quantity: f64) -> StockLevel {
        if quantity <= 0.0 {
            StockLevel::Out
        } else if quantity <= self.policy.low_stock_threshold {
            StockLevel::Low
        } else {
            StockLevel::Stocked
        }
    }

    /// Kinds that must be active for `item` at `now`.
    #[must_use]
    pub fn desired(&self, item: &PantryItem, now: DateTime<Utc>) -> Vec<NotificationType> {
        let mut kinds: Vec<NotificationType> =
            self.stock_level(item.quantity).notification().into_iter().collect();
        if item.expires_within(now, self.policy.expiring_soon_window) {
            kinds.push(NotificationType::ExpiringSoon);
        }
        kinds
    }

    fn message(&self, kind: NotificationType) -> String {
        match kind {
            NotificationType::LowStock => "Item is running low".to_string(),
            NotificationType::OutOfStock => "Item is out of stock".to_string(),
            NotificationType::ExpiringSoon => format!(
                "Item will expire in {} days or less",
                self.policy.expiring_soon_days()
            ),
        }
    }

    /// Bring the active notifications of `item` in line with its current
    /// state, on the caller's unit.
    ///
    /// # Errors
    ///
    /// Returns [`PantryError::Store`] if any notification read or write fails;
    /// the caller must then abandon the unit.
    pub async fn reconcile<T: StoreTransaction>(
        &self,
        tx: &mut T,
        item: &PantryItem,
    ) -> Result<NotificationChanges> {
        let now = self.clock.now();
        let desired = self.desired(item, now);
        let existing = tx.item_notifications(item.id).await?;
        let mut changes = NotificationChanges::default();

        // Retract stale kinds first: low_stock goes before out_of_stock is created.
        let stale: Vec<NotificationType> = NotificationType::ALL
            .into_iter()
            .filter(|kind| !desired.contains(kind))
            .filter(|kind| existing.iter().any(|n| n.kind == *kind))
            .collect();
        if !stale.is_empty() {
            tx.delete_item_notifications(item.id, &stale).await?;
            changes.retracted.extend(stale);
        }

        for kind in desired {
            let current: Vec<&PantryNotification> =
                existing.iter().filter(|n| n.kind == kind).collect();
            if matches!(current.as_slice(), [only] if only.item_name == item.name) {
                continue;
            }
            if !current.is_empty() {
                tx.delete_item_notifications(item.id, &[kind]).await?;
                changes.retracted.push(kind);
            }
            let notification = PantryNotification::for_item(item, kind, self.message(kind), now);
            tx.insert_notification(&notification).await?;
            changes.created.push(kind);
        }

        for kind in &changes.created {
            metrics::counter!("pantry.notification.created", "type" => kind.as_str()).increment(1);
        }
        for kind in &changes.retracted {
            metrics::counter!("pantry.notification.retracted", "type" => kind.as_str()).increment(1);
        }
        if !changes.is_empty() {
            tracing::debug!(
                item_id = %item.id,
                quantity = item.quantity,
                created = ?changes.created,
                retracted = ?changes.retracted,
                "Notifications reconciled"
            );
        }

        Ok(changes)
    }
}

/// Read/acknowledge/dismiss access to a group's notifications.
pub struct NotificationInbox<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S, D> Clone for NotificationInbox<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
        }
    }
}

impl<S: PantryStore, D: MembershipDirectory> NotificationInbox<S, D> {
    /// Create an inbox over the shared store and directory.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    /// Notifications of `group_id`, newest first.
    ///
    /// # Errors
    ///
    /// - [`PantryError::NotFound`] / [`PantryError::Forbidden`] if the actor
    ///   is not a member of `group_id`
    /// - [`PantryError::Store`] if the listing fails
    #[tracing::instrument(skip(self), fields(group_id = %group_id, actor_id = %actor_id))]
    pub async fn list(
        &self,
        group_id: GroupId,
        actor_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<PantryNotification>> {
        require_group_member(self.directory.as_ref(), actor_id, group_id).await?;
        let filter = NotificationFilter {
            unread_only,
            item_id: None,
        };
        Ok(self.store.notifications(group_id, filter).await?)
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// - [`PantryError::NotFound`] if the notification (or actor) does not exist
    /// - [`PantryError::Forbidden`] if it belongs to another group
    #[tracing::instrument(skip(self), fields(notification_id = %notification_id, actor_id = %actor_id))]
    pub async fn mark_read(&self, notification_id: NotificationId, actor_id: UserId) -> Result<()> {
        let mut tx = self.owned(notification_id, actor_id).await?;
        if !tx.mark_notification_read(notification_id).await? {
            return Err(PantryError::not_found("notification", notification_id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Dismiss one notification.
    ///
    /// A dismissed notification is derived again by the next write to its
    /// item if the condition still holds.
    ///
    /// # Errors
    ///
    /// - [`PantryError::NotFound`] if the notification (or actor) does not exist
    /// - [`PantryError::Forbidden`] if it belongs to another group
    #[tracing::instrument(skip(self), fields(notification_id = %notification_id, actor_id = %actor_id))]
    pub async fn delete(&self, notification_id: NotificationId, actor_id: UserId) -> Result<()> {
        let mut tx = self.owned(notification_id, actor_id).await?;
        if !tx.delete_notification(notification_id).await? {
            return Err(PantryError::not_found("notification", notification_id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Open a unit and check that the actor's group owns the notification.
    async fn owned(
        &self,
        notification_id: NotificationId,
        actor_id: UserId,
    ) -> Result<S::Transaction> {
        let actor = require_member(self.directory.as_ref(), actor_id).await?;
        let mut tx = self.store.begin().await?;
        let notification = tx
            .notification(notification_id)
            .await?
            .ok_or_else(|| PantryError::not_found("notification", notification_id))?;
        ensure_same_group(&actor, notification.group_id)?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::SystemClock;

    fn engine(threshold: f64) -> NotificationEngine {
        NotificationEngine::new(
            PantryPolicy::new().with_low_stock_threshold(threshold),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn stock_levels_follow_threshold() {
        let engine = engine(1.0);
        assert_eq!(engine.stock_level(0.0), StockLevel::Out);
        assert_eq!(engine.stock_level(0.5), StockLevel::Low);
        assert_eq!(engine.stock_level(1.0), StockLevel::Low);
        assert_eq!(engine.stock_level(1.01), StockLevel::Stocked);
    }

    #[test]
    fn zero_threshold_only_reports_out_of_stock() {
        let engine = engine(0.0);
        assert_eq!(engine.stock_level(0.0), StockLevel::Out);
        assert_eq!(engine.stock_level(0.1), StockLevel::Stocked);
    }

    #[test]
    fn stock_level_kinds_are_exclusive() {
        assert_eq!(StockLevel::Stocked.notification(), None);
        assert_eq!(StockLevel::Low.notification(), Some(NotificationType::LowStock));
        assert_eq!(StockLevel::Out.notification(), Some(NotificationType::OutOfStock));
    }

    #[test]
    fn expiring_message_uses_policy_window() {
        let engine = NotificationEngine::new(
            PantryPolicy::new().with_expiring_soon_window(chrono::Duration::days(5)),
            Arc::new(SystemClock),
        );
        assert_eq!(
            engine.message(NotificationType::ExpiringSoon),
            "Item will expire in 5 days or less"
        );
    }
}
