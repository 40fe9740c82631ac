//! Item Mutator.
//!
//! The transactional core. Each operation runs category resolution, the
//! quantity write and the notification transition on one unit, then commits
//! and appends to the history ledger. Any failure before the commit drops
//! the unit, which rolls everything back.
//!
//! Two concurrent `use` calls on one item serialize on the item row lock
//! taken by [`StoreTransaction::item_for_update`]: the second call sees the
//! first call's committed quantity, so stock never goes negative. Adds that
//! may create a row serialize on [`LockScope::ItemKey`].
//!
//! Every stored quantity, and every difference of quantities, passes through
//! [`normalize_quantity`], so stock drained in decimal steps lands on `0.0`.

use crate::category::{clean_name, resolve_id_in, resolve_in};
use crate::config::PantryPolicy;
use crate::environment::Clock;
use crate::error::{PantryError, Result};
use crate::history::HistoryLedger;
use crate::membership::{
    Member, MembershipDirectory, ensure_same_group, require_group_member, require_member,
};
use crate::notification::NotificationEngine;
use crate::query::ItemView;
use crate::store::{LockScope, PantryStore, StoreTransaction};
use crate::types::{
    GroupId, HistoryAction, ItemId, NotificationType, PantryCategory, PantryItem, UserId,
    fold_name, normalize_quantity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input of [`ItemMutator::add`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    /// Target group
    pub group_id: GroupId,
    /// Display name; trimmed, compared case-insensitively
    pub name: String,
    /// Stock to record (replaces, never sums)
    pub quantity: f64,
    /// Unit of measure
    pub unit: String,
    /// Opaque category reference
    pub category_ref: String,
    /// Optional expiration; `None` clears an existing one
    pub expiration: Option<DateTime<Utc>>,
    /// Acting user
    pub actor_id: UserId,
}

/// Input of [`ItemMutator::update`]. Every mutable field is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChanges {
    /// Item to update
    pub item_id: ItemId,
    /// New display name
    pub name: String,
    /// New stock
    pub quantity: f64,
    /// New unit
    pub unit: String,
    /// New (or unchanged) category reference
    pub category_ref: String,
    /// New expiration; `None` clears it
    pub expiration: Option<DateTime<Utc>>,
    /// Acting user
    pub actor_id: UserId,
}

/// Result of a successful [`ItemMutator::use_item`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseOutcome {
    /// Stock left after consumption
    pub remaining_quantity: f64,
    /// Unit of the item
    pub unit: String,
}

fn check_stock_quantity(quantity: f64) -> Result<f64> {
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(normalize_quantity(quantity))
    } else {
        Err(PantryError::Validation(
            "Quantity must be a non-negative number".to_string(),
        ))
    }
}

fn check_use_quantity(quantity: f64) -> Result<f64> {
    let quantity = normalize_quantity(quantity);
    if quantity.is_finite() && quantity > 0.0 {
        Ok(quantity)
    } else {
        Err(PantryError::Validation(
            "Quantity must be greater than zero".to_string(),
        ))
    }
}

/// Load and lock an item the actor's group owns.
async fn locked_item<T: StoreTransaction>(
    tx: &mut T,
    item_id: ItemId,
    actor: &Member,
) -> Result<PantryItem> {
    let item = tx
        .item_for_update(item_id)
        .await?
        .ok_or_else(|| PantryError::not_found("item", item_id))?;
    ensure_same_group(actor, item.group_id)?;
    Ok(item)
}

#[allow(clippy::float_cmp)]
fn quantity_changed(old: f64, new: f64) -> bool {
    old != new
}

/// Add/update/use/delete operations on items.
pub struct ItemMutator<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    engine: NotificationEngine,
    ledger: HistoryLedger<S>,
}

impl<S, D> Clone for ItemMutator<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            engine: self.engine.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: PantryStore, D: MembershipDirectory> ItemMutator<S, D> {
    /// Create a mutator with its own engine and ledger.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>, policy: PantryPolicy) -> Self {
        Self {
            engine: NotificationEngine::new(policy, Arc::clone(&clock)),
            ledger: HistoryLedger::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
            directory,
            clock,
        }
    }

    /// Add stock under (group, folded name, category).
    ///
    /// An existing item with that identity gets its quantity, unit and
    /// expiration replaced; otherwise a new item is inserted. History gets
    /// `add +quantity` for a new row, or `add (new - old)` for a changed one.
    ///
    /// # Errors
    ///
    /// - [`PantryError::Validation`] for an empty name/unit or a negative quantity
    /// - [`PantryError::NotFound`] / [`PantryError::Forbidden`] if the actor is
    ///   not a member of the group
    /// - [`PantryError::InvalidReference`] / [`PantryError::NotFound`] if the
    ///   category does not resolve
    /// - [`PantryError::Store`] if any write or the commit fails
    #[tracing::instrument(
        skip(self, request),
        fields(group_id = %request.group_id, actor_id = %request.actor_id)
    )]
    pub async fn add(&self, request: NewItem) -> Result<ItemView> {
        let name = clean_name(&request.name, "Item name")?;
        let unit = clean_name(&request.unit, "Unit")?;
        let quantity = check_stock_quantity(request.quantity)?;
        let actor =
            require_group_member(self.directory.as_ref(), request.actor_id, request.group_id).await?;

        let mut tx = self.store.begin().await?;
        let category = resolve_in(&mut tx, &request.category_ref, request.group_id).await?;

        let name_key = fold_name(&name);
        tx.lock(&LockScope::ItemKey {
            group_id: request.group_id,
            name_key: name_key.clone(),
            category_id: category.id,
        })
        .await?;

        let now = self.clock.now();
        let existing = tx
            .item_by_key_for_update(request.group_id, &name_key, category.id)
            .await?;
        let (item, previous) = if let Some(mut item) = existing {
            let previous = item.quantity;
            item.quantity = quantity;
            item.unit = unit;
            item.expiration = request.expiration;
            item.updated_at = now;
            tx.update_item(&item).await?;
            (item, Some(previous))
        } else {
            let item = PantryItem {
                id: ItemId::new(),
                group_id: request.group_id,
                name,
                quantity,
                unit,
                category_id: category.id,
                expiration: request.expiration,
                added_by: actor.user_id,
                created_at: now,
                updated_at: now,
            };
            tx.insert_item(&item).await?;
            (item, None)
        };

        self.engine.reconcile(&mut tx, &item).await?;
        tx.commit().await?;

        metrics::counter!("pantry.item.added").increment(1);
        tracing::info!(
            item_id = %item.id,
            category_id = %category.id,
            quantity = item.quantity,
            merged = previous.is_some(),
            "Pantry item added"
        );

        match previous {
            None => {
                self.ledger
                    .record(&item, HistoryAction::Add, item.quantity, &actor)
                    .await;
            }
            Some(old) if quantity_changed(old, item.quantity) => {
                self.ledger
                    .record(
                        &item,
                        HistoryAction::Add,
                        normalize_quantity(item.quantity - old),
                        &actor,
                    )
                    .await;
            }
            Some(_) => {}
        }

        Ok(self.view(item, &category, &actor).await)
    }

    /// Replace every mutable field of an item.
    ///
    /// # Errors
    ///
    /// - [`PantryError::Validation`] for an empty name/unit or a negative quantity
    /// - [`PantryError::NotFound`] if the item (or actor) does not exist
    /// - [`PantryError::Forbidden`] if the item belongs to another group
    /// - [`PantryError::InvalidReference`] / [`PantryError::NotFound`] if the
    ///   category does not resolve
    /// - [`PantryError::Conflict`] if another item already has the new
    ///   (name, category) identity
    #[tracing::instrument(
        skip(self, changes),
        fields(item_id = %changes.item_id, actor_id = %changes.actor_id)
    )]
    pub async fn update(&self, changes: ItemChanges) -> Result<ItemView> {
        let name = clean_name(&changes.name, "Item name")?;
        let unit = clean_name(&changes.unit, "Unit")?;
        let quantity = check_stock_quantity(changes.quantity)?;
        let actor = require_member(self.directory.as_ref(), changes.actor_id).await?;

        let mut tx = self.store.begin().await?;
        let mut item = locked_item(&mut tx, changes.item_id, &actor).await?;
        let category = resolve_in(&mut tx, &changes.category_ref, item.group_id).await?;

        let name_key = fold_name(&name);
        if name_key != item.name_key() || category.id != item.category_id {
            tx.lock(&LockScope::ItemKey {
                group_id: item.group_id,
                name_key: name_key.clone(),
                category_id: category.id,
            })
            .await?;
            let taken = tx
                .item_id_by_key(item.group_id, &name_key, category.id)
                .await?
                .is_some_and(|other| other != item.id);
            if taken {
                return Err(PantryError::Conflict(
                    "An item with this name already exists in this category".to_string(),
                ));
            }
        }

        let previous = item.quantity;
        item.name = name;
        item.quantity = quantity;
        item.unit = unit;
        item.category_id = category.id;
        item.expiration = changes.expiration;
        item.updated_at = self.clock.now();
        tx.update_item(&item).await?;

        self.engine.reconcile(&mut tx, &item).await?;
        tx.commit().await?;

        metrics::counter!("pantry.item.updated").increment(1);
        tracing::info!(quantity = item.quantity, category_id = %category.id, "Pantry item updated");

        if quantity_changed(previous, item.quantity) {
            self.ledger
                .record(
                    &item,
                    HistoryAction::Add,
                    normalize_quantity(item.quantity - previous),
                    &actor,
                )
                .await;
        }

        Ok(self.view(item, &category, &actor).await)
    }

    /// Consume `quantity` from an item's stock.
    ///
    /// # Errors
    ///
    /// - [`PantryError::Validation`] if `quantity` is not strictly positive
    /// - [`PantryError::NotFound`] if the item (or actor) does not exist
    /// - [`PantryError::Forbidden`] if the item belongs to another group
    /// - [`PantryError::InsufficientQuantity`] if `quantity` exceeds the stock;
    ///   nothing is changed
    #[tracing::instrument(skip(self), fields(item_id = %item_id, actor_id = %actor_id))]
    pub async fn use_item(&self, item_id: ItemId, quantity: f64, actor_id: UserId) -> Result<UseOutcome> {
        let quantity = check_use_quantity(quantity)?;
        let actor = require_member(self.directory.as_ref(), actor_id).await?;

        let mut tx = self.store.begin().await?;
        let mut item = locked_item(&mut tx, item_id, &actor).await?;
        resolve_id_in(&mut tx, item.category_id, item.group_id).await?;

        let available = normalize_quantity(item.quantity);
        if quantity > available {
            metrics::counter!("pantry.item.use_rejected").increment(1);
            tracing::debug!(
                requested = quantity,
                available,
                "Use rejected: insufficient quantity"
            );
            return Err(PantryError::InsufficientQuantity {
                requested: quantity,
                available,
            });
        }

        item.quantity = normalize_quantity(available - quantity);
        item.updated_at = self.clock.now();
        tx.update_item(&item).await?;

        self.engine.reconcile(&mut tx, &item).await?;
        tx.commit().await?;

        metrics::counter!("pantry.item.used").increment(1);
        tracing::info!(consumed = quantity, remaining = item.quantity, "Pantry item used");

        self.ledger
            .record(&item, HistoryAction::Use, -quantity, &actor)
            .await;

        Ok(UseOutcome {
            remaining_quantity: item.quantity,
            unit: item.unit,
        })
    }

    /// Delete an item and every notification about it.
    ///
    /// History is kept; a `remove` entry records the stock at deletion.
    ///
    /// # Errors
    ///
    /// - [`PantryError::NotFound`] if the item (or actor) does not exist
    /// - [`PantryError::Forbidden`] if the item belongs to another group
    #[tracing::instrument(skip(self), fields(item_id = %item_id, actor_id = %actor_id))]
    pub async fn delete(&self, item_id: ItemId, actor_id: UserId) -> Result<()> {
        let actor = require_member(self.directory.as_ref(), actor_id).await?;

        let mut tx = self.store.begin().await?;
        let item = locked_item(&mut tx, item_id, &actor).await?;

        let retracted = tx
            .delete_item_notifications(item.id, &NotificationType::ALL)
            .await?;
        if !tx.delete_item(item.id).await? {
            return Err(PantryError::not_found("item", item.id));
        }
        tx.commit().await?;

        metrics::counter!("pantry.item.deleted").increment(1);
        tracing::info!(notifications_removed = retracted, "Pantry item deleted");

        self.ledger
            .record(&item, HistoryAction::Remove, item.quantity, &actor)
            .await;
        Ok(())
    }

    /// Project a committed item for the response.
    async fn view(&self, item: PantryItem, category: &PantryCategory, actor: &Member) -> ItemView {
        let added_by_name = if item.added_by == actor.user_id {
            Some(actor.display_name.clone())
        } else {
            match self.directory.member(item.added_by).await {
                Ok(member) => member.map(|m| m.display_name),
                Err(e) => {
                    tracing::debug!(user_id = %item.added_by, error = %e, "Contributor lookup failed");
                    None
                }
            }
        };
        ItemView::new(
            item,
            Some(category),
            added_by_name,
            self.clock.now(),
            self.engine.policy().expiring_soon_window,
        )
    }
}
