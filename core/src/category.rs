//! Category Resolver.
//!
//! Validates category references against the visibility rules and owns the
//! lifecycle of custom categories:
//!
//! - a predefined category is visible to every group and immutable,
//! - a custom category is visible to, and editable by, its owning group only,
//! - no two active categories visible to one group share a folded name.
//!
//! Naming decisions take a per-group lock ([`LockScope::CategoryNames`]) so two
//! members creating "Snacks" at the same instant cannot both succeed.

use crate::environment::Clock;
use crate::error::{PantryError, Result};
use crate::membership::{MembershipDirectory, require_group_member, require_member};
use crate::store::{LockScope, PantryStore, StoreTransaction};
use crate::types::{CategoryId, GroupId, PantryCategory, UserId, fold_name};
use std::sync::Arc;

/// Resolve `reference` inside an open unit.
///
/// The category row is share-locked for the rest of the unit, so it cannot be
/// deleted underneath the item mutation that resolved it.
///
/// # Errors
///
/// - [`PantryError::InvalidReference`] if `reference` is not a category id
/// - [`PantryError::NotFound`] if no active category with that id is visible
///   to `group_id`
/// - [`PantryError::Store`] if the lookup fails
pub async fn resolve_in<T: StoreTransaction>(
    tx: &mut T,
    reference: &str,
    group_id: GroupId,
) -> Result<PantryCategory> {
    let id = CategoryId::parse(reference).map_err(|_| {
        PantryError::InvalidReference(format!("Invalid category reference: {reference:?}"))
    })?;
    resolve_id_in(tx, id, group_id).await
}

/// Re-check an already parsed category id inside an open unit.
///
/// # Errors
///
/// - [`PantryError::NotFound`] if the category is gone, inactive, or not
///   visible to `group_id`
/// - [`PantryError::Store`] if the lookup fails
pub async fn resolve_id_in<T: StoreTransaction>(
    tx: &mut T,
    id: CategoryId,
    group_id: GroupId,
) -> Result<PantryCategory> {
    match tx.category(id).await? {
        Some(category) if category.is_visible_to(group_id) => Ok(category),
        _ => Err(PantryError::not_found("category", id)),
    }
}

/// Validate and trim a display name.
pub(crate) fn clean_name(raw: &str, what: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PantryError::Validation(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Lock `category_id` and check that `group_id` may edit it.
async fn editable_category<T: StoreTransaction>(
    tx: &mut T,
    category_id: CategoryId,
    group_id: GroupId,
) -> Result<PantryCategory> {
    let category = tx
        .category_for_update(category_id)
        .await?
        .filter(|category| category.is_active)
        .ok_or_else(|| PantryError::not_found("category", category_id))?;

    if category.is_predefined() {
        return Err(PantryError::Forbidden(
            "Predefined categories cannot be edited".to_string(),
        ));
    }
    if !category.is_editable_by(group_id) {
        return Err(PantryError::Forbidden(
            "Category belongs to another group".to_string(),
        ));
    }
    Ok(category)
}

fn collision(existing: &PantryCategory) -> PantryError {
    PantryError::Conflict(format!(
        "A {} category named {:?} already exists",
        existing.kind, existing.name
    ))
}

/// Validates category references and manages custom categories.
pub struct CategoryResolver<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> Clone for CategoryResolver<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: PantryStore, D: MembershipDirectory> CategoryResolver<S, D> {
    /// Create a resolver over the shared store and directory.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    /// Resolve an opaque reference against the categories visible to
    /// `group_id`.
    ///
    /// Item mutations call [`resolve_in`] on their own unit instead; this
    /// entry point is for callers that only need to validate a reference.
    ///
    /// # Errors
    ///
    /// See [`resolve_in`].
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn resolve(&self, reference: &str, group_id: GroupId) -> Result<PantryCategory> {
        let mut tx = self.store.begin().await?;
        resolve_in(&mut tx, reference, group_id).await
    }

    /// Create a custom category owned by `group_id`.
    ///
    /// # Errors
    ///
    /// - [`PantryError::Validation`] if the trimmed name is empty
    /// - [`PantryError::NotFound`] / [`PantryError::Forbidden`] if `creator_id`
    ///   is not a member of `group_id`
    /// - [`PantryError::Conflict`] if a visible category already has that name
    #[tracing::instrument(skip(self), fields(group_id = %group_id, creator_id = %creator_id))]
    pub async fn create(
        &self,
        name: &str,
        group_id: GroupId,
        creator_id: UserId,
    ) -> Result<PantryCategory> {
        let name = clean_name(name, "Category name")?;
        require_group_member(self.directory.as_ref(), creator_id, group_id).await?;

        let mut tx = self.store.begin().await?;
        tx.lock(&LockScope::CategoryNames(group_id)).await?;

        let key = fold_name(&name);
        if let Some(existing) = tx.visible_category_by_name(group_id, &key, None).await? {
            return Err(collision(&existing));
        }

        let category = PantryCategory::custom(&name, group_id, creator_id, self.clock.now());
        tx.insert_category(&category).await?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, name = %category.name, "Custom category created");
        Ok(category)
    }

    /// Rename a custom category of the actor's group.
    ///
    /// # Errors
    ///
    /// - [`PantryError::Validation`] if the trimmed name is empty
    /// - [`PantryError::NotFound`] if the category (or actor) does not exist
    /// - [`PantryError::Forbidden`] if the category is predefined or owned by
    ///   another group
    /// - [`PantryError::Conflict`] if another visible category has that name
    #[tracing::instrument(skip(self), fields(category_id = %category_id, actor_id = %actor_id))]
    pub async fn rename(
        &self,
        category_id: CategoryId,
        new_name: &str,
        actor_id: UserId,
    ) -> Result<PantryCategory> {
        let name = clean_name(new_name, "Category name")?;
        let actor = require_member(self.directory.as_ref(), actor_id).await?;

        let mut tx = self.store.begin().await?;
        let mut category = editable_category(&mut tx, category_id, actor.group_id).await?;

        tx.lock(&LockScope::CategoryNames(actor.group_id)).await?;
        let key = fold_name(&name);
        if let Some(existing) = tx
            .visible_category_by_name(actor.group_id, &key, Some(category_id))
            .await?
        {
            return Err(collision(&existing));
        }

        if !tx.rename_category(category_id, &name).await? {
            return Err(PantryError::not_found("category", category_id));
        }
        tx.commit().await?;

        tracing::info!(old_name = %category.name, new_name = %name, "Custom category renamed");
        category.name = name;
        Ok(category)
    }

    /// Delete a custom category of the actor's group that no item references.
    ///
    /// # Errors
    ///
    /// - [`PantryError::NotFound`] if the category (or actor) does not exist
    /// - [`PantryError::Forbidden`] if the category is predefined or owned by
    ///   another group
    /// - [`PantryError::Conflict`] if any item still references it
    #[tracing::instrument(skip(self), fields(category_id = %category_id, actor_id = %actor_id))]
    pub async fn delete(&self, category_id: CategoryId, actor_id: UserId) -> Result<()> {
        let actor = require_member(self.directory.as_ref(), actor_id).await?;

        let mut tx = self.store.begin().await?;
        editable_category(&mut tx, category_id, actor.group_id).await?;

        let in_use = tx.count_items_in_category(category_id).await?;
        if in_use > 0 {
            return Err(PantryError::Conflict(format!(
                "Category is still used by {in_use} item(s)"
            )));
        }

        if !tx.delete_category(category_id).await? {
            return Err(PantryError::not_found("category", category_id));
        }
        tx.commit().await?;

        tracing::info!("Custom category deleted");
        Ok(())
    }
}
