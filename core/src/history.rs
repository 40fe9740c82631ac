//! History Ledger.
//!
//! Append-only audit trail of quantity-changing actions. Entries are written
//! after the triggering unit commits and are advisory: a failed append is
//! logged and counted, never surfaced, and never undoes the mutation.

use crate::environment::Clock;
use crate::error::Result;
use crate::membership::Member;
use crate::store::PantryStore;
use crate::types::{GroupId, HistoryAction, HistoryId, ItemId, PantryHistory, PantryItem};
use std::sync::Arc;

/// Writer and reader of the audit trail.
pub struct HistoryLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for HistoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: PantryStore> HistoryLedger<S> {
    /// Create a ledger over the shared store.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append one entry for `item`, attributed to `actor`.
    ///
    /// Returns the entry when it was stored, `None` when the append failed.
    pub async fn record(
        &self,
        item: &PantryItem,
        action: HistoryAction,
        quantity_delta: f64,
        actor: &Member,
    ) -> Option<PantryHistory> {
        let entry = PantryHistory {
            id: HistoryId::new(),
            group_id: item.group_id,
            item_id: item.id,
            item_name: item.name.clone(),
            action,
            quantity_delta,
            actor_id: actor.user_id,
            actor_name: actor.display_name.clone(),
            recorded_at: self.clock.now(),
        };

        match self.store.append_history(&entry).await {
            Ok(()) => Some(entry),
            Err(e) => {
                metrics::counter!("pantry.history.write_failed", "action" => action.as_str())
                    .increment(1);
                tracing::warn!(
                    group_id = %item.group_id,
                    item_id = %item.id,
                    action = action.as_str(),
                    quantity_delta,
                    error = %e,
                    "Failed to append history entry"
                );
                None
            }
        }
    }

    /// Entries of `group_id`, optionally for one item, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PantryError::Store`] if the listing fails.
    pub async fn list(&self, group_id: GroupId, item_id: Option<ItemId>) -> Result<Vec<PantryHistory>> {
        Ok(self.store.history(group_id, item_id).await?)
    }
}
