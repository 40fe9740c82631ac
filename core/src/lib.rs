//! # Pantry Core
//!
//! Transactional inventory ledger for a shared household pantry.
//!
//! Several members of one group mutate the same items concurrently. The crate
//! keeps their quantities consistent and derives notifications and an audit
//! trail from every change:
//!
//! - [`CategoryResolver`]: validates category references, manages custom
//!   categories.
//! - [`ItemMutator`]: add/update/use/delete, each on one atomic unit.
//! - [`NotificationEngine`]: low-stock, out-of-stock and expiring-soon
//!   notifications, reconciled inside the mutating unit.
//! - [`HistoryLedger`]: append-only audit trail, written after commit.
//! - [`PantryQuery`]: read-side projections with a request-scoped lookup cache.
//!
//! [`Pantry`] wires all of them from one [`PantryEnvironment`].
//!
//! ## Persistence
//!
//! Components talk to a [`PantryStore`]. Correctness under concurrency comes
//! from the store's transactions and row locks, never from in-process locks,
//! so any number of processes may share one database.
//!
//! ## Example
//!
//! ```ignore
//! use pantry_core::*;
//!
//! let pantry = Pantry::new(PantryEnvironment::new(store, directory, Arc::new(SystemClock)));
//!
//! let milk = pantry
//!     .items()
//!     .add(NewItem {
//!         group_id,
//!         name: "Milk".into(),
//!         quantity: 2.0,
//!         unit: "L".into(),
//!         category_ref: dairy.id.to_string(),
//!         expiration: None,
//!         actor_id,
//!     })
//!     .await?;
//!
//! let outcome = pantry.items().use_item(milk.item.id, 1.5, actor_id).await?;
//! assert_eq!(outcome.remaining_quantity, 0.5); // low_stock notification created
//! ```

pub mod category;
pub mod config;
pub mod environment;
pub mod error;
pub mod history;
pub mod item;
pub mod membership;
pub mod notification;
pub mod pantry;
pub mod query;
pub mod store;
pub mod types;

pub use category::CategoryResolver;
pub use config::{ConfigError, PantryPolicy};
pub use environment::{Clock, PantryEnvironment, SystemClock};
pub use error::{PantryError, Result, StoreError, StoreResult};
pub use history::HistoryLedger;
pub use item::{ItemChanges, ItemMutator, NewItem, UseOutcome};
pub use membership::{Member, MembershipDirectory};
pub use notification::{NotificationChanges, NotificationEngine, NotificationInbox, StockLevel};
pub use pantry::Pantry;
pub use query::{
    CategoryInfo, CategoryListing, ItemView, PantryQuery, ResolutionCache, ShoppingListEntry,
    ShoppingReason,
};
pub use store::{LockScope, NotificationFilter, PantryStore, StoreTransaction};
pub use types::{
    CategoryId, CategoryKind, GroupId, HistoryAction, HistoryId, ItemId, NotificationId,
    NotificationType, PREDEFINED_CATEGORIES, PantryCategory, PantryHistory, PantryItem,
    PantryNotification, QUANTITY_SCALE, UserId, fold_name, normalize_quantity,
};
