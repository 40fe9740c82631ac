//! Domain records for the pantry ledger.
//!
//! Every record is owned by a group. Names are compared through
//! [`fold_name`], which every store persists next to the display name as a
//! `name_key` so lookups behave identically across backends.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse an opaque string reference.
            ///
            /// # Errors
            ///
            /// Returns the UUID parse error if `raw` is not a UUID.
            pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(raw.trim()).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Household / tenant boundary.
    GroupId
);
uuid_id!(
    /// A user known to the membership directory.
    UserId
);
uuid_id!(
    /// Unique identifier for a pantry category
    CategoryId
);
uuid_id!(
    /// Unique identifier for a pantry item
    ItemId
);
uuid_id!(
    /// Unique identifier for a derived notification
    NotificationId
);
uuid_id!(
    /// Unique identifier for a history entry
    HistoryId
);

/// Fold a name for comparison: trimmed and lowercased.
///
/// ```
/// use pantry_core::fold_name;
///
/// assert_eq!(fold_name("  Eggs "), fold_name("eggs"));
/// ```
#[must_use]
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Quantities are kept to this many steps per unit.
pub const QUANTITY_SCALE: f64 = 1e9;

/// Round a quantity to [`QUANTITY_SCALE`] steps.
///
/// Stock arithmetic goes through here so decimal amounts compare exactly:
/// `0.3` minus `0.1` three times is `0.0`, not a tiny positive remainder.
///
/// ```
/// use pantry_core::normalize_quantity;
///
/// assert_eq!(normalize_quantity(0.3 - 0.1 - 0.1 - 0.1), 0.0);
/// assert_eq!(normalize_quantity(2.0 - 1.7), 0.3);
/// ```
#[must_use]
pub fn normalize_quantity(quantity: f64) -> f64 {
    let rounded = (quantity * QUANTITY_SCALE).round() / QUANTITY_SCALE;
    if rounded.is_finite() {
        // Folds -0.0 into 0.0.
        rounded + 0.0
    } else {
        quantity
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════════════════

/// Whether a category is system-provisioned or group-created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Visible to every group, immutable by end users.
    Predefined,
    /// Visible only to its owning group.
    Custom,
}

impl CategoryKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Predefined => "predefined",
            Self::Custom => "custom",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "predefined" => Some(Self::Predefined),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category used to organize pantry items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryCategory {
    /// Category identifier
    pub id: CategoryId,
    /// Display name (trimmed)
    pub name: String,
    /// Predefined or custom
    pub kind: CategoryKind,
    /// Owning group; `None` for predefined categories
    pub group_id: Option<GroupId>,
    /// Creator; `None` for predefined categories
    pub created_by: Option<UserId>,
    /// Inactive categories never resolve
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl PantryCategory {
    /// Build a system-wide predefined category.
    #[must_use]
    pub fn predefined(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.trim().to_string(),
            kind: CategoryKind::Predefined,
            group_id: None,
            created_by: None,
            is_active: true,
            created_at: now,
        }
    }

    /// Build a custom category owned by `group_id`.
    #[must_use]
    pub fn custom(name: &str, group_id: GroupId, created_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.trim().to_string(),
            kind: CategoryKind::Custom,
            group_id: Some(group_id),
            created_by: Some(created_by),
            is_active: true,
            created_at: now,
        }
    }

    /// Folded name used for uniqueness checks.
    #[must_use]
    pub fn name_key(&self) -> String {
        fold_name(&self.name)
    }

    /// `true` for system-provisioned categories.
    #[must_use]
    pub const fn is_predefined(&self) -> bool {
        matches!(self.kind, CategoryKind::Predefined)
    }

    /// `true` when an active category is visible to `group_id`.
    #[must_use]
    pub fn is_visible_to(&self, group_id: GroupId) -> bool {
        self.is_active && (self.is_predefined() || self.group_id == Some(group_id))
    }

    /// `true` when members of `group_id` may rename or delete this category.
    #[must_use]
    pub fn is_editable_by(&self, group_id: GroupId) -> bool {
        !self.is_predefined() && self.group_id == Some(group_id)
    }
}

/// Categories provisioned for every deployment.
pub const PREDEFINED_CATEGORIES: &[&str] = &[
    "Produce",
    "Dairy",
    "Meat & Seafood",
    "Bakery",
    "Frozen",
    "Canned Goods",
    "Dry Goods & Pasta",
    "Snacks",
    "Beverages",
    "Condiments & Sauces",
    "Spices & Baking",
    "Household Supplies",
    "Personal Care",
];

// ═══════════════════════════════════════════════════════════════════════
// Items
// ═══════════════════════════════════════════════════════════════════════

/// A consumable tracked by quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    /// Item identifier
    pub id: ItemId,
    /// Owning group
    pub group_id: GroupId,
    /// Display name as first added
    pub name: String,
    /// Current stock, never negative
    pub quantity: f64,
    /// Free-form unit ("L", "count", ...)
    pub unit: String,
    /// Resolved category reference
    pub category_id: CategoryId,
    /// Optional expiration timestamp
    pub expiration: Option<DateTime<Utc>>,
    /// Contributor who created the row
    pub added_by: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl PantryItem {
    /// Folded name used for the upsert identity.
    #[must_use]
    pub fn name_key(&self) -> String {
        fold_name(&self.name)
    }

    /// Expiration timestamp lies in the past.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expires| expires < now)
    }

    /// Not yet expired, but expires within `window` of `now`.
    #[must_use]
    pub fn is_expiring_soon_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expiration
            .is_some_and(|expires| expires >= now && expires <= now + window)
    }

    /// Expires before the end of `window`, including already expired items.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expiration.is_some_and(|expires| expires <= now + window)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════════════════

/// Kind of derived notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Quantity is in `(0, threshold]`.
    LowStock,
    /// Quantity is exactly zero.
    OutOfStock,
    /// Expiration falls inside the expiring-soon window.
    ExpiringSoon,
}

impl NotificationType {
    /// The two mutually exclusive stock-level kinds.
    pub const STOCK_LEVELS: [Self; 2] = [Self::LowStock, Self::OutOfStock];

    /// Every kind.
    pub const ALL: [Self; 3] = [Self::LowStock, Self::OutOfStock, Self::ExpiringSoon];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
            Self::ExpiringSoon => "expiring_soon",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low_stock" => Some(Self::LowStock),
            "out_of_stock" => Some(Self::OutOfStock),
            "expiring_soon" => Some(Self::ExpiringSoon),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived notification about one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryNotification {
    /// Notification identifier
    pub id: NotificationId,
    /// Owning group
    pub group_id: GroupId,
    /// Item the notification describes
    pub item_id: ItemId,
    /// Item name at the time the notification was derived
    pub item_name: String,
    /// Notification kind
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Human readable message
    pub message: String,
    /// Read flag
    pub is_read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl PantryNotification {
    /// Build an unread notification for `item`.
    #[must_use]
    pub fn for_item(
        item: &PantryItem,
        kind: NotificationType,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            group_id: item.group_id,
            item_id: item.id,
            item_name: item.name.clone(),
            kind,
            message,
            is_read: false,
            created_at: now,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════════════════

/// Quantity-changing action recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// Item created, or quantity adjusted by add/update.
    Add,
    /// Stock consumed.
    Use,
    /// Item deleted.
    Remove,
}

impl HistoryAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Use => "use",
            Self::Remove => "remove",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "add" => Some(Self::Add),
            "use" => Some(Self::Use),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryHistory {
    /// Entry identifier
    pub id: HistoryId,
    /// Owning group
    pub group_id: GroupId,
    /// Item reference (may outlive the item)
    pub item_id: ItemId,
    /// Item name at write time
    pub item_name: String,
    /// Action kind
    pub action: HistoryAction,
    /// Signed quantity change
    pub quantity_delta: f64,
    /// Acting user
    pub actor_id: UserId,
    /// Acting user's display name at write time
    pub actor_name: String,
    /// Write time
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ids_parse_trimmed_references() {
        let id = ItemId::new();
        assert_eq!(ItemId::parse(&format!(" {id}\n")).ok(), Some(id));
        assert!(CategoryId::parse("dairy").is_err());
    }

    #[test]
    fn predefined_names_are_distinct_when_folded() {
        let mut keys: Vec<String> = PREDEFINED_CATEGORIES.iter().map(|n| fold_name(n)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), PREDEFINED_CATEGORIES.len());
    }

    #[test]
    fn custom_category_is_editable_only_by_its_group() {
        let owner = GroupId::new();
        let category = PantryCategory::custom(" Pets ", owner, UserId::new(), Utc::now());
        assert_eq!(category.name, "Pets");
        assert!(category.is_editable_by(owner));
        assert!(!category.is_editable_by(GroupId::new()));
        assert!(!PantryCategory::predefined("Dairy", Utc::now()).is_editable_by(owner));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn decimal_steps_normalize_to_exact_values() {
        let mut stock = normalize_quantity(0.3);
        for _ in 0..3 {
            stock = normalize_quantity(stock - 0.1);
        }
        assert_eq!(stock, 0.0);
        assert!(stock.is_sign_positive());
        assert_eq!(normalize_quantity(2.0 - 1.7), 0.3);
        assert_eq!(normalize_quantity(1e300), 1e300);
    }

    proptest! {
        #[test]
        fn fold_name_is_idempotent(name in "\\PC{0,20}") {
            let once = fold_name(&name);
            prop_assert_eq!(fold_name(&once), once.clone());
        }

        #[test]
        fn fold_name_ignores_padding_and_case(name in "[a-zA-Z ]{1,12}", pad in 0usize..4) {
            let padded = format!("{}{}{}", " ".repeat(pad), name.to_uppercase(), " ".repeat(pad));
            prop_assert_eq!(fold_name(&padded), fold_name(&name));
        }
    }
}
