//! Fluent fixture for pantry behaviour tests.

#![allow(clippy::expect_used)] // Fixtures fail loudly on programmer error
#![allow(clippy::missing_panics_doc)]

use crate::{FixedClock, InMemoryDirectory, InMemoryPantryStore, test_clock};
use chrono::{DateTime, Utc};
use pantry_core::{
    Clock, GroupId, ItemView, Member, NewItem, Pantry, PantryCategory, PantryEnvironment,
    PantryPolicy, PREDEFINED_CATEGORIES,
};
use std::sync::Arc;

/// A pantry over in-memory collaborators, with one group and one member.
///
/// # Example
///
/// ```
/// use pantry_testing::TestPantry;
///
/// # tokio_test::block_on(async {
/// let t = TestPantry::new();
/// let milk = t.add("Milk", 2.0, "L", "Dairy").await;
///
/// let outcome = t.pantry.items().use_item(milk.item.id, 1.5, t.member.user_id).await.unwrap();
/// assert!((outcome.remaining_quantity - 0.5).abs() < f64::EPSILON);
/// # });
/// ```
pub struct TestPantry {
    /// The pantry under test
    pub pantry: Pantry<InMemoryPantryStore, InMemoryDirectory>,
    /// Shared store, for inspection and fault injection
    pub store: Arc<InMemoryPantryStore>,
    /// Shared directory
    pub directory: Arc<InMemoryDirectory>,
    /// Time every component sees
    pub clock: FixedClock,
    /// The default group
    pub group: GroupId,
    /// A member of [`TestPantry::group`]
    pub member: Member,
    predefined: Vec<PantryCategory>,
}

impl TestPantry {
    /// Fixture with the reference policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(PantryPolicy::default())
    }

    /// Fixture with a custom policy.
    #[must_use]
    pub fn with_policy(policy: PantryPolicy) -> Self {
        let clock = test_clock();
        let predefined: Vec<PantryCategory> = PREDEFINED_CATEGORIES
            .iter()
            .map(|name| PantryCategory::predefined(name, clock.now()))
            .collect();

        let store = Arc::new(InMemoryPantryStore::with_categories(predefined.clone()));
        let directory = Arc::new(InMemoryDirectory::new());
        let group = GroupId::new();
        let member = directory.add_member(group, "Alice");

        let env = PantryEnvironment::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            Arc::new(clock.clone()),
        )
        .with_policy(policy);

        Self {
            pantry: Pantry::new(env),
            store,
            directory,
            clock,
            group,
            member,
            predefined,
        }
    }

    /// The fixed "now".
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A predefined category by name.
    #[must_use]
    pub fn category(&self, name: &str) -> &PantryCategory {
        self.predefined
            .iter()
            .find(|category| category.name == name)
            .expect("unknown predefined category")
    }

    /// Another member of the default group.
    #[must_use]
    pub fn housemate(&self, display_name: &str) -> Member {
        self.directory.add_member(self.group, display_name)
    }

    /// A member of a different, fresh group.
    #[must_use]
    pub fn outsider(&self, display_name: &str) -> Member {
        self.directory.add_member(GroupId::new(), display_name)
    }

    /// An add request by the default member under a predefined category.
    #[must_use]
    pub fn new_item(&self, name: &str, quantity: f64, unit: &str, category: &str) -> NewItem {
        NewItem {
            group_id: self.group,
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            category_ref: self.category(category).id.to_string(),
            expiration: None,
            actor_id: self.member.user_id,
        }
    }

    /// Add an item and return its view.
    pub async fn add(&self, name: &str, quantity: f64, unit: &str, category: &str) -> ItemView {
        self.pantry
            .items()
            .add(self.new_item(name, quantity, unit, category))
            .await
            .expect("fixture add failed")
    }
}

impl Default for TestPantry {
    fn default() -> Self {
        Self::new()
    }
}
