//! Read side: listings, projections, notification inbox and history.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::float_cmp)] // Quantities in these tests are exact

use chrono::Duration;
use pantry_core::{
    CategoryKind, NotificationId, NotificationType, PantryError, ResolutionCache, ShoppingReason,
    UserId,
};
use pantry_testing::TestPantry;

// ═══════════════════════════════════════════════════════════════════════
// Item listing
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_items_sorted_by_category_then_name() {
    let t = TestPantry::new();
    t.add("yogurt", 2.0, "cup", "Dairy").await;
    t.add("Bananas", 6.0, "count", "Produce").await;
    t.add("Butter", 1.0, "block", "Dairy").await;
    t.add("apples", 4.0, "count", "Produce").await;
    t.add("Bagels", 6.0, "count", "Bakery").await;

    let views = t
        .pantry
        .list_items(t.member.user_id, t.group, None)
        .await
        .unwrap();
    let names: Vec<&str> = views.iter().map(|v| v.item.name.as_str()).collect();

    assert_eq!(names, vec!["Bagels", "Butter", "yogurt", "apples", "Bananas"]);
    assert!(views.iter().all(|v| v.added_by_name.as_deref() == Some("Alice")));
    assert_eq!(views[1].category.as_ref().unwrap().kind, CategoryKind::Predefined);
}

#[tokio::test]
async fn test_list_items_honours_category_filter() {
    let t = TestPantry::new();
    t.add("Butter", 1.0, "block", "Dairy").await;
    t.add("Apples", 4.0, "count", "Produce").await;
    let produce = t.category("Produce").id.to_string();

    let views = t
        .pantry
        .list_items(t.member.user_id, t.group, Some(&produce))
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].item.name, "Apples");

    let none = t
        .pantry
        .list_items(t.member.user_id, t.group, Some("garbage"))
        .await
        .unwrap();
    assert!(none.is_empty());

    let blank = t
        .pantry
        .list_items(t.member.user_id, t.group, Some("  "))
        .await
        .unwrap();
    assert_eq!(blank.len(), 2);
}

#[tokio::test]
async fn test_list_items_is_scoped_to_group_and_members() {
    let t = TestPantry::new();
    t.add("Butter", 1.0, "block", "Dairy").await;
    let neighbour = t.outsider("Bob");

    let theirs = t
        .pantry
        .list_items(neighbour.user_id, neighbour.group_id, None)
        .await
        .unwrap();
    assert!(theirs.is_empty());

    let err = t
        .pantry
        .list_items(neighbour.user_id, t.group, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));

    let err = t
        .pantry
        .list_items(UserId::new(), t.group, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_listing_shows_contributor_of_each_item() {
    let t = TestPantry::new();
    let bob = t.housemate("Bob");
    t.add("Butter", 1.0, "block", "Dairy").await;

    let mut request = t.new_item("Cheese", 1.0, "block", "Dairy");
    request.actor_id = bob.user_id;
    t.pantry.items().add(request).await.unwrap();

    let views = t
        .pantry
        .list_items(bob.user_id, t.group, None)
        .await
        .unwrap();
    let contributors: Vec<Option<&str>> =
        views.iter().map(|v| v.added_by_name.as_deref()).collect();
    assert_eq!(contributors, vec![Some("Alice"), Some("Bob")]);

    // A departed contributor degrades to no name.
    t.directory.remove(bob.user_id);
    let views = t
        .pantry
        .query()
        .list_items(t.group, None)
        .await
        .unwrap();
    assert_eq!(views[1].added_by_name, None);
}

#[tokio::test]
async fn test_resolution_cache_looks_up_each_key_once() {
    let t = TestPantry::new();
    let dairy = t.category("Dairy").id;
    let mut cache = ResolutionCache::new(t.store.as_ref(), t.directory.as_ref());
    assert!(cache.is_empty());

    for _ in 0..5 {
        assert_eq!(cache.category(dairy).await.unwrap().unwrap().name, "Dairy");
        assert_eq!(cache.contributor(t.member.user_id).await.as_deref(), Some("Alice"));
    }
    assert_eq!(cache.len(), 2);

    // Misses are memoized too.
    assert!(cache.contributor(UserId::new()).await.is_none());
    assert_eq!(cache.len(), 3);
}

// ═══════════════════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_categories_partitions_and_sorts() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();
    resolver.create("Pet Food", t.group, t.member.user_id).await.unwrap();
    resolver.create("baby", t.group, t.member.user_id).await.unwrap();
    let neighbour = t.outsider("Bob");
    resolver
        .create("Garage", neighbour.group_id, neighbour.user_id)
        .await
        .unwrap();

    let listing = t
        .pantry
        .list_categories(t.member.user_id, t.group)
        .await
        .unwrap();

    let custom: Vec<&str> = listing.custom.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(custom, vec!["baby", "Pet Food"]);
    assert_eq!(listing.predefined.len(), pantry_core::PREDEFINED_CATEGORIES.len());
    assert_eq!(listing.predefined[0].name, "Bakery");
    assert!(listing.predefined.iter().all(|c| c.kind == CategoryKind::Predefined));
}

// ═══════════════════════════════════════════════════════════════════════
// Derived views
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_shopping_list_orders_by_reason_then_category() {
    let t = TestPantry::new();
    t.add("Eggs", 0.0, "count", "Dairy").await;
    t.add("Butter", 1.0, "block", "Dairy").await;
    t.add("Apples", 0.5, "kg", "Produce").await;
    t.add("Bread", 0.0, "loaf", "Bakery").await;
    t.add("Rice", 5.0, "kg", "Dry Goods & Pasta").await;

    let mut stale = t.new_item("Ham", 3.0, "slice", "Meat & Seafood");
    stale.expiration = Some(t.now() - Duration::days(1));
    t.pantry.items().add(stale).await.unwrap();

    let list = t
        .pantry
        .shopping_list(t.member.user_id, t.group)
        .await
        .unwrap();
    let lines: Vec<(ShoppingReason, &str)> = list
        .iter()
        .map(|entry| (entry.reason, entry.item.item.name.as_str()))
        .collect();

    assert_eq!(
        lines,
        vec![
            (ShoppingReason::OutOfStock, "Bread"),
            (ShoppingReason::OutOfStock, "Eggs"),
            (ShoppingReason::LowStock, "Butter"),
            (ShoppingReason::LowStock, "Apples"),
            (ShoppingReason::Expired, "Ham"),
        ]
    );
    assert!(list[4].item.is_expired);
}

#[tokio::test]
async fn test_expiring_items_soonest_first() {
    let t = TestPantry::new();
    for (name, days) in [("Milk", 2), ("Fish", -1), ("Cheese", 30), ("Lettuce", 1)] {
        let mut request = t.new_item(name, 2.0, "unit", "Produce");
        request.expiration = Some(t.now() + Duration::days(days));
        t.pantry.items().add(request).await.unwrap();
    }
    t.add("Salt", 1.0, "kg", "Spices & Baking").await;

    let expiring = t
        .pantry
        .expiring_items(t.member.user_id, t.group)
        .await
        .unwrap();
    let names: Vec<&str> = expiring.iter().map(|v| v.item.name.as_str()).collect();

    assert_eq!(names, vec!["Fish", "Lettuce", "Milk"]);
    assert!(expiring[0].is_expired);
    assert!(expiring[1].is_expiring_soon);
}

#[tokio::test]
async fn test_warnings_hide_read_notifications() {
    let t = TestPantry::new();
    t.add("Milk", 0.5, "L", "Dairy").await;
    t.add("Eggs", 0.0, "count", "Dairy").await;

    let warnings = t.pantry.warnings(t.member.user_id, t.group).await.unwrap();
    assert_eq!(warnings.len(), 2);
    // Newest first.
    assert_eq!(warnings[0].kind, NotificationType::OutOfStock);
    assert_eq!(warnings[0].item_name, "Eggs");
    assert_eq!(warnings[0].message, "Item is out of stock");

    t.pantry
        .notifications()
        .mark_read(warnings[0].id, t.member.user_id)
        .await
        .unwrap();

    let warnings = t.pantry.warnings(t.member.user_id, t.group).await.unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, NotificationType::LowStock);

    let all = t
        .pantry
        .notifications()
        .list(t.group, t.member.user_id, false)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|n| n.is_read).count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Notification inbox
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_inbox_is_owned_by_the_group() {
    let t = TestPantry::new();
    t.add("Milk", 0.5, "L", "Dairy").await;
    let inbox = t.pantry.notifications();
    let notification = inbox
        .list(t.group, t.member.user_id, true)
        .await
        .unwrap()
        .remove(0);
    let mallory = t.outsider("Mallory");

    let err = inbox
        .mark_read(notification.id, mallory.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));
    let err = inbox.delete(notification.id, mallory.user_id).await.unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));
    let err = inbox.list(t.group, mallory.user_id, false).await.unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));

    inbox.delete(notification.id, t.member.user_id).await.unwrap();
    assert!(inbox.list(t.group, t.member.user_id, false).await.unwrap().is_empty());

    let err = inbox
        .delete(notification.id, t.member.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    let err = inbox
        .mark_read(NotificationId::new(), t.member.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// ═══════════════════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_history_is_newest_first_and_prefix_preserving() {
    let t = TestPantry::new();
    let milk = t.add("Milk", 3.0, "L", "Dairy").await;
    let items = t.pantry.items();

    items.use_item(milk.item.id, 1.0, t.member.user_id).await.unwrap();
    let before = t
        .pantry
        .history(t.member.user_id, t.group, Some(milk.item.id))
        .await
        .unwrap();

    items.use_item(milk.item.id, 0.5, t.member.user_id).await.unwrap();
    t.add("Bread", 1.0, "loaf", "Bakery").await;
    let after = t
        .pantry
        .history(t.member.user_id, t.group, Some(milk.item.id))
        .await
        .unwrap();

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[0].quantity_delta, -0.5);
    assert_eq!(&after[1..], &before[..]);

    let group_wide = t
        .pantry
        .history(t.member.user_id, t.group, None)
        .await
        .unwrap();
    assert_eq!(group_wide.len(), 4);
    assert_eq!(group_wide[0].item_name, "Bread");
}

#[tokio::test]
async fn test_history_requires_membership() {
    let t = TestPantry::new();
    t.add("Milk", 3.0, "L", "Dairy").await;
    let mallory = t.outsider("Mallory");

    let err = t
        .pantry
        .history(mallory.user_id, t.group, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

// ═══════════════════════════════════════════════════════════════════════
// Collaborator faults
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_contributor_names_are_read_live() {
    let t = TestPantry::new();
    t.add("Butter", 1.0, "block", "Dairy").await;

    let mut renamed = t.member.clone();
    renamed.display_name = "Alice B.".to_string();
    t.directory.insert(renamed);

    let views = t.pantry.query().list_items(t.group, None).await.unwrap();
    assert_eq!(views[0].added_by_name.as_deref(), Some("Alice B."));
}

#[tokio::test]
async fn test_directory_outage_degrades_projection_but_fails_gated_reads() {
    let t = TestPantry::new();
    t.add("Butter", 1.0, "block", "Dairy").await;
    t.directory.fail_lookups(true);

    let views = t.pantry.query().list_items(t.group, None).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].added_by_name, None);

    let err = t
        .pantry
        .list_items(t.member.user_id, t.group, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert!(!err.is_user_error());
}

#[tokio::test]
async fn test_reads_never_commit() {
    let t = TestPantry::new();
    t.add("Butter", 1.0, "block", "Dairy").await;
    let commits = t.store.commit_count();

    t.pantry.list_items(t.member.user_id, t.group, None).await.unwrap();
    t.pantry.shopping_list(t.member.user_id, t.group).await.unwrap();
    t.pantry.expiring_items(t.member.user_id, t.group).await.unwrap();
    t.pantry.warnings(t.member.user_id, t.group).await.unwrap();

    assert_eq!(t.store.commit_count(), commits);
}
