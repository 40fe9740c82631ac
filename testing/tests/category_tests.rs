//! Behaviour of the category resolver.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use pantry_core::{CategoryId, CategoryKind, GroupId, PantryCategory, PantryError};
use pantry_testing::TestPantry;

#[tokio::test]
async fn test_predefined_category_resolves_for_every_group() {
    let t = TestPantry::new();
    let dairy = t.category("Dairy");
    let resolver = t.pantry.categories();

    let ours = resolver.resolve(&dairy.id.to_string(), t.group).await.unwrap();
    let theirs = resolver
        .resolve(&format!("  {}  ", dairy.id), GroupId::new())
        .await
        .unwrap();

    assert_eq!(ours.id, dairy.id);
    assert_eq!(theirs.kind, CategoryKind::Predefined);
}

#[tokio::test]
async fn test_malformed_reference_is_invalid() {
    let t = TestPantry::new();
    let err = t
        .pantry
        .categories()
        .resolve("not-a-category", t.group)
        .await
        .unwrap_err();

    assert!(matches!(err, PantryError::InvalidReference(_)));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_unknown_and_inactive_categories_are_not_found() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();

    let err = resolver
        .resolve(&CategoryId::new().to_string(), t.group)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let mut retired = PantryCategory::custom("Seasonal", t.group, t.member.user_id, t.now());
    retired.is_active = false;
    t.store.put_category(retired.clone()).await;

    let err = resolver
        .resolve(&retired.id.to_string(), t.group)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::NotFound { resource: "category", .. }));

    let err = resolver
        .rename(retired.id, "Holiday", t.member.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_custom_category_is_private_to_its_group() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();

    let snacks = resolver
        .create("  Kids Snacks ", t.group, t.member.user_id)
        .await
        .unwrap();
    assert_eq!(snacks.name, "Kids Snacks");
    assert_eq!(snacks.kind, CategoryKind::Custom);
    assert_eq!(snacks.group_id, Some(t.group));
    assert_eq!(snacks.created_by, Some(t.member.user_id));

    assert!(resolver.resolve(&snacks.id.to_string(), t.group).await.is_ok());
    let err = resolver
        .resolve(&snacks.id.to_string(), GroupId::new())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_create_collides_with_predefined_names() {
    let t = TestPantry::new();
    let err = t
        .pantry
        .categories()
        .create(" dAiRy ", t.group, t.member.user_id)
        .await
        .unwrap_err();

    assert!(matches!(err, PantryError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_create_collides_within_group_only() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();
    resolver.create("Pet Food", t.group, t.member.user_id).await.unwrap();

    let err = resolver
        .create("PET FOOD", t.group, t.member.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Conflict(_)));

    let neighbour = t.outsider("Bob");
    assert!(
        resolver
            .create("Pet Food", neighbour.group_id, neighbour.user_id)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_create_validates_name_and_membership() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();

    let err = resolver.create("   ", t.group, t.member.user_id).await.unwrap_err();
    assert!(matches!(err, PantryError::Validation(_)));

    let mallory = t.outsider("Mallory");
    let err = resolver.create("Treats", t.group, mallory.user_id).await.unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));
}

#[tokio::test]
async fn test_concurrent_creates_of_one_name_admit_a_single_winner() {
    let t = TestPantry::new();
    let bob = t.housemate("Bob");

    let first = {
        let resolver = t.pantry.categories().clone();
        let (group, actor) = (t.group, t.member.user_id);
        tokio::spawn(async move { resolver.create("Baby", group, actor).await })
    };
    let second = {
        let resolver = t.pantry.categories().clone();
        let group = t.group;
        tokio::spawn(async move { resolver.create("baby", group, bob.user_id).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(PantryError::Conflict(_))))
    );
    assert_eq!(
        t.store.category_count().await,
        pantry_core::PREDEFINED_CATEGORIES.len() + 1
    );
}

#[tokio::test]
async fn test_rename_rules() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();
    let snacks = resolver
        .create("Snackz", t.group, t.member.user_id)
        .await
        .unwrap();

    let err = resolver
        .rename(t.category("Dairy").id, "Milk Stuff", t.member.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));

    let err = resolver
        .rename(snacks.id, "snacks", t.member.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Conflict(_)));

    // Re-casing its own name is not a collision.
    let renamed = resolver
        .rename(snacks.id, "SNACKZ", t.member.user_id)
        .await
        .unwrap();
    assert_eq!(renamed.name, "SNACKZ");

    let housemate = t.housemate("Bob");
    let renamed = resolver
        .rename(snacks.id, "Crisps", housemate.user_id)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Crisps");

    let mallory = t.outsider("Mallory");
    let err = resolver
        .rename(snacks.id, "Mine", mallory.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_delete_refuses_while_items_reference_category() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();
    let pets = resolver.create("Pet Food", t.group, t.member.user_id).await.unwrap();

    let mut request = t.new_item("Kibble", 2.0, "bag", "Dairy");
    request.category_ref = pets.id.to_string();
    let kibble = t.pantry.items().add(request).await.unwrap();

    let err = resolver.delete(pets.id, t.member.user_id).await.unwrap_err();
    assert!(matches!(err, PantryError::Conflict(_)));

    t.pantry
        .items()
        .delete(kibble.item.id, t.member.user_id)
        .await
        .unwrap();
    resolver.delete(pets.id, t.member.user_id).await.unwrap();

    let err = resolver.delete(pets.id, t.member.user_id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_delete_succeeds_after_last_item_is_recategorized() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();
    let pets = resolver.create("Pet Food", t.group, t.member.user_id).await.unwrap();

    let mut request = t.new_item("Kibble", 2.0, "bag", "Dairy");
    request.category_ref = pets.id.to_string();
    let kibble = t.pantry.items().add(request).await.unwrap();

    t.pantry
        .items()
        .update(pantry_core::ItemChanges {
            item_id: kibble.item.id,
            name: "Kibble".to_string(),
            quantity: 2.0,
            unit: "bag".to_string(),
            category_ref: t.category("Household Supplies").id.to_string(),
            expiration: None,
            actor_id: t.member.user_id,
        })
        .await
        .unwrap();

    assert!(resolver.delete(pets.id, t.member.user_id).await.is_ok());
}

#[tokio::test]
async fn test_predefined_and_foreign_categories_cannot_be_deleted() {
    let t = TestPantry::new();
    let resolver = t.pantry.categories();

    let err = resolver
        .delete(t.category("Frozen").id, t.member.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));

    let neighbour = t.outsider("Bob");
    let theirs = resolver
        .create("Garage", neighbour.group_id, neighbour.user_id)
        .await
        .unwrap();
    let err = resolver.delete(theirs.id, t.member.user_id).await.unwrap_err();
    assert!(matches!(err, PantryError::Forbidden(_)));
}
