mod common;

use common::{context, int_attribute, related, sorted, text_attribute, things_database};
use trellis_orm::{
    DatabaseValue, GroupingKey, KeyValue, OrmError, PersistenceState, PrefetchSemantics, SelectQuery,
};

#[tokio::test]
async fn test_fault_is_resolved_on_first_read_only() {
    let db = things_database();
    let mut ctx = context(&db);

    let bags = ctx.select(&SelectQuery::new("Bag")).await.unwrap();
    let bag = bags[0];
    assert!(ctx.read_property_directly(bag, "boxes").unwrap().is_fault());
    assert_eq!(db.statement_count(), 1);

    assert_eq!(ctx.read_property(bag, "boxes").await.unwrap().len(), 2);
    assert_eq!(db.statement_count(), 2);

    db.block_statements();
    assert_eq!(ctx.read_property(bag, "boxes").await.unwrap().len(), 2);
    assert!(!ctx.read_property_directly(bag, "boxes").unwrap().is_fault());
}

#[tokio::test]
async fn test_hollow_object_is_refreshed_before_resolving() {
    let db = things_database();
    let mut ctx = context(&db);

    let small = ctx.local_object("Box", 2).unwrap();
    assert_eq!(ctx.object(small).unwrap().persistence_state(), PersistenceState::Hollow);
    assert_eq!(ctx.attribute(small, "name").unwrap(), None);
    assert_eq!(db.statement_count(), 0);

    let balls = ctx.read_property(small, "balls").await.unwrap().objects().to_vec();
    assert_eq!(balls.len(), 4);
    assert_eq!(db.statement_count(), 2);
    assert_eq!(ctx.object(small).unwrap().persistence_state(), PersistenceState::Committed);
    assert_eq!(text_attribute(&ctx, small, "name"), "small");

    let volumes: Vec<i64> = balls.iter().map(|&b| int_attribute(&ctx, b, "thingVolume")).collect();
    assert_eq!(sorted(volumes), vec![20, 30, 40, 40]);
}

#[tokio::test]
async fn test_missing_row_for_hollow_object() {
    let db = things_database();
    let mut ctx = context(&db);

    let ghost = ctx.local_object("Box", 99).unwrap();
    let err = ctx.read_property(ghost, "balls").await.unwrap_err();
    assert!(matches!(err, OrmError::InconsistentRow { .. }));
    assert!(ctx.read_property_directly(ghost, "balls").unwrap().is_fault());
}

#[tokio::test]
async fn test_local_object_is_shared_with_fetched_rows() {
    let db = things_database();
    let mut ctx = context(&db);

    let big = ctx.local_object("Box", 1).unwrap();
    let boxes = ctx.select(&SelectQuery::new("Box")).await.unwrap();
    assert_eq!(boxes[0], big);
    assert_eq!(ctx.object(big).unwrap().persistence_state(), PersistenceState::Committed);
    assert_eq!(ctx.find("Box", &GroupingKey::from(1)), Some(big));
    assert_eq!(ctx.registered_count(), 2);

    let composite = GroupingKey::new(vec![KeyValue::Int(1), KeyValue::Int(2)]);
    assert!(matches!(ctx.local_object("Box", composite), Err(OrmError::Configuration(_))));
    assert!(ctx.local_object("Crate", 1).is_err());
}

#[tokio::test]
async fn test_second_select_refreshes_relationships() {
    let db = things_database();
    let mut ctx = context(&db);
    let query = SelectQuery::new("Bag")
        .prefetch("boxes", PrefetchSemantics::DisjointById)
        .unwrap();

    let bag = ctx.select(&query).await.unwrap()[0];
    assert_eq!(related(&ctx, bag, "boxes").len(), 2);

    db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![3.into(), 1.into(), "tiny".into()])
        .unwrap();
    assert_eq!(ctx.select(&query).await.unwrap(), vec![bag]);
    assert_eq!(related(&ctx, bag, "boxes").len(), 3);
}

#[tokio::test]
async fn test_local_edits_survive_refetch() {
    let db = things_database();
    let mut ctx = context(&db);

    let big = ctx.select(&SelectQuery::new("Box")).await.unwrap()[0];
    ctx.write_property(big, "name", "huge").unwrap();
    assert_eq!(ctx.object(big).unwrap().persistence_state(), PersistenceState::Modified);

    ctx.select(&SelectQuery::new("Box")).await.unwrap();
    assert_eq!(text_attribute(&ctx, big, "name"), "huge");
    assert_eq!(ctx.object(big).unwrap().persistence_state(), PersistenceState::Modified);

    assert!(matches!(
        ctx.write_property(big, "color", "red"),
        Err(OrmError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_invalidated_object_reloads() {
    let db = things_database();
    let mut ctx = context(&db);
    let query = SelectQuery::new("Box")
        .prefetch("balls", PrefetchSemantics::Joint)
        .unwrap();

    let big = ctx.select(&query).await.unwrap()[0];
    ctx.write_property(big, "name", "huge").unwrap();
    ctx.invalidate(big).unwrap();

    assert_eq!(ctx.object(big).unwrap().persistence_state(), PersistenceState::Hollow);
    assert!(ctx.read_property_directly(big, "balls").unwrap().is_fault());

    assert_eq!(ctx.read_property(big, "balls").await.unwrap().len(), 2);
    assert_eq!(
        ctx.attribute(big, "name").unwrap(),
        Some(&DatabaseValue::String("big".to_string()))
    );
}

#[tokio::test]
async fn test_unknown_names_are_rejected() {
    let db = things_database();
    let mut ctx = context(&db);
    let bag = ctx.select(&SelectQuery::new("Bag")).await.unwrap()[0];

    assert!(matches!(
        ctx.read_property_directly(bag, "crates"),
        Err(OrmError::Configuration(_))
    ));
    assert!(ctx.read_property(bag, "crates").await.is_err());
    assert_eq!(ctx.attribute(bag, "weight").unwrap(), None);
}
