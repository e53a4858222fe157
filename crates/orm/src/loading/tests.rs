use super::*;
use crate::backends::{DatabaseValue, MemoryDatabase};
use crate::config::PrefetchConfig;
use crate::context::CancelHandle;
use crate::error::{OrmError, ROOT_NODE};
use crate::model::{EntityDescriptor, EntityModel, JoinStep};
use crate::object::{IdentityMap, ObjectId, PersistenceState};
use crate::query::{Expression, PrefetchSemantics, SelectQuery};

/// Bags of boxes of balls, and things shared with balls by (volume, weight)
pub(crate) fn things_model() -> EntityModel {
    let bag_box = || JoinStep::new("BAG", "BOX").on("ID", "BAG_ID");
    let box_thing = || {
        vec![
            JoinStep::new("BOX", "BOX_THING").on("ID", "BOX_ID"),
            JoinStep::new("BOX_THING", "THING")
                .on("THING_VOLUME", "VOLUME")
                .on("THING_WEIGHT", "WEIGHT"),
        ]
    };

    let mut bag_things = vec![bag_box()];
    bag_things.extend(box_thing());

    EntityModel::builder()
        .entity(
            EntityDescriptor::new("Bag", "BAG")
                .primary_key(["ID"])
                .attribute("name", "NAME")
                .to_many("boxes", "Box", vec![bag_box()])
                .to_many(
                    "balls",
                    "Ball",
                    vec![bag_box(), JoinStep::new("BOX", "BALL").on("ID", "BOX_ID")],
                )
                .to_many("things", "Thing", bag_things),
        )
        .entity(
            EntityDescriptor::new("Box", "BOX")
                .primary_key(["ID"])
                .attribute("name", "NAME")
                .to_one("bag", "Bag", vec![JoinStep::new("BOX", "BAG").on("BAG_ID", "ID")])
                .to_one("boxInfo", "BoxInfo", vec![JoinStep::new("BOX", "BOX_INFO").on("ID", "BOX_ID")])
                .to_many("balls", "Ball", vec![JoinStep::new("BOX", "BALL").on("ID", "BOX_ID")])
                .to_many("things", "Thing", box_thing()),
        )
        .entity(
            EntityDescriptor::new("BoxInfo", "BOX_INFO")
                .primary_key(["ID"])
                .attribute("color", "COLOR")
                .to_one("box", "Box", vec![JoinStep::new("BOX_INFO", "BOX").on("BOX_ID", "ID")]),
        )
        .entity(
            EntityDescriptor::new("Ball", "BALL")
                .primary_key(["ID"])
                .attribute("thingVolume", "THING_VOLUME")
                .attribute("thingWeight", "THING_WEIGHT")
                .to_one("box", "Box", vec![JoinStep::new("BALL", "BOX").on("BOX_ID", "ID")])
                .to_one(
                    "thing",
                    "Thing",
                    vec![JoinStep::new("BALL", "THING")
                        .on("THING_VOLUME", "VOLUME")
                        .on("THING_WEIGHT", "WEIGHT")],
                ),
        )
        .entity(
            EntityDescriptor::new("Thing", "THING")
                .primary_key(["ID"])
                .attribute("volume", "VOLUME")
                .attribute("weight", "WEIGHT")
                .to_one(
                    "ball",
                    "Ball",
                    vec![JoinStep::new("THING", "BALL")
                        .on("VOLUME", "THING_VOLUME")
                        .on("WEIGHT", "THING_WEIGHT")],
                ),
        )
        .build()
        .unwrap()
}

fn things_database() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    let insert = |table: &str, columns: &[&str], values: &[i32]| {
        db.insert(table, columns, values.iter().map(|&v| DatabaseValue::Int32(v)).collect())
            .unwrap();
    };

    db.insert("BAG", &["ID", "NAME"], vec![1.into(), "b1".into()]).unwrap();
    db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![1.into(), 1.into(), "big".into()]).unwrap();
    db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![2.into(), 1.into(), "small".into()]).unwrap();
    for (id, volume, weight) in [(1, 10, 10), (2, 20, 20), (3, 30, 30), (4, 40, 40), (5, 20, 10), (6, 40, 30)] {
        insert("THING", &["ID", "VOLUME", "WEIGHT"], &[id, volume, weight]);
    }
    for (id, box_id, volume, weight) in [(1, 1, 10, 10), (2, 1, 20, 20), (3, 2, 30, 30), (4, 2, 40, 40), (5, 2, 20, 10), (6, 2, 40, 30)] {
        insert("BALL", &["ID", "BOX_ID", "THING_VOLUME", "THING_WEIGHT"], &[id, box_id, volume, weight]);
    }
    for (box_id, volume, weight) in [(1, 10, 10), (1, 20, 20), (2, 30, 30), (1, 40, 40), (1, 20, 10), (1, 40, 30)] {
        insert("BOX_THING", &["BOX_ID", "THING_VOLUME", "THING_WEIGHT"], &[box_id, volume, weight]);
    }
    db.create_table("BOX_INFO", &["ID", "BOX_ID", "COLOR"]).unwrap();
    db
}

struct Harness {
    model: EntityModel,
    db: MemoryDatabase,
    objects: IdentityMap,
    config: PrefetchConfig,
    cancel: CancelHandle,
}

impl Harness {
    fn new() -> Self {
        Self {
            model: things_model(),
            db: things_database(),
            objects: IdentityMap::new(),
            config: PrefetchConfig::default(),
            cancel: CancelHandle::new(),
        }
    }

    async fn run(&mut self, query: &SelectQuery) -> (Result<Vec<ObjectId>, OrmError>, PrefetchStats) {
        let plan = compile(&self.model, query, &self.config).unwrap();
        let mut pass = PrefetchPass::new(&self.db, &mut self.objects, &self.config, &self.cancel);
        let result = pass.run(&plan).await;
        (result, pass.into_stats())
    }

    fn related(&self, id: ObjectId, relationship: &str) -> Vec<ObjectId> {
        let holder = self.objects.get(id).unwrap().read_property_directly(relationship).unwrap();
        holder.value().expect("relationship is resolved").objects().to_vec()
    }
}

#[tokio::test]
async fn test_joint_rows_collapse_per_parent() {
    let mut harness = Harness::new();
    let query = SelectQuery::new("Box").prefetch("balls", PrefetchSemantics::Joint).unwrap();

    let (result, stats) = harness.run(&query).await;
    let boxes = result.unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(stats, PrefetchStats { statements: 1, rows: 6, units: 1 });

    let sizes: Vec<usize> = boxes.iter().map(|&id| harness.related(id, "balls").len()).collect();
    assert_eq!(sizes, vec![2, 4]);
    assert_eq!(harness.objects.objects_of("Ball").count(), 6);
}

#[tokio::test]
async fn test_disjoint_by_id_chunks_large_key_sets() {
    let mut harness = Harness::new();
    harness.config = PrefetchConfig::default().with_max_in_list_size(1);
    let query = SelectQuery::new("Box").prefetch("balls", PrefetchSemantics::DisjointById).unwrap();

    let (result, stats) = harness.run(&query).await;
    let boxes = result.unwrap();
    assert_eq!(stats.statements, 3);
    assert_eq!(stats.units, 2);
    assert_eq!(harness.related(boxes[0], "balls").len(), 2);
    assert_eq!(harness.related(boxes[1], "balls").len(), 4);
    assert!(harness.db.statements()[1].contains("WHERE t0.BOX_ID IN ($1)"));
}

#[tokio::test]
async fn test_disjoint_drops_rows_of_unloaded_parents() {
    let mut harness = Harness::new();
    let query = SelectQuery::new("Box")
        .qualifier(Expression::matches("name", "big"))
        .prefetch("balls", PrefetchSemantics::Disjoint)
        .unwrap();

    let (result, stats) = harness.run(&query).await;
    let boxes = result.unwrap();
    assert_eq!(stats.rows, 1 + 6);
    assert_eq!(harness.related(boxes[0], "balls").len(), 2);
    assert_eq!(harness.objects.objects_of("Ball").count(), 2);
    assert!(!harness.db.statements()[1].contains("WHERE"));
}

#[tokio::test]
async fn test_same_holder_twice_in_one_pass_is_rejected() {
    let mut harness = Harness::new();
    let query = SelectQuery::new("Bag")
        .prefetch("boxes.bag.boxes", PrefetchSemantics::DisjointById)
        .unwrap();

    let (result, _) = harness.run(&query).await;
    match result {
        Err(OrmError::AlreadyResolved { entity, relationship, .. }) => {
            assert_eq!(entity, "Bag");
            assert_eq!(relationship, "boxes");
        }
        other => panic!("expected AlreadyResolved, got {:?}", other),
    }
}

#[tokio::test]
async fn test_second_pass_refreshes_resolved_holders() {
    let mut harness = Harness::new();
    let query = SelectQuery::new("Bag").prefetch("boxes", PrefetchSemantics::DisjointById).unwrap();

    let (first, _) = harness.run(&query).await;
    let (second, _) = harness.run(&query).await;
    let bag = first.unwrap()[0];
    assert_eq!(second.unwrap(), vec![bag]);
    assert_eq!(harness.related(bag, "boxes").len(), 2);
    assert_eq!(harness.objects.len(), 3);
}

#[tokio::test]
async fn test_cancelled_pass_stops_before_next_unit() {
    let mut harness = Harness::new();
    harness.cancel.cancel();
    let query = SelectQuery::new("Bag").prefetch("boxes", PrefetchSemantics::DisjointById).unwrap();

    let (result, stats) = harness.run(&query).await;
    assert!(matches!(result, Err(OrmError::Cancelled { ref node }) if node == ROOT_NODE));
    assert_eq!(stats.statements, 0);
    assert!(!harness.cancel.is_cancelled());
    assert!(harness.objects.is_empty());
}

#[tokio::test]
async fn test_failed_unit_leaves_earlier_nodes_resolved() {
    let mut harness = Harness::new();
    harness.db.fail_on_table("BALL");
    let query = SelectQuery::new("Bag")
        .prefetch("boxes", PrefetchSemantics::DisjointById)
        .unwrap()
        .prefetch("boxes.balls", PrefetchSemantics::DisjointById)
        .unwrap();

    let (result, stats) = harness.run(&query).await;
    let err = result.unwrap_err();
    assert_eq!(err.failed_node(), Some("boxes.balls"));
    assert_eq!(stats.units, 2);

    let bag = harness.objects.objects_of("Bag").next().unwrap().id();
    let boxes = harness.related(bag, "boxes");
    assert_eq!(boxes.len(), 2);
    for id in boxes {
        let object = harness.objects.get(id).unwrap();
        assert_eq!(object.persistence_state(), PersistenceState::Committed);
        assert!(object.read_property_directly("balls").unwrap().is_fault());
    }
}
