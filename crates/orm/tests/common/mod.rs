//! Shared fixture: one bag, two boxes, six balls and six things matched to
//! the balls by (volume, weight)

#![allow(dead_code)]

use std::sync::{Arc, Once};

use trellis_orm::{
    DatabaseValue, EntityDescriptor, EntityModel, JoinStep, MemoryDatabase, ObjectContext, ObjectId,
    PrefetchConfig,
};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness; `RUST_LOG` filters it
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn things_model() -> EntityModel {
    let bag_box = || JoinStep::new("BAG", "BOX").on("ID", "BAG_ID");
    let box_ball = || JoinStep::new("BOX", "BALL").on("ID", "BOX_ID");
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
                .to_many("balls", "Ball", vec![bag_box(), box_ball()])
                .to_many("things", "Thing", bag_things),
        )
        .entity(
            EntityDescriptor::new("Box", "BOX")
                .primary_key(["ID"])
                .attribute("name", "NAME")
                .to_one("bag", "Bag", vec![JoinStep::new("BOX", "BAG").on("BAG_ID", "ID")])
                .to_one("boxInfo", "BoxInfo", vec![JoinStep::new("BOX", "BOX_INFO").on("ID", "BOX_ID")])
                .to_many("balls", "Ball", vec![box_ball()])
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
        .expect("things model is valid")
}

pub fn things_database() -> Arc<MemoryDatabase> {
    let db = MemoryDatabase::new();
    let ints = |values: &[i32]| values.iter().map(|&v| DatabaseValue::Int32(v)).collect::<Vec<_>>();

    db.insert("BAG", &["ID", "NAME"], vec![1.into(), "b1".into()]).unwrap();
    for (id, name) in [(1, "big"), (2, "small")] {
        db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![id.into(), 1.into(), name.into()])
            .unwrap();
    }
    for (id, color) in [(1, "red"), (2, "green")] {
        db.insert("BOX_INFO", &["ID", "BOX_ID", "COLOR"], vec![id.into(), id.into(), color.into()])
            .unwrap();
    }

    let pairs = [
        (1, 1, 10, 10),
        (2, 1, 20, 20),
        (3, 2, 30, 30),
        (4, 2, 40, 40),
        (5, 2, 20, 10),
        (6, 2, 40, 30),
    ];
    for (id, box_id, volume, weight) in pairs {
        db.insert("THING", &["ID", "VOLUME", "WEIGHT"], ints(&[id, volume, weight]))
            .unwrap();
        db.insert(
            "BALL",
            &["ID", "BOX_ID", "THING_VOLUME", "THING_WEIGHT"],
            ints(&[id, box_id, volume, weight]),
        )
        .unwrap();
    }

    for (box_id, volume, weight) in [(1, 10, 10), (1, 20, 20), (2, 30, 30), (1, 40, 40), (1, 20, 10), (1, 40, 30)] {
        db.insert("BOX_THING", &["BOX_ID", "THING_VOLUME", "THING_WEIGHT"], ints(&[box_id, volume, weight]))
            .unwrap();
    }

    Arc::new(db)
}

pub fn context(db: &Arc<MemoryDatabase>) -> ObjectContext {
    init_tracing();
    ObjectContext::new(Arc::new(things_model()), db.clone())
}

pub fn context_with(db: &Arc<MemoryDatabase>, config: PrefetchConfig) -> ObjectContext {
    context(db).with_config(config)
}

/// Objects of a resolved relationship; panics on a fault
pub fn related(ctx: &ObjectContext, id: ObjectId, relationship: &str) -> Vec<ObjectId> {
    ctx.read_property_directly(id, relationship)
        .unwrap()
        .value()
        .unwrap_or_else(|| panic!("'{}' of {} is still a fault", relationship, id))
        .objects()
        .to_vec()
}

pub fn int_attribute(ctx: &ObjectContext, id: ObjectId, name: &str) -> i64 {
    ctx.attribute(id, name)
        .unwrap()
        .and_then(DatabaseValue::as_i64)
        .unwrap_or_else(|| panic!("{} of {} is not an integer", name, id))
}

pub fn text_attribute(ctx: &ObjectContext, id: ObjectId, name: &str) -> String {
    ctx.attribute(id, name)
        .unwrap()
        .and_then(DatabaseValue::as_str)
        .unwrap_or_else(|| panic!("{} of {} is not text", name, id))
        .to_string()
}

pub fn sorted(mut values: Vec<i64>) -> Vec<i64> {
    values.sort_unstable();
    values
}
