//! Identity Map - the per-unit-of-work object registry
//!
//! Maps `(entity, primary key)` to exactly one [`PersistentObject`]. Objects
//! live in an arena and are addressed by [`ObjectId`]; all other components
//! go through the map to create or reach them.

use std::collections::HashMap;

use super::{ObjectId, ObjectKey, PersistenceState, PersistentObject, Snapshot};
use crate::model::EntityDescriptor;

/// Object registry for one unit of work
#[derive(Debug, Default)]
pub struct IdentityMap {
    objects: Vec<PersistentObject>,
    index: HashMap<(String, ObjectKey), ObjectId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the object for `key` and merge row data into it.
    ///
    /// Existing objects keep their attribute values unless they are hollow.
    /// New objects are registered as committed. Returns whether the object
    /// was created by this call.
    pub fn resolve(
        &mut self,
        descriptor: &EntityDescriptor,
        key: ObjectKey,
        snapshot: Snapshot,
    ) -> (ObjectId, bool) {
        if let Some(id) = self.find(descriptor.name(), &key) {
            let object = &mut self.objects[id.index()];
            if object.persistence_state().accepts_row_data() {
                object.populate(descriptor, snapshot);
            }
            return (id, false);
        }

        let id = self.register(descriptor, key, PersistenceState::Committed);
        self.objects[id.index()].populate(descriptor, snapshot);
        (id, true)
    }

    /// Find or create a hollow object for `key` without row data
    pub fn resolve_hollow(&mut self, descriptor: &EntityDescriptor, key: ObjectKey) -> ObjectId {
        match self.find(descriptor.name(), &key) {
            Some(id) => id,
            None => self.register(descriptor, key, PersistenceState::Hollow),
        }
    }

    pub fn find(&self, entity: &str, key: &ObjectKey) -> Option<ObjectId> {
        self.index.get(&(entity.to_string(), key.clone())).copied()
    }

    pub fn get(&self, id: ObjectId) -> Option<&PersistentObject> {
        self.objects.get(id.index())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut PersistentObject> {
        self.objects.get_mut(id.index())
    }

    /// Turn an object hollow so the next fetch repopulates it
    pub fn invalidate(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(id.index()) {
            Some(object) => {
                object.make_hollow();
                true
            }
            None => false,
        }
    }

    /// Registered objects of one entity, in registration order
    pub fn objects_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a PersistentObject> {
        self.objects.iter().filter(move |object| object.entity_name() == entity)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn register(
        &mut self,
        descriptor: &EntityDescriptor,
        key: ObjectKey,
        state: PersistenceState,
    ) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.index.insert((descriptor.name().to_string(), key.clone()), id);
        self.objects.push(PersistentObject::new(id, descriptor, key, state));
        id
    }
}
