//! Persistent objects owned by an identity map

use std::collections::BTreeMap;
use std::fmt;

use super::{FaultHolder, ObjectKey, PersistenceState};
use crate::backends::DatabaseValue;
use crate::model::EntityDescriptor;

/// Handle of an object inside one unit of work.
///
/// Two handles are equal exactly when they designate the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Column values of the row an object was last populated from
pub type Snapshot = BTreeMap<String, DatabaseValue>;

/// Mutable instance of an entity type
#[derive(Debug, Clone)]
pub struct PersistentObject {
    id: ObjectId,
    entity: String,
    key: ObjectKey,
    state: PersistenceState,
    snapshot: Snapshot,
    attributes: BTreeMap<String, DatabaseValue>,
    relationships: BTreeMap<String, FaultHolder>,
}

impl PersistentObject {
    /// Only the identity map creates objects.
    pub(super) fn new(
        id: ObjectId,
        descriptor: &EntityDescriptor,
        key: ObjectKey,
        state: PersistenceState,
    ) -> Self {
        let relationships = descriptor
            .relationships()
            .iter()
            .map(|rel| (rel.name.clone(), FaultHolder::Fault))
            .collect();

        Self {
            id,
            entity: descriptor.name().to_string(),
            key,
            state,
            snapshot: Snapshot::new(),
            attributes: BTreeMap::new(),
            relationships,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    pub fn object_key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn persistence_state(&self) -> PersistenceState {
        self.state
    }

    /// Attribute value by attribute name
    pub fn attribute(&self, name: &str) -> Option<&DatabaseValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, DatabaseValue> {
        &self.attributes
    }

    /// Raw column value from the last populating row, including foreign keys
    pub fn column_value(&self, column: &str) -> Option<&DatabaseValue> {
        self.snapshot.get(column)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Relationship holder without triggering any fetch
    pub fn read_property_directly(&self, relationship: &str) -> Option<&FaultHolder> {
        self.relationships.get(relationship)
    }

    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.keys().map(String::as_str)
    }

    pub(crate) fn holder_mut(&mut self, relationship: &str) -> Option<&mut FaultHolder> {
        self.relationships.get_mut(relationship)
    }

    pub(crate) fn set_state(&mut self, state: PersistenceState) {
        self.state = state;
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: DatabaseValue) {
        self.attributes.insert(name.to_string(), value);
    }

    /// Copy row data into the object and mark it committed
    pub(super) fn populate(&mut self, descriptor: &EntityDescriptor, snapshot: Snapshot) {
        self.attributes = descriptor
            .attributes()
            .iter()
            .map(|attr| {
                let value = snapshot.get(&attr.column).cloned().unwrap_or(DatabaseValue::Null);
                (attr.name.clone(), value)
            })
            .collect();
        self.snapshot = snapshot;
        self.state = PersistenceState::Committed;
    }

    /// Forget loaded data; relationships become faults again
    pub(super) fn make_hollow(&mut self) {
        self.state = PersistenceState::Hollow;
        for holder in self.relationships.values_mut() {
            holder.refault();
        }
    }
}
