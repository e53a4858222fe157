//! Persistent objects and their per-unit-of-work registry

pub mod fault;
pub mod identity_map;
pub mod key;
pub mod persistent;
pub mod state;

pub use fault::{FaultHolder, RelationshipValue};
pub use identity_map::IdentityMap;
pub use key::{GroupingKey, KeyExtraction, KeyValue, ObjectKey};
pub use persistent::{ObjectId, PersistentObject, Snapshot};
pub use state::PersistenceState;
