//! # trellis-orm: object graph assembly for relational queries
//!
//! Queries run inside an [`ObjectContext`], one unit of work. Rows are
//! translated into persistent objects that are unique per primary key within
//! the context, and relationships named in a [`PrefetchTree`] are loaded
//! eagerly with joint, disjoint or disjoint-by-id semantics, so reading them
//! afterwards never needs another round-trip.

pub mod backends;
pub mod config;
pub mod context;
pub mod error;
pub mod loading;
pub mod model;
pub mod object;
pub mod query;

// Re-export core traits and types
pub use backends::{DatabaseValue, MemoryDatabase, PostgresExecutor, Row, StatementExecutor};
pub use config::{PoolConfig, PrefetchConfig};
pub use context::{CancelHandle, ObjectContext};
pub use error::{AlreadyResolvedError, DatabaseError, OrmError, OrmResult, ROOT_NODE};
pub use loading::PrefetchStats;
pub use model::{
    AttributeDescriptor, Cardinality, EntityDescriptor, EntityModel, EntityModelBuilder, JoinStep,
    RelationshipDescriptor,
};
pub use object::{
    FaultHolder, GroupingKey, IdentityMap, KeyValue, ObjectId, ObjectKey, PersistenceState,
    PersistentObject, RelationshipValue,
};
pub use query::{
    Expression, PrefetchNode, PrefetchSemantics, PrefetchTree, SelectQuery, SelectStatement, SortOrder,
};
