//! Entity model: descriptors for entities, attributes and relationships

pub mod descriptor;
pub mod registry;

pub use descriptor::{
    AttributeDescriptor, Cardinality, EntityDescriptor, JoinStep, RelationshipDescriptor,
};
pub use registry::{EntityModel, EntityModelBuilder};
