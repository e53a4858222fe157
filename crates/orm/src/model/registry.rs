//! Entity Model Registry - the validated set of entity descriptors

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::descriptor::{EntityDescriptor, RelationshipDescriptor};
use crate::error::{OrmError, OrmResult};

/// Immutable collection of entity descriptors, shared between units of work
#[derive(Debug, Clone, Default)]
pub struct EntityModel {
    entities: BTreeMap<String, Arc<EntityDescriptor>>,
    tables: HashMap<String, String>,
}

impl EntityModel {
    pub fn builder() -> EntityModelBuilder {
        EntityModelBuilder::default()
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(name)
    }

    /// Look up an entity, failing with a configuration error when unknown
    pub fn require_entity(&self, name: &str) -> OrmResult<&Arc<EntityDescriptor>> {
        self.entity(name)
            .ok_or_else(|| OrmError::configuration(format!("Unknown entity '{}'", name)))
    }

    pub fn entity_for_table(&self, table: &str) -> Option<&Arc<EntityDescriptor>> {
        self.tables.get(table).and_then(|name| self.entities.get(name))
    }

    /// Resolve a relationship and its target descriptor
    pub fn relationship(
        &self,
        entity: &str,
        relationship: &str,
    ) -> OrmResult<(&RelationshipDescriptor, &Arc<EntityDescriptor>)> {
        let owner = self.require_entity(entity)?;
        let rel = owner.relationship_named(relationship).ok_or_else(|| {
            OrmError::configuration(format!(
                "Entity '{}' has no relationship '{}'",
                entity, relationship
            ))
        })?;
        let target = self.require_entity(&rel.target_entity)?;
        Ok((rel, target))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects descriptors and validates them as a whole
#[derive(Debug, Default)]
pub struct EntityModelBuilder {
    entities: Vec<EntityDescriptor>,
}

impl EntityModelBuilder {
    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    pub fn build(self) -> OrmResult<EntityModel> {
        let mut entities = self.entities;
        let mut tables = HashMap::new();
        let mut names = HashMap::new();

        for (index, entity) in entities.iter().enumerate() {
            entity.validate_shape()?;
            if names.insert(entity.name().to_string(), index).is_some() {
                return Err(OrmError::Mapping(format!(
                    "Entity '{}' is declared twice",
                    entity.name()
                )));
            }
            if let Some(other) = tables.insert(entity.table().to_string(), entity.name().to_string()) {
                return Err(OrmError::Mapping(format!(
                    "Table '{}' is mapped by both '{}' and '{}'",
                    entity.table(),
                    other,
                    entity.name()
                )));
            }
        }

        // Every column a join step touches must be part of the snapshot of the
        // entity that owns that table, otherwise keys cannot be read back.
        let mut extra_columns: Vec<(usize, String)> = Vec::new();
        for entity in &entities {
            for rel in entity.relationships() {
                let target_index = names.get(&rel.target_entity).ok_or_else(|| {
                    OrmError::Mapping(format!(
                        "Relationship '{}.{}' targets unknown entity '{}'",
                        entity.name(),
                        rel.name,
                        rel.target_entity
                    ))
                })?;
                rel.validate(entity.table(), entities[*target_index].table())?;

                for step in &rel.path {
                    if let Some(index) = tables.get(&step.source_table).and_then(|n| names.get(n)) {
                        extra_columns.extend(step.source_columns().map(|c| (*index, c.to_string())));
                    }
                    if let Some(index) = tables.get(&step.target_table).and_then(|n| names.get(n)) {
                        extra_columns.extend(step.target_columns().map(|c| (*index, c.to_string())));
                    }
                }
            }
        }

        for (index, column) in extra_columns {
            entities[index].add_column(&column);
        }

        let entities = entities
            .into_iter()
            .map(|entity| (entity.name().to_string(), Arc::new(entity)))
            .collect();

        Ok(EntityModel { entities, tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JoinStep;

    fn bag_and_box() -> EntityModelBuilder {
        EntityModel::builder()
            .entity(
                EntityDescriptor::new("Bag", "BAG")
                    .primary_key(["ID"])
                    .attribute("name", "NAME")
                    .to_many("boxes", "Box", vec![JoinStep::new("BAG", "BOX").on("ID", "BAG_ID")]),
            )
            .entity(
                EntityDescriptor::new("Box", "BOX")
                    .primary_key(["ID"])
                    .attribute("name", "NAME"),
            )
    }

    #[test]
    fn test_build_derives_foreign_key_columns() {
        let model = bag_and_box().build().unwrap();
        let box_entity = model.entity("Box").unwrap();
        assert!(box_entity.columns().iter().any(|c| c == "BAG_ID"));
        assert_eq!(model.entity_for_table("BAG").unwrap().name(), "Bag");
        assert_eq!(model.len(), 2);

        let (rel, target) = model.relationship("Bag", "boxes").unwrap();
        assert!(rel.is_to_many());
        assert_eq!(target.name(), "Box");
    }

    #[test]
    fn test_unknown_lookups_are_configuration_errors() {
        let model = bag_and_box().build().unwrap();
        assert!(matches!(model.require_entity("Ball"), Err(OrmError::Configuration(_))));
        assert!(matches!(model.relationship("Bag", "balls"), Err(OrmError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_bad_models() {
        let unknown_target = EntityModel::builder()
            .entity(
                EntityDescriptor::new("Bag", "BAG")
                    .primary_key(["ID"])
                    .to_many("boxes", "Box", vec![JoinStep::new("BAG", "BOX").on("ID", "BAG_ID")]),
            )
            .build();
        assert!(matches!(unknown_target, Err(OrmError::Mapping(_))));

        let duplicate_table = bag_and_box()
            .entity(EntityDescriptor::new("Crate", "BOX").primary_key(["ID"]))
            .build();
        assert!(matches!(duplicate_table, Err(OrmError::Mapping(_))));
    }
}
