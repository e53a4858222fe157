//! Entity Descriptors - static mapping metadata for one entity type
//!
//! Descriptors are assembled once by [`EntityModelBuilder`](super::EntityModelBuilder)
//! and are immutable afterwards, so they can be shared by any number of units
//! of work.

use crate::error::{OrmError, OrmResult};

/// Number of related objects a relationship yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Scalar attribute mapped to a column of the entity's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub column: String,
}

/// One table-to-table hop of a relationship: `source.col = target.col` for
/// every column pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub source_table: String,
    pub target_table: String,
    pub columns: Vec<(String, String)>,
}

impl JoinStep {
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            columns: Vec::new(),
        }
    }

    /// Add a join column pair
    pub fn on(mut self, source_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        self.columns.push((source_column.into(), target_column.into()));
        self
    }

    pub fn source_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(source, _)| source.as_str())
    }

    pub fn target_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(_, target)| target.as_str())
    }
}

/// Relationship from one entity to another, possibly through intermediate
/// tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub target_entity: String,
    pub cardinality: Cardinality,
    /// Join hops from the owner's table to the target's table
    pub path: Vec<JoinStep>,
}

impl RelationshipDescriptor {
    pub fn new(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        cardinality: Cardinality,
        path: Vec<JoinStep>,
    ) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            cardinality,
            path,
        }
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }

    /// Realized through at least one intermediate table
    pub fn is_flattened(&self) -> bool {
        self.path.len() > 1
    }

    /// Columns of the owner's table whose values select the related rows.
    pub fn parent_key_columns(&self) -> Vec<&str> {
        self.path
            .first()
            .map(|step| step.source_columns().collect())
            .unwrap_or_default()
    }

    /// Check the hop chain against the owner and target tables
    pub fn validate(&self, owner_table: &str, target_table: &str) -> OrmResult<()> {
        let (first, last) = match (self.path.first(), self.path.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(OrmError::Mapping(format!(
                    "Relationship '{}' has no join steps",
                    self.name
                )))
            }
        };

        if first.source_table != owner_table {
            return Err(OrmError::Mapping(format!(
                "Relationship '{}' starts at table '{}', expected '{}'",
                self.name, first.source_table, owner_table
            )));
        }

        if last.target_table != target_table {
            return Err(OrmError::Mapping(format!(
                "Relationship '{}' ends at table '{}', expected '{}'",
                self.name, last.target_table, target_table
            )));
        }

        for window in self.path.windows(2) {
            if window[0].target_table != window[1].source_table {
                return Err(OrmError::Mapping(format!(
                    "Relationship '{}' is not a connected path: '{}' does not continue from '{}'",
                    self.name, window[1].source_table, window[0].target_table
                )));
            }
        }

        if let Some(step) = self.path.iter().find(|step| step.columns.is_empty()) {
            return Err(OrmError::Mapping(format!(
                "Relationship '{}' joins '{}' to '{}' without columns",
                self.name, step.source_table, step.target_table
            )));
        }

        Ok(())
    }
}

/// Static description of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: String,
    table: String,
    primary_key: Vec<String>,
    attributes: Vec<AttributeDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    columns: Vec<String>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: Vec::new(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Set the ordered primary key columns
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        for column in self.primary_key.clone() {
            self.add_column(&column);
        }
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        self.add_column(&column);
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            column,
        });
        self
    }

    /// Declare a table column that is neither key nor attribute
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.add_column(&column.into());
        self
    }

    pub fn to_one(
        self,
        name: impl Into<String>,
        target_entity: impl Into<String>,
        path: Vec<JoinStep>,
    ) -> Self {
        self.relationship(RelationshipDescriptor::new(
            name,
            target_entity,
            Cardinality::ToOne,
            path,
        ))
    }

    pub fn to_many(
        self,
        name: impl Into<String>,
        target_entity: impl Into<String>,
        path: Vec<JoinStep>,
    ) -> Self {
        self.relationship(RelationshipDescriptor::new(
            name,
            target_entity,
            Cardinality::ToMany,
            path,
        ))
    }

    pub fn relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// Every column of the table that objects of this entity snapshot
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn relationship_named(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|rel| rel.name == name)
    }

    pub fn attribute_named(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub(crate) fn add_column(&mut self, column: &str) {
        if !self.columns.iter().any(|existing| existing == column) {
            self.columns.push(column.to_string());
        }
    }

    pub(crate) fn validate_shape(&self) -> OrmResult<()> {
        if self.primary_key.is_empty() {
            return Err(OrmError::Mapping(format!(
                "Entity '{}' has no primary key",
                self.name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for name in self
            .attributes
            .iter()
            .map(|attr| &attr.name)
            .chain(self.relationships.iter().map(|rel| &rel.name))
        {
            if !seen.insert(name.as_str()) {
                return Err(OrmError::Mapping(format!(
                    "Entity '{}' declares property '{}' twice",
                    self.name, name
                )));
            }
        }

        Ok(())
    }
}
