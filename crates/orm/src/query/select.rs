//! Root queries: entity, qualifier, ordering and prefetch tree

use super::prefetch::{PrefetchNode, PrefetchSemantics, PrefetchTree};
use super::statement::{ColumnRef, OrderDirection, Predicate};
use crate::backends::DatabaseValue;
use crate::error::{OrmError, OrmResult};
use crate::model::EntityDescriptor;

/// Sort order of a query ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl From<SortOrder> for OrderDirection {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Ascending => OrderDirection::Asc,
            SortOrder::Descending => OrderDirection::Desc,
        }
    }
}

/// Qualifier over the properties of the root entity.
///
/// A property is an attribute name, or a raw column of the entity's table
/// (useful for foreign keys that are not mapped as attributes).
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Match(String, DatabaseValue),
    IsNull(String),
    And(Vec<Expression>),
    Or(Vec<Expression>),
}

impl Expression {
    /// `property = value`; matching NULL is the same as [`Expression::is_null`]
    pub fn matches(property: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Expression::Match(property.into(), value.into())
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Expression::IsNull(property.into())
    }

    pub fn and(self, other: Expression) -> Self {
        match self {
            Expression::And(mut parts) => {
                parts.push(other);
                Expression::And(parts)
            }
            this => Expression::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Expression) -> Self {
        match self {
            Expression::Or(mut parts) => {
                parts.push(other);
                Expression::Or(parts)
            }
            this => Expression::Or(vec![this, other]),
        }
    }

    /// Compile against an entity whose table is aliased `alias`
    pub fn to_predicate(&self, entity: &EntityDescriptor, alias: &str) -> OrmResult<Predicate> {
        let predicate = match self {
            Expression::Match(property, value) => {
                let column = property_column(entity, alias, property)?;
                if value.is_null() {
                    Predicate::IsNull(column)
                } else {
                    Predicate::Eq(column, value.clone())
                }
            }
            Expression::IsNull(property) => Predicate::IsNull(property_column(entity, alias, property)?),
            Expression::And(parts) => Predicate::And(
                parts
                    .iter()
                    .map(|part| part.to_predicate(entity, alias))
                    .collect::<OrmResult<_>>()?,
            ),
            Expression::Or(parts) => Predicate::Or(
                parts
                    .iter()
                    .map(|part| part.to_predicate(entity, alias))
                    .collect::<OrmResult<_>>()?,
            ),
        };
        Ok(predicate)
    }
}

/// Resolve a property name to a column of `alias`
pub(crate) fn property_column(entity: &EntityDescriptor, alias: &str, property: &str) -> OrmResult<ColumnRef> {
    if let Some(attribute) = entity.attribute_named(property) {
        return Ok(ColumnRef::new(alias, attribute.column.clone()));
    }
    if entity.columns().iter().any(|column| column == property) {
        return Ok(ColumnRef::new(alias, property));
    }
    Err(OrmError::configuration(format!(
        "Entity '{}' has no attribute or column '{}'",
        entity.name(),
        property
    )))
}

/// Query for objects of one entity, with eager loading instructions
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    entity: String,
    qualifier: Option<Expression>,
    orderings: Vec<(String, SortOrder)>,
    prefetch_tree: PrefetchTree,
}

impl SelectQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            qualifier: None,
            orderings: Vec::new(),
            prefetch_tree: PrefetchTree::new(),
        }
    }

    /// Set the qualifier, AND-ing it with an existing one
    pub fn qualifier(mut self, expression: Expression) -> Self {
        self.qualifier = Some(match self.qualifier.take() {
            Some(existing) => existing.and(expression),
            None => expression,
        });
        self
    }

    pub fn order_by(mut self, property: impl Into<String>, order: SortOrder) -> Self {
        self.orderings.push((property.into(), order));
        self
    }

    /// Add a prefetch path
    pub fn prefetch(mut self, path: &str, semantics: PrefetchSemantics) -> OrmResult<Self> {
        self.prefetch_tree.add_path(path, semantics)?;
        Ok(self)
    }

    pub fn add_prefetch(&mut self, path: &str, semantics: PrefetchSemantics) -> OrmResult<&PrefetchNode> {
        self.prefetch_tree.add_path(path, semantics)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn qualifier_expression(&self) -> Option<&Expression> {
        self.qualifier.as_ref()
    }

    pub fn orderings(&self) -> &[(String, SortOrder)] {
        &self.orderings
    }

    pub fn prefetch_tree(&self) -> &PrefetchTree {
        &self.prefetch_tree
    }
}
