//! Relationship fault holders
//!
//! Every relationship attribute of a persistent object is a [`FaultHolder`].
//! It starts as [`FaultHolder::Fault`] and moves to
//! [`FaultHolder::Resolved`] exactly once per prefetch pass. Asking whether a
//! holder is still a fault never triggers a fetch.

use super::ObjectId;
use crate::error::AlreadyResolvedError;

/// Resolved value of a relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipValue {
    /// To-one relationship; `None` when no related row exists
    ToOne(Option<ObjectId>),
    /// To-many relationship in row order
    ToMany(Vec<ObjectId>),
}

impl RelationshipValue {
    /// Related objects as a slice, regardless of cardinality
    pub fn objects(&self) -> &[ObjectId] {
        match self {
            RelationshipValue::ToOne(Some(id)) => std::slice::from_ref(id),
            RelationshipValue::ToOne(None) => &[],
            RelationshipValue::ToMany(ids) => ids,
        }
    }

    pub fn as_to_one(&self) -> Option<ObjectId> {
        match self {
            RelationshipValue::ToOne(id) => *id,
            RelationshipValue::ToMany(_) => None,
        }
    }

    pub fn as_to_many(&self) -> Option<&[ObjectId]> {
        match self {
            RelationshipValue::ToMany(ids) => Some(ids),
            RelationshipValue::ToOne(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

/// Placeholder installed on a relationship attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FaultHolder {
    /// Not loaded yet
    #[default]
    Fault,
    /// Loaded
    Resolved(RelationshipValue),
}

impl FaultHolder {
    pub fn is_fault(&self) -> bool {
        matches!(self, FaultHolder::Fault)
    }

    /// Resolved value, or `None` while still a fault
    pub fn value(&self) -> Option<&RelationshipValue> {
        match self {
            FaultHolder::Fault => None,
            FaultHolder::Resolved(value) => Some(value),
        }
    }

    /// One-way transition from fault to resolved
    pub fn resolve_to(&mut self, value: RelationshipValue) -> Result<(), AlreadyResolvedError> {
        match self {
            FaultHolder::Fault => {
                *self = FaultHolder::Resolved(value);
                Ok(())
            }
            FaultHolder::Resolved(_) => Err(AlreadyResolvedError),
        }
    }

    /// Drop a resolved value so the relationship can be loaded again.
    pub(crate) fn refault(&mut self) {
        *self = FaultHolder::Fault;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_resolves_once() {
        let mut holder = FaultHolder::default();
        assert!(holder.is_fault());
        assert_eq!(holder.value(), None);

        holder
            .resolve_to(RelationshipValue::ToMany(vec![ObjectId::new(1)]))
            .unwrap();
        assert!(!holder.is_fault());
        assert_eq!(holder.value().map(RelationshipValue::len), Some(1));

        let second = holder.resolve_to(RelationshipValue::ToMany(Vec::new()));
        assert_eq!(second, Err(AlreadyResolvedError));
        assert_eq!(holder.value().map(RelationshipValue::len), Some(1));
    }

    #[test]
    fn test_refault_allows_new_resolution() {
        let mut holder = FaultHolder::Resolved(RelationshipValue::ToOne(None));
        holder.refault();
        assert!(holder.is_fault());
        assert!(holder
            .resolve_to(RelationshipValue::ToOne(Some(ObjectId::new(4))))
            .is_ok());
        assert_eq!(
            holder.value().and_then(RelationshipValue::as_to_one),
            Some(ObjectId::new(4))
        );
    }

    #[test]
    fn test_relationship_value_views() {
        let empty = RelationshipValue::ToMany(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.as_to_many(), Some(&[][..]));
        assert!(RelationshipValue::ToOne(None).objects().is_empty());
    }
}
