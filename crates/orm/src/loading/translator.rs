//! Row-to-object translation
//!
//! A result row can carry several entity instances side by side, each under
//! its own table alias (`t0.ID`, `t1.ID`, ...). Translation reads the primary
//! key of one alias, resolves the object through the identity map and hands
//! it the columns of that alias as its snapshot.

use crate::backends::{DatabaseValue, Row};
use crate::error::{OrmError, OrmResult};
use crate::model::EntityDescriptor;
use crate::object::{GroupingKey, IdentityMap, KeyExtraction, ObjectId, PersistentObject, Snapshot};
use crate::query::ColumnRef;

/// Translate the entity stored under `alias`; its key must be present.
pub fn translate(
    row: &Row,
    alias: &str,
    entity: &EntityDescriptor,
    objects: &mut IdentityMap,
) -> OrmResult<ObjectId> {
    translate_optional(row, alias, entity, objects)?.ok_or_else(|| {
        OrmError::inconsistent_row(entity.name(), format!("primary key under '{}' is NULL", alias))
    })
}

/// Translate the entity stored under `alias`, or `None` when every key
/// column is NULL (the outer side of an unmatched join).
pub fn translate_optional(
    row: &Row,
    alias: &str,
    entity: &EntityDescriptor,
    objects: &mut IdentityMap,
) -> OrmResult<Option<ObjectId>> {
    let key_values = entity
        .primary_key_columns()
        .iter()
        .map(|column| column_value(row, alias, column))
        .collect::<Vec<_>>();

    let key = match GroupingKey::extract(key_values) {
        KeyExtraction::Complete(key) => key,
        KeyExtraction::Absent => return Ok(None),
        KeyExtraction::Partial => {
            return Err(OrmError::inconsistent_row(
                entity.name(),
                format!("primary key under '{}' is partially NULL", alias),
            ))
        }
    };

    let (id, created) = objects.resolve(entity, key, snapshot(row, alias, entity));
    if created {
        tracing::trace!(entity = entity.name(), object = %id, "registered object from row");
    }
    Ok(Some(id))
}

/// Columns of `entity` found under `alias`
pub fn snapshot(row: &Row, alias: &str, entity: &EntityDescriptor) -> Snapshot {
    entity
        .columns()
        .iter()
        .filter_map(|column| {
            row.get(&format!("{}.{}", alias, column))
                .map(|value| (column.clone(), value.clone()))
        })
        .collect()
}

/// Grouping key of a row; `None` when any column is NULL
pub fn row_key(row: &Row, columns: &[ColumnRef]) -> Option<GroupingKey> {
    let values = columns
        .iter()
        .map(|column| row.get(&column.label()).unwrap_or(&DatabaseValue::Null));
    GroupingKey::from_values(values)
}

/// Key of an object over columns of its own table; `None` when any is NULL.
///
/// Hollow objects have no snapshot, so primary key columns fall back to the
/// object key.
pub fn object_key(object: &PersistentObject, entity: &EntityDescriptor, columns: &[String]) -> Option<GroupingKey> {
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        match object.column_value(column) {
            Some(value) => values.push(value.clone()),
            None => {
                let position = entity.primary_key_columns().iter().position(|pk| pk == column)?;
                values.push(object.object_key().values().get(position)?.to_value());
            }
        }
    }
    GroupingKey::from_values(&values)
}

fn column_value<'r>(row: &'r Row, alias: &str, column: &str) -> &'r DatabaseValue {
    row.get(&format!("{}.{}", alias, column))
        .unwrap_or(&DatabaseValue::Null)
}
