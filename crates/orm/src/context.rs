//! Object Context - one unit of work
//!
//! An [`ObjectContext`] owns the identity map for its lifetime. Queries run
//! through it, and every object they return is addressed by an [`ObjectId`]
//! that stays valid until the context is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backends::{DatabaseValue, StatementExecutor};
use crate::config::PrefetchConfig;
use crate::error::{OrmError, OrmResult};
use crate::loading::{compile, ExecutionPlan, PrefetchPass, PrefetchStats};
use crate::model::{EntityDescriptor, EntityModel};
use crate::object::{
    FaultHolder, IdentityMap, ObjectId, ObjectKey, PersistenceState, PersistentObject, RelationshipValue,
};
use crate::query::{Expression, SelectQuery};

/// Shared flag for cancelling a running prefetch pass between statements.
///
/// A cancelled pass clears the flag, so the context can be used again.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Read and clear the flag
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Unit of work over an entity model and a statement executor
pub struct ObjectContext {
    model: Arc<EntityModel>,
    executor: Arc<dyn StatementExecutor>,
    config: PrefetchConfig,
    objects: IdentityMap,
    cancel: CancelHandle,
    last_stats: Option<PrefetchStats>,
}

impl std::fmt::Debug for ObjectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContext")
            .field("config", &self.config)
            .field("objects", &self.objects.len())
            .field("last_stats", &self.last_stats)
            .finish()
    }
}

impl ObjectContext {
    pub fn new(model: Arc<EntityModel>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            model,
            executor,
            config: PrefetchConfig::default(),
            objects: IdentityMap::new(),
            cancel: CancelHandle::new(),
            last_stats: None,
        }
    }

    pub fn with_config(mut self, config: PrefetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Run a query and its prefetches; returns root objects in row order.
    ///
    /// On error, nodes resolved before the failing one stay resolved and
    /// their objects stay registered.
    pub async fn select(&mut self, query: &SelectQuery) -> OrmResult<Vec<ObjectId>> {
        let plan = compile(&self.model, query, &self.config)?;
        tracing::debug!(entity = query.entity(), units = plan.len(), "running select");
        self.run(&plan, None).await
    }

    async fn run(&mut self, plan: &ExecutionPlan, parents: Option<Vec<ObjectId>>) -> OrmResult<Vec<ObjectId>> {
        let mut pass = PrefetchPass::new(self.executor.as_ref(), &mut self.objects, &self.config, &self.cancel);
        if let Some(parents) = parents {
            pass = pass.with_parents("", parents);
        }

        let result = pass.run(plan).await;
        self.last_stats = Some(pass.into_stats());
        result
    }

    pub fn object(&self, id: ObjectId) -> OrmResult<&PersistentObject> {
        self.objects.get(id).ok_or(OrmError::UnknownObject(id))
    }

    /// Relationship holder as it is, without any fetch
    pub fn read_property_directly(&self, id: ObjectId, relationship: &str) -> OrmResult<&FaultHolder> {
        let object = self.object(id)?;
        object
            .read_property_directly(relationship)
            .ok_or_else(|| unknown_relationship(object.entity_name(), relationship))
    }

    /// Relationship value, fetching it if the holder is still a fault.
    ///
    /// A hollow object is refreshed from its row first, since its join
    /// columns are not known yet.
    pub async fn read_property(&mut self, id: ObjectId, relationship: &str) -> OrmResult<&RelationshipValue> {
        let (entity, is_fault, hollow) = {
            let object = self.object(id)?;
            let holder = self.read_property_directly(id, relationship)?;
            (
                object.entity_name().to_string(),
                holder.is_fault(),
                object.persistence_state() == PersistenceState::Hollow,
            )
        };

        if is_fault {
            if hollow {
                self.refresh(id, &entity).await?;
            }
            let plan = ExecutionPlan::for_relationship(&self.model, &entity, relationship)?;
            tracing::debug!(object = %id, entity = entity.as_str(), relationship, "resolving fault");
            self.run(&plan, Some(vec![id])).await?;
        }

        match self.read_property_directly(id, relationship)? {
            FaultHolder::Resolved(value) => Ok(value),
            FaultHolder::Fault => Err(OrmError::configuration(format!(
                "Relationship '{}' of {} could not be resolved",
                relationship, id
            ))),
        }
    }

    async fn refresh(&mut self, id: ObjectId, entity: &str) -> OrmResult<()> {
        let descriptor = self.model.require_entity(entity)?.clone();
        let key = self.object(id)?.object_key().clone();

        let qualifier = descriptor
            .primary_key_columns()
            .iter()
            .zip(key.to_values())
            .map(|(column, value)| Expression::matches(column.as_str(), value))
            .reduce(Expression::and);
        let mut query = SelectQuery::new(entity);
        if let Some(qualifier) = qualifier {
            query = query.qualifier(qualifier);
        }

        let plan = compile(&self.model, &query, &self.config)?;
        let found = self.run(&plan, None).await?;
        if !found.contains(&id) {
            return Err(OrmError::inconsistent_row(entity, format!("no row for key {}", key)));
        }
        Ok(())
    }

    /// Attribute value; `None` for unknown attributes and hollow objects
    pub fn attribute(&self, id: ObjectId, name: &str) -> OrmResult<Option<&DatabaseValue>> {
        Ok(self.object(id)?.attribute(name))
    }

    /// Change an attribute locally. Committed objects become modified.
    pub fn write_property(&mut self, id: ObjectId, name: &str, value: impl Into<DatabaseValue>) -> OrmResult<()> {
        let entity = self.object(id)?.entity_name().to_string();
        let descriptor = self.model.require_entity(&entity)?;
        if descriptor.attribute_named(name).is_none() {
            return Err(OrmError::configuration(format!(
                "Entity '{}' has no attribute '{}'",
                entity, name
            )));
        }

        let object = self.objects.get_mut(id).ok_or(OrmError::UnknownObject(id))?;
        object.set_attribute(name, value.into());
        if object.persistence_state() == PersistenceState::Committed {
            object.set_state(PersistenceState::Modified);
        }
        Ok(())
    }

    /// Register a hollow object for a known key without any fetch
    pub fn local_object(&mut self, entity: &str, key: impl Into<ObjectKey>) -> OrmResult<ObjectId> {
        let descriptor: Arc<EntityDescriptor> = self.model.require_entity(entity)?.clone();
        let key = key.into();
        if key.len() != descriptor.primary_key_columns().len() {
            return Err(OrmError::configuration(format!(
                "Key {} does not match the primary key of '{}'",
                key, entity
            )));
        }
        Ok(self.objects.resolve_hollow(&descriptor, key))
    }

    /// Forget an object's data; its relationships become faults again
    pub fn invalidate(&mut self, id: ObjectId) -> OrmResult<()> {
        if self.objects.invalidate(id) {
            Ok(())
        } else {
            Err(OrmError::UnknownObject(id))
        }
    }

    pub fn find(&self, entity: &str, key: &ObjectKey) -> Option<ObjectId> {
        self.objects.find(entity, key)
    }

    pub fn objects_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a PersistentObject> {
        self.objects.objects_of(entity)
    }

    pub fn registered_count(&self) -> usize {
        self.objects.len()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Counters of the most recent pass, including a failed one
    pub fn last_stats(&self) -> Option<&PrefetchStats> {
        self.last_stats.as_ref()
    }
}

fn unknown_relationship(entity: &str, relationship: &str) -> OrmError {
    OrmError::configuration(format!(
        "Entity '{}' has no relationship '{}'",
        entity, relationship
    ))
}
