//! Query Orchestrator - runs the resolution units of a plan in order
//!
//! A [`PrefetchPass`] owns the bookkeeping of one pass: which objects each
//! prefetch path produced (the parent set of the next level down) and which
//! relationship holders were already resolved. Every unit fetches all of its
//! rows before it touches any object, so a failed statement leaves that node
//! and everything after it unresolved.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::joint::JointRows;
use super::plan::{ExecutionPlan, ParentLink, ResolutionUnit, UnitKind, MAIN_ALIAS};
use super::translator::{object_key, translate};
use crate::backends::{Row, StatementExecutor};
use crate::config::PrefetchConfig;
use crate::context::CancelHandle;
use crate::error::{OrmError, OrmResult};
use crate::model::Cardinality;
use crate::object::{GroupingKey, IdentityMap, ObjectId, PersistentObject, RelationshipValue};
use crate::query::SelectStatement;

/// Counters of one prefetch pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchStats {
    /// Statements handed to the executor, including failed ones
    pub statements: usize,
    /// Rows received
    pub rows: usize,
    /// Resolution units completed
    pub units: usize,
}

/// State of one prefetch pass over a unit of work
pub struct PrefetchPass<'a> {
    executor: &'a dyn StatementExecutor,
    objects: &'a mut IdentityMap,
    config: &'a PrefetchConfig,
    cancel: &'a CancelHandle,
    produced: HashMap<String, Vec<ObjectId>>,
    resolved: HashSet<(ObjectId, String)>,
    stats: PrefetchStats,
}

impl<'a> PrefetchPass<'a> {
    pub fn new(
        executor: &'a dyn StatementExecutor,
        objects: &'a mut IdentityMap,
        config: &'a PrefetchConfig,
        cancel: &'a CancelHandle,
    ) -> Self {
        Self {
            executor,
            objects,
            config,
            cancel,
            produced: HashMap::new(),
            resolved: HashSet::new(),
            stats: PrefetchStats::default(),
        }
    }

    /// Seed the objects registered under `path`; used to resolve
    /// relationships of objects loaded earlier
    pub fn with_parents(mut self, path: &str, parents: Vec<ObjectId>) -> Self {
        self.produced.insert(path.to_string(), parents);
        self
    }

    pub fn stats(&self) -> &PrefetchStats {
        &self.stats
    }

    pub fn into_stats(self) -> PrefetchStats {
        self.stats
    }

    /// Run every unit of `plan`; returns the root objects in row order
    pub async fn run(&mut self, plan: &ExecutionPlan) -> OrmResult<Vec<ObjectId>> {
        self.config.validate()?;
        let started = Instant::now();

        for unit in plan.units() {
            if self.cancel.take() {
                debug!(node = unit.name(), "prefetch pass cancelled");
                return Err(OrmError::Cancelled {
                    node: unit.name().to_string(),
                });
            }

            match unit.kind {
                UnitKind::Root => self.resolve_root(unit).await?,
                UnitKind::DisjointById => self.resolve_disjoint_by_id(unit).await?,
                UnitKind::Disjoint => self.resolve_disjoint(unit).await?,
            }
            self.stats.units += 1;
        }

        debug!(
            statements = self.stats.statements,
            rows = self.stats.rows,
            units = self.stats.units,
            objects = self.objects.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prefetch pass complete"
        );

        Ok(self.produced.get("").cloned().unwrap_or_default())
    }

    async fn resolve_root(&mut self, unit: &ResolutionUnit) -> OrmResult<()> {
        let rows = self.fetch(unit, &unit.statement).await?;

        let mut roots = Vec::new();
        let mut seen = HashSet::new();
        let mut joints = JointRows::new(unit);
        for row in &rows {
            let id = translate(row, MAIN_ALIAS, &unit.entity, self.objects)?;
            if seen.insert(id) {
                roots.push(id);
            }
            joints.accept_row(unit, row, id, self.objects)?;
        }

        self.finish_joints(unit, joints)?;
        self.produce(&unit.path, roots);
        Ok(())
    }

    /// Execute one statement on behalf of `unit`
    pub(super) async fn fetch(&mut self, unit: &ResolutionUnit, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        let (sql, params) = statement.to_sql_with_params();
        debug!(node = unit.name(), sql = %sql, params = params.len(), "issuing prefetch statement");

        self.stats.statements += 1;
        let rows = self
            .executor
            .fetch_all(statement)
            .await
            .map_err(|source| OrmError::StatementExecution {
                node: unit.name().to_string(),
                statement: sql,
                source,
            })?;

        self.stats.rows += rows.len();
        Ok(rows)
    }

    /// Objects produced so far for a prefetch path
    pub(super) fn parents(&self, path: &str) -> Vec<ObjectId> {
        self.produced.get(path).cloned().unwrap_or_default()
    }

    pub(super) fn produce(&mut self, path: &str, objects: Vec<ObjectId>) {
        trace!(path, objects = objects.len(), "prefetch path produced objects");
        self.produced.insert(path.to_string(), objects);
    }

    pub(super) fn max_in_list_size(&self) -> usize {
        self.config.max_in_list_size
    }

    /// Key each parent by the columns that select its related rows
    pub(super) fn parent_keys(
        &self,
        link: &ParentLink,
        parents: &[ObjectId],
    ) -> OrmResult<Vec<(ObjectId, Option<GroupingKey>)>> {
        parents
            .iter()
            .map(|&id| {
                let object = self.objects.get(id).ok_or(OrmError::UnknownObject(id))?;
                Ok((id, object_key(object, &link.parent_entity, &link.parent_columns)))
            })
            .collect()
    }

    /// Translate rows of a disjoint unit, group them by parent key and
    /// resolve every parent. Rows whose key is not in `wanted` are dropped
    /// untranslated.
    pub(super) fn assemble(
        &mut self,
        unit: &ResolutionUnit,
        link: &ParentLink,
        parents: &[(ObjectId, Option<GroupingKey>)],
        rows: &[Row],
        wanted: Option<&HashSet<GroupingKey>>,
    ) -> OrmResult<()> {
        let mut groups: HashMap<GroupingKey, Vec<ObjectId>> = HashMap::new();
        let mut produced = Vec::new();
        let mut seen = HashSet::new();
        let mut joints = JointRows::new(unit);

        for row in rows {
            let key = match super::translator::row_key(row, &link.row_columns) {
                Some(key) => key,
                None => continue,
            };
            if wanted.map_or(false, |wanted| !wanted.contains(&key)) {
                continue;
            }

            let child = translate(row, MAIN_ALIAS, &unit.entity, self.objects)?;
            trace!(node = unit.name(), key = %key, child = %child, "grouped row");

            let group = groups.entry(key).or_default();
            if !group.contains(&child) {
                group.push(child);
            }
            if seen.insert(child) {
                produced.push(child);
            }
            joints.accept_row(unit, row, child, self.objects)?;
        }

        for (parent, key) in parents {
            let children = key
                .as_ref()
                .and_then(|key| groups.get(key))
                .cloned()
                .unwrap_or_default();
            self.resolve_holder(*parent, &link.relationship, link.cardinality, children)?;
        }

        self.finish_joints(unit, joints)?;
        self.produce(&unit.path, produced);
        Ok(())
    }

    /// Resolve every parent to an empty value without a statement
    pub(super) fn resolve_all_empty(
        &mut self,
        unit: &ResolutionUnit,
        link: &ParentLink,
        parents: &[(ObjectId, Option<GroupingKey>)],
    ) -> OrmResult<()> {
        for (parent, _) in parents {
            self.resolve_holder(*parent, &link.relationship, link.cardinality, Vec::new())?;
        }
        self.produce(&unit.path, Vec::new());
        Ok(())
    }

    /// Resolve one relationship holder. Holders resolved by an earlier pass
    /// are refreshed; resolving one twice in this pass is an error.
    pub(super) fn resolve_holder(
        &mut self,
        parent: ObjectId,
        relationship: &str,
        cardinality: Cardinality,
        children: Vec<ObjectId>,
    ) -> OrmResult<()> {
        let object = self.objects.get_mut(parent).ok_or(OrmError::UnknownObject(parent))?;
        if !self.resolved.insert((parent, relationship.to_string())) {
            return Err(already_resolved(object, relationship));
        }

        let value = match cardinality {
            Cardinality::ToMany => RelationshipValue::ToMany(children),
            Cardinality::ToOne => {
                if children.len() > 1 {
                    warn!(
                        entity = object.entity_name(),
                        key = %object.object_key(),
                        relationship,
                        matches = children.len(),
                        "to-one relationship matched several rows, keeping the first"
                    );
                }
                RelationshipValue::ToOne(children.first().copied())
            }
        };

        let holder = object.holder_mut(relationship).ok_or_else(|| {
            OrmError::configuration(format!("No relationship '{}' on object {}", relationship, parent))
        })?;
        if !holder.is_fault() {
            trace!(object = %parent, relationship, "refreshing relationship resolved by an earlier pass");
            holder.refault();
        }
        if holder.resolve_to(value).is_err() {
            return Err(already_resolved(object, relationship));
        }
        Ok(())
    }
}

fn already_resolved(object: &PersistentObject, relationship: &str) -> OrmError {
    OrmError::AlreadyResolved {
        entity: object.entity_name().to_string(),
        key: object.object_key().to_string(),
        relationship: relationship.to_string(),
    }
}
