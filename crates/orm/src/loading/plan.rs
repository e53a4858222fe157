//! Execution Plans - prefetch trees compiled into resolution units
//!
//! A resolution unit is one statement: the root query or a non-joint
//! prefetch node, with every joint node beneath it folded in as outer joins.
//! Units are listed in depth-first order, so the objects a unit needs as
//! parents are always produced by an earlier unit.

use std::sync::Arc;

use crate::config::PrefetchConfig;
use crate::error::{OrmError, OrmResult, ROOT_NODE};
use crate::model::{Cardinality, EntityDescriptor, EntityModel, RelationshipDescriptor};
use crate::query::select::property_column;
use crate::query::{
    ColumnRef, JoinType, PrefetchNode, PrefetchSemantics, SelectQuery, SelectStatement, TableRef,
};

/// Alias of the main table of every unit statement
pub const MAIN_ALIAS: &str = "t0";

/// Strategy of a resolution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Root,
    DisjointById,
    Disjoint,
}

/// Joint node folded into a unit statement
#[derive(Debug, Clone)]
pub struct JointPlan {
    pub path: String,
    pub relationship: String,
    pub cardinality: Cardinality,
    /// Alias of the parent entity's table in the unit statement
    pub parent_alias: String,
    /// Alias of the related entity's table
    pub alias: String,
    pub entity: Arc<EntityDescriptor>,
}

/// How the rows of a unit are matched to already loaded parents
#[derive(Debug, Clone)]
pub struct ParentLink {
    pub parent_path: String,
    pub parent_entity: Arc<EntityDescriptor>,
    pub relationship: String,
    pub cardinality: Cardinality,
    /// Columns of the parent's table that select the related rows
    pub parent_columns: Vec<String>,
    /// The same key as it appears in the unit's rows
    pub row_columns: Vec<ColumnRef>,
}

/// One statement of a prefetch pass
#[derive(Debug, Clone)]
pub struct ResolutionUnit {
    pub path: String,
    pub kind: UnitKind,
    /// Entity stored under [`MAIN_ALIAS`]
    pub entity: Arc<EntityDescriptor>,
    /// Statement before any parent key restriction
    pub statement: SelectStatement,
    /// Absent for the root unit
    pub link: Option<ParentLink>,
    /// Joint nodes in depth-first order
    pub joints: Vec<JointPlan>,
    next_alias: usize,
}

impl ResolutionUnit {
    fn new(path: &str, kind: UnitKind, entity: Arc<EntityDescriptor>) -> Self {
        let from = TableRef::new(entity.table(), MAIN_ALIAS);
        let mut statement = SelectStatement::new(from.clone());
        statement.project(&from, entity.columns().iter().map(String::as_str));

        Self {
            path: path.to_string(),
            kind,
            entity,
            statement,
            link: None,
            joints: Vec::new(),
            next_alias: 1,
        }
    }

    /// Node name used in diagnostics
    pub fn name(&self) -> &str {
        if self.path.is_empty() {
            ROOT_NODE
        } else {
            &self.path
        }
    }

    fn allocate_alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }
}

/// Ordered resolution units of one prefetch pass
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    units: Vec<ResolutionUnit>,
}

impl ExecutionPlan {
    pub fn units(&self) -> &[ResolutionUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Plan for loading one relationship of objects that are already
    /// registered under the root path
    pub fn for_relationship(model: &EntityModel, entity: &str, relationship: &str) -> OrmResult<Self> {
        let parent = model.require_entity(entity)?;
        let (rel, target) = model.relationship(entity, relationship)?;
        let unit = related_unit(UnitKind::DisjointById, relationship, "", parent, rel, target)?;
        Ok(Self { units: vec![unit] })
    }
}

/// Compile a query and its prefetch tree.
///
/// Every node is checked against the model, including nodes that are not
/// loaded, so configuration problems surface before any statement runs.
pub fn compile(model: &EntityModel, query: &SelectQuery, config: &PrefetchConfig) -> OrmResult<ExecutionPlan> {
    config.validate()?;
    let entity = model.require_entity(query.entity())?;

    let mut root = ResolutionUnit::new("", UnitKind::Root, entity.clone());
    if let Some(qualifier) = query.qualifier_expression() {
        root.statement.restrict(qualifier.to_predicate(entity, MAIN_ALIAS)?);
    }
    for (property, order) in query.orderings() {
        let column = property_column(entity, MAIN_ALIAS, property)?;
        root.statement.order_by.push((column, (*order).into()));
    }

    let mut compiler = Compiler {
        model,
        config,
        units: vec![root],
    };
    compiler.plan_children(query.prefetch_tree().root(), entity, MAIN_ALIAS, 0)?;

    tracing::trace!(
        entity = query.entity(),
        units = compiler.units.len(),
        "compiled prefetch plan"
    );
    Ok(ExecutionPlan {
        units: compiler.units,
    })
}

struct Compiler<'a> {
    model: &'a EntityModel,
    config: &'a PrefetchConfig,
    units: Vec<ResolutionUnit>,
}

impl<'a> Compiler<'a> {
    fn plan_children(
        &mut self,
        node: &PrefetchNode,
        entity: &Arc<EntityDescriptor>,
        alias: &str,
        unit: usize,
    ) -> OrmResult<()> {
        let model = self.model;
        for child in node.children() {
            self.check_depth(child)?;
            let (rel, target) = model.relationship(entity.name(), child.name())?;

            match child.semantics() {
                PrefetchSemantics::None => self.check_subtree(child, target)?,
                PrefetchSemantics::Joint => {
                    let child_alias = add_joint(&mut self.units[unit], child.path(), alias, entity, rel, target);
                    self.plan_children(child, target, &child_alias, unit)?;
                }
                PrefetchSemantics::DisjointById | PrefetchSemantics::Disjoint => {
                    let kind = if child.semantics() == PrefetchSemantics::DisjointById {
                        UnitKind::DisjointById
                    } else {
                        UnitKind::Disjoint
                    };
                    let related = related_unit(kind, child.path(), node.path(), entity, rel, target)?;
                    self.units.push(related);
                    let index = self.units.len() - 1;
                    self.plan_children(child, target, MAIN_ALIAS, index)?;
                }
            }
        }
        Ok(())
    }

    /// Validate a subtree that is not loaded
    fn check_subtree(&self, node: &PrefetchNode, entity: &Arc<EntityDescriptor>) -> OrmResult<()> {
        for child in node.children() {
            self.check_depth(child)?;
            let (_, target) = self.model.relationship(entity.name(), child.name())?;
            self.check_subtree(child, target)?;
        }
        Ok(())
    }

    fn check_depth(&self, node: &PrefetchNode) -> OrmResult<()> {
        if node.depth() > self.config.max_depth {
            return Err(OrmError::configuration(format!(
                "Prefetch '{}' is {} levels deep, the limit is {}",
                node.path(),
                node.depth(),
                self.config.max_depth
            )));
        }
        Ok(())
    }
}

/// Unit statement selecting the related entity and the key that links each
/// row to its parent. Intermediate tables are inner-joined walking back from
/// the related table, so for flattened relationships the key comes from the
/// intermediate table rather than the related table.
fn related_unit(
    kind: UnitKind,
    path: &str,
    parent_path: &str,
    parent: &Arc<EntityDescriptor>,
    rel: &RelationshipDescriptor,
    target: &Arc<EntityDescriptor>,
) -> OrmResult<ResolutionUnit> {
    let first = rel.path.first().ok_or_else(|| {
        OrmError::Mapping(format!("Relationship '{}' has no join steps", rel.name))
    })?;

    let mut unit = ResolutionUnit::new(path, kind, target.clone());
    let mut current = unit.statement.from.clone();
    for step in rel.path.iter().skip(1).rev() {
        let table = TableRef::new(step.source_table.clone(), unit.allocate_alias());
        let on = step
            .columns
            .iter()
            .map(|(source_column, target_column)| {
                (table.column(source_column.as_str()), current.column(target_column.as_str()))
            })
            .collect();
        unit.statement.join(JoinType::Inner, table.clone(), on);
        current = table;
    }

    let row_columns: Vec<ColumnRef> = first.target_columns().map(|column| current.column(column)).collect();
    unit.statement.project(&current, first.target_columns());

    unit.link = Some(ParentLink {
        parent_path: parent_path.to_string(),
        parent_entity: parent.clone(),
        relationship: rel.name.clone(),
        cardinality: rel.cardinality,
        parent_columns: first.source_columns().map(str::to_string).collect(),
        row_columns,
    });
    Ok(unit)
}

/// Outer-join the related tables onto `parent_alias`; returns the alias of
/// the related entity's table
fn add_joint(
    unit: &mut ResolutionUnit,
    path: &str,
    parent_alias: &str,
    parent: &EntityDescriptor,
    rel: &RelationshipDescriptor,
    target: &Arc<EntityDescriptor>,
) -> String {
    let mut current = TableRef::new(parent.table(), parent_alias);
    for step in &rel.path {
        let table = TableRef::new(step.target_table.clone(), unit.allocate_alias());
        let on = step
            .columns
            .iter()
            .map(|(source_column, target_column)| {
                (table.column(target_column.as_str()), current.column(source_column.as_str()))
            })
            .collect();
        unit.statement.join(JoinType::Left, table.clone(), on);
        current = table;
    }
    unit.statement.project(&current, target.columns().iter().map(String::as_str));

    unit.joints.push(JointPlan {
        path: path.to_string(),
        relationship: rel.name.clone(),
        cardinality: rel.cardinality,
        parent_alias: parent_alias.to_string(),
        alias: current.alias.clone(),
        entity: target.clone(),
    });
    current.alias
}
