//! Joint Resolver - children that arrived in their parent's own rows
//!
//! A joint node contributes outer-joined columns to its unit's statement.
//! While the unit walks its rows, [`JointRows`] records for each joint node
//! which children every parent had, in row order. A parent seen without a
//! child still gets an (empty) entry. Holders are resolved once, after the
//! last row.

use std::collections::{HashMap, HashSet};

use super::orchestrator::PrefetchPass;
use super::plan::{ResolutionUnit, MAIN_ALIAS};
use super::translator::translate_optional;
use crate::backends::Row;
use crate::error::OrmResult;
use crate::object::{IdentityMap, ObjectId};

#[derive(Debug, Default)]
struct ParentChildren {
    parents: Vec<ObjectId>,
    children: HashMap<ObjectId, Vec<ObjectId>>,
}

impl ParentChildren {
    fn add(&mut self, parent: ObjectId, child: Option<ObjectId>) {
        let parents = &mut self.parents;
        let children = self.children.entry(parent).or_insert_with(|| {
            parents.push(parent);
            Vec::new()
        });
        if let Some(child) = child {
            if !children.contains(&child) {
                children.push(child);
            }
        }
    }
}

/// Children collected per parent, one slot per joint node of a unit
#[derive(Debug)]
pub struct JointRows {
    nodes: Vec<ParentChildren>,
}

impl JointRows {
    pub fn new(unit: &ResolutionUnit) -> Self {
        Self {
            nodes: unit.joints.iter().map(|_| ParentChildren::default()).collect(),
        }
    }

    /// Record the joint side of one row whose main object is `main`
    pub fn accept_row(
        &mut self,
        unit: &ResolutionUnit,
        row: &Row,
        main: ObjectId,
        objects: &mut IdentityMap,
    ) -> OrmResult<()> {
        if unit.joints.is_empty() {
            return Ok(());
        }

        let mut located: Vec<(&str, Option<ObjectId>)> = vec![(MAIN_ALIAS, Some(main))];
        for (joint, node) in unit.joints.iter().zip(self.nodes.iter_mut()) {
            let parent = located
                .iter()
                .find(|(alias, _)| *alias == joint.parent_alias)
                .and_then(|(_, id)| *id);

            let child = match parent {
                Some(parent) => {
                    let child = translate_optional(row, &joint.alias, &joint.entity, objects)?;
                    node.add(parent, child);
                    child
                }
                None => None,
            };
            located.push((joint.alias.as_str(), child));
        }
        Ok(())
    }
}

impl PrefetchPass<'_> {
    /// Resolve every parent recorded for the joint nodes of `unit`
    pub(super) fn finish_joints(&mut self, unit: &ResolutionUnit, rows: JointRows) -> OrmResult<()> {
        for (joint, mut node) in unit.joints.iter().zip(rows.nodes) {
            let mut produced = Vec::new();
            let mut seen = HashSet::new();

            for parent in &node.parents {
                let children = node.children.remove(parent).unwrap_or_default();
                produced.extend(children.iter().copied().filter(|child| seen.insert(*child)));
                self.resolve_holder(*parent, &joint.relationship, joint.cardinality, children)?;
            }

            tracing::trace!(
                node = joint.path.as_str(),
                parents = node.parents.len(),
                children = produced.len(),
                "resolved joint prefetch"
            );
            self.produce(&joint.path, produced);
        }
        Ok(())
    }
}
