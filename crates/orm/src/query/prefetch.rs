//! Prefetch Tree - which relationship paths to load eagerly, and how
//!
//! Paths are dotted relationship names relative to the root entity
//! (`boxes.balls`). Each node carries its own [`PrefetchSemantics`].
//! Intermediate segments that were never added explicitly take the
//! semantics of the node added beneath them.

use std::fmt;

use crate::error::{OrmError, OrmResult};

/// How a prefetch node is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefetchSemantics {
    /// One unrestricted statement for the whole related table
    Disjoint,
    /// One statement restricted to the keys of the already loaded parents
    DisjointById,
    /// Folded into the parent's statement through an outer join
    Joint,
    /// Not loaded; relationship holders stay faults
    None,
}

impl PrefetchSemantics {
    pub fn is_loaded(self) -> bool {
        !matches!(self, PrefetchSemantics::None)
    }
}

impl fmt::Display for PrefetchSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrefetchSemantics::Disjoint => "disjoint",
            PrefetchSemantics::DisjointById => "disjoint-by-id",
            PrefetchSemantics::Joint => "joint",
            PrefetchSemantics::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// One relationship segment of a prefetch path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchNode {
    name: String,
    path: String,
    semantics: PrefetchSemantics,
    explicit: bool,
    children: Vec<PrefetchNode>,
}

impl PrefetchNode {
    fn new(name: &str, path: String, semantics: PrefetchSemantics, explicit: bool) -> Self {
        Self {
            name: name.to_string(),
            path,
            semantics,
            explicit,
            children: Vec::new(),
        }
    }

    /// Relationship name of this segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full dotted path from the root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn semantics(&self) -> PrefetchSemantics {
        self.semantics
    }

    /// Whether this node was added by path rather than created as an
    /// intermediate segment
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn children(&self) -> &[PrefetchNode] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&PrefetchNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Number of segments in this node's path
    pub fn depth(&self) -> usize {
        if self.path.is_empty() {
            0
        } else {
            self.path.split('.').count()
        }
    }

    fn has_loaded_descendant(&self) -> bool {
        self.children
            .iter()
            .any(|child| child.semantics.is_loaded() || child.has_loaded_descendant())
    }
}

/// Ordered tree of prefetch nodes under an unnamed root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchTree {
    root: PrefetchNode,
}

impl Default for PrefetchTree {
    fn default() -> Self {
        Self {
            root: PrefetchNode::new("", String::new(), PrefetchSemantics::None, false),
        }
    }
}

impl PrefetchTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` with `semantics` and return its node.
    ///
    /// Re-adding a path replaces its semantics. Fails without changing the
    /// tree when the path is malformed or when a loaded node would end up
    /// beneath an explicit `None` node.
    pub fn add_path(&mut self, path: &str, semantics: PrefetchSemantics) -> OrmResult<&PrefetchNode> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if path.trim().is_empty() || segments.iter().any(|segment| segment.is_empty()) {
            return Err(OrmError::configuration(format!(
                "Invalid prefetch path '{}'",
                path
            )));
        }

        self.check_conflicts(path, &segments, semantics)?;

        let mut node = &mut self.root;
        let last = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            let child_path = if node.path.is_empty() {
                segment.to_string()
            } else {
                format!("{}.{}", node.path, segment)
            };

            let position = match node.children.iter().position(|child| child.name == *segment) {
                Some(position) => position,
                None => {
                    node.children.push(PrefetchNode::new(
                        segment,
                        child_path,
                        semantics,
                        index == last,
                    ));
                    node.children.len() - 1
                }
            };
            let child = &mut node.children[position];

            if index == last {
                child.semantics = semantics;
                child.explicit = true;
            } else if !child.explicit && !child.semantics.is_loaded() && semantics.is_loaded() {
                // Implicit parents of a loaded node get loaded too
                child.semantics = semantics;
            }
            node = child;
        }

        Ok(node)
    }

    fn check_conflicts(&self, path: &str, segments: &[&str], semantics: PrefetchSemantics) -> OrmResult<()> {
        let mut node = &self.root;
        for (index, segment) in segments.iter().enumerate() {
            let child = match node.child(segment) {
                Some(child) => child,
                None => return Ok(()),
            };
            let is_last = index + 1 == segments.len();

            if !is_last && semantics.is_loaded() && child.explicit && !child.semantics.is_loaded() {
                return Err(OrmError::configuration(format!(
                    "Prefetch '{}' ({}) is beneath '{}', which is not loaded",
                    path,
                    semantics,
                    child.path
                )));
            }

            if is_last && !semantics.is_loaded() && child.has_loaded_descendant() {
                return Err(OrmError::configuration(format!(
                    "Prefetch '{}' cannot be disabled while paths beneath it are loaded",
                    path
                )));
            }
            node = child;
        }
        Ok(())
    }

    /// Root pseudo-node; its children are the first path segments
    pub fn root(&self) -> &PrefetchNode {
        &self.root
    }

    pub fn children(&self) -> &[PrefetchNode] {
        &self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Node registered for a dotted path
    pub fn node(&self, path: &str) -> Option<&PrefetchNode> {
        path.split('.')
            .try_fold(&self.root, |node, segment| node.child(segment.trim()))
            .filter(|node| !node.path.is_empty())
    }

    /// Pre-order walk over every node except the root. Each call starts a
    /// fresh walk.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self.root.children.iter().rev().collect(),
        }
    }
}

/// Pre-order iterator over prefetch nodes
#[derive(Debug, Clone)]
pub struct DepthFirst<'a> {
    stack: Vec<&'a PrefetchNode>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a PrefetchNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
