//! Prefetch resolution: plan compilation, row translation and the
//! joint / disjoint / disjoint-by-id resolvers driven by the orchestrator

pub mod disjoint;
pub mod disjoint_by_id;
pub mod joint;
pub mod orchestrator;
pub mod plan;
pub mod translator;

#[cfg(test)]
pub(crate) mod tests;

pub use joint::JointRows;
pub use orchestrator::{PrefetchPass, PrefetchStats};
pub use plan::{compile, ExecutionPlan, JointPlan, ParentLink, ResolutionUnit, UnitKind};
