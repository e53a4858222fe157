//! Disjoint Resolver - one unrestricted statement per node
//!
//! The related table is read without a parent key restriction. Rows whose
//! key matches no loaded parent are dropped before translation, so they
//! never enter the identity map.

use std::collections::HashSet;

use super::disjoint_by_id::parent_link;
use super::orchestrator::PrefetchPass;
use super::plan::ResolutionUnit;
use crate::error::OrmResult;

impl PrefetchPass<'_> {
    pub(super) async fn resolve_disjoint(&mut self, unit: &ResolutionUnit) -> OrmResult<()> {
        let link = parent_link(unit)?;
        let parents = self.parents(&link.parent_path);
        let keyed = self.parent_keys(link, &parents)?;

        let wanted: HashSet<_> = keyed.iter().filter_map(|(_, key)| key.clone()).collect();
        if wanted.is_empty() {
            return self.resolve_all_empty(unit, link, &keyed);
        }

        let rows = self.fetch(unit, &unit.statement).await?;
        self.assemble(unit, link, &keyed, &rows, Some(&wanted))
    }
}
