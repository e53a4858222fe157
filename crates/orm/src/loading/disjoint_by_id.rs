//! Disjoint-by-ID Resolver - one batched statement per node
//!
//! Children are selected by the keys of the parents produced one level up.
//! Key sets larger than `max_in_list_size` are split over several
//! statements; every chunk is fetched before any row is translated, so a
//! failing chunk leaves the whole node unresolved.

use std::collections::HashSet;

use super::orchestrator::PrefetchPass;
use super::plan::{ParentLink, ResolutionUnit};
use crate::error::{OrmError, OrmResult};
use crate::object::GroupingKey;
use crate::query::Predicate;

impl PrefetchPass<'_> {
    pub(super) async fn resolve_disjoint_by_id(&mut self, unit: &ResolutionUnit) -> OrmResult<()> {
        let link = parent_link(unit)?;
        let parents = self.parents(&link.parent_path);
        let keyed = self.parent_keys(link, &parents)?;

        let mut keys: Vec<&GroupingKey> = Vec::new();
        let mut seen = HashSet::new();
        for key in keyed.iter().filter_map(|(_, key)| key.as_ref()) {
            if seen.insert(key) {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            tracing::trace!(node = unit.name(), parents = parents.len(), "no parent keys, nothing to fetch");
            return self.resolve_all_empty(unit, link, &keyed);
        }

        let mut rows = Vec::new();
        for chunk in keys.chunks(self.max_in_list_size()) {
            let statement = unit.statement.restricted(Predicate::In {
                columns: link.row_columns.clone(),
                tuples: chunk.iter().map(|key| key.to_values()).collect(),
            });
            rows.extend(self.fetch(unit, &statement).await?);
        }

        self.assemble(unit, link, &keyed, &rows, None)
    }
}

pub(super) fn parent_link(unit: &ResolutionUnit) -> OrmResult<&ParentLink> {
    unit.link.as_ref().ok_or_else(|| {
        OrmError::configuration(format!("Prefetch '{}' has no parent relationship", unit.name()))
    })
}
