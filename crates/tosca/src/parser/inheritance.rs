//! Phase 4: dependency-ordered inheritance. Entities form a task graph
//! whose edges are (a) the declared parent or copy source and (b)
//! transitive containment; ready waves execute on the worker pool, with
//! per-entity locks serializing the actual mutation.

use crate::catalog::Catalog;
use crate::dispatch;
use crate::entity::EntityId;
use crate::grammars::tosca_v2_0::inherit_entity;
use rayon::prelude::*;
use std::collections::HashMap;

pub fn inherit_all(catalog: &Catalog) {
    let ids = catalog.arena.ids();
    let index: HashMap<EntityId, usize> = ids
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();

    // Dependencies: the parent (or copy source) plus contained children,
    // which must finish before their container merges them.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    let mut blocked_on: Vec<usize> = vec![0; ids.len()];

    for (position, id) in ids.iter().enumerate() {
        let dependencies = catalog.arena.with(*id, |entity| {
            let mut dependencies = dispatch::contained_children(&entity.kind);
            if let Some(parent) = dispatch::parent_of(&entity.kind) {
                dependencies.push(parent);
            }
            dependencies
        });
        for dependency in dependencies {
            if let Some(dependency) = index.get(&dependency) {
                if *dependency != position {
                    dependents[*dependency].push(position);
                    blocked_on[position] += 1;
                }
            }
        }
    }

    let mut ready: Vec<usize> = (0..ids.len())
        .filter(|position| blocked_on[*position] == 0)
        .collect();
    let mut completed = 0usize;

    while !ready.is_empty() {
        tracing::debug!(tasks = ready.len(), "inheritance wave");

        ready
            .par_iter()
            .for_each(|position| inherit_entity(catalog, ids[*position]));
        completed += ready.len();

        let mut next = Vec::new();
        for position in ready {
            for dependent in &dependents[position] {
                blocked_on[*dependent] -= 1;
                if blocked_on[*dependent] == 0 {
                    next.push(*dependent);
                }
            }
        }
        ready = next;
    }

    // A cyclic remainder can only arise from problems phase 3 already
    // reported; those entities are skipped rather than deadlocked on.
    if completed < ids.len() {
        tracing::debug!(
            skipped = ids.len() - completed,
            "entities skipped by the inheritance scheduler"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, File};
    use crate::quirks::Quirks;
    use std::sync::Arc;

    #[test]
    fn empty_catalog_schedules_nothing() {
        let catalog = Catalog::new(Arc::new(resources::UrlContext::new()), Quirks::default());
        catalog.add_file(File::new(url::Url::parse("internal:/x.yaml").unwrap()));
        inherit_all(&catalog);
    }
}
