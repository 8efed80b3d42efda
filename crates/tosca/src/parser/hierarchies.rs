//! Phase 3: insert every typed entity into its tag's hierarchy,
//! parent-first, reporting inheritance loops once per offending type.

use super::namespaces::ordered_entities;
use crate::catalog::Catalog;
use crate::dispatch;
use crate::entity::{EntityId, TypeTag};
use crate::hierarchy::{Hierarchy, Insert};
use std::collections::{BTreeMap, HashSet};

pub fn build_hierarchies(catalog: &Catalog) {
    let mut hierarchies: BTreeMap<TypeTag, Hierarchy> = BTreeMap::new();
    let mut failed: HashSet<EntityId> = HashSet::new();

    let parent_of = |id: EntityId| {
        catalog
            .arena
            .with(id, |entity| dispatch::parent_of(&entity.kind))
    };

    for id in ordered_entities(catalog) {
        let tag = catalog
            .arena
            .with(id, |entity| dispatch::hierarchy_tag(&entity.kind));
        let Some(tag) = tag else {
            continue;
        };

        let hierarchy = hierarchies.entry(tag).or_default();
        match hierarchy.add(id, &parent_of, &mut failed) {
            Insert::Ok | Insert::AlreadyPresent => {}
            Insert::Failed {
                loop_members,
                incomplete,
            } => {
                for member in loop_members {
                    let site = catalog.site_of_id(member);
                    catalog.report(
                        &site,
                        "InheritanceLoop",
                        format!(
                            "inheritance loop at {}: {:?}",
                            tag,
                            catalog.arena.name_of(member)
                        ),
                    );
                }
                for member in incomplete {
                    let site = catalog.site_of_id(member);
                    catalog.report(
                        &site,
                        "TypeIncomplete",
                        format!(
                            "{} has an incomplete parent: {:?}",
                            tag,
                            catalog.arena.name_of(member)
                        ),
                    );
                }
            }
        }
    }

    *catalog.hierarchies.write() = hierarchies;
}
