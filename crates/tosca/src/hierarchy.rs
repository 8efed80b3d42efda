use crate::entity::EntityId;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, Default)]
struct Node {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

/// Outcome of inserting an entity into a hierarchy.
#[derive(Debug, PartialEq, Eq)]
pub enum Insert {
    Ok,
    AlreadyPresent,
    /// Insertion failed. `loop_members` are entities newly found on a
    /// `derived_from` cycle (one report each); `incomplete` are entities
    /// newly blocked behind a failed ancestor. Entities already in the
    /// `failed` set appear in neither, which caps reporting at once per
    /// offending entity even across merged imports.
    Failed {
        loop_members: Vec<EntityId>,
        incomplete: Vec<EntityId>,
    },
}

/// A tree of typed entities ordered by their `derived_from` relation.
/// Invariants: no entity appears twice, and no entity appears on its own
/// ancestor chain.
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    nodes: BTreeMap<EntityId, Node>,
    roots: Vec<EntityId>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.nodes.keys().copied()
    }

    /// Insert an entity, ensuring its ancestor chain is present first.
    /// `parent_of` maps an entity to its declared parent. `failed` records
    /// entities that can never insert (loops, incomplete ancestors).
    pub fn add(
        &mut self,
        id: EntityId,
        parent_of: &impl Fn(EntityId) -> Option<EntityId>,
        failed: &mut HashSet<EntityId>,
    ) -> Insert {
        if self.contains(id) {
            return Insert::AlreadyPresent;
        }

        // Walk the parent chain up to an anchor: an already-inserted
        // entity, a root, a failed ancestor, or a cycle.
        let mut chain: Vec<EntityId> = Vec::new();
        let mut anchor: Option<EntityId> = None;
        let mut current = id;
        loop {
            if failed.contains(&current) {
                let incomplete: Vec<EntityId> = chain
                    .iter()
                    .copied()
                    .filter(|member| failed.insert(*member))
                    .collect();
                return Insert::Failed {
                    loop_members: Vec::new(),
                    incomplete,
                };
            }
            if self.contains(current) {
                anchor = Some(current);
                break;
            }
            if let Some(position) = chain.iter().position(|member| *member == current) {
                let loop_members: Vec<EntityId> = chain[position..]
                    .iter()
                    .copied()
                    .filter(|member| failed.insert(*member))
                    .collect();
                let incomplete: Vec<EntityId> = chain[..position]
                    .iter()
                    .copied()
                    .filter(|member| failed.insert(*member))
                    .collect();
                return Insert::Failed {
                    loop_members,
                    incomplete,
                };
            }
            chain.push(current);
            match parent_of(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // Insert root-most first, attaching to the anchor when present.
        let mut parent = anchor;
        for member in chain.into_iter().rev() {
            self.nodes.insert(
                member,
                Node {
                    parent,
                    children: Vec::new(),
                },
            );
            match parent {
                Some(parent) => self
                    .nodes
                    .get_mut(&parent)
                    .expect("parent was just ensured")
                    .children
                    .push(member),
                None => self.roots.push(member),
            }
            parent = Some(member);
        }

        Insert::Ok
    }

    /// Union-merge another hierarchy under the same invariants. Returns
    /// the failures encountered, for reporting.
    pub fn merge(
        &mut self,
        other: &Hierarchy,
        parent_of: &impl Fn(EntityId) -> Option<EntityId>,
        failed: &mut HashSet<EntityId>,
    ) -> Vec<Insert> {
        let mut failures = Vec::new();
        for id in other.nodes.keys() {
            match self.add(*id, parent_of, failed) {
                Insert::Ok | Insert::AlreadyPresent => {}
                failure => failures.push(failure),
            }
        }
        failures
    }

    /// Compatibility: `base` is an ancestor of `derived`, or identical.
    pub fn is_compatible(&self, base: EntityId, derived: EntityId) -> bool {
        let mut current = Some(derived);
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Ancestor chain, self first, root last.
    pub fn lineage(&self, id: EntityId) -> Vec<EntityId> {
        let mut lineage = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            lineage.push(id);
            current = self.parent(id);
        }
        lineage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_fn(edges: Vec<(u32, u32)>) -> impl Fn(EntityId) -> Option<EntityId> {
        move |id| {
            edges
                .iter()
                .find(|(child, _)| EntityId(*child) == id)
                .map(|(_, parent)| EntityId(*parent))
        }
    }

    #[test]
    fn parent_first_insertion() {
        // 2 -> 1 -> 0 (root)
        let parents = parent_fn(vec![(2, 1), (1, 0)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();

        assert_eq!(hierarchy.add(EntityId(2), &parents, &mut failed), Insert::Ok);
        assert!(hierarchy.contains(EntityId(0)));
        assert!(hierarchy.contains(EntityId(1)));
        assert_eq!(hierarchy.parent(EntityId(2)), Some(EntityId(1)));
        assert_eq!(hierarchy.parent(EntityId(1)), Some(EntityId(0)));
        assert_eq!(hierarchy.roots(), &[EntityId(0)]);
        assert_eq!(hierarchy.children(EntityId(0)), &[EntityId(1)]);
    }

    #[test]
    fn two_cycle_reports_both_members_once() {
        let parents = parent_fn(vec![(1, 2), (2, 1)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();

        match hierarchy.add(EntityId(1), &parents, &mut failed) {
            Insert::Failed {
                loop_members,
                incomplete,
            } => {
                assert_eq!(loop_members.len(), 2);
                assert!(incomplete.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // The second member re-inserts without any fresh reports.
        match hierarchy.add(EntityId(2), &parents, &mut failed) {
            Insert::Failed {
                loop_members,
                incomplete,
            } => {
                assert!(loop_members.is_empty());
                assert!(incomplete.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!hierarchy.contains(EntityId(1)));
        assert!(!hierarchy.contains(EntityId(2)));
    }

    #[test]
    fn dependents_of_a_cycle_are_incomplete() {
        // 3 -> 2 -> 1 -> 2 ...
        let parents = parent_fn(vec![(3, 2), (2, 1), (1, 2)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();

        match hierarchy.add(EntityId(3), &parents, &mut failed) {
            Insert::Failed {
                loop_members,
                incomplete,
            } => {
                assert_eq!(loop_members, vec![EntityId(2), EntityId(1)]);
                assert_eq!(incomplete, vec![EntityId(3)]);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_detected() {
        let parents = parent_fn(vec![(1, 1)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();
        assert_eq!(
            hierarchy.add(EntityId(1), &parents, &mut failed),
            Insert::Failed {
                loop_members: vec![EntityId(1)],
                incomplete: vec![],
            }
        );
    }

    #[test]
    fn compatibility_is_ancestry() {
        let parents = parent_fn(vec![(2, 1), (1, 0), (3, 0)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();
        hierarchy.add(EntityId(2), &parents, &mut failed);
        hierarchy.add(EntityId(3), &parents, &mut failed);

        assert!(hierarchy.is_compatible(EntityId(0), EntityId(2)));
        assert!(hierarchy.is_compatible(EntityId(1), EntityId(2)));
        assert!(hierarchy.is_compatible(EntityId(2), EntityId(2)));
        assert!(!hierarchy.is_compatible(EntityId(2), EntityId(1)));
        assert!(!hierarchy.is_compatible(EntityId(1), EntityId(3)));
    }

    #[test]
    fn lineage_runs_self_to_root() {
        let parents = parent_fn(vec![(2, 1), (1, 0)]);
        let mut hierarchy = Hierarchy::new();
        let mut failed = HashSet::new();
        hierarchy.add(EntityId(2), &parents, &mut failed);
        assert_eq!(
            hierarchy.lineage(EntityId(2)),
            vec![EntityId(2), EntityId(1), EntityId(0)]
        );
    }
}
