use crate::entity::{EntityId, TypeTag};
use std::collections::BTreeMap;

/// How names change when an imported file's namespace merges into its
/// container's namespace.
#[derive(Clone, Debug, Default)]
pub enum NameTransformer {
    #[default]
    Identity,
    /// Prefix every merged name with `<alias>--`. Lookups split on the
    /// first `--`, so aliases must not contain `--` while names may.
    Prefix(String),
}

impl NameTransformer {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameTransformer::Identity => name.to_string(),
            NameTransformer::Prefix(alias) => format!("{alias}--{name}"),
        }
    }
}

/// `(type tag, name) → entity` for one file, after merging its imports.
/// Types are first-class: the same simple name can exist for a data type
/// and a node type without collision.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    map: BTreeMap<(TypeTag, String), EntityId>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn lookup(&self, tag: TypeTag, name: &str) -> Option<EntityId> {
        self.map.get(&(tag, name.to_string())).copied()
    }

    /// Bind a name. When the name is already bound to a *different* entity
    /// of the same tag, the existing binding wins and is returned so the
    /// caller can report the ambiguity; rebinding the same entity is fine.
    pub fn set(&mut self, tag: TypeTag, name: String, id: EntityId) -> Option<EntityId> {
        match self.map.get(&(tag, name.clone())) {
            Some(existing) if *existing != id => Some(*existing),
            Some(_) => None,
            None => {
                self.map.insert((tag, name), id);
                None
            }
        }
    }

    /// Merge another namespace into this one under a name transformer,
    /// returning the ambiguities encountered.
    pub fn merge(
        &mut self,
        other: &Namespace,
        transformer: &NameTransformer,
    ) -> Vec<(TypeTag, String, EntityId, EntityId)> {
        let mut ambiguities = Vec::new();
        for ((tag, name), id) in &other.map {
            let name = transformer.apply(name);
            if let Some(existing) = self.set(*tag, name.clone(), *id) {
                ambiguities.push((*tag, name, *id, existing));
            }
        }
        ambiguities
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeTag, &str, EntityId)> {
        self.map
            .iter()
            .map(|((tag, name), id)| (*tag, name.as_str(), *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_different_tags_do_not_collide() {
        let mut namespace = Namespace::new();
        assert!(namespace
            .set(TypeTag::DataType, "T".to_string(), EntityId(1))
            .is_none());
        assert!(namespace
            .set(TypeTag::NodeType, "T".to_string(), EntityId(2))
            .is_none());
        assert_eq!(
            namespace.lookup(TypeTag::DataType, "T"),
            Some(EntityId(1))
        );
        assert_eq!(namespace.lookup(TypeTag::NodeType, "T"), Some(EntityId(2)));
    }

    #[test]
    fn rebinding_a_different_entity_is_ambiguous() {
        let mut namespace = Namespace::new();
        namespace.set(TypeTag::NodeType, "N".to_string(), EntityId(1));
        assert_eq!(
            namespace.set(TypeTag::NodeType, "N".to_string(), EntityId(2)),
            Some(EntityId(1))
        );
        // The same entity again is not ambiguous.
        assert!(namespace
            .set(TypeTag::NodeType, "N".to_string(), EntityId(1))
            .is_none());
    }

    #[test]
    fn merge_applies_prefix_transformer() {
        let mut imported = Namespace::new();
        imported.set(TypeTag::NodeType, "N".to_string(), EntityId(7));

        let mut namespace = Namespace::new();
        let ambiguities = namespace.merge(
            &imported,
            &NameTransformer::Prefix("lib".to_string()),
        );
        assert!(ambiguities.is_empty());
        assert_eq!(
            namespace.lookup(TypeTag::NodeType, "lib--N"),
            Some(EntityId(7))
        );
        assert_eq!(namespace.lookup(TypeTag::NodeType, "N"), None);
    }
}
