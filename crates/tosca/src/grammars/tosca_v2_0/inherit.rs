use crate::catalog::Catalog;
use crate::entity::{EntityId, Kind, TypeTag};
use std::collections::btree_map::Entry;

/// Merge definition maps from a parent: absent keys are inherited
/// outright, same-key differing entities are paired for definition-level
/// inheritance afterwards (outside the type locks).
macro_rules! merge_definition_maps {
    ($child:expr, $parent:expr, $pairs:expr, [$($field:ident),* $(,)?]) => {
        $(
            for (name, parent_id) in &$parent.$field {
                match $child.$field.entry(name.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(*parent_id);
                    }
                    Entry::Occupied(slot) => {
                        if *slot.get() != *parent_id {
                            $pairs.push((*slot.get(), *parent_id));
                        }
                    }
                }
            }
        )*
    };
}

/// Phase-4 executor for one entity: copy inheritable state from the
/// parent (or copy source), then run the kind's custom merge. The task
/// graph guarantees the parent finished first.
pub fn inherit_entity(catalog: &Catalog, id: EntityId) {
    let source = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::DataType(t) => t.parent.map(|parent| (parent, "type")),
        Kind::NodeType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::CapabilityType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::RelationshipType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::InterfaceType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::ArtifactType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::GroupType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::PolicyType(t) => t.common.parent.map(|parent| (parent, "type")),
        Kind::NodeTemplate(t) => t.copy.map(|copy| (copy, "copy")),
        Kind::RelationshipTemplate(t) => t.copy.map(|copy| (copy, "copy")),
        _ => None,
    });
    let Some((source, _)) = source else {
        return;
    };

    tracing::debug!(child = id.0, parent = source.0, "inheriting");

    // Same-name definition overrides, resolved after the type locks drop.
    let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();

    {
        let child_cell = catalog.arena.cell(id);
        let parent_cell = catalog.arena.cell(source);
        let parent_guard = parent_cell.read_recursive();
        let mut child_guard = child_cell.write();

        match (&mut child_guard.kind, &parent_guard.kind) {
            (Kind::DataType(child), Kind::DataType(parent)) => {
                merge_definition_maps!(child, parent, pairs, [property_definitions]);
                child.inherit(parent);
            }
            (Kind::NodeType(child), Kind::NodeType(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [
                        property_definitions,
                        attribute_definitions,
                        capability_definitions,
                        interface_definitions,
                        artifact_definitions,
                    ]
                );
                merge_keyed_list(
                    catalog,
                    &mut child.requirement_definitions,
                    &parent.requirement_definitions,
                );
            }
            (Kind::CapabilityType(child), Kind::CapabilityType(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [property_definitions, attribute_definitions]
                );
                prepend_strings(&mut child.valid_source_types, &parent.valid_source_types);
            }
            (Kind::RelationshipType(child), Kind::RelationshipType(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [
                        property_definitions,
                        attribute_definitions,
                        interface_definitions,
                    ]
                );
                prepend_strings(&mut child.valid_target_types, &parent.valid_target_types);
            }
            (Kind::InterfaceType(child), Kind::InterfaceType(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [input_definitions, operation_definitions]
                );
            }
            (Kind::ArtifactType(child), Kind::ArtifactType(parent)) => {
                merge_definition_maps!(child, parent, pairs, [property_definitions]);
                if child.mime_type.is_none() {
                    child.mime_type = parent.mime_type.clone();
                }
                prepend_strings(&mut child.file_ext, &parent.file_ext);
            }
            (Kind::GroupType(child), Kind::GroupType(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [property_definitions, attribute_definitions]
                );
                prepend_strings(&mut child.member_names, &parent.member_names);
                let mut members = parent.members.clone();
                members.append(&mut child.members);
                child.members = members;
            }
            (Kind::PolicyType(child), Kind::PolicyType(parent)) => {
                merge_definition_maps!(child, parent, pairs, [property_definitions]);
                prepend_strings(&mut child.target_names, &parent.target_names);
                let mut targets = parent.targets.clone();
                targets.append(&mut child.targets);
                child.targets = targets;
            }
            (Kind::NodeTemplate(child), Kind::NodeTemplate(parent)) => {
                if child.description.is_none() {
                    child.description = parent.description.clone();
                }
                prepend_strings(&mut child.directives, &parent.directives);
                for (key, value) in &parent.metadata {
                    child.metadata.entry(key.clone()).or_insert(value.clone());
                }
                for field in [
                    (&mut child.properties, &parent.properties),
                    (&mut child.attributes, &parent.attributes),
                    (&mut child.capabilities, &parent.capabilities),
                    (&mut child.interfaces, &parent.interfaces),
                    (&mut child.artifacts, &parent.artifacts),
                ] {
                    let (child_map, parent_map) = field;
                    for (name, id) in parent_map {
                        child_map.entry(name.clone()).or_insert(*id);
                    }
                }
                child.requirements =
                    [parent.requirements.clone(), std::mem::take(&mut child.requirements)]
                        .concat();
            }
            (Kind::RelationshipTemplate(child), Kind::RelationshipTemplate(parent)) => {
                if child.description.is_none() {
                    child.description = parent.description.clone();
                }
                for field in [
                    (&mut child.properties, &parent.properties),
                    (&mut child.attributes, &parent.attributes),
                    (&mut child.interfaces, &parent.interfaces),
                ] {
                    let (child_map, parent_map) = field;
                    for (name, id) in parent_map {
                        child_map.entry(name.clone()).or_insert(*id);
                    }
                }
            }
            _ => {}
        }
    }

    for (child_definition, parent_definition) in pairs {
        inherit_definition_pair(catalog, child_definition, parent_definition);
    }
}

/// List-of-string inheritance: parent entries prepend, preserving order.
fn prepend_strings(child: &mut Vec<String>, parent: &[String]) {
    if parent.is_empty() {
        return;
    }
    let mut merged = parent.to_vec();
    merged.append(child);
    *child = merged;
}

/// List-of-entity inheritance: prepend parent entries, skipping those
/// whose name a local entry overrides.
fn merge_keyed_list(catalog: &Catalog, child: &mut Vec<EntityId>, parent: &[EntityId]) {
    let local_names: Vec<String> = child
        .iter()
        .map(|id| catalog.arena.name_of(*id))
        .collect();
    let mut merged: Vec<EntityId> = parent
        .iter()
        .copied()
        .filter(|id| !local_names.contains(&catalog.arena.name_of(*id)))
        .collect();
    merged.append(child);
    *child = merged;
}

/// A same-name definition overriding its parent's: inherit absent fields
/// and recursively merge nested definition maps. Data-type overrides must
/// narrow, never widen.
fn inherit_definition_pair(catalog: &Catalog, child_id: EntityId, parent_id: EntityId) {
    if child_id == parent_id {
        return;
    }

    let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();
    let mut incompatible: Option<(EntityId, EntityId)> = None;

    {
        let child_cell = catalog.arena.cell(child_id);
        let parent_cell = catalog.arena.cell(parent_id);
        let parent_guard = parent_cell.read_recursive();
        let mut child_guard = child_cell.write();

        match (&mut child_guard.kind, &parent_guard.kind) {
            (Kind::AttributeDefinition(child), Kind::AttributeDefinition(parent)) => {
                if let (Some(child_type), Some(parent_type)) =
                    (child.data_type, parent.data_type)
                {
                    if !catalog.hierarchy_compatible(TypeTag::DataType, parent_type, child_type) {
                        incompatible = Some((child_type, parent_type));
                    }
                }
                if incompatible.is_none() {
                    child.inherit(parent);
                }
            }
            (Kind::PropertyDefinition(child), Kind::PropertyDefinition(parent)) => {
                if let (Some(child_type), Some(parent_type)) =
                    (child.attribute.data_type, parent.attribute.data_type)
                {
                    if !catalog.hierarchy_compatible(TypeTag::DataType, parent_type, child_type) {
                        incompatible = Some((child_type, parent_type));
                    }
                }
                if incompatible.is_none() {
                    child.inherit(parent);
                }
            }
            (Kind::ParameterDefinition(child), Kind::ParameterDefinition(parent)) => {
                child.property.inherit(&parent.property);
                if child.value.is_none() {
                    child.value = parent.value;
                }
            }
            (Kind::CapabilityDefinition(child), Kind::CapabilityDefinition(parent)) => {
                if let (Some(child_type), Some(parent_type)) =
                    (child.capability_type, parent.capability_type)
                {
                    if !catalog.hierarchy_compatible(
                        TypeTag::CapabilityType,
                        parent_type,
                        child_type,
                    ) {
                        incompatible = Some((child_type, parent_type));
                    }
                }
                if incompatible.is_none() {
                    merge_definition_maps!(
                        child,
                        parent,
                        pairs,
                        [property_definitions, attribute_definitions]
                    );
                    child.inherit(parent);
                }
            }
            (Kind::InterfaceDefinition(child), Kind::InterfaceDefinition(parent)) => {
                merge_definition_maps!(
                    child,
                    parent,
                    pairs,
                    [input_definitions, operation_definitions]
                );
                child.inherit(parent);
            }
            (Kind::OperationDefinition(child), Kind::OperationDefinition(parent)) => {
                merge_definition_maps!(child, parent, pairs, [input_definitions]);
                if child.description.is_none() {
                    child.description = parent.description.clone();
                }
                if child.implementation.is_none() {
                    child.implementation = parent.implementation.clone();
                }
            }
            _ => {}
        }
    }

    if let Some((child_type, parent_type)) = incompatible {
        let site = catalog.site_of_id(child_id);
        catalog.report(
            &site,
            "IncompatibleType",
            format!(
                "overriding type {:?} is incompatible with overridden {:?}",
                catalog.arena.name_of(child_type),
                catalog.arena.name_of(parent_type),
            ),
        );
        return;
    }

    for (child_definition, parent_definition) in pairs {
        inherit_definition_pair(catalog, child_definition, parent_definition);
    }
}
