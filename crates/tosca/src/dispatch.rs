//! Per-kind dispatch: containment traversal, namespace registration,
//! hierarchy participation, and the name-lookup pass. The capability
//! predicates of the entity model live here as matches over `Kind`.

use crate::catalog::Catalog;
use crate::entity::{EntityId, Kind, TypeTag};
use crate::grammars::tosca_v2_0::METADATA_NORMATIVE;
use std::collections::BTreeMap;

fn collect(maps: &[&BTreeMap<String, EntityId>], lists: &[&Vec<EntityId>]) -> Vec<EntityId> {
    let mut children = Vec::new();
    for map in maps {
        children.extend(map.values().copied());
    }
    for list in lists {
        children.extend(list.iter().copied());
    }
    children
}

/// Entities contained in maps or lists of this entity. These are the
/// transitive-containment edges of the inheritance task graph.
pub fn contained_children(kind: &Kind) -> Vec<EntityId> {
    match kind {
        Kind::File(f) => collect(
            &[
                &f.repositories,
                &f.data_types,
                &f.artifact_types,
                &f.capability_types,
                &f.interface_types,
                &f.relationship_types,
                &f.node_types,
                &f.group_types,
                &f.policy_types,
            ],
            &[&f.imports],
        ),
        Kind::TopologyTemplate(t) => collect(
            &[
                &t.input_definitions,
                &t.output_definitions,
                &t.node_templates,
                &t.relationship_templates,
                &t.groups,
                &t.workflows,
            ],
            &[&t.policies],
        ),
        Kind::DataType(t) => collect(&[&t.property_definitions], &[]),
        Kind::NodeType(t) => collect(
            &[
                &t.property_definitions,
                &t.attribute_definitions,
                &t.capability_definitions,
                &t.interface_definitions,
                &t.artifact_definitions,
            ],
            &[&t.requirement_definitions],
        ),
        Kind::CapabilityType(t) => collect(
            &[&t.property_definitions, &t.attribute_definitions],
            &[],
        ),
        Kind::RelationshipType(t) => collect(
            &[
                &t.property_definitions,
                &t.attribute_definitions,
                &t.interface_definitions,
            ],
            &[],
        ),
        Kind::InterfaceType(t) => collect(
            &[&t.input_definitions, &t.operation_definitions],
            &[],
        ),
        Kind::ArtifactType(t) => collect(&[&t.property_definitions], &[]),
        Kind::GroupType(t) => collect(
            &[&t.property_definitions, &t.attribute_definitions],
            &[],
        ),
        Kind::PolicyType(t) => collect(&[&t.property_definitions], &[]),
        Kind::CapabilityDefinition(d) => collect(
            &[&d.property_definitions, &d.attribute_definitions],
            &[],
        ),
        Kind::RelationshipDefinition(d) => collect(&[&d.interface_definitions], &[]),
        Kind::InterfaceDefinition(d) => collect(
            &[&d.input_definitions, &d.operation_definitions],
            &[],
        ),
        Kind::OperationDefinition(d) => collect(&[&d.input_definitions], &[]),
        Kind::NodeTemplate(t) => collect(
            &[
                &t.properties,
                &t.attributes,
                &t.capabilities,
                &t.interfaces,
                &t.artifacts,
            ],
            &[&t.requirements],
        ),
        Kind::RelationshipTemplate(t) => collect(
            &[&t.properties, &t.attributes, &t.interfaces],
            &[],
        ),
        Kind::RelationshipAssignment(a) => collect(&[&a.properties, &a.interfaces], &[]),
        Kind::InterfaceAssignment(a) => collect(&[&a.inputs, &a.operations], &[]),
        Kind::OperationAssignment(a) => collect(&[&a.inputs], &[]),
        Kind::CapabilityAssignment(a) => collect(&[&a.properties, &a.attributes], &[]),
        Kind::Artifact(a) => collect(&[&a.properties], &[]),
        Kind::Group(g) => collect(&[&g.properties], &[]),
        Kind::Policy(p) => collect(&[&p.properties], &[]),
        Kind::Workflow(w) => collect(&[&w.input_definitions, &w.steps], &[]),
        Kind::HotTemplate(t) => collect(&[&t.parameters, &t.resources, &t.outputs], &[]),
        Kind::HotResource(r) => collect(&[&r.properties], &[]),
        _ => Vec::new(),
    }
}

/// Which namespace slot (if any) this entity's name registers under.
pub fn namespace_tag(kind: &Kind) -> Option<TypeTag> {
    Some(match kind {
        Kind::DataType(_) => TypeTag::DataType,
        Kind::NodeType(_) => TypeTag::NodeType,
        Kind::CapabilityType(_) => TypeTag::CapabilityType,
        Kind::RelationshipType(_) => TypeTag::RelationshipType,
        Kind::InterfaceType(_) => TypeTag::InterfaceType,
        Kind::ArtifactType(_) => TypeTag::ArtifactType,
        Kind::GroupType(_) => TypeTag::GroupType,
        Kind::PolicyType(_) => TypeTag::PolicyType,
        Kind::NodeTemplate(_) => TypeTag::NodeTemplate,
        Kind::RelationshipTemplate(_) => TypeTag::RelationshipTemplate,
        Kind::Group(_) => TypeTag::Group,
        Kind::Policy(_) => TypeTag::Policy,
        Kind::Repository(_) => TypeTag::Repository,
        Kind::Workflow(_) => TypeTag::Workflow,
        Kind::HotResource(_) => TypeTag::HotResource,
        _ => return None,
    })
}

/// Type-level metadata, for normative filtering and scriptlet embedding.
pub fn metadata_of(kind: &Kind) -> Option<&BTreeMap<String, String>> {
    match kind {
        Kind::File(f) => Some(&f.metadata),
        Kind::DataType(t) => Some(&t.metadata),
        Kind::NodeType(t) => Some(&t.common.metadata),
        Kind::CapabilityType(t) => Some(&t.common.metadata),
        Kind::RelationshipType(t) => Some(&t.common.metadata),
        Kind::InterfaceType(t) => Some(&t.common.metadata),
        Kind::ArtifactType(t) => Some(&t.common.metadata),
        Kind::GroupType(t) => Some(&t.common.metadata),
        Kind::PolicyType(t) => Some(&t.common.metadata),
        _ => None,
    }
}

pub fn is_normative(kind: &Kind) -> bool {
    metadata_of(kind)
        .and_then(|metadata| metadata.get(METADATA_NORMATIVE))
        .map(|value| value == "true")
        .unwrap_or(false)
}

/// Hierarchy participation: the tag of the tree this entity belongs to.
pub fn hierarchy_tag(kind: &Kind) -> Option<TypeTag> {
    match kind {
        Kind::DataType(_)
        | Kind::NodeType(_)
        | Kind::CapabilityType(_)
        | Kind::RelationshipType(_)
        | Kind::InterfaceType(_)
        | Kind::ArtifactType(_)
        | Kind::GroupType(_)
        | Kind::PolicyType(_) => namespace_tag(kind),
        _ => None,
    }
}

/// Declared parent (for types) or copy source (for templates).
pub fn parent_of(kind: &Kind) -> Option<EntityId> {
    match kind {
        Kind::DataType(t) => t.parent,
        Kind::NodeType(t) => t.common.parent,
        Kind::CapabilityType(t) => t.common.parent,
        Kind::RelationshipType(t) => t.common.parent,
        Kind::InterfaceType(t) => t.common.parent,
        Kind::ArtifactType(t) => t.common.parent,
        Kind::GroupType(t) => t.common.parent,
        Kind::PolicyType(t) => t.common.parent,
        Kind::NodeTemplate(t) => t.copy,
        Kind::RelationshipTemplate(t) => t.copy,
        _ => None,
    }
}

/// The phase-2 lookup pass for one entity: resolve every referenced name
/// in the entity's namespace and fill the target handle, reporting
/// unknown names.
pub fn lookup_entity(catalog: &Catalog, id: EntityId) {
    enum Resolve {
        /// (tag, name) resolved into a setter index.
        One(TypeTag, String, u8),
        /// Try several tags in order; first match wins.
        Alternatives(Vec<TypeTag>, String, u8),
        /// A list of names resolved into a list slot.
        Many(Vec<TypeTag>, Vec<String>, u8),
    }

    let meta = catalog.arena.meta_of(id);
    let mut resolves: Vec<Resolve> = Vec::new();
    let mut repository_to_resolve: Option<String> = None;

    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::Import(import) => {
            if let Some(name) = &import.repository_name {
                resolves.push(Resolve::One(TypeTag::Repository, name.clone(), 0));
            }
        }
        Kind::Repository(repository) => {
            repository_to_resolve = repository.url.clone();
        }
        Kind::Schema(schema) => {
            if let Some(name) = &schema.type_name {
                resolves.push(Resolve::One(TypeTag::DataType, name.clone(), 0));
            }
        }
        Kind::AttributeDefinition(definition) => {
            if let Some(name) = &definition.type_name {
                resolves.push(Resolve::One(TypeTag::DataType, name.clone(), 0));
            }
        }
        Kind::PropertyDefinition(definition) => {
            if let Some(name) = &definition.attribute.type_name {
                resolves.push(Resolve::One(TypeTag::DataType, name.clone(), 0));
            }
        }
        Kind::ParameterDefinition(definition) => {
            if let Some(name) = &definition.property.attribute.type_name {
                resolves.push(Resolve::One(TypeTag::DataType, name.clone(), 0));
            }
        }
        Kind::CapabilityDefinition(definition) => {
            if let Some(name) = &definition.type_name {
                resolves.push(Resolve::One(TypeTag::CapabilityType, name.clone(), 0));
            }
        }
        Kind::RequirementDefinition(definition) => {
            if let Some(name) = &definition.capability_type_name {
                resolves.push(Resolve::One(TypeTag::CapabilityType, name.clone(), 0));
            }
            if let Some(name) = &definition.node_type_name {
                resolves.push(Resolve::One(TypeTag::NodeType, name.clone(), 1));
            }
        }
        Kind::RelationshipDefinition(definition) => {
            if let Some(name) = &definition.type_name {
                resolves.push(Resolve::One(TypeTag::RelationshipType, name.clone(), 0));
            }
        }
        Kind::InterfaceDefinition(definition) => {
            if let Some(name) = &definition.type_name {
                resolves.push(Resolve::One(TypeTag::InterfaceType, name.clone(), 0));
            }
        }
        Kind::DataType(t) => {
            if let Some(name) = &t.parent_name {
                resolves.push(Resolve::One(TypeTag::DataType, name.clone(), 0));
            }
        }
        Kind::NodeType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::NodeType, name.clone(), 0));
            }
        }
        Kind::CapabilityType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::CapabilityType, name.clone(), 0));
            }
        }
        Kind::RelationshipType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::RelationshipType, name.clone(), 0));
            }
        }
        Kind::InterfaceType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::InterfaceType, name.clone(), 0));
            }
        }
        Kind::ArtifactType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::ArtifactType, name.clone(), 0));
            }
        }
        Kind::GroupType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::GroupType, name.clone(), 0));
            }
            if !t.member_names.is_empty() {
                resolves.push(Resolve::Many(
                    vec![TypeTag::NodeType],
                    t.member_names.clone(),
                    1,
                ));
            }
        }
        Kind::PolicyType(t) => {
            if let Some(name) = &t.common.parent_name {
                resolves.push(Resolve::One(TypeTag::PolicyType, name.clone(), 0));
            }
            if !t.target_names.is_empty() {
                resolves.push(Resolve::Many(
                    vec![TypeTag::NodeType, TypeTag::GroupType],
                    t.target_names.clone(),
                    1,
                ));
            }
        }
        Kind::NodeTemplate(t) => {
            if let Some(name) = &t.type_name {
                resolves.push(Resolve::One(TypeTag::NodeType, name.clone(), 0));
            }
            if let Some(name) = &t.copy_name {
                resolves.push(Resolve::One(TypeTag::NodeTemplate, name.clone(), 1));
            }
        }
        Kind::RelationshipTemplate(t) => {
            if let Some(name) = &t.type_name {
                resolves.push(Resolve::One(TypeTag::RelationshipType, name.clone(), 0));
            }
            if let Some(name) = &t.copy_name {
                resolves.push(Resolve::One(TypeTag::RelationshipTemplate, name.clone(), 1));
            }
        }
        Kind::RequirementAssignment(assignment) => {
            if let Some(name) = &assignment.node_name {
                resolves.push(Resolve::Alternatives(
                    vec![TypeTag::NodeTemplate, TypeTag::NodeType],
                    name.clone(),
                    0,
                ));
            }
        }
        Kind::RelationshipAssignment(assignment) => {
            if let Some(name) = &assignment.type_name {
                resolves.push(Resolve::Alternatives(
                    vec![TypeTag::RelationshipType, TypeTag::RelationshipTemplate],
                    name.clone(),
                    0,
                ));
            }
        }
        Kind::Artifact(artifact) => {
            if let Some(name) = &artifact.type_name {
                resolves.push(Resolve::One(TypeTag::ArtifactType, name.clone(), 0));
            }
            if let Some(name) = &artifact.repository_name {
                resolves.push(Resolve::One(TypeTag::Repository, name.clone(), 1));
            }
        }
        Kind::Group(group) => {
            if let Some(name) = &group.type_name {
                resolves.push(Resolve::One(TypeTag::GroupType, name.clone(), 0));
            }
            if !group.member_names.is_empty() {
                resolves.push(Resolve::Many(
                    vec![TypeTag::NodeTemplate],
                    group.member_names.clone(),
                    1,
                ));
            }
        }
        Kind::Policy(policy) => {
            if let Some(name) = &policy.type_name {
                resolves.push(Resolve::One(TypeTag::PolicyType, name.clone(), 0));
            }
            if !policy.target_names.is_empty() {
                resolves.push(Resolve::Many(
                    vec![TypeTag::NodeTemplate, TypeTag::Group],
                    policy.target_names.clone(),
                    1,
                ));
            }
        }
        Kind::WorkflowStep(step) => {
            if let Some(name) = &step.target_name {
                resolves.push(Resolve::Alternatives(
                    vec![TypeTag::NodeTemplate, TypeTag::Group],
                    name.clone(),
                    0,
                ));
            }
        }
        Kind::SubstitutionMappings(substitution) => {
            if let Some(name) = &substitution.node_type_name {
                resolves.push(Resolve::One(TypeTag::NodeType, name.clone(), 0));
            }
        }
        Kind::HotResource(resource) => {
            if !resource.depends_on.is_empty() {
                resolves.push(Resolve::Many(
                    vec![TypeTag::HotResource],
                    resource.depends_on.clone(),
                    0,
                ));
            }
        }
        _ => {}
    });

    // Repository URLs resolve against the declaring file, not the
    // namespace.
    if let Some(reference) = repository_to_resolve {
        let base = catalog.file_url(meta.file);
        let resolved = catalog.urls.resolve(&reference, Some(&base)).ok();
        catalog.arena.with_mut(id, |entity| {
            if let Kind::Repository(repository) = &mut entity.kind {
                repository.resolved = resolved;
            }
        });
    }

    if resolves.is_empty() {
        return;
    }

    // Resolve everything first, then write the results back in one lock.
    struct Outcome {
        slot: u8,
        found: Vec<(TypeTag, EntityId)>,
    }
    let mut outcomes: Vec<Outcome> = Vec::new();

    for resolve in resolves {
        match resolve {
            Resolve::One(tag, name, slot) => {
                if let Some(target) = catalog.lookup_or_report(&meta, tag, &name) {
                    outcomes.push(Outcome {
                        slot,
                        found: vec![(tag, target)],
                    });
                }
            }
            Resolve::Alternatives(tags, name, slot) => {
                let mut found = None;
                for tag in &tags {
                    if let Some(target) = catalog.namespace_lookup(meta.file, *tag, &name) {
                        found = Some((*tag, target));
                        break;
                    }
                }
                match found {
                    Some(found) => outcomes.push(Outcome {
                        slot,
                        found: vec![found],
                    }),
                    None => {
                        let tags = tags
                            .iter()
                            .map(TypeTag::to_string)
                            .collect::<Vec<_>>()
                            .join(" or ");
                        catalog.report(
                            &catalog.site_of(&meta),
                            "UnknownName",
                            format!("unknown {tags}: {name:?}"),
                        );
                    }
                }
            }
            Resolve::Many(tags, names, slot) => {
                let mut found = Vec::new();
                for name in &names {
                    let mut hit = None;
                    for tag in &tags {
                        if let Some(target) = catalog.namespace_lookup(meta.file, *tag, name) {
                            hit = Some((*tag, target));
                            break;
                        }
                    }
                    match hit {
                        Some(hit) => found.push(hit),
                        None => {
                            let tags = tags
                                .iter()
                                .map(TypeTag::to_string)
                                .collect::<Vec<_>>()
                                .join(" or ");
                            catalog.report(
                                &catalog.site_of(&meta),
                                "UnknownName",
                                format!("unknown {tags}: {name:?}"),
                            );
                        }
                    }
                }
                outcomes.push(Outcome { slot, found });
            }
        }
    }

    catalog.arena.with_mut(id, |entity| {
        for outcome in &outcomes {
            let first = outcome.found.first().copied();
            let list: Vec<EntityId> =
                outcome.found.iter().map(|(_, target)| *target).collect();
            match (&mut entity.kind, outcome.slot) {
                (Kind::Import(import), 0) => import.repository = first.map(|(_, id)| id),
                (Kind::Schema(schema), 0) => schema.data_type = first.map(|(_, id)| id),
                (Kind::AttributeDefinition(d), 0) => d.data_type = first.map(|(_, id)| id),
                (Kind::PropertyDefinition(d), 0) => {
                    d.attribute.data_type = first.map(|(_, id)| id)
                }
                (Kind::ParameterDefinition(d), 0) => {
                    d.property.attribute.data_type = first.map(|(_, id)| id)
                }
                (Kind::CapabilityDefinition(d), 0) => {
                    d.capability_type = first.map(|(_, id)| id)
                }
                (Kind::RequirementDefinition(d), 0) => {
                    d.capability_type = first.map(|(_, id)| id)
                }
                (Kind::RequirementDefinition(d), 1) => d.node_type = first.map(|(_, id)| id),
                (Kind::RelationshipDefinition(d), 0) => {
                    d.relationship_type = first.map(|(_, id)| id)
                }
                (Kind::InterfaceDefinition(d), 0) => d.interface_type = first.map(|(_, id)| id),
                (Kind::DataType(t), 0) => t.parent = first.map(|(_, id)| id),
                (Kind::NodeType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::CapabilityType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::RelationshipType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::InterfaceType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::ArtifactType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::GroupType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::GroupType(t), 1) => t.members = list.clone(),
                (Kind::PolicyType(t), 0) => t.common.parent = first.map(|(_, id)| id),
                (Kind::PolicyType(t), 1) => t.targets = list.clone(),
                (Kind::NodeTemplate(t), 0) => t.node_type = first.map(|(_, id)| id),
                (Kind::NodeTemplate(t), 1) => t.copy = first.map(|(_, id)| id),
                (Kind::RelationshipTemplate(t), 0) => {
                    t.relationship_type = first.map(|(_, id)| id)
                }
                (Kind::RelationshipTemplate(t), 1) => t.copy = first.map(|(_, id)| id),
                (Kind::RequirementAssignment(a), 0) => match first {
                    Some((TypeTag::NodeTemplate, target)) => a.node_template = Some(target),
                    Some((TypeTag::NodeType, target)) => a.node_type = Some(target),
                    _ => {}
                },
                (Kind::RelationshipAssignment(a), 0) => match first {
                    Some((TypeTag::RelationshipType, target)) => {
                        a.relationship_type = Some(target)
                    }
                    Some((TypeTag::RelationshipTemplate, target)) => {
                        a.relationship_template = Some(target)
                    }
                    _ => {}
                },
                (Kind::Artifact(a), 0) => a.artifact_type = first.map(|(_, id)| id),
                (Kind::Artifact(a), 1) => a.repository = first.map(|(_, id)| id),
                (Kind::Group(g), 0) => g.group_type = first.map(|(_, id)| id),
                (Kind::Group(g), 1) => g.members = list.clone(),
                (Kind::Policy(p), 0) => p.policy_type = first.map(|(_, id)| id),
                (Kind::Policy(p), 1) => p.targets = list.clone(),
                (Kind::WorkflowStep(s), 0) => match first {
                    Some((TypeTag::NodeTemplate, target)) => {
                        s.target_node_template = Some(target)
                    }
                    Some((TypeTag::Group, target)) => s.target_group = Some(target),
                    _ => {}
                },
                (Kind::SubstitutionMappings(s), 0) => s.node_type = first.map(|(_, id)| id),
                (Kind::HotResource(r), 0) => r.dependencies = list.clone(),
                _ => {}
            }
        }
    });
}
