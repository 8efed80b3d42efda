use super::data::constraints_to_calls;
use super::value::{type_information, Value, ValueData};
use super::workflows::WorkflowActivity;
use crate::catalog::Catalog;
use crate::entity::{EntityId, Kind, TypeTag};
use normal::{CallNode, Constrainable, ListNode, MapNode, TypeInformation};
use std::collections::BTreeMap;

/// Flatten the root file's rendered entity graph into the canonical
/// service-template form.
pub fn normalize_service_template(
    catalog: &Catalog,
    root_entity: EntityId,
) -> Option<normal::ServiceTemplate> {
    let (metadata, description, topology) =
        catalog.arena.with(root_entity, |entity| match &entity.kind {
            Kind::File(file) => Some((
                file.metadata.clone(),
                file.description.clone(),
                file.topology,
            )),
            _ => None,
        })?;

    let mut template = normal::ServiceTemplate {
        metadata,
        description,
        scriptlet_namespace: catalog
            .scriptlets
            .lock()
            .expect("scriptlets poisoned")
            .to_map(),
        ..Default::default()
    };

    let Some(topology) = topology else {
        return Some(template);
    };

    let topology_bits = catalog.arena.with(topology, |entity| match &entity.kind {
        Kind::TopologyTemplate(topology) => Some((
            topology.description.clone(),
            topology.input_definitions.clone(),
            topology.output_definitions.clone(),
            topology.node_templates.clone(),
            topology.groups.clone(),
            topology.policies.clone(),
            topology.workflows.clone(),
            topology.substitution,
        )),
        _ => None,
    });
    let Some((
        topology_description,
        inputs,
        outputs,
        node_templates,
        groups,
        policies,
        workflows,
        substitution,
    )) = topology_bits
    else {
        return Some(template);
    };

    if template.description.is_none() {
        template.description = topology_description;
    }

    for (name, parameter) in &inputs {
        if let Some(value) = parameter_value(catalog, *parameter) {
            template.inputs.insert(name.clone(), value);
        }
    }
    for (name, parameter) in &outputs {
        if let Some(value) = parameter_value(catalog, *parameter) {
            template.outputs.insert(name.clone(), value);
        }
    }

    for (name, id) in &node_templates {
        if let Some(node) = normalize_node_template(catalog, name, *id, &node_templates) {
            template.node_templates.insert(name.clone(), node);
        }
    }
    for (name, id) in &groups {
        if let Some(group) = normalize_group(catalog, name, *id) {
            template.groups.insert(name.clone(), group);
        }
    }
    for id in &policies {
        let name = catalog.arena.name_of(*id);
        if let Some(policy) = normalize_policy(catalog, &name, *id) {
            template.policies.insert(name, policy);
        }
    }
    for (name, id) in &workflows {
        template
            .workflows
            .insert(name.clone(), normalize_workflow(catalog, name, *id));
    }
    if let Some(substitution) = substitution {
        template.substitution = normalize_substitution(catalog, substitution);
    }

    Some(template)
}

fn parameter_value(catalog: &Catalog, id: EntityId) -> Option<Constrainable> {
    let value = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::ParameterDefinition(parameter) => {
            parameter.value.or(parameter.property.attribute.default)
        }
        _ => None,
    })?;
    Some(normalize_value(catalog, value))
}

/// Full type lineage of a typed entity, keyed by type name.
pub fn type_lineage(
    catalog: &Catalog,
    tag: TypeTag,
    id: EntityId,
) -> BTreeMap<String, TypeInformation> {
    catalog
        .hierarchy_lineage(tag, id)
        .into_iter()
        .map(|ancestor| {
            catalog.arena.with(ancestor, |entity| {
                let (description, metadata) = match &entity.kind {
                    Kind::DataType(t) => (t.description.clone(), t.metadata.clone()),
                    Kind::NodeType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::CapabilityType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::RelationshipType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::InterfaceType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::ArtifactType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::GroupType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    Kind::PolicyType(t) => {
                        (t.common.description.clone(), t.common.metadata.clone())
                    }
                    _ => (None, BTreeMap::new()),
                };
                (
                    entity.meta.name.clone(),
                    type_information(&entity.meta.name, &description, &metadata),
                )
            })
        })
        .collect()
}

/// Normalize one rendered value entity into its canonical tree.
pub fn normalize_value(catalog: &Catalog, id: EntityId) -> Constrainable {
    let (data, constraints, converter, comparer, information) =
        catalog.arena.with(id, |entity| match &entity.kind {
            Kind::Value(Value {
                data,
                constraints,
                converter,
                comparer,
                information,
                ..
            }) => {
                let data = match data {
                    ValueData::Raw(raw) => NormalizeData::Raw(raw.clone()),
                    ValueData::Call(call) => NormalizeData::Call(call.clone()),
                    ValueData::List {
                        entries,
                        entry_constraints,
                    } => NormalizeData::List(entries.clone(), entry_constraints.clone()),
                    ValueData::Map {
                        entries,
                        key_constraints,
                        value_constraints,
                    } => NormalizeData::Map(
                        entries.clone(),
                        key_constraints.clone(),
                        value_constraints.clone(),
                    ),
                    ValueData::Complex(fields) => NormalizeData::Complex(fields.clone()),
                };
                (
                    data,
                    constraints.clone(),
                    converter.clone(),
                    comparer.clone(),
                    information.clone(),
                )
            }
            _ => (
                NormalizeData::Raw(ir::Value::Null),
                Vec::new(),
                None,
                None,
                normal::ValueInformation::default(),
            ),
        });

    let mut node = match data {
        NormalizeData::Raw(raw) => Constrainable::value(raw),
        NormalizeData::Call(call) => Constrainable::Call(CallNode {
            call,
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        }),
        NormalizeData::List(entries, entry_constraints) => Constrainable::List(ListNode {
            entries: entries
                .iter()
                .map(|entry| normalize_value(catalog, *entry))
                .collect(),
            entry_constraints: constraints_to_calls(&entry_constraints),
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        }),
        NormalizeData::Map(entries, key_constraints, value_constraints) => {
            Constrainable::Map(MapNode {
                entries: entries
                    .iter()
                    .map(|(key, value)| {
                        (
                            normalize_value(catalog, *key),
                            normalize_value(catalog, *value),
                        )
                    })
                    .collect(),
                key_constraints: constraints_to_calls(&key_constraints),
                value_constraints: constraints_to_calls(&value_constraints),
                information: None,
                constraints: Vec::new(),
                converter: None,
                comparer: None,
            })
        }
        NormalizeData::Complex(fields) => Constrainable::Map(MapNode {
            entries: fields
                .iter()
                .map(|(name, value)| {
                    (
                        Constrainable::value(ir::Value::from(name.clone())),
                        normalize_value(catalog, *value),
                    )
                })
                .collect(),
            key_constraints: Vec::new(),
            value_constraints: Vec::new(),
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        }),
    };

    node.set_information(information);
    for constraint in constraints_to_calls(&constraints) {
        node.add_constraint(constraint);
    }
    if let Some(converter) = converter {
        node.set_converter(converter);
    }
    if let Some(comparer) = comparer {
        node.set_comparer(comparer);
    }
    node
}

enum NormalizeData {
    Raw(ir::Value),
    Call(normal::FunctionCall),
    List(Vec<EntityId>, Vec<super::data::ConstraintClause>),
    Map(
        Vec<(EntityId, EntityId)>,
        Vec<super::data::ConstraintClause>,
        Vec<super::data::ConstraintClause>,
    ),
    Complex(BTreeMap<String, EntityId>),
}

fn normalize_values(
    catalog: &Catalog,
    values: &BTreeMap<String, EntityId>,
) -> BTreeMap<String, Constrainable> {
    values
        .iter()
        .map(|(name, id)| (name.clone(), normalize_value(catalog, *id)))
        .collect()
}

fn normalize_node_template(
    catalog: &Catalog,
    name: &str,
    id: EntityId,
    siblings: &BTreeMap<String, EntityId>,
) -> Option<normal::NodeTemplate> {
    let bits = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::NodeTemplate(template) => Some((
            template.node_type,
            template.description.clone(),
            template.directives.clone(),
            template.metadata.clone(),
            template.properties.clone(),
            template.attributes.clone(),
            template.capabilities.clone(),
            template.requirements.clone(),
            template.interfaces.clone(),
            template.artifacts.clone(),
        )),
        _ => None,
    })?;
    let (
        node_type,
        description,
        directives,
        metadata,
        properties,
        attributes,
        capabilities,
        requirements,
        interfaces,
        artifacts,
    ) = bits;

    tracing::debug!(%name, "normalizing node template");

    let mut node = normal::NodeTemplate {
        name: name.to_string(),
        description,
        directives,
        metadata,
        types: node_type
            .map(|node_type| type_lineage(catalog, TypeTag::NodeType, node_type))
            .unwrap_or_default(),
        properties: normalize_values(catalog, &properties),
        attributes: normalize_values(catalog, &attributes),
        ..Default::default()
    };

    for (capability_name, assignment) in &capabilities {
        catalog.arena.with(*assignment, |entity| {
            if let Kind::CapabilityAssignment(capability) = &entity.kind {
                node.capabilities.insert(
                    capability_name.clone(),
                    normal::Capability {
                        name: capability_name.clone(),
                        description: None,
                        types: BTreeMap::new(),
                        properties: normalize_values(catalog, &capability.properties),
                        attributes: normalize_values(catalog, &capability.attributes),
                    },
                );
            }
        });
    }

    for (interface_name, assignment) in &interfaces {
        node.interfaces.insert(
            interface_name.clone(),
            normalize_interface(catalog, interface_name, *assignment),
        );
    }

    for (artifact_name, artifact) in &artifacts {
        catalog.arena.with(*artifact, |entity| {
            if let Kind::Artifact(a) = &entity.kind {
                node.artifacts.insert(
                    artifact_name.clone(),
                    normal::Artifact {
                        name: artifact_name.clone(),
                        description: a.description.clone(),
                        types: a
                            .artifact_type
                            .map(|t| type_lineage(catalog, TypeTag::ArtifactType, t))
                            .unwrap_or_default(),
                        filename: a.file.clone(),
                        source_url: None,
                        deploy_path: a.deploy_path.clone(),
                        properties: normalize_values(catalog, &a.properties),
                    },
                );
            }
        });
    }

    for assignment in &requirements {
        node.requirements
            .push(normalize_requirement(catalog, *assignment, siblings));
    }

    Some(node)
}

fn normalize_interface(
    catalog: &Catalog,
    name: &str,
    assignment: EntityId,
) -> normal::Interface {
    let (inputs, operations) = catalog.arena.with(assignment, |entity| match &entity.kind {
        Kind::InterfaceAssignment(interface) => {
            (interface.inputs.clone(), interface.operations.clone())
        }
        _ => (BTreeMap::new(), BTreeMap::new()),
    });

    let mut interface = normal::Interface {
        name: name.to_string(),
        inputs: normalize_values(catalog, &inputs),
        ..Default::default()
    };

    for (operation_name, operation) in &operations {
        catalog.arena.with(*operation, |entity| {
            if let Kind::OperationAssignment(o) = &entity.kind {
                interface.operations.insert(
                    operation_name.clone(),
                    normal::Operation {
                        name: operation_name.clone(),
                        description: None,
                        implementation: o
                            .implementation
                            .as_ref()
                            .and_then(|implementation| implementation.primary.clone()),
                        dependencies: o
                            .implementation
                            .as_ref()
                            .map(|implementation| implementation.dependencies.clone())
                            .unwrap_or_default(),
                        inputs: normalize_values(catalog, &o.inputs),
                    },
                );
            }
        });
    }

    interface
}

/// Resolve a requirement to its target template. An assignment naming a
/// node type (or none at all, deferring to the definition) selects the
/// first compatible template in name order.
fn normalize_requirement(
    catalog: &Catalog,
    assignment: EntityId,
    siblings: &BTreeMap<String, EntityId>,
) -> normal::Requirement {
    let (name, node_template, node_type, capability_name, relationship) =
        catalog.arena.with(assignment, |entity| match &entity.kind {
            Kind::RequirementAssignment(requirement) => (
                entity.meta.name.clone(),
                requirement.node_template,
                requirement.node_type,
                requirement.capability_name.clone(),
                requirement.relationship,
            ),
            _ => (entity.meta.name.clone(), None, None, None, None),
        });

    let node_template_name = match node_template {
        Some(target) => Some(catalog.arena.name_of(target)),
        None => node_type.and_then(|node_type| {
            siblings
                .iter()
                .find(|(_, sibling)| {
                    catalog
                        .arena
                        .with(**sibling, |entity| match &entity.kind {
                            Kind::NodeTemplate(template) => template.node_type,
                            _ => None,
                        })
                        .map(|sibling_type| {
                            catalog.hierarchy_compatible(
                                TypeTag::NodeType,
                                node_type,
                                sibling_type,
                            )
                        })
                        .unwrap_or(false)
                })
                .map(|(name, _)| name.clone())
        }),
    };

    normal::Requirement {
        name,
        node_template_name,
        capability_type_name: None,
        capability_name,
        relationship: relationship.map(|relationship| {
            let (relationship_type, properties, interfaces) =
                catalog.arena.with(relationship, |entity| match &entity.kind {
                    Kind::RelationshipAssignment(r) => (
                        r.relationship_type,
                        r.properties.clone(),
                        r.interfaces.clone(),
                    ),
                    _ => (None, BTreeMap::new(), BTreeMap::new()),
                });
            normal::Relationship {
                types: relationship_type
                    .map(|t| type_lineage(catalog, TypeTag::RelationshipType, t))
                    .unwrap_or_default(),
                properties: normalize_values(catalog, &properties),
                attributes: BTreeMap::new(),
                interfaces: interfaces
                    .iter()
                    .map(|(name, id)| (name.clone(), normalize_interface(catalog, name, *id)))
                    .collect(),
            }
        }),
    }
}

fn normalize_group(catalog: &Catalog, name: &str, id: EntityId) -> Option<normal::Group> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::Group(group) => Some(normal::Group {
            name: name.to_string(),
            description: group.description.clone(),
            types: group
                .group_type
                .map(|t| type_lineage(catalog, TypeTag::GroupType, t))
                .unwrap_or_default(),
            properties: normalize_values(catalog, &group.properties),
            members: group
                .members
                .iter()
                .map(|member| catalog.arena.name_of(*member))
                .collect(),
        }),
        _ => None,
    })
}

fn normalize_policy(catalog: &Catalog, name: &str, id: EntityId) -> Option<normal::Policy> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::Policy(policy) => Some(normal::Policy {
            name: name.to_string(),
            description: policy.description.clone(),
            types: policy
                .policy_type
                .map(|t| type_lineage(catalog, TypeTag::PolicyType, t))
                .unwrap_or_default(),
            properties: normalize_values(catalog, &policy.properties),
            targets: policy
                .targets
                .iter()
                .map(|target| catalog.arena.name_of(*target))
                .collect(),
        }),
        _ => None,
    })
}

fn normalize_workflow(catalog: &Catalog, name: &str, id: EntityId) -> normal::Workflow {
    let (description, steps) = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::Workflow(workflow) => (workflow.description.clone(), workflow.steps.clone()),
        _ => (None, BTreeMap::new()),
    });

    let mut normalized = normal::Workflow {
        name: name.to_string(),
        description,
        ..Default::default()
    };

    for (step_name, step) in &steps {
        catalog.arena.with(*step, |entity| {
            if let Kind::WorkflowStep(step) = &entity.kind {
                normalized.steps.insert(
                    step_name.clone(),
                    normal::WorkflowStep {
                        name: step_name.clone(),
                        target_node_template: step
                            .target_node_template
                            .map(|target| catalog.arena.name_of(target)),
                        target_group: step
                            .target_group
                            .map(|target| catalog.arena.name_of(target)),
                        activities: step
                            .activities
                            .iter()
                            .map(|activity| match activity {
                                WorkflowActivity::Delegate(workflow) => {
                                    normal::WorkflowActivity::Delegate(workflow.clone())
                                }
                                WorkflowActivity::SetState(state) => {
                                    normal::WorkflowActivity::SetState(state.clone())
                                }
                                WorkflowActivity::CallOperation {
                                    interface,
                                    operation,
                                } => normal::WorkflowActivity::CallOperation {
                                    interface: interface.clone(),
                                    operation: operation.clone(),
                                },
                                WorkflowActivity::Inline(workflow) => {
                                    normal::WorkflowActivity::Inline(workflow.clone())
                                }
                            })
                            .collect(),
                        on_success: step.on_success.clone(),
                        on_failure: step.on_failure.clone(),
                    },
                );
            }
        });
    }

    normalized
}

fn normalize_substitution(catalog: &Catalog, id: EntityId) -> Option<normal::Substitution> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::SubstitutionMappings(substitution) => {
            let node_type = substitution.node_type?;
            Some(normal::Substitution {
                type_name: catalog.arena.name_of(node_type),
                types: type_lineage(catalog, TypeTag::NodeType, node_type),
                capability_mappings: substitution
                    .capability_mappings
                    .iter()
                    .map(|(name, mapping)| {
                        (
                            name.clone(),
                            normal::MappedPort {
                                node_template_name: mapping.node_template_name.clone(),
                                port_name: mapping.port_name.clone(),
                            },
                        )
                    })
                    .collect(),
                requirement_mappings: substitution
                    .requirement_mappings
                    .iter()
                    .map(|(name, mapping)| {
                        (
                            name.clone(),
                            normal::MappedPort {
                                node_template_name: mapping.node_template_name.clone(),
                                port_name: mapping.port_name.clone(),
                            },
                        )
                    })
                    .collect(),
                property_mappings: substitution.property_mappings.clone(),
            })
        }
        _ => None,
    })
}
