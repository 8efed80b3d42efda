use super::data::{read_schema, InternalType, Schema};
use super::value::{render_value_for, render_values};
use crate::catalog::Catalog;
use crate::entity::{path_field, path_key, EntityId, Kind, Meta, TypeTag};
use crate::fields::ReadCtx;
use std::collections::BTreeMap;

/// Phase-5 dispatch for one entity. Every render claims a per-entity
/// flag, so an entity reached through several paths renders once and
/// re-rendering a rendered graph is a no-op.
pub fn render_entity(catalog: &Catalog, id: EntityId) {
    enum Dispatch {
        Definition,
        Parameter,
        NodeTemplate,
        RelationshipTemplate,
        Group,
        Policy,
        Topology,
        Skip,
    }

    let dispatch = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::AttributeDefinition(_) | Kind::PropertyDefinition(_) => Dispatch::Definition,
        Kind::ParameterDefinition(_) => Dispatch::Parameter,
        Kind::NodeTemplate(_) => Dispatch::NodeTemplate,
        Kind::RelationshipTemplate(_) => Dispatch::RelationshipTemplate,
        Kind::Group(_) => Dispatch::Group,
        Kind::Policy(_) => Dispatch::Policy,
        Kind::TopologyTemplate(_) => Dispatch::Topology,
        _ => Dispatch::Skip,
    });

    match dispatch {
        Dispatch::Definition => render_definition(catalog, id),
        // The owning topology applies value/requiredness semantics; here
        // only the definition shape completes.
        Dispatch::Parameter => render_definition(catalog, id),
        Dispatch::NodeTemplate => render_node_template(catalog, id),
        Dispatch::RelationshipTemplate => render_relationship_template(catalog, id),
        Dispatch::Group => render_group(catalog, id),
        Dispatch::Policy => render_policy(catalog, id),
        Dispatch::Topology => render_topology(catalog, id),
        Dispatch::Skip => {}
    }
}

/// Attribute/property/parameter definition rendering: require a type,
/// complete entry and key schemas for list/map internals, and validate
/// the default against the type.
pub fn render_definition(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let (attribute, is_parameter, has_value) = match &mut entity.kind {
            Kind::AttributeDefinition(attribute) => (attribute, false, false),
            Kind::PropertyDefinition(property) => (&mut property.attribute, false, false),
            Kind::ParameterDefinition(parameter) => {
                let has_value = parameter.value.is_some();
                (&mut parameter.property.attribute, true, has_value)
            }
            _ => return None,
        };
        if attribute.rendered {
            return None;
        }
        attribute.rendered = true;
        Some((
            attribute.type_name.clone(),
            attribute.data_type,
            attribute.entry_schema,
            attribute.key_schema,
            attribute.default,
            is_parameter,
            has_value,
            entity.meta.clone(),
        ))
    });
    let Some((type_name, data_type, entry_schema, key_schema, default, is_parameter, has_value, meta)) =
        claimed
    else {
        return;
    };

    if type_name.is_none() && data_type.is_none() {
        // Parameters may be untyped pass-throughs; definitions may not.
        if !is_parameter {
            catalog.report(
                &catalog.site_of(&meta).at_path(path_field(&meta.path, "type")),
                "FieldMissing",
                "required field missing: \"type\"".to_string(),
            );
        } else if !has_value {
            tracing::debug!(path = %meta.path, "untyped parameter with no value");
        }
        return;
    }
    let Some(data_type) = data_type else {
        // An unknown type name was already reported during lookup.
        return;
    };

    let (internal, type_entry_schema, type_key_schema) =
        catalog.arena.with(data_type, |entity| match &entity.kind {
            Kind::DataType(dt) => (dt.internal, dt.entry_schema, dt.key_schema),
            _ => (None, None, None),
        });

    if matches!(internal, Some(InternalType::List) | Some(InternalType::Map)) {
        let entry_schema = entry_schema.or(type_entry_schema);
        let entry_type = entry_schema.and_then(|schema| {
            catalog.arena.with(schema, |entity| match &entity.kind {
                Kind::Schema(schema) => schema.data_type,
                _ => None,
            })
        });
        if entry_type.is_none() {
            catalog.report(
                &catalog.site_of(&meta),
                "MissingEntrySchema",
                format!(
                    "missing entry schema for {:?}",
                    catalog.arena.name_of(data_type)
                ),
            );
        }

        let mut key_schema = key_schema.or(type_key_schema);
        if internal == Some(InternalType::Map) && key_schema.is_none() {
            // Keys default to "string".
            let ctx = ReadCtx {
                catalog,
                file: meta.file,
                name: "key_schema".to_string(),
                path: path_field(&meta.path, "key_schema"),
            };
            let schema = read_schema(&ctx, &ir::Value::from("string"));
            let string_type =
                catalog.namespace_lookup(meta.file, TypeTag::DataType, "string");
            catalog.arena.with_mut(schema, |entity| {
                if let Kind::Schema(Schema { data_type, .. }) = &mut entity.kind {
                    *data_type = string_type;
                }
            });
            key_schema = Some(schema);
        }

        catalog.arena.with_mut(id, |entity| {
            let attribute = match &mut entity.kind {
                Kind::AttributeDefinition(attribute) => attribute,
                Kind::PropertyDefinition(property) => &mut property.attribute,
                Kind::ParameterDefinition(parameter) => &mut parameter.property.attribute,
                _ => return,
            };
            attribute.entry_schema = entry_schema;
            attribute.key_schema = key_schema;
        });
    }

    // The default must be a valid value of the type.
    if default.is_some() {
        render_value_for(catalog, default.expect("just checked"), Some(id), false);
    }
}

/// Topology inputs and outputs: resolve the effective value (assigned
/// over default), enforce requiredness, and render against the type.
pub fn render_parameter(catalog: &Catalog, id: EntityId, kind: &str) {
    render_definition(catalog, id);

    let snapshot = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::ParameterDefinition(parameter) => Some((
            parameter.value,
            parameter.property.attribute.default,
            parameter.property.attribute.data_type,
            parameter.property.is_required(),
            entity.meta.clone(),
        )),
        _ => None,
    });
    let Some((value, default, data_type, required, meta)) = snapshot else {
        return;
    };

    let effective = value.or(default);
    match effective {
        Some(effective) => {
            if data_type.is_some() {
                render_value_for(catalog, effective, Some(id), false);
            }
            catalog.arena.with_mut(id, |entity| {
                if let Kind::ParameterDefinition(parameter) = &mut entity.kind {
                    parameter.value = Some(effective);
                }
            });
        }
        None => {
            if required && kind == "input" {
                catalog.report(
                    &catalog.site_of(&meta),
                    "PropertyRequired",
                    format!("required input missing: {:?}", meta.name),
                );
            }
        }
    }
}

struct NodeTypeBits {
    property_definitions: BTreeMap<String, EntityId>,
    attribute_definitions: BTreeMap<String, EntityId>,
    capability_definitions: BTreeMap<String, EntityId>,
    requirement_definitions: Vec<EntityId>,
    interface_definitions: BTreeMap<String, EntityId>,
    artifact_definitions: BTreeMap<String, EntityId>,
}

fn render_node_template(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::NodeTemplate(template) = &mut entity.kind else {
            return None;
        };
        if template.rendered {
            return None;
        }
        template.rendered = true;
        Some((
            template.node_type,
            template.properties.clone(),
            template.attributes.clone(),
            template.capabilities.clone(),
            template.requirements.clone(),
            template.interfaces.clone(),
            template.artifacts.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((
        node_type,
        mut properties,
        mut attributes,
        mut capabilities,
        requirements,
        interfaces,
        mut artifacts,
        meta,
    )) = claimed
    else {
        return;
    };

    tracing::debug!(name = %meta.name, "rendering node template");

    let Some(node_type) = node_type else {
        return;
    };
    let Some(bits) = node_type_bits(catalog, node_type) else {
        return;
    };

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &bits.property_definitions,
        "property",
    );
    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "attributes"),
        &mut attributes,
        &bits.attribute_definitions,
        "attribute",
    );
    render_capabilities(catalog, &meta, &mut capabilities, &bits.capability_definitions);
    render_requirements(catalog, &meta, &requirements, &bits.requirement_definitions);
    render_interfaces(catalog, &meta, &interfaces, &bits.interface_definitions);

    // Type-level artifacts apply unless the template overrides them.
    for (name, artifact) in &bits.artifact_definitions {
        artifacts.entry(name.clone()).or_insert(*artifact);
    }
    for (name, artifact) in &artifacts {
        render_artifact(catalog, *artifact, name);
    }

    catalog.arena.with_mut(id, |entity| {
        if let Kind::NodeTemplate(template) = &mut entity.kind {
            template.properties = properties;
            template.attributes = attributes;
            template.capabilities = capabilities;
            template.artifacts = artifacts;
        }
    });
}

fn node_type_bits(catalog: &Catalog, id: EntityId) -> Option<NodeTypeBits> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::NodeType(node_type) => Some(NodeTypeBits {
            property_definitions: node_type.property_definitions.clone(),
            attribute_definitions: node_type.attribute_definitions.clone(),
            capability_definitions: node_type.capability_definitions.clone(),
            requirement_definitions: node_type.requirement_definitions.clone(),
            interface_definitions: node_type.interface_definitions.clone(),
            artifact_definitions: node_type.artifact_definitions.clone(),
        }),
        _ => None,
    })
}

fn render_capabilities(
    catalog: &Catalog,
    meta: &Meta,
    capabilities: &mut BTreeMap<String, EntityId>,
    definitions: &BTreeMap<String, EntityId>,
) {
    let base_path = path_field(&meta.path, "capabilities");
    let site = catalog.site_of(meta);

    // Materialize capabilities the type declares but the template omits.
    for name in definitions.keys() {
        if !capabilities.contains_key(name) {
            let ctx = ReadCtx {
                catalog,
                file: meta.file,
                name: name.clone(),
                path: path_key(&base_path, name),
            };
            let id = super::templates::read_capability_assignment(&ctx, &ir::Value::Map(ir::Map::new()));
            capabilities.insert(name.clone(), id);
        }
    }

    for (name, assignment) in capabilities.iter() {
        let Some(definition) = definitions.get(name) else {
            catalog.report(
                &site.at_path(path_key(&base_path, name)),
                "Undeclared",
                format!("undeclared capability: {name:?}"),
            );
            continue;
        };

        // Merge the capability type's definitions under the refinement's.
        let (capability_type, mut property_definitions, mut attribute_definitions) =
            catalog.arena.with(*definition, |entity| match &entity.kind {
                Kind::CapabilityDefinition(definition) => (
                    definition.capability_type,
                    definition.property_definitions.clone(),
                    definition.attribute_definitions.clone(),
                ),
                _ => (None, BTreeMap::new(), BTreeMap::new()),
            });
        if let Some(capability_type) = capability_type {
            catalog.arena.with(capability_type, |entity| {
                if let Kind::CapabilityType(capability_type) = &entity.kind {
                    for (name, id) in &capability_type.property_definitions {
                        property_definitions.entry(name.clone()).or_insert(*id);
                    }
                    for (name, id) in &capability_type.attribute_definitions {
                        attribute_definitions.entry(name.clone()).or_insert(*id);
                    }
                }
            });
        }

        let claimed = catalog.arena.with_mut(*assignment, |entity| {
            let Kind::CapabilityAssignment(assignment) = &mut entity.kind else {
                return None;
            };
            if assignment.rendered {
                return None;
            }
            assignment.rendered = true;
            Some((
                assignment.properties.clone(),
                assignment.attributes.clone(),
                entity.meta.clone(),
            ))
        });
        let Some((mut properties, mut attributes, assignment_meta)) = claimed else {
            continue;
        };

        render_values(
            catalog,
            &assignment_meta,
            &path_field(&assignment_meta.path, "properties"),
            &mut properties,
            &property_definitions,
            "property",
        );
        render_values(
            catalog,
            &assignment_meta,
            &path_field(&assignment_meta.path, "attributes"),
            &mut attributes,
            &attribute_definitions,
            "attribute",
        );

        catalog.arena.with_mut(*assignment, |entity| {
            if let Kind::CapabilityAssignment(a) = &mut entity.kind {
                a.properties = properties;
                a.attributes = attributes;
            }
        });
    }
}

fn render_requirements(
    catalog: &Catalog,
    meta: &Meta,
    requirements: &[EntityId],
    definitions: &[EntityId],
) {
    let base_path = path_field(&meta.path, "requirements");
    let site = catalog.site_of(meta);
    let definition_names: Vec<String> = definitions
        .iter()
        .map(|id| catalog.arena.name_of(*id))
        .collect();

    for assignment in requirements {
        let name = catalog.arena.name_of(*assignment);
        if !definition_names.contains(&name) {
            catalog.report(
                &site.at_path(path_key(&base_path, &name)),
                "Undeclared",
                format!("undeclared requirement: {name:?}"),
            );
            continue;
        }

        let relationship = catalog.arena.with(*assignment, |entity| match &entity.kind {
            Kind::RequirementAssignment(assignment) => assignment.relationship,
            _ => None,
        });
        if let Some(relationship) = relationship {
            render_relationship_assignment(catalog, relationship);
        }
    }
}

fn render_relationship_assignment(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::RelationshipAssignment(assignment) = &mut entity.kind else {
            return None;
        };
        if assignment.rendered {
            return None;
        }
        assignment.rendered = true;
        Some((
            assignment.relationship_type,
            assignment.properties.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((relationship_type, mut properties, meta)) = claimed else {
        return;
    };

    let definitions = relationship_type
        .map(|id| {
            catalog.arena.with(id, |entity| match &entity.kind {
                Kind::RelationshipType(relationship_type) => {
                    relationship_type.property_definitions.clone()
                }
                _ => BTreeMap::new(),
            })
        })
        .unwrap_or_default();

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &definitions,
        "property",
    );

    catalog.arena.with_mut(id, |entity| {
        if let Kind::RelationshipAssignment(assignment) = &mut entity.kind {
            assignment.properties = properties;
        }
    });
}

fn render_interfaces(
    catalog: &Catalog,
    meta: &Meta,
    interfaces: &BTreeMap<String, EntityId>,
    definitions: &BTreeMap<String, EntityId>,
) {
    let base_path = path_field(&meta.path, "interfaces");
    let site = catalog.site_of(meta);

    for (name, assignment) in interfaces {
        let Some(definition) = definitions.get(name) else {
            catalog.report(
                &site.at_path(path_key(&base_path, name)),
                "Undeclared",
                format!("undeclared interface: {name:?}"),
            );
            continue;
        };

        // Interface-level inputs merge the interface type's declarations.
        let (interface_type, mut input_definitions, mut operation_definitions) =
            catalog.arena.with(*definition, |entity| match &entity.kind {
                Kind::InterfaceDefinition(definition) => (
                    definition.interface_type,
                    definition.input_definitions.clone(),
                    definition.operation_definitions.clone(),
                ),
                _ => (None, BTreeMap::new(), BTreeMap::new()),
            });
        if let Some(interface_type) = interface_type {
            catalog.arena.with(interface_type, |entity| {
                if let Kind::InterfaceType(interface_type) = &entity.kind {
                    for (name, id) in &interface_type.input_definitions {
                        input_definitions.entry(name.clone()).or_insert(*id);
                    }
                    for (name, id) in &interface_type.operation_definitions {
                        operation_definitions.entry(name.clone()).or_insert(*id);
                    }
                }
            });
        }

        let claimed = catalog.arena.with_mut(*assignment, |entity| {
            let Kind::InterfaceAssignment(assignment) = &mut entity.kind else {
                return None;
            };
            if assignment.rendered {
                return None;
            }
            assignment.rendered = true;
            Some((
                assignment.inputs.clone(),
                assignment.operations.clone(),
                entity.meta.clone(),
            ))
        });
        let Some((mut inputs, operations, assignment_meta)) = claimed else {
            continue;
        };

        render_values(
            catalog,
            &assignment_meta,
            &path_field(&assignment_meta.path, "inputs"),
            &mut inputs,
            &input_definitions,
            "input",
        );

        for (operation_name, operation) in &operations {
            let operation_inputs =
                operation_definitions
                    .get(operation_name)
                    .map(|definition_id| {
                        catalog.arena.with(*definition_id, |entity| match &entity.kind {
                            Kind::OperationDefinition(definition) => {
                                definition.input_definitions.clone()
                            }
                            _ => BTreeMap::new(),
                        })
                    });
            let Some(operation_inputs) = operation_inputs else {
                catalog.report(
                    &site.at_path(path_key(
                        &path_field(&path_key(&base_path, name), "operations"),
                        operation_name,
                    )),
                    "Undeclared",
                    format!("undeclared operation: {operation_name:?}"),
                );
                continue;
            };

            let claimed = catalog.arena.with_mut(*operation, |entity| {
                let Kind::OperationAssignment(assignment) = &mut entity.kind else {
                    return None;
                };
                if assignment.rendered {
                    return None;
                }
                assignment.rendered = true;
                Some((assignment.inputs.clone(), entity.meta.clone()))
            });
            let Some((mut operation_input_values, operation_meta)) = claimed else {
                continue;
            };
            render_values(
                catalog,
                &operation_meta,
                &path_field(&operation_meta.path, "inputs"),
                &mut operation_input_values,
                &operation_inputs,
                "input",
            );
            catalog.arena.with_mut(*operation, |entity| {
                if let Kind::OperationAssignment(assignment) = &mut entity.kind {
                    assignment.inputs = operation_input_values;
                }
            });
        }

        catalog.arena.with_mut(*assignment, |entity| {
            if let Kind::InterfaceAssignment(a) = &mut entity.kind {
                a.inputs = inputs;
            }
        });
    }
}

fn render_artifact(catalog: &Catalog, id: EntityId, name: &str) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::Artifact(artifact) = &mut entity.kind else {
            return None;
        };
        if artifact.rendered {
            return None;
        }
        artifact.rendered = true;
        Some((
            artifact.artifact_type,
            artifact.properties.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((artifact_type, mut properties, meta)) = claimed else {
        return;
    };

    tracing::debug!(%name, "rendering artifact");

    let definitions = artifact_type
        .map(|id| {
            catalog.arena.with(id, |entity| match &entity.kind {
                Kind::ArtifactType(artifact_type) => artifact_type.property_definitions.clone(),
                _ => BTreeMap::new(),
            })
        })
        .unwrap_or_default();

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &definitions,
        "property",
    );

    catalog.arena.with_mut(id, |entity| {
        if let Kind::Artifact(artifact) = &mut entity.kind {
            artifact.properties = properties;
        }
    });
}

fn render_relationship_template(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::RelationshipTemplate(template) = &mut entity.kind else {
            return None;
        };
        if template.rendered {
            return None;
        }
        template.rendered = true;
        Some((
            template.relationship_type,
            template.properties.clone(),
            template.attributes.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((relationship_type, mut properties, mut attributes, meta)) = claimed else {
        return;
    };

    let Some(relationship_type) = relationship_type else {
        return;
    };
    let (property_definitions, attribute_definitions) =
        catalog.arena.with(relationship_type, |entity| match &entity.kind {
            Kind::RelationshipType(relationship_type) => (
                relationship_type.property_definitions.clone(),
                relationship_type.attribute_definitions.clone(),
            ),
            _ => (BTreeMap::new(), BTreeMap::new()),
        });

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &property_definitions,
        "property",
    );
    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "attributes"),
        &mut attributes,
        &attribute_definitions,
        "attribute",
    );

    catalog.arena.with_mut(id, |entity| {
        if let Kind::RelationshipTemplate(template) = &mut entity.kind {
            template.properties = properties;
            template.attributes = attributes;
        }
    });
}

fn render_group(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::Group(group) = &mut entity.kind else {
            return None;
        };
        if group.rendered {
            return None;
        }
        group.rendered = true;
        Some((
            group.group_type,
            group.properties.clone(),
            group.members.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((group_type, mut properties, members, meta)) = claimed else {
        return;
    };
    let Some(group_type) = group_type else {
        return;
    };

    let (property_definitions, member_types) =
        catalog.arena.with(group_type, |entity| match &entity.kind {
            Kind::GroupType(group_type) => (
                group_type.property_definitions.clone(),
                group_type.members.clone(),
            ),
            _ => (BTreeMap::new(), Vec::new()),
        });

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &property_definitions,
        "property",
    );

    // Members must be templates of (a subtype of) a permitted node type.
    if !member_types.is_empty() {
        for member in &members {
            let member_type = catalog.arena.with(*member, |entity| match &entity.kind {
                Kind::NodeTemplate(template) => template.node_type,
                _ => None,
            });
            let compatible = member_type.map_or(false, |member_type| {
                member_types.iter().any(|base| {
                    catalog.hierarchy_compatible(TypeTag::NodeType, *base, member_type)
                })
            });
            if !compatible {
                catalog.report(
                    &catalog.site_of(&meta),
                    "IncompatibleType",
                    format!(
                        "group member is not a permitted node type: {:?}",
                        catalog.arena.name_of(*member)
                    ),
                );
            }
        }
    }

    catalog.arena.with_mut(id, |entity| {
        if let Kind::Group(group) = &mut entity.kind {
            group.properties = properties;
        }
    });
}

fn render_policy(catalog: &Catalog, id: EntityId) {
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::Policy(policy) = &mut entity.kind else {
            return None;
        };
        if policy.rendered {
            return None;
        }
        policy.rendered = true;
        Some((
            policy.policy_type,
            policy.properties.clone(),
            policy.targets.clone(),
            entity.meta.clone(),
        ))
    });
    let Some((policy_type, mut properties, targets, meta)) = claimed else {
        return;
    };
    let Some(policy_type) = policy_type else {
        return;
    };

    let (property_definitions, target_types) =
        catalog.arena.with(policy_type, |entity| match &entity.kind {
            Kind::PolicyType(policy_type) => (
                policy_type.property_definitions.clone(),
                policy_type.targets.clone(),
            ),
            _ => (BTreeMap::new(), Vec::new()),
        });

    render_values(
        catalog,
        &meta,
        &path_field(&meta.path, "properties"),
        &mut properties,
        &property_definitions,
        "property",
    );

    if !target_types.is_empty() {
        for target in &targets {
            let (target_type, tag) = catalog.arena.with(*target, |entity| match &entity.kind {
                Kind::NodeTemplate(template) => (template.node_type, TypeTag::NodeType),
                Kind::Group(group) => (group.group_type, TypeTag::GroupType),
                _ => (None, TypeTag::NodeType),
            });
            let compatible = target_type.map_or(false, |target_type| {
                target_types
                    .iter()
                    .any(|base| catalog.hierarchy_compatible(tag, *base, target_type))
            });
            if !compatible {
                catalog.report(
                    &catalog.site_of(&meta),
                    "IncompatibleType",
                    format!(
                        "policy target is not a permitted type: {:?}",
                        catalog.arena.name_of(*target)
                    ),
                );
            }
        }
    }

    catalog.arena.with_mut(id, |entity| {
        if let Kind::Policy(policy) = &mut entity.kind {
            policy.properties = properties;
        }
    });
}

fn render_topology(catalog: &Catalog, id: EntityId) {
    let snapshot = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::TopologyTemplate(topology) => Some((
            topology.input_definitions.clone(),
            topology.output_definitions.clone(),
            topology.substitution,
        )),
        _ => None,
    });
    let Some((inputs, outputs, substitution)) = snapshot else {
        return;
    };

    for input in inputs.values() {
        render_parameter(catalog, *input, "input");
    }
    for output in outputs.values() {
        render_parameter(catalog, *output, "output");
    }
    if let Some(substitution) = substitution {
        render_substitution(catalog, substitution, &inputs);
    }
}

fn render_substitution(
    catalog: &Catalog,
    id: EntityId,
    inputs: &BTreeMap<String, EntityId>,
) {
    let snapshot = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::SubstitutionMappings(substitution) => Some((
            substitution.capability_mappings.clone(),
            substitution.requirement_mappings.clone(),
            substitution.property_mappings.clone(),
            entity.meta.clone(),
        )),
        _ => None,
    });
    let Some((capability_mappings, requirement_mappings, property_mappings, meta)) = snapshot
    else {
        return;
    };
    let site = catalog.site_of(&meta);

    for (name, mapping) in capability_mappings.iter().chain(&requirement_mappings) {
        if catalog
            .namespace_lookup(meta.file, TypeTag::NodeTemplate, &mapping.node_template_name)
            .is_none()
        {
            catalog.report(
                &site,
                "UnknownName",
                format!(
                    "unknown node template in mapping {name:?}: {:?}",
                    mapping.node_template_name
                ),
            );
        }
    }

    // Property mappings point at topology inputs.
    for (name, input) in &property_mappings {
        if !inputs.contains_key(input) {
            catalog.report(
                &site,
                "UnknownName",
                format!("unknown input in property mapping {name:?}: {input:?}"),
            );
        }
    }
}
