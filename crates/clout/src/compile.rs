use crate::graph::{Clout, Edge, Vertex, VERSION};
use crate::wire::CloutError;
use crate::ENGINE_METADATA_KEY;

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("{kind} {source_name:?}: target {target:?} does not exist")]
    UnresolvedTarget {
        kind: &'static str,
        source_name: String,
        target: String,
    },
    #[error(transparent)]
    Clout(#[from] CloutError),
}

fn engine_metadata(kind: &str) -> ir::Map {
    let mut inner = ir::Map::new();
    inner.insert("version".into(), ir::Value::from(VERSION));
    inner.insert("kind".into(), ir::Value::from(kind));

    let mut map = ir::Map::new();
    map.insert(
        ir::Value::from(ENGINE_METADATA_KEY),
        ir::Value::Map(inner),
    );
    map
}

fn vertex_for(kind: &str, properties: ir::Value) -> Vertex {
    let mut vertex = match properties {
        ir::Value::Map(map) => Vertex::with_properties(map),
        other => {
            let mut map = ir::Map::new();
            map.insert("value".into(), other);
            Vertex::with_properties(map)
        }
    };
    vertex.metadata = engine_metadata(kind);
    vertex
}

fn edge_for(kind: &str, target_id: impl Into<String>) -> Edge {
    let mut edge = Edge::to(target_id);
    edge.metadata = engine_metadata(kind);
    edge
}

const GROUP_PREFIX: &str = "group:";
const POLICY_PREFIX: &str = "policy:";
const WORKFLOW_PREFIX: &str = "workflow:";
const SUBSTITUTION_ID: &str = "substitution";

/// Flatten a normalized service template into the Clout graph. Vertex IDs
/// are stable: node templates use their local name; groups, policies and
/// workflows are prefixed to keep the ID space collision-free.
pub fn compile(template: &normal::ServiceTemplate) -> Result<Clout, CompileError> {
    let mut clout = Clout::new();

    {
        let mut engine = ir::Map::new();
        engine.insert("version".into(), ir::Value::from(VERSION));
        engine.insert("scriptlets".into(), template.scriptlets_to_value());
        clout
            .metadata
            .insert(ir::Value::from(ENGINE_METADATA_KEY), ir::Value::Map(engine));
    }
    {
        let mut tosca = ir::Map::new();
        if let Some(description) = &template.description {
            tosca.insert("description".into(), ir::Value::from(description.clone()));
        }
        tosca.insert("metadata".into(), template.metadata_to_value());
        tosca.insert(
            "inputs".into(),
            normal::constrainables_to_value(&template.inputs),
        );
        tosca.insert(
            "outputs".into(),
            normal::constrainables_to_value(&template.outputs),
        );
        clout
            .properties
            .insert("tosca".into(), ir::Value::Map(tosca));
    }

    for (name, node_template) in &template.node_templates {
        clout.add_vertex(
            name.clone(),
            vertex_for("NodeTemplate", node_template.to_value()),
        );
    }
    for (name, group) in &template.groups {
        clout.add_vertex(
            format!("{GROUP_PREFIX}{name}"),
            vertex_for("Group", group.to_value()),
        );
    }
    for (name, policy) in &template.policies {
        clout.add_vertex(
            format!("{POLICY_PREFIX}{name}"),
            vertex_for("Policy", policy.to_value()),
        );
    }
    for (name, workflow) in &template.workflows {
        clout.add_vertex(
            format!("{WORKFLOW_PREFIX}{name}"),
            vertex_for("Workflow", workflow.to_value()),
        );
    }
    if let Some(substitution) = &template.substitution {
        clout.add_vertex(
            SUBSTITUTION_ID,
            vertex_for("Substitution", substitution.to_value()),
        );
    }

    // Requirements become edges, and may only point at vertexes that exist.
    for (name, node_template) in &template.node_templates {
        for requirement in &node_template.requirements {
            let target = requirement.node_template_name.clone().ok_or_else(|| {
                CompileError::UnresolvedTarget {
                    kind: "node template",
                    source_name: name.clone(),
                    target: requirement.name.clone(),
                }
            })?;
            if !template.node_templates.contains_key(&target) {
                return Err(CompileError::UnresolvedTarget {
                    kind: "node template",
                    source_name: name.clone(),
                    target,
                });
            }

            let mut edge = edge_for("Requirement", &target);
            edge.properties
                .insert("name".into(), ir::Value::from(requirement.name.clone()));
            if let Some(capability) = &requirement.capability_name {
                edge.properties
                    .insert("capability".into(), ir::Value::from(capability.clone()));
            }
            if let Some(capability_type) = &requirement.capability_type_name {
                edge.properties.insert(
                    "capabilityType".into(),
                    ir::Value::from(capability_type.clone()),
                );
            }
            if let Some(relationship) = &requirement.relationship {
                edge.properties
                    .insert("relationship".into(), relationship.to_value());
            }

            clout
                .vertexes
                .get_mut(name)
                .expect("source vertex was just added")
                .add_edge(edge);
        }
    }

    for (name, group) in &template.groups {
        for member in &group.members {
            if !template.node_templates.contains_key(member) {
                return Err(CompileError::UnresolvedTarget {
                    kind: "group",
                    source_name: name.clone(),
                    target: member.clone(),
                });
            }
            clout
                .vertexes
                .get_mut(&format!("{GROUP_PREFIX}{name}"))
                .expect("group vertex was just added")
                .add_edge(edge_for("Member", member));
        }
    }

    for (name, policy) in &template.policies {
        for target in &policy.targets {
            let target_id = if template.node_templates.contains_key(target) {
                target.clone()
            } else if template.groups.contains_key(target) {
                format!("{GROUP_PREFIX}{target}")
            } else {
                return Err(CompileError::UnresolvedTarget {
                    kind: "policy",
                    source_name: name.clone(),
                    target: target.clone(),
                });
            };
            clout
                .vertexes
                .get_mut(&format!("{POLICY_PREFIX}{name}"))
                .expect("policy vertex was just added")
                .add_edge(edge_for("PolicyTarget", target_id));
        }
    }

    for (name, workflow) in &template.workflows {
        for step in workflow.steps.values() {
            let target_id = if let Some(target) = &step.target_node_template {
                if !template.node_templates.contains_key(target) {
                    return Err(CompileError::UnresolvedTarget {
                        kind: "workflow",
                        source_name: name.clone(),
                        target: target.clone(),
                    });
                }
                target.clone()
            } else if let Some(target) = &step.target_group {
                if !template.groups.contains_key(target) {
                    return Err(CompileError::UnresolvedTarget {
                        kind: "workflow",
                        source_name: name.clone(),
                        target: target.clone(),
                    });
                }
                format!("{GROUP_PREFIX}{target}")
            } else {
                continue;
            };

            let mut edge = edge_for("WorkflowStep", target_id);
            edge.properties
                .insert("step".into(), ir::Value::from(step.name.clone()));
            clout
                .vertexes
                .get_mut(&format!("{WORKFLOW_PREFIX}{name}"))
                .expect("workflow vertex was just added")
                .add_edge(edge);
        }
    }

    clout.resolve()?;

    tracing::debug!(
        vertexes = clout.vertexes.len(),
        "compiled service template to Clout"
    );
    Ok(clout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use normal::{NodeTemplate, Requirement, ServiceTemplate, TypeInformation};

    fn template_with_nodes(names: &[&str]) -> ServiceTemplate {
        let mut template = ServiceTemplate::default();
        for name in names {
            let mut node = NodeTemplate::default();
            node.name = name.to_string();
            node.types
                .insert("T".to_string(), TypeInformation::named("T"));
            template.node_templates.insert(name.to_string(), node);
        }
        template
    }

    #[test]
    fn minimal_node_template_becomes_a_vertex() {
        let clout = compile(&template_with_nodes(&["n"])).unwrap();
        assert_eq!(clout.vertexes.len(), 1);
        let vertex = &clout.vertexes["n"];
        assert!(vertex.edges_out.is_empty());
        let types = vertex
            .properties
            .get(&ir::Value::from("types"))
            .and_then(ir::Value::as_map)
            .unwrap();
        assert!(types.contains_key(&ir::Value::from("T")));
    }

    #[test]
    fn requirement_becomes_a_labeled_edge() {
        let mut template = template_with_nodes(&["a", "b"]);
        template
            .node_templates
            .get_mut("a")
            .unwrap()
            .requirements
            .push(Requirement {
                name: "r".to_string(),
                node_template_name: Some("b".to_string()),
                ..Default::default()
            });

        let clout = compile(&template).unwrap();
        let edges = &clout.vertexes["a"].edges_out;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, "b");
        assert_eq!(
            edges[0].properties.get(&ir::Value::from("name")),
            Some(&ir::Value::from("r"))
        );
        assert_eq!(clout.vertexes["b"].edges_in.len(), 1);
    }

    #[test]
    fn unresolved_requirement_fails() {
        let mut template = template_with_nodes(&["a"]);
        template
            .node_templates
            .get_mut("a")
            .unwrap()
            .requirements
            .push(Requirement {
                name: "r".to_string(),
                node_template_name: Some("nowhere".to_string()),
                ..Default::default()
            });
        assert!(matches!(
            compile(&template),
            Err(CompileError::UnresolvedTarget { .. })
        ));
    }

    #[test]
    fn groups_and_policies_get_prefixed_vertexes() {
        let mut template = template_with_nodes(&["a"]);
        let mut group = normal::Group::default();
        group.name = "g".to_string();
        group.members.push("a".to_string());
        template.groups.insert("g".to_string(), group);

        let mut policy = normal::Policy::default();
        policy.name = "p".to_string();
        policy.targets.push("g".to_string());
        template.policies.insert("p".to_string(), policy);

        let clout = compile(&template).unwrap();
        assert!(clout.vertexes.contains_key("group:g"));
        assert_eq!(clout.vertexes["group:g"].edges_out[0].target_id, "a");
        assert_eq!(clout.vertexes["policy:p"].edges_out[0].target_id, "group:g");
    }
}
