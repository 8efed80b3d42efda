use crate::value::{constrainables_to_value, Constrainable, TypeInformation};
use std::collections::BTreeMap;
use url::Url;

pub type Values = BTreeMap<String, Constrainable>;
pub type Types = BTreeMap<String, TypeInformation>;
pub type Metadata = BTreeMap<String, String>;

/// The normalized form of a parsed service template: everything the Clout
/// compiler needs, with all grammar-specific structure flattened away.
#[derive(Clone, Debug, Default)]
pub struct ServiceTemplate {
    pub description: Option<String>,
    pub metadata: Metadata,
    pub inputs: Values,
    pub outputs: Values,
    pub node_templates: BTreeMap<String, NodeTemplate>,
    pub groups: BTreeMap<String, Group>,
    pub policies: BTreeMap<String, Policy>,
    pub workflows: BTreeMap<String, Workflow>,
    pub substitution: Option<Substitution>,
    pub scriptlet_namespace: BTreeMap<String, Scriptlet>,
}

#[derive(Clone, Debug, Default)]
pub struct NodeTemplate {
    pub name: String,
    pub description: Option<String>,
    /// Full type lineage, root-most last, keyed by type name.
    pub types: Types,
    pub directives: Vec<String>,
    pub metadata: Metadata,
    pub properties: Values,
    pub attributes: Values,
    pub capabilities: BTreeMap<String, Capability>,
    pub interfaces: BTreeMap<String, Interface>,
    pub artifacts: BTreeMap<String, Artifact>,
    pub requirements: Vec<Requirement>,
}

#[derive(Clone, Debug, Default)]
pub struct Requirement {
    pub name: String,
    pub node_template_name: Option<String>,
    pub capability_type_name: Option<String>,
    pub capability_name: Option<String>,
    pub relationship: Option<Relationship>,
}

#[derive(Clone, Debug, Default)]
pub struct Relationship {
    pub types: Types,
    pub properties: Values,
    pub attributes: Values,
    pub interfaces: BTreeMap<String, Interface>,
}

#[derive(Clone, Debug, Default)]
pub struct Capability {
    pub name: String,
    pub description: Option<String>,
    pub types: Types,
    pub properties: Values,
    pub attributes: Values,
}

#[derive(Clone, Debug, Default)]
pub struct Interface {
    pub name: String,
    pub description: Option<String>,
    pub types: Types,
    pub inputs: Values,
    pub operations: BTreeMap<String, Operation>,
}

#[derive(Clone, Debug, Default)]
pub struct Operation {
    pub name: String,
    pub description: Option<String>,
    pub implementation: Option<String>,
    pub dependencies: Vec<String>,
    pub inputs: Values,
}

#[derive(Clone, Debug, Default)]
pub struct Artifact {
    pub name: String,
    pub description: Option<String>,
    pub types: Types,
    pub filename: Option<String>,
    pub source_url: Option<Url>,
    pub deploy_path: Option<String>,
    pub properties: Values,
}

#[derive(Clone, Debug, Default)]
pub struct Group {
    pub name: String,
    pub description: Option<String>,
    pub types: Types,
    pub properties: Values,
    /// Node template names.
    pub members: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Policy {
    pub name: String,
    pub description: Option<String>,
    pub types: Types,
    pub properties: Values,
    /// Node template or group names.
    pub targets: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Workflow {
    pub name: String,
    pub description: Option<String>,
    pub steps: BTreeMap<String, WorkflowStep>,
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowStep {
    pub name: String,
    pub target_node_template: Option<String>,
    pub target_group: Option<String>,
    pub activities: Vec<WorkflowActivity>,
    pub on_success: Vec<String>,
    pub on_failure: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum WorkflowActivity {
    Delegate(String),
    SetState(String),
    CallOperation { interface: String, operation: String },
    Inline(String),
}

#[derive(Clone, Debug, Default)]
pub struct MappedPort {
    pub node_template_name: String,
    pub port_name: String,
}

#[derive(Clone, Debug, Default)]
pub struct Substitution {
    pub type_name: String,
    pub types: Types,
    pub capability_mappings: BTreeMap<String, MappedPort>,
    pub requirement_mappings: BTreeMap<String, MappedPort>,
    /// Substituted property name to topology input name.
    pub property_mappings: BTreeMap<String, String>,
}

/// A named script fragment registered by a grammar or type metadata,
/// round-tripped into Clout metadata without evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scriptlet {
    /// Base URL for relative `path` resolution, when imported.
    pub origin: Option<Url>,
    /// Import path, mutually exclusive with embedded source.
    pub path: Option<String>,
    /// Embedded source.
    pub source: Option<String>,
    pub native_argument_indexes: Vec<usize>,
}

impl Scriptlet {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        if let Some(origin) = &self.origin {
            map.insert("origin".into(), ir::Value::from(origin.as_str()));
        }
        if let Some(path) = &self.path {
            map.insert("path".into(), ir::Value::from(path.clone()));
        }
        if let Some(source) = &self.source {
            map.insert("scriptlet".into(), ir::Value::from(source.clone()));
        }
        if !self.native_argument_indexes.is_empty() {
            map.insert(
                "nativeArgumentIndexes".into(),
                ir::Value::List(
                    self.native_argument_indexes
                        .iter()
                        .map(|index| ir::Value::Integer(*index as i64))
                        .collect(),
                ),
            );
        }
        ir::Value::Map(map)
    }
}

fn string_map_to_value(map: &Metadata) -> ir::Value {
    ir::Value::Map(
        map.iter()
            .map(|(k, v)| (ir::Value::from(k.clone()), ir::Value::from(v.clone())))
            .collect(),
    )
}

fn types_to_value(types: &Types) -> ir::Value {
    ir::Value::Map(
        types
            .iter()
            .map(|(name, information)| (ir::Value::from(name.clone()), information.to_value()))
            .collect(),
    )
}

fn insert_description(map: &mut ir::Map, description: &Option<String>) {
    if let Some(description) = description {
        map.insert("description".into(), ir::Value::from(description.clone()));
    }
}

impl NodeTemplate {
    /// Vertex property form: everything except requirements, which become
    /// edges of the Clout graph instead.
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        if !self.directives.is_empty() {
            map.insert(
                "directives".into(),
                ir::Value::List(
                    self.directives
                        .iter()
                        .map(|d| ir::Value::from(d.clone()))
                        .collect(),
                ),
            );
        }
        if !self.metadata.is_empty() {
            map.insert("metadata".into(), string_map_to_value(&self.metadata));
        }
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        map.insert("attributes".into(), constrainables_to_value(&self.attributes));
        map.insert(
            "capabilities".into(),
            ir::Value::Map(
                self.capabilities
                    .iter()
                    .map(|(name, c)| (ir::Value::from(name.clone()), c.to_value()))
                    .collect(),
            ),
        );
        map.insert(
            "interfaces".into(),
            ir::Value::Map(
                self.interfaces
                    .iter()
                    .map(|(name, i)| (ir::Value::from(name.clone()), i.to_value()))
                    .collect(),
            ),
        );
        map.insert(
            "artifacts".into(),
            ir::Value::Map(
                self.artifacts
                    .iter()
                    .map(|(name, a)| (ir::Value::from(name.clone()), a.to_value()))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }
}

impl Capability {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        map.insert("attributes".into(), constrainables_to_value(&self.attributes));
        ir::Value::Map(map)
    }
}

impl Interface {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        map.insert("inputs".into(), constrainables_to_value(&self.inputs));
        map.insert(
            "operations".into(),
            ir::Value::Map(
                self.operations
                    .iter()
                    .map(|(name, o)| (ir::Value::from(name.clone()), o.to_value()))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }
}

impl Operation {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        if let Some(implementation) = &self.implementation {
            map.insert(
                "implementation".into(),
                ir::Value::from(implementation.clone()),
            );
        }
        if !self.dependencies.is_empty() {
            map.insert(
                "dependencies".into(),
                ir::Value::List(
                    self.dependencies
                        .iter()
                        .map(|d| ir::Value::from(d.clone()))
                        .collect(),
                ),
            );
        }
        map.insert("inputs".into(), constrainables_to_value(&self.inputs));
        ir::Value::Map(map)
    }
}

impl Artifact {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        if let Some(filename) = &self.filename {
            map.insert("filename".into(), ir::Value::from(filename.clone()));
        }
        if let Some(source_url) = &self.source_url {
            map.insert("sourceUrl".into(), ir::Value::from(source_url.as_str()));
        }
        if let Some(deploy_path) = &self.deploy_path {
            map.insert("deployPath".into(), ir::Value::from(deploy_path.clone()));
        }
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        ir::Value::Map(map)
    }
}

impl Relationship {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("types".into(), types_to_value(&self.types));
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        map.insert("attributes".into(), constrainables_to_value(&self.attributes));
        map.insert(
            "interfaces".into(),
            ir::Value::Map(
                self.interfaces
                    .iter()
                    .map(|(name, i)| (ir::Value::from(name.clone()), i.to_value()))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }
}

impl Group {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        ir::Value::Map(map)
    }
}

impl Policy {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert("types".into(), types_to_value(&self.types));
        map.insert("properties".into(), constrainables_to_value(&self.properties));
        ir::Value::Map(map)
    }
}

impl Workflow {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        insert_description(&mut map, &self.description);
        map.insert(
            "steps".into(),
            ir::Value::Map(
                self.steps
                    .iter()
                    .map(|(name, s)| (ir::Value::from(name.clone()), s.to_value()))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }
}

impl WorkflowStep {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("name".into(), ir::Value::from(self.name.clone()));
        if let Some(target) = &self.target_node_template {
            map.insert("targetNodeTemplate".into(), ir::Value::from(target.clone()));
        }
        if let Some(target) = &self.target_group {
            map.insert("targetGroup".into(), ir::Value::from(target.clone()));
        }
        map.insert(
            "activities".into(),
            ir::Value::List(self.activities.iter().map(WorkflowActivity::to_value).collect()),
        );
        if !self.on_success.is_empty() {
            map.insert(
                "onSuccess".into(),
                ir::Value::List(
                    self.on_success
                        .iter()
                        .map(|s| ir::Value::from(s.clone()))
                        .collect(),
                ),
            );
        }
        if !self.on_failure.is_empty() {
            map.insert(
                "onFailure".into(),
                ir::Value::List(
                    self.on_failure
                        .iter()
                        .map(|s| ir::Value::from(s.clone()))
                        .collect(),
                ),
            );
        }
        ir::Value::Map(map)
    }
}

impl WorkflowActivity {
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        match self {
            WorkflowActivity::Delegate(workflow) => {
                map.insert("delegate".into(), ir::Value::from(workflow.clone()));
            }
            WorkflowActivity::SetState(state) => {
                map.insert("setState".into(), ir::Value::from(state.clone()));
            }
            WorkflowActivity::CallOperation {
                interface,
                operation,
            } => {
                map.insert(
                    "callOperation".into(),
                    ir::Value::from(format!("{interface}.{operation}")),
                );
            }
            WorkflowActivity::Inline(workflow) => {
                map.insert("inline".into(), ir::Value::from(workflow.clone()));
            }
        }
        ir::Value::Map(map)
    }
}

impl Substitution {
    pub fn to_value(&self) -> ir::Value {
        fn mappings_to_value(mappings: &BTreeMap<String, MappedPort>) -> ir::Value {
            ir::Value::Map(
                mappings
                    .iter()
                    .map(|(name, port)| {
                        let mut entry = ir::Map::new();
                        entry.insert(
                            "nodeTemplate".into(),
                            ir::Value::from(port.node_template_name.clone()),
                        );
                        entry.insert("port".into(), ir::Value::from(port.port_name.clone()));
                        (ir::Value::from(name.clone()), ir::Value::Map(entry))
                    })
                    .collect(),
            )
        }

        let mut map = ir::Map::new();
        map.insert("typeName".into(), ir::Value::from(self.type_name.clone()));
        map.insert("types".into(), types_to_value(&self.types));
        map.insert(
            "capabilityMappings".into(),
            mappings_to_value(&self.capability_mappings),
        );
        map.insert(
            "requirementMappings".into(),
            mappings_to_value(&self.requirement_mappings),
        );
        map.insert(
            "propertyMappings".into(),
            ir::Value::Map(
                self.property_mappings
                    .iter()
                    .map(|(k, v)| (ir::Value::from(k.clone()), ir::Value::from(v.clone())))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }
}

impl ServiceTemplate {
    pub fn scriptlets_to_value(&self) -> ir::Value {
        ir::Value::Map(
            self.scriptlet_namespace
                .iter()
                .map(|(name, scriptlet)| (ir::Value::from(name.clone()), scriptlet.to_value()))
                .collect(),
        )
    }

    pub fn metadata_to_value(&self) -> ir::Value {
        string_map_to_value(&self.metadata)
    }
}
