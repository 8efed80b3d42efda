use super::definitions::read_parameter_definition;
use super::misc::{Implementation, Mapping};
use super::value::{read_attribute_value, read_value};
use super::workflows::read_workflow;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use std::collections::BTreeMap;

/// The service topology: inputs, outputs, templates, groups, policies,
/// workflows, and the substitution exposure.
#[derive(Debug, Default)]
pub struct TopologyTemplate {
    pub description: Option<String>,
    pub input_definitions: BTreeMap<String, EntityId>,
    pub output_definitions: BTreeMap<String, EntityId>,
    pub node_templates: BTreeMap<String, EntityId>,
    pub relationship_templates: BTreeMap<String, EntityId>,
    pub groups: BTreeMap<String, EntityId>,
    pub policies: Vec<EntityId>,
    pub workflows: BTreeMap<String, EntityId>,
    pub substitution: Option<EntityId>,
}

pub fn read_topology_template(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let topology = TopologyTemplate {
        description: fields.string("description"),
        input_definitions: fields.entity_map("inputs", read_parameter_definition as Reader),
        output_definitions: fields.entity_map("outputs", read_parameter_definition as Reader),
        node_templates: fields.entity_map("node_templates", read_node_template as Reader),
        relationship_templates: fields
            .entity_map("relationship_templates", read_relationship_template as Reader),
        groups: fields.entity_map("groups", read_group as Reader),
        policies: fields.keyed_entity_list("policies", read_policy as Reader),
        workflows: fields.entity_map("workflows", read_workflow as Reader),
        substitution: fields.entity("substitution_mappings", read_substitution_mappings as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::TopologyTemplate(topology))
}

#[derive(Debug, Default)]
pub struct NodeTemplate {
    pub directives: Vec<String>,
    pub copy_name: Option<String>,
    pub copy: Option<EntityId>,
    pub type_name: Option<String>,
    pub node_type: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub attributes: BTreeMap<String, EntityId>,
    pub capabilities: BTreeMap<String, EntityId>,
    pub requirements: Vec<EntityId>,
    pub interfaces: BTreeMap<String, EntityId>,
    pub artifacts: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_node_template(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let template = NodeTemplate {
        directives: fields.string_list("directives").unwrap_or_default(),
        copy_name: fields.string("copy"),
        copy: None,
        type_name: fields.required_string("type"),
        node_type: None,
        metadata: fields.string_map("metadata").unwrap_or_default(),
        description: fields.string("description"),
        properties: fields.entity_map("properties", read_value as Reader),
        attributes: fields.entity_map("attributes", read_attribute_value as Reader),
        capabilities: fields.entity_map("capabilities", read_capability_assignment as Reader),
        requirements: fields
            .keyed_entity_list("requirements", read_requirement_assignment as Reader),
        interfaces: fields.entity_map("interfaces", read_interface_assignment as Reader),
        artifacts: fields.entity_map("artifacts", read_artifact as Reader),
        rendered: false,
    };
    fields.finish();

    if matches!(ctx.name.as_str(), "SELF" | "SOURCE" | "TARGET") {
        ctx.report(
            "ReservedName",
            format!("node template name is reserved: {:?}", ctx.name),
        );
    }

    ctx.alloc(Kind::NodeTemplate(template))
}

#[derive(Debug, Default)]
pub struct RelationshipTemplate {
    pub copy_name: Option<String>,
    pub copy: Option<EntityId>,
    pub type_name: Option<String>,
    pub relationship_type: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub attributes: BTreeMap<String, EntityId>,
    pub interfaces: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_relationship_template(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let template = RelationshipTemplate {
        copy_name: fields.string("copy"),
        copy: None,
        type_name: fields.required_string("type"),
        relationship_type: None,
        metadata: fields.string_map("metadata").unwrap_or_default(),
        description: fields.string("description"),
        properties: fields.entity_map("properties", read_value as Reader),
        attributes: fields.entity_map("attributes", read_attribute_value as Reader),
        interfaces: fields.entity_map("interfaces", read_interface_assignment as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::RelationshipTemplate(template))
}

/// A requirement assignment: short form is `- name: target`.
#[derive(Debug, Default)]
pub struct RequirementAssignment {
    pub node_name: Option<String>,
    pub capability_name: Option<String>,
    pub relationship: Option<EntityId>,
    /// Resolved during lookup: a sibling template, or a type to select by.
    pub node_template: Option<EntityId>,
    pub node_type: Option<EntityId>,
}

pub fn read_requirement_assignment(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare node template (or type) name.
    if let ir::Value::String(node) = data {
        return ctx.alloc(Kind::RequirementAssignment(RequirementAssignment {
            node_name: Some(node.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let assignment = RequirementAssignment {
        node_name: fields.string("node"),
        capability_name: fields.string("capability"),
        relationship: fields
            .entity("relationship", read_relationship_assignment as Reader),
        node_template: None,
        node_type: None,
    };
    fields.finish();
    ctx.alloc(Kind::RequirementAssignment(assignment))
}

#[derive(Debug, Default)]
pub struct CapabilityAssignment {
    pub properties: BTreeMap<String, EntityId>,
    pub attributes: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_capability_assignment(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let assignment = CapabilityAssignment {
        properties: fields.entity_map("properties", read_value as Reader),
        attributes: fields.entity_map("attributes", read_attribute_value as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::CapabilityAssignment(assignment))
}

#[derive(Debug, Default)]
pub struct RelationshipAssignment {
    /// A relationship type or a relationship template name.
    pub type_name: Option<String>,
    pub relationship_type: Option<EntityId>,
    pub relationship_template: Option<EntityId>,
    pub properties: BTreeMap<String, EntityId>,
    pub interfaces: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_relationship_assignment(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare relationship type (or template) name.
    if let ir::Value::String(type_name) = data {
        return ctx.alloc(Kind::RelationshipAssignment(RelationshipAssignment {
            type_name: Some(type_name.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let assignment = RelationshipAssignment {
        type_name: fields.string("type"),
        relationship_type: None,
        relationship_template: None,
        properties: fields.entity_map("properties", read_value as Reader),
        interfaces: fields.entity_map("interfaces", read_interface_assignment as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::RelationshipAssignment(assignment))
}

#[derive(Debug, Default)]
pub struct InterfaceAssignment {
    pub inputs: BTreeMap<String, EntityId>,
    pub operations: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_interface_assignment(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let assignment = InterfaceAssignment {
        inputs: fields.entity_map("inputs", read_value as Reader),
        operations: fields.entity_map("operations", read_operation_assignment as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::InterfaceAssignment(assignment))
}

#[derive(Debug, Default)]
pub struct OperationAssignment {
    pub implementation: Option<Implementation>,
    pub inputs: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_operation_assignment(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare implementation artifact.
    if let ir::Value::String(_) = data {
        return ctx.alloc(Kind::OperationAssignment(OperationAssignment {
            implementation: Some(Implementation::read(ctx, data)),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let assignment = OperationAssignment {
        implementation: fields
            .raw("implementation")
            .map(|raw| Implementation::read(&ctx.field("implementation"), &raw)),
        inputs: fields.entity_map("inputs", read_value as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::OperationAssignment(assignment))
}

#[derive(Debug, Default)]
pub struct Artifact {
    pub type_name: Option<String>,
    pub artifact_type: Option<EntityId>,
    pub file: Option<String>,
    pub repository_name: Option<String>,
    pub repository: Option<EntityId>,
    pub description: Option<String>,
    pub deploy_path: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub rendered: bool,
}

pub fn read_artifact(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare file path.
    if let ir::Value::String(file) = data {
        return ctx.alloc(Kind::Artifact(Artifact {
            file: Some(file.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let artifact = Artifact {
        type_name: fields.required_string("type"),
        artifact_type: None,
        file: fields.required_string("file"),
        repository_name: fields.string("repository"),
        repository: None,
        description: fields.string("description"),
        deploy_path: fields.string("deploy_path"),
        properties: fields.entity_map("properties", read_value as Reader),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::Artifact(artifact))
}

#[derive(Debug, Default)]
pub struct Group {
    pub type_name: Option<String>,
    pub group_type: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub member_names: Vec<String>,
    pub members: Vec<EntityId>,
    pub rendered: bool,
}

pub fn read_group(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let group = Group {
        type_name: fields.required_string("type"),
        group_type: None,
        metadata: fields.string_map("metadata").unwrap_or_default(),
        description: fields.string("description"),
        properties: fields.entity_map("properties", read_value as Reader),
        member_names: fields.string_list("members").unwrap_or_default(),
        members: Vec::new(),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::Group(group))
}

#[derive(Debug, Default)]
pub struct Policy {
    pub type_name: Option<String>,
    pub policy_type: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub target_names: Vec<String>,
    /// Resolved node templates and groups, in declaration order.
    pub targets: Vec<EntityId>,
    pub rendered: bool,
}

pub fn read_policy(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let policy = Policy {
        type_name: fields.required_string("type"),
        policy_type: None,
        metadata: fields.string_map("metadata").unwrap_or_default(),
        description: fields.string("description"),
        properties: fields.entity_map("properties", read_value as Reader),
        target_names: fields.string_list("targets").unwrap_or_default(),
        targets: Vec::new(),
        rendered: false,
    };
    fields.finish();
    ctx.alloc(Kind::Policy(policy))
}

#[derive(Debug, Default)]
pub struct SubstitutionMappings {
    pub node_type_name: Option<String>,
    pub node_type: Option<EntityId>,
    pub capability_mappings: BTreeMap<String, Mapping>,
    pub requirement_mappings: BTreeMap<String, Mapping>,
    pub property_mappings: BTreeMap<String, String>,
}

pub fn read_substitution_mappings(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    fn read_mappings(
        ctx: &ReadCtx<'_>,
        fields: &mut FieldReader<'_, '_>,
        key: &str,
        allow_list_form: bool,
    ) -> BTreeMap<String, Mapping> {
        let Some(raw) = fields.raw(key) else {
            return BTreeMap::new();
        };
        let ctx = ctx.field(key);
        let Some(map) = raw.as_map() else {
            ctx.report_wrong_type("map", &raw);
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(name, target)| {
                let name = name.key_string();
                let entry_ctx = ctx.child_key(&name);
                // The list-form quirk wraps each mapping in a one-element
                // list.
                let target = match target {
                    ir::Value::List(list)
                        if allow_list_form
                            && list.len() == 1
                            && list[0].as_list().is_some() =>
                    {
                        &list[0]
                    }
                    other => other,
                };
                Mapping::read(&entry_ctx, target).map(|mapping| (name, mapping))
            })
            .collect()
    }

    // Property mappings arrive as `prop: [input]` or `prop: input`; both
    // reduce to the input name.
    fn read_property_mappings(
        ctx: &ReadCtx<'_>,
        fields: &mut FieldReader<'_, '_>,
    ) -> BTreeMap<String, String> {
        let Some(raw) = fields.raw("properties") else {
            return BTreeMap::new();
        };
        let ctx = ctx.field("properties");
        let Some(map) = raw.as_map() else {
            ctx.report_wrong_type("map", &raw);
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(name, target)| {
                let name = name.key_string();
                let input = match target {
                    ir::Value::String(input) => Some(input.clone()),
                    ir::Value::List(list) if list.len() == 1 => {
                        list[0].as_str().map(str::to_string)
                    }
                    _ => None,
                };
                match input {
                    Some(input) => Some((name, input)),
                    None => {
                        ctx.child_key(&name)
                            .report_wrong_type("input name", target);
                        None
                    }
                }
            })
            .collect()
    }

    let mut fields = FieldReader::new(ctx, data);
    let node_type_name = fields.required_string("node_type");
    let allow_list_form = ctx.catalog.quirks.substitution_mappings_requirements_list;
    let substitution = SubstitutionMappings {
        node_type_name,
        node_type: None,
        capability_mappings: read_mappings(ctx, &mut fields, "capabilities", false),
        requirement_mappings: read_mappings(ctx, &mut fields, "requirements", allow_list_form),
        property_mappings: read_property_mappings(ctx, &mut fields),
    };
    fields.finish();
    ctx.alloc(Kind::SubstitutionMappings(substitution))
}
