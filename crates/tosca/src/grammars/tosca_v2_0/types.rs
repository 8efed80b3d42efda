use super::definitions::{
    read_attribute_definition, read_capability_definition, read_interface_definition,
    read_operation_definition, read_property_definition, read_requirement_definition,
};
use super::templates::read_artifact;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use std::collections::BTreeMap;

/// Fields shared by every type entity.
#[derive(Debug, Default)]
pub struct TypeCommon {
    pub parent_name: Option<String>,
    pub parent: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl TypeCommon {
    fn read(ctx: &ReadCtx<'_>, fields: &mut FieldReader<'_, '_>) -> TypeCommon {
        if ctx.catalog.quirks.annotations_ignore {
            fields.ignore("annotations");
        }
        TypeCommon {
            parent_name: fields.string("derived_from"),
            parent: None,
            metadata: fields.string_map("metadata").unwrap_or_default(),
            description: fields.string("description"),
            version: fields.string("version"),
        }
    }
}

#[derive(Debug, Default)]
pub struct NodeType {
    pub common: TypeCommon,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub attribute_definitions: BTreeMap<String, EntityId>,
    pub capability_definitions: BTreeMap<String, EntityId>,
    /// Ordered and override-by-name, hence a list.
    pub requirement_definitions: Vec<EntityId>,
    pub interface_definitions: BTreeMap<String, EntityId>,
    pub artifact_definitions: BTreeMap<String, EntityId>,
}

pub fn read_node_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let node_type = NodeType {
        common: TypeCommon::read(ctx, &mut fields),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        attribute_definitions: fields
            .entity_map("attributes", read_attribute_definition as Reader),
        capability_definitions: fields
            .entity_map("capabilities", read_capability_definition as Reader),
        requirement_definitions: fields
            .keyed_entity_list("requirements", read_requirement_definition as Reader),
        interface_definitions: fields
            .entity_map("interfaces", read_interface_definition as Reader),
        artifact_definitions: fields.entity_map("artifacts", read_artifact as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::NodeType(node_type))
}

#[derive(Debug, Default)]
pub struct CapabilityType {
    pub common: TypeCommon,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub attribute_definitions: BTreeMap<String, EntityId>,
    pub valid_source_types: Vec<String>,
}

pub fn read_capability_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let capability_type = CapabilityType {
        common: TypeCommon::read(ctx, &mut fields),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        attribute_definitions: fields
            .entity_map("attributes", read_attribute_definition as Reader),
        valid_source_types: fields.string_list("valid_source_types").unwrap_or_default(),
    };
    fields.finish();
    ctx.alloc(Kind::CapabilityType(capability_type))
}

#[derive(Debug, Default)]
pub struct RelationshipType {
    pub common: TypeCommon,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub attribute_definitions: BTreeMap<String, EntityId>,
    pub interface_definitions: BTreeMap<String, EntityId>,
    pub valid_target_types: Vec<String>,
}

pub fn read_relationship_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let relationship_type = RelationshipType {
        common: TypeCommon::read(ctx, &mut fields),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        attribute_definitions: fields
            .entity_map("attributes", read_attribute_definition as Reader),
        interface_definitions: fields
            .entity_map("interfaces", read_interface_definition as Reader),
        valid_target_types: fields.string_list("valid_target_types").unwrap_or_default(),
    };
    fields.finish();
    ctx.alloc(Kind::RelationshipType(relationship_type))
}

#[derive(Debug, Default)]
pub struct InterfaceType {
    pub common: TypeCommon,
    pub input_definitions: BTreeMap<String, EntityId>,
    pub operation_definitions: BTreeMap<String, EntityId>,
}

pub fn read_interface_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let interface_type = InterfaceType {
        common: TypeCommon::read(ctx, &mut fields),
        input_definitions: fields.entity_map("inputs", read_property_definition as Reader),
        operation_definitions: fields
            .entity_map("operations", read_operation_definition as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::InterfaceType(interface_type))
}

#[derive(Debug, Default)]
pub struct ArtifactType {
    pub common: TypeCommon,
    pub mime_type: Option<String>,
    pub file_ext: Vec<String>,
    pub property_definitions: BTreeMap<String, EntityId>,
}

pub fn read_artifact_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let artifact_type = ArtifactType {
        common: TypeCommon::read(ctx, &mut fields),
        mime_type: fields.string("mime_type"),
        file_ext: fields.string_list("file_ext").unwrap_or_default(),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::ArtifactType(artifact_type))
}

#[derive(Debug, Default)]
pub struct GroupType {
    pub common: TypeCommon,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub attribute_definitions: BTreeMap<String, EntityId>,
    /// Node types whose templates may be members.
    pub member_names: Vec<String>,
    pub members: Vec<EntityId>,
}

pub fn read_group_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let group_type = GroupType {
        common: TypeCommon::read(ctx, &mut fields),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        attribute_definitions: fields
            .entity_map("attributes", read_attribute_definition as Reader),
        member_names: fields.string_list("members").unwrap_or_default(),
        members: Vec::new(),
    };
    fields.finish();
    ctx.alloc(Kind::GroupType(group_type))
}

#[derive(Debug, Default)]
pub struct PolicyType {
    pub common: TypeCommon,
    pub property_definitions: BTreeMap<String, EntityId>,
    /// Node types or group types the policy may target.
    pub target_names: Vec<String>,
    pub targets: Vec<EntityId>,
}

pub fn read_policy_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let policy_type = PolicyType {
        common: TypeCommon::read(ctx, &mut fields),
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        target_names: fields.string_list("targets").unwrap_or_default(),
        targets: Vec::new(),
    };
    fields.finish();
    ctx.alloc(Kind::PolicyType(policy_type))
}
