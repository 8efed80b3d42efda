use super::data::ConstraintClause;
use super::misc::{Implementation, Occurrences};
use super::value::{read_attribute_value, read_value};
use super::{data, misc};
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use std::collections::BTreeMap;

/// Shared shape of attribute, property and parameter definitions.
#[derive(Debug, Default)]
pub struct AttributeDefinition {
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub type_name: Option<String>,
    pub key_schema: Option<EntityId>,
    pub entry_schema: Option<EntityId>,
    pub default: Option<EntityId>,
    pub status: Option<String>,
    pub data_type: Option<EntityId>,
    pub rendered: bool,
}

impl AttributeDefinition {
    fn read_fields(
        ctx: &ReadCtx<'_>,
        fields: &mut FieldReader<'_, '_>,
        default_reader: Reader,
    ) -> AttributeDefinition {
        if ctx.catalog.quirks.annotations_ignore {
            fields.ignore("annotations");
        }
        AttributeDefinition {
            metadata: fields.string_map("metadata").unwrap_or_default(),
            description: fields.string("description"),
            type_name: fields.string("type"),
            key_schema: fields.entity("key_schema", data::read_schema as Reader),
            entry_schema: fields.entity("entry_schema", data::read_schema as Reader),
            default: fields.entity("default", default_reader),
            status: fields.string("status"),
            data_type: None,
            rendered: false,
        }
    }

    /// Inherit every field absent locally. Type compatibility between the
    /// overriding and overridden data type is validated by the caller,
    /// which has hierarchy access.
    pub fn inherit(&mut self, parent: &AttributeDefinition) {
        if self.description.is_none() {
            self.description = parent.description.clone();
        }
        if self.type_name.is_none() {
            self.type_name = parent.type_name.clone();
        }
        if self.key_schema.is_none() {
            self.key_schema = parent.key_schema;
        }
        if self.entry_schema.is_none() {
            self.entry_schema = parent.entry_schema;
        }
        if self.default.is_none() {
            self.default = parent.default;
        }
        if self.status.is_none() {
            self.status = parent.status.clone();
        }
        if self.data_type.is_none() {
            self.data_type = parent.data_type;
        }
    }
}

pub fn read_attribute_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    // Attribute defaults unpack the long notation.
    let definition =
        AttributeDefinition::read_fields(ctx, &mut fields, read_attribute_value as Reader);
    fields.finish();
    ctx.alloc(Kind::AttributeDefinition(definition))
}

#[derive(Debug, Default)]
pub struct PropertyDefinition {
    pub attribute: AttributeDefinition,
    /// Defaults to true when unstated.
    pub required: Option<bool>,
    pub constraints: Vec<ConstraintClause>,
}

impl PropertyDefinition {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    pub fn inherit(&mut self, parent: &PropertyDefinition) {
        self.attribute.inherit(&parent.attribute);
        if self.required.is_none() {
            self.required = parent.required;
        }
        let mut constraints = parent.constraints.clone();
        constraints.extend(std::mem::take(&mut self.constraints));
        self.constraints = constraints;
    }
}

pub fn read_property_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let definition = PropertyDefinition {
        attribute: AttributeDefinition::read_fields(ctx, &mut fields, read_value as Reader),
        required: fields.boolean("required"),
        constraints: fields
            .raw("constraints")
            .map(|raw| ConstraintClause::read_list(&ctx.field("constraints"), &raw))
            .unwrap_or_default(),
    };
    fields.finish();
    ctx.alloc(Kind::PropertyDefinition(definition))
}

/// A topology input or output. Unlike properties, the type is optional
/// (untyped parameters pass values through) and a value may be assigned
/// in place.
#[derive(Debug, Default)]
pub struct ParameterDefinition {
    pub property: PropertyDefinition,
    pub value: Option<EntityId>,
}

pub fn read_parameter_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Output shorthand: a bare value or function call instead of a map.
    let looks_like_definition = data
        .as_map()
        .map(|map| {
            map.keys()
                .all(|key| key.as_str().map(|k| PARAMETER_KEYS.contains(&k)).unwrap_or(false))
        })
        .unwrap_or(false);

    if !looks_like_definition {
        let value = read_value(ctx, data);
        return ctx.alloc(Kind::ParameterDefinition(ParameterDefinition {
            property: PropertyDefinition::default(),
            value: Some(value),
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let definition = ParameterDefinition {
        property: PropertyDefinition {
            attribute: AttributeDefinition::read_fields(ctx, &mut fields, read_value as Reader),
            required: fields.boolean("required"),
            constraints: fields
                .raw("constraints")
                .map(|raw| ConstraintClause::read_list(&ctx.field("constraints"), &raw))
                .unwrap_or_default(),
        },
        value: fields.entity("value", read_value as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::ParameterDefinition(definition))
}

static PARAMETER_KEYS: &[&str] = &[
    "type",
    "description",
    "metadata",
    "required",
    "default",
    "status",
    "constraints",
    "key_schema",
    "entry_schema",
    "value",
    "mapping",
    "annotations",
];

#[derive(Debug, Default)]
pub struct CapabilityDefinition {
    pub description: Option<String>,
    pub type_name: Option<String>,
    pub capability_type: Option<EntityId>,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub attribute_definitions: BTreeMap<String, EntityId>,
    pub valid_source_types: Vec<String>,
    pub occurrences: Option<Occurrences>,
}

impl CapabilityDefinition {
    pub fn inherit(&mut self, parent: &CapabilityDefinition) {
        if self.description.is_none() {
            self.description = parent.description.clone();
        }
        if self.type_name.is_none() {
            self.type_name = parent.type_name.clone();
        }
        if self.capability_type.is_none() {
            self.capability_type = parent.capability_type;
        }
        if self.valid_source_types.is_empty() {
            self.valid_source_types = parent.valid_source_types.clone();
        }
        if self.occurrences.is_none() {
            self.occurrences = parent.occurrences.clone();
        }
    }
}

pub fn read_capability_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare capability type name.
    if let ir::Value::String(type_name) = data {
        return ctx.alloc(Kind::CapabilityDefinition(CapabilityDefinition {
            type_name: Some(type_name.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let definition = CapabilityDefinition {
        description: fields.string("description"),
        type_name: fields.required_string("type"),
        capability_type: None,
        property_definitions: fields.entity_map("properties", read_property_definition as Reader),
        attribute_definitions: fields
            .entity_map("attributes", read_attribute_definition as Reader),
        valid_source_types: fields.string_list("valid_source_types").unwrap_or_default(),
        occurrences: fields
            .raw("occurrences")
            .and_then(|raw| Occurrences::read(&ctx.field("occurrences"), &raw)),
    };
    fields.finish();
    ctx.alloc(Kind::CapabilityDefinition(definition))
}

#[derive(Debug, Default)]
pub struct RequirementDefinition {
    pub capability_type_name: Option<String>,
    pub capability_type: Option<EntityId>,
    pub node_type_name: Option<String>,
    pub node_type: Option<EntityId>,
    pub relationship: Option<EntityId>,
    pub occurrences: Option<Occurrences>,
}

impl RequirementDefinition {
    pub fn inherit(&mut self, parent: &RequirementDefinition) {
        if self.capability_type_name.is_none() {
            self.capability_type_name = parent.capability_type_name.clone();
        }
        if self.capability_type.is_none() {
            self.capability_type = parent.capability_type;
        }
        if self.node_type_name.is_none() {
            self.node_type_name = parent.node_type_name.clone();
        }
        if self.node_type.is_none() {
            self.node_type = parent.node_type;
        }
        if self.relationship.is_none() {
            self.relationship = parent.relationship;
        }
        if self.occurrences.is_none() {
            self.occurrences = parent.occurrences.clone();
        }
    }
}

pub fn read_requirement_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare capability type name.
    if let ir::Value::String(capability) = data {
        return ctx.alloc(Kind::RequirementDefinition(RequirementDefinition {
            capability_type_name: Some(capability.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let definition = RequirementDefinition {
        capability_type_name: fields.required_string("capability"),
        capability_type: None,
        node_type_name: fields.string("node"),
        node_type: None,
        relationship: fields.entity("relationship", read_relationship_definition as Reader),
        occurrences: fields
            .raw("occurrences")
            .and_then(|raw| Occurrences::read(&ctx.field("occurrences"), &raw)),
    };
    fields.finish();
    ctx.alloc(Kind::RequirementDefinition(definition))
}

#[derive(Debug, Default)]
pub struct RelationshipDefinition {
    pub type_name: Option<String>,
    pub relationship_type: Option<EntityId>,
    pub interface_definitions: BTreeMap<String, EntityId>,
}

pub fn read_relationship_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    if let ir::Value::String(type_name) = data {
        return ctx.alloc(Kind::RelationshipDefinition(RelationshipDefinition {
            type_name: Some(type_name.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let definition = RelationshipDefinition {
        type_name: fields.required_string("type"),
        relationship_type: None,
        interface_definitions: fields.entity_map("interfaces", read_interface_definition as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::RelationshipDefinition(definition))
}

#[derive(Debug, Default)]
pub struct InterfaceDefinition {
    pub type_name: Option<String>,
    pub interface_type: Option<EntityId>,
    pub input_definitions: BTreeMap<String, EntityId>,
    pub operation_definitions: BTreeMap<String, EntityId>,
}

impl InterfaceDefinition {
    pub fn inherit(&mut self, parent: &InterfaceDefinition) {
        if self.type_name.is_none() {
            self.type_name = parent.type_name.clone();
        }
        if self.interface_type.is_none() {
            self.interface_type = parent.interface_type;
        }
    }
}

pub fn read_interface_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let definition = InterfaceDefinition {
        type_name: fields.string("type"),
        interface_type: None,
        input_definitions: fields.entity_map("inputs", read_property_definition as Reader),
        operation_definitions: fields.entity_map("operations", read_operation_definition as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::InterfaceDefinition(definition))
}

#[derive(Debug, Default)]
pub struct OperationDefinition {
    pub description: Option<String>,
    pub implementation: Option<Implementation>,
    pub input_definitions: BTreeMap<String, EntityId>,
}

pub fn read_operation_definition(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    // Short notation: a bare implementation artifact.
    if let ir::Value::String(_) = data {
        return ctx.alloc(Kind::OperationDefinition(OperationDefinition {
            description: None,
            implementation: Some(misc::Implementation::read(ctx, data)),
            input_definitions: BTreeMap::new(),
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let definition = OperationDefinition {
        description: fields.string("description"),
        implementation: fields
            .raw("implementation")
            .map(|raw| Implementation::read(&ctx.field("implementation"), &raw)),
        input_definitions: fields.entity_map("inputs", read_property_definition as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::OperationDefinition(definition))
}
