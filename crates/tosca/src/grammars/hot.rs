//! The Heat Orchestration Template grammar: a compact reader set that
//! flows through the same pipeline. Resources have no type hierarchy;
//! `depends_on` references become graph edges at normalization.

use crate::catalog::Catalog;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use crate::grammar::Grammar;
use crate::scriptlets::ScriptletNamespace;
use normal::{CallArgument, Constrainable, FunctionCall, TypeInformation};
use std::collections::BTreeMap;

pub static GRAMMAR: Grammar = Grammar {
    name: "hot",
    selector_key: "heat_template_version",
    versions: &[
        ("2013-05-23", None),
        ("2014-10-16", None),
        ("2015-04-30", None),
        ("2015-10-15", None),
        ("2016-04-08", None),
        ("2016-10-14", None),
        ("newton", None),
        ("2017-02-24", None),
        ("ocata", None),
        ("2017-09-01", None),
        ("pike", None),
        ("2018-03-02", None),
        ("queens", None),
        ("2018-08-31", None),
        ("rocky", None),
        ("2021-04-16", None),
        ("wallaby", None),
    ],
    read_root,
    read_file: read_root,
    register: |_, _| {},
};

/// HOT intrinsic functions.
static FUNCTION_NAMES: &[&str] = &[
    "get_param",
    "get_resource",
    "get_attr",
    "get_file",
    "list_join",
    "str_replace",
    "str_split",
    "map_merge",
    "map_replace",
    "repeat",
    "digest",
    "resource_facade",
    "yaql",
    "if",
];

fn to_function_call(ctx: &ReadCtx<'_>, data: &ir::Value) -> Option<FunctionCall> {
    let map = data.as_map()?;
    if map.len() != 1 {
        return None;
    }
    let (key, arguments) = map.iter().next().expect("len was checked");
    let name = key.as_str()?;
    if !FUNCTION_NAMES.contains(&name) {
        return None;
    }

    let arguments = match arguments {
        ir::Value::List(list) => list
            .iter()
            .map(|argument| match to_function_call(ctx, argument) {
                Some(call) => CallArgument::Call(Box::new(call)),
                None => CallArgument::Literal(argument.clone()),
            })
            .collect(),
        other => vec![match to_function_call(ctx, other) {
            Some(call) => CallArgument::Call(Box::new(call)),
            None => CallArgument::Literal(other.clone()),
        }],
    };

    Some(
        FunctionCall::new(name, arguments).at(
            Some(ctx.catalog.file_url(ctx.file)),
            ctx.path.clone(),
        ),
    )
}

fn read_hot_value(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    use crate::grammars::tosca_v2_0::{Value, ValueData};
    let data = match to_function_call(ctx, data) {
        Some(call) => ValueData::Call(call),
        None => ValueData::Raw(data.clone()),
    };
    ctx.alloc(Kind::Value(Value {
        data,
        description: None,
        data_type: None,
        constraints: Vec::new(),
        converter: None,
        comparer: None,
        information: normal::ValueInformation::default(),
        // HOT values have no schema pass of their own.
        rendered: true,
    }))
}

#[derive(Debug, Default)]
pub struct Template {
    pub description: Option<String>,
    pub parameters: BTreeMap<String, EntityId>,
    pub resources: BTreeMap<String, EntityId>,
    pub outputs: BTreeMap<String, EntityId>,
}

fn read_root(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    fields.ignore("heat_template_version");
    fields.ignore("parameter_groups");
    fields.ignore("conditions");
    let template = Template {
        description: fields.string("description"),
        parameters: fields.entity_map("parameters", read_parameter as Reader),
        resources: fields.entity_map("resources", read_resource as Reader),
        outputs: fields.entity_map("outputs", read_output as Reader),
    };
    fields.finish();
    ctx.alloc(Kind::HotTemplate(template))
}

#[derive(Debug, Default)]
pub struct Parameter {
    pub type_name: Option<String>,
    pub description: Option<String>,
    pub default: Option<ir::Value>,
    pub hidden: Option<bool>,
    /// Externally supplied before rendering, overriding the default.
    pub value: Option<ir::Value>,
}

static PARAMETER_TYPES: &[&str] = &["string", "number", "comma_delimited_list", "json", "boolean"];

fn read_parameter(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    fields.ignore("constraints");
    fields.ignore("label");
    fields.ignore("immutable");
    let parameter = Parameter {
        type_name: fields.required_string("type"),
        description: fields.string("description"),
        default: fields.raw("default"),
        hidden: fields.boolean("hidden"),
        value: None,
    };
    fields.finish();

    if let Some(type_name) = &parameter.type_name {
        if !PARAMETER_TYPES.contains(&type_name.as_str()) {
            ctx.field("type").report(
                "WrongType",
                format!("unsupported parameter type: {type_name:?}"),
            );
        }
    }

    ctx.alloc(Kind::HotParameter(parameter))
}

#[derive(Debug, Default)]
pub struct Resource {
    pub type_name: Option<String>,
    pub properties: BTreeMap<String, EntityId>,
    pub depends_on: Vec<String>,
    /// Resolved sibling resources.
    pub dependencies: Vec<EntityId>,
}

fn read_resource(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    fields.ignore("metadata");
    fields.ignore("condition");
    fields.ignore("deletion_policy");
    fields.ignore("update_policy");
    fields.ignore("external_id");

    // depends_on accepts a bare name or a list of names.
    let depends_on = match fields.raw("depends_on") {
        Some(ir::Value::String(name)) => vec![name],
        Some(ir::Value::List(list)) => {
            let ctx = ctx.field("depends_on");
            list.iter()
                .enumerate()
                .filter_map(|(index, entry)| match entry.as_str() {
                    Some(name) => Some(name.to_string()),
                    None => {
                        ctx.child_index(index).report_wrong_type("string", entry);
                        None
                    }
                })
                .collect()
        }
        Some(other) => {
            ctx.field("depends_on")
                .report_wrong_type("string or list of string", &other);
            Vec::new()
        }
        None => Vec::new(),
    };

    let resource = Resource {
        type_name: fields.required_string("type"),
        properties: fields.entity_map("properties", read_hot_value as Reader),
        depends_on,
        dependencies: Vec::new(),
    };
    fields.finish();
    ctx.alloc(Kind::HotResource(resource))
}

#[derive(Debug, Default)]
pub struct Output {
    pub description: Option<String>,
    pub value: Option<EntityId>,
}

fn read_output(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    fields.ignore("condition");
    let output = Output {
        description: fields.string("description"),
        value: fields.entity("value", read_hot_value as Reader),
    };
    fields.finish();

    if output.value.is_none() {
        ctx.field("value").report(
            "FieldMissing",
            "required field missing: \"value\"".to_string(),
        );
    }

    ctx.alloc(Kind::HotOutput(output))
}

/// Validate a parameter's effective value against its declared type.
pub fn render_parameter(catalog: &Catalog, id: EntityId) {
    let snapshot = catalog.arena.with(id, |entity| match &entity.kind {
        Kind::HotParameter(parameter) => Some((
            parameter.type_name.clone(),
            parameter.value.clone().or_else(|| parameter.default.clone()),
            entity.meta.clone(),
        )),
        _ => None,
    });
    let Some((type_name, effective, meta)) = snapshot else {
        return;
    };
    let (Some(type_name), Some(effective)) = (type_name, effective) else {
        return;
    };

    let ok = match type_name.as_str() {
        "string" => effective.as_str().is_some(),
        "number" => effective.as_float().is_some(),
        "comma_delimited_list" => effective.as_str().is_some() || effective.as_list().is_some(),
        "json" => matches!(effective, ir::Value::Map(_) | ir::Value::List(_)),
        "boolean" => effective.as_bool().is_some(),
        _ => true, // already reported at read
    };
    if !ok {
        catalog.report(
            &catalog.site_of(&meta),
            "WrongType",
            format!(
                "wrong type: expected {type_name}, got {}",
                effective.type_name()
            ),
        );
    }
}

/// Normalize a HOT template: resources become node templates whose
/// single `types` entry is the opaque resource type, and `depends_on`
/// references become requirements.
pub fn normalize_template(catalog: &Catalog, root: EntityId) -> Option<normal::ServiceTemplate> {
    let (description, parameters, resources, outputs) =
        catalog.arena.with(root, |entity| match &entity.kind {
            Kind::HotTemplate(template) => Some((
                template.description.clone(),
                template.parameters.clone(),
                template.resources.clone(),
                template.outputs.clone(),
            )),
            _ => None,
        })?;

    let mut template = normal::ServiceTemplate {
        description,
        scriptlet_namespace: catalog
            .scriptlets
            .lock()
            .expect("scriptlets poisoned")
            .to_map(),
        ..Default::default()
    };

    for (name, parameter) in &parameters {
        catalog.arena.with(*parameter, |entity| {
            if let Kind::HotParameter(parameter) = &entity.kind {
                if let Some(value) = parameter.value.clone().or_else(|| parameter.default.clone())
                {
                    template
                        .inputs
                        .insert(name.clone(), Constrainable::value(value));
                }
            }
        });
    }

    for (name, output) in &outputs {
        catalog.arena.with(*output, |entity| {
            if let Kind::HotOutput(output) = &entity.kind {
                if let Some(value) = output.value {
                    template
                        .outputs
                        .insert(name.clone(), super::tosca_v2_0::normalize_value(catalog, value));
                }
            }
        });
    }

    for (name, resource) in &resources {
        catalog.arena.with(*resource, |entity| {
            if let Kind::HotResource(resource) = &entity.kind {
                let mut node = normal::NodeTemplate {
                    name: name.clone(),
                    properties: resource
                        .properties
                        .iter()
                        .map(|(property, value)| {
                            (
                                property.clone(),
                                super::tosca_v2_0::normalize_value(catalog, *value),
                            )
                        })
                        .collect(),
                    ..Default::default()
                };
                if let Some(type_name) = &resource.type_name {
                    node.types
                        .insert(type_name.clone(), TypeInformation::named(type_name.clone()));
                }
                for dependency in &resource.dependencies {
                    node.requirements.push(normal::Requirement {
                        name: "depends_on".to_string(),
                        node_template_name: Some(catalog.arena.name_of(*dependency)),
                        ..Default::default()
                    });
                }
                template.node_templates.insert(name.clone(), node);
            }
        });
    }

    Some(template)
}
