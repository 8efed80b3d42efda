use super::data::{ConstraintClause, InternalType, Schema};
use super::definitions::{AttributeDefinition, ParameterDefinition, PropertyDefinition};
use super::functions::to_function_call;
use super::render::render_entity;
use super::{METADATA_COMPARER, METADATA_CONVERTER, METADATA_INFORMATION_PREFIX};
use crate::catalog::Catalog;
use crate::entity::{path_index, path_key, EntityId, FileId, Kind, Meta};
use crate::fields::ReadCtx;
use normal::{FunctionCall, TypeInformation, ValueInformation};
use std::collections::BTreeMap;

/// A property/attribute/input/output value: raw data on arrival, a typed
/// value tree after rendering.
#[derive(Debug)]
pub struct Value {
    pub data: ValueData,
    /// From the attribute long notation.
    pub description: Option<String>,
    pub data_type: Option<EntityId>,
    /// Folded at render: data type's clauses, then the definition's, then
    /// the value's own.
    pub constraints: Vec<ConstraintClause>,
    pub converter: Option<FunctionCall>,
    pub comparer: Option<FunctionCall>,
    pub information: ValueInformation,
    pub rendered: bool,
}

#[derive(Debug)]
pub enum ValueData {
    /// Unrendered data, or a rendered primitive.
    Raw(ir::Value),
    /// An unevaluated function call, opaque to the pipeline.
    Call(FunctionCall),
    /// A rendered typed list.
    List {
        entries: Vec<EntityId>,
        entry_constraints: Vec<ConstraintClause>,
    },
    /// A rendered typed map; keys are themselves rendered values.
    Map {
        entries: Vec<(EntityId, EntityId)>,
        key_constraints: Vec<ConstraintClause>,
        value_constraints: Vec<ConstraintClause>,
    },
    /// A rendered complex record.
    Complex(BTreeMap<String, EntityId>),
}

impl Value {
    fn new(data: ValueData) -> Value {
        Value {
            data,
            description: None,
            data_type: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
            information: ValueInformation::default(),
            rendered: false,
        }
    }
}

pub fn read_value(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let data = match to_function_call(ctx, data) {
        Some(call) => ValueData::Call(call),
        None => ValueData::Raw(data.clone()),
    };
    ctx.alloc(Kind::Value(Value::new(data)))
}

/// Attribute values additionally accept the long notation, a two-key map
/// of `description` and `value`.
pub fn read_attribute_value(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    if let Some(map) = data.as_map() {
        if map.len() == 2 {
            if let (Some(description), Some(value)) =
                (map.get(&ir::Value::from("description")), map.get(&ir::Value::from("value")))
            {
                if let Some(description) = description.as_str() {
                    let id = read_value(&ctx.field("value"), value);
                    ctx.catalog.arena.with_mut(id, |entity| {
                        if let Kind::Value(value) = &mut entity.kind {
                            value.description = Some(description.to_string());
                        }
                    });
                    return id;
                }
            }
        }
    }
    read_value(ctx, data)
}

/// The definition fields the renderer consumes, snapshotted so no lock is
/// held while rendering.
#[derive(Clone, Debug, Default)]
pub struct DefinitionBits {
    pub data_type: Option<EntityId>,
    pub entry_schema: Option<EntityId>,
    pub key_schema: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub constraints: Vec<ConstraintClause>,
    pub default: Option<EntityId>,
    pub required: bool,
}

fn attribute_bits(attribute: &AttributeDefinition, required: bool) -> DefinitionBits {
    DefinitionBits {
        data_type: attribute.data_type,
        entry_schema: attribute.entry_schema,
        key_schema: attribute.key_schema,
        metadata: attribute.metadata.clone(),
        description: attribute.description.clone(),
        constraints: Vec::new(),
        default: attribute.default,
        required,
    }
}

fn property_bits(property: &PropertyDefinition) -> DefinitionBits {
    let mut bits = attribute_bits(&property.attribute, property.is_required());
    bits.constraints = property.constraints.clone();
    bits
}

/// Snapshot any definition-shaped entity.
pub fn definition_bits(catalog: &Catalog, id: EntityId) -> Option<DefinitionBits> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::AttributeDefinition(attribute) => Some(attribute_bits(attribute, false)),
        Kind::PropertyDefinition(property) => Some(property_bits(property)),
        Kind::ParameterDefinition(parameter) => Some(property_bits(&parameter.property)),
        _ => None,
    })
}

/// The data type fields the renderer consumes.
#[derive(Clone, Debug)]
struct DataTypeBits {
    name: String,
    internal: Option<InternalType>,
    constraints: Vec<ConstraintClause>,
    property_definitions: BTreeMap<String, EntityId>,
    entry_schema: Option<EntityId>,
    key_schema: Option<EntityId>,
    metadata: BTreeMap<String, String>,
    description: Option<String>,
}

fn data_type_bits(catalog: &Catalog, id: EntityId) -> Option<DataTypeBits> {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::DataType(data_type) => Some(DataTypeBits {
            name: entity.meta.name.clone(),
            internal: data_type.internal,
            constraints: data_type.constraints.clone(),
            property_definitions: data_type.property_definitions.clone(),
            entry_schema: data_type.entry_schema,
            key_schema: data_type.key_schema,
            metadata: data_type.metadata.clone(),
            description: data_type.description.clone(),
        }),
        _ => None,
    })
}

pub fn type_information(
    name: &str,
    description: &Option<String>,
    metadata: &BTreeMap<String, String>,
) -> TypeInformation {
    let mut information = TypeInformation::named(name);
    information.description = description.clone();
    information.metadata = metadata
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(METADATA_INFORMATION_PREFIX)
                .map(|stripped| (stripped.to_string(), value.clone()))
        })
        .collect();
    information
}

fn schema_bits(
    catalog: &Catalog,
    id: EntityId,
) -> (Option<EntityId>, Vec<ConstraintClause>, Option<String>) {
    catalog.arena.with(id, |entity| match &entity.kind {
        Kind::Schema(Schema {
            data_type,
            constraints,
            description,
            ..
        }) => (*data_type, constraints.clone(), description.clone()),
        _ => (None, Vec::new(), None),
    })
}

/// Render a value known to have a definition entity (property, attribute
/// or parameter). No-op when the definition has no resolved data type.
pub fn render_value_for(
    catalog: &Catalog,
    value: EntityId,
    definition: Option<EntityId>,
    allow_nil: bool,
) {
    let bits = definition.and_then(|id| definition_bits(catalog, id));
    let Some(data_type) = bits.as_ref().and_then(|bits| bits.data_type) else {
        return;
    };
    render_value(catalog, value, data_type, bits.as_ref(), false, allow_nil);
}

/// The §4.9 engine. `bare` suppresses information and constraint capture
/// for list entries and map keys; `allow_nil` lets attribute values stay
/// null.
pub fn render_value(
    catalog: &Catalog,
    id: EntityId,
    data_type_id: EntityId,
    definition: Option<&DefinitionBits>,
    bare: bool,
    allow_nil: bool,
) {
    // Claim the render; a value reached through two paths renders once.
    let claimed = catalog.arena.with_mut(id, |entity| {
        let Kind::Value(value) = &mut entity.kind else {
            return None;
        };
        if value.rendered {
            return None;
        }
        value.rendered = true;
        value.data_type = Some(data_type_id);
        Some((
            std::mem::replace(&mut value.data, ValueData::Raw(ir::Value::Null)),
            value.description.clone(),
            std::mem::take(&mut value.constraints),
            entity.meta.clone(),
        ))
    });
    let Some((data, description, own_constraints, meta)) = claimed else {
        return;
    };

    let Some(data_type) = data_type_bits(catalog, data_type_id) else {
        catalog.arena.with_mut(id, |entity| {
            if let Kind::Value(value) = &mut entity.kind {
                value.data = data;
            }
        });
        return;
    };

    let mut information = ValueInformation::default();
    let mut constraints = Vec::new();
    if !bare {
        if let Some(description) = &description {
            information.description = Some(description.clone());
        }
        if let Some(definition) = definition {
            if definition.description.is_some() || !definition.metadata.is_empty() {
                information.definition = Some(type_information(
                    "",
                    &definition.description,
                    &definition.metadata,
                ));
            }
        }
        information.type_ = Some(type_information(
            &data_type.name,
            &data_type.description,
            &data_type.metadata,
        ));

        // Fold order: data type, then definition, then the value's own.
        constraints.extend(data_type.constraints.iter().cloned());
        if let Some(definition) = definition {
            constraints.extend(definition.constraints.iter().cloned());
        }
        constraints.extend(own_constraints);
    }

    let site = catalog.site_of(&meta);
    let new_data = match data {
        ValueData::Call(call) => ValueData::Call(call),
        ValueData::Raw(raw) if raw.is_null() && allow_nil => ValueData::Raw(raw),
        ValueData::Raw(raw) => match data_type.internal {
            Some(internal) => render_internal(
                catalog,
                &meta,
                raw,
                internal,
                &data_type,
                definition,
                &constraints,
                &mut information,
            ),
            None => render_complex(catalog, &meta, raw, &data_type, &mut information),
        },
        already_rendered => already_rendered,
    };

    // Metadata-driven behaviors: the definition's converter wins over the
    // data type's; comparers require an ordered internal type.
    let converter = definition
        .and_then(|definition| definition.metadata.get(METADATA_CONVERTER))
        .or_else(|| data_type.metadata.get(METADATA_CONVERTER))
        .map(|name| FunctionCall::new(name.clone(), Vec::new()));
    let comparer = data_type
        .metadata
        .get(METADATA_COMPARER)
        .filter(|_| {
            data_type
                .internal
                .map(|internal| internal.is_comparable())
                .unwrap_or(false)
        })
        .map(|name| FunctionCall::new(name.clone(), Vec::new()));
    if comparer.is_none() {
        if let Some(name) = data_type.metadata.get(METADATA_COMPARER) {
            if !data_type
                .internal
                .map(|internal| internal.is_comparable())
                .unwrap_or(false)
            {
                catalog.report(
                    &site,
                    "WrongType",
                    format!(
                        "comparer {name:?} declared on a type without ordered comparison: {}",
                        data_type.name
                    ),
                );
            }
        }
    }

    catalog.arena.with_mut(id, |entity| {
        if let Kind::Value(value) = &mut entity.kind {
            value.data = new_data;
            value.constraints = constraints;
            value.information = information;
            value.converter = converter;
            value.comparer = comparer;
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn render_internal(
    catalog: &Catalog,
    meta: &Meta,
    raw: ir::Value,
    internal: InternalType,
    data_type: &DataTypeBits,
    definition: Option<&DefinitionBits>,
    constraints: &[ConstraintClause],
    information: &mut ValueInformation,
) -> ValueData {
    let site = catalog.site_of(meta);

    // Absent attribute data gets the type's zero.
    let mut raw = if raw.is_null() { internal.zero() } else { raw };

    if internal == InternalType::String && catalog.quirks.data_types_string_permissive {
        if let ir::Value::Integer(_) | ir::Value::Float(_) | ir::Value::Bool(_) = raw {
            raw = ir::Value::String(raw.key_string());
        }
    }

    match internal.validate(&raw) {
        Ok(canonical) => {
            if let Some(canonical) = canonical {
                raw = canonical;
            }
        }
        Err(()) => {
            catalog.report(
                &site,
                "WrongType",
                format!("wrong type: expected {}, got {}", internal.name(), raw.type_name()),
            );
            return ValueData::Raw(raw);
        }
    }

    match internal {
        InternalType::List | InternalType::Map => {
            // Entry (and for maps, key) schemas are required; the
            // definition's schema wins over the data type's.
            let entry_schema = definition
                .and_then(|definition| definition.entry_schema)
                .or(data_type.entry_schema);
            let Some(entry_schema) = entry_schema else {
                // With a definition present, its own render already
                // reported the missing schema; report here only for bare
                // renders against the naked data type.
                if definition.is_none() {
                    catalog.report(
                        &site,
                        "MissingEntrySchema",
                        format!("missing entry schema for {:?}", data_type.name),
                    );
                }
                return ValueData::Raw(raw);
            };
            let (entry_type, entry_constraints, entry_description) =
                schema_bits(catalog, entry_schema);
            let Some(entry_type) = entry_type else {
                // An unresolved schema type was already reported in lookup.
                return ValueData::Raw(raw);
            };

            if let Some(entry_info) = type_information_of(catalog, entry_type) {
                let mut entry_info = entry_info;
                entry_info.schema_description = entry_description;
                information.entry = Some(entry_info);
            }

            if internal == InternalType::List {
                let list = match raw {
                    ir::Value::List(list) => list,
                    other => return ValueData::Raw(other),
                };
                let entries = list
                    .into_iter()
                    .enumerate()
                    .map(|(index, element)| {
                        let child = alloc_child_value(
                            catalog,
                            meta,
                            path_index(&meta.path, index),
                            element,
                        );
                        render_value(catalog, child, entry_type, None, true, false);
                        child
                    })
                    .collect();
                ValueData::List {
                    entries,
                    entry_constraints,
                }
            } else {
                let key_schema = definition
                    .and_then(|definition| definition.key_schema)
                    .or(data_type.key_schema);
                let (key_type, key_constraints, key_description) = match key_schema {
                    Some(schema) => schema_bits(catalog, schema),
                    // Keys default to string when no key schema is declared.
                    None => (string_data_type(catalog, meta.file), Vec::new(), None),
                };
                let Some(key_type) = key_type else {
                    return ValueData::Raw(raw);
                };
                if let Some(key_info) = type_information_of(catalog, key_type) {
                    let mut key_info = key_info;
                    key_info.schema_description = key_description;
                    information.key = Some(key_info);
                }

                let map = match raw {
                    ir::Value::Map(map) => map,
                    other => return ValueData::Raw(other),
                };
                let entries = map
                    .into_iter()
                    .map(|(key, element)| {
                        let key_string = key.key_string();
                        let key_child = alloc_child_value(
                            catalog,
                            meta,
                            path_key(&meta.path, &key_string),
                            key,
                        );
                        render_value(catalog, key_child, key_type, None, true, false);
                        let value_child = alloc_child_value(
                            catalog,
                            meta,
                            path_key(&meta.path, &key_string),
                            element,
                        );
                        render_value(catalog, value_child, entry_type, None, true, false);
                        (key_child, value_child)
                    })
                    .collect();
                ValueData::Map {
                    entries,
                    key_constraints,
                    value_constraints: entry_constraints,
                }
            }
        }
        _ => {
            // Static checks of literal primitives against the folded
            // constraint clauses; undecidable clauses stay opaque.
            for clause in constraints {
                if clause.check(&raw) == Some(false) {
                    catalog.report(
                        &site,
                        "ConstraintViolation",
                        format!(
                            "constraint violated: {} {:?}",
                            clause.operator,
                            clause.arguments.iter().map(ir::Value::key_string).collect::<Vec<_>>()
                        ),
                    );
                }
            }
            ValueData::Raw(raw)
        }
    }
}

fn render_complex(
    catalog: &Catalog,
    meta: &Meta,
    raw: ir::Value,
    data_type: &DataTypeBits,
    information: &mut ValueInformation,
) -> ValueData {
    let site = catalog.site_of(meta);
    let map = match raw {
        ir::Value::Map(map) => map,
        other => {
            if !other.is_null() {
                catalog.report(
                    &site,
                    "WrongType",
                    format!("wrong type: expected map, got {}", other.type_name()),
                );
            }
            return ValueData::Raw(other);
        }
    };

    let mut fields = BTreeMap::new();
    for (key, element) in map {
        let name = key.key_string();
        if !data_type.property_definitions.contains_key(&name) {
            catalog.report(
                &site.at_path(path_key(&meta.path, &name)),
                "Undeclared",
                format!("undeclared property: {name:?}"),
            );
            continue;
        }
        let child = alloc_child_value(catalog, meta, path_key(&meta.path, &name), element);
        fields.insert(name, child);
    }

    for (name, definition_id) in &data_type.property_definitions {
        render_entity(catalog, *definition_id);
        let bits = definition_bits(catalog, *definition_id).unwrap_or_default();
        match fields.get(name) {
            Some(child) => {
                if let Some(field_type) = bits.data_type {
                    render_value(catalog, *child, field_type, Some(&bits), false, false);
                    let child_information =
                        catalog.arena.with(*child, |entity| match &entity.kind {
                            Kind::Value(value) if !value.information.is_empty() => {
                                Some(value.information.clone())
                            }
                            _ => None,
                        });
                    if let Some(child_information) = child_information {
                        information.fields.insert(name.clone(), child_information);
                    }
                }
            }
            None => {
                if let Some(default) = bits.default {
                    fields.insert(name.clone(), default);
                } else if bits.required {
                    catalog.report(
                        &site.at_path(path_key(&meta.path, name)),
                        "PropertyRequired",
                        format!("required property missing: {name:?}"),
                    );
                }
            }
        }
    }

    ValueData::Complex(fields)
}

fn alloc_child_value(
    catalog: &Catalog,
    parent: &Meta,
    path: String,
    raw: ir::Value,
) -> EntityId {
    let ctx = ReadCtx {
        catalog,
        file: parent.file,
        name: parent.name.clone(),
        path,
    };
    read_value(&ctx, &raw)
}

fn type_information_of(catalog: &Catalog, data_type: EntityId) -> Option<TypeInformation> {
    catalog.arena.with(data_type, |entity| match &entity.kind {
        Kind::DataType(dt) => Some(type_information(
            &entity.meta.name,
            &dt.description,
            &dt.metadata,
        )),
        _ => None,
    })
}

/// The profile's `string` data type, used as the default key schema.
fn string_data_type(catalog: &Catalog, file: FileId) -> Option<EntityId> {
    catalog.namespace_lookup(file, crate::entity::TypeTag::DataType, "string")
}

/// Render every value of `values` against `definitions`, applying
/// defaults, reporting undeclared and required-but-absent names. The
/// behavior split between properties and attributes is the `kind` word:
/// attributes are never required and materialize with zero values.
pub fn render_values(
    catalog: &Catalog,
    container: &Meta,
    base_path: &str,
    values: &mut BTreeMap<String, EntityId>,
    definitions: &BTreeMap<String, EntityId>,
    kind: &str,
) {
    let site = catalog.site_of(container);

    for (name, definition_id) in definitions {
        render_entity(catalog, *definition_id);
        let bits = definition_bits(catalog, *definition_id).unwrap_or_default();
        if !values.contains_key(name) {
            if let Some(default) = bits.default {
                values.insert(name.clone(), default);
            } else if kind == "property" && bits.required {
                catalog.report(
                    &site.at_path(path_key(base_path, name)),
                    "PropertyRequired",
                    format!("required {kind} missing: {name:?}"),
                );
            } else if kind == "attribute" {
                // Attributes always materialize, zero-valued if need be.
                let child = alloc_child_value(
                    catalog,
                    &Meta {
                        name: name.clone(),
                        path: path_key(base_path, name),
                        file: container.file,
                        locator: None,
                    },
                    path_key(base_path, name),
                    ir::Value::Null,
                );
                if let Some(data_type) = bits.data_type {
                    render_value(catalog, child, data_type, Some(&bits), false, false);
                }
                values.insert(name.clone(), child);
            }
        }
    }

    let mut undeclared = Vec::new();
    for (name, value_id) in values.iter() {
        match definitions.get(name) {
            Some(definition_id) => {
                let allow_nil = kind == "attribute";
                render_value_for(catalog, *value_id, Some(*definition_id), allow_nil);
            }
            None => {
                catalog.report(
                    &site.at_path(path_key(base_path, name)),
                    "Undeclared",
                    format!("undeclared {kind}: {name:?}"),
                );
                undeclared.push(name.clone());
            }
        }
    }
    for name in undeclared {
        values.remove(&name);
    }
}
