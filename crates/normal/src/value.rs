use crate::FunctionCall;
use std::collections::BTreeMap;

/// Information about a type that participated in producing a value,
/// surfaced into the Clout so downstream tooling can explain values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeInformation {
    pub name: String,
    pub description: Option<String>,
    pub schema_description: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl TypeInformation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.description.is_none()
            && self.schema_description.is_none()
            && self.metadata.is_empty()
    }

    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        if !self.name.is_empty() {
            map.insert("name".into(), ir::Value::from(self.name.clone()));
        }
        if let Some(description) = &self.description {
            map.insert("description".into(), ir::Value::from(description.clone()));
        }
        if let Some(description) = &self.schema_description {
            map.insert(
                "schemaDescription".into(),
                ir::Value::from(description.clone()),
            );
        }
        if !self.metadata.is_empty() {
            map.insert(
                "metadata".into(),
                ir::Value::Map(
                    self.metadata
                        .iter()
                        .map(|(k, v)| (ir::Value::from(k.clone()), ir::Value::from(v.clone())))
                        .collect(),
                ),
            );
        }
        ir::Value::Map(map)
    }
}

/// Descriptions and type lineage attached to a rendered value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueInformation {
    pub description: Option<String>,
    pub definition: Option<TypeInformation>,
    pub type_: Option<TypeInformation>,
    pub entry: Option<TypeInformation>,
    pub key: Option<TypeInformation>,
    pub value: Option<TypeInformation>,
    pub fields: BTreeMap<String, ValueInformation>,
}

impl ValueInformation {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.definition.is_none()
            && self.type_.is_none()
            && self.entry.is_none()
            && self.key.is_none()
            && self.value.is_none()
            && self.fields.is_empty()
    }

    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        if let Some(description) = &self.description {
            map.insert("description".into(), ir::Value::from(description.clone()));
        }
        let entries = [
            ("definition", &self.definition),
            ("type", &self.type_),
            ("entry", &self.entry),
            ("key", &self.key),
            ("value", &self.value),
        ];
        for (key, information) in entries {
            if let Some(information) = information {
                if !information.is_empty() {
                    map.insert(key.into(), information.to_value());
                }
            }
        }
        if !self.fields.is_empty() {
            map.insert(
                "fields".into(),
                ir::Value::Map(
                    self.fields
                        .iter()
                        .map(|(k, v)| (ir::Value::from(k.clone()), v.to_value()))
                        .collect(),
                ),
            );
        }
        ir::Value::Map(map)
    }
}

/// A rendered value tree: a plain value, a typed list, a typed map, or an
/// unevaluated function call. Every variant carries its accumulated
/// constraint calls, optional converter, and value information.
#[derive(Clone, Debug, PartialEq)]
pub enum Constrainable {
    Value(ValueNode),
    List(ListNode),
    Map(MapNode),
    Call(CallNode),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueNode {
    pub value: ir::Value,
    pub information: Option<Box<ValueInformation>>,
    pub constraints: Vec<FunctionCall>,
    pub converter: Option<FunctionCall>,
    pub comparer: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListNode {
    pub entries: Vec<Constrainable>,
    pub entry_constraints: Vec<FunctionCall>,
    pub information: Option<Box<ValueInformation>>,
    pub constraints: Vec<FunctionCall>,
    pub converter: Option<FunctionCall>,
    pub comparer: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapNode {
    pub entries: Vec<(Constrainable, Constrainable)>,
    pub key_constraints: Vec<FunctionCall>,
    pub value_constraints: Vec<FunctionCall>,
    pub information: Option<Box<ValueInformation>>,
    pub constraints: Vec<FunctionCall>,
    pub converter: Option<FunctionCall>,
    pub comparer: Option<FunctionCall>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallNode {
    pub call: FunctionCall,
    pub information: Option<Box<ValueInformation>>,
    pub constraints: Vec<FunctionCall>,
    pub converter: Option<FunctionCall>,
    pub comparer: Option<FunctionCall>,
}

impl Constrainable {
    pub fn value(value: ir::Value) -> Self {
        Constrainable::Value(ValueNode {
            value,
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        })
    }

    pub fn call(call: FunctionCall) -> Self {
        Constrainable::Call(CallNode {
            call,
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        })
    }

    pub fn set_information(&mut self, information: ValueInformation) {
        if information.is_empty() {
            return;
        }
        let slot = match self {
            Constrainable::Value(n) => &mut n.information,
            Constrainable::List(n) => &mut n.information,
            Constrainable::Map(n) => &mut n.information,
            Constrainable::Call(n) => &mut n.information,
        };
        *slot = Some(Box::new(information));
    }

    pub fn add_constraint(&mut self, constraint: FunctionCall) {
        let slot = match self {
            Constrainable::Value(n) => &mut n.constraints,
            Constrainable::List(n) => &mut n.constraints,
            Constrainable::Map(n) => &mut n.constraints,
            Constrainable::Call(n) => &mut n.constraints,
        };
        slot.push(constraint);
    }

    pub fn set_converter(&mut self, converter: FunctionCall) {
        let slot = match self {
            Constrainable::Value(n) => &mut n.converter,
            Constrainable::List(n) => &mut n.converter,
            Constrainable::Map(n) => &mut n.converter,
            Constrainable::Call(n) => &mut n.converter,
        };
        *slot = Some(converter);
    }

    pub fn set_comparer(&mut self, comparer: FunctionCall) {
        let slot = match self {
            Constrainable::Value(n) => &mut n.comparer,
            Constrainable::List(n) => &mut n.comparer,
            Constrainable::Map(n) => &mut n.comparer,
            Constrainable::Call(n) => &mut n.comparer,
        };
        *slot = Some(comparer);
    }

    /// Wire form. Bare values stay bare unless they carry annotations, in
    /// which case they wrap as `{"$value": ..., ...}` so the annotations
    /// have somewhere to live.
    pub fn to_value(&self) -> ir::Value {
        match self {
            Constrainable::Value(node) => {
                let mut map = ir::Map::new();
                annotate(
                    &mut map,
                    &node.information,
                    &node.constraints,
                    &node.converter,
                    &node.comparer,
                );
                if map.is_empty() {
                    node.value.clone()
                } else {
                    map.insert("$value".into(), node.value.clone());
                    ir::Value::Map(map)
                }
            }
            Constrainable::List(node) => {
                let mut map = ir::Map::new();
                map.insert(
                    "$list".into(),
                    ir::Value::List(node.entries.iter().map(Constrainable::to_value).collect()),
                );
                if !node.entry_constraints.is_empty() {
                    map.insert(
                        "$entryConstraints".into(),
                        calls_to_value(&node.entry_constraints),
                    );
                }
                annotate(
                    &mut map,
                    &node.information,
                    &node.constraints,
                    &node.converter,
                    &node.comparer,
                );
                ir::Value::Map(map)
            }
            Constrainable::Map(node) => {
                let mut map = ir::Map::new();
                map.insert(
                    "$map".into(),
                    ir::Value::List(
                        node.entries
                            .iter()
                            .map(|(key, value)| {
                                let mut entry = ir::Map::new();
                                entry.insert("$key".into(), key.to_value());
                                entry.insert("$value".into(), value.to_value());
                                ir::Value::Map(entry)
                            })
                            .collect(),
                    ),
                );
                if !node.key_constraints.is_empty() {
                    map.insert(
                        "$keyConstraints".into(),
                        calls_to_value(&node.key_constraints),
                    );
                }
                if !node.value_constraints.is_empty() {
                    map.insert(
                        "$valueConstraints".into(),
                        calls_to_value(&node.value_constraints),
                    );
                }
                annotate(
                    &mut map,
                    &node.information,
                    &node.constraints,
                    &node.converter,
                    &node.comparer,
                );
                ir::Value::Map(map)
            }
            Constrainable::Call(node) => {
                let mut map = match node.call.to_value() {
                    ir::Value::Map(map) => map,
                    other => {
                        let mut map = ir::Map::new();
                        map.insert("$functionCall".into(), other);
                        map
                    }
                };
                annotate(
                    &mut map,
                    &node.information,
                    &node.constraints,
                    &node.converter,
                    &node.comparer,
                );
                ir::Value::Map(map)
            }
        }
    }
}

fn calls_to_value(calls: &[FunctionCall]) -> ir::Value {
    ir::Value::List(calls.iter().map(FunctionCall::to_value).collect())
}

fn annotate(
    map: &mut ir::Map,
    information: &Option<Box<ValueInformation>>,
    constraints: &[FunctionCall],
    converter: &Option<FunctionCall>,
    comparer: &Option<FunctionCall>,
) {
    if let Some(information) = information {
        if !information.is_empty() {
            map.insert("$information".into(), information.to_value());
        }
    }
    if !constraints.is_empty() {
        map.insert("$constraints".into(), calls_to_value(constraints));
    }
    if let Some(converter) = converter {
        map.insert("$converter".into(), converter.to_value());
    }
    if let Some(comparer) = comparer {
        map.insert("$comparer".into(), comparer.to_value());
    }
}

/// Render a map of named constrainables into wire form.
pub fn constrainables_to_value(map: &BTreeMap<String, Constrainable>) -> ir::Value {
    ir::Value::Map(
        map.iter()
            .map(|(name, value)| (ir::Value::from(name.clone()), value.to_value()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_values_stay_bare() {
        let node = Constrainable::value(ir::Value::Integer(8080));
        assert_eq!(node.to_value(), ir::Value::Integer(8080));
    }

    #[test]
    fn annotated_values_wrap() {
        let mut node = Constrainable::value(ir::Value::Integer(8080));
        node.add_constraint(FunctionCall::new(
            "greater_than",
            vec![crate::CallArgument::Literal(ir::Value::Integer(0))],
        ));
        let wire = node.to_value().to_json();
        assert_eq!(wire["$value"], 8080);
        assert_eq!(
            wire["$constraints"][0]["$functionCall"]["name"],
            "greater_than"
        );
    }

    #[test]
    fn map_entries_keep_non_string_keys() {
        let node = Constrainable::Map(MapNode {
            entries: vec![(
                Constrainable::value(ir::Value::Integer(1)),
                Constrainable::value(ir::Value::from("one")),
            )],
            key_constraints: Vec::new(),
            value_constraints: Vec::new(),
            information: None,
            constraints: Vec::new(),
            converter: None,
            comparer: None,
        });
        let wire = node.to_value();
        let entries = wire.get("$map").and_then(ir::Value::as_list).unwrap();
        assert_eq!(
            entries[0].get("$key"),
            Some(&ir::Value::Integer(1))
        );
    }
}
