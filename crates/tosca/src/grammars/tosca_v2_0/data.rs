use super::scalar;
use super::METADATA_TYPE;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use normal::{CallArgument, FunctionCall};
use std::collections::BTreeMap;

/// The internal tag of a data type, assigned through `toscana.type`
/// metadata on the profile's primitive types and inherited down the
/// hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InternalType {
    String,
    Integer,
    Float,
    Boolean,
    Bytes,
    Timestamp,
    Version,
    Range,
    List,
    Map,
    ScalarSize,
    ScalarTime,
    ScalarFrequency,
    ScalarBitrate,
}

impl InternalType {
    pub fn from_name(name: &str) -> Option<InternalType> {
        Some(match name {
            "string" => InternalType::String,
            "integer" => InternalType::Integer,
            "float" => InternalType::Float,
            "boolean" => InternalType::Boolean,
            "bytes" => InternalType::Bytes,
            "timestamp" => InternalType::Timestamp,
            "version" => InternalType::Version,
            "range" => InternalType::Range,
            "list" => InternalType::List,
            "map" => InternalType::Map,
            "scalar-unit.size" => InternalType::ScalarSize,
            "scalar-unit.time" => InternalType::ScalarTime,
            "scalar-unit.frequency" => InternalType::ScalarFrequency,
            "scalar-unit.bitrate" => InternalType::ScalarBitrate,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            InternalType::String => "string",
            InternalType::Integer => "integer",
            InternalType::Float => "float",
            InternalType::Boolean => "boolean",
            InternalType::Bytes => "bytes",
            InternalType::Timestamp => "timestamp",
            InternalType::Version => "version",
            InternalType::Range => "range",
            InternalType::List => "list",
            InternalType::Map => "map",
            InternalType::ScalarSize => "scalar-unit.size",
            InternalType::ScalarTime => "scalar-unit.time",
            InternalType::ScalarFrequency => "scalar-unit.frequency",
            InternalType::ScalarBitrate => "scalar-unit.bitrate",
        }
    }

    pub fn is_scalar_unit(&self) -> bool {
        matches!(
            self,
            InternalType::ScalarSize
                | InternalType::ScalarTime
                | InternalType::ScalarFrequency
                | InternalType::ScalarBitrate
        )
    }

    /// Whether values of this type have a meaningful order, which gates
    /// comparer attachment.
    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            InternalType::String
                | InternalType::Integer
                | InternalType::Float
                | InternalType::Timestamp
                | InternalType::Version
        ) || self.is_scalar_unit()
    }

    /// Validate (and possibly canonicalize) a raw value of this internal
    /// type. `Ok` carries a replacement raw when canonicalization applies.
    pub fn validate(&self, raw: &ir::Value) -> Result<Option<ir::Value>, ()> {
        match self {
            InternalType::String => match raw {
                ir::Value::String(_) => Ok(None),
                _ => Err(()),
            },
            InternalType::Integer => match raw {
                ir::Value::Integer(_) => Ok(None),
                _ => Err(()),
            },
            InternalType::Float => match raw {
                ir::Value::Float(_) => Ok(None),
                ir::Value::Integer(i) => Ok(Some(ir::Value::Float(*i as f64))),
                _ => Err(()),
            },
            InternalType::Boolean => match raw {
                ir::Value::Bool(_) => Ok(None),
                _ => Err(()),
            },
            InternalType::Bytes => match raw {
                ir::Value::Bytes(_) => Ok(None),
                ir::Value::String(s) => match base64::decode(s) {
                    Ok(bytes) => Ok(Some(ir::Value::Bytes(bytes))),
                    Err(_) => Err(()),
                },
                _ => Err(()),
            },
            InternalType::Timestamp => match raw {
                ir::Value::String(s) if scalar::is_valid_timestamp(s) => Ok(None),
                _ => Err(()),
            },
            InternalType::Version => match raw {
                ir::Value::String(s) if scalar::is_valid_version(s) => Ok(None),
                _ => Err(()),
            },
            InternalType::Range => {
                let list = raw.as_list().ok_or(())?;
                if list.len() != 2 {
                    return Err(());
                }
                let lower = list[0].as_integer().ok_or(())?;
                match &list[1] {
                    ir::Value::Integer(upper) if *upper >= lower => Ok(None),
                    ir::Value::String(s) if s == "UNBOUNDED" => Ok(None),
                    _ => Err(()),
                }
            }
            InternalType::List => match raw {
                ir::Value::List(_) => Ok(None),
                _ => Err(()),
            },
            InternalType::Map => match raw {
                ir::Value::Map(_) => Ok(None),
                _ => Err(()),
            },
            scalar_kind => match raw {
                ir::Value::String(s) => match scalar::parse_scalar(*scalar_kind, s) {
                    Some(canonical) => Ok(Some(scalar::scalar_value(s, canonical))),
                    None => Err(()),
                },
                _ => Err(()),
            },
        }
    }

    /// The zero value substituted for attributes with no value and no
    /// default.
    pub fn zero(&self) -> ir::Value {
        if self.is_scalar_unit() {
            return scalar::scalar_zero();
        }
        match self {
            InternalType::Timestamp => ir::Value::from("1970-01-01T00:00:00Z"),
            InternalType::Version => ir::Value::from("0.0"),
            InternalType::Range => {
                ir::Value::List(vec![ir::Value::Integer(0), ir::Value::Integer(0)])
            }
            other => ir::Value::zero_of(other.name()).unwrap_or(ir::Value::Null),
        }
    }
}

/// A constraint clause: a single-entry map of operator to argument(s).
/// Clauses are captured for the downstream runtime; clauses whose
/// arguments are literal are additionally checked statically at render.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintClause {
    pub operator: String,
    pub arguments: Vec<ir::Value>,
    pub path: String,
}

static CONSTRAINT_OPERATORS: &[&str] = &[
    "equal",
    "greater_than",
    "greater_or_equal",
    "less_than",
    "less_or_equal",
    "in_range",
    "valid_values",
    "length",
    "min_length",
    "max_length",
    "pattern",
];

impl ConstraintClause {
    pub fn read(ctx: &ReadCtx<'_>, data: &ir::Value) -> Option<ConstraintClause> {
        let Some(map) = data.as_map() else {
            ctx.report_wrong_type("constraint clause", data);
            return None;
        };
        if map.len() != 1 {
            ctx.report_wrong_type("single-entry constraint clause", data);
            return None;
        }
        let (operator, argument) = map.iter().next().expect("len was checked");
        let operator = operator.key_string();
        if !CONSTRAINT_OPERATORS.contains(&operator.as_str()) {
            ctx.report(
                "UnsupportedField",
                format!("unsupported constraint operator: {operator:?}"),
            );
            return None;
        }

        // Multi-argument operators take a list; the rest take one value.
        let arguments = match operator.as_str() {
            "in_range" | "valid_values" => match argument.as_list() {
                Some(list) => list.to_vec(),
                None => {
                    ctx.report_wrong_type("list", argument);
                    return None;
                }
            },
            _ => vec![argument.clone()],
        };

        Some(ConstraintClause {
            operator,
            arguments,
            path: ctx.path.clone(),
        })
    }

    pub fn read_list(ctx: &ReadCtx<'_>, data: &ir::Value) -> Vec<ConstraintClause> {
        let Some(list) = data.as_list() else {
            ctx.report_wrong_type("list", data);
            return Vec::new();
        };
        list.iter()
            .enumerate()
            .filter_map(|(index, entry)| ConstraintClause::read(&ctx.child_index(index), entry))
            .collect()
    }

    /// Statically check a literal rendered value against this clause.
    /// `None` means not statically decidable (function-call arguments,
    /// shapes the operator doesn't cover); those are left to the runtime.
    pub fn check(&self, value: &ir::Value) -> Option<bool> {
        fn compare(a: &ir::Value, b: &ir::Value) -> Option<std::cmp::Ordering> {
            match (a, b) {
                (ir::Value::Integer(_) | ir::Value::Float(_), ir::Value::Integer(_) | ir::Value::Float(_)) => {
                    a.as_float()?.partial_cmp(&b.as_float()?)
                }
                (ir::Value::String(a), ir::Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
        }

        fn length_of(value: &ir::Value) -> Option<usize> {
            match value {
                ir::Value::String(s) => Some(s.chars().count()),
                ir::Value::List(l) => Some(l.len()),
                ir::Value::Map(m) => Some(m.len()),
                _ => None,
            }
        }

        match self.operator.as_str() {
            "equal" => Some(value == self.arguments.first()?),
            "greater_than" => Some(
                compare(value, self.arguments.first()?)? == std::cmp::Ordering::Greater,
            ),
            "greater_or_equal" => {
                Some(compare(value, self.arguments.first()?)? != std::cmp::Ordering::Less)
            }
            "less_than" => {
                Some(compare(value, self.arguments.first()?)? == std::cmp::Ordering::Less)
            }
            "less_or_equal" => {
                Some(compare(value, self.arguments.first()?)? != std::cmp::Ordering::Greater)
            }
            "in_range" => {
                let lower = compare(value, self.arguments.first()?)?;
                let upper = match self.arguments.get(1)? {
                    ir::Value::String(s) if s == "UNBOUNDED" => std::cmp::Ordering::Less,
                    upper => compare(value, upper)?,
                };
                Some(lower != std::cmp::Ordering::Less && upper != std::cmp::Ordering::Greater)
            }
            "valid_values" => Some(self.arguments.contains(value)),
            "length" => Some(length_of(value)? as i64 == self.arguments.first()?.as_integer()?),
            "min_length" => {
                Some(length_of(value)? as i64 >= self.arguments.first()?.as_integer()?)
            }
            "max_length" => {
                Some(length_of(value)? as i64 <= self.arguments.first()?.as_integer()?)
            }
            "pattern" => {
                let pattern = self.arguments.first()?.as_str()?;
                let text = value.as_str()?;
                let regex = regex::Regex::new(pattern).ok()?;
                Some(regex.is_match(text))
            }
            _ => None,
        }
    }

    /// The opaque call evaluated by the downstream runtime.
    pub fn to_function_call(&self) -> FunctionCall {
        let mut call = FunctionCall::new(
            format!("tosca.constraint.{}", self.operator),
            self.arguments
                .iter()
                .map(|argument| CallArgument::Literal(argument.clone()))
                .collect(),
        );
        call.path = self.path.clone();
        call
    }
}

pub fn constraints_to_calls(constraints: &[ConstraintClause]) -> Vec<FunctionCall> {
    constraints
        .iter()
        .map(ConstraintClause::to_function_call)
        .collect()
}

/// An entry or key schema: a data type reference with optional refinement.
#[derive(Debug)]
pub struct Schema {
    pub type_name: Option<String>,
    pub description: Option<String>,
    pub constraints: Vec<ConstraintClause>,
    pub data_type: Option<EntityId>,
}

/// Reader: accepts the scalar shorthand (bare type name) or the long map.
pub fn read_schema(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let schema = match data {
        ir::Value::String(type_name) => Schema {
            type_name: Some(type_name.clone()),
            description: None,
            constraints: Vec::new(),
            data_type: None,
        },
        _ => {
            let mut fields = FieldReader::new(ctx, data);
            let schema = Schema {
                type_name: fields.required_string("type"),
                description: fields.string("description"),
                constraints: fields
                    .raw("constraints")
                    .map(|raw| ConstraintClause::read_list(&ctx.field("constraints"), &raw))
                    .unwrap_or_default(),
                data_type: None,
            };
            fields.finish();
            schema
        }
    };
    ctx.alloc(Kind::Schema(schema))
}

/// A data type: a named type with an optional parent, declared properties
/// (complex types), constraints, and an internal tag resolved through
/// metadata and inheritance.
#[derive(Debug)]
pub struct DataType {
    pub parent_name: Option<String>,
    pub parent: Option<EntityId>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub property_definitions: BTreeMap<String, EntityId>,
    pub constraints: Vec<ConstraintClause>,
    pub key_schema: Option<EntityId>,
    pub entry_schema: Option<EntityId>,
    pub internal: Option<InternalType>,
}

pub fn read_data_type(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    let metadata = fields.string_map("metadata").unwrap_or_default();
    let internal = metadata
        .get(METADATA_TYPE)
        .and_then(|name| InternalType::from_name(name));
    let data_type = DataType {
        parent_name: fields.string("derived_from"),
        parent: None,
        description: fields.string("description"),
        property_definitions: fields.entity_map("properties", super::definitions::read_property_definition as Reader),
        constraints: fields
            .raw("constraints")
            .map(|raw| ConstraintClause::read_list(&ctx.field("constraints"), &raw))
            .unwrap_or_default(),
        key_schema: fields.entity("key_schema", read_schema as Reader),
        entry_schema: fields.entity("entry_schema", read_schema as Reader),
        internal,
        metadata,
    };
    if ctx.catalog.quirks.annotations_ignore {
        fields.ignore("annotations");
    }
    fields.finish();
    ctx.alloc(Kind::DataType(data_type))
}

impl DataType {
    /// Inherit from the parent data type: internal tag, schemas, and
    /// property definitions flow down; constraints accumulate parent
    /// first so the final fold order is ancestors, then self.
    pub fn inherit(&mut self, parent: &DataType) {
        if self.internal.is_none() {
            self.internal = parent.internal;
        }
        if self.key_schema.is_none() {
            self.key_schema = parent.key_schema;
        }
        if self.entry_schema.is_none() {
            self.entry_schema = parent.entry_schema;
        }
        for (name, definition) in &parent.property_definitions {
            self.property_definitions
                .entry(name.clone())
                .or_insert(*definition);
        }
        let mut constraints = parent.constraints.clone();
        constraints.extend(std::mem::take(&mut self.constraints));
        self.constraints = constraints;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_type_names_round_trip() {
        for name in [
            "string",
            "integer",
            "float",
            "boolean",
            "bytes",
            "timestamp",
            "version",
            "range",
            "list",
            "map",
            "scalar-unit.size",
            "scalar-unit.time",
            "scalar-unit.frequency",
            "scalar-unit.bitrate",
        ] {
            let internal = InternalType::from_name(name).unwrap();
            assert_eq!(internal.name(), name);
        }
        assert!(InternalType::from_name("no-such").is_none());
    }

    #[test]
    fn float_accepts_integers() {
        assert_eq!(
            InternalType::Float.validate(&ir::Value::Integer(3)),
            Ok(Some(ir::Value::Float(3.0)))
        );
        assert_eq!(InternalType::Float.validate(&ir::Value::from("x")), Err(()));
    }

    #[test]
    fn scalar_units_canonicalize() {
        let validated = InternalType::ScalarSize
            .validate(&ir::Value::from("2 KiB"))
            .unwrap()
            .unwrap();
        assert_eq!(
            validated.get("$number"),
            Some(&ir::Value::Float(2048.0))
        );
    }

    fn clause(operator: &str, arguments: Vec<ir::Value>) -> ConstraintClause {
        ConstraintClause {
            operator: operator.to_string(),
            arguments,
            path: String::new(),
        }
    }

    #[test]
    fn static_constraint_checks() {
        assert_eq!(
            clause("greater_than", vec![ir::Value::Integer(0)]).check(&ir::Value::Integer(-1)),
            Some(false)
        );
        assert_eq!(
            clause("greater_than", vec![ir::Value::Integer(0)]).check(&ir::Value::Integer(1)),
            Some(true)
        );
        assert_eq!(
            clause(
                "in_range",
                vec![ir::Value::Integer(1), ir::Value::from("UNBOUNDED")]
            )
            .check(&ir::Value::Integer(100)),
            Some(true)
        );
        assert_eq!(
            clause("valid_values", vec![ir::Value::from("a"), ir::Value::from("b")])
                .check(&ir::Value::from("c")),
            Some(false)
        );
        assert_eq!(
            clause("max_length", vec![ir::Value::Integer(2)]).check(&ir::Value::from("abc")),
            Some(false)
        );
        assert_eq!(
            clause("pattern", vec![ir::Value::from("^a+$")]).check(&ir::Value::from("aaa")),
            Some(true)
        );
        // Not statically decidable.
        assert_eq!(
            clause("greater_than", vec![ir::Value::Integer(0)]).check(&ir::Value::from("x")),
            None
        );
    }

    #[test]
    fn range_validation() {
        assert!(InternalType::Range
            .validate(&ir::Value::List(vec![
                ir::Value::Integer(1),
                ir::Value::Integer(5)
            ]))
            .is_ok());
        assert!(InternalType::Range
            .validate(&ir::Value::List(vec![
                ir::Value::Integer(5),
                ir::Value::Integer(1)
            ]))
            .is_err());
        assert!(InternalType::Range
            .validate(&ir::Value::List(vec![
                ir::Value::Integer(1),
                ir::Value::from("UNBOUNDED")
            ]))
            .is_ok());
    }
}
