use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded document value. This is the intermediate representation that
/// every decoder produces and every grammar reader consumes.
///
/// Unlike `serde_json::Value`, map keys are themselves values: YAML (and
/// CBOR/MessagePack) allow non-string keys and we must preserve them until
/// a wire format forces stringification.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Map),
}

/// A map of values to values with deterministic (ordered) iteration.
pub type Map = BTreeMap<Value, Value>;

impl Value {
    /// The type name used in problem reports and by data-type validators.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats accept integer raws, as YAML decoders make no promise about
    /// which of the two a plain `5` becomes.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Map access by string key, the overwhelmingly common case.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(&Value::String(key.to_string())),
            _ => None,
        }
    }

    /// The zero value of a primitive type name, substituted for attributes
    /// that have neither a raw value nor a default.
    pub fn zero_of(type_name: &str) -> Option<Value> {
        match type_name {
            "string" => Some(Value::String(String::new())),
            "integer" => Some(Value::Integer(0)),
            "float" => Some(Value::Float(0.0)),
            "boolean" => Some(Value::Bool(false)),
            "bytes" => Some(Value::Bytes(Vec::new())),
            "list" => Some(Value::List(Vec::new())),
            "map" => Some(Value::Map(Map::new())),
            _ => None,
        }
    }

    /// Deterministic stringification of a value used as a map key, for
    /// paths and problem messages. Scalars render bare; complex keys render
    /// as compact JSON with nested keys themselves stringified.
    pub fn key_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bytes(b) => base64::encode(b),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
        }
    }

    /// Convert to a `serde_json::Value`, stringifying all map keys.
    /// This is the lossy projection required by JSON wire output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(base64::encode(b)),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter()
                    .map(|(k, v)| (k.key_string(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert to a `serde_yaml::Value`, preserving non-string keys.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Integer(i) => serde_yaml::Value::Number((*i).into()),
            Value::Float(f) => serde_yaml::Value::Number((*f).into()),
            Value::String(s) => serde_yaml::Value::String(s.clone()),
            Value::Bytes(b) => serde_yaml::Value::String(base64::encode(b)),
            Value::List(l) => serde_yaml::Value::Sequence(l.iter().map(Value::to_yaml).collect()),
            Value::Map(m) => serde_yaml::Value::Mapping(
                m.iter().map(|(k, v)| (k.to_yaml(), v.to_yaml())).collect(),
            ),
        }
    }

    pub fn from_yaml(value: serde_yaml::Value) -> Value {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    // Clamp is wrong for u64 > i64::MAX; keep the float form.
                    if u <= i64::MAX as u64 {
                        Value::Integer(u as i64)
                    } else {
                        Value::Float(u as f64)
                    }
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(l) => {
                Value::List(l.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(m) => Value::Map(
                m.into_iter()
                    .map(|(k, v)| (Value::from_yaml(k), Value::from_yaml(v)))
                    .collect(),
            ),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(l) => {
                Value::List(l.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(m) => Value::Map(
                m.into_iter()
                    .map(|(k, v)| (Value::String(k), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Bytes(_) => 5,
            Value::List(_) => 6,
            Value::Map(_) => 7,
        }
    }
}

// Total ordering over values so that they can serve as BTreeMap keys.
// Floats order by IEEE total order, making NaN equal to itself.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.discriminant().cmp(&other.discriminant()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&base64::encode(b)),
            Value::List(l) => l.serialize(serializer),
            Value::Map(m) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    #[test]
    fn key_strings_are_deterministic() {
        assert_eq!(Value::from("plain").key_string(), "plain");
        assert_eq!(Value::Integer(42).key_string(), "42");
        assert_eq!(Value::Bool(true).key_string(), "true");
        assert_eq!(Value::Null.key_string(), "null");

        let complex = map(vec![
            (Value::Integer(2), Value::from("b")),
            (Value::Integer(1), Value::from("a")),
        ]);
        // BTreeMap ordering makes complex-key stringification stable.
        assert_eq!(complex.key_string(), r#"{"1":"a","2":"b"}"#);
    }

    #[test]
    fn non_string_keys_survive_yaml_round_trip() {
        let value = map(vec![
            (Value::Integer(1), Value::from("one")),
            (Value::from("two"), Value::Integer(2)),
        ]);
        let yaml = value.to_yaml();
        assert_eq!(Value::from_yaml(yaml), value);
    }

    #[test]
    fn json_projection_stringifies_keys() {
        let value = map(vec![(Value::Integer(1), Value::from("one"))]);
        assert_eq!(value.to_json(), serde_json::json!({"1": "one"}));
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero_of("integer"), Some(Value::Integer(0)));
        assert_eq!(Value::zero_of("string"), Some(Value::String(String::new())));
        assert_eq!(Value::zero_of("no-such-type"), None);
    }

    #[test]
    fn value_ordering_is_total() {
        let mut values = vec![
            Value::from("b"),
            Value::Integer(10),
            Value::Null,
            Value::from("a"),
            Value::Bool(false),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(false),
                Value::Integer(10),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }
}
