use crate::graph::{Clout, Edge, Vertex, VERSION};

#[derive(thiserror::Error, Debug)]
pub enum CloutError {
    #[error("malformed Clout: no \"version\"")]
    MissingVersion,
    #[error("unsupported Clout version: {0:?}")]
    UnsupportedVersion(String),
    #[error("could not resolve Clout, bad targetID {target_id:?} on vertex {source_id:?}")]
    BadTarget {
        source_id: String,
        target_id: String,
    },
    #[error("malformed Clout: {0}")]
    Malformed(String),
    #[error(transparent)]
    Decode(#[from] ir::DecodeError),
}

impl Clout {
    /// Wire form preserving non-string map keys (YAML, CBOR, MessagePack).
    /// For JSON, project the result through `ir::Value::to_json`, which
    /// deep-stringifies every key.
    pub fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("version".into(), ir::Value::from(self.version.clone()));
        map.insert("metadata".into(), ir::Value::Map(self.metadata.clone()));
        map.insert("properties".into(), ir::Value::Map(self.properties.clone()));
        map.insert(
            "vertexes".into(),
            ir::Value::Map(
                self.vertexes
                    .iter()
                    .map(|(id, vertex)| (ir::Value::from(id.clone()), vertex.to_value()))
                    .collect(),
            ),
        );
        ir::Value::Map(map)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.to_value().to_json()
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        self.to_value().to_yaml()
    }

    /// Unpack a Clout from its decoded wire form and resolve it.
    pub fn from_value(value: &ir::Value) -> Result<Clout, CloutError> {
        let map = value
            .as_map()
            .ok_or_else(|| CloutError::Malformed(format!("not a map: {}", value.type_name())))?;

        let mut clout = Clout::new();

        match map.get(&ir::Value::from("version")) {
            Some(version) => {
                clout.version = version
                    .as_str()
                    .ok_or_else(|| {
                        CloutError::Malformed(format!(
                            "\"version\" not a string: {}",
                            version.type_name()
                        ))
                    })?
                    .to_string();
            }
            None => return Err(CloutError::MissingVersion),
        }

        if let Some(metadata) = map.get(&ir::Value::from("metadata")) {
            clout.metadata = unpack_map("metadata", metadata)?;
        }
        if let Some(properties) = map.get(&ir::Value::from("properties")) {
            clout.properties = unpack_map("properties", properties)?;
        }

        if let Some(vertexes) = map.get(&ir::Value::from("vertexes")) {
            let vertexes = vertexes.as_map().ok_or_else(|| {
                CloutError::Malformed(format!(
                    "\"vertexes\" not a map: {}",
                    vertexes.type_name()
                ))
            })?;
            for (id, data) in vertexes {
                let id = id
                    .as_str()
                    .ok_or_else(|| {
                        CloutError::Malformed(format!("vertex id not a string: {}", id.type_name()))
                    })?
                    .to_string();
                clout.vertexes.insert(id, Vertex::from_value(data)?);
            }
        }

        clout.resolve()?;
        Ok(clout)
    }

    /// Read a Clout from encoded content. Requires `version == "1.0"`.
    pub fn read(content: &[u8], format: ir::Format) -> Result<Clout, CloutError> {
        let (value, _) = ir::decode(content, format)?;
        Self::from_value(&value)
    }

    pub fn write_json<W: std::io::Write>(&self, writer: W) -> Result<(), std::io::Error> {
        serde_json::to_writer_pretty(writer, &self.to_json()).map_err(std::io::Error::from)
    }

    pub fn write_yaml<W: std::io::Write>(&self, writer: W) -> Result<(), std::io::Error> {
        serde_yaml::to_writer(writer, &self.to_yaml())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

impl Vertex {
    fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("metadata".into(), ir::Value::Map(self.metadata.clone()));
        map.insert("properties".into(), ir::Value::Map(self.properties.clone()));
        map.insert(
            "edgesOut".into(),
            ir::Value::List(self.edges_out.iter().map(Edge::to_value).collect()),
        );
        ir::Value::Map(map)
    }

    fn from_value(value: &ir::Value) -> Result<Vertex, CloutError> {
        let map = value.as_map().ok_or_else(|| {
            CloutError::Malformed(format!("malformed vertex: not a map: {}", value.type_name()))
        })?;

        let mut vertex = Vertex::default();
        if let Some(metadata) = map.get(&ir::Value::from("metadata")) {
            vertex.metadata = unpack_map("vertex metadata", metadata)?;
        }
        if let Some(properties) = map.get(&ir::Value::from("properties")) {
            vertex.properties = unpack_map("vertex properties", properties)?;
        }
        if let Some(edges) = map.get(&ir::Value::from("edgesOut")) {
            let edges = edges.as_list().ok_or_else(|| {
                CloutError::Malformed(format!(
                    "malformed vertex: \"edgesOut\" not a list: {}",
                    edges.type_name()
                ))
            })?;
            for edge in edges {
                vertex.edges_out.push(Edge::from_value(edge)?);
            }
        }
        Ok(vertex)
    }
}

impl Edge {
    fn to_value(&self) -> ir::Value {
        let mut map = ir::Map::new();
        map.insert("targetID".into(), ir::Value::from(self.target_id.clone()));
        map.insert("metadata".into(), ir::Value::Map(self.metadata.clone()));
        map.insert("properties".into(), ir::Value::Map(self.properties.clone()));
        ir::Value::Map(map)
    }

    fn from_value(value: &ir::Value) -> Result<Edge, CloutError> {
        let map = value.as_map().ok_or_else(|| {
            CloutError::Malformed(format!("malformed edge: not a map: {}", value.type_name()))
        })?;

        let target_id = map
            .get(&ir::Value::from("targetID"))
            .ok_or_else(|| CloutError::Malformed("malformed edge: no \"targetID\"".to_string()))?;
        let target_id = target_id
            .as_str()
            .ok_or_else(|| {
                CloutError::Malformed(format!(
                    "malformed edge: \"targetID\" not a string: {}",
                    target_id.type_name()
                ))
            })?
            .to_string();

        let mut edge = Edge::to(target_id);
        if let Some(metadata) = map.get(&ir::Value::from("metadata")) {
            edge.metadata = unpack_map("edge metadata", metadata)?;
        }
        if let Some(properties) = map.get(&ir::Value::from("properties")) {
            edge.properties = unpack_map("edge properties", properties)?;
        }
        Ok(edge)
    }
}

fn unpack_map(what: &str, value: &ir::Value) -> Result<ir::Map, CloutError> {
    value
        .as_map()
        .cloned()
        .ok_or_else(|| CloutError::Malformed(format!("{what} not a map: {}", value.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests_support::sample_clout;

    #[test]
    fn wire_round_trip_is_structurally_equal() {
        let clout = sample_clout();
        let wire = clout.to_value();
        let read_back = Clout::from_value(&wire).unwrap();

        assert_eq!(read_back.version, VERSION);
        assert_eq!(read_back.metadata, clout.metadata);
        assert_eq!(read_back.properties, clout.properties);
        assert_eq!(read_back.vertexes.len(), clout.vertexes.len());
        for (id, vertex) in &clout.vertexes {
            let other = &read_back.vertexes[id];
            assert_eq!(other.properties, vertex.properties);
            assert_eq!(other.edges_out, vertex.edges_out);
        }
    }

    #[test]
    fn yaml_round_trip() {
        let clout = sample_clout();
        let text = serde_yaml::to_string(&clout.to_yaml()).unwrap();
        let (value, _) = ir::decode(text.as_bytes(), ir::Format::Yaml).unwrap();
        let read_back = Clout::from_value(&value).unwrap();
        assert_eq!(read_back.vertexes.len(), clout.vertexes.len());
    }

    #[test]
    fn json_output_stringifies_keys() {
        let mut clout = sample_clout();
        clout
            .properties
            .insert(ir::Value::Integer(7), ir::Value::from("seven"));
        let json = clout.to_json();
        assert_eq!(json["properties"]["7"], "seven");
    }

    #[test]
    fn reading_requires_version() {
        let err = Clout::read(b"metadata: {}\n", ir::Format::Yaml).unwrap_err();
        assert!(matches!(err, CloutError::MissingVersion));

        let err = Clout::read(b"version: \"9.9\"\nvertexes: {}\n", ir::Format::Yaml).unwrap_err();
        assert!(matches!(err, CloutError::UnsupportedVersion(_)));
    }
}
