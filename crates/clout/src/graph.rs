use crate::wire::CloutError;
use std::collections::BTreeMap;

/// The one and only supported Clout wire version.
pub const VERSION: &str = "1.0";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clout {
    pub version: String,
    pub metadata: ir::Map,
    pub properties: ir::Map,
    pub vertexes: BTreeMap<String, Vertex>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub metadata: ir::Map,
    pub properties: ir::Map,
    pub edges_out: Vec<Edge>,
    /// Back-pointers filled by `resolve_edges`; not part of the wire form.
    pub edges_in: Vec<EdgeRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Edge {
    pub target_id: String,
    pub metadata: ir::Map,
    pub properties: ir::Map,
}

/// Identifies an edge as `vertexes[source_id].edges_out[index]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeRef {
    pub source_id: String,
    pub index: usize,
}

impl Clout {
    pub fn new() -> Self {
        Self {
            version: VERSION.to_string(),
            metadata: ir::Map::new(),
            properties: ir::Map::new(),
            vertexes: BTreeMap::new(),
        }
    }

    pub fn add_vertex(&mut self, id: impl Into<String>, vertex: Vertex) {
        self.vertexes.insert(id.into(), vertex);
    }

    /// Validate the version gate and link all edges. Fails without mutating
    /// anything if the version is wrong or any `target_id` is unknown.
    pub fn resolve(&mut self) -> Result<(), CloutError> {
        if self.version.is_empty() {
            return Err(CloutError::MissingVersion);
        }
        if self.version != VERSION {
            return Err(CloutError::UnsupportedVersion(self.version.clone()));
        }
        self.resolve_edges()
    }

    /// Link every outgoing edge to its target vertex, recording the
    /// back-pointer on the target's `edges_in`. Resolution is atomic: any
    /// unknown target fails the whole document and leaves `edges_in` empty.
    pub fn resolve_edges(&mut self) -> Result<(), CloutError> {
        for vertex in self.vertexes.values_mut() {
            vertex.edges_in.clear();
        }

        for (source_id, vertex) in &self.vertexes {
            for edge in &vertex.edges_out {
                if !self.vertexes.contains_key(&edge.target_id) {
                    return Err(CloutError::BadTarget {
                        source_id: source_id.clone(),
                        target_id: edge.target_id.clone(),
                    });
                }
            }
        }

        let links: Vec<(String, EdgeRef)> = self
            .vertexes
            .iter()
            .flat_map(|(source_id, vertex)| {
                vertex
                    .edges_out
                    .iter()
                    .enumerate()
                    .map(move |(index, edge)| {
                        (
                            edge.target_id.clone(),
                            EdgeRef {
                                source_id: source_id.clone(),
                                index,
                            },
                        )
                    })
            })
            .collect();

        for (target_id, edge_ref) in links {
            self.vertexes
                .get_mut(&target_id)
                .expect("targets were just validated")
                .edges_in
                .push(edge_ref);
        }

        Ok(())
    }

    /// The edge a back-pointer refers to.
    pub fn edge(&self, edge_ref: &EdgeRef) -> Option<&Edge> {
        self.vertexes
            .get(&edge_ref.source_id)
            .and_then(|vertex| vertex.edges_out.get(edge_ref.index))
    }
}

impl Vertex {
    pub fn with_properties(properties: ir::Map) -> Self {
        Self {
            properties,
            ..Default::default()
        }
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges_out.push(edge);
    }
}

impl Edge {
    pub fn to(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    pub fn sample_clout() -> Clout {
        let mut clout = Clout::new();
        clout
            .metadata
            .insert("generator".into(), ir::Value::from("tests"));
        clout
            .properties
            .insert("name".into(), ir::Value::from("sample"));

        let mut a = Vertex::default();
        a.metadata.insert("kind".into(), ir::Value::from("NodeTemplate"));
        a.properties.insert("name".into(), ir::Value::from("a"));
        let mut edge = Edge::to("b");
        edge.properties.insert("name".into(), ir::Value::from("r"));
        a.add_edge(edge);
        clout.add_vertex("a", a);

        let mut b = Vertex::default();
        b.properties.insert("name".into(), ir::Value::from("b"));
        clout.add_vertex("b", b);

        clout.resolve().expect("sample clout resolves");
        clout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertex_clout() -> Clout {
        let mut clout = Clout::new();
        let mut a = Vertex::default();
        a.add_edge(Edge::to("b"));
        clout.add_vertex("a", a);
        clout.add_vertex("b", Vertex::default());
        clout
    }

    #[test]
    fn resolve_links_back_pointers() {
        let mut clout = two_vertex_clout();
        clout.resolve().unwrap();

        let b = &clout.vertexes["b"];
        assert_eq!(
            b.edges_in,
            vec![EdgeRef {
                source_id: "a".to_string(),
                index: 0
            }]
        );
        assert_eq!(clout.edge(&b.edges_in[0]).unwrap().target_id, "b");
    }

    #[test]
    fn resolve_fails_atomically_on_unknown_target() {
        let mut clout = two_vertex_clout();
        clout
            .vertexes
            .get_mut("b")
            .unwrap()
            .add_edge(Edge::to("missing"));

        assert!(matches!(
            clout.resolve(),
            Err(CloutError::BadTarget { ref target_id, .. }) if target_id == "missing"
        ));
        // No partial linkage.
        assert!(clout.vertexes.values().all(|v| v.edges_in.is_empty()));
    }

    #[test]
    fn version_gate() {
        let mut clout = two_vertex_clout();
        clout.version = "2.0".to_string();
        assert!(matches!(
            clout.resolve(),
            Err(CloutError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut clout = two_vertex_clout();
        clout.resolve().unwrap();
        clout.resolve().unwrap();
        assert_eq!(clout.vertexes["b"].edges_in.len(), 1);
    }
}
