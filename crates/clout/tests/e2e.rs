//! Parse → normalize → compile → wire round-trip scenarios.

use std::sync::Arc;

async fn compile_source(source: &str) -> (clout::Clout, tosca::Parsed) {
    let urls = Arc::new(resources::UrlContext::new());
    let root = urls.register_internal("main.yaml", source.as_bytes().to_vec());

    let parsed = tosca::parse(urls, root, tosca::ParseOptions::default()).await;
    assert!(
        parsed.catalog.problems.is_empty(),
        "problems: {:?}",
        parsed.catalog.problems
    );
    let template = parsed.template.as_ref().expect("normalized template");
    let clout = clout::compile(template).expect("compiles to Clout");
    (clout, parsed)
}

#[tokio::test]
async fn minimal_node_template_compiles_to_one_vertex() {
    let (clout, _) = compile_source(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T: {}
topology_template:
  node_templates:
    n:
      type: T
"#,
    )
    .await;

    assert_eq!(clout.version, clout::VERSION);
    assert_eq!(clout.vertexes.len(), 1);

    let vertex = &clout.vertexes["n"];
    assert!(vertex.edges_out.is_empty());
    assert!(vertex.edges_in.is_empty());

    // metadata.types lists T.
    let types = vertex
        .properties
        .get(&ir::Value::from("types"))
        .and_then(ir::Value::as_map)
        .expect("vertex types");
    assert!(types.contains_key(&ir::Value::from("T")));

    let kind = vertex
        .metadata
        .get(&ir::Value::from("toscana"))
        .and_then(|engine| engine.get("kind"))
        .cloned();
    assert_eq!(kind, Some(ir::Value::from("NodeTemplate")));
}

#[tokio::test]
async fn requirement_becomes_a_labeled_edge() {
    let (clout, _) = compile_source(
        r#"
tosca_definitions_version: tosca_2_0
capability_types:
  C: {}
node_types:
  T:
    requirements:
      - r:
          capability: C
topology_template:
  node_templates:
    a:
      type: T
      requirements:
        - r: b
    b:
      type: T
"#,
    )
    .await;

    let a = &clout.vertexes["a"];
    assert_eq!(a.edges_out.len(), 1);
    let edge = &a.edges_out[0];
    assert_eq!(edge.target_id, "b");
    assert_eq!(
        edge.properties.get(&ir::Value::from("name")),
        Some(&ir::Value::from("r"))
    );

    // Back-pointer satisfied on the target.
    let b = &clout.vertexes["b"];
    assert_eq!(b.edges_in.len(), 1);
    assert_eq!(clout.edge(&b.edges_in[0]).unwrap().target_id, "b");
}

#[tokio::test]
async fn scriptlets_round_trip_into_metadata() {
    let (clout, _) = compile_source(
        r#"
tosca_definitions_version: tosca_2_0
topology_template:
  node_templates: {}
"#,
    )
    .await;

    let scriptlets = clout
        .metadata
        .get(&ir::Value::from("toscana"))
        .and_then(|engine| engine.get("scriptlets"))
        .and_then(ir::Value::as_map)
        .expect("scriptlet namespace in metadata");
    assert!(scriptlets.contains_key(&ir::Value::from("tosca.constraint.greater_than")));
}

#[tokio::test]
async fn wire_round_trip_preserves_structure() {
    let (clout, _) = compile_source(
        r#"
tosca_definitions_version: tosca_2_0
capability_types:
  C: {}
node_types:
  T:
    properties:
      p:
        type: string
        default: x
    requirements:
      - r:
          capability: C
topology_template:
  node_templates:
    a:
      type: T
      requirements:
        - r: b
    b:
      type: T
"#,
    )
    .await;

    // YAML round trip.
    let yaml = serde_yaml::to_string(&clout.to_yaml()).unwrap();
    let read_back = clout::Clout::read(yaml.as_bytes(), ir::Format::Yaml).unwrap();
    assert_eq!(read_back.vertexes.len(), clout.vertexes.len());
    for (id, vertex) in &clout.vertexes {
        let other = &read_back.vertexes[id];
        assert_eq!(other.properties, vertex.properties, "vertex {id}");
        assert_eq!(other.edges_out, vertex.edges_out, "vertex {id}");
        assert_eq!(other.edges_in, vertex.edges_in, "vertex {id}");
    }

    // JSON round trip (keys stringified on the way out).
    let json = serde_json::to_vec(&clout.to_json()).unwrap();
    let read_back = clout::Clout::read(&json, ir::Format::Json).unwrap();
    assert_eq!(read_back.vertexes.len(), clout.vertexes.len());
}

#[tokio::test]
async fn groups_policies_and_workflows_become_vertexes() {
    let (clout, _) = compile_source(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T: {}
group_types:
  G: {}
policy_types:
  P: {}
topology_template:
  node_templates:
    a:
      type: T
    b:
      type: T
  groups:
    g:
      type: G
      members: [a, b]
  policies:
    - p:
        type: P
        targets: [g]
  workflows:
    deploy:
      steps:
        install:
          target: a
          activities:
            - delegate: deploy
"#,
    )
    .await;

    assert_eq!(clout.vertexes["group:g"].edges_out.len(), 2);
    assert_eq!(clout.vertexes["policy:p"].edges_out[0].target_id, "group:g");
    assert_eq!(clout.vertexes["workflow:deploy"].edges_out[0].target_id, "a");
    assert_eq!(clout.vertexes.len(), 5);
}

#[tokio::test]
async fn hot_resources_compile_with_dependency_edges() {
    let (clout, _) = compile_source(
        r#"
heat_template_version: "2021-04-16"
resources:
  server_a:
    type: OS::Nova::Server
  server_b:
    type: OS::Nova::Server
    depends_on: server_a
"#,
    )
    .await;

    assert_eq!(clout.vertexes.len(), 2);
    let b = &clout.vertexes["server_b"];
    assert_eq!(b.edges_out.len(), 1);
    assert_eq!(b.edges_out[0].target_id, "server_a");
}

#[tokio::test]
async fn compilation_is_deterministic() {
    let source = r#"
tosca_definitions_version: tosca_2_0
capability_types:
  C: {}
node_types:
  T:
    properties:
      p:
        type: string
        default: x
    requirements:
      - r:
          capability: C
topology_template:
  inputs:
    port:
      type: integer
      default: 80
  node_templates:
    a:
      type: T
      requirements:
        - r: b
    b:
      type: T
"#;

    // Two independent sessions over the same sources produce
    // byte-identical wire output, concurrent phase-1 scheduling and the
    // phase-4 worker pool notwithstanding.
    let (first, _) = compile_source(source).await;
    let (second, _) = compile_source(source).await;
    assert_eq!(
        serde_json::to_string(&first.to_json()).unwrap(),
        serde_json::to_string(&second.to_json()).unwrap()
    );
}
