//! End-to-end pipeline scenarios driven through in-memory resources.

use std::sync::Arc;

async fn parse_with(
    sources: &[(&str, &str)],
    inputs: tosca::Inputs,
    quirks: &[&str],
) -> tosca::Parsed {
    let urls = Arc::new(resources::UrlContext::new());
    let mut root = None;
    for (path, content) in sources {
        let url = urls.register_internal(path, content.as_bytes().to_vec());
        root.get_or_insert(url);
    }

    let (quirks, unknown) =
        tosca::Quirks::parse(&quirks.iter().map(|q| q.to_string()).collect::<Vec<_>>());
    assert!(unknown.is_empty(), "unknown quirks: {unknown:?}");

    tosca::parse(
        urls,
        root.expect("at least one source"),
        tosca::ParseOptions {
            quirks,
            inputs,
            cancel: None,
        },
    )
    .await
}

async fn parse_one(source: &str) -> tosca::Parsed {
    parse_with(&[("main.yaml", source)], tosca::Inputs::new(), &[]).await
}

fn property_json(parsed: &tosca::Parsed, template: &str, property: &str) -> serde_json::Value {
    parsed.template.as_ref().expect("normalized template").node_templates[template].properties
        [property]
        .to_value()
        .to_json()
}

#[tokio::test]
async fn minimal_node_template() {
    let parsed = parse_one(
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

    assert!(
        parsed.catalog.problems.is_empty(),
        "problems: {:?}",
        parsed.catalog.problems
    );
    let template = parsed.template.as_ref().expect("normalized template");
    assert_eq!(template.node_templates.len(), 1);
    let node = &template.node_templates["n"];
    assert!(node.types.contains_key("T"));
    assert!(node.requirements.is_empty());
}

#[tokio::test]
async fn profile_roots_are_inherited() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    derived_from: tosca.nodes.Root
topology_template:
  node_templates:
    n:
      type: T
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let node = &parsed.template.as_ref().unwrap().node_templates["n"];
    // The full lineage surfaces in the normalized types map.
    assert!(node.types.contains_key("T"));
    assert!(node.types.contains_key("tosca.nodes.Root"));
    // Root-type attributes materialize even without assignments.
    assert!(node.attributes.contains_key("state"));
}

#[tokio::test]
async fn inherited_property_default_applies() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  TypeParent:
    properties:
      p:
        type: string
        default: x
  TypeChild:
    derived_from: TypeParent
topology_template:
  node_templates:
    n:
      type: TypeChild
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    assert_eq!(property_json(&parsed, "n", "p")["$value"], serde_json::json!("x"));
}

#[tokio::test]
async fn inheritance_loop_reports_once_per_type() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  A:
    derived_from: B
  B:
    derived_from: A
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("InheritanceLoop"), 2);
    // The pipeline aborts before normalization.
    assert!(parsed.template.is_none());
}

#[tokio::test]
async fn constraint_violation_is_reported_once() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: integer
        constraints:
          - greater_than: 0
topology_template:
  node_templates:
    n:
      type: T
      properties:
        p: -1
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("ConstraintViolation"), 1);
    assert!(parsed.template.is_none());
}

#[tokio::test]
async fn valid_constraints_pass_and_are_captured() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: integer
        constraints:
          - greater_than: 0
topology_template:
  node_templates:
    n:
      type: T
      properties:
        p: 8080
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let wire = property_json(&parsed, "n", "p");
    assert_eq!(wire["$value"], 8080);
    assert_eq!(
        wire["$constraints"][0]["$functionCall"]["name"],
        "tosca.constraint.greater_than"
    );
}

#[tokio::test]
async fn self_import_reports_one_loop() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
imports:
  - main.yaml
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("ImportLoop"), 1);
}

#[tokio::test]
async fn import_with_namespace_prefix() {
    let sources = [
        (
            "main.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - url: lib.yaml
    namespace: lib
topology_template:
  node_templates:
    n:
      type: lib--N
"#,
        ),
        (
            "lib.yaml",
            r#"
tosca_definitions_version: tosca_2_0
node_types:
  N: {}
"#,
        ),
    ];

    let parsed = parse_with(&sources, tosca::Inputs::new(), &[]).await;
    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    assert!(parsed.template.is_some());
}

#[tokio::test]
async fn unprefixed_name_from_aliased_import_is_unknown() {
    let sources = [
        (
            "main.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - url: lib.yaml
    namespace: lib
topology_template:
  node_templates:
    n:
      type: N
"#,
        ),
        (
            "lib.yaml",
            r#"
tosca_definitions_version: tosca_2_0
node_types:
  N: {}
"#,
        ),
    ];

    let parsed = parse_with(&sources, tosca::Inputs::new(), &[]).await;
    assert_eq!(parsed.catalog.problems.count("UnknownName"), 1);
}

#[tokio::test]
async fn shared_import_reads_once() {
    let sources = [
        (
            "main.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - a.yaml
  - b.yaml
"#,
        ),
        (
            "a.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - shared.yaml
"#,
        ),
        (
            "b.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - shared.yaml
"#,
        ),
        (
            "shared.yaml",
            r#"
tosca_definitions_version: tosca_2_0
node_types:
  Shared: {}
"#,
        ),
    ];

    let parsed = parse_with(&sources, tosca::Inputs::new(), &[]).await;
    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);

    // Deduplicated by URL key: 4 sources + 1 implicit profile.
    assert_eq!(parsed.catalog.file_count(), 5);

    // Deterministic file ordering, sorted by URL.
    let order: Vec<String> = parsed
        .catalog
        .ordered_files()
        .into_iter()
        .map(|file| parsed.catalog.file_url(file).to_string())
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[tokio::test]
async fn list_property_without_entry_schema() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: list
topology_template:
  node_templates:
    n:
      type: T
      properties:
        p: [1, 2]
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("MissingEntrySchema"), 1);
}

#[tokio::test]
async fn typed_list_renders_entries() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: list
        entry_schema: integer
topology_template:
  node_templates:
    n:
      type: T
      properties:
        p: [1, 2, 3]
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let wire = property_json(&parsed, "n", "p");
    assert_eq!(wire["$list"], serde_json::json!([1, 2, 3]));
}

#[tokio::test]
async fn required_property_in_nested_complex_reports_at_depth() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
data_types:
  Address:
    properties:
      host:
        type: string
      port:
        type: integer
node_types:
  T:
    properties:
      address:
        type: Address
topology_template:
  node_templates:
    n:
      type: T
      properties:
        address:
          host: example.com
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("PropertyRequired"), 1);
    let problems = parsed.catalog.problems.to_vec();
    let required = problems
        .iter()
        .find(|problem| problem.code == "PropertyRequired")
        .unwrap();
    assert!(
        required.path.contains("address") && required.path.contains("port"),
        "unexpected path: {}",
        required.path
    );
}

#[tokio::test]
async fn undeclared_and_unsupported_fields() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    bogus_keyword: true
topology_template:
  node_templates:
    n:
      type: T
      properties:
        not_declared: 1
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("UnsupportedField"), 1);
    // The pipeline stops after the read phase; the undeclared property
    // would only surface at render.
    assert!(parsed.template.is_none());
}

#[tokio::test]
async fn undeclared_property_reports_at_render() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T: {}
topology_template:
  node_templates:
    n:
      type: T
      properties:
        not_declared: 1
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("Undeclared"), 1);
}

#[tokio::test]
async fn permissive_string_quirk_coerces() {
    let source = r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: string
topology_template:
  node_templates:
    n:
      type: T
      properties:
        p: 8080
"#;

    let strict = parse_with(&[("main.yaml", source)], tosca::Inputs::new(), &[]).await;
    assert_eq!(strict.catalog.problems.count("WrongType"), 1);

    let permissive = parse_with(
        &[("main.yaml", source)],
        tosca::Inputs::new(),
        &["data_types.string.permissive"],
    )
    .await;
    assert!(
        permissive.catalog.problems.is_empty(),
        "{:?}",
        permissive.catalog.problems
    );
    assert_eq!(
        property_json(&permissive, "n", "p")["$value"],
        serde_json::json!("8080")
    );
}

#[tokio::test]
async fn scalar_units_canonicalize_in_wire_form() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      mem:
        type: scalar-unit.size
topology_template:
  node_templates:
    n:
      type: T
      properties:
        mem: 2 KiB
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let wire = property_json(&parsed, "n", "mem");
    assert_eq!(wire["$value"]["$number"], 2048.0);
    assert_eq!(wire["$value"]["$originalString"], "2 KiB");
    // Scalars on the profile types carry a comparer reference.
    assert_eq!(
        wire["$comparer"]["$functionCall"]["name"],
        "tosca.comparer.scalar-unit"
    );
}

#[tokio::test]
async fn inputs_override_defaults_and_round_trip() {
    let source = r#"
tosca_definitions_version: tosca_2_0
topology_template:
  inputs:
    port:
      type: integer
      default: 80
  node_templates: {}
"#;

    let parsed = parse_with(&[("main.yaml", source)], tosca::Inputs::new(), &[]).await;
    assert_eq!(
        parsed.template.as_ref().unwrap().inputs["port"]
            .to_value()
            .to_json()["$value"],
        serde_json::json!(80)
    );

    let mut inputs = tosca::Inputs::new();
    inputs.insert("port".to_string(), ir::Value::Integer(8080));
    let parsed = parse_with(&[("main.yaml", source)], inputs, &[]).await;
    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    assert_eq!(
        parsed.template.as_ref().unwrap().inputs["port"]
            .to_value()
            .to_json()["$value"],
        serde_json::json!(8080)
    );
}

#[tokio::test]
async fn unknown_inputs_are_reported() {
    let source = r#"
tosca_definitions_version: tosca_2_0
topology_template:
  node_templates: {}
"#;
    let mut inputs = tosca::Inputs::new();
    inputs.insert("nope".to_string(), ir::Value::Integer(1));

    let parsed = parse_with(&[("main.yaml", source)], inputs, &[]).await;
    assert_eq!(parsed.catalog.problems.count("Undeclared"), 1);
}

#[tokio::test]
async fn required_input_without_value_is_reported() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
topology_template:
  inputs:
    needed:
      type: string
  node_templates: {}
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("PropertyRequired"), 1);
}

#[tokio::test]
async fn function_calls_stay_opaque() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    properties:
      p:
        type: string
topology_template:
  inputs:
    name:
      type: string
      default: web
  node_templates:
    n:
      type: T
      properties:
        p: { get_input: name }
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let wire = property_json(&parsed, "n", "p");
    assert_eq!(wire["$functionCall"]["name"], "get_input");
    assert_eq!(wire["$functionCall"]["arguments"][0], "name");
}

#[tokio::test]
async fn reserved_node_template_names() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T: {}
topology_template:
  node_templates:
    SELF:
      type: T
"#,
    )
    .await;

    assert_eq!(parsed.catalog.problems.count("ReservedName"), 1);
}

#[tokio::test]
async fn attribute_long_notation_captures_description() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_2_0
node_types:
  T:
    attributes:
      a:
        type: string
topology_template:
  node_templates:
    n:
      type: T
      attributes:
        a:
          description: the long form
          value: hello
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let template = parsed.template.as_ref().unwrap();
    let wire = template.node_templates["n"].attributes["a"]
        .to_value()
        .to_json();
    assert_eq!(wire["$value"], "hello");
    assert_eq!(wire["$information"]["description"], "the long form");
}

#[tokio::test]
async fn cloudify_version_value_is_unsupported() {
    let parsed = parse_one("tosca_definitions_version: cloudify_dsl_1_3\n").await;
    assert_eq!(parsed.catalog.problems.count("UnknownGrammar"), 1);
    assert!(parsed.root.is_none());
}

#[tokio::test]
async fn unknown_grammars_are_reported() {
    let parsed = parse_one("kind: Deployment\n").await;
    assert_eq!(parsed.catalog.problems.count("UnknownGrammar"), 1);
}

#[tokio::test]
async fn requirement_resolves_to_sibling() {
    let parsed = parse_one(
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

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let node = &parsed.template.as_ref().unwrap().node_templates["a"];
    assert_eq!(node.requirements.len(), 1);
    assert_eq!(node.requirements[0].name, "r");
    assert_eq!(node.requirements[0].node_template_name.as_deref(), Some("b"));
}

#[tokio::test]
async fn tosca_1_3_documents_parse_through_the_shim() {
    let parsed = parse_one(
        r#"
tosca_definitions_version: tosca_simple_yaml_1_3
node_types:
  T:
    properties:
      p:
        type: string
        default: legacy
topology_template:
  node_templates:
    n:
      type: T
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    assert_eq!(
        property_json(&parsed, "n", "p")["$value"],
        serde_json::json!("legacy")
    );
}

#[tokio::test]
async fn hot_templates_flow_through_the_pipeline() {
    let parsed = parse_one(
        r#"
heat_template_version: "2021-04-16"
description: two servers
parameters:
  flavor:
    type: string
    default: m1.small
resources:
  server_a:
    type: OS::Nova::Server
    properties:
      flavor: { get_param: flavor }
  server_b:
    type: OS::Nova::Server
    depends_on: server_a
outputs:
  first:
    value: { get_resource: server_a }
"#,
    )
    .await;

    assert!(parsed.catalog.problems.is_empty(), "{:?}", parsed.catalog.problems);
    let template = parsed.template.as_ref().unwrap();
    assert_eq!(template.node_templates.len(), 2);
    assert!(template.node_templates["server_a"]
        .types
        .contains_key("OS::Nova::Server"));
    let b = &template.node_templates["server_b"];
    assert_eq!(b.requirements.len(), 1);
    assert_eq!(b.requirements[0].node_template_name.as_deref(), Some("server_a"));
}

#[tokio::test]
async fn ambiguous_names_are_reported() {
    let sources = [
        (
            "main.yaml",
            r#"
tosca_definitions_version: tosca_2_0
imports:
  - a.yaml
  - b.yaml
"#,
        ),
        (
            "a.yaml",
            r#"
tosca_definitions_version: tosca_2_0
node_types:
  Clash: {}
"#,
        ),
        (
            "b.yaml",
            r#"
tosca_definitions_version: tosca_2_0
node_types:
  Clash: {}
"#,
        ),
    ];

    let parsed = parse_with(&sources, tosca::Inputs::new(), &[]).await;
    assert_eq!(parsed.catalog.problems.count("AmbiguousName"), 1);
}
