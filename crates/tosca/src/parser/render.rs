//! Phase 5 driver (value rendering) plus input application and the final
//! normalization dispatch.

use super::namespaces::ordered_entities;
use crate::catalog::{Catalog, Inputs, Site};
use crate::entity::{path_field, path_key, FileId, Kind};
use crate::fields::ReadCtx;
use crate::grammars::{hot, tosca_v2_0};

/// Merge externally supplied inputs into the root topology's inputs,
/// overriding defaults. Unknown input names are reported.
pub fn apply_inputs(catalog: &Catalog, root: FileId, inputs: &Inputs) {
    if inputs.is_empty() {
        return;
    }
    let Some(entity) = catalog.file(root).entity else {
        return;
    };

    enum Root {
        Tosca(Option<crate::entity::EntityId>),
        Hot(std::collections::BTreeMap<String, crate::entity::EntityId>),
        Other,
    }
    let shape = catalog.arena.with(entity, |entity| match &entity.kind {
        Kind::File(file) => Root::Tosca(file.topology),
        Kind::HotTemplate(template) => Root::Hot(template.parameters.clone()),
        _ => Root::Other,
    });

    match shape {
        Root::Tosca(Some(topology)) => {
            let (definitions, topology_meta) =
                catalog.arena.with(topology, |entity| match &entity.kind {
                    Kind::TopologyTemplate(t) => {
                        (t.input_definitions.clone(), entity.meta.clone())
                    }
                    _ => (Default::default(), entity.meta.clone()),
                });

            for (name, value) in inputs {
                let Some(definition) = definitions.get(name) else {
                    report_unknown_input(catalog, &catalog.site_of(&topology_meta), name);
                    continue;
                };
                let ctx = ReadCtx {
                    catalog,
                    file: topology_meta.file,
                    name: name.clone(),
                    path: path_key(&path_field(&topology_meta.path, "inputs"), name),
                };
                let assigned = tosca_v2_0::read_value(&ctx, value);
                catalog.arena.with_mut(*definition, |entity| {
                    if let Kind::ParameterDefinition(parameter) = &mut entity.kind {
                        parameter.value = Some(assigned);
                    }
                });
            }
        }
        Root::Tosca(None) => {
            let meta = catalog.arena.meta_of(entity);
            for name in inputs.keys() {
                report_unknown_input(catalog, &catalog.site_of(&meta), name);
            }
        }
        Root::Hot(parameters) => {
            let meta = catalog.arena.meta_of(entity);
            for (name, value) in inputs {
                let Some(parameter) = parameters.get(name) else {
                    report_unknown_input(catalog, &catalog.site_of(&meta), name);
                    continue;
                };
                catalog.arena.with_mut(*parameter, |entity| {
                    if let Kind::HotParameter(parameter) = &mut entity.kind {
                        parameter.value = Some(value.clone());
                    }
                });
            }
        }
        Root::Other => {}
    }
}

fn report_unknown_input(catalog: &Catalog, site: &Site, name: &str) {
    catalog.report(
        site,
        "Undeclared",
        format!("undeclared input: {name:?}"),
    );
}

/// Render every renderable entity. Rendering is claim-once per entity, so
/// the traversal order only affects problem order, which is sorted at
/// reporting time anyway.
pub fn render_all(catalog: &Catalog) {
    for id in ordered_entities(catalog) {
        let is_hot_parameter = catalog
            .arena
            .with(id, |entity| matches!(entity.kind, Kind::HotParameter(_)));
        if is_hot_parameter {
            hot::render_parameter(catalog, id);
        } else {
            tosca_v2_0::render_entity(catalog, id);
        }
    }
}

/// Produce the canonical service template from the root file. Exactly the
/// entities advertising normalization (grammar roots) can do this.
pub fn normalize(catalog: &Catalog, root: FileId) -> Option<normal::ServiceTemplate> {
    let file = catalog.file(root);
    let entity = file.entity?;

    let meta = catalog.arena.meta_of(entity);
    let normalized = catalog.arena.with(entity, |entity| match &entity.kind {
        Kind::File(_) => Some(NormalizeVia::Tosca),
        Kind::HotTemplate(_) => Some(NormalizeVia::Hot),
        _ => None,
    });

    match normalized {
        Some(NormalizeVia::Tosca) => tosca_v2_0::normalize_service_template(catalog, entity),
        Some(NormalizeVia::Hot) => hot::normalize_template(catalog, entity),
        None => {
            catalog.report(
                &catalog.site_of(&meta),
                "NotNormalizable",
                "grammar does not support normalization".to_string(),
            );
            None
        }
    }
}

enum NormalizeVia {
    Tosca,
    Hot,
}
