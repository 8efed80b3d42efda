//! Phase 2: build per-file namespaces, merge imported namespaces through
//! their name transformers, then resolve every name reference.

use crate::catalog::Catalog;
use crate::dispatch;
use crate::entity::{EntityId, FileId};
use crate::grammars::tosca_v2_0::{
    METADATA_SCRIPTLET_IMPORT_PREFIX, METADATA_SCRIPTLET_PREFIX,
};
use crate::namespace::Namespace;
use std::collections::HashSet;

pub fn build_namespaces(catalog: &Catalog) {
    let file_count = catalog.file_count();
    let mut namespaces: Vec<Namespace> = vec![Namespace::new(); file_count];

    // Register every namespace-tagged entity into its file's namespace.
    for id in ordered_entities(catalog) {
        let entry = catalog.arena.with(id, |entity| {
            let tag = dispatch::namespace_tag(&entity.kind)?;
            if catalog.quirks.namespace_normative_ignore && dispatch::is_normative(&entity.kind)
            {
                return None;
            }
            Some((entity.meta.file, tag, entity.meta.name.clone()))
        });
        if let Some((file, tag, name)) = entry {
            if let Some(existing) =
                namespaces[file.0 as usize].set(tag, name.clone(), id)
            {
                report_ambiguity(catalog, id, existing, &name);
            }
        }

        register_metadata_scriptlets(catalog, id);
    }

    // Merge each file's imports into it, children first.
    let mut merged = HashSet::new();
    for file in catalog.ordered_files() {
        merge_file(catalog, &mut namespaces, file, &mut merged);
    }

    *catalog.namespaces.write() = namespaces;

    // Lookup pass: resolve referenced names and fill target handles.
    for id in ordered_entities(catalog) {
        dispatch::lookup_entity(catalog, id);
    }
}

fn merge_file(
    catalog: &Catalog,
    namespaces: &mut [Namespace],
    file: FileId,
    merged: &mut HashSet<FileId>,
) {
    if !merged.insert(file) {
        return;
    }
    for edge in catalog.file(file).imports {
        merge_file(catalog, namespaces, edge.file, merged);

        let source = namespaces[edge.file.0 as usize].clone();
        let ambiguities = namespaces[file.0 as usize].merge(&source, &edge.transformer);
        for (tag, name, incoming, _existing) in ambiguities {
            let site = catalog.site_of_id(incoming);
            catalog.report(
                &site,
                "AmbiguousName",
                format!("ambiguous {tag} name: {name:?}"),
            );
        }
    }
}

fn report_ambiguity(catalog: &Catalog, incoming: EntityId, _existing: EntityId, name: &str) {
    let site = catalog.site_of_id(incoming);
    catalog.report(
        &site,
        "AmbiguousName",
        format!("ambiguous name: {name:?}"),
    );
}

/// Entities in deterministic order: by file order, then path. The arena's
/// own order reflects phase-1 scheduling and is not stable.
pub fn ordered_entities(catalog: &Catalog) -> Vec<EntityId> {
    let order = catalog.ordered_files();
    let position = |file: FileId| {
        order
            .iter()
            .position(|candidate| *candidate == file)
            .unwrap_or(usize::MAX)
    };

    let mut entities: Vec<(usize, String, EntityId)> = catalog
        .arena
        .ids()
        .into_iter()
        .map(|id| {
            let meta = catalog.arena.meta_of(id);
            (position(meta.file), meta.path, id)
        })
        .collect();
    entities.sort();
    entities.into_iter().map(|(_, _, id)| id).collect()
}

/// Type metadata can embed or import scriptlets:
/// `toscana.scriptlet:<name>` carries inline source and
/// `toscana.scriptlet.import:<name>` carries a path relative to the
/// declaring file.
fn register_metadata_scriptlets(catalog: &Catalog, id: EntityId) {
    let entries = catalog.arena.with(id, |entity| {
        dispatch::metadata_of(&entity.kind).map(|metadata| {
            (
                entity.meta.file,
                metadata
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Vec<_>>(),
            )
        })
    });
    let Some((file, entries)) = entries else {
        return;
    };

    for (key, value) in entries {
        if let Some(name) = key.strip_prefix(METADATA_SCRIPTLET_PREFIX) {
            catalog
                .scriptlets
                .lock()
                .expect("scriptlets poisoned")
                .register(name, &value);
        } else if let Some(name) = key.strip_prefix(METADATA_SCRIPTLET_IMPORT_PREFIX) {
            let origin = catalog.file_url(file);
            catalog
                .scriptlets
                .lock()
                .expect("scriptlets poisoned")
                .register_import(name, Some(origin), &value);
        }
    }
}
