use super::data::read_data_type;
use super::templates::read_topology_template;
use super::types::{
    read_artifact_type, read_capability_type, read_group_type, read_interface_type,
    read_node_type, read_policy_type, read_relationship_type,
};
use crate::catalog::Catalog;
use crate::entity::{EntityId, Kind};
use crate::fields::{FieldReader, ReadCtx, Reader};
use crate::namespace::NameTransformer;
use std::collections::BTreeMap;
use url::Url;

/// A parsed TOSCA document: type definitions, imports, and (for the root
/// service template) the topology.
#[derive(Debug, Default)]
pub struct File {
    pub profile: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub description: Option<String>,
    pub repositories: BTreeMap<String, EntityId>,
    pub imports: Vec<EntityId>,
    pub data_types: BTreeMap<String, EntityId>,
    pub artifact_types: BTreeMap<String, EntityId>,
    pub capability_types: BTreeMap<String, EntityId>,
    pub interface_types: BTreeMap<String, EntityId>,
    pub relationship_types: BTreeMap<String, EntityId>,
    pub node_types: BTreeMap<String, EntityId>,
    pub group_types: BTreeMap<String, EntityId>,
    pub policy_types: BTreeMap<String, EntityId>,
    pub topology: Option<EntityId>,
}

fn read_file_inner(ctx: &ReadCtx<'_>, data: &ir::Value, with_topology: bool) -> EntityId {
    let mut fields = FieldReader::new(ctx, data);
    // The selector key was consumed by grammar detection.
    fields.ignore("tosca_definitions_version");
    // Anchor-reuse scratch space; contributes nothing of its own.
    fields.ignore("dsl_definitions");

    let topology = if with_topology {
        fields.entity("topology_template", read_topology_template as Reader)
    } else {
        if ctx.catalog.quirks.imports_topology_template_ignore {
            fields.ignore("topology_template");
        } else {
            fields.entity("topology_template", read_topology_template as Reader);
        }
        None
    };

    let file = File {
        profile: fields.string("profile"),
        metadata: fields.string_map("metadata").unwrap_or_default(),
        description: fields.string("description"),
        repositories: fields.entity_map("repositories", read_repository as Reader),
        imports: fields.entity_list("imports", read_import as Reader),
        data_types: fields.entity_map("data_types", read_data_type as Reader),
        artifact_types: fields.entity_map("artifact_types", read_artifact_type as Reader),
        capability_types: fields.entity_map("capability_types", read_capability_type as Reader),
        interface_types: fields.entity_map("interface_types", read_interface_type as Reader),
        relationship_types: fields
            .entity_map("relationship_types", read_relationship_type as Reader),
        node_types: fields.entity_map("node_types", read_node_type as Reader),
        group_types: fields.entity_map("group_types", read_group_type as Reader),
        policy_types: fields.entity_map("policy_types", read_policy_type as Reader),
        topology,
    };
    fields.finish();
    ctx.alloc(Kind::File(file))
}

/// `$Root` reader: the entry service template.
pub fn read_root(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    read_file_inner(ctx, data, true)
}

/// `$File` reader: an imported document. Imported topologies are parsed
/// for validation but only the root's topology normalizes.
pub fn read_file(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    read_file_inner(ctx, data, false)
}

/// An import declaration. Short notation is a bare URL string.
#[derive(Debug, Default)]
pub struct Import {
    pub url: Option<String>,
    pub profile: Option<String>,
    pub repository_name: Option<String>,
    pub repository: Option<EntityId>,
    /// Alias under which the imported names are prefixed.
    pub namespace: Option<String>,
}

pub fn read_import(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    if let ir::Value::String(url) = data {
        return ctx.alloc(Kind::Import(Import {
            url: Some(url.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let mut import = Import {
        url: fields.string("url"),
        profile: fields.string("profile"),
        repository_name: fields.string("repository"),
        repository: None,
        namespace: fields.string("namespace"),
    };
    // Earlier grammar versions used "file" and "namespace_prefix"; the
    // shims rename before delegation, but accept both here for tolerance.
    if import.url.is_none() {
        import.url = fields.string("file");
    }
    if import.namespace.is_none() {
        import.namespace = fields.string("namespace_prefix");
    }
    fields.finish();

    if import.url.is_none() && import.profile.is_none() {
        ctx.report(
            "FieldMissing",
            "import requires a \"url\" or a \"profile\"".to_string(),
        );
    }
    if let Some(namespace) = &import.namespace {
        // The merge separator would make the alias unsplittable.
        if namespace.contains("--") {
            ctx.field("namespace").report(
                "WrongType",
                format!("import namespace may not contain \"--\": {namespace:?}"),
            );
        }
    }

    ctx.alloc(Kind::Import(import))
}

/// A named artifact repository.
#[derive(Debug, Default)]
pub struct Repository {
    pub description: Option<String>,
    pub url: Option<String>,
    /// Resolved against the declaring file's URL.
    pub resolved: Option<Url>,
}

impl Repository {
    /// The resolved repository URL.
    pub fn url(&self) -> Option<&Url> {
        self.resolved.as_ref()
    }
}

pub fn read_repository(ctx: &ReadCtx<'_>, data: &ir::Value) -> EntityId {
    if let ir::Value::String(url) = data {
        return ctx.alloc(Kind::Repository(Repository {
            url: Some(url.clone()),
            ..Default::default()
        }));
    }

    let mut fields = FieldReader::new(ctx, data);
    let repository = Repository {
        description: fields.string("description"),
        url: fields.required_string("url"),
        resolved: None,
    };
    fields.finish();
    ctx.alloc(Kind::Repository(repository))
}

/// One import to schedule: where to read, how to merge names back.
#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub url: Url,
    pub transformer: NameTransformer,
    pub implicit: bool,
}

/// Collect the import specs of a file entity, resolving relative
/// references against the containing file's URL (or the repository's,
/// when one is named).
pub fn import_specs(catalog: &Catalog, file_entity: EntityId) -> Vec<ImportSpec> {
    let (imports, repositories, file_meta) = catalog.arena.with(file_entity, |entity| {
        let (imports, repositories) = match &entity.kind {
            Kind::File(file) => (file.imports.clone(), file.repositories.clone()),
            _ => (Vec::new(), Default::default()),
        };
        (imports, repositories, entity.meta.clone())
    });
    let base = catalog.file_url(file_meta.file);

    let mut specs = Vec::new();
    for import_id in imports {
        let (url, profile, repository_name, namespace, meta) =
            catalog.arena.with(import_id, |entity| match &entity.kind {
                Kind::Import(import) => (
                    import.url.clone(),
                    import.profile.clone(),
                    import.repository_name.clone(),
                    import.namespace.clone(),
                    entity.meta.clone(),
                ),
                _ => (None, None, None, None, entity.meta.clone()),
            });

        let site = catalog.site_of(&meta);
        let transformer = match namespace {
            Some(alias) => NameTransformer::Prefix(alias),
            None => NameTransformer::Identity,
        };

        let reference = match (&url, &profile) {
            (Some(url), _) => url.clone(),
            (None, Some(profile)) => {
                catalog.report(
                    &site,
                    "UnknownName",
                    format!("unknown profile: {profile:?}"),
                );
                continue;
            }
            (None, None) => continue, // already reported at read
        };

        // A named repository rebases the reference onto its URL. This
        // runs before the namespace phase, so the repository resolves
        // against the declaring file's own map.
        let base = match &repository_name {
            Some(name) => match repositories.get(name) {
                Some(repository_id) => {
                    let repository_url =
                        catalog.arena.with(*repository_id, |entity| match &entity.kind {
                            Kind::Repository(repository) => repository.url.clone(),
                            _ => None,
                        });
                    match repository_url
                        .and_then(|reference| catalog.urls.resolve(&reference, Some(&base)).ok())
                    {
                        Some(resolved) => resolved,
                        None => base.clone(),
                    }
                }
                None => {
                    catalog.report(
                        &site,
                        "UnknownName",
                        format!("unknown repository: {name:?}"),
                    );
                    continue;
                }
            },
            None => base.clone(),
        };

        match catalog.urls.resolve(&reference, Some(&base)) {
            Ok(url) => specs.push(ImportSpec {
                url,
                transformer,
                implicit: false,
            }),
            Err(err) => {
                catalog.report(&site, "IO", err.to_string());
            }
        }
    }
    specs
}
