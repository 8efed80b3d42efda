use crate::entity::{Arena, Entity, EntityId, FileId, Kind, Meta, TypeTag};
use crate::grammar::Grammar;
use crate::hierarchy::Hierarchy;
use crate::namespace::{NameTransformer, Namespace};
use crate::problems::{Problem, Problems, Severity};
use crate::quirks::Quirks;
use crate::scriptlets::ScriptletNamespace;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// One import edge of the file DAG. The transformer applies when the
/// imported file's namespace merges into the importer's.
#[derive(Clone, Debug)]
pub struct ImportEdge {
    pub file: FileId,
    pub transformer: NameTransformer,
}

/// The parse result for one source URL: the root entity a grammar reader
/// produced, plus its imports as child files. Files form a DAG,
/// deduplicated by URL key; a file's container is its first importer.
#[derive(Clone, Debug)]
pub struct File {
    pub url: Url,
    pub grammar: Option<&'static Grammar>,
    /// None when the read failed; problems say why.
    pub entity: Option<EntityId>,
    pub container: Option<FileId>,
    pub imports: Vec<ImportEdge>,
}

impl File {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            grammar: None,
            entity: None,
            container: None,
            imports: Vec::new(),
        }
    }
}

/// Everything one parse session accumulates: the entity arena, the file
/// forest, per-file namespaces, per-tag hierarchies, the problem list,
/// and the shared collaborator handles.
pub struct Catalog {
    pub arena: Arena,
    pub files: RwLock<Vec<File>>,
    /// File handles sorted by URL key; the deterministic iteration order
    /// of phases 2 and up.
    pub file_order: RwLock<Vec<FileId>>,
    /// Indexed by `FileId`, built in phase 2 and read-only afterwards.
    pub namespaces: RwLock<Vec<Namespace>>,
    /// Keyed by type tag, built in phase 3 and read-only afterwards.
    pub hierarchies: RwLock<BTreeMap<TypeTag, Hierarchy>>,
    pub problems: Problems,
    pub quirks: Quirks,
    pub scriptlets: Mutex<ScriptletNamespace>,
    pub urls: Arc<resources::UrlContext>,
}

/// A reporting site: enough context to pin a problem to its source.
#[derive(Clone, Debug, Default)]
pub struct Site {
    pub url: String,
    pub path: String,
    pub locator: Option<ir::Locator>,
}

impl Site {
    pub fn at_path(&self, path: String) -> Site {
        Site {
            url: self.url.clone(),
            path,
            locator: self.locator,
        }
    }
}

impl Catalog {
    pub fn new(urls: Arc<resources::UrlContext>, quirks: Quirks) -> Self {
        Self {
            arena: Arena::new(),
            files: RwLock::new(Vec::new()),
            file_order: RwLock::new(Vec::new()),
            namespaces: RwLock::new(Vec::new()),
            hierarchies: RwLock::new(BTreeMap::new()),
            problems: Problems::new(),
            quirks,
            scriptlets: Mutex::new(ScriptletNamespace::new()),
            urls,
        }
    }

    pub fn add_file(&self, file: File) -> FileId {
        let mut files = self.files.write();
        let id = FileId(files.len() as u32);
        files.push(file);
        id
    }

    pub fn add_import_edge(&self, container: FileId, edge: ImportEdge) {
        self.files.write()[container.0 as usize].imports.push(edge);
    }

    pub fn file(&self, id: FileId) -> File {
        self.files.read()[id.0 as usize].clone()
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    pub fn file_url(&self, id: FileId) -> Url {
        self.files.read()[id.0 as usize].url.clone()
    }

    pub fn set_file_entity(&self, id: FileId, entity: EntityId) {
        self.files.write()[id.0 as usize].entity = Some(entity);
    }

    /// Sort file handles by URL key for deterministic downstream phases.
    pub fn sort_files(&self) {
        let files = self.files.read();
        let mut order: Vec<FileId> = (0..files.len() as u32).map(FileId).collect();
        order.sort_by(|a, b| {
            files[a.0 as usize]
                .url
                .as_str()
                .cmp(files[b.0 as usize].url.as_str())
        });
        *self.file_order.write() = order;
    }

    /// File handles in deterministic order, root's file first.
    pub fn ordered_files(&self) -> Vec<FileId> {
        self.file_order.read().clone()
    }

    pub fn alloc(&self, meta: Meta, kind: Kind) -> EntityId {
        self.arena.alloc(Entity { meta, kind })
    }

    pub fn site_of(&self, meta: &Meta) -> Site {
        Site {
            url: self.file_url(meta.file).to_string(),
            path: meta.path.clone(),
            locator: meta.locator,
        }
    }

    pub fn site_of_id(&self, id: EntityId) -> Site {
        let meta = self.arena.meta_of(id);
        self.site_of(&meta)
    }

    pub fn report(&self, site: &Site, code: &'static str, message: String) {
        self.problems.append(Problem {
            severity: Severity::Error,
            code,
            url: site.url.clone(),
            path: site.path.clone(),
            locator: site.locator,
            message,
        });
    }

    pub fn report_warning(&self, site: &Site, code: &'static str, message: String) {
        self.problems.append(Problem {
            severity: Severity::Warning,
            code,
            url: site.url.clone(),
            path: site.path.clone(),
            locator: site.locator,
            message,
        });
    }

    /// Namespace of the file an entity belongs to.
    pub fn namespace_lookup(
        &self,
        file: FileId,
        tag: TypeTag,
        name: &str,
    ) -> Option<EntityId> {
        self.namespaces
            .read()
            .get(file.0 as usize)
            .and_then(|namespace| namespace.lookup(tag, name))
    }

    /// Resolve a name in an entity's namespace, reporting `UnknownName`
    /// when absent.
    pub fn lookup_or_report(
        &self,
        meta: &Meta,
        tag: TypeTag,
        name: &str,
    ) -> Option<EntityId> {
        match self.namespace_lookup(meta.file, tag, name) {
            Some(id) => Some(id),
            None => {
                self.report(
                    &self.site_of(meta),
                    "UnknownName",
                    format!("unknown {tag}: {name:?}"),
                );
                None
            }
        }
    }

    pub fn hierarchy_compatible(&self, tag: TypeTag, base: EntityId, derived: EntityId) -> bool {
        self.hierarchies
            .read()
            .get(&tag)
            .map(|hierarchy| hierarchy.is_compatible(base, derived))
            .unwrap_or(false)
    }

    /// Ancestor lineage of a type, self first.
    pub fn hierarchy_lineage(&self, tag: TypeTag, id: EntityId) -> Vec<EntityId> {
        self.hierarchies
            .read()
            .get(&tag)
            .map(|hierarchy| hierarchy.lineage(id))
            .unwrap_or_else(|| vec![id])
    }
}

/// Map of externally supplied inputs, parsed from the CLI or an inputs
/// file before phase 5.
pub type Inputs = BTreeMap<String, ir::Value>;
