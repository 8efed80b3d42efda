//! Phase 1: concurrent reading of the import graph. Reads deduplicate
//! through a promise cache keyed by URL; a second arrival for an
//! in-flight URL waits on the first instead of re-reading.

use crate::catalog::{Catalog, File, ImportEdge, Site};
use crate::entity::{EntityId, FileId};
use crate::fields::ReadCtx;
use crate::grammar::{detect, Detected, Grammar};
use crate::grammars::tosca_v2_0::{import_specs, ImportSpec};
use crate::namespace::NameTransformer;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

type Promise = Shared<BoxFuture<'static, Option<FileId>>>;

enum CacheEntry {
    Pending(Promise),
    Done(Option<FileId>),
}

pub struct Loader {
    catalog: Arc<Catalog>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    registered_grammars: Mutex<HashSet<&'static str>>,
    cancel: CancellationToken,
}

impl Loader {
    pub fn new(catalog: Arc<Catalog>, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            cache: Mutex::new(HashMap::new()),
            registered_grammars: Mutex::new(HashSet::new()),
            cancel,
        })
    }

    /// Read the root document and its transitive imports, then freeze the
    /// file order. Returns the root's file when its read produced an
    /// entity.
    pub async fn read_root(self: &Arc<Self>, url: Url) -> Option<FileId> {
        let root = self
            .clone()
            .read_file(url, None, NameTransformer::Identity, true)
            .await;
        self.catalog.sort_files();

        root.filter(|root| self.catalog.file(*root).entity.is_some())
    }

    fn read_file(
        self: Arc<Self>,
        url: Url,
        container: Option<FileId>,
        transformer: NameTransformer,
        is_root: bool,
    ) -> BoxFuture<'static, Option<FileId>> {
        async move {
            let key = resources::url_key(&url);

            // Consult the read cache: reuse a finished file, wait on an
            // in-flight one, or claim the read ourselves.
            enum Claim {
                Reuse(Option<FileId>),
                Wait(Promise),
                Read(futures::channel::oneshot::Sender<Option<FileId>>),
            }
            let claim = {
                let mut cache = self.cache.lock().expect("read cache poisoned");
                match cache.get(&key) {
                    Some(CacheEntry::Done(file)) => Claim::Reuse(*file),
                    Some(CacheEntry::Pending(promise)) => Claim::Wait(promise.clone()),
                    None => {
                        let (sender, receiver) = futures::channel::oneshot::channel();
                        let promise: Promise =
                            async move { receiver.await.ok().flatten() }.boxed().shared();
                        cache.insert(key.clone(), CacheEntry::Pending(promise));
                        Claim::Read(sender)
                    }
                }
            };

            let file = match claim {
                Claim::Reuse(file) => {
                    tracing::debug!(%url, "read cache hit");
                    file
                }
                Claim::Wait(promise) => {
                    tracing::debug!(%url, "waiting on in-flight read");
                    tokio::select! {
                        file = promise => file,
                        _ = self.cancel.cancelled() => None,
                    }
                }
                Claim::Read(sender) => {
                    let file = self.clone().read_fresh(url, container, is_root).await;
                    self.cache
                        .lock()
                        .expect("read cache poisoned")
                        .insert(key, CacheEntry::Done(file));
                    // Waiters may all be gone; that's fine.
                    let _ = sender.send(file);
                    file
                }
            };

            // Record this import edge on the container, whatever the
            // outcome of the read itself.
            if let (Some(container), Some(file)) = (container, file) {
                self.catalog
                    .add_import_edge(container, ImportEdge { file, transformer });
            }
            file
        }
        .boxed()
    }

    /// Perform an actual read: fetch, decode, detect the grammar, run its
    /// reader, then schedule imports concurrently.
    async fn read_fresh(
        self: Arc<Self>,
        url: Url,
        container: Option<FileId>,
        is_root: bool,
    ) -> Option<FileId> {
        tracing::debug!(%url, is_root, "reading");

        let mut file = File::new(url.clone());
        file.container = container;

        let site = Site {
            url: url.to_string(),
            path: String::new(),
            locator: None,
        };

        let data = tokio::select! {
            data = self.catalog.urls.read(&url) => data,
            _ = self.cancel.cancelled() => {
                self.catalog.report(&site, "Cancelled", "read cancelled".to_string());
                return Some(self.catalog.add_file(file));
            }
        };
        let (data, _locator) = match data {
            Ok(read) => read,
            Err(err) => {
                let code = match &err {
                    resources::ReadError::Decode(_) => "Decode",
                    _ => "IO",
                };
                let mut site = site;
                if let resources::ReadError::Decode(decode) = &err {
                    site.locator = decode.locator();
                }
                self.catalog.report(&site, code, err.to_string());
                return Some(self.catalog.add_file(file));
            }
        };

        let (grammar, version) = match detect(&data) {
            Detected::Grammar { grammar, version } => (grammar, version),
            Detected::UnknownVersion { key, version } => {
                self.catalog.report(
                    &site,
                    "UnknownGrammar",
                    format!("unsupported {key}: {version:?}"),
                );
                return Some(self.catalog.add_file(file));
            }
            Detected::NoMatch => {
                self.catalog.report(
                    &site,
                    "UnknownGrammar",
                    "no grammar detected".to_string(),
                );
                return Some(self.catalog.add_file(file));
            }
        };
        self.register_grammar(grammar);

        file.grammar = Some(grammar);
        let file_id = self.catalog.add_file(file);

        // Run the grammar's reader; it records problems rather than
        // failing, and always produces an entity.
        let ctx = ReadCtx::root(&self.catalog, file_id);
        let reader = if is_root {
            grammar.read_root
        } else {
            grammar.read_file
        };
        let entity = reader(&ctx, &data);
        self.catalog.set_file_entity(file_id, entity);

        self.schedule_imports(file_id, entity, grammar, version).await;

        Some(file_id)
    }

    /// Schedule the file's imports (plus the grammar's implicit profile)
    /// concurrently, skipping anything that would close an import loop.
    async fn schedule_imports(
        self: &Arc<Self>,
        file: FileId,
        entity: EntityId,
        grammar: &'static Grammar,
        version: &str,
    ) {
        let mut specs = import_specs(&self.catalog, entity);

        if !self.catalog.quirks.imports_implicit_disable {
            if let Some(profile) = grammar.implicit_profile(version) {
                specs.push(ImportSpec {
                    url: resources::internal_url(profile),
                    transformer: NameTransformer::Identity,
                    implicit: true,
                });
            }
        }

        let reads = specs.into_iter().filter_map(|spec| {
            // Walk the container chain; a revisited URL is a loop.
            let mut looped = false;
            let mut ancestor = Some(file);
            while let Some(current) = ancestor {
                let current = self.catalog.file(current);
                if resources::url_key(&current.url) == resources::url_key(&spec.url) {
                    looped = true;
                    break;
                }
                ancestor = current.container;
            }
            if looped {
                if !spec.implicit {
                    self.catalog.report(
                        &Site {
                            url: self.catalog.file_url(file).to_string(),
                            path: String::new(),
                            locator: None,
                        },
                        "ImportLoop",
                        format!("import loop: {}", spec.url),
                    );
                }
                return None;
            }

            Some(self.clone().read_file(
                spec.url,
                Some(file),
                spec.transformer,
                false,
            ))
        });

        let _: Vec<Option<FileId>> = futures::future::join_all(reads).await;
    }

    fn register_grammar(&self, grammar: &'static Grammar) {
        let mut registered = self
            .registered_grammars
            .lock()
            .expect("grammar registry poisoned");
        if registered.insert(grammar.name) {
            let mut scriptlets = self
                .catalog
                .scriptlets
                .lock()
                .expect("scriptlets poisoned");
            (grammar.register)(&self.catalog.urls, &mut scriptlets);
        }
    }
}
