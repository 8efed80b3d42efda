//! The multi-phase entity pipeline: read, namespaces, hierarchies,
//! inheritance, rendering, normalization. Phases run in sequence; a phase
//! whose work left problems behind aborts the pipeline so the report
//! reflects a single consistent failure stage.

mod hierarchies;
mod inheritance;
mod namespaces;
mod read;
mod render;

pub use read::Loader;

use crate::catalog::{Catalog, Inputs};
use crate::entity::FileId;
use crate::quirks::Quirks;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Default)]
pub struct ParseOptions {
    pub quirks: Quirks,
    pub inputs: Inputs,
    pub cancel: Option<CancellationToken>,
}

/// Everything a parse session produced: the entity catalog (with its
/// problem list), the root file, and the normalized template when the
/// pipeline ran to completion.
pub struct Parsed {
    pub catalog: Arc<Catalog>,
    pub root: Option<FileId>,
    pub template: Option<normal::ServiceTemplate>,
}

impl Parsed {
    pub fn is_clean(&self) -> bool {
        self.template.is_some() && self.catalog.problems.is_empty()
    }
}

/// Run the pipeline over a root URL.
pub async fn parse(
    urls: Arc<resources::UrlContext>,
    url: Url,
    options: ParseOptions,
) -> Parsed {
    let catalog = Arc::new(Catalog::new(urls, options.quirks));
    let cancel = options.cancel.unwrap_or_default();

    // Phase 1: read the import graph.
    let root = Loader::new(catalog.clone(), cancel).read_root(url).await;
    tracing::debug!(files = catalog.file_count(), "read phase complete");
    let Some(root) = root else {
        return Parsed {
            catalog,
            root: None,
            template: None,
        };
    };
    if !catalog.problems.is_empty() {
        return Parsed {
            catalog,
            root: Some(root),
            template: None,
        };
    }

    // Phase 2: namespaces and name lookup.
    namespaces::build_namespaces(&catalog);
    tracing::debug!("namespace phase complete");
    if !catalog.problems.is_empty() {
        return Parsed {
            catalog,
            root: Some(root),
            template: None,
        };
    }

    // Phase 3: type hierarchies.
    hierarchies::build_hierarchies(&catalog);
    tracing::debug!("hierarchy phase complete");
    if !catalog.problems.is_empty() {
        return Parsed {
            catalog,
            root: Some(root),
            template: None,
        };
    }

    // Phase 4: dependency-ordered inheritance.
    inheritance::inherit_all(&catalog);
    tracing::debug!("inheritance phase complete");
    if !catalog.problems.is_empty() {
        return Parsed {
            catalog,
            root: Some(root),
            template: None,
        };
    }

    // Phase 5: apply inputs, then render value trees.
    render::apply_inputs(&catalog, root, &options.inputs);
    render::render_all(&catalog);
    tracing::debug!("render phase complete");
    if !catalog.problems.is_empty() {
        return Parsed {
            catalog,
            root: Some(root),
            template: None,
        };
    }

    // Normalize into the canonical template.
    let template = render::normalize(&catalog, root);

    Parsed {
        catalog,
        root: Some(root),
        template,
    }
}
