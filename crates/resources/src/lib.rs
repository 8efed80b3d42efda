//! Resource loading: URL resolution against origin search paths, a
//! user-supplied rewrite map, in-memory ("internal") resources, format
//! detection and decoding into the generic value representation.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use url::Url;

/// Scheme of synthetic URLs whose content is injected in-memory rather
/// than fetched. Used for embedded grammar profiles and for tests.
pub const INTERNAL_SCHEME: &str = "internal";

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("cannot resolve {reference:?}: {detail}")]
    Malformed { reference: String, detail: String },
    #[error("cannot resolve relative {reference:?} without a base URL")]
    NoBase { reference: String },
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to read {url}")]
    Io {
        url: Url,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {detail}")]
    Http { url: Url, detail: String },
    #[error("no internal content registered for {url}")]
    InternalMissing { url: Url },
    #[error("unsupported URL scheme: {url}")]
    UnsupportedScheme { url: Url },
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] ir::DecodeError),
    #[error("archive unpacking is not supported here ({format} at {url})")]
    Archive { url: Url, format: ir::Format },
}

/// UrlContext owns everything needed to turn a textual reference into
/// decoded content: the rewrite map, origin search paths, the internal
/// content store, and an HTTP client for remote resources.
pub struct UrlContext {
    origins: Vec<Url>,
    rewrites: BTreeMap<String, String>,
    internal: Mutex<HashMap<String, Bytes>>,
    client: reqwest::Result<reqwest::Client>,
}

impl Default for UrlContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlContext {
    pub fn new() -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(30))
            .build();
        Self {
            origins: Vec::new(),
            rewrites: BTreeMap::new(),
            internal: Mutex::new(HashMap::new()),
            client,
        }
    }

    /// Origin search paths tried, in order, for relative references that
    /// don't resolve against their base.
    pub fn with_origins(mut self, origins: Vec<Url>) -> Self {
        self.origins = origins;
        self
    }

    /// URL prefix rewrites applied to every reference before resolution.
    /// The longest matching prefix wins.
    pub fn with_rewrites(mut self, rewrites: BTreeMap<String, String>) -> Self {
        self.rewrites = rewrites;
        self
    }

    /// Register in-memory content behind a synthetic `internal:` URL.
    pub fn register_internal(&self, path: &str, content: impl Into<Bytes>) -> Url {
        let url = internal_url(path);
        self.internal
            .lock()
            .expect("internal store poisoned")
            .insert(url.as_str().to_string(), content.into());
        url
    }

    pub fn has_internal(&self, url: &Url) -> bool {
        self.internal
            .lock()
            .expect("internal store poisoned")
            .contains_key(url.as_str())
    }

    /// Resolve a textual reference to a URL. Absolute references parse
    /// directly; relative ones join against `base`, falling back to the
    /// origin search paths when the joined resource does not exist.
    pub fn resolve(&self, reference: &str, base: Option<&Url>) -> Result<Url, ResolveError> {
        let reference = self.rewrite(reference);

        if let Ok(url) = Url::parse(&reference) {
            return Ok(url);
        }

        let joined = match base {
            Some(base) => match base.join(&reference) {
                Ok(url) => Some(url),
                Err(err) => {
                    return Err(ResolveError::Malformed {
                        reference,
                        detail: err.to_string(),
                    })
                }
            },
            None => None,
        };

        if let Some(joined) = &joined {
            if self.exists(joined) {
                return Ok(joined.clone());
            }
        }

        for origin in &self.origins {
            if let Ok(url) = origin.join(&reference) {
                if self.exists(&url) {
                    tracing::debug!(%reference, %url, "resolved reference via origin");
                    return Ok(url);
                }
            }
        }

        // Nothing verifiably exists; keep the base-joined form so that the
        // fetch failure is reported against a concrete URL.
        joined.ok_or(ResolveError::NoBase { reference })
    }

    fn rewrite(&self, reference: &str) -> String {
        let mut best: Option<(&str, &str)> = None;
        for (from, to) in &self.rewrites {
            if reference.starts_with(from.as_str()) {
                match best {
                    Some((prev, _)) if prev.len() >= from.len() => {}
                    _ => best = Some((from, to)),
                }
            }
        }
        match best {
            Some((from, to)) => [to, &reference[from.len()..]].concat(),
            None => reference.to_string(),
        }
    }

    fn exists(&self, url: &Url) -> bool {
        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(|p| p.exists())
                .unwrap_or(false),
            INTERNAL_SCHEME => self.has_internal(url),
            // Remote existence isn't probed; the fetch itself decides.
            "http" | "https" => true,
            _ => false,
        }
    }

    /// Fetch the raw content of a URL.
    pub async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        tracing::debug!(%url, "fetching resource");

        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| FetchError::Io {
                    url: url.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a local file path",
                    ),
                })?;
                let content = tokio::fs::read(&path).await.map_err(|source| FetchError::Io {
                    url: url.clone(),
                    source,
                })?;
                Ok(content.into())
            }
            INTERNAL_SCHEME => self
                .internal
                .lock()
                .expect("internal store poisoned")
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::InternalMissing { url: url.clone() }),
            "http" | "https" => {
                let client = self.client.as_ref().map_err(|err| FetchError::Http {
                    url: url.clone(),
                    detail: format!("failed to initialize HTTP client: {err}"),
                })?;
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|err| FetchError::Http {
                        url: url.clone(),
                        detail: err.to_string(),
                    })?;
                let status = response.status();
                let body = response.bytes().await.map_err(|err| FetchError::Http {
                    url: url.clone(),
                    detail: err.to_string(),
                })?;
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(FetchError::Http {
                        url: url.clone(),
                        detail: format!("{status}: {}", String::from_utf8_lossy(&body)),
                    })
                }
            }
            "stdin" => {
                use tokio::io::AsyncReadExt;
                let mut content = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut content)
                    .await
                    .map_err(|source| FetchError::Io {
                        url: url.clone(),
                        source,
                    })?;
                Ok(content.into())
            }
            _ => Err(FetchError::UnsupportedScheme { url: url.clone() }),
        }
    }

    /// Fetch and decode a URL into the generic value representation.
    pub async fn read(&self, url: &Url) -> Result<(ir::Value, ir::Locator), ReadError> {
        let format = format(url);
        if format.is_archive() {
            return Err(ReadError::Archive {
                url: url.clone(),
                format,
            });
        }
        let content = self.fetch(url).await?;
        Ok(ir::decode(&content, format)?)
    }
}

/// Content format of a URL, detected from its path extension.
pub fn format(url: &Url) -> ir::Format {
    let extension = url
        .path()
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext);
    ir::Format::from_extension(extension)
}

/// The canonical string key of a URL, used to deduplicate reads.
pub fn url_key(url: &Url) -> String {
    url.as_str().to_string()
}

/// Build a synthetic internal URL for the given absolute path.
pub fn internal_url(path: &str) -> Url {
    let path = path.strip_prefix('/').unwrap_or(path);
    Url::parse(&format!("{INTERNAL_SCHEME}:/{path}")).expect("internal URL is well-formed")
}

/// Map a CLI source argument to a URL: `-` becomes the stdin URL, absolute
/// URLs parse directly, and anything else is taken as a filesystem path.
pub fn arg_to_url(source: &str) -> Result<Url, ResolveError> {
    if source == "-" {
        return Ok(Url::parse("stdin://-").expect("stdin URL is well-formed"));
    }
    if let Ok(url) = Url::parse(source) {
        return Ok(url);
    }

    tracing::debug!(%source, "source is not a URL; assuming it's a filesystem path");

    let path = std::fs::canonicalize(source).map_err(|err| ResolveError::Malformed {
        reference: source.to_string(),
        detail: err.to_string(),
    })?;
    Url::from_file_path(&path).map_err(|()| ResolveError::Malformed {
        reference: source.to_string(),
        detail: "not an absolute path".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_urls_round_trip() {
        let ctx = UrlContext::new();
        let url = ctx.register_internal("profiles/test.yaml", &b"x: 1\n"[..]);
        assert_eq!(url.as_str(), "internal:/profiles/test.yaml");
        assert!(ctx.has_internal(&url));
    }

    #[tokio::test]
    async fn reads_internal_yaml() {
        let ctx = UrlContext::new();
        let url = ctx.register_internal("doc.yaml", &b"key: value\n"[..]);
        let (value, _) = ctx.read(&url).await.unwrap();
        assert_eq!(value.get("key"), Some(&ir::Value::from("value")));
    }

    #[tokio::test]
    async fn missing_internal_content_is_an_error() {
        let ctx = UrlContext::new();
        let url = internal_url("nowhere.yaml");
        assert!(matches!(
            ctx.fetch(&url).await,
            Err(FetchError::InternalMissing { .. })
        ));
    }

    #[test]
    fn rewrites_apply_longest_prefix() {
        let ctx = UrlContext::new().with_rewrites(
            [
                ("lib/".to_string(), "internal:/lib/".to_string()),
                ("lib/deep/".to_string(), "internal:/elsewhere/".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(
            ctx.resolve("lib/deep/a.yaml", None).unwrap().as_str(),
            "internal:/elsewhere/a.yaml"
        );
        assert_eq!(
            ctx.resolve("lib/a.yaml", None).unwrap().as_str(),
            "internal:/lib/a.yaml"
        );
    }

    #[test]
    fn relative_references_join_against_internal_base() {
        let ctx = UrlContext::new();
        let base = ctx.register_internal("stack/main.yaml", &b"{}"[..]);
        ctx.register_internal("stack/lib.yaml", &b"{}"[..]);
        let resolved = ctx.resolve("lib.yaml", Some(&base)).unwrap();
        assert_eq!(resolved.as_str(), "internal:/stack/lib.yaml");
    }

    #[test]
    fn format_detection() {
        let url = Url::parse("file:///a/b.json").unwrap();
        assert_eq!(format(&url), ir::Format::Json);
        let url = Url::parse("file:///a/b.csar").unwrap();
        assert_eq!(format(&url), ir::Format::Csar);
        let url = Url::parse("file:///a/b").unwrap();
        assert_eq!(format(&url), ir::Format::Yaml);
    }
}
