use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::ResourceError;

/// Network-like source of resource bytes.
#[async_trait(?Send)]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError>;
}

// ── HTTP ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        let http = |source| ResourceError::Http { url: url.to_string(), source: Arc::new(source) };
        let response = self.client.get(url).send().await.map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::Status { url: url.to_string(), status: status.as_u16() });
        }
        let bytes = response.bytes().await.map_err(http)?;
        Ok(bytes.to_vec())
    }
}

// ── Files ─────────────────────────────────────────────────────────────────

/// Reads `file://` URLs and plain paths; relative paths resolve under `root`.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
    }
}

#[async_trait(?Send)]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        let path = self.resolve(url);
        tokio::fs::read(&path)
            .await
            .map_err(|source| ResourceError::Io { path, source: Arc::new(source) })
    }
}

// ── Routing ───────────────────────────────────────────────────────────────

/// Routes `http(s)://` to [`HttpFetcher`], `file://` and scheme-less URLs to
/// [`FileFetcher`].
#[derive(Debug, Clone)]
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SchemeFetcher {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self { http: HttpFetcher::new(), file: FileFetcher::new(asset_root) }
    }
}

fn scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once("://")?;
    scheme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

#[async_trait(?Send)]
impl Fetcher for SchemeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        match scheme(url) {
            Some("http" | "https") => self.http.fetch(url).await,
            Some("file") | None => self.file.fetch(url).await,
            Some(_) => Err(ResourceError::UnsupportedScheme { url: url.to_string() }),
        }
    }
}
