use std::path::PathBuf;
use std::sync::Arc;

/// A resource could not be loaded.
///
/// Cloneable so one failure can be delivered to every caller waiting on the
/// same URL.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceError {
    #[error("request for {url} failed")]
    Http {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("no fetcher handles the scheme of {url}")]
    UnsupportedScheme { url: String },
    #[error("load of {url} was abandoned before completing")]
    Abandoned { url: String },
}

/// A cache tier failed. Never surfaced to loaders, only logged.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache file {} is unreadable", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write cache file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
