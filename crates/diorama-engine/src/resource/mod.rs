//! Resource loading: fetchers, cache tiers and the de-duplicating loader.
//!
//! ```text
//! load(url) ─┬─ outstanding? ── join waiters
//!            └─ spawn driver ── select! { cache.get, fetcher.fetch }
//!                               ├─ cache hit     → answer current waiters
//!                               └─ network done  → cache.put, answer the rest
//! ```

mod cache;
mod error;
mod fetch;
mod loader;

pub use cache::{CacheStore, DiskCache, MemoryCache, NoCache};
pub use error::{CacheError, ResourceError};
pub use fetch::{Fetcher, FileFetcher, HttpFetcher, SchemeFetcher};
pub use loader::{LoaderStats, ResourceLoader};
