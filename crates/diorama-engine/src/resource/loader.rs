use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::{CacheStore, Fetcher, ResourceError};
use crate::logging::error_chain;

type LoadResult = Result<Arc<[u8]>, ResourceError>;

/// Counters for diagnostics and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoaderStats {
    /// Network fetches started.
    pub fetches: u64,
    /// Callers satisfied from the cache before the network answered.
    pub cache_hits: u64,
    /// Calls that joined an already outstanding request.
    pub dedup_joins: u64,
    /// Fetches that ended in an error.
    pub failures: u64,
}

/// Loads resource bytes by URL with in-flight de-duplication.
///
/// Concurrent `load`s of one URL share a single request. Each request races
/// the cache against the network. A cache hit answers whoever is waiting at
/// that moment and is kept on the request, so callers joining later are
/// answered from it at once instead of waiting for the network. The network
/// result is written back to the cache and answers anyone still waiting, so a
/// network failure only reaches callers that no cache hit could serve.
///
/// Requests are driven by `tokio::task::spawn_local`, so `load` must run
/// inside a `LocalSet` (entered or running).
pub struct ResourceLoader {
    fetcher: Box<dyn Fetcher>,
    cache: Box<dyn CacheStore>,
    in_flight: RefCell<HashMap<String, Outstanding>>,
    stats: Cell<LoaderStats>,
}

/// One outstanding request.
struct Outstanding {
    waiters: Vec<oneshot::Sender<LoadResult>>,
    cached: Option<Arc<[u8]>>,
}

/// What `load` found in the in-flight table.
enum Joined {
    First,
    Waiting,
    Cached(Arc<[u8]>),
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("in_flight", &self.in_flight.borrow().len())
            .field("stats", &self.stats.get())
            .finish_non_exhaustive()
    }
}

impl ResourceLoader {
    pub fn new(fetcher: impl Fetcher + 'static, cache: impl CacheStore + 'static) -> Rc<Self> {
        Rc::new(Self {
            fetcher: Box::new(fetcher),
            cache: Box::new(cache),
            in_flight: RefCell::new(HashMap::new()),
            stats: Cell::new(LoaderStats::default()),
        })
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats.get()
    }

    /// URLs with an outstanding request.
    pub fn in_flight(&self) -> usize {
        self.in_flight.borrow().len()
    }

    fn bump(&self, f: impl FnOnce(&mut LoaderStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    pub async fn load(self: &Rc<Self>, url: &str) -> LoadResult {
        let (tx, rx) = oneshot::channel();
        let joined = {
            let mut in_flight = self.in_flight.borrow_mut();
            match in_flight.get_mut(url) {
                Some(Outstanding { cached: Some(bytes), .. }) => Joined::Cached(Arc::clone(bytes)),
                Some(outstanding) => {
                    outstanding.waiters.push(tx);
                    Joined::Waiting
                }
                None => {
                    let outstanding = Outstanding { waiters: vec![tx], cached: None };
                    in_flight.insert(url.to_string(), outstanding);
                    Joined::First
                }
            }
        };

        match joined {
            Joined::First => {
                log::debug!("resource: loading {url}");
                tokio::task::spawn_local(Rc::clone(self).drive(url.to_string()));
            }
            Joined::Waiting => {
                log::trace!("resource: joining outstanding load of {url}");
                self.bump(|s| s.dedup_joins += 1);
            }
            Joined::Cached(bytes) => {
                log::trace!("resource: answering {url} from the earlier cache hit");
                self.bump(|s| {
                    s.dedup_joins += 1;
                    s.cache_hits += 1;
                });
                return Ok(bytes);
            }
        }

        rx.await
            .unwrap_or_else(|_| Err(ResourceError::Abandoned { url: url.to_string() }))
    }

    /// Answers every caller currently waiting on `url` with the cached bytes
    /// and keeps them on the record for later joiners.
    fn answer_from_cache(&self, url: &str, bytes: Arc<[u8]>) {
        let waiters = match self.in_flight.borrow_mut().get_mut(url) {
            Some(outstanding) => {
                outstanding.cached = Some(Arc::clone(&bytes));
                std::mem::take(&mut outstanding.waiters)
            }
            None => Vec::new(),
        };
        for tx in waiters {
            let _ = tx.send(Ok(Arc::clone(&bytes)));
        }
    }

    async fn drive(self: Rc<Self>, url: String) {
        self.bump(|s| s.fetches += 1);

        let network = self.fetcher.fetch(&url);
        let cache = self.cache.get(&url);
        tokio::pin!(network, cache);

        let mut cache_pending = true;
        let fetched = loop {
            tokio::select! {
                hit = &mut cache, if cache_pending => {
                    cache_pending = false;
                    match hit {
                        Ok(Some(bytes)) => {
                            log::debug!("resource: cache hit for {url}");
                            self.bump(|s| s.cache_hits += 1);
                            self.answer_from_cache(&url, bytes);
                        }
                        Ok(None) => log::debug!("resource: cache miss for {url}"),
                        Err(e) => log::debug!("resource: cache read ignored: {}", error_chain(&e)),
                    }
                }
                result = &mut network => break result,
            }
        };

        let result: LoadResult = match fetched {
            Ok(bytes) => {
                let bytes: Arc<[u8]> = bytes.into();
                if let Err(e) = self.cache.put(&url, Arc::clone(&bytes)).await {
                    log::debug!("resource: cache write ignored: {}", error_chain(&e));
                }
                Ok(bytes)
            }
            Err(e) => {
                log::warn!("resource: {}", error_chain(&e));
                self.bump(|s| s.failures += 1);
                Err(e)
            }
        };

        let waiters = self.in_flight.borrow_mut().remove(&url).map(|o| o.waiters).unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}
