//! In-crate test harness: a headless backend, a map-backed fetcher and the
//! evaluator plumbing controllers need.

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use diorama_engine::backend::HeadlessBackend;
use diorama_engine::resource::{Fetcher, NoCache, ResourceError, ResourceLoader};
use diorama_expr::Evaluator;

use crate::card::CardFactory;
use crate::context::UpdateCtx;
use crate::state::StateSnapshot;

pub(crate) use diorama_engine::glb::fixtures::triangle_and_point_light as sample_glb;

/// Serves fixed bytes by url; anything else is a 404.
pub(crate) struct MapFetcher(pub(crate) HashMap<String, Vec<u8>>);

#[async_trait(?Send)]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| ResourceError::Status { url: url.to_string(), status: 404 })
    }
}

pub(crate) struct Harness {
    pub backend: HeadlessBackend,
    pub evaluator: Evaluator,
    pub state: StateSnapshot,
    pub loader: Rc<ResourceLoader>,
    pub cards: Option<Rc<dyn CardFactory>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_files(std::iter::empty::<(&str, Vec<u8>)>())
    }

    pub fn with_files<'a>(files: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Self {
        let files = files.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Self {
            backend: HeadlessBackend::new(),
            evaluator: Evaluator::default(),
            state: StateSnapshot::new(),
            loader: ResourceLoader::new(MapFetcher(files), NoCache),
            cards: None,
        }
    }

    pub fn set_state(&mut self, json: serde_json::Value) {
        self.state = StateSnapshot::from_json(&json);
        self.evaluator = Evaluator::new(self.state.context());
    }

    pub fn fetches(&self) -> u64 {
        self.loader.stats().fetches
    }

    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut UpdateCtx<'_>) -> R) -> R {
        let mut ctx = UpdateCtx::new(&mut self.backend, &self.evaluator, &self.state, &self.loader)
            .with_cards(self.cards.as_ref());
        f(&mut ctx)
    }
}
