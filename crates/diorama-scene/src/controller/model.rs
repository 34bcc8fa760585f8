use std::rc::Rc;

use diorama_config::{CustomLightConfig, ModelConfig};
use diorama_engine::backend::{Backend, Light, NodeId, Primitive};
use diorama_engine::glb::{parse_glb, GlbScene};
use diorama_engine::logging::error_chain;
use diorama_engine::resource::ResourceLoader;
use tokio::sync::oneshot::{self, error::TryRecvError};

use super::{apply_transform, apply_visibility, property, TransformExprs};
use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::{ControllerError, LoadError};
use crate::task::CancelToken;

type Delivery = oneshot::Receiver<Result<GlbScene, LoadError>>;

// ── Loading ───────────────────────────────────────────────────────────────

enum Request {
    Unchanged,
    Started,
    Cleared,
}

/// Model-loading state shared by `model.glb` and `light.custom`.
///
/// A new load starts only when the evaluated url differs from the last
/// requested one; the superseded load is cancelled. The url counts as loaded
/// from the moment its load starts.
#[derive(Default)]
struct GlbSlot {
    loaded_url: Option<String>,
    token: CancelToken,
    pending: Option<Delivery>,
}

impl GlbSlot {
    fn request(&mut self, url: String, loader: &Rc<ResourceLoader>) -> Request {
        if self.loaded_url.as_deref() == Some(url.as_str()) {
            return Request::Unchanged;
        }
        self.token.cancel();
        self.token = CancelToken::new();
        self.pending = None;

        if url.is_empty() {
            self.loaded_url = Some(url);
            return Request::Cleared;
        }

        log::debug!("model: loading {url}");
        let (tx, rx) = oneshot::channel();
        let token = self.token.clone();
        let loader = Rc::clone(loader);
        let task_url = url.clone();
        tokio::task::spawn_local(async move {
            let bytes = loader.load(&task_url).await;
            if token.is_cancelled() {
                log::debug!("model: dropping superseded load of {task_url}");
                return;
            }
            let parsed = bytes
                .map_err(LoadError::from)
                .and_then(|bytes| parse_glb(&bytes).map_err(LoadError::from));
            let _ = tx.send(parsed);
        });

        self.loaded_url = Some(url);
        self.pending = Some(rx);
        Request::Started
    }

    /// The parsed scene of a load that finished since the last call.
    fn take_finished(&mut self) -> Option<GlbScene> {
        let result = match self.pending.as_mut()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                self.pending = None;
                return None;
            }
        };
        self.pending = None;
        if self.token.is_cancelled() {
            return None;
        }
        match result {
            Ok(scene) => Some(scene),
            Err(e) => {
                let url = self.loaded_url.as_deref().unwrap_or_default();
                log::warn!("model: {url}: {}", error_chain(&e));
                None
            }
        }
    }

    fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn cancel(&mut self) {
        self.token.cancel();
        self.pending = None;
    }
}

fn dispose_all(nodes: &mut Vec<NodeId>, backend: &mut dyn Backend) {
    for id in nodes.drain(..) {
        backend.dispose(id);
    }
}

// ── model.glb ─────────────────────────────────────────────────────────────

/// `model.glb`: a transform node whose children are the meshes of the
/// loaded GLB.
pub struct ModelController {
    node: NodeId,
    slot: GlbSlot,
    meshes: Vec<NodeId>,
    snapshot: SelfSnapshot,
}

impl ModelController {
    pub fn new(backend: &mut dyn Backend) -> Self {
        Self {
            node: backend.create(Primitive::Group),
            slot: GlbSlot::default(),
            meshes: Vec::new(),
            snapshot: SelfSnapshot::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn meshes(&self) -> &[NodeId] {
        &self.meshes
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }

    pub fn update(&mut self, config: &ModelConfig, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &config.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }
        let exprs = TransformExprs {
            position: &config.position,
            rotation: Some(&config.rotation),
            scale: Some(&config.scale),
        };
        apply_transform(self.node, exprs, &eval, &mut self.snapshot, ctx.backend)?;

        let url: String = property(&eval, "url", &config.url)?;
        if let Request::Cleared = self.slot.request(url, ctx.loader) {
            dispose_all(&mut self.meshes, ctx.backend);
        }
        self.snapshot.loaded_url = self.slot.loaded_url.clone();
        Ok(())
    }

    pub fn poll(&mut self, backend: &mut dyn Backend) {
        let Some(scene) = self.slot.take_finished() else { return };
        dispose_all(&mut self.meshes, backend);
        for placed in scene.meshes {
            let id = backend.create(Primitive::Mesh(placed.mesh));
            backend.set_transform(id, placed.transform);
            backend.attach(self.node, id);
            self.meshes.push(id);
        }
        log::debug!("model: {} mesh(es) attached", self.meshes.len());
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        self.slot.cancel();
        dispose_all(&mut self.meshes, backend);
        backend.dispose(self.node);
    }
}

// ── light.custom ──────────────────────────────────────────────────────────

/// `light.custom`: the punctual lights authored in a GLB, each scaled by
/// the `intensity` multiplier.
pub struct CustomLightController {
    node: NodeId,
    slot: GlbSlot,
    /// Child node and the light as authored.
    lights: Vec<(NodeId, Light)>,
    multiplier: f32,
    snapshot: SelfSnapshot,
}

impl CustomLightController {
    pub fn new(backend: &mut dyn Backend) -> Self {
        Self {
            node: backend.create(Primitive::Group),
            slot: GlbSlot::default(),
            lights: Vec::new(),
            multiplier: 1.0,
            snapshot: SelfSnapshot::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn lights(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.lights.iter().map(|(id, _)| *id)
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }

    fn scaled(&self, light: Light) -> Primitive {
        Primitive::Light(Light { intensity: light.intensity * self.multiplier, ..light })
    }

    pub fn update(
        &mut self,
        config: &CustomLightConfig,
        ctx: &mut UpdateCtx<'_>,
    ) -> Result<(), ControllerError> {
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &config.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }
        let exprs = TransformExprs {
            position: &config.position,
            rotation: Some(&config.rotation),
            scale: Some(&config.scale),
        };
        apply_transform(self.node, exprs, &eval, &mut self.snapshot, ctx.backend)?;

        self.multiplier = property(&eval, "intensity", &config.intensity)?;
        for &(id, light) in &self.lights {
            ctx.backend.update(id, self.scaled(light));
        }

        let url: String = property(&eval, "url", &config.url)?;
        if let Request::Cleared = self.slot.request(url, ctx.loader) {
            self.clear(ctx.backend);
        }
        self.snapshot.loaded_url = self.slot.loaded_url.clone();
        Ok(())
    }

    fn clear(&mut self, backend: &mut dyn Backend) {
        for (id, _) in self.lights.drain(..) {
            backend.dispose(id);
        }
    }

    pub fn poll(&mut self, backend: &mut dyn Backend) {
        let Some(scene) = self.slot.take_finished() else { return };
        self.clear(backend);
        for placed in scene.lights {
            let id = backend.create(self.scaled(placed.light));
            backend.set_transform(id, placed.transform);
            backend.attach(self.node, id);
            self.lights.push((id, placed.light));
        }
        if self.lights.is_empty() {
            log::warn!(
                "custom light: {} has no KHR_lights_punctual lights",
                self.slot.loaded_url.as_deref().unwrap_or_default()
            );
        }
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        self.slot.cancel();
        self.clear(backend);
        backend.dispose(self.node);
    }
}
