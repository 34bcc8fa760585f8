use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context as _;
use diorama_config::{decode_with, Configuration, DecodeError, DecodeOptions};
use diorama_engine::backend::{Backend, FrameStats, NodeId, Primitive};
use diorama_engine::coords::{ColorRgba, Viewport};
use diorama_engine::logging::error_chain;
use diorama_engine::resource::ResourceLoader;
use diorama_engine::time::{FrameClock, FrameTime, ReconcileCadence};
use diorama_expr::{Color, Evaluator};
use tokio::task::LocalSet;

use crate::card::CardFactory;
use crate::context::UpdateCtx;
use crate::controller::{rgba, CameraController};
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::state::StateSnapshot;

/// Runtime knobs of a [`Visual`].
#[derive(Debug, Clone)]
pub struct VisualConfig {
    /// Reconcile on every n-th frame (plus whenever forced).
    pub reconcile_every: u64,
    pub viewport: Viewport,
    /// Used by the JSON and file entry points.
    pub decode: DecodeOptions,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            reconcile_every: ReconcileCadence::DEFAULT_EVERY,
            viewport: Viewport::default(),
            decode: DecodeOptions::default(),
        }
    }
}

/// What one call to [`Visual::frame`] did.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub time: FrameTime,
    /// Present on frames that reconciled.
    pub reconciled: Option<ReconcileReport>,
    pub scene: Option<String>,
    pub camera: Option<String>,
    /// `None` when nothing was rendered (no scenes, or disposed).
    pub stats: Option<FrameStats>,
}

struct SceneRuntime {
    root: NodeId,
    objects: Reconciler,
}

/// Top-level orchestrator: owns the backend, one object tree per configured
/// scene, and the frame loop.
///
/// Rendering happens on every [`frame`](Self::frame); reconciliation only
/// when the cadence says so or after new configuration or state was pushed.
/// Async work (model loads, card elements) is spawned onto the visual's own
/// `LocalSet`, so `frame` works anywhere. That work advances while
/// [`run`](Self::run) or [`run_tasks_until`](Self::run_tasks_until) is
/// awaited on a tokio runtime.
pub struct Visual<B: Backend> {
    backend: B,
    tasks: LocalSet,
    loader: Rc<ResourceLoader>,
    cards: Option<Rc<dyn CardFactory>>,
    config: Configuration,
    state: StateSnapshot,
    evaluator: Evaluator,
    scenes: BTreeMap<String, SceneRuntime>,
    clock: FrameClock,
    cadence: ReconcileCadence,
    decode: DecodeOptions,
    active_scene: Option<String>,
    active_camera: Option<String>,
    last_fallback: Option<String>,
    disposed: bool,
}

impl<B: Backend> Visual<B> {
    pub fn new(mut backend: B, loader: Rc<ResourceLoader>, config: VisualConfig) -> Self {
        backend.resize(config.viewport);
        let state = StateSnapshot::new();
        Self {
            backend,
            tasks: LocalSet::new(),
            loader,
            cards: None,
            config: Configuration::default(),
            evaluator: Evaluator::new(state.context()),
            state,
            scenes: BTreeMap::new(),
            clock: FrameClock::new(),
            cadence: ReconcileCadence::new(config.reconcile_every),
            decode: config.decode,
            active_scene: None,
            active_camera: None,
            last_fallback: None,
            disposed: false,
        }
    }

    pub fn with_card_factory(mut self, factory: Rc<dyn CardFactory>) -> Self {
        self.cards = Some(factory);
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn loader(&self) -> &Rc<ResourceLoader> {
        &self.loader
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// Objects of a scene, once it has been reconciled.
    pub fn scene_objects(&self, scene: &str) -> Option<&Reconciler> {
        self.scenes.get(scene).map(|s| &s.objects)
    }

    /// Scene rendered by the last frame.
    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    /// Camera used by the last frame.
    pub fn active_camera(&self) -> Option<&str> {
        self.active_camera.as_deref()
    }

    pub fn active_camera_controller(&self) -> Option<&CameraController> {
        let scene = self.scenes.get(self.active_scene.as_deref()?)?;
        scene.objects.find_camera(self.active_camera.as_deref()?)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ── Input ─────────────────────────────────────────────────────────────

    /// Replaces the configuration. Scenes it no longer names are disposed
    /// right away; everything else follows on the next frame.
    pub fn set_configuration(&mut self, config: Configuration) {
        let gone: Vec<String> =
            self.scenes.keys().filter(|name| !config.scenes.contains_key(*name)).cloned().collect();
        for name in gone {
            if let Some(mut scene) = self.scenes.remove(&name) {
                log::debug!("visual: disposing scene {name}");
                scene.objects.dispose_all(&mut self.backend);
                self.backend.dispose(scene.root);
            }
        }
        self.config = config;
        self.cadence.force();
    }

    /// Decodes `json` with the configured policy and applies it.
    pub fn set_configuration_json(&mut self, json: &serde_json::Value) -> Result<(), DecodeError> {
        let config = decode_with(json, &self.decode)?;
        self.set_configuration(config);
        Ok(())
    }

    pub fn set_state(&mut self, state: StateSnapshot) {
        self.evaluator = Evaluator::new(state.context());
        self.state = state;
        self.cadence.force();
    }

    pub fn load_configuration_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config = Configuration::from_json_str(&text, &self.decode)
            .with_context(|| format!("decoding configuration {}", path.display()))?;
        self.set_configuration(config);
        Ok(())
    }

    pub fn load_state_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading state {}", path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing state {}", path.display()))?;
        self.set_state(StateSnapshot::from_json(&json));
        Ok(())
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.backend.resize(Viewport::new(width, height));
        self.cadence.force();
    }

    /// Orbits the camera of the last frame. Returns `false` when there is no
    /// such camera or it is not an orbit camera.
    pub fn orbit_active_camera(&mut self, yaw: f32, pitch: f32) -> bool {
        let (Some(scene), Some(camera)) = (self.active_scene.as_deref(), self.active_camera.as_deref())
        else {
            return false;
        };
        let Some(runtime) = self.scenes.get_mut(scene) else { return false };
        match runtime.objects.find_camera_mut(camera) {
            Some(cam) => cam.orbit(yaw, pitch, &mut self.backend),
            None => false,
        }
    }

    // ── Frame loop ────────────────────────────────────────────────────────

    pub fn frame(&mut self) -> FrameOutcome {
        let time = self.clock.tick();
        if self.disposed {
            return FrameOutcome { time, reconciled: None, scene: None, camera: None, stats: None };
        }

        self.poll();
        let reconciled = self.cadence.should_reconcile(time.frame_index).then(|| self.reconcile_now());

        let scene = self.resolve_scene();
        let camera = scene.as_deref().and_then(|s| self.resolve_camera(s));
        let mut stats = None;
        if let Some(name) = scene.as_deref() {
            if let Some(root) = self.scenes.get(name).map(|s| s.root) {
                let camera_node = camera
                    .as_deref()
                    .and_then(|c| self.scenes.get(name)?.objects.find_camera(c))
                    .map(CameraController::node);
                let background = self.background(name);
                stats = Some(self.backend.render(root, camera_node, background));
            }
        }
        if let Some(stats) = &stats {
            log::trace!(
                "visual: frame {} meshes={} lights={} cards={}",
                stats.frame,
                stats.meshes,
                stats.lights,
                stats.cards
            );
        }

        self.active_scene = scene.clone();
        self.active_camera = camera.clone();
        FrameOutcome { time, reconciled, scene, camera, stats }
    }

    /// Applies finished async work in every scene.
    pub fn poll(&mut self) {
        for scene in self.scenes.values_mut() {
            scene.objects.poll(&mut self.backend);
        }
    }

    /// Reconciles every scene against the current configuration and state.
    pub fn reconcile_now(&mut self) -> ReconcileReport {
        if self.disposed {
            return ReconcileReport::default();
        }
        let _local = self.tasks.enter();
        let mut ctx = UpdateCtx::new(&mut self.backend, &self.evaluator, &self.state, &self.loader)
            .with_cards(self.cards.as_ref());
        for (name, scene) in &self.config.scenes {
            let runtime = self.scenes.entry(name.clone()).or_insert_with(|| {
                log::debug!("visual: creating scene {name}");
                let root = ctx.backend.create(Primitive::Group);
                SceneRuntime { root, objects: Reconciler::new(root, name.clone()) }
            });
            runtime.objects.reconcile(&scene.objects, &mut ctx);
        }
        let report = ctx.report;
        if report.is_clean() {
            log::debug!(
                "visual: reconciled (+{} ~{} -{})",
                report.created,
                report.updated,
                report.disposed
            );
        } else {
            log::info!(
                "visual: reconciled (+{} ~{} -{}), {} failed",
                report.created,
                report.updated,
                report.disposed,
                report.failed.len()
            );
        }
        report
    }

    /// Renders `frames` frames, one per `interval`, handing each outcome to
    /// `on_frame`. Spawned loads make progress while waiting for the next tick.
    pub async fn run(&mut self, frames: u64, interval: Duration, mut on_frame: impl FnMut(&FrameOutcome)) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        for _ in 0..frames {
            self.tasks.run_until(ticker.tick()).await;
            let outcome = self.frame();
            on_frame(&outcome);
        }
    }

    /// Drives spawned loads until `fut` completes.
    pub async fn run_tasks_until<F: Future>(&self, fut: F) -> F::Output {
        self.tasks.run_until(fut).await
    }

    /// Releases every scene. Later frames render nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for (name, mut scene) in std::mem::take(&mut self.scenes) {
            log::debug!("visual: disposing scene {name}");
            scene.objects.dispose_all(&mut self.backend);
            self.backend.dispose(scene.root);
        }
        self.active_scene = None;
        self.active_camera = None;
        self.disposed = true;
    }

    // ── Resolution ────────────────────────────────────────────────────────

    /// Logs a fallback once until a different one happens.
    fn fallback(&mut self, message: String) {
        if self.last_fallback.as_deref() != Some(message.as_str()) {
            log::warn!("visual: {message}");
            self.last_fallback = Some(message);
        }
    }

    fn resolve_scene(&mut self) -> Option<String> {
        let first = self.scenes.keys().next().cloned();
        match self.evaluator.evaluate_as::<String>(self.config.scene.as_str()) {
            Ok(name) if self.scenes.contains_key(&name) => Some(name),
            Ok(name) => {
                if let Some(first) = &first {
                    self.fallback(format!("scene `{name}` not found, showing `{first}`"));
                }
                first
            }
            Err(e) => {
                self.fallback(format!("scene selector failed, showing first scene: {}", error_chain(&e)));
                first
            }
        }
    }

    fn resolve_camera(&mut self, scene: &str) -> Option<String> {
        let selector = self.config.scenes.get(scene)?.camera.clone();
        let objects = &self.scenes.get(scene)?.objects;
        let first = objects.first_camera().map(str::to_string);
        match self.evaluator.evaluate_as::<String>(selector.as_str()) {
            Ok(name) if objects.find_camera(&name).is_some() => Some(name),
            Ok(name) => {
                if let Some(first) = &first {
                    self.fallback(format!("camera `{name}` not found in {scene}, using `{first}`"));
                }
                first
            }
            Err(e) => {
                self.fallback(format!("camera selector failed in {scene}: {}", error_chain(&e)));
                first
            }
        }
    }

    fn background(&mut self, scene: &str) -> ColorRgba {
        let Some(expr) = self.config.scenes.get(scene).map(|s| s.background.clone()) else {
            return ColorRgba::black();
        };
        match self.evaluator.evaluate_as::<Color>(expr.as_str()) {
            Ok(color) => rgba(color),
            Err(e) => {
                self.fallback(format!("background of {scene} failed: {}", error_chain(&e)));
                ColorRgba::black()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapFetcher;
    use diorama_engine::backend::HeadlessBackend;
    use diorama_engine::resource::NoCache;
    use serde_json::json;
    use std::collections::HashMap;

    fn visual(every: u64) -> Visual<HeadlessBackend> {
        let loader = ResourceLoader::new(MapFetcher(HashMap::new()), NoCache);
        let config = VisualConfig { reconcile_every: every, ..VisualConfig::default() };
        Visual::new(HeadlessBackend::new(), loader, config)
    }

    fn two_scenes() -> serde_json::Value {
        json!({
            "scene": "mode == 'night' ? 'night' : 'day'",
            "scenes": {
                "day": { "background": "#ffffff", "objects": {
                    "camera": { "type": "camera.perspective" },
                    "sun": { "type": "light.point", "intensity": "2000" }
                }},
                "night": { "camera": "'moon_cam'", "objects": {
                    "moon_cam": { "type": "camera.perspective", "fov": "30" }
                }}
            }
        })
    }

    // ── cadence ──────────────────────────────────────────────────────────

    #[test]
    fn reconciles_on_cadence_and_when_forced() {
        let mut v = visual(3);
        v.set_configuration_json(&two_scenes()).unwrap();
        let reconciled: Vec<bool> = (0..7).map(|_| v.frame().reconciled.is_some()).collect();
        assert_eq!(reconciled, [true, false, false, true, false, false, true]);

        v.set_state(StateSnapshot::new());
        assert!(v.frame().reconciled.is_some());
    }

    // ── selection ────────────────────────────────────────────────────────

    #[test]
    fn scene_selector_follows_state() {
        let mut v = visual(10);
        v.set_configuration_json(&two_scenes()).unwrap();

        // `mode` is not bound yet: the selector fails and the first scene shows.
        let out = v.frame();
        assert_eq!(out.scene.as_deref(), Some("day"));
        assert_eq!(out.camera.as_deref(), Some("camera"));
        assert_eq!(out.stats.unwrap().background, ColorRgba::white());

        v.set_state(StateSnapshot::from_json(&json!({ "mode": "night" })));
        let out = v.frame();
        assert_eq!(out.scene.as_deref(), Some("night"));
        assert_eq!(out.camera.as_deref(), Some("moon_cam"));
        let stats = out.stats.unwrap();
        assert_eq!(stats.background, ColorRgba::black());
        assert_eq!(stats.camera.unwrap().fov_y, 30.0);
    }

    #[test]
    fn missing_camera_falls_back_to_first() {
        let mut v = visual(10);
        v.set_configuration_json(&json!({ "scenes": { "main": { "camera": "'nope'", "objects": {
            "b_cam": { "type": "camera.perspective" },
            "a_cam": { "type": "camera.perspective" }
        }}}}))
        .unwrap();
        let out = v.frame();
        assert_eq!(out.camera.as_deref(), Some("a_cam"));
        assert!(out.stats.unwrap().camera.is_some());
    }

    // ── lifecycle ────────────────────────────────────────────────────────

    #[test]
    fn dropped_scenes_are_disposed() {
        let mut v = visual(10);
        v.set_configuration_json(&two_scenes()).unwrap();
        v.frame();
        assert!(v.scene_objects("night").is_some());

        v.set_configuration_json(&json!({ "scenes": { "day": { "objects": {} } } })).unwrap();
        assert!(v.scene_objects("night").is_none());
        v.frame();
        // day root only; its objects were removed by the second pass.
        assert_eq!(v.backend().live_count(), 1);
        assert_eq!(v.backend().double_disposals(), 0);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut v = visual(10);
        v.set_configuration_json(&two_scenes()).unwrap();
        v.frame();
        v.dispose();
        assert_eq!(v.backend().live_count(), 0);
        let out = v.frame();
        assert!(out.stats.is_none());
        assert!(out.reconciled.is_none());
    }

    #[test]
    fn resize_reaches_camera_aspect() {
        let mut v = visual(10);
        v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
            "camera": { "type": "camera.perspective" }
        }}}}))
        .unwrap();
        v.frame();
        v.resize(800.0, 800.0);
        v.frame();
        assert_eq!(v.active_camera_controller().unwrap().camera().aspect, 1.0);
    }

    #[test]
    fn orbit_moves_active_camera() {
        let mut v = visual(10);
        v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
            "camera": { "type": "camera.perspective" }
        }}}}))
        .unwrap();
        v.frame();
        let before = v.active_camera_controller().unwrap().position();
        assert!(v.orbit_active_camera(0.3, 0.1));
        let after = v.active_camera_controller().unwrap().position();
        assert_ne!(before, after);
    }

    #[test]
    fn frame_spawns_model_loads_without_a_runtime() {
        let mut v = visual(10);
        v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
            "duck": { "type": "model.glb", "url": "'duck.glb'" }
        }}}}))
        .unwrap();
        let out = v.frame();
        assert!(out.reconciled.unwrap().is_clean());
        assert_eq!(out.stats.unwrap().meshes, 0);
        let duck = v.scene_objects("main").unwrap().get("duck").unwrap();
        assert_eq!(duck.snapshot().loaded_url.as_deref(), Some("duck.glb"));
    }

    #[test]
    fn configuration_file_errors_carry_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut v = visual(10);
        let err = v.load_configuration_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("scene.json"));

        std::fs::write(&path, two_scenes().to_string()).unwrap();
        v.load_configuration_file(&path).unwrap();
        assert_eq!(v.configuration().scenes.len(), 2);
    }
}
