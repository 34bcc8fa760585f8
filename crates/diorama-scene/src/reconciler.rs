use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use diorama_config::{Identity, ObjectConfiguration};
use diorama_engine::backend::{Backend, NodeId};
use diorama_engine::logging::error_chain;

use crate::context::UpdateCtx;
use crate::controller::{CameraController, ObjectController};
use crate::error::ReconcileError;

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub disposed: usize,
    /// Paths of objects whose update failed.
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Live {
    identity: Identity,
    controller: ObjectController,
}

/// Keeps one collection of named objects (a scene, or a group's children)
/// in step with its configuration.
///
/// A pass first disposes every live object whose name vanished or whose
/// identity changed, then walks the configuration in name order, creating
/// what is missing and updating everything. One object failing is logged
/// and does not stop its siblings.
pub struct Reconciler {
    parent: NodeId,
    path: String,
    live: BTreeMap<String, Live>,
}

impl Reconciler {
    /// `parent` receives the object nodes; `path` prefixes object paths in
    /// logs and reports.
    pub fn new(parent: NodeId, path: impl Into<String>) -> Self {
        Self { parent, path: path.into(), live: BTreeMap::new() }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.live.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&ObjectController> {
        self.live.get(name).map(|l| &l.controller)
    }

    fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() { name.to_string() } else { format!("{}.{name}", self.path) }
    }

    pub fn reconcile(
        &mut self,
        objects: &BTreeMap<String, ObjectConfiguration>,
        ctx: &mut UpdateCtx<'_>,
    ) {
        // ── removals ──
        let stale: Vec<String> = self
            .live
            .iter()
            .filter(|(name, live)| objects.get(*name).is_none_or(|c| c.identity() != live.identity))
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            let path = self.child_path(&name);
            if let Some(mut live) = self.live.remove(&name) {
                log::debug!("reconcile: disposing {path} ({})", live.identity);
                ctx.backend.detach(live.controller.node());
                live.controller.dispose(ctx.backend);
                ctx.report.disposed += 1;
            }
        }

        // ── creations and updates ──
        for (name, config) in objects {
            let path = self.child_path(name);
            let live = match self.live.entry(name.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let identity = config.identity();
                    log::debug!("reconcile: creating {path} ({identity})");
                    let controller = ObjectController::create(&path, config, ctx);
                    ctx.backend.attach(self.parent, controller.node());
                    ctx.report.created += 1;
                    e.insert(Live { identity, controller })
                }
            };
            match live.controller.update(config, ctx) {
                Ok(()) => ctx.report.updated += 1,
                Err(source) => {
                    let err = ReconcileError { path, source };
                    log::warn!("reconcile: {}", error_chain(&err));
                    ctx.report.failed.push(err.path);
                }
            }
        }
    }

    /// Applies finished async work throughout the tree.
    pub fn poll(&mut self, backend: &mut dyn Backend) {
        for live in self.live.values_mut() {
            live.controller.poll(backend);
        }
    }

    /// Disposes every object in the tree.
    pub fn dispose_all(&mut self, backend: &mut dyn Backend) {
        for (name, mut live) in std::mem::take(&mut self.live) {
            log::debug!("reconcile: disposing {}", self.child_path(&name));
            backend.detach(live.controller.node());
            live.controller.dispose(backend);
        }
    }

    // ── cameras ──

    /// The camera called `name`, searched depth-first through groups.
    pub fn find_camera(&self, name: &str) -> Option<&CameraController> {
        if let Some(camera) = self.live.get(name).and_then(|l| l.controller.as_camera()) {
            return Some(camera);
        }
        self.live
            .values()
            .filter_map(|l| l.controller.as_group())
            .find_map(|g| g.children().find_camera(name))
    }

    pub fn find_camera_mut(&mut self, name: &str) -> Option<&mut CameraController> {
        if self.live.get(name).is_some_and(|l| l.controller.as_camera().is_some()) {
            return self.live.get_mut(name).and_then(|l| l.controller.as_camera_mut());
        }
        self.live.values_mut().find_map(|l| match &mut l.controller {
            ObjectController::Group(g) => g.children_mut().find_camera_mut(name),
            _ => None,
        })
    }

    /// Name of the first camera in name order, this level before groups.
    pub fn first_camera(&self) -> Option<&str> {
        self.live
            .iter()
            .find(|(_, l)| l.controller.as_camera().is_some())
            .map(|(name, _)| name.as_str())
            .or_else(|| {
                self.live
                    .values()
                    .filter_map(|l| l.controller.as_group())
                    .find_map(|g| g.children().first_camera())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::testing::Harness;
    use diorama_config::{
        decode, Expression, GroupConfig, ObjectTag, PointLightConfig,
    };
    use diorama_engine::backend::{Primitive, LightKind};
    use serde_json::json;

    fn objects(json: serde_json::Value) -> BTreeMap<String, ObjectConfiguration> {
        let config = decode(&json!({ "scenes": { "main": { "objects": json } } }));
        config.scenes["main"].objects.clone()
    }

    fn setup() -> (Harness, Reconciler) {
        let mut h = Harness::new();
        let root = h.backend.create(Primitive::Group);
        (h, Reconciler::new(root, "main"))
    }

    fn pass(h: &mut Harness, r: &mut Reconciler, objs: &BTreeMap<String, ObjectConfiguration>) -> ReconcileReport {
        h.with_ctx(|ctx| {
            r.reconcile(objs, ctx);
            std::mem::take(&mut ctx.report)
        })
    }

    fn light_intensity(h: &Harness, r: &Reconciler, name: &str) -> f32 {
        match h.backend.primitive(r.get(name).unwrap().node()) {
            Some(Primitive::Light(l)) => l.intensity,
            other => panic!("{name} is not a light: {other:?}"),
        }
    }

    // ── identity ─────────────────────────────────────────────────────────

    #[test]
    fn unchanged_configuration_keeps_nodes() {
        let (mut h, mut r) = setup();
        let objs = objects(json!({
            "sun": { "type": "light.point", "intensity": "2000" },
            "cam": { "type": "camera.perspective" }
        }));
        let first = pass(&mut h, &mut r, &objs);
        assert_eq!(first.created, 2);
        let nodes: Vec<_> = r.names().map(|n| r.get(n).unwrap().node()).collect();

        let second = pass(&mut h, &mut r, &objs);
        assert_eq!((second.created, second.disposed, second.updated), (0, 0, 2));
        let again: Vec<_> = r.names().map(|n| r.get(n).unwrap().node()).collect();
        assert_eq!(nodes, again);
        assert_eq!(h.backend.double_disposals(), 0);
    }

    #[test]
    fn tag_change_replaces_object_once() {
        let (mut h, mut r) = setup();
        pass(&mut h, &mut r, &objects(json!({ "x": { "type": "light.point" } })));
        let old = r.get("x").unwrap().node();

        let report = pass(&mut h, &mut r, &objects(json!({ "x": { "type": "light.ambient" } })));
        assert_eq!((report.disposed, report.created), (1, 1));
        assert_eq!(h.backend.dispose_count(old), 1);
        assert!(matches!(
            h.backend.primitive(r.get("x").unwrap().node()),
            Some(Primitive::Light(l)) if l.kind == LightKind::Ambient
        ));
    }

    #[test]
    fn card_element_change_replaces_card() {
        let (mut h, mut r) = setup();
        pass(&mut h, &mut r, &objects(json!({ "c": { "type": "card.2d", "element": "'markdown'" } })));
        let old = r.get("c").unwrap().node();
        pass(&mut h, &mut r, &objects(json!({ "c": { "type": "card.2d", "element": "'gauge'" } })));
        assert!(h.backend.is_disposed(old));
        assert_ne!(r.get("c").unwrap().node(), old);
    }

    #[test]
    fn removed_names_are_disposed() {
        let (mut h, mut r) = setup();
        pass(&mut h, &mut r, &objects(json!({ "a": { "type": "light.ambient" }, "b": { "type": "light.ambient" } })));
        let b = r.get("b").unwrap().node();
        let report = pass(&mut h, &mut r, &objects(json!({ "a": { "type": "light.ambient" } })));
        assert_eq!(report.disposed, 1);
        assert!(h.backend.is_disposed(b));
        assert_eq!(r.len(), 1);
        assert_eq!(h.backend.children(r.parent()).len(), 1);
    }

    // ── fault isolation ──────────────────────────────────────────────────

    #[test]
    fn failing_sibling_does_not_stop_others() {
        let (mut h, mut r) = setup();
        let objs = objects(json!({
            "a": { "type": "light.point", "intensity": "3" },
            "b": { "type": "light.point", "intensity": "missing.value * 2" },
            "c": { "type": "light.point", "intensity": "7" }
        }));
        let report = pass(&mut h, &mut r, &objs);
        assert_eq!(report.failed, vec!["main.b".to_string()]);
        assert_eq!(report.updated, 2);
        assert_eq!(light_intensity(&h, &r, "a"), 3.0);
        assert_eq!(light_intensity(&h, &r, "c"), 7.0);
    }

    #[test]
    fn controller_rejects_configuration_of_another_kind() {
        let mut h = Harness::new();
        let light = ObjectConfiguration::with_defaults(ObjectTag::LightPoint);
        let camera = ObjectConfiguration::with_defaults(ObjectTag::CameraPerspective);
        let mut controller = h.with_ctx(|ctx| ObjectController::create("main.x", &light, ctx));
        let err = h.with_ctx(|ctx| controller.update(&camera, ctx)).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Mismatch { controller: "point light", tag: ObjectTag::CameraPerspective }
        ));
        assert_eq!(h.backend.update_count(controller.node()), 0);
    }

    // ── groups ───────────────────────────────────────────────────────────

    #[test]
    fn group_children_hang_under_group_node() {
        let (mut h, mut r) = setup();
        let report = pass(
            &mut h,
            &mut r,
            &objects(json!({
                "room": { "type": "group", "position": "new Vector3(1, 0, 0)", "children": {
                    "lamp": { "type": "light.point" },
                    "eye": { "type": "camera.perspective" }
                }}
            })),
        );
        assert_eq!(report.created, 3);
        let room = r.get("room").unwrap().as_group().unwrap();
        let lamp = room.children().get("lamp").unwrap().node();
        assert_eq!(h.backend.parent(lamp), Some(room.node()));
        assert!(r.find_camera("eye").is_some());
        assert_eq!(r.first_camera(), Some("eye"));
    }

    #[test]
    fn nested_failures_report_full_path() {
        let (mut h, mut r) = setup();
        let mut group = GroupConfig::default();
        let mut lamp = PointLightConfig::default();
        lamp.color = Expression::new("nope");
        group.children.insert("lamp".into(), ObjectConfiguration::PointLight(lamp));
        let mut objs = BTreeMap::new();
        objs.insert("room".to_string(), ObjectConfiguration::Group(group));

        let report = pass(&mut h, &mut r, &objs);
        assert_eq!(report.failed, vec!["main.room.lamp".to_string()]);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn removing_group_disposes_descendants() {
        let (mut h, mut r) = setup();
        pass(
            &mut h,
            &mut r,
            &objects(json!({ "room": { "type": "group", "children": {
                "lamp": { "type": "light.point", "helper": "true" }
            }}})),
        );
        assert_eq!(h.backend.live_count(), 4);
        pass(&mut h, &mut r, &BTreeMap::new());
        assert_eq!(h.backend.live_count(), 1);
        assert_eq!(h.backend.double_disposals(), 0);
    }

    #[test]
    fn creation_follows_name_order() {
        let (mut h, mut r) = setup();
        let mut objs = BTreeMap::new();
        for name in ["c", "a", "b"] {
            objs.insert(name.to_string(), ObjectConfiguration::with_defaults(ObjectTag::LightAmbient));
        }
        pass(&mut h, &mut r, &objs);
        assert_eq!(r.names().collect::<Vec<_>>(), ["a", "b", "c"]);
        let kids = h.backend.children(r.parent()).to_vec();
        let expected: Vec<_> = ["a", "b", "c"].iter().map(|n| r.get(n).unwrap().node()).collect();
        assert_eq!(kids, expected);
    }
}
