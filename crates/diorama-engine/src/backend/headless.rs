use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use super::{Backend, CameraView, FrameStats, NodeId, Primitive};
use crate::coords::{ColorRgba, Transform, Viewport};

#[derive(Debug)]
struct Node {
    primitive: Primitive,
    transform: Transform,
    visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    updates: u32,
}

/// Disposed ids remembered for double-dispose detection.
const RETIRED_KEEP: usize = 1024;

/// In-memory backend: keeps the node tree, draws nothing.
///
/// Disposing a node removes it from the arena; the slotmap's versioned keys
/// make the stale id resolve to nothing. Operations on a disposed node are
/// logged and ignored. The last [`RETIRED_KEEP`] disposed ids are kept with
/// their dispose counts so repeated disposal shows up in
/// [`double_disposals`](Self::double_disposals).
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    nodes: SlotMap<NodeId, Node>,
    retired: HashMap<NodeId, u32>,
    retired_order: VecDeque<NodeId>,
    double_disposals: usize,
    viewport: Viewport,
    frames: u64,
    last_frame: Option<FrameStats>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, node: NodeId, op: &str) -> bool {
        if self.nodes.contains_key(node) {
            return true;
        }
        log::warn!("headless: {op} on disposed node {node:?}");
        false
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
    }

    fn retire(&mut self, node: NodeId) {
        if self.retired_order.len() == RETIRED_KEEP {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
        self.retired_order.push_back(node);
        self.retired.insert(node, 1);
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn primitive(&self, node: NodeId) -> Option<&Primitive> {
        self.nodes.get(node).map(|n| &n.primitive)
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.visible)
    }

    /// Ids only come from `create`, so a missing node has been disposed.
    pub fn is_disposed(&self, node: NodeId) -> bool {
        !self.nodes.contains_key(node)
    }

    /// How many times `dispose` was called on `node`; anything above 1 is a bug
    /// in the caller. Ids retired long ago report 1.
    pub fn dispose_count(&self, node: NodeId) -> u32 {
        if self.nodes.contains_key(node) {
            0
        } else {
            self.retired.get(&node).copied().unwrap_or(1)
        }
    }

    /// Nodes that were disposed more than once.
    pub fn double_disposals(&self) -> usize {
        self.double_disposals
    }

    /// Disposed ids still remembered; bounded by [`RETIRED_KEEP`].
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Number of `update` calls the node received after creation.
    pub fn update_count(&self, node: NodeId) -> u32 {
        self.nodes.get(node).map_or(0, |n| n.updates)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map_or(&[][..], |n| n.children.as_slice())
    }

    /// Nodes created and not yet disposed.
    pub fn live_count(&self) -> usize {
        self.nodes.len()
    }

    /// Live nodes whose primitive is of the given kind (see [`Primitive::kind_name`]).
    pub fn live_of_kind(&self, kind: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.primitive.kind_name() == kind)
            .map(|(id, _)| id)
            .collect()
    }

    /// Composed transform from the top of the node's tree.
    pub fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        let mut m = self.nodes.get(node)?.transform.matrix();
        let mut cursor = self.nodes.get(node)?.parent;
        while let Some(id) = cursor {
            let n = self.nodes.get(id)?;
            m = n.transform.matrix() * m;
            cursor = n.parent;
        }
        Some(m)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    // ── Frame walk ────────────────────────────────────────────────────────

    fn walk(&self, node: NodeId, parent_world: Mat4, stats: &mut FrameStats) {
        let Some(n) = self.nodes.get(node) else { return };
        if !n.visible {
            return;
        }
        let world = parent_world * n.transform.matrix();
        stats.visible_nodes += 1;
        match &n.primitive {
            Primitive::Mesh(mesh) => {
                stats.meshes += 1;
                stats.triangles += mesh.triangle_count();
                stats.mesh_bytes += mesh.byte_size();
            }
            Primitive::Light(_) => stats.lights += 1,
            Primitive::Card(_) => stats.cards += 1,
            Primitive::Marker { .. } => stats.markers += 1,
            Primitive::Group | Primitive::Camera(_) => {}
        }
        for &child in &n.children {
            self.walk(child, world, stats);
        }
    }

    fn camera_view(&self, camera: NodeId) -> Option<CameraView> {
        let Primitive::Camera(cam) = self.nodes.get(camera)?.primitive else {
            return None;
        };
        let world = self.world_matrix(camera)?;
        Some(CameraView {
            node: camera,
            position: world.transform_point3(Vec3::ZERO),
            target: cam.target,
            fov_y: cam.fov_y,
            aspect: cam.aspect,
        })
    }
}

impl Backend for HeadlessBackend {
    fn create(&mut self, primitive: Primitive) -> NodeId {
        let id = self.nodes.insert(Node {
            primitive,
            transform: Transform::IDENTITY,
            visible: true,
            parent: None,
            children: Vec::new(),
            updates: 0,
        });
        log::trace!("headless: create {id:?}");
        id
    }

    fn update(&mut self, node: NodeId, primitive: Primitive) {
        if !self.live(node, "update") {
            return;
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.primitive = primitive;
            n.updates += 1;
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if !self.live(parent, "attach (parent)") || !self.live(child, "attach (child)") {
            return;
        }
        self.unlink(child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        if self.live(child, "detach") {
            self.unlink(child);
        }
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) {
        if !self.live(node, "set_transform") {
            return;
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.transform = transform;
        }
    }

    fn transform(&self, node: NodeId) -> Option<Transform> {
        self.nodes.get(node).map(|n| n.transform)
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if !self.live(node, "set_visible") {
            return;
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.visible = visible;
        }
    }

    fn dispose(&mut self, node: NodeId) {
        if !self.live(node, "dispose") {
            let count = self.retired.entry(node).or_insert(1);
            *count += 1;
            if *count == 2 {
                self.double_disposals += 1;
            }
            return;
        }
        self.unlink(node);
        let Some(removed) = self.nodes.remove(node) else { return };
        for child in removed.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parent = None;
            }
        }
        self.retire(node);
        log::trace!("headless: dispose {node:?}");
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn render(&mut self, root: NodeId, camera: Option<NodeId>, background: ColorRgba) -> FrameStats {
        let mut stats = FrameStats { frame: self.frames, background, ..FrameStats::default() };
        self.walk(root, Mat4::IDENTITY, &mut stats);
        stats.camera = camera.and_then(|c| self.camera_view(c));
        self.frames += 1;
        self.last_frame = Some(stats.clone());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Light, LightKind, MeshData, PerspectiveCamera, Vertex};
    use std::sync::Arc;

    fn point_light() -> Primitive {
        Primitive::Light(Light {
            kind: LightKind::Point { distance: 0.0, decay: 2.0 },
            color: ColorRgba::white(),
            intensity: 1.0,
        })
    }

    fn triangle() -> Primitive {
        let v = |x| Vertex { position: [x, 0.0, 0.0], normal: [0.0, 1.0, 0.0] };
        Primitive::Mesh(Arc::new(MeshData {
            name: None,
            vertices: vec![v(0.0), v(1.0), v(2.0)],
            indices: vec![0, 1, 2],
        }))
    }

    // ── tree ─────────────────────────────────────────────────────────────

    #[test]
    fn attach_moves_between_parents() {
        let mut b = HeadlessBackend::new();
        let a = b.create(Primitive::Group);
        let c = b.create(Primitive::Group);
        let child = b.create(point_light());
        b.attach(a, child);
        b.attach(c, child);
        assert!(b.children(a).is_empty());
        assert_eq!(b.children(c), &[child]);
        assert_eq!(b.parent(child), Some(c));
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut b = HeadlessBackend::new();
        let root = b.create(Primitive::Group);
        let child = b.create(Primitive::Group);
        b.attach(root, child);
        b.set_transform(root, Transform::from_translation(Vec3::X));
        b.set_transform(child, Transform::from_translation(Vec3::Y));
        let p = b.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    // ── disposal ─────────────────────────────────────────────────────────

    #[test]
    fn dispose_detaches_and_counts() {
        let mut b = HeadlessBackend::new();
        let root = b.create(Primitive::Group);
        let light = b.create(point_light());
        b.attach(root, light);
        b.dispose(light);
        assert!(b.is_disposed(light));
        assert!(b.children(root).is_empty());
        assert_eq!(b.dispose_count(light), 1);
        assert_eq!(b.live_count(), 1);
    }

    #[test]
    fn double_dispose_is_recorded() {
        let mut b = HeadlessBackend::new();
        let n = b.create(Primitive::Group);
        b.dispose(n);
        b.dispose(n);
        assert_eq!(b.dispose_count(n), 2);
        assert_eq!(b.double_disposals(), 1);
    }

    #[test]
    fn disposed_nodes_ignore_updates() {
        let mut b = HeadlessBackend::new();
        let n = b.create(point_light());
        b.dispose(n);
        b.update(n, Primitive::Group);
        assert_eq!(b.update_count(n), 0);
        assert!(b.primitive(n).is_none());
    }

    #[test]
    fn disposed_nodes_leave_the_arena() {
        let mut b = HeadlessBackend::new();
        let mut last = None;
        for _ in 0..5000 {
            let n = b.create(point_light());
            b.dispose(n);
            last = Some(n);
        }
        let last = last.unwrap();
        assert_eq!(b.live_count(), 0);
        assert!(b.primitive(last).is_none());
        assert!(b.is_disposed(last));
        assert_eq!(b.retired_count(), RETIRED_KEEP);
        assert_eq!(b.double_disposals(), 0);
    }

    #[test]
    fn disposing_a_parent_orphans_children() {
        let mut b = HeadlessBackend::new();
        let group = b.create(Primitive::Group);
        let light = b.create(point_light());
        b.attach(group, light);
        b.dispose(group);
        assert_eq!(b.parent(light), None);
        assert!(!b.is_disposed(light));
    }

    // ── render ───────────────────────────────────────────────────────────

    #[test]
    fn render_skips_hidden_subtrees() {
        let mut b = HeadlessBackend::new();
        let root = b.create(Primitive::Group);
        let shown = b.create(triangle());
        let hidden = b.create(Primitive::Group);
        let under_hidden = b.create(point_light());
        b.attach(root, shown);
        b.attach(root, hidden);
        b.attach(hidden, under_hidden);
        b.set_visible(hidden, false);

        let stats = b.render(root, None, ColorRgba::black());
        assert_eq!(stats.visible_nodes, 2);
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.triangles, 1);
        assert_eq!(stats.lights, 0);
        assert_eq!(stats.mesh_bytes, 3 * 24 + 3 * 4);
    }

    #[test]
    fn render_resolves_camera_position() {
        let mut b = HeadlessBackend::new();
        let root = b.create(Primitive::Group);
        let cam = b.create(Primitive::Camera(PerspectiveCamera::default()));
        b.attach(root, cam);
        b.set_transform(cam, Transform::from_translation(Vec3::new(0.0, 0.0, 10.0)));
        let stats = b.render(root, Some(cam), ColorRgba::black());
        let view = stats.camera.unwrap();
        assert!(view.position.abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-6));
        assert_eq!(b.frames_rendered(), 1);
    }
}
