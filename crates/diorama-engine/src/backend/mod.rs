//! Drawing-backend port.
//!
//! The scene layer drives a backend through [`Backend`]: it creates nodes from
//! [`Primitive`]s, arranges them in a tree, updates transforms and visibility,
//! and asks for a frame. How pixels are produced is the backend's business.
//!
//! [`HeadlessBackend`] records the graph in memory and is what the studio and
//! the tests run against.

mod headless;
mod primitive;
mod stats;

pub use headless::HeadlessBackend;
pub use primitive::{
    CardSurface, Light, LightKind, MeshData, PerspectiveCamera, Primitive, Vertex,
};
pub use stats::{CameraView, FrameStats};

use crate::coords::{ColorRgba, Transform, Viewport};

slotmap::new_key_type! {
    /// Handle to a backend node. Stale after [`Backend::dispose`].
    pub struct NodeId;
}

pub trait Backend {
    /// Creates a detached node.
    fn create(&mut self, primitive: Primitive) -> NodeId;

    /// Replaces what a node draws, keeping its transform and place in the tree.
    fn update(&mut self, node: NodeId, primitive: Primitive);

    /// Moves `child` under `parent`, detaching it from any previous parent.
    fn attach(&mut self, parent: NodeId, child: NodeId);

    fn detach(&mut self, child: NodeId);

    fn set_transform(&mut self, node: NodeId, transform: Transform);

    fn transform(&self, node: NodeId) -> Option<Transform>;

    fn set_visible(&mut self, node: NodeId, visible: bool);

    /// Releases the node's resources. The id must not be used afterwards.
    fn dispose(&mut self, node: NodeId);

    fn resize(&mut self, viewport: Viewport);

    fn viewport(&self) -> Viewport;

    /// Draws the tree under `root` as seen from `camera`.
    fn render(&mut self, root: NodeId, camera: Option<NodeId>, background: ColorRgba) -> FrameStats;
}
