use glam::Vec3;

use super::NodeId;
use crate::coords::ColorRgba;

/// Camera used for a frame, resolved to world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    pub node: NodeId,
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
}

/// What a backend drew for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// Visible nodes reached from the root, root included.
    pub visible_nodes: usize,
    pub meshes: usize,
    pub triangles: usize,
    pub lights: usize,
    pub cards: usize,
    pub markers: usize,
    /// Geometry bytes referenced by the drawn meshes.
    pub mesh_bytes: usize,
    pub camera: Option<CameraView>,
    pub background: ColorRgba,
}
