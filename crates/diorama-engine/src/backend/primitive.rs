use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::coords::ColorRgba;

// ── Mesh ──────────────────────────────────────────────────────────────────

/// Interleaved vertex layout uploaded by GPU backends.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Triangle-list geometry in model space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bytes a backend has to upload for this mesh.
    pub fn byte_size(&self) -> usize {
        bytemuck::cast_slice::<Vertex, u8>(&self.vertices).len()
            + bytemuck::cast_slice::<u32, u8>(&self.indices).len()
    }
}

// ── Lights ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LightKind {
    /// `distance == 0` means no cutoff.
    Point { distance: f32, decay: f32 },
    Ambient,
    Directional,
    Spot { distance: f32, inner_cone: f32, outer_cone: f32 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: ColorRgba,
    pub intensity: f32,
}

// ── Camera ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    /// World-space point the camera orbits around.
    pub target: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self { fov_y: 50.0, near: 0.1, far: 2000.0, aspect: 1.0, target: Vec3::ZERO }
    }
}

// ── Cards ─────────────────────────────────────────────────────────────────

/// A textured quad showing an embedded UI element.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSurface {
    /// Size in world units (logical pixels scaled by the host).
    pub size: Vec2,
    /// Always faces the camera.
    pub billboard: bool,
    /// Element type being shown; `None` while only a placeholder exists.
    pub element: Option<String>,
}

// ── Primitive ─────────────────────────────────────────────────────────────

/// Everything a backend node can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Transform-only node.
    Group,
    Mesh(Arc<MeshData>),
    Light(Light),
    Camera(PerspectiveCamera),
    Card(CardSurface),
    /// Small debug marker (light helpers).
    Marker { color: ColorRgba, radius: f32 },
}

impl Primitive {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Primitive::Group => "group",
            Primitive::Mesh(_) => "mesh",
            Primitive::Light(_) => "light",
            Primitive::Camera(_) => "camera",
            Primitive::Card(_) => "card",
            Primitive::Marker { .. } => "marker",
        }
    }
}
