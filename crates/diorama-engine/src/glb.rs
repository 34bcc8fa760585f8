//! GLB import: meshes and `KHR_lights_punctual` lights, placed relative to
//! the model root.
//!
//! Only the binary container is supported; buffers must live in the GLB's
//! BIN chunk.

use std::sync::Arc;

use glam::Mat4;
use gltf::khr_lights_punctual::Kind;

use crate::backend::{Light, LightKind, MeshData, Vertex};
use crate::coords::{ColorRgba, Transform};

#[derive(Debug, thiserror::Error)]
pub enum GlbError {
    #[error("not a readable glTF document")]
    Gltf(#[from] gltf::Error),
    #[error("document references buffers but has no BIN chunk")]
    MissingBlob,
}

#[derive(Debug, Clone)]
pub struct PlacedMesh {
    pub mesh: Arc<MeshData>,
    pub transform: Transform,
}

#[derive(Debug, Clone)]
pub struct PlacedLight {
    pub name: Option<String>,
    pub light: Light,
    pub transform: Transform,
}

/// Everything drawable found in the default (or first) scene of a GLB.
#[derive(Debug, Clone, Default)]
pub struct GlbScene {
    pub meshes: Vec<PlacedMesh>,
    pub lights: Vec<PlacedLight>,
}

pub fn parse_glb(bytes: &[u8]) -> Result<GlbScene, GlbError> {
    let document = gltf::Gltf::from_slice(bytes)?;
    let blob = document.blob.as_deref();
    if blob.is_none() && document.buffers().count() > 0 {
        return Err(GlbError::MissingBlob);
    }

    let mut out = GlbScene::default();
    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return Ok(out);
    };
    for node in scene.nodes() {
        visit(&node, Mat4::IDENTITY, blob, &mut out);
    }
    log::debug!(
        "glb: {} mesh(es), {} light(s)",
        out.meshes.len(),
        out.lights.len()
    );
    Ok(out)
}

fn visit(node: &gltf::Node<'_>, parent: Mat4, blob: Option<&[u8]>, out: &mut GlbScene) {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent * local;
    let transform = Transform::from_matrix(world);

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if let Some(data) = read_primitive(&primitive, mesh.name(), blob) {
                out.meshes.push(PlacedMesh { mesh: Arc::new(data), transform });
            }
        }
    }

    if let Some(light) = node.light() {
        out.lights.push(PlacedLight {
            name: light.name().map(str::to_string),
            light: convert_light(&light),
            transform,
        });
    }

    for child in node.children() {
        visit(&child, world, blob, out);
    }
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    name: Option<&str>,
    blob: Option<&[u8]>,
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("glb: skipping non-triangle primitive in {name:?}");
        return None;
    }
    let reader = primitive.reader(|buffer| match buffer.source() {
        gltf::buffer::Source::Bin => blob,
        gltf::buffer::Source::Uri(_) => None,
    });

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }
    let mut normals = reader.read_normals().map(|n| n.collect::<Vec<_>>()).unwrap_or_default();
    normals.resize(positions.len(), [0.0, 1.0, 0.0]);

    let vertices = positions
        .into_iter()
        .zip(normals)
        .map(|(position, normal)| Vertex { position, normal })
        .collect::<Vec<_>>();
    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    Some(MeshData { name: name.map(str::to_string), vertices, indices })
}

fn convert_light(light: &gltf::khr_lights_punctual::Light<'_>) -> Light {
    let distance = light.range().unwrap_or(0.0);
    let kind = match light.kind() {
        Kind::Directional => LightKind::Directional,
        Kind::Point => LightKind::Point { distance, decay: 2.0 },
        Kind::Spot { inner_cone_angle, outer_cone_angle } => LightKind::Spot {
            distance,
            inner_cone: inner_cone_angle,
            outer_cone: outer_cone_angle,
        },
    };
    Light { kind, color: ColorRgba::from_rgb(light.color()), intensity: light.intensity() }
}

// ── Container ─────────────────────────────────────────────────────────────

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Packs a glTF JSON document and its binary buffer into a GLB container.
///
/// Chunks are padded to 4 bytes (spaces for JSON, zeros for BIN).
pub fn pack_glb(json: &str, bin: &[u8]) -> Vec<u8> {
    fn padded(data: &[u8], pad: u8) -> Vec<u8> {
        let mut v = data.to_vec();
        while v.len() % 4 != 0 {
            v.push(pad);
        }
        v
    }
    let json = padded(json.as_bytes(), b' ');
    let bin = padded(bin, 0);
    let has_bin = !bin.is_empty();

    let total = 12 + 8 + json.len() + if has_bin { 8 + bin.len() } else { 0 };
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if has_bin {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

/// GLB documents for tests in this and dependent crates.
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures {
    use super::pack_glb;

    /// One triangle at x = 1 and one orange point light at y = 3.
    pub fn triangle_and_point_light() -> Vec<u8> {
        let json = r#"{
            "asset": { "version": "2.0" },
            "extensionsUsed": ["KHR_lights_punctual"],
            "extensions": { "KHR_lights_punctual": { "lights": [
                { "name": "bulb", "type": "point", "color": [1.0, 0.5, 0.0], "intensity": 40.0, "range": 12.0 }
            ]}},
            "scene": 0,
            "scenes": [{ "nodes": [0, 1] }],
            "nodes": [
                { "mesh": 0, "translation": [1.0, 0.0, 0.0] },
                { "translation": [0.0, 3.0, 0.0], "extensions": { "KHR_lights_punctual": { "light": 0 } } }
            ],
            "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
            "buffers": [{ "byteLength": 42 }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
                { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
            ]
        }"#;
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            bin.extend_from_slice(bytemuck::cast_slice(&p));
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        pack_glb(json, &bin)
    }
}
