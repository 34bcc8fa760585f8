//! Object controllers: one per configured object, each owning one backend
//! node.
//!
//! | Tag                  | Controller                    |
//! |----------------------|-------------------------------|
//! | `camera.perspective` | [`CameraController`]          |
//! | `light.point`        | [`PointLightController`]      |
//! | `light.ambient`      | [`AmbientLightController`]    |
//! | `light.custom`       | [`CustomLightController`]     |
//! | `model.glb`          | [`ModelController`]           |
//! | `card.2d`, `card.3d` | [`CardController`]            |
//! | `group`              | [`GroupController`]           |
//!
//! Every update resolves `visible` first. A hidden object keeps everything
//! else from its previous pass.

mod camera;
mod card;
mod group;
mod light;
mod model;

pub use camera::CameraController;
pub use card::CardController;
pub use group::GroupController;
pub use light::{AmbientLightController, PointLightController};
pub use model::{CustomLightController, ModelController};

use diorama_config::{Expression, ObjectConfiguration};
use diorama_engine::backend::{Backend, NodeId};
use diorama_engine::coords::{ColorRgba, Transform};
use diorama_expr::{Color, Euler, Evaluator, FromValue, Vector3};
use glam::Vec3;

use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::ControllerError;

pub enum ObjectController {
    Camera(CameraController),
    PointLight(PointLightController),
    AmbientLight(AmbientLightController),
    CustomLight(CustomLightController),
    Model(ModelController),
    Card(CardController),
    Group(GroupController),
}

impl ObjectController {
    /// Builds the controller for `config` and its backend node. The node is
    /// not attached anywhere yet.
    pub fn create(path: &str, config: &ObjectConfiguration, ctx: &mut UpdateCtx<'_>) -> Self {
        match config {
            ObjectConfiguration::PerspectiveCamera(_) => {
                Self::Camera(CameraController::new(ctx.backend))
            }
            ObjectConfiguration::PointLight(_) => {
                Self::PointLight(PointLightController::new(ctx.backend))
            }
            ObjectConfiguration::AmbientLight(_) => {
                Self::AmbientLight(AmbientLightController::new(ctx.backend))
            }
            ObjectConfiguration::CustomLight(_) => {
                Self::CustomLight(CustomLightController::new(ctx.backend))
            }
            ObjectConfiguration::Model(_) => Self::Model(ModelController::new(ctx.backend)),
            ObjectConfiguration::Card2d(c) => {
                Self::Card(CardController::new(path, &c.element, true, ctx))
            }
            ObjectConfiguration::Card3d(c) => {
                Self::Card(CardController::new(path, &c.element, false, ctx))
            }
            ObjectConfiguration::Group(_) => Self::Group(GroupController::new(path, ctx.backend)),
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            Self::Camera(c) => c.node(),
            Self::PointLight(c) => c.node(),
            Self::AmbientLight(c) => c.node(),
            Self::CustomLight(c) => c.node(),
            Self::Model(c) => c.node(),
            Self::Card(c) => c.node(),
            Self::Group(c) => c.node(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Camera(_) => "camera",
            Self::PointLight(_) => "point light",
            Self::AmbientLight(_) => "ambient light",
            Self::CustomLight(_) => "custom light",
            Self::Model(_) => "model",
            Self::Card(_) => "card",
            Self::Group(_) => "group",
        }
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        match self {
            Self::Camera(c) => c.snapshot(),
            Self::PointLight(c) => c.snapshot(),
            Self::AmbientLight(c) => c.snapshot(),
            Self::CustomLight(c) => c.snapshot(),
            Self::Model(c) => c.snapshot(),
            Self::Card(c) => c.snapshot(),
            Self::Group(c) => c.snapshot(),
        }
    }

    /// Re-evaluates every property against `config`.
    ///
    /// The reconciler only pairs a controller with a configuration of the
    /// same identity; any other pair is an error and changes nothing.
    pub fn update(
        &mut self,
        config: &ObjectConfiguration,
        ctx: &mut UpdateCtx<'_>,
    ) -> Result<(), ControllerError> {
        match (self, config) {
            (Self::Camera(c), ObjectConfiguration::PerspectiveCamera(cfg)) => c.update(cfg, ctx),
            (Self::PointLight(c), ObjectConfiguration::PointLight(cfg)) => c.update(cfg, ctx),
            (Self::AmbientLight(c), ObjectConfiguration::AmbientLight(cfg)) => c.update(cfg, ctx),
            (Self::CustomLight(c), ObjectConfiguration::CustomLight(cfg)) => c.update(cfg, ctx),
            (Self::Model(c), ObjectConfiguration::Model(cfg)) => c.update(cfg, ctx),
            (Self::Card(c), ObjectConfiguration::Card2d(cfg)) => c.update_2d(cfg, ctx),
            (Self::Card(c), ObjectConfiguration::Card3d(cfg)) => c.update_3d(cfg, ctx),
            (Self::Group(c), ObjectConfiguration::Group(cfg)) => c.update(cfg, ctx),
            (controller, config) => {
                Err(ControllerError::Mismatch { controller: controller.kind(), tag: config.tag() })
            }
        }
    }

    /// Applies finished async work (loaded models, created card elements).
    pub fn poll(&mut self, backend: &mut dyn Backend) {
        match self {
            Self::CustomLight(c) => c.poll(backend),
            Self::Model(c) => c.poll(backend),
            Self::Card(c) => c.poll(backend),
            Self::Group(c) => c.poll(backend),
            Self::Camera(_) | Self::PointLight(_) | Self::AmbientLight(_) => {}
        }
    }

    /// Cancels pending work and releases every node the controller owns.
    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        match self {
            Self::Camera(c) => c.dispose(backend),
            Self::PointLight(c) => c.dispose(backend),
            Self::AmbientLight(c) => c.dispose(backend),
            Self::CustomLight(c) => c.dispose(backend),
            Self::Model(c) => c.dispose(backend),
            Self::Card(c) => c.dispose(backend),
            Self::Group(c) => c.dispose(backend),
        }
    }

    pub fn as_camera(&self) -> Option<&CameraController> {
        match self {
            Self::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut CameraController> {
        match self {
            Self::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupController> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }
}

// ── Property helpers ──────────────────────────────────────────────────────

pub(crate) fn property<T: FromValue>(
    eval: &Evaluator,
    property: &'static str,
    expr: &Expression,
) -> Result<T, ControllerError> {
    eval.evaluate_as(expr.as_str()).map_err(|source| ControllerError::Property { property, source })
}

/// Resolves `visible` and applies it. Returns whether the object is shown.
pub(crate) fn apply_visibility(
    node: NodeId,
    expr: &Expression,
    eval: &Evaluator,
    snapshot: &mut SelfSnapshot,
    backend: &mut dyn Backend,
) -> Result<bool, ControllerError> {
    let visible: bool = property(eval, "visible", expr)?;
    if snapshot.visible != Some(visible) {
        backend.set_visible(node, visible);
        snapshot.visible = Some(visible);
    }
    Ok(visible)
}

/// The three transform expressions of an object; `None` keeps the identity
/// component.
pub(crate) struct TransformExprs<'c> {
    pub position: &'c Expression,
    pub rotation: Option<&'c Expression>,
    pub scale: Option<&'c Expression>,
}

/// Resolves position, rotation and scale and applies them together; on a
/// failure nothing is applied.
pub(crate) fn apply_transform(
    node: NodeId,
    exprs: TransformExprs<'_>,
    eval: &Evaluator,
    snapshot: &mut SelfSnapshot,
    backend: &mut dyn Backend,
) -> Result<(), ControllerError> {
    let position: Vector3 = property(eval, "position", exprs.position)?;
    let rotation: Option<Euler> =
        exprs.rotation.map(|e| property(eval, "rotation", e)).transpose()?;
    let scale: Option<Vector3> = exprs.scale.map(|e| property(eval, "scale", e)).transpose()?;

    let euler = rotation.map_or(Vec3::ZERO, |r| Vec3::new(r.x as f32, r.y as f32, r.z as f32));
    let transform =
        Transform::from_euler_xyz(vec3(position), euler, scale.map_or(Vec3::ONE, vec3));
    backend.set_transform(node, transform);

    snapshot.position = Some(position);
    snapshot.rotation = rotation;
    snapshot.scale = scale;
    Ok(())
}

pub(crate) fn vec3(v: Vector3) -> Vec3 {
    Vec3::new(v.x as f32, v.y as f32, v.z as f32)
}

pub(crate) fn rgba(c: Color) -> ColorRgba {
    ColorRgba::new(c.r as f32, c.g as f32, c.b as f32, c.a as f32)
}
