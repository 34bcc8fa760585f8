use std::f32::consts::FRAC_PI_2;

use diorama_config::PerspectiveCameraConfig;
use diorama_engine::backend::{Backend, NodeId, PerspectiveCamera, Primitive};
use diorama_engine::coords::Transform;
use diorama_expr::Vector3;
use glam::Vec3;

use super::{apply_visibility, property, vec3};
use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::ControllerError;

/// Keeps orbiting cameras off the poles, where the up vector degenerates.
const MAX_ELEVATION: f32 = FRAC_PI_2 - 0.01;

/// `camera.perspective`.
///
/// Lens properties (`fov`, `near`, `far`) follow the configuration on every
/// pass. An orbit camera takes `position` and `target` from the
/// configuration once; after that only [`orbit`](Self::orbit) moves it.
pub struct CameraController {
    node: NodeId,
    camera: PerspectiveCamera,
    position: Vec3,
    orbit: bool,
    placed: bool,
    snapshot: SelfSnapshot,
}

impl CameraController {
    pub fn new(backend: &mut dyn Backend) -> Self {
        let camera = PerspectiveCamera::default();
        Self {
            node: backend.create(Primitive::Camera(camera)),
            camera,
            position: Vec3::ZERO,
            orbit: true,
            placed: false,
            snapshot: SelfSnapshot::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_orbit(&self) -> bool {
        self.orbit
    }

    pub fn update(
        &mut self,
        config: &PerspectiveCameraConfig,
        ctx: &mut UpdateCtx<'_>,
    ) -> Result<(), ControllerError> {
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &config.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }

        let fov: f32 = property(&eval, "fov", &config.fov)?;
        let near: f32 = property(&eval, "near", &config.near)?;
        let far: f32 = property(&eval, "far", &config.far)?;
        let orbit: bool = property(&eval, "orbit", &config.orbit)?;

        self.camera.fov_y = fov;
        self.camera.near = near;
        self.camera.far = far;
        self.camera.aspect = ctx.viewport().aspect();
        self.orbit = orbit;

        if !self.placed || !orbit {
            let position: Vector3 = property(&eval, "position", &config.position)?;
            let target: Vector3 = property(&eval, "target", &config.target)?;
            self.position = vec3(position);
            self.camera.target = vec3(target);
            self.placed = true;
            self.snapshot.position = Some(position);
            ctx.backend.set_transform(self.node, Transform::looking_at(self.position, self.camera.target));
        }

        ctx.backend.update(self.node, Primitive::Camera(self.camera));
        Ok(())
    }

    /// Rotates an orbit camera about its target by `yaw` (around world Y) and
    /// `pitch` (elevation), both in radians. Returns `false` for non-orbit
    /// cameras, which stay where the configuration puts them.
    pub fn orbit(&mut self, yaw: f32, pitch: f32, backend: &mut dyn Backend) -> bool {
        if !self.orbit {
            return false;
        }
        let offset = self.position - self.camera.target;
        let radius = offset.length();
        if radius < f32::EPSILON {
            return false;
        }

        let azimuth = offset.x.atan2(offset.z) + yaw;
        let elevation = ((offset.y / radius).clamp(-1.0, 1.0).asin() + pitch)
            .clamp(-MAX_ELEVATION, MAX_ELEVATION);
        let (sin_el, cos_el) = elevation.sin_cos();
        let (sin_az, cos_az) = azimuth.sin_cos();

        self.position = self.camera.target + radius * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az);
        self.snapshot.position = Some(Vector3::new(
            f64::from(self.position.x),
            f64::from(self.position.y),
            f64::from(self.position.z),
        ));
        backend.set_transform(self.node, Transform::looking_at(self.position, self.camera.target));
        true
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        backend.dispose(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use diorama_config::Expression;

    fn config(position: &str, fov: &str, orbit: &str) -> PerspectiveCameraConfig {
        PerspectiveCameraConfig {
            position: Expression::new(position),
            fov: Expression::new(fov),
            orbit: Expression::new(orbit),
            ..PerspectiveCameraConfig::default()
        }
    }

    // ── orbit cameras ────────────────────────────────────────────────────

    #[test]
    fn orbit_camera_takes_position_once() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "50", "true"), ctx)).unwrap();
        h.with_ctx(|ctx| cam.update(&config("new Vector3(5, 5, 5)", "30", "true"), ctx)).unwrap();
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(cam.camera().fov_y, 30.0);
    }

    #[test]
    fn fixed_camera_follows_position() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "50", "false"), ctx)).unwrap();
        h.with_ctx(|ctx| cam.update(&config("new Vector3(5, 5, 5)", "50", "false"), ctx)).unwrap();
        assert_eq!(cam.position(), Vec3::new(5.0, 5.0, 5.0));
        assert!(!cam.orbit(0.5, 0.0, &mut h.backend));
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "50", "true"), ctx)).unwrap();
        assert!(cam.orbit(FRAC_PI_2, 0.0, &mut h.backend));
        assert!(cam.position().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));

        // Later passes leave the orbited position alone.
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "50", "true"), ctx)).unwrap();
        assert!(cam.position().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn pitch_is_clamped_below_the_pole() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "50", "true"), ctx)).unwrap();
        cam.orbit(0.0, 10.0, &mut h.backend);
        assert!(cam.position().y < 10.0);
        assert!((cam.position().length() - 10.0).abs() < 1e-3);
    }

    // ── lens ─────────────────────────────────────────────────────────────

    #[test]
    fn aspect_comes_from_viewport() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&PerspectiveCameraConfig::default(), ctx)).unwrap();
        assert!((cam.camera().aspect - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn bad_fov_keeps_previous_lens() {
        let mut h = Harness::new();
        let mut cam = CameraController::new(&mut h.backend);
        h.with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "40", "true"), ctx)).unwrap();
        let err = h
            .with_ctx(|ctx| cam.update(&config("new Vector3(0, 0, 10)", "'wide'", "true"), ctx))
            .unwrap_err();
        assert!(matches!(err, ControllerError::Property { property: "fov", .. }));
        assert_eq!(cam.camera().fov_y, 40.0);
    }
}
