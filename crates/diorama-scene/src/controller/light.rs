use diorama_config::{AmbientLightConfig, PointLightConfig};
use diorama_engine::backend::{Backend, Light, LightKind, NodeId, Primitive};
use diorama_engine::coords::{ColorRgba, Transform};
use diorama_expr::{Color, Vector3};

use super::{apply_visibility, property, rgba, vec3};
use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::ControllerError;

const HELPER_RADIUS: f32 = 0.25;

// ── Point ─────────────────────────────────────────────────────────────────

/// `light.point`, with an optional marker child showing where it sits.
pub struct PointLightController {
    node: NodeId,
    helper: Option<NodeId>,
    light: Light,
    snapshot: SelfSnapshot,
}

impl PointLightController {
    pub fn new(backend: &mut dyn Backend) -> Self {
        let light = Light {
            kind: LightKind::Point { distance: 0.0, decay: 2.0 },
            color: ColorRgba::white(),
            intensity: 1.0,
        };
        Self {
            node: backend.create(Primitive::Light(light)),
            helper: None,
            light,
            snapshot: SelfSnapshot::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn helper(&self) -> Option<NodeId> {
        self.helper
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn update(
        &mut self,
        config: &PointLightConfig,
        ctx: &mut UpdateCtx<'_>,
    ) -> Result<(), ControllerError> {
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &config.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }

        let position: Vector3 = property(&eval, "position", &config.position)?;
        let color: Color = property(&eval, "color", &config.color)?;
        let intensity: f32 = property(&eval, "intensity", &config.intensity)?;
        let distance: f32 = property(&eval, "distance", &config.distance)?;
        let decay: f32 = property(&eval, "decay", &config.decay)?;
        let helper: bool = property(&eval, "helper", &config.helper)?;

        ctx.backend.set_transform(self.node, Transform::from_translation(vec3(position)));
        self.snapshot.position = Some(position);

        self.light = Light {
            kind: LightKind::Point { distance, decay },
            color: rgba(color),
            intensity,
        };
        ctx.backend.update(self.node, Primitive::Light(self.light));

        let marker = Primitive::Marker { color: self.light.color, radius: HELPER_RADIUS };
        match (helper, self.helper) {
            (true, None) => {
                let id = ctx.backend.create(marker);
                ctx.backend.attach(self.node, id);
                self.helper = Some(id);
            }
            (true, Some(id)) => ctx.backend.update(id, marker),
            (false, Some(id)) => {
                ctx.backend.dispose(id);
                self.helper = None;
            }
            (false, None) => {}
        }
        Ok(())
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        if let Some(id) = self.helper.take() {
            backend.dispose(id);
        }
        backend.dispose(self.node);
    }
}

// ── Ambient ───────────────────────────────────────────────────────────────

/// `light.ambient`.
pub struct AmbientLightController {
    node: NodeId,
    light: Light,
    snapshot: SelfSnapshot,
}

impl AmbientLightController {
    pub fn new(backend: &mut dyn Backend) -> Self {
        let light = Light { kind: LightKind::Ambient, color: ColorRgba::white(), intensity: 1.0 };
        Self {
            node: backend.create(Primitive::Light(light)),
            light,
            snapshot: SelfSnapshot::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn update(
        &mut self,
        config: &AmbientLightConfig,
        ctx: &mut UpdateCtx<'_>,
    ) -> Result<(), ControllerError> {
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &config.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }
        let color: Color = property(&eval, "color", &config.color)?;
        let intensity: f32 = property(&eval, "intensity", &config.intensity)?;
        self.light.color = rgba(color);
        self.light.intensity = intensity;
        ctx.backend.update(self.node, Primitive::Light(self.light));
        Ok(())
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
    use serde_json::json;

    fn point(intensity: &str, helper: &str) -> PointLightConfig {
        PointLightConfig {
            intensity: Expression::new(intensity),
            helper: Expression::new(helper),
            ..PointLightConfig::default()
        }
    }

    // ── point ────────────────────────────────────────────────────────────

    #[test]
    fn intensity_follows_state() {
        let mut h = Harness::new();
        h.set_state(json!({ "sensor": { "lamp": { "on": true } } }));
        let mut light = PointLightController::new(&mut h.backend);
        let cfg = point("sensor.lamp.on ? 800 : 0", "false");

        h.with_ctx(|ctx| light.update(&cfg, ctx)).unwrap();
        assert_eq!(light.light().intensity, 800.0);

        h.set_state(json!({ "sensor": { "lamp": { "on": false } } }));
        h.with_ctx(|ctx| light.update(&cfg, ctx)).unwrap();
        assert_eq!(light.light().intensity, 0.0);
    }

    #[test]
    fn helper_toggles_marker_child() {
        let mut h = Harness::new();
        let mut light = PointLightController::new(&mut h.backend);

        h.with_ctx(|ctx| light.update(&point("1", "true"), ctx)).unwrap();
        let marker = light.helper().unwrap();
        assert_eq!(h.backend.parent(marker), Some(light.node()));

        h.with_ctx(|ctx| light.update(&point("1", "false"), ctx)).unwrap();
        assert!(light.helper().is_none());
        assert!(h.backend.is_disposed(marker));
        assert_eq!(h.backend.dispose_count(marker), 1);
    }

    #[test]
    fn hidden_light_keeps_previous_values() {
        let mut h = Harness::new();
        let mut light = PointLightController::new(&mut h.backend);
        h.with_ctx(|ctx| light.update(&point("5", "false"), ctx)).unwrap();

        let hidden = PointLightConfig {
            visible: Expression::new("false"),
            intensity: Expression::new("this is not evaluated"),
            ..PointLightConfig::default()
        };
        h.with_ctx(|ctx| light.update(&hidden, ctx)).unwrap();
        assert!(!h.backend.is_visible(light.node()));
        assert_eq!(light.light().intensity, 5.0);
    }

    #[test]
    fn dispose_releases_helper_too() {
        let mut h = Harness::new();
        let mut light = PointLightController::new(&mut h.backend);
        h.with_ctx(|ctx| light.update(&point("1", "true"), ctx)).unwrap();
        light.dispose(&mut h.backend);
        assert_eq!(h.backend.live_count(), 0);
    }

    // ── ambient ──────────────────────────────────────────────────────────

    #[test]
    fn ambient_takes_color_and_intensity() {
        let mut h = Harness::new();
        let mut light = AmbientLightController::new(&mut h.backend);
        let cfg = AmbientLightConfig {
            color: Expression::new("#ff0000"),
            intensity: Expression::new("0.5 * 2"),
            ..AmbientLightConfig::default()
        };
        h.with_ctx(|ctx| light.update(&cfg, ctx)).unwrap();
        assert_eq!(light.light().color, ColorRgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(light.light().intensity, 1.0);
    }
}
