//! End-to-end reconciliation through `Visual` against the headless backend.

use async_trait::async_trait;
use diorama_engine::backend::{HeadlessBackend, LightKind, NodeId, Primitive};
use diorama_engine::resource::{Fetcher, NoCache, ResourceError, ResourceLoader};
use diorama_scene::{ObjectController, StateSnapshot, Visual, VisualConfig};
use serde_json::json;

struct NoFiles;

#[async_trait(?Send)]
impl Fetcher for NoFiles {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        Err(ResourceError::Status { url: url.to_string(), status: 404 })
    }
}

fn visual() -> Visual<HeadlessBackend> {
    let config = VisualConfig { reconcile_every: 1, ..VisualConfig::default() };
    Visual::new(HeadlessBackend::new(), ResourceLoader::new(NoFiles, NoCache), config)
}

fn object<'v>(v: &'v Visual<HeadlessBackend>, name: &str) -> &'v ObjectController {
    v.scene_objects("main").and_then(|o| o.get(name)).unwrap_or_else(|| panic!("no object {name}"))
}

fn light(v: &Visual<HeadlessBackend>, node: NodeId) -> (LightKind, f32) {
    match v.backend().primitive(node) {
        Some(Primitive::Light(l)) => (l.kind, l.intensity),
        other => panic!("expected light, got {other:?}"),
    }
}

// ── the sun ──────────────────────────────────────────────────────────────

#[test]
fn sun_reconciled_twice_is_one_point_light() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": { "sun": {
        "type": "light.point",
        "position": "new Vector3(0,0,0)",
        "intensity": "2000",
        "color": "#ffffff"
    }}}}}))
    .unwrap();

    let first = v.frame().reconciled.unwrap();
    let node = object(&v, "sun").node();
    let second = v.frame().reconciled.unwrap();

    assert_eq!((first.created, second.created, second.disposed), (1, 0, 0));
    assert_eq!(object(&v, "sun").node(), node);
    assert_eq!(v.scene_objects("main").unwrap().len(), 1);
    let (kind, intensity) = light(&v, node);
    assert!(matches!(kind, LightKind::Point { .. }));
    assert_eq!(intensity, 2000.0);
    assert_eq!(v.backend().live_of_kind("light").len(), 1);
}

// ── identity ─────────────────────────────────────────────────────────────

#[test]
fn state_changes_update_in_place() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "lamp": { "type": "light.point", "intensity": "sensor.lamp.on ? 800 : 0" }
    }}}}))
    .unwrap();
    v.set_state(StateSnapshot::from_json(&json!({ "sensor": { "lamp": { "on": true } } })));
    v.frame();
    let node = object(&v, "lamp").node();
    assert_eq!(light(&v, node).1, 800.0);

    v.set_state(StateSnapshot::from_json(&json!({ "sensor": { "lamp": { "on": false } } })));
    v.frame();
    assert_eq!(object(&v, "lamp").node(), node);
    assert_eq!(light(&v, node).1, 0.0);
    assert_eq!(v.backend().dispose_count(node), 0);
}

#[test]
fn tag_change_disposes_exactly_once() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "x": { "type": "light.point" }
    }}}}))
    .unwrap();
    v.frame();
    let old = object(&v, "x").node();

    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "x": { "type": "camera.perspective" }
    }}}}))
    .unwrap();
    let report = v.frame().reconciled.unwrap();
    v.frame();

    assert_eq!((report.disposed, report.created), (1, 1));
    assert_eq!(v.backend().dispose_count(old), 1);
    assert!(object(&v, "x").as_camera().is_some());
    assert_eq!(v.backend().double_disposals(), 0);
}

// ── fault isolation ──────────────────────────────────────────────────────

#[test]
fn middle_sibling_failure_spares_neighbours() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "a": { "type": "light.point", "intensity": "1", "position": "new Vector3(1, 0, 0)" },
        "b": { "type": "light.point", "intensity": "Math.nope(" },
        "c": { "type": "light.point", "intensity": "3", "position": "new Vector3(3, 0, 0)" }
    }}}}))
    .unwrap();
    let report = v.frame().reconciled.unwrap();

    assert_eq!(report.failed, ["main.b"]);
    assert_eq!(report.updated, 2);
    for (name, intensity, x) in [("a", 1.0, 1.0), ("c", 3.0, 3.0)] {
        let node = object(&v, name).node();
        assert_eq!(light(&v, node).1, intensity);
        let world = v.backend().world_matrix(node).unwrap();
        assert_eq!(world.w_axis.x, x);
    }
}

#[test]
fn invisible_objects_skip_rendering() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "lamp": { "type": "light.point", "visible": "hidden != true" },
        "fill": { "type": "light.ambient" }
    }}}}))
    .unwrap();
    v.set_state(StateSnapshot::from_json(&json!({ "hidden": true })));
    let stats = v.frame().stats.unwrap();
    assert_eq!(stats.lights, 1);
}

// ── cameras ──────────────────────────────────────────────────────────────

#[test]
fn orbit_camera_keeps_user_position_across_passes() {
    let mut v = visual();
    let config = |fov: u32| {
        json!({ "scenes": { "main": { "objects": {
            "camera": { "type": "camera.perspective", "fov": fov.to_string(), "position": "new Vector3(0, 2, 10)" }
        }}}})
    };
    v.set_configuration_json(&config(50)).unwrap();
    v.frame();
    assert!(v.orbit_active_camera(0.4, 0.2));
    let orbited = v.active_camera_controller().unwrap().position();

    v.set_configuration_json(&config(35)).unwrap();
    let stats = v.frame().stats.unwrap();
    let cam = v.active_camera_controller().unwrap();
    assert_eq!(cam.camera().fov_y, 35.0);
    assert_eq!(cam.position(), orbited);
    assert_eq!(stats.camera.unwrap().fov_y, 35.0);
}

#[test]
fn groups_compose_transforms() {
    let mut v = visual();
    v.set_configuration_json(&json!({ "scenes": { "main": { "objects": {
        "room": { "type": "group", "position": "new Vector3(10, 0, 0)", "children": {
            "lamp": { "type": "light.point", "position": "new Vector3(0, 2, 0)" }
        }}
    }}}}))
    .unwrap();
    v.frame();
    let room = object(&v, "room").as_group().unwrap();
    let lamp = room.children().get("lamp").unwrap().node();
    let world = v.backend().world_matrix(lamp).unwrap();
    let p = world.transform_point3(glam::Vec3::ZERO);
    assert!(p.abs_diff_eq(glam::Vec3::new(10.0, 2.0, 0.0), 1e-5));
}

#[test]
fn visual_without_scenes_renders_nothing() {
    let mut v = visual();
    let out = v.frame();
    assert!(out.scene.is_none());
    assert!(out.stats.is_none());
}
