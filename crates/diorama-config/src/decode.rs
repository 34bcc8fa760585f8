use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::model::{
    AmbientLightConfig, Card2dConfig, Card3dConfig, Configuration, CustomLightConfig,
    Expression, GroupConfig, GroupTransform, ModelConfig, ObjectConfiguration, ObjectTag,
    PerspectiveCameraConfig, PointLightConfig, SceneConfiguration,
};

// ── Options ───────────────────────────────────────────────────────────────

/// What to do with an object whose `type` is missing or unknown.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum UnknownTypePolicy {
    /// Skip the entry and log a warning naming its path.
    #[default]
    Drop,
    /// Fail the whole decode with the offending path.
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub unknown_types: UnknownTypePolicy,
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self { unknown_types: UnknownTypePolicy::Reject }
    }
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Decodes a raw configuration tree, substituting defaults for anything
/// malformed. Never fails.
pub fn decode(raw: &Value) -> Configuration {
    match decode_with(raw, &DecodeOptions::default()) {
        Ok(config) => config,
        // Only `Reject` produces errors.
        Err(e) => {
            log::warn!("configuration decode failed: {e}");
            Configuration::default()
        }
    }
}

/// Decodes with an explicit policy. Only [`UnknownTypePolicy::Reject`] can fail.
pub fn decode_with(raw: &Value, opts: &DecodeOptions) -> Result<Configuration, DecodeError> {
    let root = as_object(raw);
    let defaults = Configuration::default();

    let mut scenes = BTreeMap::new();
    for (name, scene) in as_object(root.get("scenes").unwrap_or(&Value::Null)) {
        let path = format!("scenes.{name}");
        scenes.insert(name.clone(), decode_scene(scene, &path, opts)?);
    }

    Ok(Configuration {
        scene: expression_field(root, "scene", defaults.scene),
        style: match root.get("style") {
            Some(Value::String(s)) => s.clone(),
            _ => defaults.style,
        },
        scenes,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────

static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

/// Non-objects decode as empty objects.
fn as_object(v: &Value) -> &Map<String, Value> {
    match v {
        Value::Object(map) => map,
        _ => &EMPTY,
    }
}

/// Strings are taken verbatim, numbers and booleans stringified, anything
/// else falls back to `default`.
pub(crate) fn expression_field(
    obj: &Map<String, Value>,
    key: &str,
    default: Expression,
) -> Expression {
    match obj.get(key) {
        Some(Value::String(s)) => Expression::new(s.as_str()),
        Some(Value::Number(n)) => Expression::new(n.to_string()),
        Some(Value::Bool(b)) => Expression::new(b.to_string()),
        _ => default,
    }
}

fn decode_scene(
    raw: &Value,
    path: &str,
    opts: &DecodeOptions,
) -> Result<SceneConfiguration, DecodeError> {
    let obj = as_object(raw);
    let defaults = SceneConfiguration::default();
    Ok(SceneConfiguration {
        camera: expression_field(obj, "camera", defaults.camera),
        background: expression_field(obj, "background", defaults.background),
        objects: decode_objects(obj.get("objects"), &format!("{path}.objects"), opts)?,
    })
}

fn decode_objects(
    raw: Option<&Value>,
    path: &str,
    opts: &DecodeOptions,
) -> Result<BTreeMap<String, ObjectConfiguration>, DecodeError> {
    let mut out = BTreeMap::new();
    for (name, entry) in as_object(raw.unwrap_or(&Value::Null)) {
        let entry_path = format!("{path}.{name}");
        if let Some(object) = decode_object(entry, &entry_path, opts)? {
            out.insert(name.clone(), object);
        }
    }
    Ok(out)
}

fn decode_object(
    raw: &Value,
    path: &str,
    opts: &DecodeOptions,
) -> Result<Option<ObjectConfiguration>, DecodeError> {
    let obj = as_object(raw);
    let tag = match obj.get("type") {
        Some(Value::String(s)) => match ObjectTag::parse(s) {
            Some(tag) => tag,
            None => return unknown(path, Some(s.as_str()), opts),
        },
        _ => return unknown(path, None, opts),
    };

    let config = match tag {
        ObjectTag::Card2d => ObjectConfiguration::Card2d(Card2dConfig::decode_fields(obj)),
        ObjectTag::Card3d => ObjectConfiguration::Card3d(Card3dConfig::decode_fields(obj)),
        ObjectTag::ModelGlb => ObjectConfiguration::Model(ModelConfig::decode_fields(obj)),
        ObjectTag::LightPoint => {
            ObjectConfiguration::PointLight(PointLightConfig::decode_fields(obj))
        }
        ObjectTag::LightAmbient => {
            ObjectConfiguration::AmbientLight(AmbientLightConfig::decode_fields(obj))
        }
        ObjectTag::LightCustom => {
            ObjectConfiguration::CustomLight(CustomLightConfig::decode_fields(obj))
        }
        ObjectTag::CameraPerspective => {
            ObjectConfiguration::PerspectiveCamera(PerspectiveCameraConfig::decode_fields(obj))
        }
        ObjectTag::Group => ObjectConfiguration::Group(GroupConfig {
            transform: GroupTransform::decode_fields(obj),
            children: decode_objects(obj.get("children"), &format!("{path}.children"), opts)?,
        }),
    };
    Ok(Some(config))
}

fn unknown(
    path: &str,
    found: Option<&str>,
    opts: &DecodeOptions,
) -> Result<Option<ObjectConfiguration>, DecodeError> {
    match (opts.unknown_types, found) {
        (UnknownTypePolicy::Reject, Some(tag)) => Err(DecodeError::UnknownType {
            path: path.to_string(),
            tag: tag.to_string(),
        }),
        (UnknownTypePolicy::Reject, None) => {
            Err(DecodeError::MissingType { path: path.to_string() })
        }
        (UnknownTypePolicy::Drop, Some(tag)) => {
            log::warn!("dropping {path}: unknown object type {tag:?}");
            Ok(None)
        }
        (UnknownTypePolicy::Drop, None) => {
            log::warn!("dropping {path}: missing object type");
            Ok(None)
        }
    }
}
