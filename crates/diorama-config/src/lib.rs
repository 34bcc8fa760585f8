//! Typed scene configuration for Diorama.
//!
//! A configuration is pure data: scenes, named objects and their property
//! expressions. [`decode`] turns any JSON tree into a [`Configuration`],
//! substituting defaults for malformed fields; [`encode`] writes it back.
//!
//! ```rust
//! use diorama_config::{decode, ObjectConfiguration};
//! use serde_json::json;
//!
//! let config = decode(&json!({
//!     "scenes": { "main": { "objects": {
//!         "sun": { "type": "light.point", "intensity": 2000 }
//!     }}}
//! }));
//! let sun = &config.scenes["main"].objects["sun"];
//! assert!(matches!(sun, ObjectConfiguration::PointLight(l) if l.intensity.as_str() == "2000"));
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod model;

pub use decode::{decode, decode_with, DecodeOptions, UnknownTypePolicy};
pub use encode::{encode, encode_object};
pub use error::{ConfigError, DecodeError};
pub use model::{
    AmbientLightConfig, Card2dConfig, Card3dConfig, Configuration, CustomLightConfig,
    Expression, GroupConfig, GroupTransform, Identity, ModelConfig, ObjectConfiguration,
    ObjectTag, PerspectiveCameraConfig, PointLightConfig, SceneConfiguration,
};

impl Configuration {
    /// Parses JSON text and decodes it with `opts`.
    pub fn from_json_str(text: &str, opts: &DecodeOptions) -> Result<Configuration, ConfigError> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        Ok(decode_with(&raw, opts)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_is_reported() {
        let err = Configuration::from_json_str("{ scenes: ", &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn strict_decode_errors_are_wrapped() {
        let text = r#"{ "scenes": { "main": { "objects": { "x": { "type": "nope" } } } } }"#;
        let err = Configuration::from_json_str(text, &DecodeOptions::strict()).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(DecodeError::UnknownType { .. })));
    }

    #[test]
    fn sun_example_decodes() {
        let text = r##"{ "scenes": { "main": { "objects": { "sun": {
            "type": "light.point", "position": "new Vector3(0,0,0)",
            "intensity": "2000", "color": "#ffffff" } } } } }"##;
        let config = Configuration::from_json_str(text, &DecodeOptions::default()).unwrap();
        assert_eq!(config.scenes["main"].objects["sun"].tag(), ObjectTag::LightPoint);
    }
}
