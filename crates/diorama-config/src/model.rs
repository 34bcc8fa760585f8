use std::collections::BTreeMap;
use std::fmt;

// ── Expression ────────────────────────────────────────────────────────────

/// The source text of a property expression.
///
/// Stored verbatim; evaluation happens in the scene layer on every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expression(String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Expression {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Default expressions ───────────────────────────────────────────────────

pub const ORIGIN: &str = "new Vector3(0, 0, 0)";
pub const NO_ROTATION: &str = "new Euler(0, 0, 0)";
pub const UNIT_SCALE: &str = "new Vector3(1, 1, 1)";
pub const CARD_SIZE: &str = "new Vector2(400, 300)";
pub const WHITE: &str = "#ffffff";

// ── Tags ──────────────────────────────────────────────────────────────────

/// Stable discriminator of an [`ObjectConfiguration`], as written in `type`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectTag {
    Card2d,
    Card3d,
    ModelGlb,
    LightPoint,
    LightAmbient,
    LightCustom,
    CameraPerspective,
    Group,
}

impl ObjectTag {
    pub const ALL: [ObjectTag; 8] = [
        ObjectTag::Card2d,
        ObjectTag::Card3d,
        ObjectTag::ModelGlb,
        ObjectTag::LightPoint,
        ObjectTag::LightAmbient,
        ObjectTag::LightCustom,
        ObjectTag::CameraPerspective,
        ObjectTag::Group,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectTag::Card2d => "card.2d",
            ObjectTag::Card3d => "card.3d",
            ObjectTag::ModelGlb => "model.glb",
            ObjectTag::LightPoint => "light.point",
            ObjectTag::LightAmbient => "light.ambient",
            ObjectTag::LightCustom => "light.custom",
            ObjectTag::CameraPerspective => "camera.perspective",
            ObjectTag::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<ObjectTag> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for ObjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Expression-field structs ──────────────────────────────────────────────

/// Declares a configuration struct whose fields are all expressions, with its
/// defaults, its JSON keys and its field-wise decode/encode.
macro_rules! expression_config {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $key:literal = $default:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: Expression, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $( $field: Expression::new($default), )* }
            }
        }

        impl $name {
            /// JSON keys of every field, in declaration order.
            pub const FIELDS: &'static [&'static str] = &[$($key),*];

            pub(crate) fn decode_fields(
                obj: &serde_json::Map<String, serde_json::Value>,
            ) -> Self {
                let defaults = Self::default();
                Self {
                    $( $field: crate::decode::expression_field(obj, $key, defaults.$field), )*
                }
            }

            pub(crate) fn encode_fields(
                &self,
                out: &mut serde_json::Map<String, serde_json::Value>,
            ) {
                $( out.insert($key.to_string(), self.$field.as_str().into()); )*
            }
        }
    };
}

expression_config! {
    /// A flat UI card that always faces the camera.
    Card2dConfig {
        /// Embedded element type; part of the card's identity.
        element: "element" = "'markdown'",
        /// Object pushed to the element once, after it is created.
        config: "config" = "{}",
        position: "position" = ORIGIN,
        size: "size" = CARD_SIZE,
        visible: "visible" = "true",
    }
}

expression_config! {
    /// A UI card placed in 3D space.
    Card3dConfig {
        element: "element" = "'markdown'",
        config: "config" = "{}",
        position: "position" = ORIGIN,
        rotation: "rotation" = NO_ROTATION,
        scale: "scale" = UNIT_SCALE,
        size: "size" = CARD_SIZE,
        visible: "visible" = "true",
    }
}

expression_config! {
    /// A GLB model loaded from `url`.
    ModelConfig {
        url: "url" = "''",
        position: "position" = ORIGIN,
        rotation: "rotation" = NO_ROTATION,
        scale: "scale" = UNIT_SCALE,
        visible: "visible" = "true",
    }
}

expression_config! {
    PointLightConfig {
        position: "position" = ORIGIN,
        color: "color" = WHITE,
        intensity: "intensity" = "1",
        /// `0` means no cutoff.
        distance: "distance" = "0",
        decay: "decay" = "2",
        /// Shows a small marker at the light position.
        helper: "helper" = "false",
        visible: "visible" = "true",
    }
}

expression_config! {
    AmbientLightConfig {
        color: "color" = WHITE,
        intensity: "intensity" = "1",
        visible: "visible" = "true",
    }
}

expression_config! {
    /// Lights authored in a GLB (`KHR_lights_punctual`).
    CustomLightConfig {
        url: "url" = "''",
        position: "position" = ORIGIN,
        rotation: "rotation" = NO_ROTATION,
        scale: "scale" = UNIT_SCALE,
        /// Multiplier applied to every loaded light.
        intensity: "intensity" = "1",
        visible: "visible" = "true",
    }
}

expression_config! {
    PerspectiveCameraConfig {
        position: "position" = "new Vector3(0, 0, 10)",
        target: "target" = ORIGIN,
        /// Vertical field of view in degrees.
        fov: "fov" = "50",
        near: "near" = "0.1",
        far: "far" = "2000",
        /// Orbit cameras take position/target from configuration only once.
        orbit: "orbit" = "true",
        visible: "visible" = "true",
    }
}

expression_config! {
    /// The transform part of a group.
    GroupTransform {
        position: "position" = ORIGIN,
        rotation: "rotation" = NO_ROTATION,
        scale: "scale" = UNIT_SCALE,
        visible: "visible" = "true",
    }
}

/// A transform node with nested, named children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupConfig {
    pub transform: GroupTransform,
    pub children: BTreeMap<String, ObjectConfiguration>,
}

// ── ObjectConfiguration ───────────────────────────────────────────────────

/// One named object in a scene or group.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectConfiguration {
    Card2d(Card2dConfig),
    Card3d(Card3dConfig),
    Model(ModelConfig),
    PointLight(PointLightConfig),
    AmbientLight(AmbientLightConfig),
    CustomLight(CustomLightConfig),
    PerspectiveCamera(PerspectiveCameraConfig),
    Group(GroupConfig),
}

/// What decides whether a live object can be updated in place or has to be
/// replaced: the tag, plus the element expression for cards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub tag: ObjectTag,
    pub element: Option<Expression>,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.element {
            Some(e) => write!(f, "{}[{}]", self.tag, e),
            None => write!(f, "{}", self.tag),
        }
    }
}

impl ObjectConfiguration {
    /// A configuration of the given kind with every field at its default.
    pub fn with_defaults(tag: ObjectTag) -> Self {
        match tag {
            ObjectTag::Card2d => Self::Card2d(Default::default()),
            ObjectTag::Card3d => Self::Card3d(Default::default()),
            ObjectTag::ModelGlb => Self::Model(Default::default()),
            ObjectTag::LightPoint => Self::PointLight(Default::default()),
            ObjectTag::LightAmbient => Self::AmbientLight(Default::default()),
            ObjectTag::LightCustom => Self::CustomLight(Default::default()),
            ObjectTag::CameraPerspective => Self::PerspectiveCamera(Default::default()),
            ObjectTag::Group => Self::Group(Default::default()),
        }
    }

    pub fn tag(&self) -> ObjectTag {
        match self {
            Self::Card2d(_) => ObjectTag::Card2d,
            Self::Card3d(_) => ObjectTag::Card3d,
            Self::Model(_) => ObjectTag::ModelGlb,
            Self::PointLight(_) => ObjectTag::LightPoint,
            Self::AmbientLight(_) => ObjectTag::LightAmbient,
            Self::CustomLight(_) => ObjectTag::LightCustom,
            Self::PerspectiveCamera(_) => ObjectTag::CameraPerspective,
            Self::Group(_) => ObjectTag::Group,
        }
    }

    pub fn identity(&self) -> Identity {
        let element = match self {
            Self::Card2d(c) => Some(c.element.clone()),
            Self::Card3d(c) => Some(c.element.clone()),
            _ => None,
        };
        Identity { tag: self.tag(), element }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, ObjectConfiguration>> {
        match self {
            Self::Group(g) => Some(&g.children),
            _ => None,
        }
    }
}

// ── Scenes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfiguration {
    /// Selects the active camera by object name.
    pub camera: Expression,
    pub background: Expression,
    pub objects: BTreeMap<String, ObjectConfiguration>,
}

impl Default for SceneConfiguration {
    fn default() -> Self {
        Self {
            camera: Expression::new("'camera'"),
            background: Expression::new("#000000"),
            objects: BTreeMap::new(),
        }
    }
}

/// The root of a visual's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Selects the active scene by name.
    pub scene: Expression,
    /// Passed through verbatim to the host.
    pub style: String,
    pub scenes: BTreeMap<String, SceneConfiguration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            scene: Expression::new("'main'"),
            style: String::new(),
            scenes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_strings() {
        for tag in ObjectTag::ALL {
            assert_eq!(ObjectTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(ObjectTag::parse("light.spot"), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cam = PerspectiveCameraConfig::default();
        assert_eq!(cam.position.as_str(), "new Vector3(0, 0, 10)");
        assert_eq!(cam.fov.as_str(), "50");
        let light = PointLightConfig::default();
        assert_eq!(light.decay.as_str(), "2");
        assert_eq!(light.helper.as_str(), "false");
    }

    #[test]
    fn card_identity_includes_element() {
        let a = ObjectConfiguration::Card2d(Card2dConfig::default());
        let mut b_cfg = Card2dConfig::default();
        b_cfg.element = Expression::new("'chart'");
        let b = ObjectConfiguration::Card2d(b_cfg);
        assert_eq!(a.tag(), b.tag());
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn non_card_identity_is_tag_only() {
        let mut m = ModelConfig::default();
        let before = ObjectConfiguration::Model(m.clone()).identity();
        m.url = Expression::new("'duck.glb'");
        assert_eq!(ObjectConfiguration::Model(m).identity(), before);
    }

    #[test]
    fn field_lists_follow_declaration_order() {
        assert_eq!(AmbientLightConfig::FIELDS, &["color", "intensity", "visible"]);
    }
}
