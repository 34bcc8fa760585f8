use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::model::{Configuration, ObjectConfiguration, SceneConfiguration};

/// Encodes a configuration as plain JSON objects with string fields.
///
/// `decode(&encode(&c)) == c` for every configuration that `decode` can
/// produce.
pub fn encode(config: &Configuration) -> Value {
    let mut root = Map::new();
    root.insert("scene".into(), config.scene.as_str().into());
    root.insert("style".into(), config.style.as_str().into());
    let scenes = config
        .scenes
        .iter()
        .map(|(name, scene)| (name.clone(), encode_scene(scene)))
        .collect();
    root.insert("scenes".into(), Value::Object(scenes));
    Value::Object(root)
}

fn encode_scene(scene: &SceneConfiguration) -> Value {
    let mut out = Map::new();
    out.insert("camera".into(), scene.camera.as_str().into());
    out.insert("background".into(), scene.background.as_str().into());
    out.insert("objects".into(), encode_objects(&scene.objects));
    Value::Object(out)
}

fn encode_objects(objects: &BTreeMap<String, ObjectConfiguration>) -> Value {
    Value::Object(
        objects
            .iter()
            .map(|(name, object)| (name.clone(), encode_object(object)))
            .collect(),
    )
}

pub fn encode_object(object: &ObjectConfiguration) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), object.tag().as_str().into());
    match object {
        ObjectConfiguration::Card2d(c) => c.encode_fields(&mut out),
        ObjectConfiguration::Card3d(c) => c.encode_fields(&mut out),
        ObjectConfiguration::Model(c) => c.encode_fields(&mut out),
        ObjectConfiguration::PointLight(c) => c.encode_fields(&mut out),
        ObjectConfiguration::AmbientLight(c) => c.encode_fields(&mut out),
        ObjectConfiguration::CustomLight(c) => c.encode_fields(&mut out),
        ObjectConfiguration::PerspectiveCamera(c) => c.encode_fields(&mut out),
        ObjectConfiguration::Group(g) => {
            g.transform.encode_fields(&mut out);
            out.insert("children".into(), encode_objects(&g.children));
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::model::{Expression, GroupConfig, ObjectTag};
    use serde_json::json;

    fn sample() -> Configuration {
        let mut lamp = ObjectConfiguration::with_defaults(ObjectTag::LightPoint);
        if let ObjectConfiguration::PointLight(l) = &mut lamp {
            l.intensity = Expression::new("sensor.lamp.on ? 800 : 0");
        }
        let mut group = GroupConfig::default();
        group.children.insert("lamp".into(), lamp);
        group.children.insert("card".into(), ObjectConfiguration::with_defaults(ObjectTag::Card3d));

        let mut config = Configuration::default();
        config.style = "height: 400px".into();
        let scene = config.scenes.entry("main".into()).or_default();
        scene.objects.insert("room".into(), ObjectConfiguration::Group(group));
        for tag in ObjectTag::ALL {
            scene.objects.insert(tag.as_str().into(), ObjectConfiguration::with_defaults(tag));
        }
        config
    }

    #[test]
    fn decode_inverts_encode() {
        let config = sample();
        assert_eq!(decode(&encode(&config)), config);
    }

    #[test]
    fn objects_carry_type_and_string_fields() {
        let v = encode_object(&ObjectConfiguration::with_defaults(ObjectTag::LightAmbient));
        assert_eq!(
            v,
            json!({ "type": "light.ambient", "color": "#ffffff", "intensity": "1", "visible": "true" })
        );
    }

    #[test]
    fn groups_nest_children() {
        let v = encode(&sample());
        assert_eq!(v["scenes"]["main"]["objects"]["room"]["children"]["lamp"]["type"], "light.point");
    }
}
