use std::collections::BTreeMap;

use diorama_expr::{Context, Value};

/// External state visible to expressions, as a flat map of dotted ids.
///
/// Nested JSON objects are flattened (`{"sensor": {"lamp": {"on": true}}}`
/// becomes `sensor.lamp.on`), arrays by index (`list.0`). Only primitives are
/// kept: numbers, booleans, strings and null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    entries: BTreeMap<String, Value>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut snapshot = Self::new();
        flatten(json, &mut String::new(), &mut snapshot.entries);
        snapshot
    }

    /// Sets one entry. Non-primitive values are ignored.
    pub fn set(&mut self, id: impl Into<String>, value: Value) {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_) => {
                self.entries.insert(id.into(), value);
            }
            other => log::debug!("state: ignoring non-primitive {} value", other.type_name()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The snapshot as an object value keyed by dotted id, handed to card
    /// elements.
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    /// A context with the built-ins plus one binding per entry.
    pub fn context(&self) -> Context {
        Context::new().with_bindings(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

fn flatten(json: &serde_json::Value, prefix: &mut String, out: &mut BTreeMap<String, Value>) {
    use serde_json::Value as Json;

    match json {
        Json::Object(map) => {
            for (key, child) in map {
                descend(key, child, prefix, out);
            }
        }
        Json::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                descend(&i.to_string(), child, prefix, out);
            }
        }
        leaf if prefix.is_empty() => {
            log::debug!("state: ignoring top-level {leaf}");
        }
        Json::Null => {
            out.insert(prefix.clone(), Value::Null);
        }
        Json::Bool(b) => {
            out.insert(prefix.clone(), Value::Bool(*b));
        }
        Json::Number(n) => {
            out.insert(prefix.clone(), Value::Number(n.as_f64().unwrap_or(f64::NAN)));
        }
        Json::String(s) => {
            out.insert(prefix.clone(), Value::Str(s.clone()));
        }
    }
}

fn descend(
    key: &str,
    child: &serde_json::Value,
    prefix: &mut String,
    out: &mut BTreeMap<String, Value>,
) {
    let len = prefix.len();
    if !prefix.is_empty() {
        prefix.push('.');
    }
    prefix.push_str(key);
    flatten(child, prefix, out);
    prefix.truncate(len);
}
