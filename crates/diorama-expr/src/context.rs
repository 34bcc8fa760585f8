use std::collections::BTreeMap;
use std::rc::Rc;

use crate::builtins::builtin_bindings;
use crate::error::EvalResult;
use crate::value::Value;

// ── Layer ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Layer {
    bindings: BTreeMap<String, Value>,
    parent: Option<Rc<Layer>>,
}

thread_local! {
    static BUILTINS: Rc<Layer> = Rc::new(Layer {
        bindings: builtin_bindings(),
        parent: None,
    });
}

// ── Context ───────────────────────────────────────────────────────────────

/// Layered name → value bindings.
///
/// Layers are immutable and shared behind `Rc`; pushing a layer returns a new
/// `Context` and leaves the receiver untouched. Lookups walk from the newest
/// layer down to the built-ins, so later layers shadow earlier ones.
///
/// ```text
/// Self               ← with_value("Self", …)
/// state bindings     ← with_bindings(snapshot)
/// built-ins          ← Context::new()
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    top: Rc<Layer>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context holding only the built-ins.
    pub fn new() -> Self {
        Self { top: BUILTINS.with(Rc::clone) }
    }

    /// Pushes a layer of bindings.
    pub fn with_bindings<I, K>(&self, bindings: I) -> Context
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let bindings = bindings.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Context {
            top: Rc::new(Layer { bindings, parent: Some(Rc::clone(&self.top)) }),
        }
    }

    /// Pushes a single binding.
    pub fn with_value(&self, key: impl Into<String>, value: Value) -> Context {
        self.with_bindings([(key.into(), value)])
    }

    /// Looks up an exact binding name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let mut layer = Some(&self.top);
        while let Some(l) = layer {
            if let Some(v) = l.bindings.get(name) {
                return Some(v);
            }
            layer = l.parent.as_ref();
        }
        None
    }

    /// Resolves a dotted identifier path.
    ///
    /// The longest prefix that is bound as a single name wins
    /// (`sensor.kitchen.temperature` bound flat beats `sensor` bound as an
    /// object); remaining segments become member reads on that value.
    /// Returns `None` when no prefix is bound.
    pub(crate) fn resolve_path(&self, segments: &[&str]) -> Option<EvalResult<Value>> {
        for split in (1..=segments.len()).rev() {
            let name = segments[..split].join(".");
            if let Some(value) = self.get(&name) {
                let mut value = value.clone();
                for seg in &segments[split..] {
                    match value.member(seg) {
                        Ok(v) => value = v,
                        Err(e) => return Some(Err(e)),
                    }
                }
                return Some(Ok(value));
            }
        }
        None
    }
}
