use std::collections::BTreeMap;
use std::rc::Rc;

use diorama_engine::backend::Backend;
use diorama_engine::coords::Viewport;
use diorama_engine::resource::ResourceLoader;
use diorama_expr::{Euler, Evaluator, Value, Vector3};

use crate::card::CardFactory;
use crate::reconciler::ReconcileReport;
use crate::state::StateSnapshot;

/// Everything a controller may touch during one reconciliation pass.
pub struct UpdateCtx<'a> {
    pub backend: &'a mut dyn Backend,
    /// Built-ins plus the current state bindings.
    pub evaluator: &'a Evaluator,
    pub state: &'a StateSnapshot,
    pub loader: &'a Rc<ResourceLoader>,
    pub cards: Option<&'a Rc<dyn CardFactory>>,
    /// Counts accumulated over the whole pass, nested groups included.
    pub report: ReconcileReport,
}

impl<'a> UpdateCtx<'a> {
    pub fn new(
        backend: &'a mut dyn Backend,
        evaluator: &'a Evaluator,
        state: &'a StateSnapshot,
        loader: &'a Rc<ResourceLoader>,
    ) -> Self {
        Self { backend, evaluator, state, loader, cards: None, report: ReconcileReport::default() }
    }

    pub fn with_cards(mut self, cards: Option<&'a Rc<dyn CardFactory>>) -> Self {
        self.cards = cards;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.backend.viewport()
    }
}

/// What an object resolved on its previous pass, bound as `Self` while its
/// properties are evaluated.
///
/// Fields stay `None` until first resolved; absent fields are simply not
/// present on the `Self` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfSnapshot {
    pub position: Option<Vector3>,
    pub rotation: Option<Euler>,
    pub scale: Option<Vector3>,
    pub visible: Option<bool>,
    pub loaded_url: Option<String>,
}

impl SelfSnapshot {
    pub fn to_value(&self) -> Value {
        let mut out = BTreeMap::new();
        if let Some(p) = self.position {
            out.insert("position".to_string(), Value::from(p));
        }
        if let Some(r) = self.rotation {
            out.insert("rotation".to_string(), Value::from(r));
        }
        if let Some(s) = self.scale {
            out.insert("scale".to_string(), Value::from(s));
        }
        if let Some(v) = self.visible {
            out.insert("visible".to_string(), Value::Bool(v));
        }
        if let Some(url) = &self.loaded_url {
            out.insert("loadedUrl".to_string(), Value::Str(url.clone()));
        }
        Value::Object(out)
    }

    /// `base` extended with `Self`; `base` itself is left untouched.
    pub fn evaluator(&self, base: &Evaluator) -> Evaluator {
        base.with_context_value("Self", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_binding_exposes_previous_values() {
        let snapshot = SelfSnapshot {
            position: Some(Vector3::new(1.0, 2.0, 3.0)),
            loaded_url: Some("a.glb".into()),
            ..SelfSnapshot::default()
        };
        let base = Evaluator::default();
        let eval = snapshot.evaluator(&base);
        assert_eq!(eval.evaluate("Self.position.y").unwrap(), Value::Number(2.0));
        assert_eq!(eval.evaluate("Self.loadedUrl").unwrap(), Value::Str("a.glb".into()));
        assert!(base.evaluate("Self").is_err());
    }

    #[test]
    fn unresolved_fields_are_absent() {
        let v = SelfSnapshot::default().to_value();
        assert_eq!(v, Value::Object(BTreeMap::new()));
    }
}
