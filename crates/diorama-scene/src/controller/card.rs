use std::rc::Rc;

use diorama_config::{Card2dConfig, Card3dConfig, Expression};
use diorama_engine::backend::{Backend, CardSurface, NodeId, Primitive};
use diorama_expr::{EvaluationError, Value, Vector2};
use glam::Vec2;
use tokio::sync::oneshot::{self, error::TryRecvError};

use super::{apply_transform, apply_visibility, property, TransformExprs};
use crate::card::CardElement;
use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::ControllerError;
use crate::task::CancelToken;

type Delivery = oneshot::Receiver<Option<Box<dyn CardElement>>>;

/// Fields shared by both card kinds.
struct CardExprs<'c> {
    element: &'c Expression,
    config: &'c Expression,
    size: &'c Expression,
    visible: &'c Expression,
    transform: TransformExprs<'c>,
}

/// `card.2d` (billboard) and `card.3d`.
///
/// The element type is evaluated at construction; a different type is a
/// different identity and goes through dispose + create. When the type does
/// not evaluate yet (its state binding is missing), every later pass tries
/// again until it does. Until the factory delivers an element the card is a
/// blank placeholder surface.
pub struct CardController {
    path: String,
    node: NodeId,
    surface: CardSurface,
    element_type: Option<String>,
    element: Option<Box<dyn CardElement>>,
    pending: Option<Delivery>,
    token: CancelToken,
    config_pushed: bool,
    snapshot: SelfSnapshot,
}

impl CardController {
    pub fn new(path: &str, element: &Expression, billboard: bool, ctx: &mut UpdateCtx<'_>) -> Self {
        let surface = CardSurface { size: Vec2::new(400.0, 300.0), billboard, element: None };
        let node = ctx.backend.create(Primitive::Card(surface.clone()));
        let mut card = Self {
            path: path.to_string(),
            node,
            surface,
            element_type: None,
            element: None,
            pending: None,
            token: CancelToken::new(),
            config_pushed: false,
            snapshot: SelfSnapshot::default(),
        };
        if let Err(e) = card.request_element(element, ctx) {
            log::warn!("card {path}: element type unavailable, showing placeholder: {e}");
        }
        card
    }

    /// Evaluates the element type and asks the factory for it.
    fn request_element(&mut self, element: &Expression, ctx: &UpdateCtx<'_>) -> Result<(), EvaluationError> {
        let kind = ctx.evaluator.evaluate_as::<String>(element.as_str())?;
        self.element_type = Some(kind.clone());
        let Some(factory) = ctx.cards else {
            log::debug!("card {}: no card factory, showing placeholder", self.path);
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        let factory = Rc::clone(factory);
        let token = self.token.clone();
        tokio::task::spawn_local(async move {
            let element = factory.create(&kind).await;
            if token.is_cancelled() {
                return;
            }
            let _ = tx.send(element);
        });
        self.pending = Some(rx);
        Ok(())
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn element_type(&self) -> Option<&str> {
        self.element_type.as_deref()
    }

    /// Whether a live element is attached (as opposed to the placeholder).
    pub fn has_element(&self) -> bool {
        self.element.is_some()
    }

    pub fn update_2d(&mut self, config: &Card2dConfig, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        self.update(
            CardExprs {
                element: &config.element,
                config: &config.config,
                size: &config.size,
                visible: &config.visible,
                transform: TransformExprs { position: &config.position, rotation: None, scale: None },
            },
            ctx,
        )
    }

    pub fn update_3d(&mut self, config: &Card3dConfig, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        self.update(
            CardExprs {
                element: &config.element,
                config: &config.config,
                size: &config.size,
                visible: &config.visible,
                transform: TransformExprs {
                    position: &config.position,
                    rotation: Some(&config.rotation),
                    scale: Some(&config.scale),
                },
            },
            ctx,
        )
    }

    fn update(&mut self, exprs: CardExprs<'_>, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        if self.element_type.is_none() {
            match self.request_element(exprs.element, ctx) {
                Ok(()) => log::debug!("card {}: element type resolved on a later pass", self.path),
                Err(e) => log::trace!("card {}: element type still unavailable: {e}", self.path),
            }
        }
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, exprs.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }
        apply_transform(self.node, exprs.transform, &eval, &mut self.snapshot, ctx.backend)?;

        let size: Vector2 = property(&eval, "size", exprs.size)?;
        let size = Vec2::new(size.x as f32, size.y as f32);
        if self.surface.size != size {
            self.surface.size = size;
            ctx.backend.update(self.node, Primitive::Card(self.surface.clone()));
        }

        let Some(element) = self.element.as_mut() else {
            return Ok(());
        };
        if !self.config_pushed {
            let config: Value = property(&eval, "config", exprs.config)?;
            element.set_config(&config);
            self.config_pushed = true;
        }
        element.set_state(ctx.state);
        Ok(())
    }

    pub fn poll(&mut self, backend: &mut dyn Backend) {
        let Some(rx) = self.pending.as_mut() else { return };
        match rx.try_recv() {
            Ok(Some(element)) => {
                self.pending = None;
                self.element = Some(element);
                self.surface.element = self.element_type.clone();
                backend.update(self.node, Primitive::Card(self.surface.clone()));
            }
            Ok(None) => {
                self.pending = None;
                log::debug!(
                    "card: factory has no `{}` element, keeping placeholder",
                    self.element_type.as_deref().unwrap_or_default()
                );
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => self.pending = None,
        }
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        self.token.cancel();
        self.pending = None;
        self.element = None;
        backend.dispose(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardFactory;
    use crate::state::StateSnapshot;
    use crate::testing::Harness;
    use async_trait::async_trait;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[derive(Default)]
    struct Log {
        configs: Vec<Value>,
        states: usize,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl CardElement for Recorder {
        fn set_config(&mut self, config: &Value) {
            self.0.borrow_mut().configs.push(config.clone());
        }
        fn set_state(&mut self, _state: &StateSnapshot) {
            self.0.borrow_mut().states += 1;
        }
    }

    struct Factory(Rc<RefCell<Log>>);

    #[async_trait(?Send)]
    impl CardFactory for Factory {
        async fn create(&self, element: &str) -> Option<Box<dyn CardElement>> {
            (element == "markdown").then(|| Box::new(Recorder(self.0.clone())) as Box<dyn CardElement>)
        }
    }

    fn harness() -> (Harness, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut h = Harness::new();
        h.cards = Some(Rc::new(Factory(log.clone())));
        (h, log)
    }

    fn card(element: &str) -> Card2dConfig {
        Card2dConfig {
            element: Expression::new(element),
            config: Expression::new("{ title: 'Hall' }"),
            ..Card2dConfig::default()
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    // ── element lifecycle ────────────────────────────────────────────────

    #[tokio::test]
    async fn config_once_state_every_pass() {
        LocalSet::new()
            .run_until(async {
                let (mut h, log) = harness();
                let cfg = card("'markdown'");
                let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, true, ctx));
                settle().await;
                c.poll(&mut h.backend);
                assert!(c.has_element());

                for _ in 0..3 {
                    h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
                }
                let log = log.borrow();
                assert_eq!(log.configs.len(), 1);
                assert_eq!(log.configs[0].member("title").unwrap(), Value::Str("Hall".into()));
                assert_eq!(log.states, 3);
            })
            .await;
    }

    #[tokio::test]
    async fn unknown_element_keeps_placeholder() {
        LocalSet::new()
            .run_until(async {
                let (mut h, log) = harness();
                let cfg = card("'gauge'");
                let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, true, ctx));
                settle().await;
                c.poll(&mut h.backend);
                h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
                assert!(!c.has_element());
                assert_eq!(log.borrow().states, 0);
                assert!(matches!(
                    h.backend.primitive(c.node()),
                    Some(Primitive::Card(CardSurface { element: None, .. }))
                ));
            })
            .await;
    }

    #[tokio::test]
    async fn element_type_bound_later_creates_element() {
        LocalSet::new()
            .run_until(async {
                let (mut h, log) = harness();
                let cfg = card("hall.card");
                let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, true, ctx));
                h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
                assert_eq!(c.element_type(), None);

                h.set_state(json!({ "hall": { "card": "markdown" } }));
                h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
                assert_eq!(c.element_type(), Some("markdown"));
                settle().await;
                c.poll(&mut h.backend);
                assert!(c.has_element());

                h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
                assert_eq!(log.borrow().configs.len(), 1);
            })
            .await;
    }

    #[test]
    fn without_factory_card_is_placeholder() {
        let mut h = Harness::new();
        let cfg = card("'markdown'");
        let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, true, ctx));
        h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
        assert_eq!(c.element_type(), Some("markdown"));
        assert!(!c.has_element());
    }

    #[test]
    fn size_and_billboard_reach_the_surface() {
        let mut h = Harness::new();
        let cfg = Card2dConfig { size: Expression::new("new Vector2(200, 100)"), ..card("'markdown'") };
        let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, true, ctx));
        h.with_ctx(|ctx| c.update_2d(&cfg, ctx)).unwrap();
        let Some(Primitive::Card(surface)) = h.backend.primitive(c.node()) else {
            panic!("card node should hold a card surface");
        };
        assert_eq!(surface.size, Vec2::new(200.0, 100.0));
        assert!(surface.billboard);
    }

    #[tokio::test]
    async fn dispose_before_delivery_drops_element() {
        LocalSet::new()
            .run_until(async {
                let (mut h, log) = harness();
                let cfg = card("'markdown'");
                let mut c = h.with_ctx(|ctx| CardController::new("main.c", &cfg.element, false, ctx));
                c.dispose(&mut h.backend);
                settle().await;
                c.poll(&mut h.backend);
                assert!(!c.has_element());
                assert!(log.borrow().configs.is_empty());
                assert_eq!(h.backend.live_count(), 0);
            })
            .await;
    }
}
