use diorama_config::GroupConfig;
use diorama_engine::backend::{Backend, NodeId, Primitive};

use super::{apply_transform, apply_visibility, TransformExprs};
use crate::context::{SelfSnapshot, UpdateCtx};
use crate::error::ControllerError;
use crate::reconciler::Reconciler;

/// `group`: a transform node reconciling its own named children.
///
/// Children are reconciled on every pass, also while the group is hidden or
/// its own transform fails to evaluate.
pub struct GroupController {
    node: NodeId,
    children: Reconciler,
    snapshot: SelfSnapshot,
}

impl GroupController {
    pub fn new(path: &str, backend: &mut dyn Backend) -> Self {
        let node = backend.create(Primitive::Group);
        Self { node, children: Reconciler::new(node, path), snapshot: SelfSnapshot::default() }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn snapshot(&self) -> &SelfSnapshot {
        &self.snapshot
    }

    pub fn children(&self) -> &Reconciler {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Reconciler {
        &mut self.children
    }

    pub fn update(&mut self, config: &GroupConfig, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        let own = self.update_own(config, ctx);
        self.children.reconcile(&config.children, ctx);
        own
    }

    fn update_own(&mut self, config: &GroupConfig, ctx: &mut UpdateCtx<'_>) -> Result<(), ControllerError> {
        let t = &config.transform;
        let eval = self.snapshot.evaluator(ctx.evaluator);
        if !apply_visibility(self.node, &t.visible, &eval, &mut self.snapshot, ctx.backend)? {
            return Ok(());
        }
        let exprs = TransformExprs {
            position: &t.position,
            rotation: Some(&t.rotation),
            scale: Some(&t.scale),
        };
        apply_transform(self.node, exprs, &eval, &mut self.snapshot, ctx.backend)
    }

    pub fn poll(&mut self, backend: &mut dyn Backend) {
        self.children.poll(backend);
    }

    pub fn dispose(&mut self, backend: &mut dyn Backend) {
        self.children.dispose_all(backend);
        backend.dispose(self.node);
    }
}
