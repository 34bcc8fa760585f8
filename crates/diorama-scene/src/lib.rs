//! Diorama scene layer: keeps a backend scene graph in step with a
//! declarative [`Configuration`](diorama_config::Configuration).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use diorama_engine::backend::HeadlessBackend;
//! use diorama_engine::resource::{NoCache, ResourceLoader, SchemeFetcher};
//! use diorama_scene::{StateSnapshot, Visual, VisualConfig};
//! use serde_json::json;
//!
//! let loader = ResourceLoader::new(SchemeFetcher::new("assets"), NoCache);
//! let mut visual = Visual::new(HeadlessBackend::new(), loader, VisualConfig::default());
//! visual
//!     .set_configuration_json(&json!({ "scenes": { "main": { "objects": {
//!         "camera": { "type": "camera.perspective" },
//!         "lamp": { "type": "light.point", "intensity": "lamp.on ? 800 : 0" }
//!     }}}}))
//!     .unwrap();
//! visual.set_state(StateSnapshot::from_json(&json!({ "lamp": { "on": true } })));
//! let outcome = visual.frame();
//! assert_eq!(outcome.scene.as_deref(), Some("main"));
//! ```
//!
//! # Layers
//!
//! - [`Visual`] owns the backend and runs frames
//! - one [`Reconciler`] per scene and per group diffs names against live
//!   controllers
//! - each [`ObjectController`] owns one backend node and evaluates its
//!   property expressions against the state

pub mod card;
pub mod context;
pub mod controller;
pub mod error;
pub mod reconciler;
pub mod state;
pub mod task;
pub mod visual;

#[cfg(test)]
mod testing;

pub use card::{CardElement, CardFactory};
pub use context::{SelfSnapshot, UpdateCtx};
pub use controller::ObjectController;
pub use error::{ControllerError, LoadError, ReconcileError};
pub use reconciler::{ReconcileReport, Reconciler};
pub use state::StateSnapshot;
pub use task::CancelToken;
pub use visual::{FrameOutcome, Visual, VisualConfig};
