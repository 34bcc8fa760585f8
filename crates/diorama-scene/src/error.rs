use diorama_config::ObjectTag;
use diorama_engine::glb::GlbError;
use diorama_engine::resource::ResourceError;
use diorama_expr::EvaluationError;

/// Why one object failed to update.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A property expression failed to evaluate. The property keeps whatever
    /// value it had before the failing pass.
    #[error("property `{property}` could not be evaluated")]
    Property {
        property: &'static str,
        #[source]
        source: EvaluationError,
    },
    /// The controller was handed a configuration of another kind.
    #[error("a {controller} controller cannot take a `{tag}` configuration")]
    Mismatch { controller: &'static str, tag: ObjectTag },
}

/// An object failed to update during reconciliation; its siblings are not
/// affected.
#[derive(Debug, thiserror::Error)]
#[error("object `{path}` failed to update")]
pub struct ReconcileError {
    /// Dotted path from the scene name, e.g. `main.room.lamp`.
    pub path: String,
    #[source]
    pub source: ControllerError,
}

/// Why a model or custom-light load produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("resource could not be loaded")]
    Resource(#[from] ResourceError),
    #[error("resource is not a usable GLB")]
    Glb(#[from] GlbError),
}
