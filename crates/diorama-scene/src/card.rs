//! Card element port.
//!
//! A card shows an embedded UI element (a markdown panel, a gauge, ...)
//! inside the 3D scene. The host supplies a [`CardFactory`]; without one, or
//! when the factory does not know the element type, the card stays a
//! placeholder surface.

use async_trait::async_trait;
use diorama_expr::Value;

use crate::state::StateSnapshot;

/// A live embedded element.
pub trait CardElement {
    /// Called exactly once, as soon as the element exists.
    fn set_config(&mut self, config: &Value);

    /// Called on every reconciliation pass after the configuration.
    fn set_state(&mut self, state: &StateSnapshot);
}

#[async_trait(?Send)]
pub trait CardFactory {
    /// Builds an element of the given type, or `None` if the type is unknown.
    async fn create(&self, element: &str) -> Option<Box<dyn CardElement>>;
}
