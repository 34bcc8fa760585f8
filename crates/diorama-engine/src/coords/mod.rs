//! Coordinate, color and transform primitives shared with the drawing backend.

mod color;
mod transform;
mod viewport;

pub use color::ColorRgba;
pub use transform::Transform;
pub use viewport::Viewport;
