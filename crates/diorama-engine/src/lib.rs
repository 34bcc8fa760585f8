//! Diorama engine crate.
//!
//! The pieces below the scene layer: a drawing-backend port with an
//! in-memory implementation, glTF import, the resource loader and its cache,
//! frame timing and logging setup.

pub mod backend;
pub mod coords;
pub mod glb;
pub mod logging;
pub mod resource;
pub mod time;
