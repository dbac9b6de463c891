//! Browser glue
//!
//! The simulation core never touches the host directly. On wasm this module
//! provides the animation frame loop the host binary drives widgets with.

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::AnimationLoop;
