//! Error types for the engine's setup and parameter surface.
//!
//! Nothing inside a frame returns these; frame-time failures are clamped or
//! logged instead.

use thiserror::Error;

use crate::sim::Mode;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    #[error("{simulation} does not support {mode:?} mode")]
    UnsupportedMode {
        simulation: &'static str,
        mode: Mode,
    },

    #[error("unknown simulation: {0}")]
    UnknownSimulation(String),

    #[error("degenerate surface size {width}x{height}")]
    DegenerateSurface { width: f64, height: f64 },

    #[error("settings parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("host capability unavailable: {0}")]
    Host(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
