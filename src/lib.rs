//! Physics Lab - interactive real-time physics simulation widgets
//!
//! Core modules:
//! - `sim`: Simulation interface, integrators, the widget host and the nine simulations
//! - `renderer`: Surface abstraction, Canvas 2D backend and drawing primitives
//! - `particles`: Pooled visual effect particles
//! - `scoring`: Accuracy grading and challenge state reducer
//! - `scheduler`: Frame delta clamping for the host animation loop
//! - `input`: Pointer-to-surface mapping and the click adapter
//! - `audio`: Optional tone and feedback sounds
//! - `platform`: Browser glue (animation frame loop)

pub mod audio;
pub mod error;
pub mod input;
pub mod particles;
pub mod platform;
pub mod renderer;
pub mod scheduler;
pub mod scoring;
pub mod settings;
pub mod sim;

pub use error::{EngineError, Result};
pub use settings::{QualityPreset, Settings};

use glam::DVec2;

/// Engine configuration constants
pub mod consts {
    /// Largest simulated step applied per frame (seconds). Guards against
    /// huge deltas after a backgrounded tab.
    pub const DT_CAP: f64 = 0.05;
    /// Smallest magnitude accepted as a denominator
    pub const EPSILON: f64 = 1e-9;
    /// How long a score popup stays on screen (seconds)
    pub const POPUP_DURATION: f64 = 1.2;
    /// Standard gravity used by the mechanics widgets (m/s²)
    pub const GRAVITY: f64 = 9.81;
}

/// Replace a near-zero denominator with `EPSILON`, keeping its sign.
#[inline]
pub fn guard_denominator(x: f64) -> f64 {
    if !x.is_finite() {
        return consts::EPSILON;
    }
    if x.abs() >= consts::EPSILON {
        x
    } else if x < 0.0 {
        -consts::EPSILON
    } else {
        consts::EPSILON
    }
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f64, theta: f64) -> DVec2 {
    DVec2::new(r * theta.cos(), r * theta.sin())
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_denominator_keeps_sign() {
        assert_eq!(guard_denominator(2.0), 2.0);
        assert_eq!(guard_denominator(0.0), consts::EPSILON);
        assert_eq!(guard_denominator(-1e-12), -consts::EPSILON);
        assert_eq!(guard_denominator(f64::NAN), consts::EPSILON);
    }

    #[test]
    fn test_normalize_angle_range() {
        use std::f64::consts::PI;
        let a = normalize_angle(3.0 * PI);
        assert!((-PI..PI).contains(&a));
        assert!((a.abs() - PI).abs() < 1e-9);
    }
}
