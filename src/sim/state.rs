//! Simulation parameters and clock
//!
//! Every simulation owns one `SimulationState`: an ordered set of named,
//! range-clamped parameters plus the simulated time accumulator.

use crate::error::{EngineError, Result};
use crate::renderer::SurfaceSize;

/// A user-adjustable simulation parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Stable key used by `input[data-param]` sliders
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Param {
    pub fn new(key: &'static str, label: &'static str, unit: &'static str) -> Self {
        Self {
            key,
            label,
            unit,
            value: 0.0,
            min: 0.0,
            max: 1.0,
            step: 0.01,
        }
    }

    /// Builder: set range and initial value (clamped into the range)
    pub fn range(mut self, min: f64, max: f64, value: f64) -> Self {
        self.min = min.min(max);
        self.max = max.max(min);
        self.value = value.clamp(self.min, self.max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Fraction of the range covered by the current value
    pub fn fraction(&self) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            0.0
        } else {
            (self.value - self.min) / span
        }
    }
}

/// Ordered parameter collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.key == key)
    }

    /// Current value of `key`. Keys are fixed per simulation, so an unknown
    /// key reads as 0.
    pub fn value(&self, key: &str) -> f64 {
        self.get(key).map(|p| p.value).unwrap_or(0.0)
    }

    /// Set `key`, clamped to its range. Non-finite input leaves the value
    /// untouched. Returns the value actually stored.
    pub fn set(&mut self, key: &str, value: f64) -> Result<f64> {
        let param = self
            .params
            .iter_mut()
            .find(|p| p.key == key)
            .ok_or_else(|| EngineError::UnknownParam(key.to_string()))?;
        if value.is_finite() {
            param.value = value.clamp(param.min, param.max);
        }
        Ok(param.value)
    }

    /// Move `key` by `steps` slider steps
    pub fn nudge(&mut self, key: &str, steps: f64) -> Result<f64> {
        let (value, step) = self
            .get(key)
            .map(|p| (p.value, p.step))
            .ok_or_else(|| EngineError::UnknownParam(key.to_string()))?;
        self.set(key, value + step * steps)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Default layout size before the first draw
pub const DEFAULT_VIEWPORT: SurfaceSize = SurfaceSize {
    width: 800.0,
    height: 450.0,
    dpr: 1.0,
};

/// Parameters, clock and layout size for one simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub params: ParamSet,
    /// Simulated seconds since the last reset
    pub sim_time: f64,
    /// Seed the simulation was created with
    pub seed: u64,
    /// Most recent surface size; the widget refreshes it before each step
    /// and click so event positions match the drawn layout
    pub viewport: SurfaceSize,
}

impl SimulationState {
    pub fn new(params: Vec<Param>, seed: u64) -> Self {
        Self {
            params: ParamSet::new(params),
            sim_time: 0.0,
            seed,
            viewport: DEFAULT_VIEWPORT,
        }
    }

    /// Advance the clock. Negative or non-finite steps are ignored.
    pub fn advance(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.sim_time += dt;
        }
    }

    pub fn reset_time(&mut self) {
        self.sim_time = 0.0;
    }

    pub fn value(&self, key: &str) -> f64 {
        self.params.value(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SimulationState {
        SimulationState::new(
            vec![
                Param::new("k", "Spring constant", "N/m").range(1.0, 50.0, 10.0).step(0.5),
                Param::new("m", "Mass", "kg").range(0.1, 5.0, 1.0),
            ],
            7,
        )
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut s = state();
        assert_eq!(s.params.set("k", 500.0).unwrap(), 50.0);
        assert_eq!(s.params.set("k", -3.0).unwrap(), 1.0);
        assert_eq!(s.value("k"), 1.0);
    }

    #[test]
    fn test_unknown_param_is_error() {
        let mut s = state();
        assert!(matches!(
            s.params.set("nope", 1.0),
            Err(EngineError::UnknownParam(k)) if k == "nope"
        ));
    }

    #[test]
    fn test_non_finite_is_ignored() {
        let mut s = state();
        assert_eq!(s.params.set("m", f64::NAN).unwrap(), 1.0);
    }

    #[test]
    fn test_nudge_uses_step() {
        let mut s = state();
        assert_eq!(s.params.nudge("k", 2.0).unwrap(), 11.0);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut s = state();
        s.advance(0.1);
        s.advance(-1.0);
        s.advance(f64::INFINITY);
        assert!((s.sim_time - 0.1).abs() < 1e-12);
        s.reset_time();
        assert_eq!(s.sim_time, 0.0);
    }

    #[test]
    fn test_params_keep_order() {
        let s = state();
        let keys: Vec<_> = s.params.iter().map(|p| p.key).collect();
        assert_eq!(keys, ["k", "m"]);
    }
}
