//! Simulations
//!
//! Each simulation hand-codes its own equations of motion behind the
//! `Simulation` trait. The `Widget` host drives one simulation per canvas:
//! - Physics never reads rendering state; draw calls never mutate physics
//! - Randomness comes from a seeded `Pcg32` only
//! - Grading is reported as `SimEvent::Graded` and folded into the
//!   challenge state by the host

pub mod atom;
pub mod gyroscope;
pub mod integrator;
pub mod kinematics;
pub mod projectile;
pub mod relativity;
pub mod spring;
pub mod state;
pub mod taxonomy;
pub mod thermo;
pub mod waves;
pub mod widget;

pub use integrator::{IntegratorState, verlet_step};
pub use state::{Param, ParamSet, SimulationState};
pub use widget::Widget;

use glam::DVec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::audio::{SoundEffect, ToneCue};
use crate::error::{EngineError, Result};
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::{Layer, Rgba, Surface, SurfaceSize, TextStyle, palette};

/// Interaction modes a simulation may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Free exploration
    Sandbox,
    /// Click to apply impulses
    Push,
    /// Driven oscillation
    Resonance,
    /// Place a marker where the body will stop
    Prediction,
    /// Match a hidden target
    Challenge,
    /// Multiple-choice question
    Quiz,
    /// Keep an unstable system upright
    Stabilize,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Sandbox,
        Mode::Push,
        Mode::Resonance,
        Mode::Prediction,
        Mode::Challenge,
        Mode::Quiz,
        Mode::Stabilize,
    ];

    /// Modes that run a scored challenge
    pub fn is_scored(&self) -> bool {
        matches!(
            self,
            Mode::Prediction | Mode::Challenge | Mode::Quiz | Mode::Stabilize
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Sandbox => "sandbox",
            Mode::Push => "push",
            Mode::Resonance => "resonance",
            Mode::Prediction => "prediction",
            Mode::Challenge => "challenge",
            Mode::Quiz => "quiz",
            Mode::Stabilize => "stabilize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a simulation wants the host to do after a step or input
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Spawn a particle burst (count is scaled by quality settings)
    Burst {
        kind: ParticleKind,
        at: DVec2,
        count: usize,
        color: Rgba,
    },
    /// A challenge attempt to grade
    Graded {
        value: f64,
        target: f64,
        tolerance: f64,
        /// Where the score popup appears
        at: DVec2,
    },
    Sound(SoundEffect),
    /// A body was clamped at a boundary (reported once per excursion)
    OutOfBounds { at: DVec2 },
}

/// Per-frame rendering context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Widget clock (seconds), drives purely visual animation
    pub time: f64,
    pub reduced_motion: bool,
    pub high_contrast: bool,
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self {
            time: 0.0,
            reduced_motion: false,
            high_contrast: false,
        }
    }
}

/// A self-contained interactive simulation
pub trait Simulation {
    /// Registry name, also used in `canvas[data-sim]`
    fn name(&self) -> &'static str;

    fn supported_modes(&self) -> &'static [Mode];

    fn mode(&self) -> Mode;

    /// Switch mode. Callers go through `switch_mode`, which rejects
    /// unsupported modes first.
    fn set_mode(&mut self, mode: Mode);

    fn state(&self) -> &SimulationState;

    fn state_mut(&mut self) -> &mut SimulationState;

    /// Restore initial conditions for the current mode
    fn reset(&mut self);

    /// Advance physics by `dt` seconds
    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>);

    /// Paint one layer
    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer);

    /// Pointer click (or drag sample) in surface CSS pixels
    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>);

    fn handle_key(&mut self, _key: Key, _events: &mut Vec<SimEvent>) {}

    /// Called after a parameter changed through the host
    fn on_param_changed(&mut self, _key: &str) {}

    /// Continuous tone following the simulation, if any
    fn audio_cue(&self) -> Option<ToneCue> {
        None
    }

    /// Total mechanical energy, for diagnostics
    fn energy(&self) -> Option<f64> {
        None
    }

    fn supports(&self, mode: Mode) -> bool {
        self.supported_modes().contains(&mode)
    }

    /// Validated mode switch
    fn switch_mode(&mut self, mode: Mode) -> Result<()> {
        if !self.supports(mode) {
            return Err(EngineError::UnsupportedMode {
                simulation: self.name(),
                mode,
            });
        }
        self.set_mode(mode);
        Ok(())
    }
}

/// Names accepted by `create`, in display order
pub const SIMULATIONS: [&str; 9] = [
    "spring",
    "projectile",
    "kinematics",
    "thermo",
    "waves",
    "atom",
    "gyroscope",
    "taxonomy",
    "relativity",
];

/// Build a simulation by registry name
pub fn create(name: &str, seed: u64) -> Result<Box<dyn Simulation>> {
    let sim: Box<dyn Simulation> = match name.trim().to_ascii_lowercase().as_str() {
        "spring" => Box::new(spring::SpringSim::new(seed)),
        "projectile" => Box::new(projectile::ProjectileSim::new(seed)),
        "kinematics" => Box::new(kinematics::KinematicsSim::new(seed)),
        "thermo" => Box::new(thermo::ThermoSim::new(seed)),
        "waves" => Box::new(waves::WavesSim::new(seed)),
        "atom" => Box::new(atom::AtomSim::new(seed)),
        "gyroscope" => Box::new(gyroscope::GyroscopeSim::new(seed)),
        "taxonomy" => Box::new(taxonomy::TaxonomySim::new(seed)),
        "relativity" => Box::new(relativity::RelativitySim::new(seed)),
        _ => return Err(EngineError::UnknownSimulation(name.to_string())),
    };
    Ok(sim)
}

/// Draw a fresh hidden challenge target in `[min, max)`
pub(crate) fn hidden_target(rng: &mut Pcg32, min: f64, max: f64) -> f64 {
    if max - min <= f64::EPSILON {
        min
    } else {
        rng.random_range(min..max)
    }
}

/// Clickable rectangle drawn in the panels layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Button {
    pub pos: DVec2,
    pub size: DVec2,
}

impl Button {
    /// Button anchored at the bottom-right corner of the surface
    pub fn bottom_right(size: SurfaceSize) -> Self {
        let button = DVec2::new(110.0, 30.0);
        Self {
            pos: DVec2::new(size.width - button.x - 12.0, size.height - button.y - 30.0),
            size: button,
        }
    }

    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.pos.x
            && point.x <= self.pos.x + self.size.x
            && point.y >= self.pos.y
            && point.y <= self.pos.y + self.size.y
    }

    pub fn center(&self) -> DVec2 {
        self.pos + self.size * 0.5
    }

    pub fn draw(&self, surface: &mut dyn Surface, label: &str) {
        surface.fill_rect(self.pos, self.size, palette::PANEL);
        surface.stroke_rect(self.pos, self.size, palette::GOLD, 1.5);
        surface.text(
            label,
            self.center(),
            TextStyle::new(13.0, palette::GOLD).centered().bold(),
        );
    }
}

/// One-line instruction at the bottom of the surface
pub(crate) fn draw_hint(surface: &mut dyn Surface, text: &str) {
    let size = surface.size();
    surface.text(
        text,
        DVec2::new(size.width * 0.5, size.height - 14.0),
        TextStyle::new(12.0, palette::TEXT_DIM).centered(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_modes() {
        let scored: Vec<_> = Mode::ALL.into_iter().filter(|m| m.is_scored()).collect();
        assert_eq!(
            scored,
            [Mode::Prediction, Mode::Challenge, Mode::Quiz, Mode::Stabilize]
        );
    }

    #[test]
    fn test_mode_parse() {
        for mode in Mode::ALL {
            assert_eq!(Mode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(Mode::parse(" Challenge "), Some(Mode::Challenge));
        assert_eq!(Mode::parse("arcade"), None);
    }

    #[test]
    fn test_registry_builds_every_simulation() {
        for name in SIMULATIONS {
            let sim = create(name, 42).unwrap();
            assert_eq!(sim.name(), name);
            assert!(sim.supports(Mode::Sandbox));
            assert_eq!(sim.mode(), Mode::Sandbox);
        }
    }

    #[test]
    fn test_unknown_simulation() {
        assert!(matches!(
            create("pendulum", 1),
            Err(EngineError::UnknownSimulation(_))
        ));
    }

    #[test]
    fn test_switch_mode_rejects_unsupported() {
        let mut sim = create("thermo", 1).unwrap();
        let err = sim.switch_mode(Mode::Stabilize).unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnsupportedMode { simulation: "thermo", mode: Mode::Stabilize }
        ));
        assert_eq!(sim.mode(), Mode::Sandbox);
    }

    #[test]
    fn test_every_simulation_survives_a_second() {
        for name in SIMULATIONS {
            let mut sim = create(name, 9).unwrap();
            let mut events = Vec::new();
            for _ in 0..60 {
                sim.step(1.0 / 60.0, &mut events);
            }
            assert!(sim.state().sim_time > 0.99, "{name}");
            if let Some(e) = sim.energy() {
                assert!(e.is_finite(), "{name}");
            }
        }
    }
}
