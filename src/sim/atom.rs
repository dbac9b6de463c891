//! Bohr hydrogen atom
//!
//! The electron sits on one of six quantized levels. Transitions snap the
//! level immediately; only the drawn orbit eases between radii.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint};
use crate::audio::SoundEffect;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_info_panel, format_value, wavelength_color};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};
use crate::{guard_denominator, lerp};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Challenge];

pub const RYDBERG_EV: f64 = 13.6;
/// h·c in eV·nm
pub const HC_EV_NM: f64 = 1239.84;
pub const MAX_LEVEL: u8 = 6;
/// Duration of the drawn orbit transition (seconds)
pub const TRANSITION_SECS: f64 = 0.35;
pub const WAVELENGTH_TOLERANCE_NM: f64 = 100.0;
const PHOTON_LIFETIME: f64 = 1.5;
/// Max vertical distance from a level row that still selects it (px)
const ROW_HIT_PX: f64 = 12.0;

/// Energy of level `n` in eV
pub fn level_energy(n: u8) -> f64 {
    let n = f64::from(n.max(1));
    -RYDBERG_EV / (n * n)
}

/// Photon wavelength in nm for a transition between two levels
pub fn transition_wavelength(from: u8, to: u8) -> f64 {
    let delta = (level_energy(from) - level_energy(to)).abs();
    HC_EV_NM / guard_denominator(delta)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photon {
    pub wavelength: f64,
    pub emitted: bool,
    pub age: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    from: u8,
    started: f64,
}

struct Layout {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    nucleus: DVec2,
    orbit_unit: f64,
}

impl Layout {
    fn new(size: SurfaceSize) -> Self {
        Self {
            left: size.width * 0.08,
            right: size.width * 0.5,
            top: size.height * 0.12,
            bottom: size.height * 0.85,
            nucleus: DVec2::new(size.width * 0.76, size.height * 0.48),
            orbit_unit: (size.height * 0.065).min(size.width * 0.035),
        }
    }

    /// Row height in 1/n so the upper levels stay clickable
    fn level_y(&self, n: f64) -> f64 {
        self.bottom - (self.bottom - self.top) * (1.0 - 1.0 / n.max(1.0))
    }

    fn level_at(&self, point: DVec2) -> Option<u8> {
        if point.x < self.left || point.x > self.right {
            return None;
        }
        (1..=MAX_LEVEL)
            .map(|n| (n, (self.level_y(f64::from(n)) - point.y).abs()))
            .filter(|(_, d)| *d <= ROW_HIT_PX)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }
}

pub struct AtomSim {
    state: SimulationState,
    mode: Mode,
    level: u8,
    transition: Option<Transition>,
    photons: Vec<Photon>,
    rng: Pcg32,
    /// Challenge target wavelength (nm), always a reachable emission line
    target: f64,
}

impl AtomSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("decay_rate", "Spontaneous decay", "1/s").range(0.0, 2.0, 0.0).step(0.05),
            ],
            seed,
        );
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            level: 1,
            transition: None,
            photons: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            target: 0.0,
        };
        sim.new_target();
        sim
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    fn new_target(&mut self) {
        let upper = self.rng.random_range(2..=MAX_LEVEL);
        let lower = self.rng.random_range(1..upper);
        self.target = transition_wavelength(upper, lower);
    }

    /// Electron orbit level as drawn, easing toward the current level
    fn visual_level(&self) -> f64 {
        let current = f64::from(self.level);
        match self.transition {
            Some(tr) => {
                let p = ((self.state.sim_time - tr.started) / TRANSITION_SECS).clamp(0.0, 1.0);
                let eased = p * p * (3.0 - 2.0 * p);
                lerp(f64::from(tr.from), current, eased)
            }
            None => current,
        }
    }

    /// Jump to level `to`, emitting or absorbing a photon
    pub fn transition_to(&mut self, to: u8, events: &mut Vec<SimEvent>) {
        let to = to.clamp(1, MAX_LEVEL);
        if to == self.level {
            return;
        }
        let from = self.level;
        let wavelength = transition_wavelength(from, to);
        let emitted = to < from;
        self.level = to;
        self.transition = Some(Transition {
            from,
            started: self.state.sim_time,
        });
        self.photons.push(Photon {
            wavelength,
            emitted,
            age: 0.0,
        });
        log::debug!("atom transition n={from} -> n={to}, λ = {wavelength:.1} nm");

        let layout = Layout::new(self.state.viewport);
        let electron = layout.nucleus + DVec2::new(layout.orbit_unit * f64::from(to), 0.0);
        events.push(SimEvent::Burst {
            kind: ParticleKind::Glow,
            at: electron,
            count: 8,
            color: wavelength_color(wavelength, 1.0),
        });
        events.push(SimEvent::Sound(if emitted {
            SoundEffect::Emit
        } else {
            SoundEffect::Absorb
        }));
        if emitted && self.mode == Mode::Challenge {
            events.push(SimEvent::Graded {
                value: wavelength,
                target: self.target,
                tolerance: WAVELENGTH_TOLERANCE_NM,
                at: electron - DVec2::new(0.0, 30.0),
            });
            self.new_target();
        }
    }
}

impl Simulation for AtomSim {
    fn name(&self) -> &'static str {
        "atom"
    }

    fn supported_modes(&self) -> &'static [Mode] {
        MODES
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if mode == Mode::Challenge {
            self.new_target();
        }
        self.reset();
    }

    fn state(&self) -> &SimulationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.state.reset_time();
        self.level = 1;
        self.transition = None;
        self.photons.clear();
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        self.state.advance(dt);
        for photon in &mut self.photons {
            photon.age += dt;
        }
        self.photons.retain(|p| p.age < PHOTON_LIFETIME);
        if self
            .transition
            .is_some_and(|tr| self.state.sim_time - tr.started >= TRANSITION_SECS)
        {
            self.transition = None;
        }

        // Spontaneous decay stays off in challenges so only user jumps are graded
        let rate = self.state.value("decay_rate");
        if self.mode == Mode::Sandbox && rate > 0.0 && self.level > 1 && self.transition.is_none() {
            let p = 1.0 - (-rate * dt).exp();
            if self.rng.random_bool(p.clamp(0.0, 1.0)) {
                let to = self.rng.random_range(1..self.level);
                self.transition_to(to, events);
            }
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = Layout::new(size);
        match layer {
            Layer::Background => {
                for n in 1..=MAX_LEVEL {
                    surface.stroke_circle(
                        layout.nucleus,
                        layout.orbit_unit * f64::from(n),
                        palette::GRID,
                        1.0,
                    );
                }
            }
            Layer::Overlays => {
                for n in 1..=MAX_LEVEL {
                    let y = layout.level_y(f64::from(n));
                    let color = if n == self.level { palette::ACCENT } else { palette::TRACK };
                    surface.line(DVec2::new(layout.left, y), DVec2::new(layout.right, y), color, 2.0);
                }
            }
            Layer::Bodies => {
                surface.fill_circle(layout.nucleus, 7.0, palette::WARM);
                let level = self.visual_level();
                let angle = if frame.reduced_motion {
                    0.0
                } else {
                    self.state.sim_time * 3.0 / level.powf(1.5)
                };
                let electron =
                    layout.nucleus + crate::polar_to_cartesian(layout.orbit_unit * level, angle);
                surface.fill_circle(electron, 5.0, palette::ACCENT);
                let row = DVec2::new(
                    lerp(layout.left, layout.right, 0.5),
                    layout.level_y(level),
                );
                surface.fill_circle(row, 5.0, palette::ACCENT);

                for photon in &self.photons {
                    let color = wavelength_color(photon.wavelength, (1.0 - photon.age / PHOTON_LIFETIME) as f32);
                    let dir = if photon.emitted { 1.0 } else { -1.0 };
                    let travel = photon.age / PHOTON_LIFETIME * size.width * 0.2;
                    let start = layout.nucleus
                        + DVec2::new(layout.orbit_unit * f64::from(MAX_LEVEL) * 0.5 + dir * travel, -40.0);
                    // Wiggle period scales with wavelength
                    let period = (photon.wavelength / 40.0).clamp(4.0, 40.0);
                    let points: Vec<DVec2> = (0..=30)
                        .map(|i| {
                            let x = f64::from(i) * 2.0;
                            start + DVec2::new(x, 5.0 * (x / period * std::f64::consts::TAU).sin())
                        })
                        .collect();
                    surface.polyline(&points, color, 2.0);
                }
            }
            Layer::Annotations => {
                let style = TextStyle::new(11.0, palette::TEXT_DIM).right();
                for n in 1..=MAX_LEVEL {
                    let y = layout.level_y(f64::from(n));
                    surface.text(
                        &format!("n={n}  {} eV", format_value(level_energy(n))),
                        DVec2::new(layout.left - 6.0, y - 6.0),
                        style,
                    );
                }
                if let Some(photon) = self.photons.last() {
                    surface.text(
                        &format!("λ = {} nm", format_value(photon.wavelength)),
                        layout.nucleus + DVec2::new(0.0, -layout.orbit_unit * f64::from(MAX_LEVEL) - 14.0),
                        TextStyle::new(13.0, wavelength_color(photon.wavelength, 1.0)).centered(),
                    );
                }
            }
            Layer::Panels => {
                let mut rows = vec![
                    ("n", self.level.to_string()),
                    ("E", format!("{} eV", format_value(level_energy(self.level)))),
                ];
                if self.mode == Mode::Challenge {
                    rows.push(("emit", format!("{} nm", format_value(self.target))));
                }
                draw_info_panel(
                    surface,
                    DVec2::new(size.width - 170.0, 12.0),
                    "Hydrogen",
                    &rows,
                    frame.high_contrast,
                );
                if self.mode == Mode::Challenge {
                    let swatch = DVec2::new(size.width - 40.0, 18.0);
                    surface.fill_rect(swatch, DVec2::splat(18.0), with_alpha(wavelength_color(self.target, 1.0), 0.9));
                    draw_hint(surface, "Emit a photon of the target wavelength");
                } else {
                    draw_hint(surface, "Click a level to jump");
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        if let Some(n) = Layout::new(size).level_at(point) {
            self.transition_to(n, events);
        }
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        match key {
            Key::Up => self.transition_to(self.level.saturating_add(1), events),
            Key::Down => self.transition_to(self.level.saturating_sub(1), events),
            Key::Char(c) => {
                if let Some(n) = c.to_digit(10) {
                    self.transition_to(n as u8, events);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_energies() {
        assert!((level_energy(1) + 13.6).abs() < 1e-12);
        assert!((level_energy(2) + 3.4).abs() < 1e-12);
        assert!(level_energy(6) > level_energy(5));
    }

    #[test]
    fn test_balmer_alpha() {
        let l = transition_wavelength(3, 2);
        assert!((l - 656.3).abs() < 1.0, "got {l}");
        assert_eq!(l, transition_wavelength(2, 3));
    }

    #[test]
    fn test_click_level_snaps() {
        let mut s = AtomSim::new(1);
        let size = s.state.viewport;
        let layout = Layout::new(size);
        let mut events = Vec::new();
        let point = DVec2::new((layout.left + layout.right) * 0.5, layout.level_y(3.0));
        s.handle_click(point, size, &mut events);
        assert_eq!(s.level(), 3);
        assert!(events.contains(&SimEvent::Sound(SoundEffect::Absorb)));
        // Visual still mid-transition right after the jump
        assert!((s.visual_level() - 1.0).abs() < 1e-9);
        for _ in 0..30 {
            s.step(1.0 / 60.0, &mut events);
        }
        assert_eq!(s.visual_level(), 3.0);
    }

    #[test]
    fn test_click_off_rows_ignored() {
        let mut s = AtomSim::new(1);
        let size = s.state.viewport;
        let mut events = Vec::new();
        s.handle_click(DVec2::new(size.width * 0.9, size.height * 0.9), size, &mut events);
        assert_eq!(s.level(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn test_challenge_grades_emission_only() {
        let mut s = AtomSim::new(9);
        s.set_mode(Mode::Challenge);
        let target = s.target();
        assert!(target > 90.0 && target < 8000.0);
        let mut events = Vec::new();
        s.transition_to(4, &mut events);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::Graded { .. })));
        s.transition_to(2, &mut events);
        let graded: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Graded { value, target: t, tolerance, .. } => Some((*value, *t, *tolerance)),
                _ => None,
            })
            .collect();
        assert_eq!(graded.len(), 1);
        assert!((graded[0].0 - transition_wavelength(4, 2)).abs() < 1e-9);
        assert_eq!(graded[0].1, target);
        assert_eq!(graded[0].2, WAVELENGTH_TOLERANCE_NM);
    }

    #[test]
    fn test_spontaneous_decay_reaches_ground() {
        let mut s = AtomSim::new(3);
        s.state.params.set("decay_rate", 2.0).unwrap();
        let mut events = Vec::new();
        s.transition_to(6, &mut events);
        for _ in 0..6000 {
            s.step(1.0 / 60.0, &mut events);
        }
        assert_eq!(s.level(), 1);
        assert!(events.contains(&SimEvent::Sound(SoundEffect::Emit)));
    }
}
