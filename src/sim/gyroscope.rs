//! Heavy symmetric top
//!
//! Euler angles θ (tilt from vertical) and φ (precession). With ψ cyclic,
//! ω₃ and p_φ = I₁·φ̇·sin²θ + I₃·ω₃·cosθ are conserved, leaving
//!
//! ```text
//! φ̇ = (p_φ − I₃·ω₃·cosθ) / (I₁·sin²θ)
//! θ̈ = (I₁·φ̇²·sinθ·cosθ − I₃·ω₃·φ̇·sinθ + M·g·l·sinθ) / I₁
//! ```
//!
//! θ is advanced with velocity-Verlet on fixed substeps. Random nudges and
//! spin friction are applied between substeps and re-derive p_φ.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::{
    Button, FrameInfo, IntegratorState, Mode, Param, SimEvent, Simulation, SimulationState,
    draw_hint, verlet_step,
};
use crate::audio::{SoundEffect, ToneCue};
use crate::consts::GRAVITY;
use crate::guard_denominator;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_info_panel, draw_meter, energy_color, format_value};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Stabilize];

/// Fixed integration substep (seconds)
pub const SUBSTEP: f64 = 1.0 / 240.0;
/// Tilt at which the top has fallen (radians)
pub const MAX_TILT: f64 = 85.0 * std::f64::consts::PI / 180.0;
/// Keeps sin θ away from zero in φ̇
const MIN_TILT: f64 = 1e-3;
/// Tilt-rate kick per unit noise, scaled by √dt (rad/s)
const NUDGE_SCALE: f64 = 0.6;
/// Tilt-rate change per corrective click (rad/s)
pub const CORRECTION_IMPULSE: f64 = 0.8;
/// Extra noise floor while stabilizing
const STABILIZE_NOISE: f64 = 0.6;
pub const ROUND_SECS: f64 = 10.0;
/// Mean deviation (degrees) that scores nothing
pub const STABILIZE_TOLERANCE_DEG: f64 = 30.0;

/// Rigid body constants derived from the parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopBody {
    /// Transverse moment about the pivot
    pub i1: f64,
    /// Spin-axis moment
    pub i3: f64,
    /// M·g·l
    pub mgl: f64,
}

impl TopBody {
    /// Thin disk of `mass` and `radius` on an arm of length `arm`
    pub fn disk(mass: f64, radius: f64, arm: f64) -> Self {
        Self {
            i1: 0.25 * mass * radius * radius + mass * arm * arm,
            i3: 0.5 * mass * radius * radius,
            mgl: mass * GRAVITY * arm,
        }
    }

    pub fn precession_rate(&self, theta: f64, p_phi: f64, omega3: f64) -> f64 {
        let s = theta.sin();
        (p_phi - self.i3 * omega3 * theta.cos()) / guard_denominator(self.i1 * s * s)
    }

    pub fn tilt_accel(&self, theta: f64, p_phi: f64, omega3: f64) -> f64 {
        let phi_dot = self.precession_rate(theta, p_phi, omega3);
        let (s, c) = theta.sin_cos();
        (self.i1 * phi_dot * phi_dot * s * c - self.i3 * omega3 * phi_dot * s + self.mgl * s)
            / guard_denominator(self.i1)
    }

    pub fn p_phi(&self, theta: f64, phi_dot: f64, omega3: f64) -> f64 {
        let s = theta.sin();
        self.i1 * phi_dot * s * s + self.i3 * omega3 * theta.cos()
    }

    pub fn energy(&self, theta: f64, theta_dot: f64, p_phi: f64, omega3: f64) -> f64 {
        let phi_dot = self.precession_rate(theta, p_phi, omega3);
        let s = theta.sin();
        0.5 * self.i1 * (theta_dot * theta_dot + phi_dot * phi_dot * s * s)
            + 0.5 * self.i3 * omega3 * omega3
            + self.mgl * theta.cos()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Round {
    elapsed: f64,
    /// ∫|θ| dt in degrees·s
    deviation: f64,
}

struct Layout {
    pivot: DVec2,
    arm: f64,
}

impl Layout {
    fn new(size: SurfaceSize) -> Self {
        Self {
            pivot: DVec2::new(size.width * 0.4, size.height * 0.78),
            arm: size.height * 0.5,
        }
    }

    /// Side view of the spin axis tip
    fn tip(&self, theta: f64, phi: f64) -> DVec2 {
        self.pivot + DVec2::new(theta.sin() * phi.cos(), -theta.cos()) * self.arm
    }
}

pub struct GyroscopeSim {
    state: SimulationState,
    mode: Mode,
    body: TopBody,
    theta: IntegratorState<1>,
    phi: f64,
    p_phi: f64,
    omega3: f64,
    fallen: bool,
    round: Round,
    rng: Pcg32,
}

impl GyroscopeSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("spin", "Spin rate", "rad/s").range(20.0, 300.0, 150.0).step(5.0),
                Param::new("mass", "Mass", "kg").range(0.1, 2.0, 0.5).step(0.05),
                Param::new("arm", "Pivot distance", "m").range(0.02, 0.2, 0.08).step(0.005),
                Param::new("radius", "Disk radius", "m").range(0.02, 0.1, 0.05).step(0.005),
                Param::new("tilt", "Initial tilt", "°").range(5.0, 80.0, 25.0).step(1.0),
                Param::new("noise", "Perturbation", "").range(0.0, 1.0, 0.2).step(0.05),
                Param::new("friction", "Spin friction", "1/s").range(0.0, 0.5, 0.02).step(0.01),
            ],
            seed,
        );
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            body: TopBody::disk(0.5, 0.05, 0.08),
            theta: IntegratorState::default(),
            phi: 0.0,
            p_phi: 0.0,
            omega3: 0.0,
            fallen: false,
            round: Round::default(),
            rng: Pcg32::seed_from_u64(seed),
        };
        sim.reset();
        sim
    }

    pub fn tilt(&self) -> f64 {
        self.theta.q[0]
    }

    pub fn tilt_rate(&self) -> f64 {
        self.theta.v[0]
    }

    pub fn spin(&self) -> f64 {
        self.omega3
    }

    pub fn is_fallen(&self) -> bool {
        self.fallen
    }

    pub fn precession_rate(&self) -> f64 {
        self.body.precession_rate(self.tilt(), self.p_phi, self.omega3)
    }

    fn substep(&mut self, h: f64) {
        let body = self.body;
        let (p_phi, omega3) = (self.p_phi, self.omega3);
        let t = self.state.sim_time;
        let before = self.precession_rate();
        verlet_step(&mut self.theta, t, h, |q, _, _| [body.tilt_accel(q[0], p_phi, omega3)]);
        self.phi = (self.phi + 0.5 * (before + self.precession_rate()) * h) % std::f64::consts::TAU;
    }

    /// Random tilt-rate kick plus spin decay; keeps φ̇ continuous
    fn perturb(&mut self, h: f64) {
        let phi_dot = self.precession_rate();
        let mut noise = self.state.value("noise");
        if self.mode == Mode::Stabilize {
            noise = noise.max(STABILIZE_NOISE);
        }
        if noise > 0.0 {
            let kick: f64 = self.rng.random_range(-1.0..1.0);
            self.theta.v[0] += kick * noise * NUDGE_SCALE * h.sqrt();
        }
        let friction = self.state.value("friction");
        if friction > 0.0 {
            self.omega3 *= (-friction * h).exp();
            self.p_phi = self.body.p_phi(self.tilt(), phi_dot, self.omega3);
        }
    }

    fn clamp_tilt(&mut self, events: &mut Vec<SimEvent>) {
        let theta = &mut self.theta;
        if theta.q[0] < MIN_TILT {
            theta.q[0] = MIN_TILT;
            theta.v[0] = theta.v[0].abs();
        }
        if theta.q[0] >= MAX_TILT {
            theta.q[0] = MAX_TILT;
            theta.v[0] = 0.0;
            if !self.fallen {
                self.fallen = true;
                let tip = Layout::new(self.state.viewport).tip(MAX_TILT, self.phi);
                events.push(SimEvent::OutOfBounds { at: tip });
                log::info!("gyroscope fell after {:.1}s", self.state.sim_time);
            }
        }
    }

    fn finish_round(&mut self, events: &mut Vec<SimEvent>) {
        let mut total = self.round.deviation;
        let mut elapsed = self.round.elapsed;
        if self.fallen {
            // A fall counts as the rest of the round spent at the limit
            let remaining = (ROUND_SECS - elapsed).max(0.0);
            total += remaining * MAX_TILT.to_degrees();
            elapsed += remaining;
        }
        let mean = total / elapsed.max(f64::EPSILON);
        let tip = Layout::new(self.state.viewport).tip(self.tilt(), self.phi);
        events.push(SimEvent::Graded {
            value: mean,
            target: 0.0,
            tolerance: STABILIZE_TOLERANCE_DEG,
            at: tip - DVec2::new(0.0, 30.0),
        });
        self.reset();
    }

    fn correct(&mut self, push_right: bool, events: &mut Vec<SimEvent>) {
        // Screen-x lean of the axis decides whether a push tilts it up or down
        let lean = (self.tilt().sin() * self.phi.cos()).signum();
        let push = if push_right { 1.0 } else { -1.0 };
        self.theta.v[0] += CORRECTION_IMPULSE * push * lean;
        let layout = Layout::new(self.state.viewport);
        events.push(SimEvent::Burst {
            kind: ParticleKind::Spark,
            at: layout.tip(self.tilt(), self.phi),
            count: 6,
            color: palette::ACCENT,
        });
        events.push(SimEvent::Sound(SoundEffect::Launch));
    }
}

impl Simulation for GyroscopeSim {
    fn name(&self) -> &'static str {
        "gyroscope"
    }

    fn supported_modes(&self) -> &'static [Mode] {
        MODES
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
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
        self.body = TopBody::disk(
            self.state.value("mass"),
            self.state.value("radius"),
            self.state.value("arm"),
        );
        self.omega3 = self.state.value("spin");
        let theta = self.state.value("tilt").to_radians().max(MIN_TILT);
        self.theta = IntegratorState::new([theta], [0.0]);
        self.phi = 0.0;
        // Start on slow steady precession
        let phi_dot = self.body.mgl / guard_denominator(self.body.i3 * self.omega3);
        self.p_phi = self.body.p_phi(theta, phi_dot, self.omega3);
        self.fallen = false;
        self.round = Round::default();
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let mut remaining = dt;
        while remaining > 0.0 {
            let h = remaining.min(SUBSTEP);
            if !self.fallen {
                self.substep(h);
                self.perturb(h);
                self.clamp_tilt(events);
            }
            self.state.advance(h);
            remaining -= h;
        }

        if self.mode == Mode::Stabilize {
            if !self.fallen {
                self.round.elapsed += dt;
                self.round.deviation += self.tilt().to_degrees() * dt;
            }
            if self.fallen || self.round.elapsed >= ROUND_SECS {
                self.finish_round(events);
            }
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = Layout::new(size);
        let tip = layout.tip(self.tilt(), self.phi);
        match layer {
            Layer::Background => {
                surface.line(
                    DVec2::new(size.width * 0.1, layout.pivot.y),
                    DVec2::new(size.width * 0.7, layout.pivot.y),
                    palette::TRACK,
                    2.0,
                );
            }
            Layer::Overlays => {
                let up = layout.pivot - DVec2::new(0.0, layout.arm);
                surface.line(layout.pivot, up, with_alpha(palette::GHOST, 0.5), 1.0);
                if self.mode == Mode::Stabilize {
                    let limit = STABILIZE_TOLERANCE_DEG.to_radians();
                    for side in [-1.0, 1.0] {
                        let edge = layout.pivot + DVec2::new(side * limit.sin(), -limit.cos()) * layout.arm;
                        surface.line(layout.pivot, edge, with_alpha(palette::GOLD, 0.4), 1.0);
                    }
                }
            }
            Layer::Bodies => {
                surface.line(layout.pivot, tip, palette::TEXT, 3.0);
                let axis = (tip - layout.pivot).normalize_or_zero();
                let across = axis.perp();
                let disk_center = layout.pivot + axis * layout.arm * 0.75;
                let half = layout.arm * 0.25;
                let color = if self.fallen { palette::BAD } else { palette::ACCENT };
                surface.line(disk_center - across * half, disk_center + across * half, color, 8.0);
                // Marker on the rim shows the spin
                let spin_angle = if frame.reduced_motion { 0.0 } else { self.state.sim_time * self.omega3 * 0.05 };
                let mark = disk_center + across * half * spin_angle.sin();
                surface.fill_circle(mark, 4.0, palette::WARM);
                surface.fill_circle(layout.pivot, 5.0, palette::TRACK);
            }
            Layer::Annotations => {
                let ratio = (self.tilt() / MAX_TILT).clamp(0.0, 1.0);
                surface.fill_circle(tip, 4.0, energy_color(ratio, 1.0));
                if self.fallen {
                    surface.text(
                        "fallen",
                        tip + DVec2::new(0.0, -14.0),
                        TextStyle::new(13.0, palette::BAD).centered().bold(),
                    );
                }
            }
            Layer::Panels => {
                let rows = [
                    ("θ", format!("{}°", format_value(self.tilt().to_degrees()))),
                    ("φ̇", format!("{} rad/s", format_value(self.precession_rate()))),
                    ("ω₃", format!("{} rad/s", format_value(self.omega3))),
                ];
                draw_info_panel(surface, DVec2::new(size.width - 170.0, 12.0), "Top", &rows, frame.high_contrast);
                draw_meter(
                    surface,
                    DVec2::new(size.width - 170.0, 110.0),
                    DVec2::new(150.0, 10.0),
                    "spin",
                    self.omega3,
                    (0.0, 300.0),
                    palette::ACCENT,
                );
                if self.mode == Mode::Stabilize {
                    draw_meter(
                        surface,
                        DVec2::new(size.width - 170.0, 145.0),
                        DVec2::new(150.0, 10.0),
                        "round",
                        self.round.elapsed,
                        (0.0, ROUND_SECS),
                        palette::GOLD,
                    );
                    draw_hint(surface, "Click left or right of the top to push it upright");
                } else {
                    draw_hint(surface, "Adjust spin and tilt, then reset");
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        if self.mode != Mode::Stabilize || self.fallen || Button::bottom_right(size).contains(point) {
            return;
        }
        let layout = Layout::new(size);
        // Clicking on the left pushes to the right
        self.correct(point.x < layout.pivot.x, events);
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        if self.mode != Mode::Stabilize || self.fallen {
            return;
        }
        match key {
            Key::Left => self.correct(false, events),
            Key::Right => self.correct(true, events),
            _ => {}
        }
    }

    fn on_param_changed(&mut self, key: &str) {
        if matches!(key, "mass" | "radius" | "arm" | "spin" | "tilt") {
            self.reset();
        }
    }

    fn audio_cue(&self) -> Option<ToneCue> {
        Some(ToneCue::new(
            f64::from(ToneCue::pitch_for(self.omega3, (20.0, 300.0))),
            if self.fallen { 0.0 } else { 0.3 },
        ))
    }

    fn energy(&self) -> Option<f64> {
        Some(self.body.energy(self.tilt(), self.tilt_rate(), self.p_phi, self.omega3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> GyroscopeSim {
        let mut s = GyroscopeSim::new(5);
        s.state.params.set("noise", 0.0).unwrap();
        s.state.params.set("friction", 0.0).unwrap();
        s.reset();
        s
    }

    #[test]
    fn test_energy_conserved_without_perturbation() {
        let mut s = quiet();
        let e0 = s.energy().unwrap();
        let mut events = Vec::new();
        for _ in 0..1000 {
            s.step(0.002, &mut events);
        }
        let e1 = s.energy().unwrap();
        assert!(!s.is_fallen());
        assert!(((e1 - e0) / e0).abs() < 1e-3, "e0={e0} e1={e1}");
    }

    #[test]
    fn test_spin_and_momentum_conserved() {
        let mut s = quiet();
        let (w, p) = (s.omega3, s.p_phi);
        let mut events = Vec::new();
        for _ in 0..120 {
            s.step(1.0 / 60.0, &mut events);
        }
        assert_eq!(s.omega3, w);
        assert_eq!(s.p_phi, p);
        assert!(s.precession_rate() > 0.0);
    }

    #[test]
    fn test_slow_top_falls_once() {
        let mut s = quiet();
        s.state.params.set("spin", 20.0).unwrap();
        s.state.params.set("tilt", 60.0).unwrap();
        s.reset();
        let mut events = Vec::new();
        for _ in 0..600 {
            s.step(1.0 / 60.0, &mut events);
        }
        assert!(s.is_fallen());
        let falls = events
            .iter()
            .filter(|e| matches!(e, SimEvent::OutOfBounds { .. }))
            .count();
        assert_eq!(falls, 1);
        assert!(s.tilt() <= MAX_TILT);
    }

    #[test]
    fn test_friction_spins_down() {
        let mut s = quiet();
        s.state.params.set("friction", 0.5).unwrap();
        let mut events = Vec::new();
        for _ in 0..60 {
            s.step(1.0 / 60.0, &mut events);
        }
        assert!(s.spin() < 150.0 * 0.7);
    }

    #[test]
    fn test_stabilize_round_is_graded() {
        let mut s = GyroscopeSim::new(2);
        s.set_mode(Mode::Stabilize);
        let mut events = Vec::new();
        for _ in 0..((ROUND_SECS * 60.0) as usize + 5) {
            s.step(1.0 / 60.0, &mut events);
        }
        let graded: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Graded { value, target, tolerance, .. } => Some((*value, *target, *tolerance)),
                _ => None,
            })
            .collect();
        assert!(!graded.is_empty());
        let (value, target, tolerance) = graded[0];
        assert!(value.is_finite() && value >= 0.0);
        assert_eq!(target, 0.0);
        assert_eq!(tolerance, STABILIZE_TOLERANCE_DEG);
    }

    #[test]
    fn test_correction_changes_tilt_rate() {
        let mut s = GyroscopeSim::new(2);
        s.set_mode(Mode::Stabilize);
        let size = s.state.viewport;
        let before = s.tilt_rate();
        let mut events = Vec::new();
        // φ = 0 leans right; a click on the left pushes further right
        s.handle_click(DVec2::new(10.0, 100.0), size, &mut events);
        assert!((s.tilt_rate() - before - CORRECTION_IMPULSE).abs() < 1e-12);
        s.handle_key(Key::Left, &mut events);
        assert!((s.tilt_rate() - before).abs() < 1e-12);
        assert!(events.contains(&SimEvent::Sound(SoundEffect::Launch)));
    }
}
