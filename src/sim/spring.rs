//! Spring-mass oscillator
//!
//! Sandbox evaluates the damped oscillator in closed form. Push, Resonance
//! and Challenge integrate `m·ẍ = −k·x − c·ẋ + F₀·cos(ω_d·t)` with
//! velocity-Verlet; the integrator state is then the only source of truth.

use std::collections::VecDeque;

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{
    Button, FrameInfo, IntegratorState, Mode, Param, SimEvent, Simulation, SimulationState,
    draw_hint, hidden_target, verlet_step,
};
use crate::audio::{SoundEffect, ToneCue};
use crate::guard_denominator;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{
    draw_arrow, draw_graph_frame, draw_info_panel, draw_meter, draw_series, format_value,
};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Push, Mode::Resonance, Mode::Challenge];

/// Velocity change per push (m/s)
pub const PUSH_SPEED: f64 = 1.5;
/// |ζ − 1| below which damping is treated as critical
const CRITICAL_BAND: f64 = 1e-6;
/// Fraction of the extent a clamped body must return inside before another
/// out-of-bounds excursion is reported
const REARM_FRACTION: f64 = 0.98;
const HISTORY_LEN: usize = 240;
const BLOCK: DVec2 = DVec2::new(48.0, 40.0);

/// Closed-form position and velocity of a damped oscillator released from
/// rest at `amplitude`
pub fn damped_motion(mass: f64, k: f64, c: f64, amplitude: f64, t: f64) -> (f64, f64) {
    let mass = guard_denominator(mass);
    let omega0 = (k.max(0.0) / mass).sqrt();
    let gamma = c.max(0.0) / (2.0 * mass);
    let zeta = gamma / guard_denominator(omega0);

    if (zeta - 1.0).abs() < CRITICAL_BAND {
        // Critically damped
        let b = gamma * amplitude;
        let decay = (-gamma * t).exp();
        let x = (amplitude + b * t) * decay;
        let v = (b - gamma * (amplitude + b * t)) * decay;
        (x, v)
    } else if zeta < 1.0 {
        let omega_d = omega0 * (1.0 - zeta * zeta).sqrt();
        let b = gamma * amplitude / guard_denominator(omega_d);
        let decay = (-gamma * t).exp();
        let (s, co) = (omega_d * t).sin_cos();
        let x = decay * (amplitude * co + b * s);
        let v = decay * (-gamma * (amplitude * co + b * s) + omega_d * (b * co - amplitude * s));
        (x, v)
    } else {
        let root = (gamma * gamma - omega0 * omega0).sqrt();
        let (r1, r2) = (-gamma + root, -gamma - root);
        let span = guard_denominator(r1 - r2);
        let c1 = -r2 * amplitude / span;
        let c2 = r1 * amplitude / span;
        let (e1, e2) = ((r1 * t).exp(), (r2 * t).exp());
        (c1 * e1 + c2 * e2, r1 * c1 * e1 + r2 * c2 * e2)
    }
}

/// Screen layout derived from the surface size
struct Layout {
    wall_x: f64,
    equilibrium: DVec2,
    px_per_m: f64,
}

impl Layout {
    fn new(size: SurfaceSize, extent: f64) -> Self {
        let wall_x = size.width * 0.08;
        let equilibrium = DVec2::new(size.width * 0.48, size.height * 0.42);
        let reach = (equilibrium.x - wall_x - BLOCK.x).max(10.0);
        Self {
            wall_x,
            equilibrium,
            px_per_m: reach / guard_denominator(extent),
        }
    }

    fn block_center(&self, x: f64) -> DVec2 {
        self.equilibrium + DVec2::new(x * self.px_per_m, 0.0)
    }

    fn block_contains(&self, x: f64, point: DVec2) -> bool {
        let c = self.block_center(x);
        (point.x - c.x).abs() <= BLOCK.x * 0.5 && (point.y - c.y).abs() <= BLOCK.y * 0.5
    }
}

pub struct SpringSim {
    state: SimulationState,
    mode: Mode,
    integrator: IntegratorState<1>,
    /// Derived position (m), refreshed every step
    x: f64,
    /// Derived velocity (m/s)
    v: f64,
    out_of_bounds: bool,
    rng: Pcg32,
    /// Hidden spring constant of the ghost oscillator
    target_k: f64,
    history: VecDeque<f64>,
}

impl SpringSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("mass", "Mass", "kg").range(0.1, 5.0, 1.0).step(0.1),
                Param::new("k", "Spring constant", "N/m").range(1.0, 100.0, 20.0).step(0.5),
                Param::new("damping", "Damping", "kg/s").range(0.0, 10.0, 0.3).step(0.05),
                Param::new("amplitude", "Amplitude", "m").range(0.05, 1.0, 0.5).step(0.05),
                Param::new("drive_force", "Drive force", "N").range(0.0, 20.0, 2.0).step(0.5),
                Param::new("drive_freq", "Drive frequency", "rad/s").range(0.5, 20.0, 4.0).step(0.1),
                Param::new("extent", "Track extent", "m").range(0.5, 2.0, 1.2).step(0.1),
            ],
            seed,
        );
        let mut rng = Pcg32::seed_from_u64(seed);
        let target_k = hidden_target(&mut rng, 5.0, 60.0);
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            integrator: IntegratorState::default(),
            x: 0.0,
            v: 0.0,
            out_of_bounds: false,
            rng,
            target_k,
            history: VecDeque::with_capacity(HISTORY_LEN),
        };
        sim.reset();
        sim
    }

    pub fn position(&self) -> f64 {
        self.x
    }

    pub fn velocity(&self) -> f64 {
        self.v
    }

    pub fn is_out_of_bounds(&self) -> bool {
        self.out_of_bounds
    }

    pub fn target_k(&self) -> f64 {
        self.target_k
    }

    /// Natural angular frequency ω₀ = √(k/m)
    pub fn natural_frequency(&self) -> f64 {
        (self.state.value("k") / guard_denominator(self.state.value("mass"))).sqrt()
    }

    fn integrated(&self) -> bool {
        self.mode != Mode::Sandbox
    }

    /// Ghost oscillator (hidden k, undamped) position at the current time
    fn ghost_position(&self) -> f64 {
        damped_motion(
            self.state.value("mass"),
            self.target_k,
            0.0,
            self.state.value("amplitude"),
            self.state.sim_time,
        )
        .0
    }

    fn apply_clamp(&mut self, events: &mut Vec<SimEvent>) {
        let extent = self.state.value("extent");
        if self.x.abs() > extent {
            self.x = extent.copysign(self.x);
            self.v = 0.0;
            self.integrator = IntegratorState::new([self.x], [0.0]);
            if !self.out_of_bounds {
                self.out_of_bounds = true;
                let layout = Layout::new(self.state.viewport, extent);
                let edge = layout.block_center(self.x)
                    + DVec2::new(BLOCK.x * 0.5 * self.x.signum(), 0.0);
                events.push(SimEvent::OutOfBounds { at: edge });
            }
        } else if self.x.abs() < extent * REARM_FRACTION {
            self.out_of_bounds = false;
        }
    }

    fn push(&mut self, direction: f64, events: &mut Vec<SimEvent>) {
        self.integrator.v[0] += direction.signum() * PUSH_SPEED;
        self.v = self.integrator.v[0];
        let layout = Layout::new(self.state.viewport, self.state.value("extent"));
        events.push(SimEvent::Burst {
            kind: ParticleKind::Glow,
            at: layout.block_center(self.x),
            count: 6,
            color: palette::ACCENT,
        });
        events.push(SimEvent::Sound(SoundEffect::Launch));
    }

    fn submit(&mut self, events: &mut Vec<SimEvent>) {
        let at = Button::bottom_right(self.state.viewport).center() - DVec2::new(0.0, 40.0);
        events.push(SimEvent::Graded {
            value: self.state.value("k"),
            target: self.target_k,
            tolerance: (self.target_k * 0.2).max(1.0),
            at,
        });
        self.target_k = hidden_target(&mut self.rng, 5.0, 60.0);
        self.reset();
    }
}

impl Simulation for SpringSim {
    fn name(&self) -> &'static str {
        "spring"
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
        let amplitude = self.state.value("amplitude");
        let x0 = match self.mode {
            // Resonance builds up from rest at equilibrium
            Mode::Resonance => 0.0,
            _ => amplitude,
        };
        self.integrator = IntegratorState::new([x0], [0.0]);
        self.x = x0;
        self.v = 0.0;
        self.out_of_bounds = false;
        self.history.clear();
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        let t = self.state.sim_time;
        self.state.advance(dt);

        let mass = guard_denominator(self.state.value("mass"));
        let k = self.state.value("k");
        let c = self.state.value("damping");

        if self.integrated() {
            let (f0, wd) = if self.mode == Mode::Resonance {
                (self.state.value("drive_force"), self.state.value("drive_freq"))
            } else {
                (0.0, 0.0)
            };
            verlet_step(&mut self.integrator, t, dt, |q, v, time| {
                [(-k * q[0] - c * v[0] + f0 * (wd * time).cos()) / mass]
            });
            self.x = self.integrator.q[0];
            self.v = self.integrator.v[0];
        } else {
            let (x, v) = damped_motion(mass, k, c, self.state.value("amplitude"), self.state.sim_time);
            self.x = x;
            self.v = v;
        }
        self.apply_clamp(events);

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(self.x);
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let extent = self.state.value("extent");
        let layout = Layout::new(size, extent);
        let y = layout.equilibrium.y;

        match layer {
            Layer::Background => {
                let floor = y + BLOCK.y * 0.5;
                surface.line(
                    DVec2::new(layout.wall_x, floor),
                    DVec2::new(size.width * 0.92, floor),
                    palette::TRACK,
                    2.0,
                );
                surface.fill_rect(
                    DVec2::new(layout.wall_x - 10.0, y - 50.0),
                    DVec2::new(10.0, 50.0 + BLOCK.y * 0.5),
                    palette::TRACK,
                );
                // Equilibrium and extent stops
                surface.line(
                    DVec2::new(layout.equilibrium.x, floor),
                    DVec2::new(layout.equilibrium.x, floor + 10.0),
                    palette::TEXT_DIM,
                    1.0,
                );
                for side in [-1.0, 1.0] {
                    let stop = layout.block_center(extent * side).x + side * BLOCK.x * 0.5;
                    surface.line(
                        DVec2::new(stop, floor - 30.0),
                        DVec2::new(stop, floor + 6.0),
                        with_alpha(palette::BAD, 0.7),
                        2.0,
                    );
                }
            }
            Layer::Overlays => {
                if self.mode == Mode::Challenge {
                    let ghost = layout.block_center(self.ghost_position());
                    surface.fill_rect(ghost - BLOCK * 0.5, BLOCK, palette::GHOST);
                    surface.stroke_rect(ghost - BLOCK * 0.5, BLOCK, with_alpha(palette::TEXT, 0.4), 1.0);
                }
            }
            Layer::Bodies => {
                let center = layout.block_center(self.x);
                let start = DVec2::new(layout.wall_x, y);
                let end = center - DVec2::new(BLOCK.x * 0.5, 0.0);
                let coils = 14;
                let points: Vec<DVec2> = (0..=coils + 1)
                    .map(|i| {
                        let t = i as f64 / (coils + 1) as f64;
                        let offset = match i {
                            0 => 0.0,
                            i if i == coils + 1 => 0.0,
                            i if i % 2 == 0 => 10.0,
                            _ => -10.0,
                        };
                        start.lerp(end, t) + DVec2::new(0.0, offset)
                    })
                    .collect();
                surface.polyline(&points, palette::TEXT_DIM, 2.0);

                let color = if self.out_of_bounds {
                    palette::BAD
                } else {
                    palette::ACCENT
                };
                surface.fill_rect(center - BLOCK * 0.5, BLOCK, color);
                surface.stroke_rect(center - BLOCK * 0.5, BLOCK, palette::TEXT, 1.5);
                surface.text(
                    &format!("{:.1} kg", self.state.value("mass")),
                    center,
                    TextStyle::new(11.0, palette::BACKGROUND).centered().bold(),
                );
            }
            Layer::Annotations => {
                let center = layout.block_center(self.x);
                draw_arrow(
                    surface,
                    center - DVec2::new(0.0, BLOCK.y * 0.5 + 12.0),
                    DVec2::new(self.v * layout.px_per_m * 0.25, 0.0),
                    palette::WARM,
                    2.0,
                );
                surface.text(
                    &format!("x = {} m", format_value(self.x)),
                    center + DVec2::new(0.0, BLOCK.y * 0.5 + 18.0),
                    TextStyle::new(12.0, palette::TEXT).centered(),
                );
            }
            Layer::Panels => {
                let mass = self.state.value("mass");
                let k = self.state.value("k");
                let ke = 0.5 * mass * self.v * self.v;
                let pe = 0.5 * k * self.x * self.x;
                let scale = (0.5 * k * extent * extent).max(1e-6);
                let mut rows = vec![
                    ("mode", self.mode.to_string()),
                    ("ω₀", format!("{} rad/s", format_value(self.natural_frequency()))),
                    ("k", format!("{} N/m", format_value(k))),
                    ("E", format!("{} J", format_value(ke + pe))),
                ];
                if self.mode == Mode::Resonance {
                    rows.push(("ω_d", format!("{} rad/s", format_value(self.state.value("drive_freq")))));
                }
                let panel = draw_info_panel(surface, DVec2::new(12.0, 12.0), "Spring", &rows, frame.high_contrast);

                let meter = DVec2::new(panel.x.max(120.0), 8.0);
                draw_meter(surface, DVec2::new(12.0, panel.y + 36.0), meter, "KE", ke, (0.0, scale), palette::WARM);
                draw_meter(surface, DVec2::new(12.0, panel.y + 66.0), meter, "PE", pe, (0.0, scale), palette::ACCENT);

                let graph_pos = DVec2::new(size.width * 0.55, size.height * 0.66);
                let graph_size = DVec2::new(size.width * 0.42, size.height * 0.22);
                draw_graph_frame(surface, graph_pos, graph_size, "x(t)");
                let values: Vec<f64> = self.history.iter().copied().collect();
                draw_series(surface, graph_pos, graph_size, &values, (-extent, extent), palette::ACCENT);

                match self.mode {
                    Mode::Challenge => {
                        Button::bottom_right(size).draw(surface, "Submit k");
                        draw_hint(surface, "Tune k until your block moves with the ghost, then submit");
                    }
                    Mode::Push => draw_hint(surface, "Click the block to push it"),
                    Mode::Resonance => draw_hint(surface, "Sweep the drive frequency toward ω₀"),
                    _ => {}
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        match self.mode {
            Mode::Push => {
                let layout = Layout::new(size, self.state.value("extent"));
                if layout.block_contains(self.x, point) {
                    // Push away from the side that was clicked
                    let direction = layout.block_center(self.x).x - point.x;
                    self.push(if direction == 0.0 { 1.0 } else { direction }, events);
                }
            }
            Mode::Challenge => {
                if Button::bottom_right(size).contains(point) {
                    self.submit(events);
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        match (self.mode, key) {
            (Mode::Push, Key::Left) => self.push(-1.0, events),
            (Mode::Push, Key::Right | Key::Launch) => self.push(1.0, events),
            (Mode::Challenge, Key::Submit) => self.submit(events),
            (Mode::Challenge, Key::Up | Key::Down) => {
                let steps = if key == Key::Up { 1.0 } else { -1.0 };
                if self.state.params.nudge("k", steps).is_ok() {
                    self.on_param_changed("k");
                }
            }
            _ => {}
        }
    }

    fn on_param_changed(&mut self, key: &str) {
        match (self.mode, key) {
            // Closed-form state restarts from the new initial conditions
            (Mode::Sandbox, _) => self.reset(),
            // Keep the race against the ghost fair
            (Mode::Challenge, "k" | "mass" | "amplitude") => self.reset(),
            (_, "extent") => self.out_of_bounds = false,
            _ => {}
        }
    }

    fn audio_cue(&self) -> Option<ToneCue> {
        let omega0 = self.natural_frequency();
        let peak = (omega0 * self.state.value("extent")).max(1e-6);
        Some(ToneCue {
            frequency: ToneCue::pitch_for(omega0, (1.0, 30.0)),
            gain: (self.v.abs() / peak).clamp(0.0, 1.0) as f32,
        })
    }

    fn energy(&self) -> Option<f64> {
        let mass = self.state.value("mass");
        let k = self.state.value("k");
        Some(0.5 * mass * self.v * self.v + 0.5 * k * self.x * self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(mode: Mode) -> SpringSim {
        let mut s = SpringSim::new(3);
        s.set_mode(mode);
        s
    }

    #[test]
    fn test_undamped_closed_form_is_cosine() {
        let (x, v) = damped_motion(1.0, 4.0, 0.0, 0.5, 1.3);
        assert!((x - 0.5 * (2.0f64 * 1.3).cos()).abs() < 1e-12);
        assert!((v + 0.5 * 2.0 * (2.0f64 * 1.3).sin()).abs() < 1e-12);
    }

    #[test]
    fn test_closed_form_starts_at_rest() {
        for c in [0.5, 4.0, 12.0] {
            let (x, v) = damped_motion(1.0, 4.0, c, 0.8, 0.0);
            assert!((x - 0.8).abs() < 1e-12, "c = {c}");
            assert!(v.abs() < 1e-12, "c = {c}");
        }
    }

    #[test]
    fn test_critical_and_overdamped_do_not_cross() {
        // c = 2√(km) = 4 is critical
        for c in [4.0, 10.0] {
            for i in 0..200 {
                let (x, _) = damped_motion(1.0, 4.0, c, 1.0, i as f64 * 0.05);
                assert!(x >= 0.0 && x.is_finite(), "c = {c}");
            }
        }
    }

    #[test]
    fn test_degenerate_mass_stays_finite() {
        let (x, v) = damped_motion(0.0, 10.0, 1.0, 0.5, 2.0);
        assert!(x.is_finite() && v.is_finite());
    }

    #[test]
    fn test_energy_conserved_without_damping_or_drive() {
        let mut s = sim(Mode::Push);
        s.state.params.set("damping", 0.0).unwrap();
        s.state.params.set("drive_force", 0.0).unwrap();
        s.reset();
        let mut events = Vec::new();
        s.step(1.0 / 60.0, &mut events);
        let e0 = s.energy().unwrap();
        for _ in 0..1000 {
            s.step(1.0 / 60.0, &mut events);
        }
        let e1 = s.energy().unwrap();
        assert!((e1 - e0).abs() / e0 < 0.01, "{e0} -> {e1}");
        assert!(events.is_empty());
    }

    #[test]
    fn test_clamp_flags_once_per_excursion() {
        let mut s = sim(Mode::Push);
        s.state.params.set("damping", 0.0).unwrap();
        s.state.params.set("extent", 0.5).unwrap();
        s.state.params.set("amplitude", 0.4).unwrap();
        s.reset();
        let mut events = Vec::new();
        // Hard push toward the right stop
        s.integrator.v[0] = 20.0;
        for _ in 0..2 {
            s.step(1.0 / 60.0, &mut events);
            assert!(s.is_out_of_bounds());
            assert!(s.position() <= 0.5 + 1e-12);
        }
        let flags = events
            .iter()
            .filter(|e| matches!(e, SimEvent::OutOfBounds { .. }))
            .count();
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_push_click_on_block() {
        let mut s = sim(Mode::Push);
        let size = s.state.viewport;
        let layout = Layout::new(size, s.state.value("extent"));
        let center = layout.block_center(s.position());
        let mut events = Vec::new();
        s.handle_click(center - DVec2::new(10.0, 0.0), size, &mut events);
        assert!(s.velocity() > 0.0);
        assert!(events.contains(&SimEvent::Sound(SoundEffect::Launch)));

        // Clicking empty track does nothing
        let before = s.velocity();
        s.handle_click(DVec2::new(size.width - 5.0, 5.0), size, &mut events);
        assert_eq!(s.velocity(), before);
    }

    #[test]
    fn test_resonance_grows_near_natural_frequency() {
        let mut s = sim(Mode::Resonance);
        s.state.params.set("damping", 0.1).unwrap();
        s.state.params.set("drive_freq", s.natural_frequency()).unwrap();
        s.state.params.set("extent", 2.0).unwrap();
        let mut events = Vec::new();
        let mut peak: f64 = 0.0;
        for _ in 0..600 {
            s.step(1.0 / 60.0, &mut events);
            peak = peak.max(s.position().abs());
        }
        assert!(peak > 0.3, "peak {peak}");
    }

    #[test]
    fn test_challenge_submit_grades_k() {
        let mut s = sim(Mode::Challenge);
        let target = s.target_k();
        s.state.params.set("k", target).unwrap();
        let mut events = Vec::new();
        s.handle_key(Key::Submit, &mut events);
        match events.as_slice() {
            [SimEvent::Graded { value, target: t, .. }] => {
                assert_eq!(*t, target);
                assert!((value - target).abs() < 1e-9);
            }
            other => panic!("unexpected events {other:?}"),
        }
        // A new hidden target is drawn
        assert_ne!(s.target_k(), target);
    }

    #[test]
    fn test_draw_is_finite() {
        use crate::renderer::RecordingSurface;
        let mut s = sim(Mode::Challenge);
        let mut events = Vec::new();
        s.step(0.02, &mut events);
        let mut surface = RecordingSurface::new(640.0, 360.0);
        for layer in Layer::ORDER {
            s.draw(&mut surface, &FrameInfo::default(), layer);
        }
        assert!(surface.all_finite());
        assert!(surface.has_text("Submit k"));
    }
}
