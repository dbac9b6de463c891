//! One-dimensional cart kinematics
//!
//! x = v₀·t + ½·a·t². A braking cart is latched at the analytic stopping
//! point x = v₀²/(2|a|) once its velocity would cross zero.

use glam::DVec2;

use super::{FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint};
use crate::audio::SoundEffect;
use crate::guard_denominator;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{
    draw_arrow, draw_graph_frame, draw_info_panel, draw_meter, draw_series, draw_target_marker,
    format_value,
};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Prediction];
const CART: DVec2 = DVec2::new(44.0, 24.0);
const GRAPH_SAMPLES: usize = 64;

/// Cart state at time `t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartMotion {
    pub x: f64,
    pub v: f64,
    pub stopped: bool,
}

/// Closed-form cart motion, latched when braking reaches zero velocity
pub fn cart_motion(v0: f64, a: f64, t: f64) -> CartMotion {
    let t = t.max(0.0);
    // Braking from rest never leaves the start line
    if a < 0.0 && v0 <= 0.0 {
        return CartMotion {
            x: 0.0,
            v: 0.0,
            stopped: true,
        };
    }
    if a < 0.0 {
        let stop_time = v0 / -a;
        if t >= stop_time {
            return CartMotion {
                x: stopping_distance(v0, a),
                v: 0.0,
                stopped: true,
            };
        }
    }
    let v = v0 + a * t;
    CartMotion {
        x: v0 * t + 0.5 * a * t * t,
        v,
        stopped: v0 == 0.0 && a == 0.0,
    }
}

/// Analytic stopping point v₀²/(2|a|)
pub fn stopping_distance(v0: f64, a: f64) -> f64 {
    v0 * v0 / (2.0 * guard_denominator(a.abs()))
}

struct Layout {
    start: DVec2,
    px_per_m: f64,
}

impl Layout {
    fn new(size: SurfaceSize, track: f64) -> Self {
        let start = DVec2::new(size.width * 0.06, size.height * 0.45);
        Self {
            start,
            px_per_m: size.width * 0.86 / guard_denominator(track),
        }
    }

    fn to_screen(&self, x: f64) -> DVec2 {
        self.start + DVec2::new(x * self.px_per_m, 0.0)
    }

    fn to_track(&self, screen_x: f64) -> f64 {
        (screen_x - self.start.x) / guard_denominator(self.px_per_m)
    }
}

pub struct KinematicsSim {
    state: SimulationState,
    mode: Mode,
    x: f64,
    v: f64,
    released: bool,
    stopped: bool,
    clamped: bool,
    /// Predicted stop position (m)
    marker: Option<f64>,
}

impl KinematicsSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("v0", "Initial speed", "m/s").range(0.0, 20.0, 8.0).step(0.5),
                Param::new("accel", "Acceleration", "m/s²").range(-5.0, 5.0, -2.0).step(0.1),
                Param::new("track", "Track length", "m").range(10.0, 100.0, 50.0).step(5.0),
            ],
            seed,
        );
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            x: 0.0,
            v: 0.0,
            released: false,
            stopped: false,
            clamped: false,
            marker: None,
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

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn marker(&self) -> Option<f64> {
        self.marker
    }

    /// Where the cart comes to rest after the track clamp
    pub fn clamped_stop(&self) -> f64 {
        let v0 = self.state.value("v0");
        let a = self.state.value("accel");
        let track = self.state.value("track");
        if a < 0.0 && v0 > 0.0 {
            stopping_distance(v0, a).min(track)
        } else if v0 == 0.0 && a <= 0.0 {
            0.0
        } else {
            track
        }
    }

    fn finish(&mut self, events: &mut Vec<SimEvent>) {
        self.stopped = true;
        self.v = 0.0;
        let layout = Layout::new(self.state.viewport, self.state.value("track"));
        let at = layout.to_screen(self.x);
        events.push(SimEvent::Burst {
            kind: ParticleKind::Glow,
            at,
            count: 8,
            color: palette::ACCENT,
        });
        if self.mode == Mode::Prediction {
            if let Some(marker) = self.marker {
                events.push(SimEvent::Graded {
                    value: marker,
                    target: self.x,
                    tolerance: self.state.value("track") * 0.1,
                    at: at - DVec2::new(0.0, 50.0),
                });
            }
        }
    }
}

impl Simulation for KinematicsSim {
    fn name(&self) -> &'static str {
        "kinematics"
    }

    fn supported_modes(&self) -> &'static [Mode] {
        MODES
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.marker = None;
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
        self.x = 0.0;
        self.v = self.state.value("v0");
        self.stopped = false;
        self.clamped = false;
        // Predictions hold the cart until a marker is placed
        self.released = self.mode == Mode::Sandbox;
        if self.mode == Mode::Prediction {
            self.marker = None;
        }
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        if !self.released || self.stopped {
            return;
        }
        self.state.advance(dt);

        let track = self.state.value("track");
        let motion = cart_motion(self.state.value("v0"), self.state.value("accel"), self.state.sim_time);
        self.x = motion.x;
        self.v = motion.v;

        if self.x > track || self.x < 0.0 {
            self.x = self.x.clamp(0.0, track);
            if !self.clamped {
                self.clamped = true;
                let layout = Layout::new(self.state.viewport, track);
                events.push(SimEvent::OutOfBounds {
                    at: layout.to_screen(self.x),
                });
            }
            self.finish(events);
        } else if motion.stopped {
            self.finish(events);
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let track = self.state.value("track");
        let layout = Layout::new(size, track);

        match layer {
            Layer::Background => {
                let rail = CART.y * 0.5 + 4.0;
                surface.line(
                    layout.to_screen(0.0) + DVec2::new(0.0, rail),
                    layout.to_screen(track) + DVec2::new(0.0, rail),
                    palette::TRACK,
                    3.0,
                );
                let end = layout.to_screen(track);
                surface.line(end - DVec2::new(0.0, 30.0), end + DVec2::new(0.0, rail), palette::BAD, 3.0);
                let mut d = 0.0;
                while d <= track {
                    let p = layout.to_screen(d) + DVec2::new(0.0, rail);
                    surface.line(p, p + DVec2::new(0.0, 6.0), palette::GRID, 1.0);
                    surface.text(
                        &format!("{d:.0}"),
                        p + DVec2::new(0.0, 16.0),
                        TextStyle::new(10.0, palette::TEXT_DIM).centered(),
                    );
                    d += 10.0;
                }
            }
            Layer::Overlays => {
                if let Some(marker) = self.marker {
                    draw_target_marker(
                        surface,
                        layout.to_screen(marker),
                        12.0,
                        palette::GOLD,
                        frame.time,
                        frame.reduced_motion,
                    );
                }
                if self.mode == Mode::Sandbox && self.state.value("accel") < 0.0 {
                    let stop = self.clamped_stop();
                    let p = layout.to_screen(stop);
                    surface.line(p - DVec2::new(0.0, 26.0), p + DVec2::new(0.0, 14.0), palette::GHOST, 2.0);
                }
            }
            Layer::Bodies => {
                let center = layout.to_screen(self.x);
                let color = if self.clamped { palette::BAD } else { palette::WARM };
                surface.fill_rect(center - CART * 0.5 - DVec2::new(CART.x * 0.5, 0.0), CART, color);
                for wheel in [-0.75, -0.25] {
                    surface.fill_circle(
                        center + DVec2::new(CART.x * wheel, CART.y * 0.5),
                        5.0,
                        palette::TEXT_DIM,
                    );
                }
            }
            Layer::Annotations => {
                let center = layout.to_screen(self.x) - DVec2::new(CART.x * 0.5, CART.y * 0.5 + 14.0);
                draw_arrow(surface, center, DVec2::new(self.v * 4.0, 0.0), palette::ACCENT, 2.0);
                draw_arrow(
                    surface,
                    center - DVec2::new(0.0, 14.0),
                    DVec2::new(self.state.value("accel") * 8.0, 0.0),
                    palette::GOOD,
                    2.0,
                );
            }
            Layer::Panels => {
                let rows = [
                    ("t", format!("{} s", format_value(self.state.sim_time))),
                    ("x", format!("{} m", format_value(self.x))),
                    ("v", format!("{} m/s", format_value(self.v))),
                    ("a", format!("{} m/s²", format_value(self.state.value("accel")))),
                ];
                let panel = draw_info_panel(surface, DVec2::new(12.0, 12.0), "Cart", &rows, frame.high_contrast);
                let v_max = self.state.value("v0").abs() + self.state.value("accel").abs() * 10.0;
                draw_meter(
                    surface,
                    DVec2::new(12.0, panel.y + 36.0),
                    DVec2::new(panel.x.max(120.0), 8.0),
                    "speed",
                    self.v.abs(),
                    (0.0, v_max.max(1.0)),
                    palette::ACCENT,
                );

                // v(t) of the current parameters up to the stop
                let v0 = self.state.value("v0");
                let a = self.state.value("accel");
                let horizon = if a < 0.0 && v0 > 0.0 { v0 / -a } else { 10.0 };
                let values: Vec<f64> = (0..GRAPH_SAMPLES)
                    .map(|i| cart_motion(v0, a, horizon * i as f64 / (GRAPH_SAMPLES - 1) as f64).v)
                    .collect();
                let graph_pos = DVec2::new(size.width * 0.6, size.height * 0.68);
                let graph_size = DVec2::new(size.width * 0.36, size.height * 0.2);
                draw_graph_frame(surface, graph_pos, graph_size, "v(t)");
                let bound = v_max.max(1.0);
                draw_series(surface, graph_pos, graph_size, &values, (-bound, bound), palette::GOOD);

                if self.mode == Mode::Prediction && self.marker.is_none() {
                    draw_hint(surface, "Click the track where the cart will stop");
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, _events: &mut Vec<SimEvent>) {
        if self.mode != Mode::Prediction {
            return;
        }
        let track = self.state.value("track");
        let layout = Layout::new(size, track);
        if self.stopped {
            // Next round
            self.reset();
        }
        if self.released {
            return;
        }
        self.marker = Some(layout.to_track(point.x).clamp(0.0, track));
        self.released = true;
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        if key == Key::Launch && self.mode == Mode::Sandbox {
            self.reset();
            events.push(SimEvent::Sound(SoundEffect::Launch));
        }
    }

    fn on_param_changed(&mut self, _key: &str) {
        if self.mode == Mode::Sandbox || !self.released {
            self.reset();
        }
    }

    fn energy(&self) -> Option<f64> {
        // Per unit mass
        Some(0.5 * self.v * self.v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sim: &mut KinematicsSim, seconds: f64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        for _ in 0..(seconds * 60.0) as usize {
            sim.step(1.0 / 60.0, &mut events);
        }
        events
    }

    #[test]
    fn test_constant_acceleration_position() {
        let m = cart_motion(5.0, 2.0, 2.0);
        assert!((m.x - 14.0).abs() < 1e-12);
        assert!((m.v - 9.0).abs() < 1e-12);
        assert!(!m.stopped);
    }

    #[test]
    fn test_braking_latches_without_overshoot() {
        let stop = stopping_distance(8.0, -2.0);
        assert_eq!(stop, 16.0);
        for t in [4.0, 4.5, 10.0, 100.0] {
            let m = cart_motion(8.0, -2.0, t);
            assert_eq!(m.x, 16.0);
            assert_eq!(m.v, 0.0);
            assert!(m.stopped);
        }
        assert!(cart_motion(8.0, -2.0, 3.9).x < 16.0);
    }

    #[test]
    fn test_sim_stops_at_analytic_point() {
        let mut s = KinematicsSim::new(1);
        run(&mut s, 6.0);
        assert!(s.is_stopped());
        assert_eq!(s.position(), 16.0);
        assert_eq!(s.velocity(), 0.0);
    }

    #[test]
    fn test_braking_from_rest_stays_at_start() {
        let m = cart_motion(0.0, -2.0, 0.1);
        assert_eq!(m.x, 0.0);
        assert!(m.stopped);

        let mut s = KinematicsSim::new(1);
        s.state.params.set("v0", 0.0).unwrap();
        s.reset();
        let events = run(&mut s, 0.5);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::OutOfBounds { .. })));
        assert!(s.is_stopped());
        assert_eq!(s.position(), s.clamped_stop());
    }

    #[test]
    fn test_track_clamp_flags_once() {
        let mut s = KinematicsSim::new(1);
        s.state.params.set("accel", 2.0).unwrap();
        s.state.params.set("track", 10.0).unwrap();
        s.reset();
        let events = run(&mut s, 5.0);
        assert_eq!(s.position(), 10.0);
        let flags = events
            .iter()
            .filter(|e| matches!(e, SimEvent::OutOfBounds { .. }))
            .count();
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_prediction_round() {
        let mut s = KinematicsSim::new(1);
        s.set_mode(Mode::Prediction);
        assert!(run(&mut s, 1.0).is_empty());
        assert_eq!(s.position(), 0.0);

        let size = s.state.viewport;
        let layout = Layout::new(size, s.state.value("track"));
        let click = layout.to_screen(16.0);
        let mut events = Vec::new();
        s.handle_click(click, size, &mut events);
        assert!((s.marker().unwrap() - 16.0).abs() < 1e-9);

        let events = run(&mut s, 6.0);
        let graded = events.iter().find_map(|e| match e {
            SimEvent::Graded { value, target, .. } => Some((*value, *target)),
            _ => None,
        });
        let (value, target) = graded.unwrap();
        assert!((value - 16.0).abs() < 1e-9);
        assert_eq!(target, s.clamped_stop());
    }
}
