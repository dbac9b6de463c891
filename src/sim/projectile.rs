//! Projectile motion
//!
//! Closed form: x = v₀·cosθ·t, y = v₀·sinθ·t − ½·g·t². The body is latched
//! at the analytic landing point once t reaches the flight time.

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{
    FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint, hidden_target,
};
use crate::audio::SoundEffect;
use crate::consts::GRAVITY;
use crate::guard_denominator;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_arrow, draw_info_panel, draw_target_marker, format_value};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Challenge];
const PATH_SAMPLES: usize = 48;

/// Analytic flight: position at `t`, flight time and range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flight {
    pub speed: f64,
    pub angle: f64,
    pub gravity: f64,
}

impl Flight {
    pub fn flight_time(&self) -> f64 {
        2.0 * self.speed * self.angle.sin() / guard_denominator(self.gravity)
    }

    pub fn range(&self) -> f64 {
        self.speed * self.speed * (2.0 * self.angle).sin() / guard_denominator(self.gravity)
    }

    pub fn apex(&self) -> f64 {
        let vy = self.speed * self.angle.sin();
        vy * vy / (2.0 * guard_denominator(self.gravity))
    }

    /// Position at `t`, latched at the landing point after touchdown
    pub fn position(&self, t: f64) -> DVec2 {
        let t = t.clamp(0.0, self.flight_time().max(0.0));
        let (s, c) = self.angle.sin_cos();
        let y = self.speed * s * t - 0.5 * self.gravity * t * t;
        DVec2::new(self.speed * c * t, y.max(0.0))
    }

    pub fn velocity(&self, t: f64) -> DVec2 {
        if t >= self.flight_time() {
            return DVec2::ZERO;
        }
        let (s, c) = self.angle.sin_cos();
        DVec2::new(self.speed * c, self.speed * s - self.gravity * t.max(0.0))
    }
}

struct Layout {
    origin: DVec2,
    px_per_m: f64,
}

impl Layout {
    fn new(size: SurfaceSize, field: f64, apex: f64) -> Self {
        let origin = DVec2::new(size.width * 0.08, size.height * 0.82);
        let horizontal = size.width * 0.84 / guard_denominator(field);
        let vertical = size.height * 0.65 / apex.max(1.0);
        Self {
            origin,
            px_per_m: horizontal.min(vertical),
        }
    }

    fn to_screen(&self, p: DVec2) -> DVec2 {
        self.origin + DVec2::new(p.x, -p.y) * self.px_per_m
    }
}

pub struct ProjectileSim {
    state: SimulationState,
    mode: Mode,
    launched: bool,
    landed: bool,
    clamped: bool,
    /// Horizontal position (m) after the field clamp
    x: f64,
    y: f64,
    rng: Pcg32,
    target: f64,
}

impl ProjectileSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("speed", "Launch speed", "m/s").range(5.0, 40.0, 20.0).step(0.5),
                Param::new("angle", "Launch angle", "°").range(5.0, 85.0, 45.0).step(1.0),
                Param::new("gravity", "Gravity", "m/s²").range(1.0, 25.0, GRAVITY).step(0.1),
                Param::new("field", "Field length", "m").range(10.0, 100.0, 60.0).step(5.0),
            ],
            seed,
        );
        let mut rng = Pcg32::seed_from_u64(seed);
        let field = state.value("field");
        let target = hidden_target(&mut rng, 0.3 * field, 0.9 * field);
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            launched: false,
            landed: false,
            clamped: false,
            x: 0.0,
            y: 0.0,
            rng,
            target,
        };
        sim.reset();
        sim
    }

    pub fn flight(&self) -> Flight {
        Flight {
            speed: self.state.value("speed"),
            angle: self.state.value("angle").to_radians(),
            gravity: self.state.value("gravity"),
        }
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn has_landed(&self) -> bool {
        self.landed
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Landing distance after the field clamp
    pub fn clamped_landing(&self) -> f64 {
        self.flight().range().min(self.state.value("field"))
    }

    fn layout(&self, size: SurfaceSize) -> Layout {
        Layout::new(size, self.state.value("field"), self.flight().apex())
    }

    fn launch(&mut self, events: &mut Vec<SimEvent>) {
        self.state.reset_time();
        self.launched = true;
        self.landed = false;
        self.clamped = false;
        self.x = 0.0;
        self.y = 0.0;
        events.push(SimEvent::Sound(SoundEffect::Launch));
    }

    fn new_target(&mut self) {
        let field = self.state.value("field");
        self.target = hidden_target(&mut self.rng, 0.3 * field, 0.9 * field);
    }
}

impl Simulation for ProjectileSim {
    fn name(&self) -> &'static str {
        "projectile"
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
        // Sandbox fires immediately; challenges wait for a launch
        self.launched = self.mode == Mode::Sandbox;
        self.landed = false;
        self.clamped = false;
        self.x = 0.0;
        self.y = 0.0;
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        if !self.launched || self.landed {
            return;
        }
        self.state.advance(dt);

        let flight = self.flight();
        let field = self.state.value("field");
        let p = flight.position(self.state.sim_time);
        self.x = p.x.min(field);
        self.y = p.y;

        let layout = self.layout(self.state.viewport);
        if p.x > field && !self.clamped {
            self.clamped = true;
            events.push(SimEvent::OutOfBounds {
                at: layout.to_screen(DVec2::new(field, self.y)),
            });
        }

        if self.state.sim_time >= flight.flight_time() {
            self.landed = true;
            self.y = 0.0;
            let at = layout.to_screen(DVec2::new(self.x, 0.0));
            events.push(SimEvent::Burst {
                kind: ParticleKind::Spark,
                at,
                count: 14,
                color: palette::WARM,
            });
            events.push(SimEvent::Sound(SoundEffect::Impact));
            if self.mode == Mode::Challenge {
                events.push(SimEvent::Graded {
                    value: self.x,
                    target: self.target,
                    tolerance: field * 0.1,
                    at: at - DVec2::new(0.0, 40.0),
                });
                self.new_target();
            }
        } else if self.mode == Mode::Sandbox {
            events.push(SimEvent::Burst {
                kind: ParticleKind::Trail,
                at: layout.to_screen(self.position()),
                count: 1,
                color: palette::ACCENT,
            });
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = self.layout(size);
        let field = self.state.value("field");
        let flight = self.flight();

        match layer {
            Layer::Background => {
                let end = layout.to_screen(DVec2::new(field, 0.0));
                surface.line(
                    DVec2::new(0.0, layout.origin.y),
                    DVec2::new(size.width, layout.origin.y),
                    palette::TRACK,
                    2.0,
                );
                surface.line(end, end - DVec2::new(0.0, 40.0), palette::BAD, 2.0);
                // Distance ticks every 10 m
                let mut d = 10.0;
                while d < field {
                    let p = layout.to_screen(DVec2::new(d, 0.0));
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
                if self.mode == Mode::Challenge {
                    let center = layout.to_screen(DVec2::new(self.target, 0.0));
                    draw_target_marker(surface, center, 14.0, palette::GOLD, frame.time, frame.reduced_motion);
                } else {
                    let tf = flight.flight_time().max(0.0);
                    let path: Vec<DVec2> = (0..=PATH_SAMPLES)
                        .map(|i| {
                            let mut p = flight.position(tf * i as f64 / PATH_SAMPLES as f64);
                            p.x = p.x.min(field);
                            layout.to_screen(p)
                        })
                        .collect();
                    surface.polyline(&path, palette::GHOST, 1.5);
                }
            }
            Layer::Bodies => {
                // Launcher barrel
                let (s, c) = flight.angle.sin_cos();
                surface.line(
                    layout.origin,
                    layout.origin + DVec2::new(c, -s) * 28.0,
                    palette::TEXT_DIM,
                    6.0,
                );
                if self.launched {
                    surface.fill_circle(layout.to_screen(self.position()), 7.0, palette::WARM);
                }
            }
            Layer::Annotations => {
                if self.launched && !self.landed {
                    let v = flight.velocity(self.state.sim_time);
                    draw_arrow(
                        surface,
                        layout.to_screen(self.position()),
                        DVec2::new(v.x, -v.y) * 2.0,
                        palette::ACCENT,
                        2.0,
                    );
                }
                if self.landed {
                    let p = layout.to_screen(DVec2::new(self.x, 0.0));
                    surface.text(
                        &format!("{} m", format_value(self.x)),
                        p - DVec2::new(0.0, 18.0),
                        TextStyle::new(12.0, palette::TEXT).centered(),
                    );
                }
            }
            Layer::Panels => {
                let mut rows = vec![
                    ("v₀", format!("{} m/s", format_value(flight.speed))),
                    ("θ", format!("{}°", format_value(self.state.value("angle")))),
                    ("t", format!("{} s", format_value(self.state.sim_time))),
                    ("range", format!("{} m", format_value(flight.range()))),
                    ("apex", format!("{} m", format_value(flight.apex()))),
                ];
                if self.mode == Mode::Challenge {
                    rows.truncate(3);
                }
                draw_info_panel(surface, DVec2::new(12.0, 12.0), "Projectile", &rows, frame.high_contrast);
                match self.mode {
                    Mode::Challenge if !self.launched || self.landed => {
                        draw_hint(surface, "Set speed and angle to land on the target, then press Space or click")
                    }
                    Mode::Sandbox if self.landed => draw_hint(surface, "Click or press Space to fire again"),
                    _ => {}
                }
                if self.clamped {
                    let end = layout.to_screen(DVec2::new(field, 0.0));
                    surface.text(
                        "out of field",
                        end - DVec2::new(0.0, 52.0),
                        TextStyle::new(11.0, with_alpha(palette::BAD, 0.9)).centered(),
                    );
                }
            }
        }
    }

    fn handle_click(&mut self, _point: DVec2, _size: SurfaceSize, events: &mut Vec<SimEvent>) {
        if !self.launched || self.landed {
            self.launch(events);
        }
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        match key {
            Key::Launch | Key::Submit if !self.launched || self.landed => self.launch(events),
            Key::Up | Key::Down => {
                let steps = if key == Key::Up { 1.0 } else { -1.0 };
                if self.state.params.nudge("angle", steps).is_ok() {
                    self.on_param_changed("angle");
                }
            }
            Key::Left | Key::Right => {
                let steps = if key == Key::Right { 1.0 } else { -1.0 };
                if self.state.params.nudge("speed", steps).is_ok() {
                    self.on_param_changed("speed");
                }
            }
            _ => {}
        }
    }

    fn on_param_changed(&mut self, key: &str) {
        if key == "field" && self.mode == Mode::Challenge {
            self.new_target();
        }
        // A parameter change mid-flight would teleport the body
        if self.mode == Mode::Sandbox || !self.launched {
            self.reset();
        }
    }

    fn energy(&self) -> Option<f64> {
        // Per unit mass
        let v = self.flight().velocity(self.state.sim_time);
        Some(0.5 * v.length_squared() + self.state.value("gravity") * self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sim: &mut ProjectileSim, seconds: f64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let steps = (seconds * 60.0) as usize;
        for _ in 0..steps {
            sim.step(1.0 / 60.0, &mut events);
        }
        events
    }

    #[test]
    fn test_range_at_45_degrees() {
        let f = Flight {
            speed: 20.0,
            angle: 45f64.to_radians(),
            gravity: 9.81,
        };
        assert!((f.range() - 400.0 / 9.81).abs() < 1e-9);
        assert!((f.position(f.flight_time()).x - f.range()).abs() < 1e-9);
    }

    #[test]
    fn test_landing_is_latched() {
        let mut s = ProjectileSim::new(1);
        run(&mut s, 5.0);
        assert!(s.has_landed());
        let expected = s.flight().range();
        assert!((s.position().x - expected).abs() < 1e-9);
        assert_eq!(s.position().y, 0.0);
        // Further steps do not move it
        run(&mut s, 1.0);
        assert!((s.position().x - expected).abs() < 1e-9);
    }

    #[test]
    fn test_landing_beyond_field_is_clamped_once() {
        let mut s = ProjectileSim::new(1);
        s.state.params.set("field", 10.0).unwrap();
        s.reset();
        let events = run(&mut s, 5.0);
        assert_eq!(s.position().x, 10.0);
        let flags = events
            .iter()
            .filter(|e| matches!(e, SimEvent::OutOfBounds { .. }))
            .count();
        assert_eq!(flags, 1);
    }

    #[test]
    fn test_challenge_waits_for_launch_and_grades() {
        let mut s = ProjectileSim::new(5);
        s.set_mode(Mode::Challenge);
        assert!(run(&mut s, 1.0).is_empty());

        let target = s.target();
        let mut events = Vec::new();
        s.handle_key(Key::Launch, &mut events);
        events.extend(run(&mut s, 6.0));
        let graded: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Graded { value, target, .. } => Some((*value, *target)),
                _ => None,
            })
            .collect();
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].1, target);
        assert!((graded[0].0 - s.clamped_landing()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_gravity_guarded() {
        let f = Flight {
            speed: 10.0,
            angle: 0.5,
            gravity: 0.0,
        };
        assert!(f.range().is_finite());
        assert!(f.position(1.0).x.is_finite());
    }
}
