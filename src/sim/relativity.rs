//! Special relativity: length contraction and time dilation
//!
//! A ship of proper length L₀ passes at speed β = v/c. The lab sees it
//! shortened to L₀/γ and its clock ticking at 1/γ.

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{
    Button, FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint,
    hidden_target,
};
use crate::audio::ToneCue;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_info_panel, draw_meter, energy_color, format_value};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Challenge];

/// Keeps 1 − β² strictly positive
pub const BETA_EPS: f64 = 1e-6;
pub const MAX_BETA: f64 = 0.995;
pub const GAMMA_TOLERANCE: f64 = 1.0;
const TARGET_GAMMA: (f64, f64) = (1.2, 6.0);
/// Screen speed of the ship at β = 1 (px/s)
const LIGHT_SPEED_PX: f64 = 220.0;
const TRAIL_INTERVAL: f64 = 0.08;

/// Lorentz factor with β clamped into [0, 1)
pub fn lorentz_factor(beta: f64) -> f64 {
    let beta = if beta.is_finite() { beta.abs().min(1.0 - BETA_EPS) } else { 0.0 };
    1.0 / (1.0 - beta * beta).sqrt()
}

/// β that produces `gamma`
pub fn beta_for(gamma: f64) -> f64 {
    let gamma = gamma.max(1.0);
    (1.0 - 1.0 / (gamma * gamma)).sqrt()
}

struct Layout {
    lane_y: f64,
    /// Pixels per metre of proper length
    scale: f64,
    clock_lab: DVec2,
    clock_ship: DVec2,
    clock_radius: f64,
    width: f64,
}

impl Layout {
    fn new(size: SurfaceSize) -> Self {
        let clock_radius = (size.height * 0.11).min(48.0);
        Self {
            lane_y: size.height * 0.35,
            scale: size.width * 0.004,
            clock_lab: DVec2::new(size.width * 0.25, size.height * 0.68),
            clock_ship: DVec2::new(size.width * 0.5, size.height * 0.68),
            clock_radius,
            width: size.width,
        }
    }
}

pub struct RelativitySim {
    state: SimulationState,
    mode: Mode,
    /// Ship nose position along the lane (px), wraps at the edge
    ship_x: f64,
    trail_timer: f64,
    rng: Pcg32,
    target_gamma: f64,
}

impl RelativitySim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("beta", "Speed", "c").range(0.0, MAX_BETA, 0.6).step(0.005),
                Param::new("length", "Proper length", "m").range(10.0, 100.0, 50.0).step(1.0),
            ],
            seed,
        );
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            ship_x: 0.0,
            trail_timer: 0.0,
            rng: Pcg32::seed_from_u64(seed),
            target_gamma: 1.0,
        };
        sim.new_target();
        sim
    }

    pub fn gamma(&self) -> f64 {
        lorentz_factor(self.state.value("beta"))
    }

    /// Ship clock reading, dilated against the lab clock
    pub fn proper_time(&self) -> f64 {
        self.state.sim_time / self.gamma()
    }

    pub fn contracted_length(&self) -> f64 {
        self.state.value("length") / self.gamma()
    }

    pub fn target_gamma(&self) -> f64 {
        self.target_gamma
    }

    fn new_target(&mut self) {
        self.target_gamma = hidden_target(&mut self.rng, TARGET_GAMMA.0, TARGET_GAMMA.1);
    }

    fn submit(&mut self, events: &mut Vec<SimEvent>) {
        let layout = Layout::new(self.state.viewport);
        events.push(SimEvent::Graded {
            value: self.gamma(),
            target: self.target_gamma,
            tolerance: GAMMA_TOLERANCE,
            at: DVec2::new(self.ship_x, layout.lane_y - 40.0),
        });
        self.new_target();
    }

    fn draw_clock(surface: &mut dyn Surface, center: DVec2, radius: f64, seconds: f64, label: &str) {
        surface.fill_circle(center, radius, palette::PANEL);
        surface.stroke_circle(center, radius, palette::PANEL_BORDER, 2.0);
        let angle = seconds / 60.0 * std::f64::consts::TAU - std::f64::consts::FRAC_PI_2;
        surface.line(center, center + crate::polar_to_cartesian(radius * 0.85, angle), palette::TEXT, 2.0);
        surface.text(
            &format!("{label}  {}s", format_value(seconds)),
            center + DVec2::new(0.0, radius + 8.0),
            TextStyle::new(12.0, palette::TEXT_DIM).centered(),
        );
    }
}

impl Simulation for RelativitySim {
    fn name(&self) -> &'static str {
        "relativity"
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
        self.ship_x = 0.0;
        self.trail_timer = 0.0;
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        self.state.advance(dt);
        let layout = Layout::new(self.state.viewport);
        let beta = self.state.value("beta");
        let ship = self.contracted_length() * layout.scale;
        self.ship_x += beta * LIGHT_SPEED_PX * dt;
        if self.ship_x - ship > layout.width {
            self.ship_x = 0.0;
        }

        self.trail_timer += dt;
        if beta > 0.3 && self.trail_timer >= TRAIL_INTERVAL {
            self.trail_timer = 0.0;
            events.push(SimEvent::Burst {
                kind: ParticleKind::Trail,
                at: DVec2::new(self.ship_x - ship, layout.lane_y),
                count: 1,
                color: with_alpha(energy_color(beta, 1.0), 0.6),
            });
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = Layout::new(size);
        let half_height = 12.0;
        match layer {
            Layer::Background => {
                surface.line(
                    DVec2::new(0.0, layout.lane_y + half_height + 4.0),
                    DVec2::new(size.width, layout.lane_y + half_height + 4.0),
                    palette::TRACK,
                    1.0,
                );
            }
            Layer::Overlays => {
                // Proper length for comparison
                let proper = self.state.value("length") * layout.scale;
                let y = layout.lane_y - half_height - 14.0;
                surface.stroke_rect(
                    DVec2::new(self.ship_x - proper, y - 4.0),
                    DVec2::new(proper, 8.0),
                    palette::GHOST,
                    1.0,
                );
                if self.mode == Mode::Challenge {
                    let target = self.state.value("length") / self.target_gamma * layout.scale;
                    surface.stroke_rect(
                        DVec2::new(self.ship_x - target, layout.lane_y - half_height - 3.0),
                        DVec2::new(target, half_height * 2.0 + 6.0),
                        with_alpha(palette::GOLD, 0.7),
                        1.5,
                    );
                }
            }
            Layer::Bodies => {
                let length = self.contracted_length() * layout.scale;
                let tail = self.ship_x - length;
                surface.fill_rect(
                    DVec2::new(tail, layout.lane_y - half_height),
                    DVec2::new(length, half_height * 2.0),
                    palette::ACCENT,
                );
                surface.fill_polygon(
                    &[
                        DVec2::new(self.ship_x, layout.lane_y - half_height),
                        DVec2::new(self.ship_x + 10.0, layout.lane_y),
                        DVec2::new(self.ship_x, layout.lane_y + half_height),
                    ],
                    palette::ACCENT,
                );
                let lab = if frame.reduced_motion { 0.0 } else { self.state.sim_time };
                let ship = if frame.reduced_motion { 0.0 } else { self.proper_time() };
                Self::draw_clock(surface, layout.clock_lab, layout.clock_radius, lab, "lab");
                Self::draw_clock(surface, layout.clock_ship, layout.clock_radius, ship, "ship");
            }
            Layer::Annotations => {
                surface.text(
                    &format!("{} m", format_value(self.contracted_length())),
                    DVec2::new(self.ship_x - self.contracted_length() * layout.scale * 0.5, layout.lane_y - 6.0),
                    TextStyle::new(11.0, palette::BACKGROUND).centered().bold(),
                );
            }
            Layer::Panels => {
                let gamma = self.gamma();
                let mut rows = vec![("β", format_value(self.state.value("beta")))];
                if self.mode != Mode::Challenge {
                    rows.push(("γ", format_value(gamma)));
                }
                rows.push(("L", format!("{} m", format_value(self.contracted_length()))));
                draw_info_panel(surface, DVec2::new(size.width - 170.0, 12.0), "Ship", &rows, frame.high_contrast);
                draw_meter(
                    surface,
                    DVec2::new(size.width - 170.0, 110.0),
                    DVec2::new(150.0, 10.0),
                    "β",
                    self.state.value("beta"),
                    (0.0, 1.0),
                    energy_color(self.state.value("beta"), 1.0),
                );
                if self.mode == Mode::Challenge {
                    Button::bottom_right(size).draw(surface, "Submit β");
                    draw_hint(surface, "Match the ship to the gold outline");
                } else {
                    draw_hint(surface, "Use ← → to change speed");
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        if self.mode == Mode::Challenge && Button::bottom_right(size).contains(point) {
            self.submit(events);
        }
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        match key {
            Key::Submit if self.mode == Mode::Challenge => self.submit(events),
            Key::Left | Key::Right => {
                let steps = if key == Key::Right { 1.0 } else { -1.0 };
                match self.state.params.nudge("beta", steps) {
                    Ok(_) => self.on_param_changed("beta"),
                    Err(e) => log::warn!("relativity: {e}"),
                }
            }
            _ => {}
        }
    }

    fn audio_cue(&self) -> Option<ToneCue> {
        Some(ToneCue::new(
            f64::from(ToneCue::pitch_for(self.gamma(), (1.0, lorentz_factor(MAX_BETA)))),
            0.25,
        ))
    }
}
