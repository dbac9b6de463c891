//! Carnot cycle
//!
//! The four strokes are evaluated in closed form from the cycle phase:
//! isothermal expansion at T_h, adiabatic expansion, isothermal compression
//! at T_c, adiabatic compression. Volume interpolates geometrically within
//! each stroke; temperature follows T·V^(γ−1) = const on the adiabats.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{
    Button, FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint,
    hidden_target,
};
use crate::guard_denominator;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_graph_frame, draw_info_panel, energy_color, format_value};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Challenge];

/// Monatomic ideal gas
pub const GAMMA: f64 = 5.0 / 3.0;
/// Gas constant (J/(mol·K))
pub const R: f64 = 8.314;
/// Smallest allowed gap between the reservoirs (K)
const MIN_GAP: f64 = 1.0;
const PV_SAMPLES: usize = 24;

/// Cycle stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    HotIsotherm,
    AdiabaticExpansion,
    ColdIsotherm,
    AdiabaticCompression,
}

impl Stroke {
    fn from_index(i: usize) -> Self {
        match i % 4 {
            0 => Stroke::HotIsotherm,
            1 => Stroke::AdiabaticExpansion,
            2 => Stroke::ColdIsotherm,
            _ => Stroke::AdiabaticCompression,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stroke::HotIsotherm => "isothermal expansion",
            Stroke::AdiabaticExpansion => "adiabatic expansion",
            Stroke::ColdIsotherm => "isothermal compression",
            Stroke::AdiabaticCompression => "adiabatic compression",
        }
    }
}

/// Thermodynamic state at one point of the cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasState {
    pub volume: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub stroke: Stroke,
}

/// Closed-form Carnot cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Carnot {
    pub t_hot: f64,
    pub t_cold: f64,
    pub v1: f64,
    pub v2: f64,
    pub moles: f64,
}

impl Carnot {
    fn ratio(&self) -> f64 {
        (self.t_hot / guard_denominator(self.t_cold)).powf(1.0 / (GAMMA - 1.0))
    }

    pub fn v3(&self) -> f64 {
        self.v2 * self.ratio()
    }

    pub fn v4(&self) -> f64 {
        self.v1 * self.ratio()
    }

    pub fn efficiency(&self) -> f64 {
        1.0 - self.t_cold / guard_denominator(self.t_hot)
    }

    /// Net work per cycle (J)
    pub fn work(&self) -> f64 {
        self.moles * R * (self.t_hot - self.t_cold) * (self.v2 / guard_denominator(self.v1)).ln()
    }

    /// Heat drawn from the hot reservoir per cycle (J)
    pub fn heat_in(&self) -> f64 {
        self.moles * R * self.t_hot * (self.v2 / guard_denominator(self.v1)).ln()
    }

    /// State at cycle phase in [0, 1). With volumes in litres the pressure
    /// comes out in kPa.
    pub fn state_at(&self, phase: f64) -> GasState {
        let phase = phase.rem_euclid(1.0) * 4.0;
        let index = (phase.floor() as usize).min(3);
        let s = phase - index as f64;
        let stroke = Stroke::from_index(index);
        let (va, vb, ta) = match stroke {
            Stroke::HotIsotherm => (self.v1, self.v2, self.t_hot),
            Stroke::AdiabaticExpansion => (self.v2, self.v3(), self.t_hot),
            Stroke::ColdIsotherm => (self.v3(), self.v4(), self.t_cold),
            Stroke::AdiabaticCompression => (self.v4(), self.v1, self.t_cold),
        };
        let volume = va * (vb / guard_denominator(va)).powf(s);
        let temperature = match stroke {
            Stroke::HotIsotherm | Stroke::ColdIsotherm => ta,
            _ => ta * (va / guard_denominator(volume)).powf(GAMMA - 1.0),
        };
        GasState {
            volume,
            temperature,
            pressure: self.moles * R * temperature / guard_denominator(volume),
            stroke,
        }
    }
}

pub struct ThermoSim {
    state: SimulationState,
    mode: Mode,
    stroke: Stroke,
    rng: Pcg32,
}

impl ThermoSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("t_hot", "Hot reservoir", "K").range(300.0, 1000.0, 600.0).step(10.0),
                Param::new("t_cold", "Cold reservoir", "K").range(100.0, 500.0, 300.0).step(10.0),
                Param::new("v1", "Initial volume", "L").range(1.0, 5.0, 1.0).step(0.1),
                Param::new("ratio", "Expansion ratio", "").range(1.5, 5.0, 3.0).step(0.1),
                Param::new("moles", "Amount", "mol").range(0.5, 3.0, 1.0).step(0.1),
                Param::new("period", "Cycle period", "s").range(2.0, 12.0, 6.0).step(0.5),
                Param::new("guess", "Efficiency guess", "").range(0.0, 1.0, 0.5).step(0.01),
            ],
            seed,
        );
        Self {
            state,
            mode: Mode::Sandbox,
            stroke: Stroke::HotIsotherm,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn cycle(&self) -> Carnot {
        let t_hot = self.state.value("t_hot");
        let v1 = self.state.value("v1");
        Carnot {
            t_hot,
            t_cold: self.state.value("t_cold").min(t_hot - MIN_GAP),
            v1,
            v2: v1 * self.state.value("ratio"),
            moles: self.state.value("moles"),
        }
    }

    pub fn phase(&self) -> f64 {
        (self.state.sim_time / guard_denominator(self.state.value("period"))).rem_euclid(1.0)
    }

    pub fn gas(&self) -> GasState {
        self.cycle().state_at(self.phase())
    }

    /// Pick fresh reservoir temperatures for the next question
    fn new_question(&mut self) {
        let t_hot = hidden_target(&mut self.rng, 400.0, 1000.0).round();
        let t_cold = hidden_target(&mut self.rng, 100.0, (t_hot - 50.0).min(500.0)).round();
        for (key, value) in [("t_hot", t_hot), ("t_cold", t_cold)] {
            if let Err(e) = self.state.params.set(key, value) {
                log::warn!("thermo: {e}");
            }
        }
    }

    fn submit(&mut self, events: &mut Vec<SimEvent>) {
        events.push(SimEvent::Graded {
            value: self.state.value("guess"),
            target: self.cycle().efficiency(),
            tolerance: 0.2,
            at: Button::bottom_right(self.state.viewport).center() - DVec2::new(0.0, 40.0),
        });
        self.new_question();
    }

    fn cylinder(size: SurfaceSize) -> (DVec2, DVec2) {
        let pos = DVec2::new(size.width * 0.1, size.height * 0.25);
        (pos, DVec2::new(size.width * 0.18, size.height * 0.5))
    }

    fn pv_box(size: SurfaceSize) -> (DVec2, DVec2) {
        (
            DVec2::new(size.width * 0.45, size.height * 0.12),
            DVec2::new(size.width * 0.5, size.height * 0.62),
        )
    }
}

impl Simulation for ThermoSim {
    fn name(&self) -> &'static str {
        "thermo"
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
            self.new_question();
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
        self.stroke = Stroke::HotIsotherm;
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        self.state.advance(dt);
        let stroke = self.gas().stroke;
        if stroke != self.stroke {
            self.stroke = stroke;
            let (pos, size) = Self::cylinder(self.state.viewport);
            let color = match stroke {
                Stroke::HotIsotherm => palette::WARM,
                Stroke::ColdIsotherm => palette::ACCENT,
                _ => palette::TEXT_DIM,
            };
            events.push(SimEvent::Burst {
                kind: ParticleKind::Glow,
                at: pos + DVec2::new(size.x * 0.5, size.y),
                count: 6,
                color,
            });
        }
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let cycle = self.cycle();
        let gas = self.gas();
        let (cyl_pos, cyl_size) = Self::cylinder(size);
        let (pv_pos, pv_size) = Self::pv_box(size);

        // PV mapping with volume on x, pressure on y
        let v_max = cycle.v3() * 1.05;
        let p_max = cycle.state_at(0.0).pressure * 1.1;
        let to_pv = |v: f64, p: f64| {
            pv_pos
                + DVec2::new(
                    pv_size.x * (v / guard_denominator(v_max)),
                    pv_size.y * (1.0 - p / guard_denominator(p_max)),
                )
        };
        // Piston height follows volume between V1 and V3
        let fill = ((gas.volume - cycle.v1) / guard_denominator(cycle.v3() - cycle.v1)).clamp(0.0, 1.0);
        let gas_height = cyl_size.y * (0.25 + 0.7 * fill);
        let piston_y = cyl_pos.y + cyl_size.y - gas_height;

        match layer {
            Layer::Background => {
                surface.stroke_rect(cyl_pos, cyl_size, palette::TRACK, 3.0);
                draw_graph_frame(surface, pv_pos, pv_size, "P–V diagram");
            }
            Layer::Overlays => {
                let reservoir = match gas.stroke {
                    Stroke::HotIsotherm => Some(palette::BAD),
                    Stroke::ColdIsotherm => Some(palette::ACCENT),
                    _ => None,
                };
                if let Some(color) = reservoir {
                    surface.fill_rect(
                        cyl_pos + DVec2::new(-10.0, cyl_size.y + 4.0),
                        DVec2::new(cyl_size.x + 20.0, 16.0),
                        with_alpha(color, 0.8),
                    );
                }
                let path: Vec<DVec2> = (0..=PV_SAMPLES * 4)
                    .map(|i| {
                        let g = cycle.state_at(i as f64 / (PV_SAMPLES * 4) as f64);
                        to_pv(g.volume, g.pressure)
                    })
                    .collect();
                surface.polyline(&path, palette::ACCENT, 2.0);
            }
            Layer::Bodies => {
                let t_frac = (gas.temperature - cycle.t_cold) / guard_denominator(cycle.t_hot - cycle.t_cold);
                surface.fill_rect(
                    DVec2::new(cyl_pos.x + 2.0, piston_y),
                    DVec2::new(cyl_size.x - 4.0, gas_height - 2.0),
                    energy_color(t_frac, 0.55),
                );
                surface.fill_rect(
                    DVec2::new(cyl_pos.x + 2.0, piston_y - 10.0),
                    DVec2::new(cyl_size.x - 4.0, 10.0),
                    palette::TEXT_DIM,
                );
                // Jiggling molecules, faster when hotter
                let speed = gas.temperature / 300.0;
                for i in 0..12 {
                    let fi = i as f64;
                    let wobble = if frame.reduced_motion { 0.0 } else { frame.time * speed };
                    let u = 0.5 + 0.42 * ((fi * 1.7 + wobble * (1.0 + fi * 0.13)) * 1.3).sin();
                    let v = 0.5 + 0.42 * ((fi * 2.3 + wobble * (0.8 + fi * 0.11)) * TAU / 3.0).cos();
                    surface.fill_circle(
                        DVec2::new(cyl_pos.x + 6.0 + u * (cyl_size.x - 12.0), piston_y + 4.0 + v * (gas_height - 10.0)),
                        3.0,
                        palette::TEXT,
                    );
                }
                surface.fill_circle(to_pv(gas.volume, gas.pressure), 6.0, palette::GOLD);
            }
            Layer::Annotations => {
                surface.text(
                    gas.stroke.label(),
                    cyl_pos + DVec2::new(cyl_size.x * 0.5, -14.0),
                    TextStyle::new(12.0, palette::TEXT).centered(),
                );
                for (label, phase) in [("1", 0.0), ("2", 0.25), ("3", 0.5), ("4", 0.75)] {
                    let g = cycle.state_at(phase);
                    surface.text(
                        label,
                        to_pv(g.volume, g.pressure) + DVec2::new(8.0, -8.0),
                        TextStyle::new(11.0, palette::TEXT_DIM),
                    );
                }
            }
            Layer::Panels => {
                let mut rows = vec![
                    ("T_h", format!("{} K", format_value(cycle.t_hot))),
                    ("T_c", format!("{} K", format_value(cycle.t_cold))),
                    ("T", format!("{} K", format_value(gas.temperature))),
                    ("P", format!("{} kPa", format_value(gas.pressure))),
                ];
                if self.mode == Mode::Challenge {
                    rows.push(("guess η", format!("{:.0}%", self.state.value("guess") * 100.0)));
                } else {
                    rows.push(("η", format!("{:.1}%", cycle.efficiency() * 100.0)));
                    rows.push(("W", format!("{} J", format_value(cycle.work()))));
                }
                draw_info_panel(
                    surface,
                    DVec2::new(12.0, size.height * 0.8),
                    "Carnot engine",
                    &rows[..2],
                    frame.high_contrast,
                );
                draw_info_panel(
                    surface,
                    DVec2::new(size.width * 0.45, size.height * 0.78),
                    "State",
                    &rows[2..],
                    frame.high_contrast,
                );
                if self.mode == Mode::Challenge {
                    Button::bottom_right(size).draw(surface, "Submit η");
                    draw_hint(surface, "Estimate the efficiency from the reservoir temperatures");
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
        if self.mode != Mode::Challenge {
            return;
        }
        match key {
            Key::Submit => self.submit(events),
            Key::Up | Key::Right | Key::Down | Key::Left => {
                let steps = if matches!(key, Key::Up | Key::Right) { 1.0 } else { -1.0 };
                match self.state.params.nudge("guess", steps) {
                    Ok(_) => self.on_param_changed("guess"),
                    Err(e) => log::warn!("thermo: {e}"),
                }
            }
            _ => {}
        }
    }

    fn energy(&self) -> Option<f64> {
        // Internal energy of the gas
        Some(1.5 * self.state.value("moles") * R * self.gas().temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carnot() -> Carnot {
        Carnot {
            t_hot: 600.0,
            t_cold: 300.0,
            v1: 1.0,
            v2: 3.0,
            moles: 1.0,
        }
    }

    #[test]
    fn test_efficiency_and_work() {
        let c = carnot();
        assert!((c.efficiency() - 0.5).abs() < 1e-12);
        let expected = R * 300.0 * 3f64.ln();
        assert!((c.work() - expected).abs() < 1e-9);
        assert!((c.work() / c.heat_in() - c.efficiency()).abs() < 1e-12);
    }

    #[test]
    fn test_adiabat_volumes() {
        let c = carnot();
        // (T_h / T_c)^(1/(γ−1)) = 2^1.5
        let ratio = 2f64.powf(1.5);
        assert!((c.v3() - 3.0 * ratio).abs() < 1e-9);
        assert!((c.v4() - ratio).abs() < 1e-9);
    }

    #[test]
    fn test_corners_match() {
        let c = carnot();
        let corners = [
            (0.0, c.v1, 600.0),
            (0.25, c.v2, 600.0),
            (0.5, c.v3(), 300.0),
            (0.75, c.v4(), 300.0),
        ];
        for (phase, v, t) in corners {
            let g = c.state_at(phase);
            assert!((g.volume - v).abs() < 1e-9, "phase {phase}");
            assert!((g.temperature - t).abs() < 1e-6, "phase {phase}");
        }
        // End of the cycle wraps to the start
        let end = c.state_at(0.999_999);
        assert!((end.volume - c.v1).abs() < 1e-3);
    }

    #[test]
    fn test_adiabats_reach_reservoir_temperatures() {
        let c = carnot();
        let g = c.state_at(0.5 - 1e-9);
        assert!((g.temperature - 300.0).abs() < 1e-3);
        let g = c.state_at(1.0 - 1e-9);
        assert!((g.temperature - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_cold_reservoir_kept_below_hot() {
        let mut s = ThermoSim::new(1);
        s.state.params.set("t_hot", 300.0).unwrap();
        s.state.params.set("t_cold", 500.0).unwrap();
        let c = s.cycle();
        assert!(c.t_cold < c.t_hot);
        assert!(c.efficiency() > 0.0);
        assert!(s.gas().pressure.is_finite());
    }

    #[test]
    fn test_stroke_changes_emit_bursts() {
        let mut s = ThermoSim::new(1);
        let mut events = Vec::new();
        for _ in 0..(6 * 60) {
            s.step(1.0 / 60.0, &mut events);
        }
        let bursts = events
            .iter()
            .filter(|e| matches!(e, SimEvent::Burst { .. }))
            .count();
        // Three stroke changes in one period, plus possibly the wrap
        assert!((3..=4).contains(&bursts));
    }

    #[test]
    fn test_guess_keys_only_in_challenge() {
        let mut s = ThermoSim::new(8);
        let mut events = Vec::new();
        s.handle_key(Key::Up, &mut events);
        assert_eq!(s.state.value("guess"), 0.5);
        s.set_mode(Mode::Challenge);
        s.handle_key(Key::Up, &mut events);
        s.handle_key(Key::Up, &mut events);
        s.handle_key(Key::Left, &mut events);
        assert!((s.state.value("guess") - 0.51).abs() < 1e-12);
    }

    #[test]
    fn test_challenge_grades_efficiency() {
        let mut s = ThermoSim::new(8);
        s.set_mode(Mode::Challenge);
        let eta = s.cycle().efficiency();
        s.state.params.set("guess", eta).unwrap();
        let mut events = Vec::new();
        s.handle_key(Key::Submit, &mut events);
        match events.as_slice() {
            [SimEvent::Graded { value, target, tolerance, .. }] => {
                assert!((value - target).abs() < 0.006);
                assert!((target - eta).abs() < 1e-12);
                assert_eq!(*tolerance, 0.2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
