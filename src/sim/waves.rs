//! Two-wave superposition
//!
//! y(x, t) = A₁·sin(k₁x − ω₁t) + A₂·sin(k₂x − ω₂t + φ), with x and the
//! amplitudes in screen pixels.

use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{
    Button, FrameInfo, Mode, Param, SimEvent, Simulation, SimulationState, draw_hint,
    hidden_target,
};
use crate::audio::ToneCue;
use crate::error::Result;
use crate::input::Key;
use crate::normalize_angle;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_info_panel, format_value};
use crate::renderer::{Layer, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Challenge];

/// Resultant envelope below this many pixels counts as a node
pub const NODE_THRESHOLD_PX: f64 = 2.0;
/// Phase distance from π treated as exact opposition (radians)
pub const PHASE_EPS: f64 = 0.02;
/// Relative wavenumber/frequency mismatch still treated as identical
const MATCH_EPS: f64 = 1e-6;
pub const MAX_PROBES: usize = 3;
const SAMPLE_STEP_PX: f64 = 3.0;

/// The two component waves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub a1: f64,
    pub k1: f64,
    pub w1: f64,
    pub a2: f64,
    pub k2: f64,
    pub w2: f64,
    pub phase: f64,
}

impl Superposition {
    pub fn first(&self, x: f64, t: f64) -> f64 {
        self.a1 * (self.k1 * x - self.w1 * t).sin()
    }

    pub fn second(&self, x: f64, t: f64) -> f64 {
        self.a2 * (self.k2 * x - self.w2 * t + self.phase).sin()
    }

    pub fn displacement(&self, x: f64, t: f64) -> f64 {
        self.first(x, t) + self.second(x, t)
    }

    /// Local amplitude of the resultant
    pub fn envelope(&self, x: f64, t: f64) -> f64 {
        let beat = (self.k2 - self.k1) * x - (self.w2 - self.w1) * t + self.phase;
        (self.a1 * self.a1 + self.a2 * self.a2 + 2.0 * self.a1 * self.a2 * beat.cos())
            .max(0.0)
            .sqrt()
    }

    /// Resultant amplitude of two waves sharing k and ω
    pub fn resultant_amplitude(&self) -> f64 {
        (self.a1 * self.a1 + self.a2 * self.a2 + 2.0 * self.a1 * self.a2 * self.phase.cos())
            .max(0.0)
            .sqrt()
    }

    /// Identical waves in exact opposition
    pub fn is_perfect_cancellation(&self) -> bool {
        let same = |a: f64, b: f64| (a - b).abs() <= MATCH_EPS * a.abs().max(b.abs()).max(1.0);
        same(self.k1, self.k2)
            && same(self.w1, self.w2)
            && (self.a1 - self.a2).abs() < NODE_THRESHOLD_PX
            && (normalize_angle(self.phase).abs() - PI).abs() < PHASE_EPS
    }

    /// Centers of node runs over `0..width`
    pub fn nodes(&self, width: f64, t: f64) -> Vec<f64> {
        let mut nodes = Vec::new();
        let mut run: Option<(f64, f64)> = None;
        let mut x = 0.0;
        while x <= width {
            if self.envelope(x, t) < NODE_THRESHOLD_PX {
                run = Some(run.map_or((x, x), |(start, _)| (start, x)));
            } else if let Some((start, end)) = run.take() {
                nodes.push((start + end) * 0.5);
            }
            x += 1.0;
        }
        if let Some((start, end)) = run {
            nodes.push((start + end) * 0.5);
        }
        nodes
    }
}

struct Layout {
    left: f64,
    width: f64,
    rows: [f64; 3],
}

impl Layout {
    fn new(size: SurfaceSize) -> Self {
        Self {
            left: size.width * 0.05,
            width: size.width * 0.9,
            rows: [size.height * 0.22, size.height * 0.42, size.height * 0.7],
        }
    }
}

pub struct WavesSim {
    state: SimulationState,
    mode: Mode,
    /// Probe positions in wave coordinates (px from the left edge)
    probes: VecDeque<f64>,
    cancelled: bool,
    rng: Pcg32,
    target: f64,
}

impl WavesSim {
    pub fn new(seed: u64) -> Self {
        let state = SimulationState::new(
            vec![
                Param::new("a1", "Amplitude 1", "px").range(0.0, 60.0, 40.0).step(1.0),
                Param::new("k1", "Wavenumber 1", "rad/px").range(0.01, 0.1, 0.03).step(0.001),
                Param::new("w1", "Angular freq 1", "rad/s").range(0.5, 10.0, 3.0).step(0.1),
                Param::new("a2", "Amplitude 2", "px").range(0.0, 60.0, 40.0).step(1.0),
                Param::new("k2", "Wavenumber 2", "rad/px").range(0.01, 0.1, 0.03).step(0.001),
                Param::new("w2", "Angular freq 2", "rad/s").range(0.5, 10.0, 3.0).step(0.1),
                Param::new("phase", "Phase offset", "rad").range(0.0, TAU, 0.0).step(0.01),
            ],
            seed,
        );
        let mut sim = Self {
            state,
            mode: Mode::Sandbox,
            probes: VecDeque::with_capacity(MAX_PROBES),
            cancelled: false,
            rng: Pcg32::seed_from_u64(seed),
            target: 0.0,
        };
        sim.new_target();
        sim
    }

    pub fn waves(&self) -> Superposition {
        Superposition {
            a1: self.state.value("a1"),
            k1: self.state.value("k1"),
            w1: self.state.value("w1"),
            a2: self.state.value("a2"),
            k2: self.state.value("k2"),
            w2: self.state.value("w2"),
            phase: self.state.value("phase"),
        }
    }

    pub fn probes(&self) -> impl Iterator<Item = f64> + '_ {
        self.probes.iter().copied()
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Copy wave `key` onto its partner so both waves share k and ω.
    /// The source is written back in case the partner clamped it.
    fn match_partner(&mut self, key: &str) -> Result<()> {
        let partner = match key {
            "k1" => "k2",
            "k2" => "k1",
            "w1" => "w2",
            "w2" => "w1",
            _ => return Ok(()),
        };
        let stored = self.state.params.set(partner, self.state.value(key))?;
        self.state.params.set(key, stored)?;
        Ok(())
    }

    fn new_target(&mut self) {
        let w = self.waves();
        self.target = hidden_target(&mut self.rng, (w.a1 - w.a2).abs(), w.a1 + w.a2);
    }

    fn submit(&mut self, events: &mut Vec<SimEvent>) {
        let w = self.waves();
        events.push(SimEvent::Graded {
            value: w.resultant_amplitude(),
            target: self.target,
            tolerance: ((w.a1 + w.a2) * 0.5).max(1.0),
            at: Button::bottom_right(self.state.viewport).center() - DVec2::new(0.0, 40.0),
        });
        self.new_target();
    }

    fn wave_path(&self, layout: &Layout, row: f64, f: impl Fn(f64) -> f64) -> Vec<DVec2> {
        let samples = (layout.width / SAMPLE_STEP_PX).ceil() as usize;
        (0..=samples)
            .map(|i| {
                let x = (i as f64 * SAMPLE_STEP_PX).min(layout.width);
                DVec2::new(layout.left + x, row - f(x))
            })
            .collect()
    }
}

impl Simulation for WavesSim {
    fn name(&self) -> &'static str {
        "waves"
    }

    fn supported_modes(&self) -> &'static [Mode] {
        MODES
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.probes.clear();
        if mode == Mode::Challenge {
            // Matched waves so the phase alone sets the resultant
            for key in ["k1", "w1"] {
                if let Err(e) = self.match_partner(key) {
                    log::warn!("waves: {e}");
                }
            }
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
        self.cancelled = self.waves().is_perfect_cancellation();
    }

    fn step(&mut self, dt: f64, events: &mut Vec<SimEvent>) {
        self.state.advance(dt);
        let cancelled = self.waves().is_perfect_cancellation();
        if cancelled && !self.cancelled {
            let layout = Layout::new(self.state.viewport);
            events.push(SimEvent::Burst {
                kind: ParticleKind::Glow,
                at: DVec2::new(layout.left + layout.width * 0.5, layout.rows[2]),
                count: 10,
                color: palette::GOOD,
            });
        }
        self.cancelled = cancelled;
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = Layout::new(size);
        let waves = self.waves();
        let t = self.state.sim_time;
        let right = layout.left + layout.width;

        match layer {
            Layer::Background => {
                for row in layout.rows {
                    surface.line(DVec2::new(layout.left, row), DVec2::new(right, row), palette::GRID, 1.0);
                }
            }
            Layer::Overlays => {
                let row = layout.rows[2];
                if self.mode == Mode::Challenge {
                    for sign in [-1.0, 1.0] {
                        let y = row - sign * self.target;
                        surface.line(DVec2::new(layout.left, y), DVec2::new(right, y), with_alpha(palette::GOLD, 0.6), 1.0);
                    }
                }
                for node in waves.nodes(layout.width, t) {
                    surface.stroke_circle(DVec2::new(layout.left + node, row), 5.0, palette::GOOD, 1.5);
                }
                for probe in &self.probes {
                    let x = layout.left + probe;
                    surface.line(
                        DVec2::new(x, layout.rows[0] - 70.0),
                        DVec2::new(x, layout.rows[2] + 70.0),
                        with_alpha(palette::WARM, 0.4),
                        1.0,
                    );
                }
            }
            Layer::Bodies => {
                let first = self.wave_path(&layout, layout.rows[0], |x| waves.first(x, t));
                surface.polyline(&first, palette::ACCENT, 2.0);
                let second = self.wave_path(&layout, layout.rows[1], |x| waves.second(x, t));
                surface.polyline(&second, palette::WARM, 2.0);
                let sum = self.wave_path(&layout, layout.rows[2], |x| waves.displacement(x, t));
                let color = if self.cancelled { palette::GOOD } else { palette::TEXT };
                surface.polyline(&sum, color, 2.5);
            }
            Layer::Annotations => {
                let style = TextStyle::new(11.0, palette::TEXT_DIM);
                for (label, row) in ["wave 1", "wave 2", "sum"].iter().zip(layout.rows) {
                    surface.text(label, DVec2::new(layout.left, row - 68.0), style);
                }
                for probe in &self.probes {
                    let y = waves.displacement(*probe, t);
                    let p = DVec2::new(layout.left + probe, layout.rows[2] - y);
                    surface.fill_circle(p, 4.0, palette::WARM);
                    surface.text(
                        &format!("{} px", format_value(y)),
                        p + DVec2::new(6.0, -10.0),
                        TextStyle::new(11.0, palette::WARM),
                    );
                }
                if self.cancelled {
                    surface.text(
                        "perfect cancellation",
                        DVec2::new(layout.left + layout.width * 0.5, layout.rows[2] - 40.0),
                        TextStyle::new(14.0, palette::GOOD).centered().bold(),
                    );
                }
            }
            Layer::Panels => {
                let rows = [
                    ("φ", format!("{} rad", format_value(waves.phase))),
                    ("A_R", format!("{} px", format_value(waves.resultant_amplitude()))),
                    ("probes", format!("{}/{}", self.probes.len(), MAX_PROBES)),
                ];
                let rows = if self.mode == Mode::Challenge {
                    &rows[..1]
                } else {
                    &rows[..]
                };
                draw_info_panel(surface, DVec2::new(size.width - 170.0, size.height * 0.82), "Waves", rows, frame.high_contrast);
                if self.mode == Mode::Challenge {
                    Button::bottom_right(size).draw(surface, "Submit φ");
                    draw_hint(surface, "Adjust the phase until the sum fills the gold band");
                } else {
                    draw_hint(surface, "Click to place probes");
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        if self.mode == Mode::Challenge && Button::bottom_right(size).contains(point) {
            self.submit(events);
            return;
        }
        let layout = Layout::new(size);
        let x = point.x - layout.left;
        if !(0.0..=layout.width).contains(&x) {
            return;
        }
        if self.probes.len() == MAX_PROBES {
            self.probes.pop_front();
        }
        self.probes.push_back(x);
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        match key {
            Key::Submit if self.mode == Mode::Challenge => self.submit(events),
            Key::Left | Key::Right => {
                let steps = if key == Key::Right { 5.0 } else { -5.0 };
                match self.state.params.nudge("phase", steps) {
                    Ok(_) => self.on_param_changed("phase"),
                    Err(e) => log::warn!("waves: {e}"),
                }
            }
            _ => {}
        }
    }

    fn on_param_changed(&mut self, key: &str) {
        if self.mode != Mode::Challenge {
            return;
        }
        match key {
            "a1" | "a2" => self.new_target(),
            "k1" | "k2" | "w1" | "w2" => {
                if let Err(e) = self.match_partner(key) {
                    log::warn!("waves: {e}");
                }
            }
            _ => {}
        }
    }

    fn audio_cue(&self) -> Option<ToneCue> {
        let w = self.waves();
        let peak = (w.a1 + w.a2).max(1.0);
        Some(ToneCue::new(
            ToneCue::pitch_for(w.w1, (0.5, 10.0)) as f64,
            w.resultant_amplitude() / peak,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(phase: f64) -> Superposition {
        Superposition {
            a1: 40.0,
            k1: 0.03,
            w1: 3.0,
            a2: 40.0,
            k2: 0.03,
            w2: 3.0,
            phase,
        }
    }

    #[test]
    fn test_in_phase_doubles() {
        let w = matched(0.0);
        assert!((w.resultant_amplitude() - 80.0).abs() < 1e-9);
        assert!((w.displacement(10.0, 0.3) - 2.0 * w.first(10.0, 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_opposition_cancels() {
        let w = matched(PI);
        assert!(w.is_perfect_cancellation());
        assert!(w.resultant_amplitude() < 1e-6);
        for x in [0.0, 50.0, 333.0] {
            assert!(w.displacement(x, 1.7).abs() < 1e-9);
        }
        assert!(!matched(PI - 0.05).is_perfect_cancellation());
        assert!(matched(PI + 0.01).is_perfect_cancellation());
    }

    #[test]
    fn test_node_positions() {
        let w = Superposition {
            k2: 0.05,
            ..matched(0.0)
        };
        // Nodes where 0.02·x = π (mod 2π)
        let nodes = w.nodes(400.0, 0.0);
        assert_eq!(nodes.len(), 1);
        assert!((nodes[0] - PI / 0.02).abs() < 1.5);
        // In-phase identical waves have none
        assert!(matched(0.0).nodes(400.0, 0.0).is_empty());
    }

    #[test]
    fn test_probes_capped() {
        let mut s = WavesSim::new(1);
        let size = s.state.viewport;
        let mut events = Vec::new();
        for i in 0..5 {
            s.handle_click(DVec2::new(100.0 + i as f64 * 50.0, 200.0), size, &mut events);
        }
        let probes: Vec<f64> = s.probes().collect();
        assert_eq!(probes.len(), MAX_PROBES);
        let left = size.width * 0.05;
        assert!((probes[0] - (200.0 - left)).abs() < 1e-9);
    }

    #[test]
    fn test_cancellation_onset_emits_once() {
        let mut s = WavesSim::new(1);
        let mut events = Vec::new();
        s.step(0.01, &mut events);
        assert!(events.is_empty());
        s.state.params.set("phase", PI).unwrap();
        for _ in 0..10 {
            s.step(0.01, &mut events);
        }
        assert!(s.is_cancelled());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_challenge_target_in_reach() {
        let mut s = WavesSim::new(4);
        s.set_mode(Mode::Challenge);
        let w = s.waves();
        assert!(s.target() >= (w.a1 - w.a2).abs() && s.target() <= w.a1 + w.a2);
        assert_eq!(w.k1, w.k2);
        let mut events = Vec::new();
        s.handle_key(Key::Submit, &mut events);
        assert!(matches!(
            events.as_slice(),
            [SimEvent::Graded { tolerance, .. }] if (*tolerance - 40.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_challenge_keeps_waves_matched() {
        let mut s = WavesSim::new(4);
        s.set_mode(Mode::Challenge);
        s.state.params.set("k2", 0.07).unwrap();
        s.on_param_changed("k2");
        s.state.params.set("w1", 6.5).unwrap();
        s.on_param_changed("w1");
        let w = s.waves();
        assert_eq!(w.k1, 0.07);
        assert_eq!(w.k1, w.k2);
        assert_eq!(w.w2, 6.5);
        assert_eq!(w.w1, w.w2);

        // Sandbox lets the waves beat
        s.set_mode(Mode::Sandbox);
        s.state.params.set("k2", 0.05).unwrap();
        s.on_param_changed("k2");
        assert_ne!(s.waves().k1, s.waves().k2);
    }
}
