//! Standard Model particle taxonomy
//!
//! Particles orbit in rings by family. Positions are a closed-form function
//! of time, so nothing here integrates.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::{FrameInfo, Mode, SimEvent, Simulation, SimulationState, draw_hint};
use crate::audio::SoundEffect;
use crate::input::Key;
use crate::particles::ParticleKind;
use crate::renderer::primitives::{draw_info_panel, format_value};
use crate::renderer::{Layer, Rgba, Surface, SurfaceSize, TextStyle, palette, with_alpha};

const MODES: &[Mode] = &[Mode::Sandbox, Mode::Quiz];

/// Stand-in mass for massless particles so log₁₀ stays finite (MeV)
pub const MASS_FLOOR_MEV: f64 = 1e-6;
/// Quiz tolerance in decades of mass
pub const QUIZ_TOLERANCE_DECADES: f64 = 3.0;
pub const QUIZ_OPTIONS: usize = 4;
const HIT_RADIUS: f64 = 18.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Quark,
    Lepton,
    GaugeBoson,
    ScalarBoson,
}

impl Family {
    pub fn label(&self) -> &'static str {
        match self {
            Family::Quark => "quark",
            Family::Lepton => "lepton",
            Family::GaugeBoson => "gauge boson",
            Family::ScalarBoson => "scalar boson",
        }
    }

    fn color(&self) -> Rgba {
        match self {
            Family::Quark => palette::BAD,
            Family::Lepton => palette::GOOD,
            Family::GaugeBoson => palette::ACCENT,
            Family::ScalarBoson => palette::GOLD,
        }
    }

    /// Ring radius as a fraction of the layout radius, and angular speed
    fn orbit(&self) -> (f64, f64) {
        match self {
            Family::Quark => (1.0, 0.12),
            Family::Lepton => (0.68, -0.18),
            Family::GaugeBoson => (0.36, 0.3),
            Family::ScalarBoson => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInfo {
    pub name: &'static str,
    pub symbol: &'static str,
    pub family: Family,
    /// Rest mass (MeV/c²)
    pub mass_mev: f64,
    pub charge: &'static str,
    pub spin: &'static str,
}

const fn particle(
    name: &'static str,
    symbol: &'static str,
    family: Family,
    mass_mev: f64,
    charge: &'static str,
    spin: &'static str,
) -> ParticleInfo {
    ParticleInfo {
        name,
        symbol,
        family,
        mass_mev,
        charge,
        spin,
    }
}

pub const PARTICLES: [ParticleInfo; 17] = [
    particle("up", "u", Family::Quark, 2.16, "+2/3", "1/2"),
    particle("down", "d", Family::Quark, 4.67, "−1/3", "1/2"),
    particle("charm", "c", Family::Quark, 1_270.0, "+2/3", "1/2"),
    particle("strange", "s", Family::Quark, 93.4, "−1/3", "1/2"),
    particle("top", "t", Family::Quark, 172_760.0, "+2/3", "1/2"),
    particle("bottom", "b", Family::Quark, 4_180.0, "−1/3", "1/2"),
    particle("electron", "e", Family::Lepton, 0.511, "−1", "1/2"),
    particle("muon", "μ", Family::Lepton, 105.66, "−1", "1/2"),
    particle("tau", "τ", Family::Lepton, 1_776.86, "−1", "1/2"),
    particle("electron neutrino", "νe", Family::Lepton, 0.0, "0", "1/2"),
    particle("muon neutrino", "νμ", Family::Lepton, 0.0, "0", "1/2"),
    particle("tau neutrino", "ντ", Family::Lepton, 0.0, "0", "1/2"),
    particle("photon", "γ", Family::GaugeBoson, 0.0, "0", "1"),
    particle("gluon", "g", Family::GaugeBoson, 0.0, "0", "1"),
    particle("W boson", "W", Family::GaugeBoson, 80_379.0, "±1", "1"),
    particle("Z boson", "Z", Family::GaugeBoson, 91_188.0, "0", "1"),
    particle("Higgs", "H", Family::ScalarBoson, 125_100.0, "0", "0"),
];

/// log₁₀ of the mass with the floor applied
pub fn log_mass(mass_mev: f64) -> f64 {
    mass_mev.max(MASS_FLOOR_MEV).log10()
}

fn format_mass(mass_mev: f64) -> String {
    if mass_mev <= 0.0 {
        "massless".to_string()
    } else if mass_mev >= 1_000.0 {
        format!("{} GeV", format_value(mass_mev / 1_000.0))
    } else {
        format!("{} MeV", format_value(mass_mev))
    }
}

struct Layout {
    center: DVec2,
    radius: f64,
    size: SurfaceSize,
}

impl Layout {
    fn new(size: SurfaceSize) -> Self {
        Self {
            center: DVec2::new(size.width * 0.4, size.height * 0.45),
            radius: (size.height * 0.38).min(size.width * 0.3),
            size,
        }
    }

    fn position(&self, index: usize, t: f64) -> DVec2 {
        let family = PARTICLES[index].family;
        let (ring, speed) = family.orbit();
        let members: Vec<usize> = (0..PARTICLES.len())
            .filter(|i| PARTICLES[*i].family == family)
            .collect();
        let slot = members.iter().position(|i| *i == index).unwrap_or(0);
        let angle = slot as f64 * TAU / members.len() as f64 + speed * t;
        self.center + crate::polar_to_cartesian(self.radius * ring, angle)
    }

    fn option_rect(&self, slot: usize) -> (DVec2, DVec2) {
        let margin = 12.0;
        let width = (self.size.width - margin * (QUIZ_OPTIONS as f64 + 1.0)) / QUIZ_OPTIONS as f64;
        let size = DVec2::new(width, 34.0);
        let pos = DVec2::new(
            margin + slot as f64 * (width + margin),
            self.size.height - size.y - 30.0,
        );
        (pos, size)
    }

    fn option_at(&self, point: DVec2) -> Option<usize> {
        (0..QUIZ_OPTIONS).find(|slot| {
            let (pos, size) = self.option_rect(*slot);
            point.x >= pos.x && point.x <= pos.x + size.x && point.y >= pos.y && point.y <= pos.y + size.y
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Particle whose mass is asked
    pub answer: usize,
    /// Particle indices whose masses are offered, shuffled
    pub options: [usize; QUIZ_OPTIONS],
}

pub struct TaxonomySim {
    state: SimulationState,
    mode: Mode,
    selected: Option<usize>,
    question: Option<Question>,
    rng: Pcg32,
}

impl TaxonomySim {
    pub fn new(seed: u64) -> Self {
        Self {
            state: SimulationState::new(Vec::new(), seed),
            mode: Mode::Sandbox,
            selected: None,
            question: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn selected(&self) -> Option<&ParticleInfo> {
        self.selected.map(|i| &PARTICLES[i])
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    fn new_question(&mut self) {
        let mut order: Vec<usize> = (0..PARTICLES.len()).collect();
        order.shuffle(&mut self.rng);
        let answer = order[0];
        // Distractors with masses distinct from the answer and each other
        let mut options = vec![answer];
        for i in order.into_iter().skip(1) {
            if options.len() == QUIZ_OPTIONS {
                break;
            }
            let m = log_mass(PARTICLES[i].mass_mev);
            if options.iter().all(|o| (log_mass(PARTICLES[*o].mass_mev) - m).abs() > 1e-9) {
                options.push(i);
            }
        }
        options.shuffle(&mut self.rng);
        let mut slots = [answer; QUIZ_OPTIONS];
        for (slot, index) in slots.iter_mut().zip(options) {
            *slot = index;
        }
        self.question = Some(Question { answer, options: slots });
    }

    fn choose(&mut self, slot: usize, events: &mut Vec<SimEvent>) {
        let Some(question) = &self.question else {
            return;
        };
        let chosen = question.options[slot];
        let answer = question.answer;
        let (pos, size) = Layout::new(self.state.viewport).option_rect(slot);
        events.push(SimEvent::Graded {
            value: log_mass(PARTICLES[chosen].mass_mev),
            target: log_mass(PARTICLES[answer].mass_mev),
            tolerance: QUIZ_TOLERANCE_DECADES,
            at: pos + DVec2::new(size.x * 0.5, -20.0),
        });
        self.selected = Some(answer);
        self.new_question();
    }

    fn select(&mut self, index: usize, events: &mut Vec<SimEvent>) {
        self.selected = Some(index);
        let at = Layout::new(self.state.viewport).position(index, self.state.sim_time);
        events.push(SimEvent::Burst {
            kind: ParticleKind::Glow,
            at,
            count: 8,
            color: PARTICLES[index].family.color(),
        });
        events.push(SimEvent::Sound(SoundEffect::Absorb));
    }
}

impl Simulation for TaxonomySim {
    fn name(&self) -> &'static str {
        "taxonomy"
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
        self.selected = None;
        self.question = None;
        if self.mode == Mode::Quiz {
            self.new_question();
        }
    }

    fn step(&mut self, dt: f64, _events: &mut Vec<SimEvent>) {
        self.state.advance(dt);
    }

    fn draw(&self, surface: &mut dyn Surface, frame: &FrameInfo, layer: Layer) {
        let size = surface.size();
        let layout = Layout::new(size);
        let t = if frame.reduced_motion { 0.0 } else { self.state.sim_time };
        match layer {
            Layer::Background => {
                for family in [Family::Quark, Family::Lepton, Family::GaugeBoson] {
                    surface.stroke_circle(layout.center, layout.radius * family.orbit().0, palette::GRID, 1.0);
                }
            }
            Layer::Overlays => {
                if let Some(i) = self.selected {
                    surface.stroke_circle(layout.position(i, t), HIT_RADIUS + 4.0, palette::GOLD, 2.0);
                }
            }
            Layer::Bodies => {
                for (i, p) in PARTICLES.iter().enumerate() {
                    let pos = layout.position(i, t);
                    surface.fill_circle(pos, HIT_RADIUS, with_alpha(p.family.color(), 0.85));
                    surface.text(p.symbol, pos - DVec2::new(0.0, 7.0), TextStyle::new(14.0, palette::BACKGROUND).centered().bold());
                }
            }
            Layer::Annotations => {
                let style = TextStyle::new(11.0, palette::TEXT_DIM);
                for (row, family) in [Family::Quark, Family::Lepton, Family::GaugeBoson, Family::ScalarBoson]
                    .iter()
                    .enumerate()
                {
                    let pos = DVec2::new(12.0, 14.0 + row as f64 * 16.0);
                    surface.fill_circle(pos + DVec2::new(4.0, 6.0), 4.0, family.color());
                    surface.text(family.label(), pos + DVec2::new(14.0, 0.0), style);
                }
            }
            Layer::Panels => {
                if let Some(p) = self.selected() {
                    let rows = [
                        ("family", p.family.label().to_string()),
                        ("mass", format_mass(p.mass_mev)),
                        ("charge", p.charge.to_string()),
                        ("spin", p.spin.to_string()),
                    ];
                    draw_info_panel(surface, DVec2::new(size.width - 190.0, 12.0), p.name, &rows, frame.high_contrast);
                }
                match &self.question {
                    Some(q) if self.mode == Mode::Quiz => {
                        surface.text(
                            &format!("Mass of the {}?", PARTICLES[q.answer].name),
                            DVec2::new(size.width * 0.5, size.height - 92.0),
                            TextStyle::new(15.0, palette::TEXT).centered().bold(),
                        );
                        for (slot, index) in q.options.iter().enumerate() {
                            let (pos, rect) = layout.option_rect(slot);
                            surface.fill_rect(pos, rect, palette::PANEL);
                            surface.stroke_rect(pos, rect, palette::PANEL_BORDER, 1.0);
                            surface.text(
                                &format!("{}. {}", slot + 1, format_mass(PARTICLES[*index].mass_mev)),
                                pos + DVec2::new(rect.x * 0.5, rect.y * 0.5 - 7.0),
                                TextStyle::new(13.0, palette::TEXT).centered(),
                            );
                        }
                    }
                    _ => draw_hint(surface, "Click a particle for details"),
                }
            }
        }
    }

    fn handle_click(&mut self, point: DVec2, size: SurfaceSize, events: &mut Vec<SimEvent>) {
        let layout = Layout::new(size);
        if self.mode == Mode::Quiz {
            if let Some(slot) = layout.option_at(point) {
                self.choose(slot, events);
                return;
            }
        }
        let t = self.state.sim_time;
        let hit = (0..PARTICLES.len())
            .map(|i| (i, layout.position(i, t).distance(point)))
            .filter(|(_, d)| *d <= HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match hit {
            Some((i, _)) => self.select(i, events),
            None => self.selected = None,
        }
    }

    fn handle_key(&mut self, key: Key, events: &mut Vec<SimEvent>) {
        if let Key::Char(c) = key {
            if let Some(n) = c.to_digit(10) {
                let slot = n as usize;
                if self.mode == Mode::Quiz && (1..=QUIZ_OPTIONS).contains(&slot) {
                    self.choose(slot - 1, events);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_mass_floor() {
        assert_eq!(log_mass(0.0), -6.0);
        assert!((log_mass(1_000.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_click_selects_particle() {
        let mut s = TaxonomySim::new(1);
        let size = s.state.viewport;
        let pos = Layout::new(size).position(16, 0.0);
        let mut events = Vec::new();
        s.handle_click(pos + DVec2::new(3.0, 0.0), size, &mut events);
        assert_eq!(s.selected().map(|p| p.symbol), Some("H"));
        assert_eq!(events.len(), 2);
        s.handle_click(DVec2::new(2.0, size.height - 2.0), size, &mut events);
        assert!(s.selected().is_none());
    }

    #[test]
    fn test_orbits_move_with_time() {
        let layout = Layout::new(crate::sim::state::DEFAULT_VIEWPORT);
        assert_ne!(layout.position(0, 0.0), layout.position(0, 1.0));
        assert_eq!(layout.position(16, 0.0), layout.position(16, 5.0));
    }

    #[test]
    fn test_quiz_options_distinct_and_contain_answer() {
        for seed in 0..20 {
            let mut s = TaxonomySim::new(seed);
            s.set_mode(Mode::Quiz);
            let q = s.question().unwrap().clone();
            assert!(q.options.contains(&q.answer));
            for (i, a) in q.options.iter().enumerate() {
                for b in &q.options[i + 1..] {
                    assert_ne!(PARTICLES[*a].mass_mev, PARTICLES[*b].mass_mev);
                }
            }
        }
    }

    #[test]
    fn test_correct_choice_is_perfect() {
        let mut s = TaxonomySim::new(7);
        s.set_mode(Mode::Quiz);
        let q = s.question().unwrap().clone();
        let slot = q.options.iter().position(|i| *i == q.answer).unwrap();
        let mut events = Vec::new();
        s.handle_key(Key::Char(char::from_digit(slot as u32 + 1, 10).unwrap()), &mut events);
        match events.as_slice() {
            [SimEvent::Graded { value, target, tolerance, .. }] => {
                assert_eq!(value, target);
                assert_eq!(*tolerance, QUIZ_TOLERANCE_DECADES);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(s.question().is_some());
    }
}
