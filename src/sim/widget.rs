//! Widget host
//!
//! One widget per canvas. It owns a simulation and everything around it:
//! frame scheduling, particles, challenge state, score popups and pending
//! sounds. Nothing is shared between widgets.
//!
//! Frame order: dt → physics step → events → particles → render.

use glam::DVec2;

use super::{FrameInfo, Mode, SimEvent, Simulation};
use crate::audio::{SoundEffect, ToneCue, effect_for_points};
use crate::error::Result;
use crate::input::Key;
use crate::particles::{ParticleKind, ParticleSystem};
use crate::renderer::primitives::{draw_score_popup, draw_scoreboard, tier_color};
use crate::renderer::{Layer, Surface, SurfaceSize, palette};
use crate::scheduler::FrameScheduler;
use crate::scoring::{ChallengeState, ScorePopup, calculate_accuracy, update_challenge_state};
use crate::settings::Settings;

/// Confetti count for a scoring attempt
const SCORE_BURST: usize = 24;
/// Spark count for a boundary hit
const IMPACT_BURST: usize = 12;

pub struct Widget {
    sim: Box<dyn Simulation>,
    scheduler: FrameScheduler,
    particles: ParticleSystem,
    challenge: ChallengeState,
    popups: Vec<ScorePopup>,
    sounds: Vec<SoundEffect>,
    events: Vec<SimEvent>,
    settings: Settings,
    /// Seconds of running time, drives popups and marker pulses
    clock: f64,
    /// Paused by the host (hidden tab, cached page) rather than the user
    suspended: bool,
}

impl Widget {
    pub fn new(sim: Box<dyn Simulation>, settings: Settings) -> Self {
        let seed = sim.state().seed;
        let challenge = if sim.mode().is_scored() {
            ChallengeState::enter()
        } else {
            ChallengeState::exit()
        };
        Self {
            sim,
            scheduler: FrameScheduler::new(settings.dt_cap),
            // Offset so particle randomness is decorrelated from physics
            particles: ParticleSystem::new(seed ^ 0x9E37_79B9_7F4A_7C15),
            challenge,
            popups: Vec::new(),
            sounds: Vec::new(),
            events: Vec::new(),
            settings,
            clock: 0.0,
            suspended: false,
        }
    }

    /// Build a widget from a registry name
    pub fn create(name: &str, seed: u64, settings: Settings) -> Result<Self> {
        let sim = super::create(name, seed)?;
        log::info!("widget created: {} (seed {})", sim.name(), seed);
        Ok(Self::new(sim, settings))
    }

    pub fn simulation(&self) -> &dyn Simulation {
        self.sim.as_ref()
    }

    pub fn challenge(&self) -> &ChallengeState {
        &self.challenge
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn popups(&self) -> &[ScorePopup] {
        &self.popups
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.scheduler.set_dt_cap(settings.dt_cap);
        if !settings.particles {
            self.particles.clear();
        }
        self.settings = settings;
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn pause(&mut self) {
        self.scheduler.stop();
        self.suspended = false;
    }

    /// Host-driven pause. Only a running widget is marked for `wake`.
    pub fn suspend(&mut self) {
        if self.is_running() {
            self.scheduler.stop();
            self.suspended = true;
        }
    }

    /// Undo `suspend`; widgets the user paused stay paused
    pub fn wake(&mut self) {
        if std::mem::take(&mut self.suspended) {
            self.start();
        }
    }

    /// One host frame. Paused widgets still render a static frame.
    pub fn frame(&mut self, now_ms: f64, surface: &mut dyn Surface) {
        self.sim.state_mut().viewport = surface.size();

        let dt = self.scheduler.tick(now_ms).unwrap_or(0.0);
        if dt > 0.0 {
            self.sim.step(dt, &mut self.events);
            self.clock += dt;
        }
        self.apply_events();
        self.particles.update(dt);
        self.render(surface);
    }

    /// Paint the current state without advancing anything
    pub fn render(&mut self, surface: &mut dyn Surface) {
        surface.clear(palette::BACKGROUND);

        let frame = FrameInfo {
            time: self.clock,
            reduced_motion: self.settings.reduced_motion,
            high_contrast: self.settings.high_contrast,
        };
        for layer in Layer::ORDER {
            self.sim.draw(surface, &frame, layer);
        }

        self.particles.draw(surface);

        let (now, duration, reduced) = (
            self.clock,
            self.settings.popup_duration,
            self.settings.reduced_motion,
        );
        self.popups
            .retain(|popup| draw_score_popup(surface, popup, now, duration, reduced));

        draw_scoreboard(surface, &self.challenge);
    }

    /// Pointer click or drag sample at a surface point
    pub fn click(&mut self, point: DVec2, size: SurfaceSize) {
        self.sim.state_mut().viewport = size;
        self.sim.handle_click(point, size, &mut self.events);
        self.apply_events();
    }

    pub fn key(&mut self, key: Key) {
        match key {
            Key::Pause => {
                if self.is_running() {
                    self.pause();
                } else {
                    self.start();
                }
            }
            Key::Reset => self.reset(),
            other => {
                self.sim.handle_key(other, &mut self.events);
                self.apply_events();
            }
        }
    }

    /// Set a simulation parameter; returns the clamped value
    pub fn set_param(&mut self, key: &str, value: f64) -> Result<f64> {
        let stored = self.sim.state_mut().params.set(key, value)?;
        self.sim.on_param_changed(key);
        Ok(stored)
    }

    /// Switch mode, resetting the challenge and clearing effects
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.sim.switch_mode(mode)?;
        self.challenge = if mode.is_scored() {
            ChallengeState::enter()
        } else {
            ChallengeState::exit()
        };
        self.particles.clear();
        self.popups.clear();
        self.events.clear();
        log::info!("{}: mode -> {}", self.sim.name(), mode);
        Ok(())
    }

    /// Restore initial conditions; the challenge tally survives
    pub fn reset(&mut self) {
        self.sim.reset();
        self.particles.clear();
        self.popups.clear();
        self.events.clear();
    }

    /// Sounds requested since the last call
    pub fn take_sounds(&mut self) -> Vec<SoundEffect> {
        std::mem::take(&mut self.sounds)
    }

    /// Continuous tone while running with audio enabled
    pub fn tone(&self) -> Option<ToneCue> {
        if self.settings.audio && self.is_running() {
            self.sim.audio_cue()
        } else {
            None
        }
    }

    fn apply_events(&mut self) {
        for event in std::mem::take(&mut self.events) {
            match event {
                SimEvent::Burst {
                    kind,
                    at,
                    count,
                    color,
                } => {
                    let count = self.settings.scaled_burst(count);
                    if count > 0 {
                        self.particles.emit(kind, at, count, color);
                    }
                }
                SimEvent::Graded {
                    value,
                    target,
                    tolerance,
                    at,
                } => {
                    if !self.challenge.active {
                        continue;
                    }
                    let result = calculate_accuracy(value, target, tolerance);
                    log::debug!(
                        "{}: graded {:.3} vs {:.3} (±{:.3}) -> {}",
                        self.sim.name(),
                        value,
                        target,
                        tolerance,
                        result.label()
                    );
                    self.challenge = update_challenge_state(&self.challenge, result);
                    self.popups.push(ScorePopup::new(&result, at, self.clock));
                    self.push_sound(effect_for_points(result.points));
                    if result.points > 0 {
                        let count = self.settings.scaled_burst(SCORE_BURST);
                        if count > 0 {
                            self.particles
                                .emit(ParticleKind::Confetti, at, count, tier_color(result.tier));
                        }
                    }
                }
                SimEvent::Sound(effect) => self.push_sound(effect),
                SimEvent::OutOfBounds { at } => {
                    log::debug!("{}: out of bounds at ({:.0}, {:.0})", self.sim.name(), at.x, at.y);
                    let count = self.settings.scaled_burst(IMPACT_BURST);
                    if count > 0 {
                        self.particles.emit(ParticleKind::Spark, at, count, palette::BAD);
                    }
                    self.push_sound(SoundEffect::Impact);
                }
            }
        }
    }

    fn push_sound(&mut self, effect: SoundEffect) {
        if self.settings.audio {
            self.sounds.push(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{DrawCmd, RecordingSurface};

    fn widget(name: &str) -> Widget {
        let settings = Settings {
            audio: true,
            ..Settings::default()
        };
        Widget::create(name, 11, settings).unwrap()
    }

    #[test]
    fn test_first_frame_does_not_step() {
        let mut w = widget("spring");
        let mut surface = RecordingSurface::new(800.0, 450.0);
        w.start();
        w.frame(1000.0, &mut surface);
        assert_eq!(w.simulation().state().sim_time, 0.0);
        w.frame(1016.0, &mut surface);
        assert!((w.simulation().state().sim_time - 0.016).abs() < 1e-9);
    }

    #[test]
    fn test_paused_widget_still_renders() {
        let mut w = widget("waves");
        let mut surface = RecordingSurface::new(800.0, 450.0);
        w.frame(0.0, &mut surface);
        assert_eq!(w.simulation().state().sim_time, 0.0);
        assert!(matches!(surface.commands[0], DrawCmd::Clear(_)));
        assert!(surface.commands.len() > 1);
    }

    #[test]
    fn test_graded_event_updates_challenge() {
        let mut w = widget("spring");
        w.set_mode(Mode::Challenge).unwrap();
        w.events.push(SimEvent::Graded {
            value: 10.0,
            target: 10.0,
            tolerance: 1.0,
            at: DVec2::new(100.0, 100.0),
        });
        w.apply_events();
        assert_eq!(w.challenge().score, 3);
        assert_eq!(w.challenge().streak, 1);
        assert_eq!(w.popups().len(), 1);
        assert!(!w.particles().is_empty());
        assert_eq!(w.take_sounds(), vec![SoundEffect::Perfect]);
        assert!(w.take_sounds().is_empty());
    }

    #[test]
    fn test_grading_ignored_outside_challenge() {
        let mut w = widget("spring");
        w.events.push(SimEvent::Graded {
            value: 1.0,
            target: 1.0,
            tolerance: 1.0,
            at: DVec2::ZERO,
        });
        w.apply_events();
        assert_eq!(w.challenge().attempts, 0);
        assert!(w.popups().is_empty());
    }

    #[test]
    fn test_mode_switch_clears_effects() {
        let mut w = widget("kinematics");
        w.set_mode(Mode::Prediction).unwrap();
        w.events.push(SimEvent::Graded {
            value: 1.0,
            target: 1.0,
            tolerance: 1.0,
            at: DVec2::ZERO,
        });
        w.apply_events();
        assert!(!w.particles().is_empty());

        w.set_mode(Mode::Sandbox).unwrap();
        assert!(w.particles().is_empty());
        assert!(w.popups().is_empty());
        assert!(!w.challenge().active);
        assert_eq!(w.challenge().score, 0);
    }

    #[test]
    fn test_unsupported_mode_leaves_state() {
        let mut w = widget("thermo");
        assert!(w.set_mode(Mode::Push).is_err());
        assert_eq!(w.simulation().mode(), Mode::Sandbox);
    }

    #[test]
    fn test_set_param_clamps() {
        let mut w = widget("relativity");
        let stored = w.set_param("beta", 5.0).unwrap();
        assert!(stored < 1.0);
        assert!(w.set_param("warp", 1.0).is_err());
    }

    #[test]
    fn test_burst_disabled_by_settings() {
        let mut w = widget("spring");
        w.apply_settings(Settings {
            particles: false,
            ..Settings::default()
        });
        w.events.push(SimEvent::Burst {
            kind: ParticleKind::Spark,
            at: DVec2::ZERO,
            count: 10,
            color: palette::ACCENT,
        });
        w.apply_events();
        assert!(w.particles().is_empty());
    }

    #[test]
    fn test_pause_key_toggles() {
        let mut w = widget("atom");
        w.key(Key::Pause);
        assert!(w.is_running());
        w.key(Key::Pause);
        assert!(!w.is_running());
    }

    #[test]
    fn test_suspend_and_wake_restore_running_state() {
        let mut w = widget("gyroscope");
        let mut surface = RecordingSurface::new(800.0, 450.0);
        w.start();
        w.frame(0.0, &mut surface);
        w.frame(16.0, &mut surface);
        w.suspend();
        assert!(!w.is_running());
        let t = w.simulation().state().sim_time;
        w.frame(5000.0, &mut surface);
        assert_eq!(w.simulation().state().sim_time, t);

        w.wake();
        assert!(w.is_running());
        // First frame after waking only re-anchors the clock
        w.frame(9000.0, &mut surface);
        assert_eq!(w.simulation().state().sim_time, t);
    }

    #[test]
    fn test_wake_leaves_user_pause_alone() {
        let mut w = widget("atom");
        w.suspend();
        w.wake();
        assert!(!w.is_running());

        w.start();
        w.suspend();
        w.pause();
        w.wake();
        assert!(!w.is_running());
    }

    #[test]
    fn test_popups_pruned_after_duration() {
        let mut w = widget("spring");
        w.set_mode(Mode::Challenge).unwrap();
        w.events.push(SimEvent::Graded {
            value: 0.0,
            target: 100.0,
            tolerance: 1.0,
            at: DVec2::new(50.0, 50.0),
        });
        w.apply_events();
        assert_eq!(w.popups().len(), 1);

        let mut surface = RecordingSurface::new(800.0, 450.0);
        w.start();
        let mut now = 0.0;
        // 2 s of frames at 60 Hz, longer than the popup duration
        for _ in 0..120 {
            w.frame(now, &mut surface);
            now += 1000.0 / 60.0;
        }
        assert!(w.popups().is_empty());
    }

    #[test]
    fn test_tone_only_while_running() {
        let mut w = widget("spring");
        assert!(w.tone().is_none());
        w.start();
        assert!(w.tone().is_some());
    }
}
