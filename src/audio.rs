//! Audio side-channel using the Web Audio API
//!
//! Procedurally generated feedback sounds and an optional continuous tone
//! that follows the simulation state. Audio is best-effort: when the host
//! has no usable `AudioContext` every call is a silent no-op.

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Challenge attempt worth 3 points
    Perfect,
    /// Challenge attempt worth 2 points
    Great,
    /// Challenge attempt worth 1 point
    Close,
    /// Challenge attempt worth nothing
    Miss,
    /// Projectile fired / cart released
    Launch,
    /// Body hit the ground or a track stop
    Impact,
    /// Electron absorbed a photon
    Absorb,
    /// Electron emitted a photon
    Emit,
}

/// Feedback sound for a graded attempt
pub fn effect_for_points(points: u32) -> SoundEffect {
    match points {
        3.. => SoundEffect::Perfect,
        2 => SoundEffect::Great,
        1 => SoundEffect::Close,
        _ => SoundEffect::Miss,
    }
}

/// Continuous tone request from a simulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCue {
    /// Hz
    pub frequency: f32,
    /// 0..=1, scaled by the tone volume
    pub gain: f32,
}

/// Lowest tone a simulation may request (Hz)
pub const TONE_MIN_HZ: f32 = 80.0;
/// Highest tone a simulation may request (Hz)
pub const TONE_MAX_HZ: f32 = 1200.0;

impl ToneCue {
    /// Clamped cue; non-finite input collapses to a silent low tone
    pub fn new(frequency: f64, gain: f64) -> Self {
        let frequency = if frequency.is_finite() {
            (frequency as f32).clamp(TONE_MIN_HZ, TONE_MAX_HZ)
        } else {
            TONE_MIN_HZ
        };
        let gain = if gain.is_finite() {
            (gain as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { frequency, gain }
    }

    /// Map a value in `range` logarithmically onto the audible tone band
    pub fn pitch_for(value: f64, range: (f64, f64)) -> f32 {
        let span = range.1 - range.0;
        let t = if span.abs() > f64::EPSILON && value.is_finite() {
            ((value - range.0) / span).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        TONE_MIN_HZ * (TONE_MAX_HZ / TONE_MIN_HZ).powf(t)
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{SoundEffect, ToneCue};
    use crate::Settings;

    /// Seconds for tone frequency/gain to settle after a change
    const TONE_SMOOTHING: f64 = 0.05;

    struct Tone {
        osc: OscillatorNode,
        gain: GainNode,
    }

    /// Audio manager for one page
    pub struct AudioManager {
        ctx: Option<AudioContext>,
        /// Creation is attempted once, on first use after a user gesture
        tried: bool,
        sfx_volume: f32,
        tone_volume: f32,
        tone: Option<Tone>,
    }

    impl Default for AudioManager {
        fn default() -> Self {
            Self::new(&Settings::default())
        }
    }

    impl AudioManager {
        pub fn new(settings: &Settings) -> Self {
            Self {
                ctx: None,
                tried: false,
                sfx_volume: settings.effective_sfx_volume(),
                tone_volume: settings.effective_tone_volume(),
                tone: None,
            }
        }

        pub fn apply_settings(&mut self, settings: &Settings) {
            self.sfx_volume = settings.effective_sfx_volume();
            self.tone_volume = settings.effective_tone_volume();
            if self.tone_volume <= 0.0 {
                self.set_tone(None);
            }
        }

        pub fn is_available(&self) -> bool {
            self.ctx.is_some()
        }

        fn context(&mut self) -> Option<&AudioContext> {
            if !self.tried {
                self.tried = true;
                // May fail outside a secure context or without a gesture
                self.ctx = AudioContext::new().ok();
                if self.ctx.is_none() {
                    log::warn!("Failed to create AudioContext - audio disabled");
                }
            }
            let ctx = self.ctx.as_ref()?;
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }
            Some(ctx)
        }

        /// Play a one-shot effect
        pub fn play(&mut self, effect: SoundEffect) {
            let vol = self.sfx_volume;
            if vol <= 0.0 {
                return;
            }
            let Some(ctx) = self.context() else { return };

            match effect {
                SoundEffect::Perfect => arpeggio(ctx, vol, &[523.0, 659.0, 784.0, 1047.0], 0.07),
                SoundEffect::Great => arpeggio(ctx, vol, &[523.0, 659.0, 784.0], 0.08),
                SoundEffect::Close => arpeggio(ctx, vol, &[440.0, 554.0], 0.1),
                SoundEffect::Miss => sweep(ctx, vol * 0.8, OscillatorType::Sawtooth, 220.0, 110.0, 0.3),
                SoundEffect::Launch => sweep(ctx, vol, OscillatorType::Triangle, 200.0, 600.0, 0.2),
                SoundEffect::Impact => sweep(ctx, vol * 1.5, OscillatorType::Sine, 150.0, 50.0, 0.12),
                SoundEffect::Absorb => sweep(ctx, vol, OscillatorType::Sine, 300.0, 900.0, 0.25),
                SoundEffect::Emit => sweep(ctx, vol, OscillatorType::Sine, 900.0, 300.0, 0.25),
            }
        }

        /// Drive the continuous tone. `None` silences and stops it.
        pub fn set_tone(&mut self, cue: Option<ToneCue>) {
            let volume = self.tone_volume;
            let Some(cue) = cue.filter(|c| c.gain > 0.0 && volume > 0.0) else {
                if let Some(tone) = self.tone.take() {
                    tone.osc.stop().ok();
                }
                return;
            };

            if self.tone.is_none() {
                let Some(ctx) = self.context() else { return };
                let Some((osc, gain)) = create_osc(ctx, cue.frequency, OscillatorType::Sine) else {
                    return;
                };
                gain.gain().set_value(0.0);
                osc.start().ok();
                self.tone = Some(Tone { osc, gain });
            }

            let (Some(ctx), Some(tone)) = (self.ctx.as_ref(), self.tone.as_ref()) else {
                return;
            };
            let t = ctx.current_time();
            tone.osc
                .frequency()
                .set_target_at_time(cue.frequency, t, TONE_SMOOTHING)
                .ok();
            tone.gain
                .gain()
                .set_target_at_time(cue.gain * volume * 0.3, t, TONE_SMOOTHING)
                .ok();
        }

        /// Stop the tone and close the context (unmount)
        pub fn release(&mut self) {
            self.set_tone(None);
            if let Some(ctx) = self.ctx.take() {
                let _ = ctx.close();
                log::info!("Audio released");
            }
        }
    }

    /// Create an oscillator with gain envelope
    fn create_osc(
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Single oscillator gliding from `from` to `to` Hz
    fn sweep(ctx: &AudioContext, vol: f32, osc_type: OscillatorType, from: f32, to: f32, len: f64) {
        let Some((osc, gain)) = create_osc(ctx, from, osc_type) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.3, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + len)
            .ok();
        osc.frequency().set_value_at_time(from, t).ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(to, t + len * 0.8)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + len + 0.05).ok();
    }

    /// Rising note sequence
    fn arpeggio(ctx: &AudioContext, vol: f32, notes: &[f32], spacing: f64) {
        for (i, freq) in notes.iter().enumerate() {
            let delay = i as f64 * spacing;
            if let Some((osc, gain)) = create_osc(ctx, *freq, OscillatorType::Triangle) {
                let t = ctx.current_time() + delay;
                gain.gain().set_value_at_time(vol * 0.25, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 0.25)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 0.3).ok();
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::AudioManager;

/// Native builds have no audio output
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct AudioManager {
    played: Vec<SoundEffect>,
    tone: Option<ToneCue>,
}

#[cfg(not(target_arch = "wasm32"))]
impl AudioManager {
    pub fn new(_settings: &crate::Settings) -> Self {
        Self::default()
    }

    pub fn apply_settings(&mut self, _settings: &crate::Settings) {}

    pub fn is_available(&self) -> bool {
        false
    }

    pub fn play(&mut self, effect: SoundEffect) {
        log::trace!("sfx {:?}", effect);
        self.played.push(effect);
    }

    pub fn set_tone(&mut self, cue: Option<ToneCue>) {
        self.tone = cue;
    }

    pub fn release(&mut self) {
        self.tone = None;
    }

    /// Effects requested so far (headless runs log these)
    pub fn played(&self) -> &[SoundEffect] {
        &self.played
    }

    pub fn tone(&self) -> Option<ToneCue> {
        self.tone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_for_points() {
        assert_eq!(effect_for_points(3), SoundEffect::Perfect);
        assert_eq!(effect_for_points(2), SoundEffect::Great);
        assert_eq!(effect_for_points(1), SoundEffect::Close);
        assert_eq!(effect_for_points(0), SoundEffect::Miss);
    }

    #[test]
    fn test_tone_cue_clamps() {
        let cue = ToneCue::new(1e6, 3.0);
        assert_eq!(cue.frequency, TONE_MAX_HZ);
        assert_eq!(cue.gain, 1.0);
        let cue = ToneCue::new(f64::NAN, f64::NAN);
        assert_eq!(cue.frequency, TONE_MIN_HZ);
        assert_eq!(cue.gain, 0.0);
    }

    #[test]
    fn test_pitch_for_spans_band() {
        assert_eq!(ToneCue::pitch_for(0.0, (0.0, 10.0)), TONE_MIN_HZ);
        assert!((ToneCue::pitch_for(10.0, (0.0, 10.0)) - TONE_MAX_HZ).abs() < 1e-2);
        let mid = ToneCue::pitch_for(5.0, (0.0, 10.0));
        assert!(mid > TONE_MIN_HZ && mid < TONE_MAX_HZ);
        assert_eq!(ToneCue::pitch_for(5.0, (1.0, 1.0)), TONE_MIN_HZ);
    }

    #[test]
    fn test_native_manager_records() {
        let mut audio = AudioManager::default();
        audio.play(SoundEffect::Launch);
        audio.set_tone(Some(ToneCue::new(440.0, 0.5)));
        assert_eq!(audio.played(), &[SoundEffect::Launch]);
        audio.release();
        assert!(audio.tone().is_none());
    }
}
