//! Engine settings and preferences
//!
//! Persisted in LocalStorage on the web, shared by every widget on the page.

use serde::{Deserialize, Serialize};

use crate::consts::{DT_CAP, POPUP_DURATION};
use crate::error::Result;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Fraction of each requested particle burst actually emitted
    pub fn burst_scale(&self) -> f64 {
        match self {
            QualityPreset::Low => 0.25,
            QualityPreset::Medium => 0.6,
            QualityPreset::High => 1.0,
        }
    }
}

/// Engine settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,

    // === Visual Effects ===
    /// Particle effects (sparks, confetti, trails)
    pub particles: bool,
    /// Pulsing target markers and popups rising
    pub reduced_motion: bool,
    /// High contrast palette for panels and labels
    pub high_contrast: bool,

    // === Audio ===
    /// Audio side-channel on/off
    pub audio: bool,
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Feedback sound volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Continuous physics tone volume (0.0 - 1.0)
    pub tone_volume: f32,

    // === Timing ===
    /// Largest frame delta applied to physics (seconds)
    pub dt_cap: f64,
    /// Score popup lifetime (seconds)
    pub popup_duration: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,

            particles: true,
            reduced_motion: false,
            high_contrast: false,

            // Audio stays off until the user opts in (needs a gesture anyway)
            audio: false,
            master_volume: 0.8,
            sfx_volume: 1.0,
            tone_volume: 0.4,

            dt_cap: DT_CAP,
            popup_duration: POPUP_DURATION,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Parse host-injected JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Clamp every value into its meaningful range
    pub fn sanitized(mut self) -> Self {
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self.sfx_volume = self.sfx_volume.clamp(0.0, 1.0);
        self.tone_volume = self.tone_volume.clamp(0.0, 1.0);
        self.dt_cap = if self.dt_cap.is_finite() {
            self.dt_cap.clamp(0.001, 0.25)
        } else {
            DT_CAP
        };
        self.popup_duration = if self.popup_duration.is_finite() {
            self.popup_duration.clamp(0.2, 10.0)
        } else {
            POPUP_DURATION
        };
        self
    }

    /// Scale a requested particle burst to the quality preset
    pub fn scaled_burst(&self, requested: usize) -> usize {
        if !self.particles || requested == 0 {
            return 0;
        }
        ((requested as f64 * self.quality.burst_scale()).round() as usize).max(1)
    }

    /// Effective feedback volume
    pub fn effective_sfx_volume(&self) -> f32 {
        if self.audio {
            self.master_volume * self.sfx_volume
        } else {
            0.0
        }
    }

    /// Effective tone volume
    pub fn effective_tone_volume(&self) -> f32 {
        if self.audio {
            self.master_volume * self.tone_volume
        } else {
            0.0
        }
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "physics_lab_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings = Settings::from_json(r#"{"quality":"High","audio":true}"#).unwrap();
        assert_eq!(settings.quality, QualityPreset::High);
        assert!(settings.audio);
        assert_eq!(settings.dt_cap, DT_CAP);
        assert!(settings.particles);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = Settings::from_json("{not json").unwrap_err();
        assert!(matches!(err, crate::EngineError::Config(_)));
    }

    #[test]
    fn test_sanitize_clamps() {
        let settings = Settings {
            master_volume: 3.0,
            dt_cap: 10.0,
            popup_duration: f64::NAN,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.dt_cap, 0.25);
        assert_eq!(settings.popup_duration, POPUP_DURATION);
    }

    #[test]
    fn test_scaled_burst() {
        let mut settings = Settings::from_preset(QualityPreset::Low);
        assert_eq!(settings.scaled_burst(20), 5);
        assert_eq!(settings.scaled_burst(1), 1);
        settings.particles = false;
        assert_eq!(settings.scaled_burst(20), 0);
    }

    #[test]
    fn test_audio_off_silences() {
        let settings = Settings::default();
        assert_eq!(settings.effective_sfx_volume(), 0.0);
        assert_eq!(settings.effective_tone_volume(), 0.0);
    }

    #[test]
    fn test_round_trip_json() {
        let settings = Settings::from_preset(QualityPreset::High);
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }
}
