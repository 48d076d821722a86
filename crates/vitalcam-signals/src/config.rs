//! Processor configuration
//!
//! Two layers:
//! - [`ProcessorConfig`]: pipeline tuning, fixed for the lifetime of a
//!   processor. Loaded from TOML with `VITALCAM_*` environment overrides and
//!   validated; inconsistent tuning is rejected with [`ConfigError`].
//! - [`SessionParams`]: per-measurement compensation inputs (temperature,
//!   child age). Never rejected, only clamped.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::vision::HsvRange;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Where frames come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Real camera; the full inter-frame throttle applies.
    #[default]
    Live,
    /// Generated frames replayed at arbitrary speed; only non-increasing
    /// timestamps are throttled.
    Synthetic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub sampling: SamplingConfig,
    pub filter: FilterConfig,
    pub finger: FingerConfig,
    pub heart_rate: HeartRateConfig,
    pub blood_pressure: BloodPressureConfig,
    pub quality: QualityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling rate in Hz
    pub sample_rate: f32,
    /// Signal buffer capacity (samples)
    pub buffer_capacity: usize,
    /// Samples required before estimation starts
    pub min_valid_samples: usize,
    /// Fraction of the sampling interval a frame may arrive early by
    pub frame_interval_tolerance: f32,
    pub input: InputMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lower passband edge (Hz)
    pub min_freq: f32,
    /// Upper passband edge (Hz)
    pub max_freq: f32,
    /// FIR kernel length, odd
    pub fir_taps: usize,
    /// Savitzky-Golay window, odd
    pub smoothing_window: usize,
    /// Savitzky-Golay polynomial order
    pub smoothing_order: usize,
    /// Maximum number of waveform points handed to the display
    pub display_points: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerConfig {
    /// Components smaller than this (pixels) are discarded before shape tests
    pub min_component_pixels: usize,
    /// Accepted polygon area band (pixels^2)
    pub min_area: f32,
    pub max_area: f32,
    /// Exclusive bounding-box aspect band
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Components at or above this circularity are rejected
    pub max_circularity: f32,
    /// Components at or above this perimeter/area are rejected
    pub max_perimeter_ratio: f32,
    /// Consecutive positive frames before presence is reported
    pub required_detections: u32,
    /// Skin-tone bands, any match marks a pixel as skin
    pub skin_ranges: Vec<HsvRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateConfig {
    /// Refractory distance between peaks (seconds). Must not exceed one
    /// period at `filter.max_freq`.
    pub min_peak_distance_sec: f32,
    /// Peak threshold = mean + k * std
    pub peak_k_std: f32,
    /// Weight of the spectral estimate when blended with the peak estimate
    pub spectral_weight: f32,
    /// Relative disagreement above which the spectral estimate replaces the
    /// peak estimate instead of being blended with it
    pub agreement_tolerance: f32,
    pub use_spectral: bool,
    /// Smoothing history length
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BloodPressureConfig {
    pub baseline_systolic: f32,
    pub min_systolic: f32,
    pub max_systolic: f32,
    /// Diastolic = systolic * U[min_ratio, max_ratio)
    pub min_diastolic_ratio: f32,
    pub max_diastolic_ratio: f32,
    /// mmHg per degree C away from the reference temperature
    pub temperature_coefficient: f32,
    pub reference_temperature: f32,
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub snr_weight: f32,
    pub stability_weight: f32,
    pub amplitude_weight: f32,
    pub validity_weight: f32,
    /// SNR (dB) at which the SNR term saturates
    pub snr_saturation_db: f32,
    /// Inverse coefficient of variation at which the stability term saturates
    pub stability_saturation: f32,
    /// Waveform std (intensity units) at which the amplitude term saturates
    pub amplitude_saturation: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            buffer_capacity: 300, // 10 s at 30 Hz
            min_valid_samples: 90,
            frame_interval_tolerance: 0.1,
            input: InputMode::Live,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_freq: 0.8, // 48 BPM
            max_freq: 3.0, // 180 BPM
            fir_taps: 61,
            smoothing_window: 5,
            smoothing_order: 2,
            display_points: 100,
        }
    }
}

impl Default for FingerConfig {
    fn default() -> Self {
        Self {
            min_component_pixels: 50,
            min_area: 200.0,
            max_area: 250_000.0,
            min_aspect_ratio: 1.5,
            max_aspect_ratio: 4.0,
            max_circularity: 0.8,
            max_perimeter_ratio: 0.25,
            required_detections: 5,
            skin_ranges: HsvRange::default_skin_bands(),
        }
    }
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            min_peak_distance_sec: 0.33,
            peak_k_std: 0.5,
            spectral_weight: 0.4,
            agreement_tolerance: 0.2,
            use_spectral: true,
            history_len: 10,
        }
    }
}

impl Default for BloodPressureConfig {
    fn default() -> Self {
        Self {
            baseline_systolic: 100.0,
            min_systolic: 70.0,
            max_systolic: 140.0,
            min_diastolic_ratio: 0.60,
            max_diastolic_ratio: 0.70,
            temperature_coefficient: 2.0,
            reference_temperature: 37.0,
            history_len: 5,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            snr_weight: 0.3,
            stability_weight: 0.3,
            amplitude_weight: 0.2,
            validity_weight: 0.2,
            snr_saturation_db: 10.0,
            stability_saturation: 10.0,
            amplitude_saturation: 1.0,
        }
    }
}

impl SamplingConfig {
    /// Nominal time between samples in seconds
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

impl ProcessorConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProcessorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. User config file (if exists)
    /// 3. Default config file
    /// 4. Built-in defaults (lowest priority)
    pub fn load_layered(
        default_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = ProcessorConfig::default();

        if let Some(path) = default_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        // A user file replaces the default file wholesale
        if let Some(path) = user_path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VITALCAM_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        override_from_env("VITALCAM_SAMPLE_RATE", &mut self.sampling.sample_rate)?;
        override_from_env("VITALCAM_BUFFER_CAPACITY", &mut self.sampling.buffer_capacity)?;
        override_from_env(
            "VITALCAM_MIN_VALID_SAMPLES",
            &mut self.sampling.min_valid_samples,
        )?;
        override_from_env(
            "VITALCAM_REQUIRED_DETECTIONS",
            &mut self.finger.required_detections,
        )?;
        override_from_env("VITALCAM_FILTER_MIN_FREQ", &mut self.filter.min_freq)?;
        override_from_env("VITALCAM_FILTER_MAX_FREQ", &mut self.filter.max_freq)?;
        override_from_env(
            "VITALCAM_SPECTRAL_WEIGHT",
            &mut self.heart_rate.spectral_weight,
        )?;

        if let Ok(val) = std::env::var("VITALCAM_INPUT") {
            self.sampling.input = match val.to_ascii_lowercase().as_str() {
                "live" => InputMode::Live,
                "synthetic" => InputMode::Synthetic,
                _ => {
                    return Err(ConfigError::Validation(format!(
                        "Invalid VITALCAM_INPUT: {val}"
                    )))
                }
            };
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampling;
        if !(s.sample_rate > 0.0) {
            return Err(invalid("sampling.sample_rate must be positive"));
        }
        if s.buffer_capacity == 0 {
            return Err(invalid("sampling.buffer_capacity must be > 0"));
        }
        if s.min_valid_samples < 3 || s.min_valid_samples > s.buffer_capacity {
            return Err(invalid(
                "sampling.min_valid_samples must be in [3, buffer_capacity]",
            ));
        }
        if !(0.0..1.0).contains(&s.frame_interval_tolerance) {
            return Err(invalid("sampling.frame_interval_tolerance must be in [0, 1)"));
        }

        let f = &self.filter;
        if !(f.min_freq > 0.0) || f.min_freq >= f.max_freq {
            return Err(invalid("filter.min_freq must be in (0, max_freq)"));
        }
        if f.max_freq >= s.sample_rate / 2.0 {
            return Err(invalid("filter.max_freq must be below Nyquist"));
        }
        if f.fir_taps < 3 || f.fir_taps % 2 == 0 {
            return Err(invalid("filter.fir_taps must be odd and >= 3"));
        }
        if f.smoothing_window < 3 || f.smoothing_window % 2 == 0 {
            return Err(invalid("filter.smoothing_window must be odd and >= 3"));
        }
        if f.smoothing_order >= f.smoothing_window {
            return Err(invalid("filter.smoothing_order must be < smoothing_window"));
        }

        let g = &self.finger;
        if g.skin_ranges.is_empty() {
            return Err(invalid("finger.skin_ranges must not be empty"));
        }
        if let Some(range) = g.skin_ranges.iter().find(|r| !r.is_ordered()) {
            return Err(ConfigError::Validation(format!(
                "finger.skin_ranges '{}' has lower > upper",
                range.name
            )));
        }
        if g.min_area >= g.max_area {
            return Err(invalid("finger.min_area must be < max_area"));
        }
        if g.min_aspect_ratio >= g.max_aspect_ratio {
            return Err(invalid("finger.min_aspect_ratio must be < max_aspect_ratio"));
        }
        if g.required_detections == 0 {
            return Err(invalid("finger.required_detections must be > 0"));
        }

        let h = &self.heart_rate;
        if !(h.min_peak_distance_sec > 0.0) {
            return Err(invalid("heart_rate.min_peak_distance_sec must be positive"));
        }
        if h.min_peak_distance_sec * f.max_freq > 1.0 {
            return Err(invalid(
                "heart_rate.min_peak_distance_sec must not exceed 1 / filter.max_freq",
            ));
        }
        if !(h.agreement_tolerance > 0.0) {
            return Err(invalid("heart_rate.agreement_tolerance must be positive"));
        }
        if !(0.0..=1.0).contains(&h.spectral_weight) {
            return Err(invalid("heart_rate.spectral_weight must be in [0, 1]"));
        }
        if h.history_len == 0 {
            return Err(invalid("heart_rate.history_len must be > 0"));
        }

        let b = &self.blood_pressure;
        if b.min_systolic >= b.max_systolic {
            return Err(invalid("blood_pressure.min_systolic must be < max_systolic"));
        }
        if b.min_diastolic_ratio >= b.max_diastolic_ratio
            || b.min_diastolic_ratio <= 0.0
            || b.max_diastolic_ratio > 1.0
        {
            return Err(invalid(
                "blood_pressure diastolic ratio band must satisfy 0 < min < max <= 1",
            ));
        }
        if b.history_len == 0 {
            return Err(invalid("blood_pressure.history_len must be > 0"));
        }

        let q = &self.quality;
        let total = q.snr_weight + q.stability_weight + q.amplitude_weight + q.validity_weight;
        if (total - 1.0).abs() > 1e-3 {
            return Err(invalid("quality weights must sum to 1.0"));
        }
        if q.snr_saturation_db <= 0.0
            || q.stability_saturation <= 0.0
            || q.amplitude_saturation <= 0.0
        {
            return Err(invalid("quality saturation thresholds must be positive"));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Validation(msg.to_string())
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var(key) {
        *slot = val
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid {key}")))?;
    }
    Ok(())
}

/// Valid body-temperature range (degrees C)
pub const TEMPERATURE_RANGE: (f32, f32) = (35.0, 42.0);
/// Oldest supported age bucket (years)
pub const MAX_CHILD_AGE: u8 = 7;

/// Caller-supplied compensation inputs for the current measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub temperature: f32,
    pub child_age: u8,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            temperature: 37.0,
            child_age: 5,
        }
    }
}

impl SessionParams {
    /// Build clamped parameters. Out-of-range input is never an error.
    pub fn new(temperature: f32, child_age: i32) -> Self {
        let temperature = if temperature.is_finite() {
            temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1)
        } else {
            Self::default().temperature
        };
        let child_age = child_age.clamp(0, MAX_CHILD_AGE as i32) as u8;
        Self {
            temperature,
            child_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling.buffer_capacity, 300);
        assert_eq!(config.sampling.min_valid_samples, 90);
        assert_eq!(config.finger.required_detections, 5);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = ProcessorConfig::from_toml_str(
            r#"
            [sampling]
            sample_rate = 25.0
            input = "synthetic"

            [heart_rate]
            use_spectral = false
            "#,
        )
        .unwrap();
        assert_eq!(config.sampling.sample_rate, 25.0);
        assert_eq!(config.sampling.input, InputMode::Synthetic);
        assert_eq!(config.sampling.buffer_capacity, 300);
        assert!(!config.heart_rate.use_spectral);
        assert_eq!(config.filter.fir_taps, 61);
    }

    #[test]
    fn test_toml_roundtrip_preserves_skin_bands() {
        let config = ProcessorConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed = ProcessorConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.finger.skin_ranges, config.finger.skin_ranges);
    }

    #[test]
    fn test_validation_rejects_min_samples_above_capacity() {
        let mut config = ProcessorConfig::default();
        config.sampling.min_valid_samples = 400;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_band_above_nyquist() {
        let mut config = ProcessorConfig::default();
        config.filter.max_freq = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_even_smoothing_window() {
        let mut config = ProcessorConfig::default();
        config.filter.smoothing_window = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_refractory_longer_than_band_period() {
        let mut config = ProcessorConfig::default();
        config.heart_rate.min_peak_distance_sec = 0.4;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.filter.max_freq = 2.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_unbalanced_weights() {
        let mut config = ProcessorConfig::default();
        config.quality.snr_weight = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_params_clamp() {
        let p = SessionParams::new(45.0, 10);
        assert_eq!(p.temperature, 42.0);
        assert_eq!(p.child_age, 7);

        let p = SessionParams::new(30.0, -3);
        assert_eq!(p.temperature, 35.0);
        assert_eq!(p.child_age, 0);

        let p = SessionParams::new(f32::NAN, 2);
        assert_eq!(p.temperature, 37.0);
        assert_eq!(p.child_age, 2);
    }
}
