//! Physiological estimators built on the conditioned PPG waveform.
//!
//! Notes:
//! - Heart rate is the primary output; it is clamped to an age band, never
//!   rejected.
//! - Blood pressure is an unvalidated heuristic and only runs once a heart
//!   rate exists.

pub mod bands;
pub mod blood_pressure;
pub mod heart_rate;

pub use bands::AgeBand;
pub use blood_pressure::{BloodPressureEstimator, BloodPressureReading, WaveformShape};
pub use heart_rate::{
    detect_peaks, peak_rate, smooth_bpm, HeartRateAnalysis, HeartRateEstimator,
};
