//! Empirical blood-pressure heuristic
//!
//! Not a validated clinical model. Systolic starts at a fixed baseline and is
//! nudged by heart rate, waveform amplitude, skewness and kurtosis, and an age
//! offset, then clamped. Diastolic is a randomised fraction of systolic; the random source
//! is supplied by the caller so sessions can be pinned with a seed. Both
//! values are then compensated for body temperature.

use ndarray::Array1;
use rand::Rng;
use serde::Serialize;

use crate::config::{BloodPressureConfig, SessionParams};
use crate::dsp::stats::{kurtosis, peak_to_peak, skewness, std_dev};

/// Systolic offset per age in years (index = age, 0..=7)
const AGE_OFFSETS: [f32; 8] = [-12.0, -10.0, -8.0, -6.0, -4.0, -3.0, -2.0, 0.0];

/// Shape statistics of the band-passed waveform
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WaveformShape {
    /// Standard deviation
    pub amplitude: f32,
    pub peak_to_peak: f32,
    pub skewness: f32,
    pub kurtosis: f32,
}

impl WaveformShape {
    pub fn measure(filtered: &Array1<f32>) -> Self {
        Self {
            amplitude: std_dev(filtered),
            peak_to_peak: peak_to_peak(filtered),
            skewness: skewness(filtered),
            kurtosis: kurtosis(filtered),
        }
    }
}

/// One estimate in mmHg, unrounded
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BloodPressureReading {
    pub systolic: f32,
    pub diastolic: f32,
}

impl BloodPressureReading {
    /// Component-wise mean
    pub fn mean_of(readings: &[BloodPressureReading]) -> Option<BloodPressureReading> {
        if readings.is_empty() {
            return None;
        }
        let n = readings.len() as f32;
        Some(BloodPressureReading {
            systolic: readings.iter().map(|r| r.systolic).sum::<f32>() / n,
            diastolic: readings.iter().map(|r| r.diastolic).sum::<f32>() / n,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BloodPressureEstimator {
    config: BloodPressureConfig,
}

impl BloodPressureEstimator {
    pub fn new(config: BloodPressureConfig) -> Self {
        Self { config }
    }

    /// Systolic before clamping and temperature compensation
    pub fn systolic_base(&self, shape: &WaveformShape, heart_rate: f32, age: u8) -> f32 {
        let mut systolic = self.config.baseline_systolic;

        if heart_rate > 100.0 {
            systolic += (heart_rate - 100.0) * 0.2;
        } else if heart_rate < 70.0 {
            systolic -= (70.0 - heart_rate) * 0.2;
        }

        if shape.amplitude > 2.0 {
            systolic += 5.0;
        } else if shape.amplitude < 0.5 {
            systolic -= 5.0;
        }
        if shape.skewness > 0.5 {
            systolic += 2.0;
        }
        // Sharp systolic upstroke: peaked beats, flat diastolic runs
        if shape.kurtosis > 1.0 {
            systolic += 2.0;
        } else if shape.kurtosis < -1.2 {
            systolic -= 1.0;
        }
        if shape.peak_to_peak > 6.0 {
            systolic += 3.0;
        }

        systolic + AGE_OFFSETS[(age as usize).min(AGE_OFFSETS.len() - 1)]
    }

    /// mmHg added to both values for the session temperature
    pub fn temperature_offset(&self, temperature: f32) -> f32 {
        (temperature - self.config.reference_temperature) * self.config.temperature_coefficient
    }

    /// Estimate from waveform shape and a valid (smoothed) heart rate
    pub fn estimate<R: Rng + ?Sized>(
        &self,
        shape: &WaveformShape,
        heart_rate: f32,
        params: &SessionParams,
        rng: &mut R,
    ) -> BloodPressureReading {
        let c = &self.config;
        let systolic = self
            .systolic_base(shape, heart_rate, params.child_age)
            .clamp(c.min_systolic, c.max_systolic);
        let ratio = rng.gen_range(c.min_diastolic_ratio..c.max_diastolic_ratio);
        let diastolic = systolic * ratio;

        let offset = self.temperature_offset(params.temperature);
        BloodPressureReading {
            systolic: systolic + offset,
            diastolic: diastolic + offset,
        }
    }
}
