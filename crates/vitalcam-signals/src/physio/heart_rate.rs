//! Heart-rate estimation from the conditioned PPG waveform
//!
//! Peak picking (local maxima above mean + k*std with a refractory distance)
//! gives the primary estimate. The FFT dominant frequency in the pass band
//! cross-checks it: close estimates are blended, and a peak rate that
//! disagrees with the spectrum (a missed or doubled beat) is replaced by the
//! spectral rate. The spectrum also supplies the SNR used for scoring.

use log::debug;
use ndarray::Array1;

use super::bands::AgeBand;
use crate::config::{FilterConfig, HeartRateConfig};
use crate::dsp::stats::{mean, median, std_dev};
use crate::dsp::{ConditionedSignal, SpectralPeak, SpectrumAnalyzer};

/// Local maxima above `mean + k_std * std`, at least `min_distance` samples
/// apart. A candidate too close to the previous accepted peak is skipped.
///
/// A flat top (a run of equal samples higher than both of its neighbours)
/// counts as one peak at its first sample. Runs touching either end of the
/// signal are not peaks.
pub fn detect_peaks(signal: &Array1<f32>, min_distance: usize, k_std: f32) -> Vec<usize> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }
    let threshold = mean(signal) + k_std * std_dev(signal);

    let mut peaks: Vec<usize> = Vec::new();
    let mut i = 1;
    while i < n - 1 {
        let value = signal[i];
        if !(value > threshold && value > signal[i - 1]) {
            i += 1;
            continue;
        }
        let mut end = i;
        while end + 1 < n - 1 && signal[end + 1] == value {
            end += 1;
        }
        let is_peak = signal[end + 1] < value;
        let far_enough = peaks.last().map_or(true, |&last| i - last >= min_distance);
        if is_peak && far_enough {
            peaks.push(i);
        }
        i = end + 1;
    }
    peaks
}

/// BPM from the mean inter-peak interval; `None` with fewer than two peaks
pub fn peak_rate(peaks: &[usize], sample_rate: f32) -> Option<f32> {
    let (&first, &last) = (peaks.first()?, peaks.last()?);
    if peaks.len() < 2 || last == first {
        return None;
    }
    let mean_interval_sec = (last - first) as f32 / (peaks.len() - 1) as f32 / sample_rate;
    Some(60.0 / mean_interval_sec)
}

/// Median of recent estimates, rounded
pub fn smooth_bpm(history: &[u32]) -> Option<u32> {
    let values: Vec<f32> = history.iter().map(|&v| v as f32).collect();
    median(&values).map(|m| m.round() as u32)
}

/// Per-call estimate breakdown
#[derive(Debug, Clone, Default)]
pub struct HeartRateAnalysis {
    pub peaks: Vec<usize>,
    /// From inter-peak intervals
    pub peak_bpm: Option<f32>,
    pub spectral: Option<SpectralPeak>,
    /// Blended estimate before age clamping
    pub raw_bpm: Option<f32>,
    /// Clamped to the age band and rounded
    pub bpm: Option<u32>,
}

impl HeartRateAnalysis {
    pub fn snr_db(&self) -> f32 {
        self.spectral.map(|s| s.snr_db).unwrap_or(0.0)
    }
}

#[derive(Debug)]
pub struct HeartRateEstimator {
    config: HeartRateConfig,
    sample_rate: f32,
    min_freq: f32,
    max_freq: f32,
    spectrum: SpectrumAnalyzer,
}

impl HeartRateEstimator {
    pub fn new(config: HeartRateConfig, filter: &FilterConfig, sample_rate: f32) -> Self {
        Self {
            config,
            sample_rate,
            min_freq: filter.min_freq,
            max_freq: filter.max_freq,
            spectrum: SpectrumAnalyzer::new(),
        }
    }

    /// Refractory distance in samples, rounded down so a beat at the top of
    /// the pass band is never skipped
    pub fn min_peak_distance(&self) -> usize {
        (self.config.min_peak_distance_sec * self.sample_rate)
            .floor()
            .max(1.0) as usize
    }

    /// Combine the peak and spectral rates
    fn reconcile(&self, peak_bpm: Option<f32>, spectral: Option<SpectralPeak>) -> Option<f32> {
        let peak = peak_bpm?;
        let spectral = match spectral {
            Some(s) if self.config.use_spectral => s.bpm(),
            _ => return Some(peak),
        };
        if (peak - spectral).abs() > self.config.agreement_tolerance * spectral {
            debug!("peak rate {peak:.1} disagrees with spectrum {spectral:.1}, using spectrum");
            return Some(spectral);
        }
        let w = self.config.spectral_weight;
        Some((1.0 - w) * peak + w * spectral)
    }

    pub fn estimate(&mut self, signal: &ConditionedSignal, band: AgeBand) -> HeartRateAnalysis {
        let peaks = detect_peaks(
            &signal.waveform,
            self.min_peak_distance(),
            self.config.peak_k_std,
        );
        let peak_bpm = peak_rate(&peaks, self.sample_rate);
        let spectral = self.spectrum.dominant_frequency(
            &signal.filtered,
            self.sample_rate,
            self.min_freq,
            self.max_freq,
        );

        let raw_bpm = self.reconcile(peak_bpm, spectral);
        let bpm = raw_bpm.map(|r| band.clamp(r));

        debug!(
            "hr estimate: {} peaks, peak {:?} bpm, spectral {:?} bpm, snr {:.1} dB -> {:?}",
            peaks.len(),
            peak_bpm,
            spectral.map(|s| s.bpm()),
            spectral.map(|s| s.snr_db).unwrap_or(0.0),
            bpm
        );

        HeartRateAnalysis {
            peaks,
            peak_bpm,
            spectral,
            raw_bpm,
            bpm,
        }
    }
}
