//! Frequency-domain dominant frequency and SNR
//!
//! Hamming window, forward FFT, strongest bin inside the band refined by
//! parabolic interpolation. SNR is the peak bin power against the rest of the
//! in-band power.

use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;

use super::filters::hamming_window;

/// Dominant in-band component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Interpolated peak frequency (Hz)
    pub frequency_hz: f32,
    /// Peak power over remaining in-band power (dB)
    pub snr_db: f32,
}

impl SpectralPeak {
    pub fn bpm(&self) -> f32 {
        self.frequency_hz * 60.0
    }
}

/// FFT analyser. Keeps its planner so repeated windows of the same length
/// reuse the plan.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f32>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer").finish_non_exhaustive()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// One-sided power spectrum of the Hamming-windowed signal
    pub fn power_spectrum(&mut self, signal: &Array1<f32>) -> Vec<f32> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let window = hamming_window(n);
        let mut buffer: Vec<Complex32> = signal
            .iter()
            .zip(window.iter())
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        buffer.iter().take(n / 2).map(|c| c.norm_sqr()).collect()
    }

    /// Strongest component between `min_freq` and `max_freq`.
    ///
    /// `None` for windows under 32 samples, an empty band, or a silent signal.
    pub fn dominant_frequency(
        &mut self,
        signal: &Array1<f32>,
        fs: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<SpectralPeak> {
        let n = signal.len();
        if n < 32 || fs <= 0.0 {
            return None;
        }

        let power = self.power_spectrum(signal);
        let half_n = power.len();
        let bin_res = fs / n as f32;
        let min_bin = ((min_freq / bin_res).ceil() as usize).max(1);
        let max_bin = ((max_freq / bin_res).floor() as usize).min(half_n - 1);
        if min_bin >= max_bin {
            return None;
        }

        let mut peak_bin = min_bin;
        let mut max_power = 0.0f32;
        let mut total_power = 0.0f32;
        for (i, &p) in power.iter().enumerate().take(max_bin + 1).skip(min_bin) {
            total_power += p;
            if p > max_power {
                max_power = p;
                peak_bin = i;
            }
        }
        if max_power <= 0.0 || !max_power.is_finite() {
            return None;
        }

        let noise = (total_power - max_power).max(1e-12);
        let snr_db = 10.0 * (max_power / noise).log10();

        let refined_bin = if peak_bin > 0 && peak_bin + 1 < half_n {
            let y_m1 = power[peak_bin - 1];
            let y_0 = power[peak_bin];
            let y_p1 = power[peak_bin + 1];
            let denom = y_m1 - 2.0 * y_0 + y_p1;
            let delta = if denom.abs() > 1e-12 {
                0.5 * (y_m1 - y_p1) / denom
            } else {
                0.0
            };
            if delta.is_finite() && delta.abs() <= 1.0 {
                peak_bin as f32 + delta
            } else {
                peak_bin as f32
            }
        } else {
            peak_bin as f32
        };

        Some(SpectralPeak {
            frequency_hz: refined_bin * bin_res,
            snr_db,
        })
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
