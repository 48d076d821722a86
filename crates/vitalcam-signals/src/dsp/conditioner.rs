//! Signal conditioning chain
//!
//! green window -> DC removal -> FIR bandpass -> Savitzky-Golay -> [0, 1]
//!
//! Kernels are designed once per conditioner; conditioning itself is pure and
//! never touches session state.

use ndarray::Array1;

use super::filters::{
    bandpass_kernel, convolve_same, decimate_for_display, normalize_symmetric, normalize_unit,
    remove_dc, savgol_coefficients, savgol_smooth,
};
use crate::config::FilterConfig;
use crate::error::{SignalError, SignalResult};

/// Output of one conditioning pass
#[derive(Debug, Clone)]
pub struct ConditionedSignal {
    /// Band-passed and smoothed, still in channel-intensity units
    pub filtered: Array1<f32>,
    /// `filtered` rescaled to [0, 1], used for peak picking
    pub waveform: Array1<f32>,
    /// Display trace in [-1, 1], decimated
    pub display: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SignalConditioner {
    kernel: Array1<f32>,
    smoothing: Array1<f32>,
    display_points: usize,
}

impl SignalConditioner {
    pub fn new(config: &FilterConfig, sample_rate: f32) -> SignalResult<Self> {
        Ok(Self {
            kernel: bandpass_kernel(config.fir_taps, sample_rate, config.min_freq, config.max_freq)?,
            smoothing: savgol_coefficients(config.smoothing_window, config.smoothing_order)?,
            display_points: config.display_points,
        })
    }


    /// Condition a raw channel window (oldest sample first)
    pub fn condition(&self, raw: &Array1<f32>) -> SignalResult<ConditionedSignal> {
        let needed = self.smoothing.len();
        if raw.len() < needed {
            return Err(SignalError::SignalTooShort {
                needed,
                actual: raw.len(),
            });
        }
        ensure_finite(raw, "input")?;

        let centred = remove_dc(raw);
        let banded = convolve_same(&centred, &self.kernel);
        ensure_finite(&banded, "bandpass")?;

        let filtered = savgol_smooth(&banded, &self.smoothing);
        ensure_finite(&filtered, "smoothing")?;

        let waveform = normalize_unit(&filtered);
        let display = decimate_for_display(&normalize_symmetric(&filtered), self.display_points);

        Ok(ConditionedSignal {
            filtered,
            waveform,
            display,
        })
    }
}

fn ensure_finite(signal: &Array1<f32>, stage: &'static str) -> SignalResult<()> {
    if signal.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SignalError::NonFiniteSignal { stage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::stats::min_max;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn conditioner() -> SignalConditioner {
        SignalConditioner::new(&FilterConfig::default(), 30.0).unwrap()
    }

    #[test]
    fn test_conditioned_ranges() {
        let raw = Array1::from_shape_fn(300, |i| {
            let t = i as f32 / 30.0;
            120.0 + 3.0 * (2.0 * PI * 1.3 * t).sin() + 0.5 * t
        });
        let out = conditioner().condition(&raw).unwrap();
        assert_eq!(out.filtered.len(), 300);

        let (lo, hi) = min_max(&out.waveform).unwrap();
        assert_relative_eq!(lo, 0.0);
        assert_relative_eq!(hi, 1.0);

        assert_eq!(out.display.len(), 100);
        assert!(out.display.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_flat_input_gives_mid_values() {
        let out = conditioner().condition(&Array1::from_elem(90, 80.0)).unwrap();
        assert!(out.waveform.iter().all(|&v| v == 0.5));
        assert!(out.display.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_and_non_finite_input() {
        let c = conditioner();
        assert_eq!(
            c.condition(&Array1::from_elem(3, 1.0)).unwrap_err(),
            SignalError::SignalTooShort {
                needed: 5,
                actual: 3
            }
        );
        let mut raw = Array1::from_elem(90, 1.0);
        raw[10] = f32::INFINITY;
        assert_eq!(
            c.condition(&raw).unwrap_err(),
            SignalError::NonFiniteSignal { stage: "input" }
        );
    }

    #[test]
    fn test_invalid_design_rejected() {
        let mut config = FilterConfig::default();
        config.fir_taps = 10;
        assert!(matches!(
            SignalConditioner::new(&config, 30.0),
            Err(SignalError::FilterDesign(_))
        ));
    }
}
