//! Fixed-kernel filters for PPG conditioning
//!
//! - DC removal
//! - Hamming-windowed sinc bandpass, applied as a zero-padded "same" convolution
//!   so edge samples see a partial window instead of wrapping
//! - Savitzky-Golay smoothing (coefficients from a least-squares fit)
//! - Min/max normalisation for the estimator and display scales

use std::f32::consts::PI;

use nalgebra::DMatrix;
use ndarray::Array1;
use num_complex::Complex32;

use super::stats::{mean, min_max};
use crate::error::{SignalError, SignalResult};

/// Hamming window coefficients
pub fn hamming_window(size: usize) -> Array1<f32> {
    if size < 2 {
        return Array1::ones(size);
    }
    Array1::from_shape_fn(size, |i| {
        0.54 - 0.46 * ((2.0 * PI * i as f32) / ((size - 1) as f32)).cos()
    })
}

/// Subtract the window mean
pub fn remove_dc(signal: &Array1<f32>) -> Array1<f32> {
    let m = mean(signal);
    signal.mapv(|v| v - m)
}

/// Design a linear-phase FIR bandpass.
///
/// Difference of two windowed-sinc lowpass kernels, rescaled to unit gain at
/// the geometric centre of the band.
pub fn bandpass_kernel(
    taps: usize,
    sample_rate: f32,
    min_freq: f32,
    max_freq: f32,
) -> SignalResult<Array1<f32>> {
    if taps < 3 || taps % 2 == 0 {
        return Err(SignalError::FilterDesign(format!(
            "kernel length must be odd and >= 3, got {taps}"
        )));
    }
    let nyquist = sample_rate / 2.0;
    if !(min_freq > 0.0 && min_freq < max_freq && max_freq < nyquist) {
        return Err(SignalError::FilterDesign(format!(
            "band {min_freq}-{max_freq} Hz invalid at {sample_rate} Hz"
        )));
    }

    let centre = (taps / 2) as f32;
    let w_lo = 2.0 * PI * min_freq / sample_rate;
    let w_hi = 2.0 * PI * max_freq / sample_rate;
    let window = hamming_window(taps);

    let lowpass = |w: f32, t: f32| {
        if t == 0.0 {
            w / PI
        } else {
            (w * t).sin() / (PI * t)
        }
    };
    let mut kernel = Array1::from_shape_fn(taps, |n| {
        let t = n as f32 - centre;
        (lowpass(w_hi, t) - lowpass(w_lo, t)) * window[n]
    });

    let w0 = 2.0 * PI * (min_freq * max_freq).sqrt() / sample_rate;
    let gain = kernel
        .iter()
        .enumerate()
        .map(|(n, &h)| Complex32::from_polar(h, -w0 * n as f32))
        .sum::<Complex32>()
        .norm();
    if gain < 1e-6 {
        return Err(SignalError::FilterDesign(
            "kernel has no gain in the passband".to_string(),
        ));
    }
    kernel.mapv_inplace(|h| h / gain);
    Ok(kernel)
}

/// Centred convolution, output length equals input length. Samples past the
/// ends count as zero.
pub fn convolve_same(signal: &Array1<f32>, kernel: &Array1<f32>) -> Array1<f32> {
    let n = signal.len() as isize;
    let half = (kernel.len() / 2) as isize;
    Array1::from_shape_fn(signal.len(), |i| {
        kernel
            .iter()
            .enumerate()
            .filter_map(|(k, &h)| {
                let j = i as isize + k as isize - half;
                (0..n).contains(&j).then(|| h * signal[j as usize])
            })
            .sum()
    })
}

/// Savitzky-Golay smoothing coefficients for the window centre.
///
/// First row of the pseudo-inverse `(J^T J)^-1 J^T` of the Vandermonde
/// matrix over offsets `-m..=m`.
pub fn savgol_coefficients(window: usize, order: usize) -> SignalResult<Array1<f32>> {
    if window < 3 || window % 2 == 0 || order >= window {
        return Err(SignalError::FilterDesign(format!(
            "smoothing window {window} / order {order} invalid"
        )));
    }
    let m = (window / 2) as f64;
    let j = DMatrix::<f64>::from_fn(window, order + 1, |i, p| (i as f64 - m).powi(p as i32));
    let jt = j.transpose();
    let inverse = (&jt * &j).try_inverse().ok_or_else(|| {
        SignalError::FilterDesign("singular smoothing design matrix".to_string())
    })?;
    let pinv = inverse * jt;
    Ok(pinv.row(0).iter().map(|&c| c as f32).collect())
}

/// Apply a centred smoothing kernel. The first and last `window / 2` samples
/// are copied through unchanged.
pub fn savgol_smooth(signal: &Array1<f32>, coefficients: &Array1<f32>) -> Array1<f32> {
    let n = signal.len();
    let window = coefficients.len();
    let half = window / 2;
    let mut out = signal.clone();
    if n < window {
        return out;
    }
    for i in half..n - half {
        out[i] = coefficients
            .iter()
            .enumerate()
            .map(|(k, &c)| c * signal[i + k - half])
            .sum();
    }
    out
}

/// Rescale to [0, 1]. A flat window maps to 0.5.
pub fn normalize_unit(signal: &Array1<f32>) -> Array1<f32> {
    match min_max(signal) {
        Some((lo, hi)) if hi > lo => signal.mapv(|v| (v - lo) / (hi - lo)),
        _ => Array1::from_elem(signal.len(), 0.5),
    }
}

/// Rescale to [-1, 1]. A flat window maps to 0.
pub fn normalize_symmetric(signal: &Array1<f32>) -> Array1<f32> {
    normalize_unit(signal).mapv(|v| 2.0 * v - 1.0)
}

/// Pick at most `max_points` evenly spaced samples, endpoints included
pub fn decimate_for_display(signal: &Array1<f32>, max_points: usize) -> Vec<f32> {
    let n = signal.len();
    if n <= max_points {
        return signal.to_vec();
    }
    match max_points {
        0 => Vec::new(),
        1 => vec![signal[n - 1]],
        _ => (0..max_points)
            .map(|i| {
                let idx = (i as f32 * (n - 1) as f32 / (max_points - 1) as f32).round() as usize;
                signal[idx.min(n - 1)]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::stats::std_dev;
    use approx::assert_relative_eq;

    fn sine(freq: f32, fs: f32, n: usize) -> Array1<f32> {
        Array1::from_shape_fn(n, |i| (2.0 * PI * freq * i as f32 / fs).sin())
    }

    #[test]
    fn test_remove_dc() {
        let x = Array1::from(vec![10.0, 12.0, 14.0]);
        let y = remove_dc(&x);
        assert_relative_eq!(y.sum(), 0.0);
        assert_relative_eq!(y[0], -2.0);
    }

    #[test]
    fn test_bandpass_passes_heart_band() {
        let kernel = bandpass_kernel(61, 30.0, 0.8, 3.0).unwrap();
        assert_eq!(kernel.len(), 61);
        // Linear phase
        for i in 0..30 {
            assert_relative_eq!(kernel[i], kernel[60 - i], epsilon = 1e-6);
        }

        let x = sine(1.55, 30.0, 300);
        let y = convolve_same(&x, &kernel);
        let interior = y.slice(ndarray::s![40..260]).to_owned();
        let amp = std_dev(&interior) * 2f32.sqrt();
        assert!((amp - 1.0).abs() < 0.1, "passband amplitude {amp}");
    }

    #[test]
    fn test_bandpass_rejects_dc_and_high_frequency() {
        let kernel = bandpass_kernel(61, 30.0, 0.8, 3.0).unwrap();
        assert!(kernel.sum().abs() < 0.05);

        let x = sine(10.0, 30.0, 300);
        let y = convolve_same(&x, &kernel);
        let interior = y.slice(ndarray::s![40..260]).to_owned();
        assert!(std_dev(&interior) < 0.05);
    }

    #[test]
    fn test_bandpass_design_errors() {
        assert!(bandpass_kernel(30, 30.0, 0.8, 3.0).is_err());
        assert!(bandpass_kernel(31, 30.0, 3.0, 0.8).is_err());
        assert!(bandpass_kernel(31, 4.0, 0.8, 3.0).is_err());
    }

    #[test]
    fn test_convolve_same_edges_are_partial() {
        let x = Array1::from(vec![1.0, 1.0, 1.0, 1.0]);
        let k = Array1::from(vec![1.0, 1.0, 1.0]);
        assert_eq!(convolve_same(&x, &k).to_vec(), vec![2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn test_savgol_five_point_quadratic() {
        let c = savgol_coefficients(5, 2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0];
        for (a, b) in c.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, b / 35.0, epsilon = 1e-5);
        }
        assert!(savgol_coefficients(4, 2).is_err());
        assert!(savgol_coefficients(5, 5).is_err());
    }

    #[test]
    fn test_savgol_preserves_quadratic_and_edges() {
        let c = savgol_coefficients(5, 2).unwrap();
        let x = Array1::from_shape_fn(12, |i| (i as f32).powi(2) * 0.5 + 3.0);
        let y = savgol_smooth(&x, &c);
        for i in 0..12 {
            assert_relative_eq!(y[i], x[i], epsilon = 1e-3);
        }

        let noisy = Array1::from(vec![5.0, -5.0, 5.0, -5.0, 5.0, -5.0, 5.0]);
        let y = savgol_smooth(&noisy, &c);
        assert_eq!(y[0], 5.0);
        assert_eq!(y[1], -5.0);
        assert_eq!(y[6], 5.0);
        assert!(y[3].abs() < 5.0);
    }

    #[test]
    fn test_normalize_flat_window() {
        let flat = Array1::from(vec![7.0; 6]);
        assert!(normalize_unit(&flat).iter().all(|&v| v == 0.5));
        assert!(normalize_symmetric(&flat).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let x = sine(1.2, 30.0, 90).mapv(|v| 40.0 * v + 100.0);
        let once = normalize_unit(&x);
        let twice = normalize_unit(&once);
        let (lo, hi) = min_max(&twice).unwrap();
        assert_relative_eq!(lo, 0.0);
        assert_relative_eq!(hi, 1.0);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_display_decimation() {
        let x = Array1::from_shape_fn(300, |i| i as f32);
        let d = decimate_for_display(&x, 100);
        assert_eq!(d.len(), 100);
        assert_eq!(d[0], 0.0);
        assert_eq!(d[99], 299.0);
        assert_eq!(decimate_for_display(&x.slice(ndarray::s![..10]).to_owned(), 100).len(), 10);
    }
}
