//! Descriptive statistics over signal windows
//!
//! Population moments (divide by n). Empty input yields 0.0 rather than NaN so
//! callers never have to special-case a cold buffer.

use ndarray::Array1;

pub fn mean(x: &Array1<f32>) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    x.sum() / x.len() as f32
}

/// Population standard deviation
pub fn std_dev(x: &Array1<f32>) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    (x.iter().map(|v| (v - m).powi(2)).sum::<f32>() / x.len() as f32).sqrt()
}

/// Third standardised moment, 0 for a flat window
pub fn skewness(x: &Array1<f32>) -> f32 {
    let sd = std_dev(x);
    if sd < 1e-9 {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| ((v - m) / sd).powi(3)).sum::<f32>() / x.len() as f32
}

/// Excess kurtosis (normal = 0), 0 for a flat window
pub fn kurtosis(x: &Array1<f32>) -> f32 {
    let sd = std_dev(x);
    if sd < 1e-9 {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| ((v - m) / sd).powi(4)).sum::<f32>() / x.len() as f32 - 3.0
}

/// max - min
pub fn peak_to_peak(x: &Array1<f32>) -> f32 {
    match min_max(x) {
        Some((lo, hi)) => hi - lo,
        None => 0.0,
    }
}

pub fn min_max(x: &Array1<f32>) -> Option<(f32, f32)> {
    let first = *x.iter().next()?;
    Some(
        x.iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Median; even counts average the two middle values
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moments_of_known_window() {
        let x = Array1::from(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(mean(&x), 5.0);
        assert_relative_eq!(std_dev(&x), 2.0);
        assert_relative_eq!(peak_to_peak(&x), 7.0);
        assert!(skewness(&x) > 0.0);
    }

    #[test]
    fn test_symmetric_window_has_zero_skew() {
        let x = Array1::from(vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_relative_eq!(skewness(&x), 0.0, epsilon = 1e-6);
        // Uniform-ish spread is platykurtic
        assert!(kurtosis(&x) < 0.0);
    }

    #[test]
    fn test_flat_and_empty_windows() {
        let flat = Array1::from(vec![3.0; 10]);
        assert_eq!(std_dev(&flat), 0.0);
        assert_eq!(skewness(&flat), 0.0);
        assert_eq!(kurtosis(&flat), 0.0);

        let empty = Array1::<f32>::zeros(0);
        assert_eq!(mean(&empty), 0.0);
        assert_eq!(min_max(&empty), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
