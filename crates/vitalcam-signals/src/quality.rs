//! Confidence scoring and quality labels
//!
//! Confidence is the sum of four saturating sub-scores:
//! SNR, heart-rate stability (inverse coefficient of variation), waveform
//! amplitude, and a binary physiologic-validity term.

use serde::Serialize;

use crate::config::QualityConfig;
use crate::physio::AgeBand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    /// Fewer samples than the estimation gate
    Collecting,
    Poor,
    Fair,
    Good,
    Excellent,
    /// Processing fault for this frame
    Error,
}

impl QualityLabel {
    /// Threshold ladder, lower bounds inclusive
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.8 {
            QualityLabel::Excellent
        } else if confidence >= 0.6 {
            QualityLabel::Good
        } else if confidence >= 0.4 {
            QualityLabel::Fair
        } else {
            QualityLabel::Poor
        }
    }

    /// Fair or better
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            QualityLabel::Fair | QualityLabel::Good | QualityLabel::Excellent
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Collecting => "collecting",
            QualityLabel::Poor => "poor",
            QualityLabel::Fair => "fair",
            QualityLabel::Good => "good",
            QualityLabel::Excellent => "excellent",
            QualityLabel::Error => "error",
        }
    }
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress through the sample gate, in [0, 1]
pub fn collecting_confidence(samples: usize, min_valid_samples: usize) -> f32 {
    if min_valid_samples == 0 {
        return 1.0;
    }
    (samples as f32 / min_valid_samples as f32).clamp(0.0, 1.0)
}

/// What the scorer looks at for one estimate
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs<'a> {
    pub snr_db: f32,
    /// Waveform standard deviation in intensity units
    pub amplitude: f32,
    /// Heart-rate history including the current estimate
    pub history: &'a [u32],
    /// Estimate before age clamping
    pub raw_bpm: Option<f32>,
    pub band: AgeBand,
}

/// Weighted sub-scores and their sum
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityBreakdown {
    pub snr: f32,
    pub stability: f32,
    pub amplitude: f32,
    pub validity: f32,
    pub confidence: f32,
}

impl QualityBreakdown {
    pub fn label(&self) -> QualityLabel {
        QualityLabel::from_confidence(self.confidence)
    }
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, input: &QualityInputs<'_>) -> QualityBreakdown {
        let c = &self.config;

        let snr = c.snr_weight * saturate(input.snr_db / c.snr_saturation_db);
        let stability = c.stability_weight * self.stability_fraction(input.history);
        let amplitude = c.amplitude_weight * saturate(input.amplitude / c.amplitude_saturation);
        let validity = match input.raw_bpm {
            Some(bpm) if input.band.contains(bpm) => c.validity_weight,
            _ => 0.0,
        };

        QualityBreakdown {
            snr,
            stability,
            amplitude,
            validity,
            confidence: saturate(snr + stability + amplitude + validity),
        }
    }

    /// Inverse coefficient of variation of the history, saturated to [0, 1]
    fn stability_fraction(&self, history: &[u32]) -> f32 {
        if history.len() < 2 {
            return 0.0;
        }
        let n = history.len() as f32;
        let mean = history.iter().map(|&v| v as f32).sum::<f32>() / n;
        let var = history
            .iter()
            .map(|&v| (v as f32 - mean).powi(2))
            .sum::<f32>()
            / n;
        let std = var.sqrt();
        if std < 1e-6 {
            return 1.0;
        }
        saturate((mean / std) / self.config.stability_saturation)
    }
}

fn saturate(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
