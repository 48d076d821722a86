//! Vital-signs pipeline
//!
//! Orchestrates one measurement session:
//! - Inter-frame throttle
//! - Finger detection with hysteresis
//! - Region reduction into the signal buffer
//! - Minimum-sample gating
//! - Conditioning, heart rate, blood pressure and quality scoring
//!
//! All per-session state lives in [`SessionState`]. A frame either commits
//! its sample and estimates in full or leaves the session untouched, and
//! `reset()` swaps in a fresh state in one assignment.

use log::{debug, error, info, warn};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::buffer::{BoundedHistory, Sample, SignalBuffer};
use crate::config::{ConfigError, InputMode, ProcessorConfig, SessionParams};
use crate::dsp::stats::std_dev;
use crate::dsp::SignalConditioner;
use crate::error::{SignalError, SignalResult};
use crate::frame::{reduce_region, ChannelMeans, Frame, PixelFormat};
use crate::physio::{
    smooth_bpm, AgeBand, BloodPressureEstimator, BloodPressureReading, HeartRateAnalysis,
    HeartRateEstimator, WaveformShape,
};
use crate::quality::{collecting_confidence, QualityBreakdown, QualityInputs, QualityLabel, QualityScorer};
use crate::source::FrameSource;
use crate::vision::{DetectionState, FingerDetector};

/// Reported blood pressure, whole mmHg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

impl From<BloodPressureReading> for BloodPressure {
    fn from(r: BloodPressureReading) -> Self {
        Self {
            systolic: r.systolic.round().max(0.0) as u32,
            diastolic: r.diastolic.round().max(0.0) as u32,
        }
    }
}

/// Per-frame result handed to the display layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsResult {
    pub finger_detected: bool,
    pub heart_rate: Option<u32>,
    pub blood_pressure: Option<BloodPressure>,
    /// Always in [0, 1]
    pub confidence: f32,
    pub quality: QualityLabel,
    /// Display trace in [-1, 1]
    pub signal_data: Vec<f32>,
    pub message: Option<String>,
}

impl VitalsResult {
    /// Worth showing as a final reading: fair or better and above the caller's gate
    pub fn is_reportable(&self, min_confidence: f32) -> bool {
        self.heart_rate.is_some() && self.quality.is_usable() && self.confidence > min_confidence
    }
}

/// Breakdown of the most recent full estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateSummary {
    pub peaks: usize,
    pub peak_bpm: Option<f32>,
    pub spectral_bpm: Option<f32>,
    pub snr_db: f32,
    pub raw_bpm: Option<f32>,
    pub amplitude: f32,
    pub quality: QualityBreakdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameCounters {
    /// Every call into the processor
    pub received: u64,
    /// Dropped by the inter-frame throttle
    pub throttled: u64,
    /// Passed the throttle
    pub accepted: u64,
}

/// Everything that belongs to one measurement
#[derive(Debug, Clone)]
pub struct SessionState {
    buffer: SignalBuffer,
    detection: DetectionState,
    heart_rates: BoundedHistory<u32>,
    blood_pressures: BoundedHistory<BloodPressureReading>,
    last_accepted: Option<f64>,
    counters: FrameCounters,
    last_estimate: Option<EstimateSummary>,
}

impl SessionState {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            buffer: SignalBuffer::new(config.sampling.buffer_capacity),
            detection: DetectionState::new(config.finger.required_detections),
            heart_rates: BoundedHistory::new(config.heart_rate.history_len),
            blood_pressures: BoundedHistory::new(config.blood_pressure.history_len),
            last_accepted: None,
            counters: FrameCounters::default(),
            last_estimate: None,
        }
    }
}

/// Read-only diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorStats {
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    /// Seconds spanned by the buffered samples
    pub window_seconds: f64,
    pub min_valid_samples: usize,
    pub sample_rate: f32,
    pub input: InputMode,
    pub heart_rate_history: Vec<u32>,
    pub blood_pressure_history: Vec<BloodPressure>,
    pub detection: DetectionState,
    pub detector_confidence: f32,
    pub params: SessionParams,
    pub frames: FrameCounters,
    pub last_estimate: Option<EstimateSummary>,
}

/// Outcome of a full analysis, not yet committed
struct Estimate {
    display: Vec<f32>,
    hr: HeartRateAnalysis,
    heart_rate: Option<u32>,
    reading: Option<BloodPressureReading>,
    blood_pressure: Option<BloodPressure>,
    amplitude: f32,
    quality: QualityBreakdown,
}

pub struct VitalSignsProcessor {
    config: ProcessorConfig,
    params: SessionParams,
    detector: FingerDetector,
    conditioner: SignalConditioner,
    heart_rate: HeartRateEstimator,
    blood_pressure: BloodPressureEstimator,
    scorer: QualityScorer,
    rng: StdRng,
    session: SessionState,
}

impl VitalSignsProcessor {
    /// Processor with an entropy-seeded diastolic ratio source
    pub fn new(config: ProcessorConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Processor whose randomised output is reproducible for a given seed
    pub fn with_seed(config: ProcessorConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ProcessorConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let sample_rate = config.sampling.sample_rate;
        let conditioner = SignalConditioner::new(&config.filter, sample_rate)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(Self {
            detector: FingerDetector::new(config.finger.clone()),
            conditioner,
            heart_rate: HeartRateEstimator::new(config.heart_rate.clone(), &config.filter, sample_rate),
            blood_pressure: BloodPressureEstimator::new(config.blood_pressure.clone()),
            scorer: QualityScorer::new(config.quality.clone()),
            session: SessionState::new(&config),
            params: SessionParams::default(),
            config,
            rng,
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn params(&self) -> SessionParams {
        self.params
    }

    /// Set compensation parameters. Out-of-range values are clamped.
    pub fn configure(&mut self, temperature: f32, child_age: i32) -> SessionParams {
        let params = SessionParams::new(temperature, child_age);
        if params.temperature != temperature || params.child_age as i32 != child_age {
            info!(
                "session params clamped: temperature {temperature} -> {}, age {child_age} -> {}",
                params.temperature, params.child_age
            );
        } else {
            info!(
                "session params: temperature {}, age {}",
                params.temperature, params.child_age
            );
        }
        self.params = params;
        params
    }

    /// Process a decoded frame. `None` when the throttle drops it.
    pub fn process_frame(&mut self, frame: &Frame, timestamp: f64) -> Option<VitalsResult> {
        if !self.admit(timestamp)? {
            return Some(self.fault_result(false));
        }

        let classification = self.detector.classify(frame);
        if !self.session.detection.update(classification.is_positive()) {
            return Some(self.not_detected_result());
        }

        let region = classification.contour.as_ref().map(|c| c.pixels.as_slice());
        let Some(means) = reduce_region(frame, region) else {
            debug!("finger region has no valid pixels, frame dropped");
            return None;
        };
        Some(self.ingest(means, timestamp))
    }

    /// Process a raw camera buffer. A malformed buffer yields an error result.
    pub fn process_raw(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: f64,
    ) -> Option<VitalsResult> {
        match Frame::decode(data, width, height, format) {
            Ok(frame) => self.process_frame(&frame, timestamp),
            Err(err) => {
                self.session.counters.received += 1;
                error!("rejected raw frame: {err}");
                Some(self.fault_result(false))
            }
        }
    }

    /// Process channel means reduced elsewhere, with the caller's per-frame
    /// finger verdict. Throttle, hysteresis and gating still apply.
    pub fn process_sample(
        &mut self,
        means: ChannelMeans,
        timestamp: f64,
        finger_present: bool,
    ) -> Option<VitalsResult> {
        if !self.admit(timestamp)? {
            return Some(self.fault_result(false));
        }
        if !self.session.detection.update(finger_present) {
            return Some(self.not_detected_result());
        }
        Some(self.ingest(means, timestamp))
    }

    /// Drain a frame source, collecting every result the throttle lets through
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Vec<VitalsResult> {
        let mut results = Vec::new();
        while let Some((frame, timestamp)) = source.next_frame() {
            if let Some(result) = self.process_frame(&frame, timestamp) {
                results.push(result);
            }
        }
        results
    }

    /// Clear all session state. Session params and configuration are kept.
    pub fn reset(&mut self) {
        self.session = SessionState::new(&self.config);
        info!("session reset");
    }

    pub fn stats(&self) -> ProcessorStats {
        let s = &self.session;
        ProcessorStats {
            buffer_len: s.buffer.len(),
            buffer_capacity: s.buffer.capacity(),
            window_seconds: s.buffer.duration(),
            min_valid_samples: self.config.sampling.min_valid_samples,
            sample_rate: self.config.sampling.sample_rate,
            input: self.config.sampling.input,
            heart_rate_history: s.heart_rates.to_vec(),
            blood_pressure_history: s.blood_pressures.iter().map(|&r| r.into()).collect(),
            detection: s.detection,
            detector_confidence: s.detection.confidence(),
            params: self.params,
            frames: s.counters,
            last_estimate: s.last_estimate.clone(),
        }
    }

    /// Count the call and apply the throttle.
    ///
    /// `None`: throttled. `Some(false)`: unusable timestamp. `Some(true)`: go on.
    fn admit(&mut self, timestamp: f64) -> Option<bool> {
        self.session.counters.received += 1;
        if !timestamp.is_finite() {
            error!("non-finite frame timestamp {timestamp}");
            return Some(false);
        }

        if let Some(last) = self.session.last_accepted {
            let elapsed = timestamp - last;
            let min_gap = match self.config.sampling.input {
                InputMode::Live => {
                    self.config.sampling.sample_interval()
                        * (1.0 - self.config.sampling.frame_interval_tolerance as f64)
                }
                InputMode::Synthetic => 0.0,
            };
            if elapsed <= 0.0 || elapsed < min_gap {
                self.session.counters.throttled += 1;
                return None;
            }
        }

        self.session.last_accepted = Some(timestamp);
        self.session.counters.accepted += 1;
        Some(true)
    }

    fn ingest(&mut self, means: ChannelMeans, timestamp: f64) -> VitalsResult {
        match self.try_ingest(Sample::new(timestamp, means)) {
            Ok(result) => result,
            Err(err @ (SignalError::NonFiniteSample | SignalError::OutOfOrderSample { .. })) => {
                warn!("sample rejected: {err}");
                self.fault_result(true)
            }
            Err(err) => {
                error!("processing fault, session state unchanged: {err}");
                self.fault_result(true)
            }
        }
    }

    fn try_ingest(&mut self, sample: Sample) -> SignalResult<VitalsResult> {
        self.session.buffer.check(&sample)?;

        let held = self.session.buffer.len();
        let min = self.config.sampling.min_valid_samples;
        let count = (held + 1).min(self.session.buffer.capacity());
        if count < min {
            self.session.buffer.push(sample)?;
            return Ok(self.collecting_result(count));
        }
        if held + 1 == min {
            debug!("collected {min} samples, starting estimation");
        }

        let window = self.session.buffer.green_with(&sample);
        let estimate = self.analyze(&window)?;

        // Commit
        self.session.buffer.push(sample)?;
        if let Some(bpm) = estimate.hr.bpm {
            self.session.heart_rates.push(bpm);
        }
        if let Some(reading) = estimate.reading {
            self.session.blood_pressures.push(reading);
        }
        self.session.last_estimate = Some(EstimateSummary {
            peaks: estimate.hr.peaks.len(),
            peak_bpm: estimate.hr.peak_bpm,
            spectral_bpm: estimate.hr.spectral.map(|s| s.bpm()),
            snr_db: estimate.hr.snr_db(),
            raw_bpm: estimate.hr.raw_bpm,
            amplitude: estimate.amplitude,
            quality: estimate.quality,
        });

        Ok(self.estimate_result(estimate))
    }

    /// Run every estimation stage against a candidate window. Reads session
    /// histories but never writes them.
    fn analyze(&mut self, window: &Array1<f32>) -> SignalResult<Estimate> {
        let conditioned = self.conditioner.condition(window)?;
        let band = AgeBand::for_age(self.params.child_age);
        let hr = self.heart_rate.estimate(&conditioned, band);
        let amplitude = std_dev(&conditioned.filtered);

        let history = match hr.bpm {
            Some(bpm) => self.session.heart_rates.with_pushed(bpm),
            None => Vec::new(),
        };
        let heart_rate = smooth_bpm(&history).map(|m| band.clamp(m as f32));

        let quality = self.scorer.score(&QualityInputs {
            snr_db: hr.snr_db(),
            amplitude,
            history: &history,
            raw_bpm: hr.raw_bpm,
            band,
        });
        if !quality.confidence.is_finite() {
            return Err(SignalError::NonFiniteSignal { stage: "quality" });
        }

        let (reading, blood_pressure) = match heart_rate {
            Some(rate) => {
                let shape = WaveformShape::measure(&conditioned.filtered);
                let reading =
                    self.blood_pressure
                        .estimate(&shape, rate as f32, &self.params, &mut self.rng);
                let reported = BloodPressureReading::mean_of(
                    &self.session.blood_pressures.with_pushed(reading),
                );
                (Some(reading), reported.map(BloodPressure::from))
            }
            None => {
                if quality.label().is_usable() {
                    warn!(
                        "no heart rate from a {} signal, blood pressure skipped",
                        quality.label()
                    );
                }
                (None, None)
            }
        };

        Ok(Estimate {
            display: conditioned.display,
            hr,
            heart_rate,
            reading,
            blood_pressure,
            amplitude,
            quality,
        })
    }

    fn estimate_result(&self, estimate: Estimate) -> VitalsResult {
        let label = estimate.quality.label();
        let message = match (estimate.heart_rate, label) {
            (None, _) => Some("Insufficient peaks, keep your finger still".to_string()),
            (Some(_), QualityLabel::Poor) => {
                Some("Weak signal, adjust finger pressure".to_string())
            }
            _ => None,
        };
        VitalsResult {
            finger_detected: true,
            heart_rate: estimate.heart_rate,
            blood_pressure: estimate.blood_pressure,
            confidence: estimate.quality.confidence,
            quality: label,
            signal_data: estimate.display,
            message,
        }
    }

    fn collecting_result(&self, samples: usize) -> VitalsResult {
        let min = self.config.sampling.min_valid_samples;
        VitalsResult {
            finger_detected: true,
            heart_rate: None,
            blood_pressure: None,
            confidence: collecting_confidence(samples, min),
            quality: QualityLabel::Collecting,
            signal_data: Vec::new(),
            message: Some(format!("Collecting signal ({samples}/{min})")),
        }
    }

    fn not_detected_result(&self) -> VitalsResult {
        let detection = &self.session.detection;
        let message = if detection.consecutive_detections > 0 {
            "Finger found, hold still"
        } else {
            "Place your finger over the camera and flash"
        };
        VitalsResult {
            finger_detected: false,
            heart_rate: None,
            blood_pressure: None,
            confidence: detection.confidence(),
            quality: QualityLabel::Poor,
            signal_data: Vec::new(),
            message: Some(message.to_string()),
        }
    }

    fn fault_result(&self, finger_detected: bool) -> VitalsResult {
        VitalsResult {
            finger_detected,
            heart_rate: None,
            blood_pressure: None,
            confidence: 0.0,
            quality: QualityLabel::Error,
            signal_data: Vec::new(),
            message: Some("Processing error, measurement continues".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn processor() -> VitalSignsProcessor {
        VitalSignsProcessor::with_seed(ProcessorConfig::default(), 42).unwrap()
    }

    fn pulse(t: f64, bpm: f32) -> ChannelMeans {
        let phase = 2.0 * PI * (bpm / 60.0) * t as f32;
        ChannelMeans::new(180.0, 70.0 + 3.0 * phase.sin(), 50.0)
    }

    #[test]
    fn test_processor_creation() {
        let p = processor();
        let stats = p.stats();
        assert_eq!(stats.buffer_len, 0);
        assert_eq!(stats.buffer_capacity, 300);
        assert_eq!(stats.frames, FrameCounters::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ProcessorConfig::default();
        config.sampling.min_valid_samples = 1000;
        assert!(VitalSignsProcessor::new(config).is_err());
    }

    #[test]
    fn test_hysteresis_gates_buffer() {
        let mut p = processor();
        for i in 0..4 {
            let r = p.process_sample(pulse(i as f64 / 30.0, 90.0), i as f64 / 30.0, true).unwrap();
            assert!(!r.finger_detected);
        }
        assert_eq!(p.stats().buffer_len, 0);

        let r = p.process_sample(pulse(4.0 / 30.0, 90.0), 4.0 / 30.0, true).unwrap();
        assert!(r.finger_detected);
        assert_eq!(r.quality, QualityLabel::Collecting);
        assert_eq!(p.stats().buffer_len, 1);
        assert_eq!(p.stats().window_seconds, 0.0);

        p.process_sample(pulse(5.0 / 30.0, 90.0), 5.0 / 30.0, true);
        assert!((p.stats().window_seconds - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_throttle_drops_fast_frames() {
        let mut p = processor();
        assert!(p.process_sample(pulse(0.0, 90.0), 0.0, true).is_some());
        assert!(p.process_sample(pulse(0.01, 90.0), 0.01, true).is_none());
        assert!(p.process_sample(pulse(0.0, 90.0), 0.0, true).is_none());
        assert!(p.process_sample(pulse(0.034, 90.0), 0.034, true).is_some());
        let frames = p.stats().frames;
        assert_eq!(frames.received, 4);
        assert_eq!(frames.throttled, 2);
        assert_eq!(frames.accepted, 2);
    }

    #[test]
    fn test_synthetic_input_only_drops_non_increasing() {
        let mut config = ProcessorConfig::default();
        config.sampling.input = InputMode::Synthetic;
        let mut p = VitalSignsProcessor::with_seed(config, 1).unwrap();
        assert!(p.process_sample(pulse(0.0, 90.0), 0.0, true).is_some());
        assert!(p.process_sample(pulse(0.001, 90.0), 0.001, true).is_some());
        assert!(p.process_sample(pulse(0.001, 90.0), 0.001, true).is_none());
    }

    #[test]
    fn test_non_finite_sample_is_error_without_state_change() {
        let mut p = processor();
        for i in 0..5 {
            let t = i as f64 / 30.0;
            p.process_sample(pulse(t, 90.0), t, true);
        }
        let before = p.stats().buffer_len;
        let r = p
            .process_sample(ChannelMeans::new(1.0, f32::NAN, 1.0), 0.5, true)
            .unwrap();
        assert_eq!(r.quality, QualityLabel::Error);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(p.stats().buffer_len, before);

        // Next frame is processed normally
        let r = p.process_sample(pulse(0.6, 90.0), 0.6, true).unwrap();
        assert_eq!(r.quality, QualityLabel::Collecting);
    }

    #[test]
    fn test_non_finite_timestamp_is_error() {
        let mut p = processor();
        let r = p.process_sample(pulse(0.0, 90.0), f64::NAN, true).unwrap();
        assert_eq!(r.quality, QualityLabel::Error);
    }

    #[test]
    fn test_configure_clamps() {
        let mut p = processor();
        let params = p.configure(50.0, 12);
        assert_eq!(params.temperature, 42.0);
        assert_eq!(params.child_age, 7);
        p.reset();
        assert_eq!(p.params(), params);
    }

    #[test]
    fn test_malformed_raw_frame() {
        let mut p = processor();
        let r = p.process_raw(&[0u8; 7], 2, 2, PixelFormat::Rgb8, 0.0).unwrap();
        assert_eq!(r.quality, QualityLabel::Error);
        assert!(!r.finger_detected);

        // Enough bytes for RGB8 but not for RGBA8
        let r = p.process_raw(&[0u8; 12], 2, 2, PixelFormat::Rgba8, 1.0).unwrap();
        assert_eq!(r.quality, QualityLabel::Error);
    }
}
