//! # vitalcam-signals
//!
//! Camera photoplethysmography for a fingertip held over a phone camera and
//! flash.
//!
//! This crate provides:
//! - **Finger detection**: HSV skin segmentation, connected components and
//!   contour shape tests, debounced over consecutive frames
//! - **Signal conditioning**: DC removal, FIR bandpass, Savitzky-Golay
//!   smoothing, normalisation
//! - **Estimation**: heart rate (peak picking + FFT cross-check), an
//!   empirical blood-pressure heuristic, and a confidence/quality score
//!
//! ## Example
//!
//! ```ignore
//! use vitalcam_signals::{ProcessorConfig, VitalSignsProcessor};
//!
//! let mut processor = VitalSignsProcessor::new(ProcessorConfig::default())?;
//! processor.configure(37.0, 5);
//!
//! for (frame, timestamp) in camera_frames {
//!     if let Some(result) = processor.process_frame(&frame, timestamp) {
//!         if result.is_reportable(0.3) {
//!             println!("Heart rate: {:?} BPM ({})", result.heart_rate, result.quality);
//!         }
//!     }
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod dsp;
pub mod error;
pub mod frame;
pub mod physio;
pub mod pipeline;
pub mod quality;
pub mod source;
pub mod vision;

pub use buffer::{BoundedHistory, Sample, SignalBuffer};
pub use config::{ConfigError, InputMode, ProcessorConfig, SessionParams};
pub use error::{SignalError, SignalResult};
pub use frame::{nv21_to_rgb, reduce_region, rgba_to_rgb, ChannelMeans, Frame, PixelFormat};
pub use pipeline::{
    BloodPressure, EstimateSummary, FrameCounters, ProcessorStats, SessionState,
    VitalSignsProcessor, VitalsResult,
};
pub use quality::{QualityBreakdown, QualityLabel, QualityScorer};
pub use source::{FrameSource, ReplaySource};
