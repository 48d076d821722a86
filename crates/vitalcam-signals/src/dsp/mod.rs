//! DSP (Digital Signal Processing) module
//!
//! - `stats` - window moments, median
//! - `filters` - DC removal, FIR bandpass, Savitzky-Golay, normalisation
//! - `spectrum` - FFT dominant frequency and SNR
//! - `SignalConditioner` - the full conditioning chain

pub mod conditioner;
pub mod filters;
pub mod spectrum;
pub mod stats;

pub use conditioner::{ConditionedSignal, SignalConditioner};
pub use spectrum::{SpectralPeak, SpectrumAnalyzer};
