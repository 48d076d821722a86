//! Processing faults
//!
//! Only genuine faults live here. "Not enough data yet" is expressed with
//! `Option` by the stages themselves and never surfaces as an error.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("frame has zero width or height")]
    EmptyFrame,
    #[error("sample contains a non-finite channel value")]
    NonFiniteSample,
    #[error("sample timestamp {current} is not after previous sample {previous}")]
    OutOfOrderSample { previous: f64, current: f64 },
    #[error("non-finite value produced by {stage}")]
    NonFiniteSignal { stage: &'static str },
    #[error("signal too short: need {needed} samples, got {actual}")]
    SignalTooShort { needed: usize, actual: usize },
    #[error("filter design error: {0}")]
    FilterDesign(String),
}

pub type SignalResult<T> = Result<T, SignalError>;
