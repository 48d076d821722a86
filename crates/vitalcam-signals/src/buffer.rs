//! Sample buffers
//!
//! [`SignalBuffer`] is the sliding window every downstream stage reads from.
//! [`BoundedHistory`] keeps the most recent estimates for smoothing.

use std::collections::VecDeque;

use ndarray::Array1;
use serde::Serialize;

use crate::error::{SignalError, SignalResult};
use crate::frame::ChannelMeans;

/// One reduced frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Capture time in seconds, monotonic
    pub timestamp: f64,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Sample {
    pub fn new(timestamp: f64, means: ChannelMeans) -> Self {
        Self {
            timestamp,
            red: means.red,
            green: means.green,
            blue: means.blue,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite()
            && self.red.is_finite()
            && self.green.is_finite()
            && self.blue.is_finite()
    }
}

/// Capacity-bounded FIFO of samples in strict temporal order
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SignalBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Check that `sample` may be appended, without mutating the buffer.
    pub fn check(&self, sample: &Sample) -> SignalResult<()> {
        if !sample.is_finite() {
            return Err(SignalError::NonFiniteSample);
        }
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return Err(SignalError::OutOfOrderSample {
                    previous: last.timestamp,
                    current: sample.timestamp,
                });
            }
        }
        Ok(())
    }

    /// Append a sample, evicting the oldest once full.
    pub fn push(&mut self, sample: Sample) -> SignalResult<()> {
        self.check(&sample)?;
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Green channel of the whole window, oldest first
    pub fn green(&self) -> Array1<f32> {
        self.samples.iter().map(|s| s.green).collect()
    }

    /// Green window as it would be after pushing `next`, without pushing it
    pub fn green_with(&self, next: &Sample) -> Array1<f32> {
        let skip = (self.samples.len() + 1).saturating_sub(self.capacity);
        self.samples
            .iter()
            .chain(std::iter::once(next))
            .skip(skip)
            .map(|s| s.green)
            .collect()
    }

    /// Seconds spanned by the window
    pub fn duration(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

/// Most-recent-N values, oldest evicted first
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Contents after a hypothetical push, leaving `self` untouched
    pub fn with_pushed(&self, item: T) -> Vec<T> {
        let skip = (self.items.len() + 1).saturating_sub(self.capacity);
        self.items
            .iter()
            .cloned()
            .chain(std::iter::once(item))
            .skip(skip)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
