//! Frame sources
//!
//! The processor does not own a camera. Anything that can hand over decoded
//! frames with capture timestamps implements [`FrameSource`]: a platform camera
//! bridge, a recorded clip, or a synthetic generator.

use std::collections::VecDeque;

use crate::frame::Frame;

/// Supplier of `(frame, timestamp_seconds)` pairs, in capture order
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<(Frame, f64)>;

    /// Nominal frame rate, if known
    fn frame_rate(&self) -> Option<f32> {
        None
    }
}

/// Replays a fixed list of frames
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<(Frame, f64)>,
    frame_rate: Option<f32>,
}

impl ReplaySource {
    pub fn new(frames: Vec<(Frame, f64)>) -> Self {
        Self {
            frames: frames.into(),
            frame_rate: None,
        }
    }

    /// Frames spaced `1 / frame_rate` seconds apart starting at t = 0
    pub fn at_rate(frames: Vec<Frame>, frame_rate: f32) -> Self {
        let dt = 1.0 / frame_rate as f64;
        Self {
            frames: frames
                .into_iter()
                .enumerate()
                .map(|(i, f)| (f, i as f64 * dt))
                .collect(),
            frame_rate: Some(frame_rate),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Option<(Frame, f64)> {
        self.frames.pop_front()
    }

    fn frame_rate(&self) -> Option<f32> {
        self.frame_rate
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<(Frame, f64)> {
        (**self).next_frame()
    }

    fn frame_rate(&self) -> Option<f32> {
        (**self).frame_rate()
    }
}
