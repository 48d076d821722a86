//! Shared fixtures: a synthetic fingertip camera

#![allow(dead_code)]

use std::f32::consts::PI;

use vitalcam_signals::{ChannelMeans, Frame, FrameSource};

pub const FPS: f32 = 30.0;
pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// Green-channel pulse around a flash-lit fingertip colour
pub fn pulse_means(t: f64, bpm: f32) -> ChannelMeans {
    let phase = 2.0 * PI * (bpm / 60.0) * t as f32;
    ChannelMeans::new(190.0, 70.0 + 3.0 * phase.sin(), 50.0)
}

/// Dark background with an upright finger-shaped skin region
pub fn finger_frame(t: f64, bpm: f32) -> Frame {
    let green = pulse_means(t, bpm).green.round() as u8;
    let mut frame = Frame::filled(WIDTH, HEIGHT, [20, 20, 20]).unwrap();
    frame.fill_rect(22, 2, 20, 44, [190, green, 50]);
    frame
}

/// Background only
pub fn empty_frame() -> Frame {
    Frame::filled(WIDTH, HEIGHT, [20, 20, 20]).unwrap()
}

/// Deterministic finger camera at 30 fps
pub struct SyntheticFinger {
    pub bpm: f32,
    pub frames: usize,
    /// Frame indices where the finger is lifted
    pub lifted: std::ops::Range<usize>,
    next: usize,
}

impl SyntheticFinger {
    pub fn new(bpm: f32, frames: usize) -> Self {
        Self {
            bpm,
            frames,
            lifted: 0..0,
            next: 0,
        }
    }
}

impl FrameSource for SyntheticFinger {
    fn next_frame(&mut self) -> Option<(Frame, f64)> {
        if self.next >= self.frames {
            return None;
        }
        let i = self.next;
        self.next += 1;
        let t = i as f64 / FPS as f64;
        let frame = if self.lifted.contains(&i) {
            empty_frame()
        } else {
            finger_frame(t, self.bpm)
        };
        Some((frame, t))
    }

    fn frame_rate(&self) -> Option<f32> {
        Some(FPS)
    }
}
