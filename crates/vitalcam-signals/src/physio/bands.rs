//! Age-specific resting heart-rate bands (BPM)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeBand {
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl AgeBand {
    /// Band for an age in whole years
    pub fn for_age(age: u8) -> Self {
        let (min_bpm, max_bpm) = match age {
            0..=1 => (100, 160),
            2..=3 => (80, 140),
            4..=5 => (70, 120),
            6..=7 => (65, 110),
            _ => (60, 100),
        };
        Self { min_bpm, max_bpm }
    }

    pub fn contains(&self, bpm: f32) -> bool {
        bpm >= self.min_bpm as f32 && bpm <= self.max_bpm as f32
    }

    /// Clamp to the band and round to whole beats
    pub fn clamp(&self, bpm: f32) -> u32 {
        (bpm.round().max(0.0) as u32).clamp(self.min_bpm, self.max_bpm)
    }
}
