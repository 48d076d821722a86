//! Skin segmentation in HSV space
//!
//! Hue is on the 0-180 scale, saturation and value on 0-255, so bands can be
//! copied straight from camera-tuning notes that use that convention.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Inclusive HSV band, `[h, s, v]` lower and upper corners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub name: String,
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

impl HsvRange {
    pub fn new(name: &str, lower: [f32; 3], upper: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            lower,
            upper,
        }
    }

    /// Light, medium and dark skin tone bands under flash illumination
    pub fn default_skin_bands() -> Vec<HsvRange> {
        vec![
            HsvRange::new("light", [0.0, 40.0, 80.0], [25.0, 255.0, 255.0]),
            HsvRange::new("medium", [0.0, 60.0, 40.0], [25.0, 255.0, 220.0]),
            HsvRange::new("dark", [0.0, 30.0, 20.0], [30.0, 255.0, 160.0]),
        ]
    }

    #[inline]
    pub fn contains(&self, hsv: [f32; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    pub fn is_ordered(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c])
    }
}

/// RGB8 to HSV (h 0-180, s 0-255, v 0-255)
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [f32; 3] {
    let r = rgb[0] as f32;
    let g = rgb[1] as f32;
    let b = rgb[2] as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let h_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    [h_deg / 2.0, s, v]
}

/// Binary mask, one flag per pixel in row-major order
#[derive(Debug, Clone)]
pub struct SkinMask {
    pub width: u32,
    pub height: u32,
    pub bits: Vec<bool>,
}

impl SkinMask {
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

/// Mark every pixel that falls in at least one band
pub fn skin_mask(frame: &Frame, ranges: &[HsvRange]) -> SkinMask {
    let bits = frame
        .data()
        .chunks_exact(3)
        .map(|px| {
            let hsv = rgb_to_hsv([px[0], px[1], px[2]]);
            ranges.iter().any(|r| r.contains(hsv))
        })
        .collect();

    SkinMask {
        width: frame.width(),
        height: frame.height(),
        bits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0.0, 255.0, 255.0]);
        assert_relative_eq!(rgb_to_hsv([0, 255, 0])[0], 60.0);
        assert_relative_eq!(rgb_to_hsv([0, 0, 255])[0], 120.0);
        assert_eq!(rgb_to_hsv([40, 40, 40]), [0.0, 0.0, 40.0]);
    }

    #[test]
    fn test_flash_lit_finger_is_skin() {
        let bands = HsvRange::default_skin_bands();
        let hsv = rgb_to_hsv([190, 70, 50]);
        assert!(bands.iter().any(|b| b.contains(hsv)));
    }

    #[test]
    fn test_grey_and_blue_are_not_skin() {
        let bands = HsvRange::default_skin_bands();
        for rgb in [[20, 20, 20], [200, 200, 200], [30, 60, 200]] {
            let hsv = rgb_to_hsv(rgb);
            assert!(!bands.iter().any(|b| b.contains(hsv)), "{rgb:?} classified as skin");
        }
    }

    #[test]
    fn test_mask_marks_only_skin_pixels() {
        let mut frame = Frame::filled(4, 3, [20, 20, 20]).unwrap();
        frame.set_pixel(1, 2, [190, 70, 50]);
        let mask = skin_mask(&frame, &HsvRange::default_skin_bands());
        assert_eq!(mask.count(), 1);
        assert!(mask.get(1, 2));
        assert!(!mask.get(-1, 0));
    }
}
