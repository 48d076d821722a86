//! Frames and region reduction
//!
//! A [`Frame`] is a decoded RGB8 image. The region reducer collapses a frame,
//! or the pixels of a detected finger region, into one mean intensity per
//! channel. Camera decoding itself happens outside this crate; the helpers at
//! the bottom only repack the two buffer layouts mobile cameras hand over.

use serde::Serialize;

use crate::error::{SignalError, SignalResult};

/// Decoded RGB8 frame (row-major, 3 bytes per pixel)
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap raw RGB8 data, checking the buffer length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> SignalResult<Self> {
        if width == 0 || height == 0 {
            return Err(SignalError::EmptyFrame);
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(SignalError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Frame filled with a single colour
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> SignalResult<Self> {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y), or `None` outside the frame
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixel_at(y as usize * self.width as usize + x as usize)
    }

    /// Pixel by row-major index
    #[inline]
    pub fn pixel_at(&self, index: usize) -> Option<[u8; 3]> {
        let idx = index.checked_mul(3)?;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Paint an axis-aligned rectangle, clipped to the frame
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) {
        for py in y..y.saturating_add(h).min(self.height) {
            for px in x..x.saturating_add(w).min(self.width) {
                self.set_pixel(px, py, rgb);
            }
        }
    }
}

/// Mean intensity per colour channel (0-255 scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelMeans {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl ChannelMeans {
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    pub fn is_finite(&self) -> bool {
        self.red.is_finite() && self.green.is_finite() && self.blue.is_finite()
    }
}

impl From<[f32; 3]> for ChannelMeans {
    fn from(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

/// Reduce a frame to per-channel means.
///
/// `region` holds row-major pixel indices (typically an accepted finger
/// component). Without a region the whole frame is averaged. Indices outside
/// the frame are ignored; if no valid pixel remains the frame is dropped and
/// `None` is returned.
pub fn reduce_region(frame: &Frame, region: Option<&[usize]>) -> Option<ChannelMeans> {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;

    let mut accumulate = |px: [u8; 3]| {
        sum[0] += px[0] as f64;
        sum[1] += px[1] as f64;
        sum[2] += px[2] as f64;
        count += 1;
    };

    match region {
        Some(indices) => indices
            .iter()
            .filter_map(|&i| frame.pixel_at(i))
            .for_each(&mut accumulate),
        None => frame
            .data
            .chunks_exact(3)
            .for_each(|px| accumulate([px[0], px[1], px[2]])),
    }

    if count == 0 {
        return None;
    }
    let inv = 1.0 / count as f64;
    Some(ChannelMeans::new(
        (sum[0] * inv) as f32,
        (sum[1] * inv) as f32,
        (sum[2] * inv) as f32,
    ))
}

/// Convert RGBA to RGB (drop alpha channel)
pub fn rgba_to_rgb(rgba: &[u8], width: u32, height: u32) -> SignalResult<Frame> {
    let pixel_count = width as usize * height as usize;
    if rgba.len() < pixel_count * 4 {
        return Err(SignalError::InvalidFrame {
            expected: pixel_count * 4,
            actual: rgba.len(),
        });
    }
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    for px in rgba.chunks_exact(4).take(pixel_count) {
        rgb.extend_from_slice(&px[..3]);
    }
    Frame::new(rgb, width, height)
}

/// NV21: full-resolution luma plane followed by one interleaved V/U pair per
/// 2x2 block
pub fn nv21_to_rgb(yuv: &[u8], width: u32, height: u32) -> SignalResult<Frame> {
    if width == 0 || height == 0 {
        return Err(SignalError::EmptyFrame);
    }
    let (w, h) = (width as usize, height as usize);
    let chroma_stride = w.div_ceil(2) * 2;
    let expected = w * h + chroma_stride * h.div_ceil(2);
    if yuv.len() < expected {
        return Err(SignalError::InvalidFrame {
            expected,
            actual: yuv.len(),
        });
    }

    let (luma, chroma) = yuv.split_at(w * h);
    let mut rgb = Vec::with_capacity(w * h * 3);
    for (row, luma_row) in luma.chunks_exact(w).enumerate() {
        let start = (row / 2) * chroma_stride;
        let chroma_row = &chroma[start..start + chroma_stride];
        for (x, &y) in luma_row.iter().enumerate() {
            let pair = x & !1;
            let (v, u) = (chroma_row[pair], chroma_row[pair + 1]);
            rgb.extend_from_slice(&ycbcr_to_rgb(y, u, v));
        }
    }
    Frame::new(rgb, width, height)
}

/// Full-range BT.601 in 8.8 fixed point
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    let r = y + ((359 * v) >> 8);
    let g = y - ((88 * u + 183 * v) >> 8);
    let b = y + ((454 * u) >> 8);
    [r, g, b].map(|c| c.clamp(0, 255) as u8)
}

/// Layout of a raw camera buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Rgb8,
    Rgba8,
    /// Android camera preview (YUV 4:2:0, V before U)
    Nv21,
}

impl Frame {
    /// Decode a raw buffer of the given layout into an RGB8 frame
    pub fn decode(data: &[u8], width: u32, height: u32, format: PixelFormat) -> SignalResult<Self> {
        match format {
            PixelFormat::Rgb8 => Self::new(data.to_vec(), width, height),
            PixelFormat::Rgba8 => rgba_to_rgb(data, width, height),
            PixelFormat::Nv21 => nv21_to_rgb(data, width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_mismatch() {
        let err = Frame::new(vec![0u8; 10], 2, 2).unwrap_err();
        assert_eq!(
            err,
            SignalError::InvalidFrame {
                expected: 12,
                actual: 10
            }
        );
        assert_eq!(Frame::new(vec![], 0, 4).unwrap_err(), SignalError::EmptyFrame);
    }

    #[test]
    fn test_pixel_operations() {
        let mut frame = Frame::filled(10, 10, [0, 0, 0]).unwrap();
        frame.set_pixel(5, 5, [255, 128, 64]);
        assert_eq!(frame.get_pixel(5, 5), Some([255, 128, 64]));
        assert_eq!(frame.get_pixel(10, 0), None);
    }

    #[test]
    fn test_reduce_whole_frame() {
        let frame = Frame::filled(30, 30, [128, 64, 32]).unwrap();
        let means = reduce_region(&frame, None).unwrap();
        assert!((means.red - 128.0).abs() < 1e-4);
        assert!((means.green - 64.0).abs() < 1e-4);
        assert!((means.blue - 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_reduce_region_only_counts_region() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]).unwrap();
        frame.fill_rect(0, 0, 2, 1, [200, 100, 50]);
        let means = reduce_region(&frame, Some(&[0, 1])).unwrap();
        assert_eq!(means, ChannelMeans::new(200.0, 100.0, 50.0));
    }

    #[test]
    fn test_reduce_region_without_valid_pixels_is_dropped() {
        let frame = Frame::filled(4, 4, [10, 10, 10]).unwrap();
        assert!(reduce_region(&frame, Some(&[])).is_none());
        assert!(reduce_region(&frame, Some(&[16, 99])).is_none());
    }

    #[test]
    fn test_rgba_to_rgb() {
        let rgba = vec![255, 128, 64, 255, 100, 50, 25, 128];
        let frame = rgba_to_rgb(&rgba, 2, 1).unwrap();
        assert_eq!(frame.data(), &[255, 128, 64, 100, 50, 25]);
        assert!(rgba_to_rgb(&rgba, 3, 1).is_err());
    }

    #[test]
    fn test_nv21_grey() {
        // Neutral chroma leaves luma on all three channels
        let mut yuv = vec![90u8; 4 * 2];
        yuv.extend(vec![128u8; 4]);
        let frame = nv21_to_rgb(&yuv, 4, 2).unwrap();
        assert_eq!(frame.get_pixel(3, 1), Some([90, 90, 90]));
    }

    #[test]
    fn test_nv21_chroma_shared_per_block() {
        // 4x2 luma, two V/U pairs: left block red-shifted, right block neutral
        let mut yuv = vec![100u8; 8];
        yuv.extend([200, 128, 128, 128]);
        let frame = nv21_to_rgb(&yuv, 4, 2).unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some([200, 49, 100]));
        assert_eq!(frame.get_pixel(1, 1), Some([200, 49, 100]));
        assert_eq!(frame.get_pixel(2, 0), Some([100, 100, 100]));
    }

    #[test]
    fn test_nv21_short_buffer() {
        assert_eq!(
            nv21_to_rgb(&[0u8; 10], 4, 2).unwrap_err(),
            SignalError::InvalidFrame {
                expected: 12,
                actual: 10
            }
        );
        assert_eq!(nv21_to_rgb(&[], 0, 2).unwrap_err(), SignalError::EmptyFrame);
    }

    #[test]
    fn test_decode_dispatches_on_format() {
        let rgb = Frame::decode(&[1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Rgb8).unwrap();
        let rgba = Frame::decode(&[1, 2, 3, 0, 4, 5, 6, 0], 2, 1, PixelFormat::Rgba8).unwrap();
        assert_eq!(rgb.data(), rgba.data());

        let nv21 = Frame::decode(&[50, 50, 128, 128], 2, 1, PixelFormat::Nv21).unwrap();
        assert_eq!(nv21.data(), &[50, 50, 50, 50, 50, 50]);
    }
}
