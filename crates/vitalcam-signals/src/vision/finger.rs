//! Finger presence detection
//!
//! Heuristic classifier, no learned model:
//! 1. HSV skin mask over the frame
//! 2. 4-connected components, small ones discarded
//! 3. Shape tests on the traced contour: area band, finger-like aspect
//!    ratio, low circularity and a smooth outline
//!
//! The first qualifying component in row-major order wins. Per-frame
//! verdicts are debounced by [`DetectionState`] so presence only flips on
//! after a run of consecutive positives.

use log::debug;
use serde::Serialize;

use super::contour::{connected_components, trace_boundary, BoundingBox, Point, ShapeMetrics};
use super::skin::skin_mask;
use crate::config::FingerConfig;
use crate::frame::Frame;

/// Consecutive-detection hysteresis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionState {
    pub consecutive_detections: u32,
    pub required: u32,
    pub detected: bool,
}

impl DetectionState {
    pub fn new(required: u32) -> Self {
        Self {
            consecutive_detections: 0,
            required: required.max(1),
            detected: false,
        }
    }

    /// Fold one per-frame verdict into the state. Returns the new `detected`.
    pub fn update(&mut self, positive: bool) -> bool {
        let was_detected = self.detected;
        if positive {
            self.consecutive_detections = self.consecutive_detections.saturating_add(1);
            self.detected = self.consecutive_detections >= self.required;
        } else {
            self.consecutive_detections = 0;
            self.detected = false;
        }
        if was_detected != self.detected {
            debug!(
                "finger presence {} after {} consecutive frames",
                if self.detected { "acquired" } else { "lost" },
                self.consecutive_detections
            );
        }
        self.detected
    }

    /// Rolling confidence, consecutive / required clamped to [0, 1]
    pub fn confidence(&self) -> f32 {
        (self.consecutive_detections as f32 / self.required as f32).clamp(0.0, 1.0)
    }
}

/// The accepted finger region
#[derive(Debug, Clone)]
pub struct FingerContour {
    /// Ordered outer boundary
    pub boundary: Vec<Point>,
    /// Row-major pixel indices inside the region
    pub pixels: Vec<usize>,
    pub bbox: BoundingBox,
    pub metrics: ShapeMetrics,
}

/// Per-frame classification
#[derive(Debug, Clone)]
pub struct FingerClassification {
    pub contour: Option<FingerContour>,
    /// Skin components that survived the size filter
    pub candidates: usize,
}

impl FingerClassification {
    pub fn is_positive(&self) -> bool {
        self.contour.is_some()
    }
}

/// Stateless shape classifier. Hysteresis lives in [`DetectionState`],
/// owned by the session.
#[derive(Debug, Clone)]
pub struct FingerDetector {
    config: FingerConfig,
}

impl FingerDetector {
    pub fn new(config: FingerConfig) -> Self {
        Self { config }
    }

    /// Classify a single frame
    pub fn classify(&self, frame: &Frame) -> FingerClassification {
        let mask = skin_mask(frame, &self.config.skin_ranges);
        let mut candidates = 0usize;

        for component in connected_components(&mask) {
            if component.pixels.len() < self.config.min_component_pixels {
                continue;
            }
            candidates += 1;

            let boundary = trace_boundary(&mask, &component);
            let metrics = ShapeMetrics::measure(&boundary, &component.bbox);
            if self.accepts(&metrics) {
                return FingerClassification {
                    contour: Some(FingerContour {
                        boundary,
                        pixels: component.pixels,
                        bbox: component.bbox,
                        metrics,
                    }),
                    candidates,
                };
            }
        }

        FingerClassification {
            contour: None,
            candidates,
        }
    }

    /// Shape gate for one component
    pub fn accepts(&self, m: &ShapeMetrics) -> bool {
        let c = &self.config;
        m.area >= c.min_area
            && m.area <= c.max_area
            && m.aspect_ratio > c.min_aspect_ratio
            && m.aspect_ratio < c.max_aspect_ratio
            && m.circularity < c.max_circularity
            && m.perimeter_ratio() < c.max_perimeter_ratio
    }
}
