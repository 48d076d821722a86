//! Finger segmentation: skin mask, components, contour shape and hysteresis

pub mod contour;
pub mod finger;
pub mod skin;

pub use contour::{
    connected_components, polygon_area, polygon_perimeter, trace_boundary, BoundingBox,
    Component, Point, ShapeMetrics,
};
pub use finger::{DetectionState, FingerClassification, FingerContour, FingerDetector};
pub use skin::{rgb_to_hsv, skin_mask, HsvRange, SkinMask};
