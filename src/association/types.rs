use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// A box with a persistent identity, as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedObject {
    pub bbox: BBox,
    /// Identity that stays stable across frames for the same object
    pub track_id: u64,
}

impl TrackedObject {
    pub fn new(bbox: BBox, track_id: u64) -> Self {
        Self { bbox, track_id }
    }
}

/// One persisted observation of a tracked object.
///
/// Only produced when a tracked object was matched to a filtered detection,
/// so `confidence` always comes from the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// 1-based frame index
    pub frame_number: u64,
    pub track_id: u64,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
}

impl TrackingRecord {
    pub fn new(frame_number: u64, track_id: u64, bbox: &BBox, confidence: f32) -> Self {
        let [x1, y1, x2, y2] = bbox.to_pixels();
        Self {
            frame_number,
            track_id,
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }
}
