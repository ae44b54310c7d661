//! Class and confidence filtering of raw detector output.

use super::types::{FilteredDetections, RawDetections, ShapeError};
use crate::geometry::BBox;

/// Default exclusive lower bound on detection confidence.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Keep the detections of `target_class_id` whose confidence is strictly
/// greater than `threshold`, preserving detector order.
pub fn filter_detections(
    raw: &RawDetections,
    target_class_id: u32,
    threshold: f32,
) -> FilteredDetections {
    raw.iter()
        .filter(|&(_, class_id, confidence)| class_id == target_class_id && confidence > threshold)
        .map(|(bbox, _, confidence)| (*bbox, confidence))
        .collect()
}

/// Validate parallel slices and filter them in one pass.
pub fn filter_slices(
    boxes: &[BBox],
    class_ids: &[u32],
    confidences: &[f32],
    target_class_id: u32,
    threshold: f32,
) -> Result<FilteredDetections, ShapeError> {
    ShapeError::check(boxes.len(), class_ids.len(), confidences.len())?;
    Ok(boxes
        .iter()
        .zip(class_ids)
        .zip(confidences)
        .filter(|&((_, &class_id), &confidence)| {
            class_id == target_class_id && confidence > threshold
        })
        .map(|((bbox, _), &confidence)| (*bbox, confidence))
        .collect())
}
