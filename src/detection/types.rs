use thiserror::Error;

use crate::geometry::BBox;

/// A single raw detector output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box in TLBR format (x1, y1, x2, y2)
    pub bbox: BBox,
    /// Class index in the detector's class-name table
    pub class_id: u32,
    /// Detection confidence score in `[0, 1]`
    pub confidence: f32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox: BBox::new(x1, y1, x2, y2),
            class_id,
            confidence,
        }
    }

    pub fn from_bbox(bbox: BBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Parallel sequences did not have the same length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "detection sequences differ in length: {boxes} boxes, {classes} classes, {confidences} confidences"
)]
pub struct ShapeError {
    pub boxes: usize,
    pub classes: usize,
    pub confidences: usize,
}

impl ShapeError {
    pub(crate) fn check(boxes: usize, classes: usize, confidences: usize) -> Result<(), Self> {
        if boxes == classes && classes == confidences {
            Ok(())
        } else {
            Err(Self {
                boxes,
                classes,
                confidences,
            })
        }
    }
}

/// One frame of detector output as parallel boxes, class ids and confidences.
///
/// The three sequences always have the same length; [`RawDetections::new`]
/// is the only place that accepts them separately and it rejects mismatches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
    boxes: Vec<BBox>,
    class_ids: Vec<u32>,
    confidences: Vec<f32>,
}

impl RawDetections {
    pub fn new(
        boxes: Vec<BBox>,
        class_ids: Vec<u32>,
        confidences: Vec<f32>,
    ) -> Result<Self, ShapeError> {
        ShapeError::check(boxes.len(), class_ids.len(), confidences.len())?;
        Ok(Self {
            boxes,
            class_ids,
            confidences,
        })
    }

    pub fn from_detections(detections: &[Detection]) -> Self {
        Self {
            boxes: detections.iter().map(|d| d.bbox).collect(),
            class_ids: detections.iter().map(|d| d.class_id).collect(),
            confidences: detections.iter().map(|d| d.confidence).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn class_ids(&self) -> &[u32] {
        &self.class_ids
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BBox, u32, f32)> + '_ {
        self.boxes
            .iter()
            .zip(self.class_ids.iter().copied())
            .zip(self.confidences.iter().copied())
            .map(|((bbox, class_id), confidence)| (bbox, class_id, confidence))
    }
}

/// Detections of the target class above the confidence threshold, as
/// parallel boxes and confidences in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredDetections {
    boxes: Vec<BBox>,
    confidences: Vec<f32>,
}

impl FilteredDetections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bbox: BBox, confidence: f32) {
        self.boxes.push(bbox);
        self.confidences.push(confidence);
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BBox, f32)> + '_ {
        self.boxes.iter().zip(self.confidences.iter().copied())
    }
}

impl FromIterator<(BBox, f32)> for FilteredDetections {
    fn from_iter<I: IntoIterator<Item = (BBox, f32)>>(iter: I) -> Self {
        let mut filtered = Self::new();
        for (bbox, confidence) in iter {
            filtered.push(bbox, confidence);
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_detections_rejects_mismatch() {
        let err = RawDetections::new(
            vec![BBox::new(0.0, 0.0, 1.0, 1.0)],
            vec![2, 2],
            vec![0.9],
        )
        .unwrap_err();
        assert_eq!(err.boxes, 1);
        assert_eq!(err.classes, 2);
        assert_eq!(err.confidences, 1);
    }

    #[test]
    fn test_from_detections_keeps_order() {
        let dets = [
            Detection::new(0.0, 0.0, 1.0, 1.0, 2, 0.9),
            Detection::new(5.0, 5.0, 6.0, 6.0, 7, 0.4),
        ];
        let raw = RawDetections::from_detections(&dets);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.class_ids(), &[2, 7]);
        assert_eq!(raw.confidences(), &[0.9, 0.4]);
    }
}
