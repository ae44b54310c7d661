//! Bounding box geometry used by association and tracking.

use ndarray::Array2;

/// Axis-aligned bounding box in TLBR pixel coordinates (x1, y1, x2, y2).
///
/// Boxes use the inclusive pixel-edge convention: a box spanning `x1..=x2`
/// covers `x2 - x1 + 1` pixel columns, so a single-pixel box has area 1.
/// Callers are expected to keep `x2 >= x1` and `y2 >= y1`; nothing here
/// validates it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BBox {
    /// Top-left x coordinate
    pub x1: f32,
    /// Top-left y coordinate
    pub y1: f32,
    /// Bottom-right x coordinate
    pub x2: f32,
    /// Bottom-right y coordinate
    pub y2: f32,
}

impl BBox {
    /// Create a box from TLBR coordinates.
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from center coordinates and dimensions (XYWH format).
    #[inline]
    pub fn from_xywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area under the inclusive pixel convention.
    #[inline]
    pub fn pixel_area(&self) -> f32 {
        (self.x2 - self.x1 + 1.0) * (self.y2 - self.y1 + 1.0)
    }

    /// Coordinates truncated toward zero, the form in which boxes are stored.
    #[inline]
    pub fn to_pixels(&self) -> [i32; 4] {
        [
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        ]
    }

    /// The same box snapped to integer pixel coordinates.
    #[inline]
    pub fn truncated(&self) -> Self {
        let [x1, y1, x2, y2] = self.to_pixels();
        Self::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32)
    }

    /// Intersection over Union with another box.
    #[inline]
    pub fn iou(&self, other: &BBox) -> f32 {
        intersection_over_union(self, other)
    }
}

/// Calculate the Intersection over Union (IoU) of two boxes.
///
/// Returns a value in `[0, 1]`, or `0.0` when the union area is not positive
/// (degenerate boxes). Never fails.
pub fn intersection_over_union(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter_width = (x2 - x1 + 1.0).max(0.0);
    let inter_height = (y2 - y1 + 1.0).max(0.0);
    let inter_area = inter_width * inter_height;

    let union_area = a.pixel_area() + b.pixel_area() - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[BBox], boxes_b: &[BBox]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = intersection_over_union(a, b);
        }
    }
    ious
}
