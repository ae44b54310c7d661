//! Recovering a detector confidence for every tracked object.

use serde::{Deserialize, Serialize};

use super::matching::linear_assignment;
use super::types::{TrackedObject, TrackingRecord};
use crate::detection::FilteredDetections;
use crate::geometry::{BBox, intersection_over_union, iou_batch};

/// Exclusive lower bound on IoU for a tracked box to match a detection.
pub const IOU_MATCH_FLOOR: f32 = 0.5;

/// Cost of a pair at or below the floor; keeps the solver from trading a
/// valid match for a rejected one.
const UNMATCHABLE_COST: f32 = 1e3;

/// How tracked objects are paired with filtered detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    /// Each tracked object independently takes the first detection with the
    /// strictly highest IoU. A detection may serve several tracked objects.
    #[default]
    GreedyReuse,
    /// Like `GreedyReuse`, scanning tracked objects in order, but a detection
    /// claimed earlier in the frame is no longer available.
    GreedyExclusive,
    /// One-to-one assignment that matches as many tracked objects as the
    /// floor allows, then maximizes total IoU.
    Optimal,
}

/// Pairs tracker output with the filtered detections of the same frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Associator {
    strategy: AssociationStrategy,
    iou_floor: f32,
}

impl Default for Associator {
    fn default() -> Self {
        Self::new(AssociationStrategy::default())
    }
}

impl Associator {
    pub fn new(strategy: AssociationStrategy) -> Self {
        Self {
            strategy,
            iou_floor: IOU_MATCH_FLOOR,
        }
    }

    pub fn with_iou_floor(mut self, iou_floor: f32) -> Self {
        self.iou_floor = iou_floor;
        self
    }

    pub fn strategy(&self) -> AssociationStrategy {
        self.strategy
    }

    pub fn iou_floor(&self) -> f32 {
        self.iou_floor
    }

    /// Produce one record per tracked object that matches a detection with
    /// IoU strictly above the floor. Unmatched objects produce nothing.
    ///
    /// Tracked boxes are truncated to integer pixels before matching, and the
    /// records are returned in tracker output order.
    pub fn associate(
        &self,
        frame_number: u64,
        tracked: &[TrackedObject],
        filtered: &FilteredDetections,
    ) -> Vec<TrackingRecord> {
        let boxes: Vec<BBox> = tracked.iter().map(|t| t.bbox.truncated()).collect();

        let matched = match self.strategy {
            AssociationStrategy::GreedyReuse => self.greedy(&boxes, filtered, false),
            AssociationStrategy::GreedyExclusive => self.greedy(&boxes, filtered, true),
            AssociationStrategy::Optimal => self.optimal(&boxes, filtered),
        };

        tracked
            .iter()
            .zip(&boxes)
            .zip(matched)
            .filter_map(|((object, bbox), det)| {
                let confidence = filtered.confidences()[det?];
                Some(TrackingRecord::new(
                    frame_number,
                    object.track_id,
                    bbox,
                    confidence,
                ))
            })
            .collect()
    }

    /// Index of the first detection whose IoU strictly beats every earlier
    /// candidate and the floor.
    fn best_match(
        &self,
        bbox: &BBox,
        filtered: &FilteredDetections,
        claimed: &[bool],
    ) -> Option<usize> {
        let mut best_iou = 0.0;
        let mut best = None;
        for (idx, det_box) in filtered.boxes().iter().enumerate() {
            if claimed[idx] {
                continue;
            }
            let iou = intersection_over_union(bbox, det_box);
            if iou > best_iou && iou > self.iou_floor {
                best_iou = iou;
                best = Some(idx);
            }
        }
        best
    }

    fn greedy(
        &self,
        boxes: &[BBox],
        filtered: &FilteredDetections,
        exclusive: bool,
    ) -> Vec<Option<usize>> {
        let mut claimed = vec![false; filtered.len()];
        boxes
            .iter()
            .map(|bbox| {
                let best = self.best_match(bbox, filtered, &claimed);
                if let (true, Some(idx)) = (exclusive, best) {
                    claimed[idx] = true;
                }
                best
            })
            .collect()
    }

    fn optimal(&self, boxes: &[BBox], filtered: &FilteredDetections) -> Vec<Option<usize>> {
        let ious = iou_batch(boxes, filtered.boxes());
        let floor = self.iou_floor;
        let cost = ious.mapv(|iou| if iou > floor { 1.0 - iou } else { UNMATCHABLE_COST });
        let assignment = linear_assignment(&cost, |i, j| ious[[i, j]] > floor);

        let mut matched = vec![None; boxes.len()];
        for (row, col) in assignment.matches {
            matched[row] = Some(col);
        }
        matched
    }
}
