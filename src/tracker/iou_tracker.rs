//! Greedy IoU tracker with constant-velocity coasting.

use std::convert::Infallible;

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::track_state::TrackState;
use crate::association::{Assignment, TrackedObject, greedy_assignment};
use crate::detection::FilteredDetections;
use crate::geometry::{BBox, iou_batch};
use crate::integration::MultiObjectTracker;

/// Configuration for the [`IouTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IouTrackerConfig {
    /// Minimum IoU between a predicted track box and a detection
    pub match_iou: f32,
    /// Frames a track may coast without a detection before it is removed
    pub max_age: u32,
    /// Consecutive hits before a track is reported
    pub min_hits: u32,
    /// Weight of the newest displacement in the velocity estimate
    pub velocity_smoothing: f32,
}

impl Default for IouTrackerConfig {
    fn default() -> Self {
        Self {
            match_iou: 0.3,
            max_age: 1,
            min_hits: 3,
            velocity_smoothing: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    track_id: u64,
    state: TrackState,
    /// Current estimate, (x1, y1, x2, y2)
    bbox: Vector4<f32>,
    /// Last matched detection
    observed: Vector4<f32>,
    /// Per-frame displacement of each coordinate
    velocity: Vector4<f32>,
    hits: u32,
    hit_streak: u32,
    time_since_update: u32,
}

impl Track {
    fn new(track_id: u64, bbox: &BBox, min_hits: u32) -> Self {
        let observed = to_vector(bbox);
        Self {
            track_id,
            state: if min_hits <= 1 {
                TrackState::Tracked
            } else {
                TrackState::New
            },
            bbox: observed,
            observed,
            velocity: Vector4::zeros(),
            hits: 1,
            hit_streak: 1,
            time_since_update: 0,
        }
    }

    fn predict(&mut self) {
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;
        self.bbox += self.velocity;
    }

    fn update(&mut self, bbox: &BBox, config: &IouTrackerConfig) {
        let observed = to_vector(bbox);
        let elapsed = self.time_since_update.max(1) as f32;
        let displacement = (observed - self.observed) / elapsed;
        let alpha = config.velocity_smoothing;
        self.velocity = displacement * alpha + self.velocity * (1.0 - alpha);

        self.observed = observed;
        self.bbox = observed;
        self.hits += 1;
        self.hit_streak += 1;
        self.time_since_update = 0;
        self.state = if self.hit_streak >= config.min_hits {
            TrackState::Tracked
        } else {
            TrackState::New
        };
    }

    fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
    }

    fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    fn bbox(&self) -> BBox {
        BBox::new(self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3])
    }
}

fn to_vector(bbox: &BBox) -> Vector4<f32> {
    Vector4::new(bbox.x1, bbox.y1, bbox.x2, bbox.y2)
}

/// Frame-to-frame tracker that matches predicted boxes to detections by IoU.
///
/// Each update predicts every track one frame ahead, pairs predictions with
/// detections greedily by descending IoU, starts a track for every leftover
/// detection and removes tracks that coasted longer than `max_age`. Only
/// tracks matched in the current frame are reported, and only once they have
/// `min_hits` consecutive hits (every track is reported during the first
/// `min_hits` frames). Track ids start at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct IouTracker {
    config: IouTrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
    frame_count: u64,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(IouTrackerConfig::default())
    }
}

impl IouTracker {
    pub fn new(config: IouTrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &IouTrackerConfig {
        &self.config
    }

    /// Number of updates processed.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Tracks currently held, including unconfirmed and coasting ones.
    pub fn live_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// State of a live track.
    pub fn track_state(&self, track_id: u64) -> Option<TrackState> {
        self.tracks
            .iter()
            .find(|t| t.track_id == track_id)
            .map(|t| t.state)
    }

    /// Advance one frame with this frame's detections.
    pub fn step(&mut self, detections: &FilteredDetections) -> Vec<TrackedObject> {
        self.frame_count += 1;

        for track in &mut self.tracks {
            track.predict();
        }

        let predicted: Vec<BBox> = self.tracks.iter().map(Track::bbox).collect();
        let det_boxes = detections.boxes();
        let ious = iou_batch(&predicted, det_boxes);

        let Assignment {
            matches,
            unmatched_rows,
            unmatched_cols,
        } = greedy_assignment(&ious, self.config.match_iou);

        for (row, col) in matches {
            self.tracks[row].update(&det_boxes[col], &self.config);
        }
        for row in unmatched_rows {
            self.tracks[row].mark_lost();
        }
        for col in unmatched_cols {
            let track_id = self.next_track_id();
            self.tracks
                .push(Track::new(track_id, &det_boxes[col], self.config.min_hits));
        }

        let max_age = self.config.max_age;
        for track in &mut self.tracks {
            if track.time_since_update > max_age {
                track.mark_removed();
                debug!(
                    track_id = track.track_id,
                    hits = track.hits,
                    "track removed"
                );
            }
        }
        self.tracks.retain(|t| t.state != TrackState::Removed);

        let min_hits = self.config.min_hits;
        let warmup = self.frame_count <= u64::from(min_hits);
        self.tracks
            .iter()
            .filter(|t| t.time_since_update == 0 && (t.hit_streak >= min_hits || warmup))
            .map(|t| TrackedObject::new(t.bbox(), t.track_id))
            .collect()
    }

    fn next_track_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl MultiObjectTracker for IouTracker {
    type Error = Infallible;

    fn update(&mut self, detections: &FilteredDetections) -> Result<Vec<TrackedObject>, Self::Error> {
        Ok(self.step(detections))
    }
}
