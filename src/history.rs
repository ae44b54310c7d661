//! Per-track confidence series collected during a run, for offline plotting.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::association::TrackingRecord;

/// Series shorter than this are exported unsmoothed.
pub const SMOOTHING_WINDOW: usize = 5;

/// Standard deviation of the smoothing kernel, in frames.
pub const SMOOTHING_SIGMA: f32 = 5.0;

/// Kernel radius in standard deviations.
const KERNEL_TRUNCATE: f32 = 4.0;

/// Frame numbers and confidences of one track, in the order observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSeries {
    pub frames: Vec<u64>,
    pub confidences: Vec<f32>,
}

impl TrackSeries {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Append-only map from track id to its confidence series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrackingHistory {
    tracks: BTreeMap<u64, TrackSeries>,
}

impl TrackingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, track_id: u64, frame_number: u64, confidence: f32) {
        let series = self.tracks.entry(track_id).or_default();
        series.frames.push(frame_number);
        series.confidences.push(confidence);
    }

    pub fn record(&mut self, record: &TrackingRecord) {
        self.append(record.track_id, record.frame_number, record.confidence);
    }

    pub fn get(&self, track_id: u64) -> Option<&TrackSeries> {
        self.tracks.get(&track_id)
    }

    /// Tracks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &TrackSeries)> + '_ {
        self.tracks.iter().map(|(id, series)| (*id, series))
    }

    /// Number of distinct tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Total number of observations across all tracks.
    pub fn observations(&self) -> usize {
        self.tracks.values().map(TrackSeries::len).sum()
    }

    /// A copy with every confidence series passed through [`smooth_series`].
    pub fn smoothed(&self, window_size: usize, sigma: f32) -> Self {
        let tracks = self
            .tracks
            .iter()
            .map(|(id, series)| {
                let smoothed = TrackSeries {
                    frames: series.frames.clone(),
                    confidences: smooth_series(&series.confidences, window_size, sigma),
                };
                (*id, smoothed)
            })
            .collect();
        Self { tracks }
    }

    /// Write raw and smoothed series as one JSON document.
    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        let export = HistoryExport {
            raw: self,
            smoothed: self.smoothed(SMOOTHING_WINDOW, SMOOTHING_SIGMA),
        };
        serde_json::to_writer_pretty(writer, &export)
    }
}

#[derive(Serialize)]
struct HistoryExport<'a> {
    raw: &'a TrackingHistory,
    smoothed: TrackingHistory,
}

/// Gaussian-smooth a series, leaving series shorter than `window_size`
/// unchanged.
pub fn smooth_series(data: &[f32], window_size: usize, sigma: f32) -> Vec<f32> {
    if data.len() < window_size {
        return data.to_vec();
    }
    gaussian_filter(data, sigma)
}

/// 1-D Gaussian filter with half-sample symmetric (reflect) boundaries and
/// a kernel truncated at four standard deviations.
pub fn gaussian_filter(data: &[f32], sigma: f32) -> Vec<f32> {
    if data.is_empty() || sigma <= 0.0 {
        return data.to_vec();
    }

    let radius = (KERNEL_TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f32 / (sigma * sigma)).exp())
        .collect();
    let norm: f32 = weights.iter().sum();

    let n = data.len() as isize;
    (0..n)
        .map(|i| {
            let acc: f32 = (-radius..=radius)
                .zip(&weights)
                .map(|(offset, w)| w * data[reflect(i + offset, n)])
                .sum();
            acc / norm
        })
        .collect()
}

/// Map an out-of-range index into `0..n` by mirroring about the edges
/// (`d c b a | a b c d | d c b a`).
fn reflect(index: isize, n: isize) -> usize {
    let period = 2 * n;
    let wrapped = index.rem_euclid(period);
    let mirrored = if wrapped >= n { period - 1 - wrapped } else { wrapped };
    mirrored as usize
}
