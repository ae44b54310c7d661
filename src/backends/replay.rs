//! Detector that replays recorded detections from a JSON-lines file.
//!
//! Each line holds the detections of one frame:
//!
//! ```json
//! {"detections":[{"bbox":[412.0,220.5,530.0,301.0],"class_id":2,"confidence":0.91}]}
//! ```
//!
//! Boxes are `[x1, y1, x2, y2]` in pixels. A blank line is a frame without
//! detections.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::detection::{Detection, DetectionBuilder};
use crate::integration::DetectionSource;

/// The 80 COCO class names, indexed by class id.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read detections from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid detections on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("recorded detections ran out after {frames} frames")]
    Exhausted { frames: u64 },
}

#[derive(Debug, Deserialize)]
struct ReplayFrame {
    #[serde(default)]
    detections: Vec<ReplayDetection>,
}

#[derive(Debug, Deserialize)]
struct ReplayDetection {
    bbox: [f32; 4],
    class_id: u32,
    confidence: f32,
}

impl ReplayDetection {
    fn into_detection(self) -> Detection {
        let [x1, y1, x2, y2] = self.bbox;
        DetectionBuilder::new()
            .tlbr(x1, y1, x2, y2)
            .class_id(self.class_id)
            .confidence(self.confidence)
            .build()
    }
}

/// Serves recorded detections one frame at a time, ignoring pixel data.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    class_names: Vec<String>,
    frames: VecDeque<Vec<Detection>>,
    served: u64,
}

impl ReplayDetector {
    /// Load a JSON-lines detection file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let io_err = |source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let detector = Self::from_reader(BufReader::new(file)).map_err(|err| match err {
            ReplayError::Io { source, .. } => io_err(source),
            other => other,
        })?;
        debug!(path = %path.display(), frames = detector.remaining(), "loaded recorded detections");
        Ok(detector)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, ReplayError> {
        let mut frames = VecDeque::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ReplayError::Io {
                path: PathBuf::new(),
                source,
            })?;
            if line.trim().is_empty() {
                frames.push_back(Vec::new());
                continue;
            }
            let frame: ReplayFrame = serde_json::from_str(&line)
                .map_err(|source| ReplayError::Parse { line: idx + 1, source })?;
            frames.push_back(frame.detections.into_iter().map(ReplayDetection::into_detection).collect());
        }
        Ok(Self::from_frames(frames))
    }

    pub fn from_frames(frames: impl IntoIterator<Item = Vec<Detection>>) -> Self {
        Self {
            class_names: COCO_CLASSES.iter().map(|name| name.to_string()).collect(),
            frames: frames.into_iter().collect(),
            served: 0,
        }
    }

    /// Replace the default COCO class names.
    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    /// Frames not yet served.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl DetectionSource for ReplayDetector {
    type Error = ReplayError;

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, _input: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>, Self::Error> {
        let detections = self
            .frames
            .pop_front()
            .ok_or(ReplayError::Exhausted { frames: self.served })?;
        self.served += 1;
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const RECORDING: &str = r#"{"detections":[{"bbox":[10,20,50,80],"class_id":2,"confidence":0.91}]}

{"detections":[{"bbox":[12,20,52,80],"class_id":2,"confidence":0.88},{"bbox":[0,0,5,5],"class_id":0,"confidence":0.5}]}
"#;

    #[test]
    fn test_replays_frames_in_order() {
        let mut detector = ReplayDetector::from_reader(Cursor::new(RECORDING)).unwrap();
        assert_eq!(detector.remaining(), 3);
        assert_eq!(detector.class_id("car"), Some(2));

        let first = detector.detect(&[], 0, 0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].bbox.to_tlbr(), [10.0, 20.0, 50.0, 80.0]);
        assert_eq!(first[0].class_id, 2);

        assert!(detector.detect(&[], 0, 0).unwrap().is_empty());
        assert_eq!(detector.detect(&[], 0, 0).unwrap().len(), 2);

        assert!(matches!(
            detector.detect(&[], 0, 0),
            Err(ReplayError::Exhausted { frames: 3 })
        ));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"detections\":[]}\n{\"detections\":[{\"bbox\":[1,2,3]}]}\n";
        let err = ReplayDetector::from_reader(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_custom_class_names() {
        let detector = ReplayDetector::from_frames(Vec::new())
            .with_class_names(vec!["vehicle".to_string(), "car".to_string()]);
        assert_eq!(detector.class_id("car"), Some(1));
        assert_eq!(COCO_CLASSES.len(), 80);
    }
}
