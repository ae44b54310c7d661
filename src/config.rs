//! Pipeline configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::association::{AssociationStrategy, IOU_MATCH_FLOOR};
use crate::detection::CONFIDENCE_THRESHOLD;
use crate::recorder::{BATCH_SIZE, FLUSH_RETRIES};
use crate::tracker::IouTrackerConfig;

/// Class tracked when none is configured.
pub const DEFAULT_TARGET_CLASS: &str = "car";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for a [`TrackingPipeline`](crate::TrackingPipeline).
///
/// Every field has a default, so a config file only needs the keys it
/// overrides:
///
/// ```json
/// { "strategy": "optimal", "tracker": { "max_age": 5 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detector class name to track
    pub target_class: String,
    /// Detections at or below this confidence are discarded
    pub confidence_threshold: f32,
    /// Tracked boxes need IoU strictly above this to pick up a confidence
    pub iou_floor: f32,
    pub strategy: AssociationStrategy,
    /// Buffered records that trigger a store write
    pub batch_size: usize,
    /// Extra attempts after a failed store write, at least 1
    pub flush_retries: u32,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    pub tracker: IouTrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_class: DEFAULT_TARGET_CLASS.to_string(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            iou_floor: IOU_MATCH_FLOOR,
            strategy: AssociationStrategy::default(),
            batch_size: BATCH_SIZE,
            flush_retries: FLUSH_RETRIES,
            max_frames: None,
            tracker: IouTrackerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
