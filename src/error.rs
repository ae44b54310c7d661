//! Pipeline error types.

use std::fmt;

use thiserror::Error;

use crate::association::TrackingRecord;
use crate::recorder::{FlushError, RecorderError};

/// Type-erased error from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    VideoOpen,
    Detector,
    Tracker,
    Annotation,
    Storage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::VideoOpen => "video open",
            Stage::Detector => "detector",
            Stage::Tracker => "tracker",
            Stage::Annotation => "annotation",
            Stage::Storage => "storage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("video source error: {0}")]
    Source(#[source] BoxError),

    #[error("detector does not know class `{0}`")]
    UnknownClass(String),

    #[error("detector failed on frame {frame}: {source}")]
    Detector {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("tracker failed on frame {frame}: {source}")]
    Tracker {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error("annotating frame {frame} failed: {source}")]
    Annotate {
        frame: u64,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error("pipeline has already stopped")]
    Stopped,
}

impl PipelineError {
    /// The stage to blame in user-facing messages.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Source(_) => Stage::VideoOpen,
            PipelineError::UnknownClass(_) | PipelineError::Stopped => Stage::Setup,
            PipelineError::Detector { .. } => Stage::Detector,
            PipelineError::Tracker { .. } => Stage::Tracker,
            PipelineError::Annotate { .. } => Stage::Annotation,
            PipelineError::Flush(_) => Stage::Storage,
        }
    }

    /// Records that never reached storage, if this is a storage failure.
    pub fn pending_records(&self) -> Option<&[TrackingRecord]> {
        match self {
            PipelineError::Flush(err) => Some(&err.pending),
            _ => None,
        }
    }
}

impl From<RecorderError> for PipelineError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::Flush(err) => PipelineError::Flush(err),
            RecorderError::Drained => PipelineError::Stopped,
        }
    }
}
