//! Frame source over a directory of numbered image files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::integration::{Frame, FrameSource};

/// File extensions read as frames, compared case-insensitively.
pub const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("video source {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("video source {} is empty", .0.display())]
    Empty(PathBuf),

    #[error("video source {} contains no decodable frame", .0.display())]
    NoFrames(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode frame {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Reads the image files of a directory in lexicographic order, or a single
/// image file as a one-frame video.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    path: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    /// Point the source at `path`. Nothing is read until
    /// [`validate`](FrameSource::validate) or the first frame.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: Vec::new(),
            position: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame files found by the last scan.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn scan(&mut self) -> Result<(), SourceError> {
        if !self.path.exists() {
            return Err(SourceError::NotFound(self.path.clone()));
        }

        let files = if self.path.is_dir() {
            let entries = fs::read_dir(&self.path).map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.is_file() && is_frame_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
            files
        } else {
            let len = fs::metadata(&self.path)
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?
                .len();
            if len == 0 {
                return Err(SourceError::Empty(self.path.clone()));
            }
            vec![self.path.clone()]
        };

        if files.is_empty() {
            return Err(SourceError::Empty(self.path.clone()));
        }
        debug!(path = %self.path.display(), frames = files.len(), "scanned video source");
        self.files = files;
        self.position = 0;
        Ok(())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn decode(path: &Path) -> Result<Frame, SourceError> {
    let image = image::open(path).map_err(|source| SourceError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Frame::new(image.to_rgb8()))
}

impl FrameSource for ImageSequenceSource {
    type Error = SourceError;

    fn validate(&mut self) -> Result<(), Self::Error> {
        self.scan()?;
        let first = self
            .files
            .first()
            .ok_or_else(|| SourceError::Empty(self.path.clone()))?;
        decode(first).map_err(|err| {
            debug!(error = %err, "first frame failed to decode");
            SourceError::NoFrames(self.path.clone())
        })?;
        self.rewind()
    }

    fn rewind(&mut self) -> Result<(), Self::Error> {
        self.position = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        if self.files.is_empty() && self.position == 0 {
            self.scan()?;
        }
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        let frame = decode(path)?;
        self.position += 1;
        Ok(Some(frame))
    }
}
