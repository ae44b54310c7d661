//! Bundled implementations of the integration traits.

mod box_annotator;
mod image_sequence;
mod replay;

pub use box_annotator::{BOX_COLOR, BoxAnnotator};
pub use image_sequence::{FRAME_EXTENSIONS, ImageSequenceSource, SourceError};
pub use replay::{COCO_CLASSES, ReplayDetector, ReplayError};
