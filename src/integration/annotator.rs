use crate::association::TrackingRecord;
use crate::error::BoxError;

use super::Frame;

/// Receives every processed frame together with the records emitted for it.
pub trait FrameAnnotator {
    fn annotate(
        &mut self,
        frame_number: u64,
        frame: &Frame,
        records: &[TrackingRecord],
    ) -> Result<(), BoxError>;
}
