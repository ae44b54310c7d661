use crate::association::TrackedObject;
use crate::detection::FilteredDetections;

/// A multi-object tracker fed with one frame of filtered detections at a time.
///
/// Implementations assign persistent track ids and must accept an empty
/// detection set.
pub trait MultiObjectTracker {
    type Error;

    fn update(&mut self, detections: &FilteredDetections) -> Result<Vec<TrackedObject>, Self::Error>;
}

impl<T: MultiObjectTracker + ?Sized> MultiObjectTracker for Box<T> {
    type Error = T::Error;

    fn update(&mut self, detections: &FilteredDetections) -> Result<Vec<TrackedObject>, Self::Error> {
        (**self).update(detections)
    }
}
