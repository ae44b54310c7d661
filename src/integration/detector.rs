//! Trait for object detection backends.

use crate::detection::Detection;

/// An object detector run once per frame.
///
/// # Example
///
/// ```ignore
/// use cartrack_rs::{Detection, DetectionSource};
///
/// struct MyDetector {
///     names: Vec<String>,
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn class_names(&self) -> &[String] {
///         &self.names
///     }
///
///     fn detect(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Class names indexed by class id.
    fn class_names(&self) -> &[String];

    /// Resolve a class name to its id.
    fn class_id(&self, name: &str) -> Option<u32> {
        self.class_names()
            .iter()
            .position(|n| n == name)
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Run inference on one frame.
    ///
    /// `input` holds packed RGB8 pixels, row-major, `width * height * 3`
    /// bytes.
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}
