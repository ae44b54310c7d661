//! Frames and the sources that produce them.

use image::{Rgb, RgbImage};

/// One decoded video frame in RGB8.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A black frame, mostly useful in tests.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb([0, 0, 0])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB8 pixels, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// A finite sequence of frames.
pub trait FrameSource {
    type Error;

    /// Check that the source exists, is non-empty and yields at least one
    /// frame, leaving it positioned at the first frame.
    fn validate(&mut self) -> Result<(), Self::Error>;

    /// Go back to the first frame.
    fn rewind(&mut self) -> Result<(), Self::Error>;

    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

impl<F: FrameSource + ?Sized> FrameSource for &mut F {
    type Error = F::Error;

    fn validate(&mut self) -> Result<(), Self::Error> {
        (**self).validate()
    }

    fn rewind(&mut self) -> Result<(), Self::Error> {
        (**self).rewind()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        (**self).next_frame()
    }
}
