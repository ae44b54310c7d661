//! Draws tracked boxes onto frames and writes them out as PNG files.

use std::fs;
use std::path::{Path, PathBuf};

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::association::TrackingRecord;
use crate::error::BoxError;
use crate::integration::{Frame, FrameAnnotator};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Saves every frame as `frame_{n:06}.png` with a 2px green rectangle per
/// tracking record. Both corners of the record are on the outline.
#[derive(Debug, Clone)]
pub struct BoxAnnotator {
    output_dir: PathBuf,
}

impl BoxAnnotator {
    /// Create the annotator, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn frame_path(&self, frame_number: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{frame_number:06}.png"))
    }
}

/// Outline rectangles for a record, outermost first. Boxes too small for a
/// second ring get one.
fn record_rects(record: &TrackingRecord) -> Vec<Rect> {
    let width = (record.x2 - record.x1 + 1).max(1);
    let height = (record.y2 - record.y1 + 1).max(1);
    let mut rects = vec![Rect::at(record.x1, record.y1).of_size(width as u32, height as u32)];
    if width > 2 && height > 2 {
        rects.push(Rect::at(record.x1 + 1, record.y1 + 1).of_size(width as u32 - 2, height as u32 - 2));
    }
    rects
}

impl FrameAnnotator for BoxAnnotator {
    fn annotate(
        &mut self,
        frame_number: u64,
        frame: &Frame,
        records: &[TrackingRecord],
    ) -> Result<(), BoxError> {
        let mut canvas = frame.image().clone();
        for rect in records.iter().flat_map(record_rects) {
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
        canvas.save(self.frame_path(frame_number))?;
        Ok(())
    }
}
