use std::collections::HashSet;
use std::convert::Infallible;
use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use cartrack_rs::backends::SourceError;
use cartrack_rs::recorder::BATCH_SIZE;
use cartrack_rs::{
    AssociationStrategy, Associator, Detection, FilteredDetections, Frame, FrameSource,
    ImageSequenceSource, IouTracker, MemoryStore, MultiObjectTracker, PipelineConfig,
    PipelineError, ReplayDetector, SqliteStore, Stage, StopReason, TrackedObject,
    TrackingPipeline, TrackingStore,
};

const CAR: u32 = 2;

fn write_frames(dir: &Path, count: usize) {
    for i in 1..=count {
        RgbImage::from_pixel(64, 48, Rgb([30, 30, 30]))
            .save(dir.join(format!("{i:04}.png")))
            .unwrap();
    }
}

fn car(x: f32, y: f32, confidence: f32) -> Detection {
    Detection::new(x, y, x + 60.0, y + 40.0, CAR, confidence)
}

/// Reports each filtered detection as a track with id index + 1.
struct EchoTracker;

impl MultiObjectTracker for EchoTracker {
    type Error = Infallible;

    fn update(&mut self, detections: &FilteredDetections) -> Result<Vec<TrackedObject>, Self::Error> {
        Ok(detections
            .boxes()
            .iter()
            .enumerate()
            .map(|(i, bbox)| TrackedObject::new(*bbox, i as u64 + 1))
            .collect())
    }
}

/// Endless blank frames.
struct BlankFrames(usize);

impl FrameSource for BlankFrames {
    type Error = Infallible;

    fn validate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
        if self.0 == 0 {
            return Ok(None);
        }
        self.0 -= 1;
        Ok(Some(Frame::blank(16, 16)))
    }
}

#[test]
fn test_end_to_end_with_sqlite() {
    let dir = TempDir::new().unwrap();
    let frames_dir = dir.path().join("frames");
    std::fs::create_dir(&frames_dir).unwrap();
    write_frames(&frames_dir, 7);

    let recorded: Vec<Vec<Detection>> = (0..7)
        .map(|i| {
            let dx = i as f32 * 4.0;
            vec![
                car(100.0 + dx, 100.0, 0.9),
                car(300.0 - dx, 200.0, 0.8),
                Detection::new(10.0, 10.0, 30.0, 60.0, 0, 0.99),
            ]
        })
        .collect();

    let config = PipelineConfig {
        batch_size: 4,
        ..Default::default()
    };
    let database = dir.path().join("tracking_data.db");
    let mut pipeline = TrackingPipeline::new(
        ReplayDetector::from_frames(recorded),
        IouTracker::new(config.tracker.clone()),
        SqliteStore::open(&database).unwrap(),
        &config,
    )
    .unwrap();

    let summary = pipeline.run(&mut ImageSequenceSource::new(&frames_dir)).unwrap();
    assert_eq!(summary.frames_processed, 7);
    assert_eq!(summary.records_written, 14);
    assert_eq!(summary.tracks_seen, 2);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);

    let (history, store) = pipeline.into_parts().unwrap();
    assert_eq!(history.observations(), 14);
    store.close().unwrap();

    let store = SqliteStore::open_read_only(&database).unwrap();
    let records = store.fetch_all().unwrap();
    assert_eq!(records.len(), 14);

    let frames: HashSet<u64> = records.iter().map(|r| r.frame_number).collect();
    assert_eq!(frames, (1..=7).collect());

    let first = store.fetch_for_object(1).unwrap();
    assert_eq!(first.len(), 7);
    assert!(first.iter().all(|r| (r.confidence - 0.9).abs() < 1e-6));
    assert_eq!((first[6].x1, first[6].y1, first[6].x2, first[6].y2), (124, 100, 184, 140));
}

#[test]
fn test_drain_persists_every_record_once() {
    // 0 to 3 cars per frame
    let recorded: Vec<Vec<Detection>> = (0..53)
        .map(|i| (0..i % 4).map(|k| car(k as f32 * 100.0, 0.0, 0.75 + k as f32 * 0.05)).collect())
        .collect();
    let expected: usize = recorded.iter().map(Vec::len).sum();

    let config = PipelineConfig {
        batch_size: 10,
        ..Default::default()
    };
    let mut pipeline = TrackingPipeline::new(
        ReplayDetector::from_frames(recorded),
        EchoTracker,
        MemoryStore::new(),
        &config,
    )
    .unwrap();
    let summary = pipeline.run(&mut BlankFrames(53)).unwrap();
    assert_eq!(summary.records_written as usize, expected);

    let records = pipeline.store().records();
    assert_eq!(records.len(), expected);
    let keys: HashSet<(u64, u64)> = records.iter().map(|r| (r.frame_number, r.track_id)).collect();
    assert_eq!(keys.len(), expected);

    let mut frame_numbers: Vec<u64> = records.iter().map(|r| r.frame_number).collect();
    frame_numbers.dedup();
    assert!(frame_numbers.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(pipeline.frame_number(), 53);
}

#[test]
fn test_flush_boundary() {
    let recorded = vec![vec![car(0.0, 0.0, 0.9)]; BATCH_SIZE];
    let mut pipeline = TrackingPipeline::new(
        ReplayDetector::from_frames(recorded),
        EchoTracker,
        MemoryStore::new(),
        &PipelineConfig::default(),
    )
    .unwrap();

    for _ in 0..BATCH_SIZE - 1 {
        pipeline.process_frame(&Frame::blank(8, 8)).unwrap();
    }
    assert_eq!(pipeline.store().insert_calls(), 0);

    pipeline.process_frame(&Frame::blank(8, 8)).unwrap();
    assert_eq!(pipeline.store().insert_calls(), 1);
    assert_eq!(pipeline.store().len(), BATCH_SIZE);

    pipeline.shutdown().unwrap();
    assert_eq!(pipeline.store().insert_calls(), 1);
}

#[test]
fn test_replay_shorter_than_video_is_detector_error() {
    let dir = TempDir::new().unwrap();
    write_frames(dir.path(), 3);

    let mut pipeline = TrackingPipeline::new(
        ReplayDetector::from_frames(vec![vec![car(0.0, 0.0, 0.9)]]),
        EchoTracker,
        MemoryStore::new(),
        &PipelineConfig::default(),
    )
    .unwrap();

    let err = pipeline.run(&mut ImageSequenceSource::new(dir.path())).unwrap_err();
    assert_eq!(err.stage(), Stage::Detector);
    assert!(matches!(err, PipelineError::Detector { frame: 2, .. }));
    assert_eq!(pipeline.store().len(), 1);
}

#[test]
fn test_missing_video_aborts_before_processing() {
    let dir = TempDir::new().unwrap();
    let mut pipeline = TrackingPipeline::new(
        ReplayDetector::from_frames(vec![vec![car(0.0, 0.0, 0.9)]]),
        EchoTracker,
        MemoryStore::new(),
        &PipelineConfig::default(),
    )
    .unwrap();

    let err = pipeline
        .run(&mut ImageSequenceSource::new(dir.path().join("nope.mp4")))
        .unwrap_err();
    assert_eq!(err.stage(), Stage::VideoOpen);
    match err {
        PipelineError::Source(source) => {
            assert!(matches!(source.downcast_ref::<SourceError>(), Some(SourceError::NotFound(_))))
        }
        other => panic!("expected source error, got {other:?}"),
    }
    assert_eq!(pipeline.frame_number(), 0);
    assert_eq!(pipeline.store().insert_calls(), 0);
}

#[test]
fn test_exclusive_strategies_never_reuse_a_detection() {
    let tracked = vec![
        TrackedObject::new(cartrack_rs::BBox::new(0.0, 0.0, 99.0, 99.0), 1),
        TrackedObject::new(cartrack_rs::BBox::new(2.0, 2.0, 101.0, 101.0), 2),
        TrackedObject::new(cartrack_rs::BBox::new(200.0, 0.0, 299.0, 99.0), 3),
    ];
    let filtered: FilteredDetections = vec![
        (cartrack_rs::BBox::new(1.0, 1.0, 100.0, 100.0), 0.9),
        (cartrack_rs::BBox::new(201.0, 0.0, 300.0, 99.0), 0.8),
    ]
    .into_iter()
    .collect();

    let reuse = Associator::new(AssociationStrategy::GreedyReuse).associate(1, &tracked, &filtered);
    assert_eq!(reuse.len(), 3);

    for strategy in [AssociationStrategy::GreedyExclusive, AssociationStrategy::Optimal] {
        let records = Associator::new(strategy).associate(1, &tracked, &filtered);
        assert_eq!(records.len(), 2, "{strategy:?}");
        let mut confidences: Vec<f32> = records.iter().map(|r| r.confidence).collect();
        confidences.sort_by(f32::total_cmp);
        assert_eq!(confidences, vec![0.8, 0.9], "{strategy:?}");
    }
}
