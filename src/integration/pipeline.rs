//! TrackingPipeline driving detection, tracking, association and storage
//! frame by frame.

use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info};

use super::{DetectionSource, Frame, FrameAnnotator, FrameSource, MultiObjectTracker};
use crate::association::Associator;
use crate::config::PipelineConfig;
use crate::detection::{RawDetections, filter_detections};
use crate::error::PipelineError;
use crate::history::TrackingHistory;
use crate::recorder::{BatchRecorder, RecorderStats};
use crate::storage::TrackingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Stopped,
}

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    StopRequested,
    FrameLimit,
}

/// Requests a running pipeline to stop at the next frame boundary.
///
/// Clones share the same flag, so a handle can be moved to a signal handler
/// or another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    /// Records persisted over the lifetime of the pipeline
    pub records_written: u64,
    /// Distinct track ids that produced at least one record
    pub tracks_seen: usize,
    pub stop_reason: StopReason,
}

/// Runs a detector and a tracker over a frame source and persists one
/// [`TrackingRecord`](crate::TrackingRecord) per matched tracked object.
///
/// Frames are numbered from 1 in the order they are read. The pipeline is
/// single use: once stopped, the record buffer has been drained and further
/// calls fail with [`PipelineError::Stopped`].
pub struct TrackingPipeline<D, T, S>
where
    D: DetectionSource,
    T: MultiObjectTracker,
    S: TrackingStore,
{
    detector: D,
    tracker: T,
    recorder: BatchRecorder<S>,
    associator: Associator,
    history: TrackingHistory,
    annotator: Option<Box<dyn FrameAnnotator>>,
    target_class_id: u32,
    confidence_threshold: f32,
    max_frames: Option<u64>,
    frame_number: u64,
    state: PipelineState,
    stop: StopHandle,
}

impl<D, T, S> TrackingPipeline<D, T, S>
where
    D: DetectionSource,
    D::Error: StdError + Send + Sync + 'static,
    T: MultiObjectTracker,
    T::Error: StdError + Send + Sync + 'static,
    S: TrackingStore,
{
    /// Build a pipeline, resolving the configured target class through the
    /// detector's class names.
    pub fn new(detector: D, tracker: T, store: S, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let target_class_id = detector
            .class_id(&config.target_class)
            .ok_or_else(|| PipelineError::UnknownClass(config.target_class.clone()))?;

        info!(
            target_class = %config.target_class,
            class_id = target_class_id,
            strategy = ?config.strategy,
            batch_size = config.batch_size,
            "tracking pipeline ready"
        );

        Ok(Self {
            detector,
            tracker,
            recorder: BatchRecorder::new(store)
                .with_batch_size(config.batch_size)
                .with_flush_retries(config.flush_retries),
            associator: Associator::new(config.strategy).with_iou_floor(config.iou_floor),
            history: TrackingHistory::new(),
            annotator: None,
            target_class_id,
            confidence_threshold: config.confidence_threshold,
            max_frames: config.max_frames,
            frame_number: 0,
            state: PipelineState::Running,
            stop: StopHandle::new(),
        })
    }

    /// Hand every processed frame and its records to `annotator`.
    pub fn with_annotator(mut self, annotator: impl FrameAnnotator + 'static) -> Self {
        self.annotator = Some(Box::new(annotator));
        self
    }

    /// A handle that stops [`run`](Self::run) at the next frame boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process one frame and return the number of records it produced.
    ///
    /// For callers driving their own loop. Errors are returned as is; call
    /// [`shutdown`](Self::shutdown) afterwards to persist what was buffered.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<usize, PipelineError> {
        if self.state == PipelineState::Stopped {
            return Err(PipelineError::Stopped);
        }

        self.frame_number += 1;
        let frame_number = self.frame_number;

        let detections = self
            .detector
            .detect(frame.as_bytes(), frame.width(), frame.height())
            .map_err(|err| PipelineError::Detector {
                frame: frame_number,
                source: Box::new(err),
            })?;
        let raw = RawDetections::from_detections(&detections);
        let filtered = filter_detections(&raw, self.target_class_id, self.confidence_threshold);

        let tracked = self
            .tracker
            .update(&filtered)
            .map_err(|err| PipelineError::Tracker {
                frame: frame_number,
                source: Box::new(err),
            })?;

        let records = self.associator.associate(frame_number, &tracked, &filtered);
        for record in &records {
            self.history.record(record);
            self.recorder.record(*record)?;
        }
        self.recorder.flush_if_full()?;

        if let Some(annotator) = self.annotator.as_mut() {
            annotator
                .annotate(frame_number, frame, &records)
                .map_err(|source| PipelineError::Annotate {
                    frame: frame_number,
                    source,
                })?;
        }

        debug!(
            frame = frame_number,
            detections = detections.len(),
            filtered = filtered.len(),
            tracked = tracked.len(),
            records = records.len(),
            "processed frame"
        );
        Ok(records.len())
    }

    /// Validate `source` and process its frames until it ends, a stop is
    /// requested or the frame limit is reached, then drain the buffer.
    ///
    /// On a detector, tracker, source or annotation error the buffered
    /// records are drained before the error is returned. A storage error is
    /// returned as is and carries the records it could not write.
    pub fn run<F>(&mut self, source: &mut F) -> Result<RunSummary, PipelineError>
    where
        F: FrameSource,
        F::Error: StdError + Send + Sync + 'static,
    {
        if self.state == PipelineState::Stopped {
            return Err(PipelineError::Stopped);
        }

        if let Err(err) = source.validate() {
            return Err(self.fail(PipelineError::Source(Box::new(err))));
        }

        let first_frame = self.frame_number;
        let stop_reason = loop {
            if self.stop.is_stop_requested() {
                break StopReason::StopRequested;
            }
            if self.max_frames.is_some_and(|max| self.frame_number >= max) {
                break StopReason::FrameLimit;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(err) => return Err(self.fail(PipelineError::Source(Box::new(err)))),
            };

            if let Err(err) = self.process_frame(&frame) {
                return Err(self.fail(err));
            }
        };

        self.shutdown()?;

        let summary = RunSummary {
            frames_processed: self.frame_number - first_frame,
            records_written: self.recorder.stats().flushed,
            tracks_seen: self.history.len(),
            stop_reason,
        };
        info!(
            frames = summary.frames_processed,
            records = summary.records_written,
            tracks = summary.tracks_seen,
            reason = ?summary.stop_reason,
            "tracking run finished"
        );
        Ok(summary)
    }

    /// Stop the pipeline and drain buffered records to the store.
    ///
    /// Returns the number of records written by the drain. Calling it on a
    /// stopped pipeline does nothing.
    pub fn shutdown(&mut self) -> Result<usize, PipelineError> {
        if self.state == PipelineState::Stopped {
            return Ok(0);
        }
        self.state = PipelineState::Stopped;
        let drained = self.recorder.drain()?;
        debug!(drained, frames = self.frame_number, "pipeline stopped");
        Ok(drained)
    }

    /// Stop the pipeline if it is still running and hand back the history
    /// and the store.
    pub fn into_parts(mut self) -> Result<(TrackingHistory, S), PipelineError> {
        self.shutdown()?;
        Ok((self.history, self.recorder.into_store()))
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        if matches!(err, PipelineError::Flush(_)) {
            self.state = PipelineState::Stopped;
            return err;
        }
        match self.shutdown() {
            Ok(_) => err,
            Err(drain_err) => {
                error!(error = %err, "pipeline failed and the final drain failed too");
                drain_err
            }
        }
    }

    /// Number of the last frame processed, 0 before the first.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn target_class_id(&self) -> u32 {
        self.target_class_id
    }

    pub fn associator(&self) -> &Associator {
        &self.associator
    }

    pub fn history(&self) -> &TrackingHistory {
        &self.history
    }

    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn store(&self) -> &S {
        self.recorder.store()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    use thiserror::Error;

    use super::*;
    use crate::association::{TrackedObject, TrackingRecord};
    use crate::detection::{Detection, FilteredDetections};
    use crate::error::{BoxError, Stage};
    use crate::storage::MemoryStore;

    const CAR: u32 = 2;

    #[derive(Debug, Error)]
    #[error("no detections scripted for this frame")]
    struct ScriptExhausted;

    struct ScriptedDetector {
        names: Vec<String>,
        frames: Vec<Vec<Detection>>,
        calls: usize,
    }

    impl ScriptedDetector {
        fn new(frames: Vec<Vec<Detection>>) -> Self {
            Self {
                names: ["person", "bicycle", "car"].map(String::from).to_vec(),
                frames,
                calls: 0,
            }
        }
    }

    impl DetectionSource for ScriptedDetector {
        type Error = ScriptExhausted;

        fn class_names(&self) -> &[String] {
            &self.names
        }

        fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<Detection>, Self::Error> {
            let detections = self.frames.get(self.calls).cloned().ok_or(ScriptExhausted);
            self.calls += 1;
            detections
        }
    }

    /// Reports every detection as a track whose id is its index plus one.
    struct IndexTracker;

    impl MultiObjectTracker for IndexTracker {
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

    struct VecSource {
        total: usize,
        read: usize,
    }

    impl VecSource {
        fn new(total: usize) -> Self {
            Self { total, read: 0 }
        }
    }

    impl FrameSource for VecSource {
        type Error = Infallible;

        fn validate(&mut self) -> Result<(), Self::Error> {
            self.read = 0;
            Ok(())
        }

        fn rewind(&mut self) -> Result<(), Self::Error> {
            self.read = 0;
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
            if self.read >= self.total {
                return Ok(None);
            }
            self.read += 1;
            Ok(Some(Frame::blank(64, 48)))
        }
    }

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[derive(Default)]
    struct BrokenStore {
        attempts: usize,
    }

    impl TrackingStore for BrokenStore {
        type Error = DiskFull;

        fn insert_batch(&mut self, _: &[TrackingRecord]) -> Result<(), Self::Error> {
            self.attempts += 1;
            Err(DiskFull)
        }

        fn fetch_all(&self) -> Result<Vec<TrackingRecord>, Self::Error> {
            Ok(Vec::new())
        }

        fn fetch_for_object(&self, _: u64) -> Result<Vec<TrackingRecord>, Self::Error> {
            Ok(Vec::new())
        }
    }

    struct FrameLog(Rc<RefCell<Vec<(u64, usize)>>>);

    impl FrameAnnotator for FrameLog {
        fn annotate(&mut self, frame_number: u64, _: &Frame, records: &[TrackingRecord]) -> Result<(), BoxError> {
            self.0.borrow_mut().push((frame_number, records.len()));
            Ok(())
        }
    }

    fn car(x: f32, confidence: f32) -> Detection {
        Detection::new(x, 10.0, x + 40.0, 50.0, CAR, confidence)
    }

    fn pipeline<S: TrackingStore>(
        frames: Vec<Vec<Detection>>,
        store: S,
        config: &PipelineConfig,
    ) -> TrackingPipeline<ScriptedDetector, IndexTracker, S> {
        TrackingPipeline::new(ScriptedDetector::new(frames), IndexTracker, store, config).unwrap()
    }

    #[test]
    fn test_unknown_target_class() {
        let config = PipelineConfig {
            target_class: "zeppelin".into(),
            ..Default::default()
        };
        let result = TrackingPipeline::new(
            ScriptedDetector::new(Vec::new()),
            IndexTracker,
            MemoryStore::new(),
            &config,
        );
        match result {
            Err(err @ PipelineError::UnknownClass(_)) => assert_eq!(err.stage(), Stage::Setup),
            _ => panic!("expected unknown class error"),
        }
    }

    #[test]
    fn test_run_to_end_of_stream() {
        let frames = vec![
            vec![car(0.0, 0.9)],
            vec![car(5.0, 0.8), car(200.0, 0.95)],
            vec![],
            vec![car(15.0, 0.85)],
        ];
        let mut pipeline = pipeline(frames, MemoryStore::new(), &PipelineConfig::default());
        let summary = pipeline.run(&mut VecSource::new(4)).unwrap();

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.records_written, 4);
        assert_eq!(summary.tracks_seen, 2);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        let frames: Vec<u64> = pipeline.store().records().iter().map(|r| r.frame_number).collect();
        assert_eq!(frames, vec![1, 2, 2, 4]);
        assert_eq!(pipeline.history().get(1).unwrap().frames, vec![1, 2, 4]);

        assert!(matches!(pipeline.run(&mut VecSource::new(1)), Err(PipelineError::Stopped)));
        assert!(matches!(
            pipeline.process_frame(&Frame::blank(8, 8)),
            Err(PipelineError::Stopped)
        ));
    }

    #[test]
    fn test_filtered_detections_produce_no_records() {
        let frames = vec![vec![
            car(0.0, 0.7),
            Detection::new(100.0, 10.0, 140.0, 50.0, 0, 0.99),
            car(200.0, 0.71),
        ]];
        let mut pipeline = pipeline(frames, MemoryStore::new(), &PipelineConfig::default());
        pipeline.run(&mut VecSource::new(1)).unwrap();

        let records = pipeline.store().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].x1, 200);
        assert!((records[0].confidence - 0.71).abs() < 1e-6);
    }

    #[test]
    fn test_stop_requested_before_first_frame() {
        let mut pipeline = pipeline(vec![vec![car(0.0, 0.9)]], MemoryStore::new(), &PipelineConfig::default());
        pipeline.stop_handle().request_stop();

        let summary = pipeline.run(&mut VecSource::new(3)).unwrap();
        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.stop_reason, StopReason::StopRequested);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    /// Requests a stop once the given frame has been processed.
    struct StopAfter {
        frame: u64,
        handle: StopHandle,
    }

    impl FrameAnnotator for StopAfter {
        fn annotate(&mut self, frame_number: u64, _: &Frame, _: &[TrackingRecord]) -> Result<(), BoxError> {
            if frame_number == self.frame {
                self.handle.request_stop();
            }
            Ok(())
        }
    }

    #[test]
    fn test_stop_mid_run_drains_buffer_once() {
        let config = PipelineConfig {
            batch_size: 10,
            ..Default::default()
        };
        let frames = vec![vec![car(0.0, 0.9)]; 8];
        let pipeline = pipeline(frames, MemoryStore::new(), &config);
        let handle = pipeline.stop_handle();
        let mut pipeline = pipeline.with_annotator(StopAfter { frame: 3, handle });

        let summary = pipeline.run(&mut VecSource::new(8)).unwrap();
        assert_eq!(summary.stop_reason, StopReason::StopRequested);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.records_written, 3);

        let stored: Vec<u64> = pipeline.store().records().iter().map(|r| r.frame_number).collect();
        assert_eq!(stored, vec![1, 2, 3]);
        assert_eq!(pipeline.store().insert_calls(), 1);

        pipeline.shutdown().unwrap();
        assert_eq!(pipeline.store().insert_calls(), 1);
    }

    #[test]
    fn test_frame_limit() {
        let config = PipelineConfig {
            max_frames: Some(2),
            ..Default::default()
        };
        let frames = vec![vec![car(0.0, 0.9)]; 5];
        let mut pipeline = pipeline(frames, MemoryStore::new(), &config);

        let summary = pipeline.run(&mut VecSource::new(5)).unwrap();
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        assert_eq!(pipeline.store().len(), 2);
    }

    #[test]
    fn test_detector_failure_drains_first() {
        let frames = vec![vec![car(0.0, 0.9)], vec![car(5.0, 0.9)]];
        let mut pipeline = pipeline(frames, MemoryStore::new(), &PipelineConfig::default());

        let err = pipeline.run(&mut VecSource::new(5)).unwrap_err();
        assert!(matches!(err, PipelineError::Detector { frame: 3, .. }));
        assert_eq!(err.stage(), Stage::Detector);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(pipeline.store().len(), 2);
    }

    #[test]
    fn test_storage_failure_carries_pending_records() {
        let config = PipelineConfig {
            batch_size: 2,
            ..Default::default()
        };
        let frames = vec![vec![car(0.0, 0.9)], vec![car(5.0, 0.8)], vec![car(10.0, 0.9)]];
        let mut pipeline = pipeline(frames, BrokenStore::default(), &config);

        let err = pipeline.run(&mut VecSource::new(3)).unwrap_err();
        assert_eq!(err.stage(), Stage::Storage);
        let pending = err.pending_records().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!((pending[0].frame_number, pending[1].frame_number), (1, 2));
        assert_eq!(pipeline.store().attempts, 2);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_process_frame_then_into_parts() {
        let frames = vec![vec![car(0.0, 0.9)], vec![car(3.0, 0.8)]];
        let mut pipeline = pipeline(frames, MemoryStore::new(), &PipelineConfig::default());
        assert_eq!(pipeline.process_frame(&Frame::blank(8, 8)).unwrap(), 1);
        assert_eq!(pipeline.process_frame(&Frame::blank(8, 8)).unwrap(), 1);
        assert_eq!(pipeline.frame_number(), 2);
        assert_eq!(pipeline.store().len(), 0);

        let (history, store) = pipeline.into_parts().unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(history.get(1).unwrap().confidences, vec![0.9, 0.8]);
    }

    #[test]
    fn test_annotator_sees_every_frame() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let frames = vec![vec![car(0.0, 0.9)], vec![], vec![car(0.0, 0.9), car(100.0, 0.9)]];
        let mut pipeline =
            pipeline(frames, MemoryStore::new(), &PipelineConfig::default()).with_annotator(FrameLog(log.clone()));
        pipeline.run(&mut VecSource::new(3)).unwrap();

        assert_eq!(*log.borrow(), vec![(1, 1), (2, 0), (3, 2)]);
    }
}
