//! Drives a [`Pipeline`] over a stream of frames and collects the analysis.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

use serde_derive::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{OutputPaths, RatingConfig};
use crate::detection::DetectionBatch;
use crate::detector::Detector;
use crate::error::Error;
use crate::frame::VideoFrame;
use crate::metrics::{MetricsAccumulator, MetricsSummary};
use crate::pipeline::Pipeline;
use crate::rating::{self, PlayerRating, RatingInputs};
use crate::TrackUpdater;

/// Cooperative cancellation flag, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to do when a single frame fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub metrics_json: Value,
    pub summary: BTreeMap<u32, MetricsSummary>,
    pub rating_inputs: BTreeMap<String, RatingInputs>,
    pub ratings: BTreeMap<String, PlayerRating>,
    pub frames_processed: usize,
    pub frames_skipped: usize,
}

impl AnalysisReport {
    pub fn build(
        metrics: &MetricsAccumulator,
        rating: &RatingConfig,
        frames_processed: usize,
        frames_skipped: usize,
    ) -> Result<Self, Error> {
        let rating_inputs = metrics.to_rating_inputs(&rating.defaults);
        let ratings = rating::rate_players_from_metrics(&rating_inputs, &rating.weights)?;

        Ok(Self {
            metrics_json: metrics.to_json()?,
            summary: metrics.summarize(),
            rating_inputs,
            ratings,
            frames_processed,
            frames_skipped,
        })
    }

    /// Writes the metrics and ratings JSON files, creating the output directory.
    pub fn save(&self, paths: &OutputPaths) -> Result<(PathBuf, PathBuf), Error> {
        std::fs::create_dir_all(&paths.output_dir)?;

        let metrics_path = paths.metrics_json();
        std::fs::write(&metrics_path, serde_json::to_string_pretty(&self.metrics_json)?)?;

        let ratings_path = rating::save_ratings(&self.ratings, paths.ratings_json())?;

        info!(
            metrics = %metrics_path.display(),
            ratings = %ratings_path.display(),
            "analysis saved"
        );

        Ok((metrics_path, ratings_path))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FrameCounts {
    processed: usize,
    skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VideoRunner {
    policy: FramePolicy,
    cancel: CancelToken,
}

impl VideoRunner {
    pub fn new(policy: FramePolicy) -> Self {
        Self {
            policy,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Processes every frame in order on the calling thread.
    pub fn run<D, U, I>(&self, pipeline: &mut Pipeline<D, U>, frames: I) -> Result<AnalysisReport, Error>
    where
        D: Detector,
        U: TrackUpdater,
        I: IntoIterator<Item = VideoFrame>,
    {
        let mut counts = FrameCounts::default();

        for (idx, frame) in frames.into_iter().enumerate() {
            self.check_cancelled()?;

            let result = pipeline.process_frame(&frame).map(|_| ());
            self.account(result, idx, &mut counts)?;
        }

        self.finish(pipeline, counts)
    }

    /// Like [`VideoRunner::run`], with detection running one frame ahead on a
    /// separate thread. Frames still reach tracking and metrics in order.
    pub fn run_pipelined<D, U, I>(
        &self,
        pipeline: &mut Pipeline<D, U>,
        frames: I,
    ) -> Result<AnalysisReport, Error>
    where
        D: Detector + Send,
        U: TrackUpdater,
        I: IntoIterator<Item = VideoFrame>,
        I::IntoIter: Send,
    {
        let (detector, analyzer) = pipeline.parts_mut();
        let cancel = &self.cancel;
        let frames = frames.into_iter();

        let counts = thread::scope(|s| {
            let (tx, rx) = sync_channel::<(VideoFrame, Result<DetectionBatch, Error>)>(1);

            s.spawn(move || {
                for frame in frames {
                    if cancel.is_cancelled() {
                        break;
                    }

                    let batch = detector.detect(&frame);
                    if tx.send((frame, batch)).is_err() {
                        break;
                    }
                }
            });

            let mut counts = FrameCounts::default();
            for (idx, (frame, batch)) in rx.iter().enumerate() {
                self.check_cancelled()?;

                let result = batch
                    .and_then(|batch| analyzer.process_detections(&frame, &batch))
                    .map(|_| ());
                self.account(result, idx, &mut counts)?;
            }

            Ok::<_, Error>(counts)
        })?;

        self.finish(pipeline, counts)
    }

    #[inline]
    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn account(&self, result: Result<(), Error>, idx: usize, counts: &mut FrameCounts) -> Result<(), Error> {
        match result {
            Ok(()) => counts.processed += 1,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) if self.policy == FramePolicy::Skip => {
                warn!(frame = idx, error = %err, "frame skipped");
                counts.skipped += 1;
            }
            Err(err) => return Err(err),
        }

        Ok(())
    }

    fn finish<D, U>(&self, pipeline: &Pipeline<D, U>, counts: FrameCounts) -> Result<AnalysisReport, Error>
    where
        D: Detector,
        U: TrackUpdater,
    {
        // the producer stops quietly on cancellation
        self.check_cancelled()?;

        info!(
            processed = counts.processed,
            skipped = counts.skipped,
            players = pipeline.metrics().len(),
            "video analysed"
        );

        AnalysisReport::build(
            pipeline.metrics(),
            &pipeline.config().rating,
            counts.processed,
            counts.skipped,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, TrackingConfig};
    use crate::tracker::ByteTracker;
    use crate::Detection;

    /// One player walking right; fails on the listed frame indices.
    struct Walker {
        calls: usize,
        fail_on: Vec<usize>,
        cancel_on: Option<(usize, CancelToken)>,
    }

    impl Walker {
        fn new() -> Self {
            Self {
                calls: 0,
                fail_on: Vec::new(),
                cancel_on: None,
            }
        }
    }

    impl Detector for Walker {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<DetectionBatch, Error> {
            let idx = self.calls;
            self.calls += 1;

            if let Some((at, token)) = &self.cancel_on {
                if *at == idx {
                    token.cancel();
                }
            }

            if self.fail_on.contains(&idx) {
                return Err(Error::Detector(format!("decode failed at {}", idx)));
            }

            let x = 10.0 + idx as f32 * 2.0;
            Ok(DetectionBatch::from_detections(&[Detection::new(
                x,
                10.0,
                x + 10.0,
                40.0,
                0.9,
                0,
            )]))
        }
    }

    fn pipeline(detector: Walker) -> Pipeline<Walker, ByteTracker> {
        let config = PipelineConfig {
            tracking: TrackingConfig {
                min_hits: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let tracker = ByteTracker::new(config.tracking.clone());

        Pipeline::new(config, detector, tracker).unwrap()
    }

    fn frames(n: usize) -> Vec<VideoFrame> {
        (0..n)
            .map(|i| VideoFrame::filled(64, 64, [0, 0, 0], i as f64 * 0.04))
            .collect()
    }

    #[test]
    fn sequential_run_reports_every_frame() {
        let mut pipeline = pipeline(Walker::new());
        let report = VideoRunner::default().run(&mut pipeline, frames(5)).unwrap();

        assert_eq!(report.frames_processed, 5);
        assert_eq!(report.frames_skipped, 0);
        assert_eq!(report.summary.len(), 1);
        assert!((report.summary[&1].total_distance_m - 8.0).abs() < 1e-9);
        assert!(report.ratings.contains_key("1"));
    }

    #[test]
    fn pipelined_run_matches_sequential() {
        let mut a = pipeline(Walker::new());
        let mut b = pipeline(Walker::new());

        let runner = VideoRunner::default();
        let sequential = runner.run(&mut a, frames(12)).unwrap();
        let pipelined = runner.run_pipelined(&mut b, frames(12)).unwrap();

        assert_eq!(sequential, pipelined);
    }

    #[test]
    fn abort_policy_stops_on_first_failure() {
        let mut detector = Walker::new();
        detector.fail_on = vec![2];

        let mut pipeline = pipeline(detector);
        let result = VideoRunner::new(FramePolicy::Abort).run(&mut pipeline, frames(5));

        assert!(matches!(result, Err(Error::Detector(_))));
    }

    #[test]
    fn skip_policy_continues_past_failures() {
        let mut detector = Walker::new();
        detector.fail_on = vec![2];

        let mut pipeline = pipeline(detector);
        let report = VideoRunner::new(FramePolicy::Skip)
            .run_pipelined(&mut pipeline, frames(5))
            .unwrap();

        assert_eq!(report.frames_processed, 4);
        assert_eq!(report.frames_skipped, 1);
        assert_eq!(pipeline.metrics().get(1).unwrap().len(), 4);
    }

    /// Two static players; the second stands on the horizon of `horizon_at_128`.
    struct Pair;

    impl Detector for Pair {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<DetectionBatch, Error> {
            Ok(DetectionBatch::from_detections(&[
                Detection::new(10.0, 10.0, 30.0, 40.0, 0.9, 0),
                Detection::new(118.0, 10.0, 138.0, 40.0, 0.9, 0),
            ]))
        }
    }

    /// Maps image x = 128 to infinity.
    fn horizon_at_128<D: Detector, U: TrackUpdater>(pipeline: &mut Pipeline<D, U>) {
        let pt = nalgebra::Point2::<f64>::new;
        pipeline
            .set_homography(
                &[pt(0.0, 0.0), pt(64.0, 0.0), pt(64.0, 64.0), pt(0.0, 64.0)],
                &[pt(0.0, 0.0), pt(128.0, 0.0), pt(128.0, 128.0), pt(0.0, 64.0)],
            )
            .unwrap();
    }

    #[test]
    fn skipped_frame_leaves_no_metrics() {
        let config = PipelineConfig {
            tracking: TrackingConfig {
                min_hits: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let tracker = ByteTracker::new(config.tracking.clone());
        let mut pipeline = Pipeline::new(config, Pair, tracker).unwrap();
        horizon_at_128(&mut pipeline);

        let frames: Vec<_> = (0..3)
            .map(|i| VideoFrame::filled(200, 100, [0, 0, 0], i as f64 * 0.04))
            .collect();
        let report = VideoRunner::new(FramePolicy::Skip)
            .run(&mut pipeline, frames)
            .unwrap();

        assert_eq!(report.frames_processed, 0);
        assert_eq!(report.frames_skipped, 3);
        assert!(pipeline.metrics().get(1).is_none());
        assert!(pipeline.metrics().is_empty());
        assert!(report.ratings.is_empty());
    }

    #[test]
    fn cancellation_writes_nothing() {
        let runner = VideoRunner::new(FramePolicy::Skip);
        let mut detector = Walker::new();
        detector.cancel_on = Some((1, runner.cancel_token()));

        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(dir.path().join("out"));

        let mut pipeline = pipeline(detector);
        let result = runner
            .run(&mut pipeline, frames(5))
            .and_then(|report| report.save(&paths));

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!paths.metrics_json().exists());
        assert!(!paths.ratings_json().exists());
    }

    #[test]
    fn pipelined_cancellation_writes_nothing() {
        let runner = VideoRunner::default();
        let mut detector = Walker::new();
        detector.cancel_on = Some((2, runner.cancel_token()));

        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(dir.path().join("out"));

        let mut pipeline = pipeline(detector);
        let result = runner
            .run_pipelined(&mut pipeline, frames(8))
            .and_then(|report| report.save(&paths));

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(pipeline.metrics().get(1).map_or(0, |m| m.len()) <= 2);
        assert!(!paths.output_dir.exists());
    }

    #[test]
    fn report_is_saved_after_full_pass() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::in_dir(dir.path().join("out"));

        let mut pipeline = pipeline(Walker::new());
        let report = VideoRunner::default().run(&mut pipeline, frames(3)).unwrap();
        report.save(&paths).unwrap();

        let metrics: Value =
            serde_json::from_str(&std::fs::read_to_string(paths.metrics_json()).unwrap()).unwrap();
        assert_eq!(metrics["1"]["timestamps_s"].as_array().unwrap().len(), 3);

        let ratings = rating::rate_players_from_file(paths.metrics_json(), &Default::default()).unwrap();
        assert_eq!(ratings, report.ratings);
    }
}
