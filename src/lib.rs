pub mod bbox;
pub mod color;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod homography;
pub mod kmeans;
pub mod math;
pub mod metrics;
pub mod pipeline;
pub mod rating;
pub mod runner;
pub mod scene;
pub mod team;
pub mod tracker;

mod circular_queue;
#[cfg(feature = "opencv")]
mod cv;
mod predictor;
mod track;

pub use config::PipelineConfig;
pub use detection::{Detection, DetectionBatch};
pub use detector::Detector;
pub use error::Error;
pub use events::{ClipClassifier, EventScanner};
pub use frame::VideoFrame;
pub use homography::HomographyMapper;
pub use metrics::MetricsAccumulator;
pub use pipeline::{Pipeline, PlayerTrack, PositionMode};
pub use runner::{AnalysisReport, CancelToken, FramePolicy, VideoRunner};
pub use team::TeamColorClassifier;
pub use track::Track;
pub use tracker::{ByteTracker, TrackingAdapter};

/// Online multi-object tracker: one call per frame with that frame's
/// detections, returns the live tracks with ids stable across frames.
pub trait TrackUpdater {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<Track>, Error>;
}

impl<U: TrackUpdater + ?Sized> TrackUpdater for Box<U> {
    #[inline]
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<Track>, Error> {
        (**self).update(detections)
    }
}
