//! Per-frame orchestration: detection, tracking, pitch mapping, team
//! assignment and metrics, always in that order.

use nalgebra as na;
use ndarray::Array3;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::detection::DetectionBatch;
use crate::detector::Detector;
use crate::error::Error;
use crate::frame::{self, VideoFrame};
use crate::homography::HomographyMapper;
use crate::metrics::MetricsAccumulator;
use crate::team::TeamColorClassifier;
use crate::tracker::TrackingAdapter;
use crate::{Track, TrackUpdater};

const OUTLINE: usize = 2;
const TEAM_COLORS: [[u8; 3]; 2] = [[255, 64, 0], [0, 0, 255]];
const NO_TEAM_COLOR: [u8; 3] = [255, 255, 255];

/// Units of [`PlayerTrack::position`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    /// pitch meters
    Pitch,
    /// image pixels, homography not calibrated
    Pixel,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PlayerTrack {
    pub track: Track,
    pub position: na::Point2<f64>,
    pub team: Option<u8>,
    pub mode: PositionMode,
}

/// Everything downstream of the detector.
pub struct FrameAnalyzer<U> {
    allow_pixel_fallback: bool,
    fallback_warned: bool,
    tracker: TrackingAdapter<U>,
    homography: HomographyMapper,
    classifier: TeamColorClassifier,
    metrics: MetricsAccumulator,
}

impl<U: TrackUpdater> FrameAnalyzer<U> {
    pub fn new(config: &PipelineConfig, updater: U) -> Result<Self, Error> {
        Ok(Self {
            allow_pixel_fallback: config.allow_pixel_fallback,
            fallback_warned: false,
            tracker: TrackingAdapter::new(updater),
            homography: HomographyMapper::from_config(&config.homography)?,
            classifier: TeamColorClassifier::new(config.team.clone()),
            metrics: MetricsAccumulator::new(config.metrics.clone()),
        })
    }

    pub fn process_detections(
        &mut self,
        frame: &VideoFrame,
        batch: &DetectionBatch,
    ) -> Result<Vec<PlayerTrack>, Error> {
        let tracks = self.tracker.update(batch)?;

        self.classifier.add_samples(frame, &tracks)?;

        let mut players = Vec::with_capacity(tracks.len());
        for track in tracks {
            let (position, mode) = self.locate(&track)?;
            let team = self.classifier.predict(frame, &track);

            players.push(PlayerTrack {
                track,
                position,
                team,
                mode,
            });
        }

        // a frame is recorded whole or not at all
        for player in &players {
            self.metrics.update(
                player.track.track_id,
                player.position,
                frame.timestamp,
                player.team,
            );
        }

        debug!(
            timestamp = frame.timestamp,
            detections = batch.len(),
            tracks = players.len(),
            "frame processed"
        );

        Ok(players)
    }

    fn locate(&mut self, track: &Track) -> Result<(na::Point2<f64>, PositionMode), Error> {
        let center = track.center();

        if self.homography.is_configured() {
            return Ok((self.homography.image_to_pitch(center)?, PositionMode::Pitch));
        }

        if !self.allow_pixel_fallback {
            return Err(Error::NotConfigured);
        }

        if !self.fallback_warned {
            warn!("homography not calibrated, positions and metrics are in pixels");
            self.fallback_warned = true;
        }

        Ok((center, PositionMode::Pixel))
    }
}

pub struct Pipeline<D, U> {
    config: PipelineConfig,
    detector: D,
    analyzer: FrameAnalyzer<U>,
}

impl<D: Detector, U: TrackUpdater> Pipeline<D, U> {
    pub fn new(config: PipelineConfig, detector: D, updater: U) -> Result<Self, Error> {
        let analyzer = FrameAnalyzer::new(&config, updater)?;

        Ok(Self {
            config,
            detector,
            analyzer,
        })
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process_frame(&mut self, frame: &VideoFrame) -> Result<Vec<PlayerTrack>, Error> {
        let batch = self.detector.detect(frame)?;

        self.analyzer.process_detections(frame, &batch)
    }

    /// Runs the post-detection stages on detections produced elsewhere.
    #[inline]
    pub fn process_detections(
        &mut self,
        frame: &VideoFrame,
        batch: &DetectionBatch,
    ) -> Result<Vec<PlayerTrack>, Error> {
        self.analyzer.process_detections(frame, batch)
    }

    /// Calibrates (or recalibrates) the pixel to pitch mapping.
    pub fn set_homography(
        &mut self,
        src: &[na::Point2<f64>],
        dst: &[na::Point2<f64>],
    ) -> Result<(), Error> {
        self.analyzer.homography.compute(src, dst)
    }

    #[inline]
    pub fn homography(&self) -> &HomographyMapper {
        &self.analyzer.homography
    }

    #[inline]
    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.analyzer.metrics
    }

    #[inline]
    pub fn team_classifier(&self) -> &TeamColorClassifier {
        &self.analyzer.classifier
    }

    /// Detector and the remaining stages, borrowed separately so detection
    /// can run on another thread.
    #[inline]
    pub fn parts_mut(&mut self) -> (&mut D, &mut FrameAnalyzer<U>) {
        (&mut self.detector, &mut self.analyzer)
    }

    pub fn into_parts(self) -> (MetricsAccumulator, TeamColorClassifier) {
        (self.analyzer.metrics, self.analyzer.classifier)
    }
}

/// Pixel box of one player on the annotated frame.
pub(crate) struct Outline {
    pub(crate) window: (usize, usize, usize, usize),
    pub(crate) color: [u8; 3],
    #[cfg_attr(not(feature = "opencv"), allow(dead_code))]
    pub(crate) label: String,
}

#[inline]
pub fn track_label(track: &Track) -> String {
    format!("ID {}", track.track_id)
}

#[cfg(feature = "opencv")]
fn draw_with_opencv(image: &mut Array3<u8>, outlines: &[Outline]) -> bool {
    match crate::cv::draw_outlines(image, outlines, OUTLINE as i32) {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, "opencv drawing failed, falling back to plain outlines");
            false
        }
    }
}

#[cfg(not(feature = "opencv"))]
fn draw_with_opencv(_image: &mut Array3<u8>, _outlines: &[Outline]) -> bool {
    false
}

/// Draws a box outline per player, colored by team. With the `opencv`
/// feature each box also gets its [`track_label`] above the top-left corner.
pub fn annotate_frame(image: &mut Array3<u8>, players: &[PlayerTrack]) {
    let (h, w, _) = image.dim();

    let outlines: Vec<Outline> = players
        .iter()
        .filter_map(|player| {
            let window = player.track.bbox.pixel_window(w, h)?;
            let color = player
                .team
                .and_then(|t| TEAM_COLORS.get(t as usize).copied())
                .unwrap_or(NO_TEAM_COLOR);

            Some(Outline {
                window,
                color,
                label: track_label(&player.track),
            })
        })
        .collect();

    if draw_with_opencv(image, &outlines) {
        return;
    }

    for Outline { window: (x1, y1, x2, y2), color, .. } in outlines {
        frame::paint_rect(image, x1, y1, x2, y1 + OUTLINE, color);
        frame::paint_rect(image, x1, y2.saturating_sub(OUTLINE), x2, y2, color);
        frame::paint_rect(image, x1, y1, x1 + OUTLINE, y2, color);
        frame::paint_rect(image, x2.saturating_sub(OUTLINE), y1, x2, y2, color);
    }
}
