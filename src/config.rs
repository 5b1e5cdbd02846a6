use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::rating::{RatingDefaults, RatingWeights};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub model_path: String,
    pub device: String,
    /// label -> detector class id; only these classes reach the tracker
    pub class_map: BTreeMap<String, i32>,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let class_map = [("player", 0), ("ball", 32), ("referee", 0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            model_path: "yolov8n.pt".into(),
            device: "cpu".into(),
            class_map,
            conf_threshold: 0.3,
            iou_threshold: 0.45,
        }
    }
}

impl DetectionConfig {
    /// Distinct class ids named by the class map.
    pub fn classes(&self) -> Vec<i32> {
        let mut classes: Vec<i32> = self.class_map.values().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// detections at or above this confidence start tracks and match first
    pub track_thresh: f32,
    /// detections below this confidence are ignored
    pub low_thresh: f32,
    /// largest accepted `1 - IoU` association cost
    pub match_thresh: f32,
    /// frames a confirmed track survives without a match
    pub track_buffer: u32,
    /// matches needed before a candidate gets an id
    pub min_hits: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.4,
            low_thresh: 0.1,
            match_thresh: 0.9,
            track_buffer: 30,
            min_hits: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HomographyConfig {
    pub pitch_width_m: f64,
    pub pitch_height_m: f64,
    pub reference_points_src: Option<Vec<[f64; 2]>>,
    pub reference_points_dst: Option<Vec<[f64; 2]>>,
}

impl Default for HomographyConfig {
    fn default() -> Self {
        Self {
            pitch_width_m: 68.0,
            pitch_height_m: 105.0,
            reference_points_src: None,
            reference_points_dst: None,
        }
    }
}

impl HomographyConfig {
    /// Pitch corners in meters, clockwise from the top-left, origin at the top-left corner.
    pub fn pitch_corners(&self) -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [self.pitch_width_m, 0.0],
            [self.pitch_width_m, self.pitch_height_m],
            [0.0, self.pitch_height_m],
        ]
    }

    /// Calibrates against the full pitch from four clicked image corners.
    pub fn with_image_corners(mut self, corners: [[f64; 2]; 4]) -> Self {
        self.reference_points_dst = Some(self.pitch_corners());
        self.reference_points_src = Some(corners.to_vec());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TeamClassifierConfig {
    /// samples collected before the one-shot fit
    pub max_samples: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub person_classes: Vec<i32>,
}

impl Default for TeamClassifierConfig {
    fn default() -> Self {
        Self {
            max_samples: 200,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 0,
            person_classes: vec![0, 1],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// lower bound for the time step used in speed computation
    pub min_dt_s: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { min_dt_s: 1e-6 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EventScannerConfig {
    /// frames per classified clip
    pub num_frames: usize,
    /// classify on every frame index divisible by this
    pub stride: u64,
    /// minimum confidence of the best label to report an event
    pub threshold: f32,
    pub fps: f64,
}

impl Default for EventScannerConfig {
    fn default() -> Self {
        Self {
            num_frames: 16,
            stride: 8,
            threshold: 0.6,
            fps: 25.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct RatingConfig {
    pub weights: RatingWeights,
    pub defaults: RatingDefaults,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputPaths {
    pub output_dir: PathBuf,
    pub metrics_file: String,
    pub ratings_file: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            metrics_file: "player_metrics.json".into(),
            ratings_file: "player_ratings.json".into(),
        }
    }
}

impl OutputPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: dir.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn metrics_json(&self) -> PathBuf {
        self.output_dir.join(&self.metrics_file)
    }

    #[inline]
    pub fn ratings_json(&self) -> PathBuf {
        self.output_dir.join(&self.ratings_file)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub homography: HomographyConfig,
    pub team: TeamClassifierConfig,
    pub metrics: MetricsConfig,
    pub events: EventScannerConfig,
    pub rating: RatingConfig,
    pub paths: OutputPaths,
    /// use raw pixel centers when the homography is not calibrated
    pub allow_pixel_fallback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            tracking: TrackingConfig::default(),
            homography: HomographyConfig::default(),
            team: TeamClassifierConfig::default(),
            metrics: MetricsConfig::default(),
            events: EventScannerConfig::default(),
            rating: RatingConfig::default(),
            paths: OutputPaths::default(),
            allow_pixel_fallback: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)?;

        Self::from_json_str(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "tracking": { "track_buffer": 60 }, "allow_pixel_fallback": false }"#,
        )
        .unwrap();

        assert_eq!(config.tracking.track_buffer, 60);
        assert_eq!(config.tracking.track_thresh, 0.4);
        assert_eq!(config.team.max_samples, 200);
        assert!(!config.allow_pixel_fallback);
    }

    #[test]
    fn detection_classes_are_deduplicated() {
        assert_eq!(DetectionConfig::default().classes(), vec![0, 32]);
    }

    #[test]
    fn image_corners_pair_with_pitch_corners() {
        let config = HomographyConfig::default().with_image_corners([
            [10.0, 10.0],
            [600.0, 12.0],
            [630.0, 400.0],
            [5.0, 390.0],
        ]);

        assert_eq!(
            config.reference_points_dst.unwrap()[2],
            [68.0, 105.0]
        );
        assert_eq!(config.reference_points_src.unwrap().len(), 4);
    }

    #[test]
    fn output_paths() {
        let paths = OutputPaths::in_dir("/tmp/run");
        assert_eq!(paths.metrics_json(), PathBuf::from("/tmp/run/player_metrics.json"));
        assert_eq!(paths.ratings_json(), PathBuf::from("/tmp/run/player_ratings.json"));
    }
}
