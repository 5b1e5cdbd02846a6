use crate::config::DetectionConfig;
use crate::detection::{Detection, DetectionBatch};
use crate::error::Error;
use crate::frame::VideoFrame;

/// Object detector collaborator: one call per frame, boxes in pixels.
pub trait Detector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<DetectionBatch, Error>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    #[inline]
    fn detect(&mut self, frame: &VideoFrame) -> Result<DetectionBatch, Error> {
        (**self).detect(frame)
    }
}

pub struct DetectorConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub classes: Vec<i32>,
}

impl DetectorConfig {
    pub fn new(confidence_threshold: f32, classes: Vec<i32>) -> Self {
        Self {
            confidence_threshold,
            iou_threshold: 0.45,
            classes,
        }
    }
}

impl From<&DetectionConfig> for DetectorConfig {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            confidence_threshold: config.conf_threshold,
            iou_threshold: config.iou_threshold,
            classes: config.classes(),
        }
    }
}

/// Post-processing for raw model output: confidence and class filter, then
/// per-class non-maximum suppression. Order follows descending confidence.
pub fn postprocess(raw: &[Detection], config: &DetectorConfig) -> DetectionBatch {
    let mut by_class: Vec<(i32, Vec<Detection>)> = Vec::new();

    for det in raw {
        if det.confidence < config.confidence_threshold || !config.classes.contains(&det.class) {
            continue;
        }

        match by_class.iter_mut().find(|(c, _)| *c == det.class) {
            Some((_, dets)) => dets.push(*det),
            None => by_class.push((det.class, vec![*det])),
        }
    }

    let mut results = Vec::new();
    for (_, mut dets) in by_class {
        let keep = non_maximum_supression(&mut dets, config.iou_threshold);
        results.extend(
            dets.into_iter()
                .zip(keep)
                .filter_map(|(det, keep)| if keep { Some(det) } else { None }),
        );
    }

    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    DetectionBatch::from_detections(&results)
}

fn non_maximum_supression(dets: &mut [Detection], iou_threshold: f32) -> Vec<bool> {
    dets.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut retain = vec![true; dets.len()];
    for idx in 0..dets.len() {
        if !retain[idx] {
            continue;
        }

        for other in idx + 1..dets.len() {
            if retain[other] && dets[idx].iou(&dets[other]) > iou_threshold {
                retain[other] = false;
            }
        }
    }

    retain
}
