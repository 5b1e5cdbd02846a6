use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;

/// A single candidate object, corners in pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class: i32) -> Self {
        Self {
            bbox: BBox::ltrb(x1, y1, x2, y2),
            confidence,
            class,
        }
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.bbox.is_valid() && self.confidence.is_finite()
    }
}

/// Raw detector output for one frame: `boxes[N, 4]` as `x1, y1, x2, y2`,
/// `confidence[N]` and `class_id[N]`.
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
    pub boxes: Array2<f32>,
    pub confidence: Array1<f32>,
    pub class_id: Array1<i32>,
}

impl DetectionBatch {
    pub fn new(boxes: Array2<f32>, confidence: Array1<f32>, class_id: Array1<i32>) -> Self {
        Self {
            boxes,
            confidence,
            class_id,
        }
    }

    pub fn empty() -> Self {
        Self {
            boxes: Array2::zeros((0, 4)),
            confidence: Array1::zeros(0),
            class_id: Array1::zeros(0),
        }
    }

    pub fn from_detections(dets: &[Detection]) -> Self {
        let mut boxes = Array2::zeros((dets.len(), 4));
        for (mut row, det) in boxes.axis_iter_mut(Axis(0)).zip(dets) {
            row.assign(&aview1(det.bbox.as_slice()));
        }

        Self {
            boxes,
            confidence: dets.iter().map(|d| d.confidence).collect(),
            class_id: dets.iter().map(|d| d.class).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.confidence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.confidence.is_empty()
    }

    pub fn to_detections(&self) -> Result<Vec<Detection>, Error> {
        let n = self.boxes.nrows();

        if self.boxes.ncols() != 4 && n > 0 {
            return Err(Error::InvalidDetections(format!(
                "expected boxes of shape [N, 4], got [{}, {}]",
                n,
                self.boxes.ncols()
            )));
        }

        if self.confidence.len() != n || self.class_id.len() != n {
            return Err(Error::InvalidDetections(format!(
                "length mismatch: {} boxes, {} confidences, {} class ids",
                n,
                self.confidence.len(),
                self.class_id.len()
            )));
        }

        Ok(self
            .boxes
            .axis_iter(Axis(0))
            .zip(self.confidence.iter())
            .zip(self.class_id.iter())
            .map(|((row, &confidence), &class)| {
                Detection::new(row[0], row[1], row[2], row[3], confidence, class)
            })
            .collect())
    }
}
