use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub class: i32,
}

impl Track {
    /// Bbox center in pixels
    #[inline]
    pub fn center(&self) -> na::Point2<f64> {
        let (x, y) = self.bbox.center();

        na::Point2::new(x as f64, y as f64)
    }
}
