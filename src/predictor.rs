use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::math::lerp;

/// Constant-velocity motion model over `(cx, cy, w, h)`, in pixels per frame.
#[derive(Debug, Clone)]
pub struct Predictor {
    state: na::Vector4<f32>,
    velocity: na::Vector4<f32>,
    smoothing: f32,
    has_velocity: bool,
}

#[inline]
fn to_state(bbox: &BBox<Ltrb>) -> na::Vector4<f32> {
    let c = bbox.as_xywh();
    na::Vector4::new(c.cx(), c.cy(), c.width(), c.height())
}

impl Predictor {
    /// `smoothing` is the weight of a new velocity observation, in `(0, 1]`.
    pub fn new(bbox: &BBox<Ltrb>, smoothing: f32) -> Self {
        Self {
            state: to_state(bbox),
            velocity: na::Vector4::zeros(),
            smoothing: smoothing.clamp(f32::EPSILON, 1.0),
            has_velocity: false,
        }
    }

    #[inline]
    pub fn velocity(&self) -> (f32, f32) {
        (self.velocity.x, self.velocity.y)
    }

    #[inline]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::xywh(self.state.x, self.state.y, self.state.z, self.state.w).as_ltrb()
    }

    /// Box expected `frames` frames after the last update.
    pub fn predict(&self, frames: u32) -> BBox<Ltrb> {
        let v = self.velocity * frames as f32;

        self.bbox().shifted(v.x, v.y, v.z, v.w)
    }

    pub fn update(&mut self, bbox: &BBox<Ltrb>, frames_elapsed: u32) {
        let next = to_state(bbox);
        let observed = (next - self.state) / frames_elapsed.max(1) as f32;

        if self.has_velocity {
            self.velocity = self
                .velocity
                .zip_map(&observed, |v, o| lerp(v, o, self.smoothing));
        } else {
            self.velocity = observed;
            self.has_velocity = true;
        }

        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_along_observed_motion() {
        let mut p = Predictor::new(&BBox::ltrb(0.0, 0.0, 10.0, 20.0), 0.5);
        assert_eq!(p.predict(3), BBox::ltrb(0.0, 0.0, 10.0, 20.0));

        p.update(&BBox::ltrb(4.0, 2.0, 14.0, 22.0), 1);
        assert_eq!(p.velocity(), (4.0, 2.0));

        let next = p.predict(2);
        assert_eq!(next.as_slice(), &[12.0, 6.0, 22.0, 26.0]);
    }

    #[test]
    fn velocity_is_per_frame_across_gaps() {
        let mut p = Predictor::new(&BBox::ltrb(0.0, 0.0, 10.0, 10.0), 1.0);
        p.update(&BBox::ltrb(9.0, 0.0, 19.0, 10.0), 3);

        assert_eq!(p.velocity(), (3.0, 0.0));
    }
}
