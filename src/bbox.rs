use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BBox<F: BBoxFormat + Serialize + Deserialize<'static> + PartialEq>(
    [f32; 4],
    PhantomData<F>,
);

impl<F: BBoxFormat + Serialize + Deserialize<'static> + PartialEq> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox([x1, y1, x2, y2], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.0[0] + self.0[2]) / 2.0,
            (self.0[1] + self.0[3]) / 2.0,
        )
    }

    /// `x1 < x2`, `y1 < y2` and every coordinate finite.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.0[0] < self.0[2] && self.0[1] < self.0[3]
    }

    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let i_l = self.left().max(other.left());
        let i_t = self.top().max(other.top());
        let i_r = self.right().min(other.right());
        let i_b = self.bottom().min(other.bottom());
        let i_area = (i_r - i_l).max(0.) * (i_b - i_t).max(0.);

        let union = self.area() + other.area() - i_area;
        if union <= f32::EPSILON {
            return 0.0;
        }

        i_area / union
    }

    /// Top `fraction` of the box height, same horizontal extent.
    #[inline]
    pub fn upper_part(&self, fraction: f32) -> BBox<Ltrb> {
        BBox::ltrb(
            self.left(),
            self.top(),
            self.right(),
            self.top() + self.height() * fraction,
        )
    }

    /// Integer pixel window `(x1, y1, x2, y2)` clipped to an image of `width` x `height`,
    /// `None` when nothing is left.
    pub fn pixel_window(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        if !self.is_finite() {
            return None;
        }

        let clip = |v: f32, max: usize| (v.max(0.0) as usize).min(max);

        let x1 = clip(self.left(), width);
        let y1 = clip(self.top(), height);
        let x2 = clip(self.right(), width);
        let y2 = clip(self.bottom(), height);

        if x1 < x2 && y1 < y2 {
            Some((x1, y1, x2, y2))
        } else {
            None
        }
    }

    /// Moves the box by `(dx, dy)` and rescales it around its center.
    pub fn shifted(&self, dx: f32, dy: f32, dw: f32, dh: f32) -> BBox<Ltrb> {
        let (cx, cy) = self.center();
        let w = (self.width() + dw).max(1.0);
        let h = (self.height() + dh).max(1.0);

        BBox::ltrb(
            cx + dx - w / 2.0,
            cy + dy - h / 2.0,
            cx + dx + w / 2.0,
            cy + dy + h / 2.0,
        )
    }

    #[inline]
    pub fn as_xywh(&self) -> BBox<Xywh> {
        self.into()
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        BBox([cx, cy, w, h], Default::default())
    }

    #[inline(always)]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Xywh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [
                (v.0[0] + v.0[2]) / 2.0,
                (v.0[1] + v.0[3]) / 2.0,
                v.0[2] - v.0[0],
                v.0[3] - v.0[1],
            ],
            Default::default(),
        )
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        Self(
            [
                v.0[0] - v.0[2] / 2.,
                v.0[1] - v.0[3] / 2.,
                v.0[0] + v.0[2] / 2.,
                v.0[1] + v.0[3] / 2.,
            ],
            Default::default(),
        )
    }
}
