//! BGR to CIE L*a*b* conversion and jersey color features.
//!
//! Values follow the 8-bit convention used by common vision libraries:
//! `L` is scaled to `[0, 255]`, `a` and `b` are offset by 128.

use ndarray::prelude::*;
#[cfg(feature = "opencv")]
use tracing::debug;

use crate::bbox::{BBox, Ltrb};

/// Fraction of the bbox height, from the top, used as the jersey region.
pub const JERSEY_FRACTION: f32 = 0.4;

// D65 reference white
const XN: f64 = 0.950_456;
const ZN: f64 = 1.088_754;

#[inline]
fn srgb_to_linear(v: f64) -> f64 {
    if v <= 0.040_45 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

pub fn bgr_to_lab(bgr: [u8; 3]) -> [f64; 3] {
    let b = srgb_to_linear(bgr[0] as f64 / 255.0);
    let g = srgb_to_linear(bgr[1] as f64 / 255.0);
    let r = srgb_to_linear(bgr[2] as f64 / 255.0);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / XN;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / ZN;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));

    let l = if y > 0.008_856 {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };

    [
        l * 255.0 / 100.0,
        500.0 * (fx - fy) + 128.0,
        200.0 * (fy - fz) + 128.0,
    ]
}

#[cfg(feature = "opencv")]
fn opencv_mean_lab(region: ArrayView3<'_, u8>) -> Option<[f64; 3]> {
    match crate::cv::mean_lab(region) {
        Ok(lab) => lab,
        Err(err) => {
            debug!(error = %err, "opencv Lab conversion failed");
            None
        }
    }
}

#[cfg(not(feature = "opencv"))]
fn opencv_mean_lab(_region: ArrayView3<'_, u8>) -> Option<[f64; 3]> {
    None
}

/// Mean L*a*b* color of a BGR region, `None` when the region is empty.
/// Uses OpenCV when built with the `opencv` feature.
pub fn mean_lab(region: ArrayView3<'_, u8>) -> Option<[f64; 3]> {
    opencv_mean_lab(region).or_else(|| native_mean_lab(region))
}

fn native_mean_lab(region: ArrayView3<'_, u8>) -> Option<[f64; 3]> {
    let (h, w, c) = region.dim();
    if h == 0 || w == 0 || c < 3 {
        return None;
    }

    let mut sum = [0.0f64; 3];
    for pixel in region.lanes(Axis(2)) {
        let lab = bgr_to_lab([pixel[0], pixel[1], pixel[2]]);
        sum.iter_mut().zip(lab).for_each(|(s, v)| *s += v);
    }

    let n = (h * w) as f64;
    Some(sum.map(|s| s / n))
}

/// Mean color of the jersey region (upper part of the player's bbox).
pub fn jersey_feature(image: &Array3<u8>, bbox: &BBox<Ltrb>) -> Option<[f64; 3]> {
    let (h, w, _) = image.dim();
    let (x1, y1, x2, y2) = bbox.upper_part(JERSEY_FRACTION).pixel_window(w, h)?;

    mean_lab(image.slice(s![y1..y2, x1..x2, ..]))
}
