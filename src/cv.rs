//! OpenCV backed image operations, built with the `opencv` feature.
//!
//! Images cross the boundary as `(H, W, 3)` BGR arrays and are copied into a
//! continuous `CV_8UC3` matrix. The caller keeps the `ndarray` rendition as
//! its fallback.

use ndarray::prelude::*;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};

use crate::error::Error;
use crate::pipeline::Outline;

const LABEL_SCALE: f64 = 0.5;
const LABEL_OFFSET: i32 = 5;

fn to_mat(image: ArrayView3<'_, u8>) -> Result<Mat, Error> {
    let (h, w, c) = image.dim();
    if c != 3 {
        return Err(Error::Geometry(format!("expected 3 channels, got {}", c)));
    }

    let mut mat = Mat::new_rows_cols_with_default(
        h as i32,
        w as i32,
        core::CV_8UC3,
        core::Scalar::all(0.0),
    )?;

    mat.data_bytes_mut()?
        .iter_mut()
        .zip(image.iter())
        .for_each(|(dst, src)| *dst = *src);

    Ok(mat)
}

#[inline]
fn scalar(bgr: [u8; 3]) -> core::Scalar {
    core::Scalar::new(bgr[0] as f64, bgr[1] as f64, bgr[2] as f64, 255.0)
}

/// Mean 8-bit L*a*b* color of a BGR region through `COLOR_BGR2Lab`.
pub fn mean_lab(region: ArrayView3<'_, u8>) -> Result<Option<[f64; 3]>, Error> {
    let (h, w, c) = region.dim();
    if h == 0 || w == 0 || c != 3 {
        return Ok(None);
    }

    let bgr = to_mat(region)?;
    let mut lab = Mat::default();
    imgproc::cvt_color(&bgr, &mut lab, imgproc::COLOR_BGR2Lab, 0)?;

    let mut sum = [0.0f64; 3];
    for pixel in lab.data_bytes()?.chunks_exact(3) {
        sum.iter_mut()
            .zip(pixel)
            .for_each(|(s, v)| *s += *v as f64);
    }

    let n = (h * w) as f64;
    Ok(Some(sum.map(|s| s / n)))
}

/// Draws every outline with its label above the top-left corner.
/// `image` is only written when all drawing succeeded.
pub fn draw_outlines(image: &mut Array3<u8>, outlines: &[Outline], thickness: i32) -> Result<(), Error> {
    let mut mat = to_mat(image.view())?;

    for outline in outlines {
        let (x1, y1, x2, y2) = outline.window;
        let color = scalar(outline.color);

        let rect = core::Rect::new(
            x1 as i32,
            y1 as i32,
            (x2 - x1) as i32,
            (y2 - y1) as i32,
        );

        imgproc::rectangle(&mut mat, rect, color, thickness, imgproc::LINE_8, 0)?;

        imgproc::put_text(
            &mut mat,
            &outline.label,
            core::Point::new(x1 as i32, y1 as i32 - LABEL_OFFSET),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_SCALE,
            color,
            1,
            imgproc::LINE_AA,
            false,
        )?;
    }

    image
        .iter_mut()
        .zip(mat.data_bytes()?)
        .for_each(|(dst, src)| *dst = *src);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;

    #[test]
    fn lab_mean_agrees_with_native_conversion() {
        let region = Array3::from_shape_fn((6, 4, 3), |(_, _, c)| [30u8, 60, 200][c]);

        let cv = mean_lab(region.view()).unwrap().unwrap();
        let native = color::bgr_to_lab([30, 60, 200]);

        for i in 0..3 {
            assert!((cv[i] - native[i]).abs() < 2.0, "{:?} vs {:?}", cv, native);
        }
    }

    #[test]
    fn labels_are_drawn_above_the_box() {
        let mut image = Array3::zeros((80, 80, 3));
        let outline = Outline {
            window: (10, 30, 40, 70),
            color: [0, 255, 0],
            label: "ID 7".to_string(),
        };

        draw_outlines(&mut image, &[outline], 2).unwrap();

        assert_eq!(image[[30, 20, 1]], 255);
        assert_eq!(image[[50, 25, 1]], 0);

        let label_ink = image.slice(s![10..28, 10..60, 1]).iter().filter(|v| **v > 0).count();
        assert!(label_ink > 0);
    }
}
