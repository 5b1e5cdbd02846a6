//! Planar projective mapping between image pixels and pitch meters.
//!
//! The forward matrix maps pixel coordinates onto the pitch plane, the inverse
//! maps them back. Both are fixed by exactly four point correspondences.

use nalgebra as na;
use tracing::debug;

use crate::config::HomographyConfig;
use crate::error::Error;

const DEGENERATE_EPS: f64 = 1e-9;
const INFINITY_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Calibration {
    matrix: na::Matrix3<f64>,
    inverse: na::Matrix3<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct HomographyMapper {
    calibration: Option<Calibration>,
}

impl HomographyMapper {
    pub fn new() -> Self {
        Self { calibration: None }
    }

    /// Builds a mapper, calibrated when the config carries both reference point sets.
    pub fn from_config(config: &HomographyConfig) -> Result<Self, Error> {
        let mut mapper = Self::new();

        if let (Some(src), Some(dst)) = (
            config.reference_points_src.as_ref(),
            config.reference_points_dst.as_ref(),
        ) {
            let src: Vec<_> = src.iter().map(|&[x, y]| na::Point2::new(x, y)).collect();
            let dst: Vec<_> = dst.iter().map(|&[x, y]| na::Point2::new(x, y)).collect();
            mapper.compute(&src, &dst)?;
        }

        Ok(mapper)
    }

    pub fn compute(
        &mut self,
        src: &[na::Point2<f64>],
        dst: &[na::Point2<f64>],
    ) -> Result<(), Error> {
        if src.len() != 4 || dst.len() != 4 {
            return Err(Error::Geometry(format!(
                "exactly 4 source and 4 destination points are required, got {} and {}",
                src.len(),
                dst.len()
            )));
        }

        check_quad(src, "source")?;
        check_quad(dst, "destination")?;

        let matrix = solve_dlt(src, dst)?;
        let inverse = matrix
            .try_inverse()
            .ok_or_else(|| Error::Geometry("homography matrix is not invertible".into()))?;

        debug!(?matrix, "homography computed");

        self.calibration = Some(Calibration { matrix, inverse });

        Ok(())
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.calibration.is_some()
    }

    #[inline]
    pub fn matrix(&self) -> Option<&na::Matrix3<f64>> {
        self.calibration.as_ref().map(|c| &c.matrix)
    }

    #[inline]
    pub fn inverse(&self) -> Option<&na::Matrix3<f64>> {
        self.calibration.as_ref().map(|c| &c.inverse)
    }

    pub fn image_to_pitch(&self, point: na::Point2<f64>) -> Result<na::Point2<f64>, Error> {
        let calibration = self.calibration.as_ref().ok_or(Error::NotConfigured)?;

        apply(&calibration.matrix, point)
    }

    pub fn pitch_to_image(&self, point: na::Point2<f64>) -> Result<na::Point2<f64>, Error> {
        let calibration = self.calibration.as_ref().ok_or(Error::NotConfigured)?;

        apply(&calibration.inverse, point)
    }
}

fn apply(m: &na::Matrix3<f64>, p: na::Point2<f64>) -> Result<na::Point2<f64>, Error> {
    let v = m * p.to_homogeneous();

    if v.z.abs() < INFINITY_EPS {
        return Err(Error::Geometry(format!(
            "point ({}, {}) maps to infinity",
            p.x, p.y
        )));
    }

    Ok(na::Point2::new(v.x / v.z, v.y / v.z))
}

fn check_quad(points: &[na::Point2<f64>], name: &str) -> Result<(), Error> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::Geometry(format!("{} points must be finite", name)));
    }

    let extent = points
        .iter()
        .flat_map(|p| points.iter().map(move |q| na::distance(p, q)))
        .fold(0.0f64, f64::max);

    if extent <= DEGENERATE_EPS {
        return Err(Error::Geometry(format!("{} points coincide", name)));
    }

    // any three of the four points collinear => no unique homography
    for skip in 0..4 {
        let tri: Vec<_> = (0..4).filter(|&i| i != skip).map(|i| points[i]).collect();
        let cross = (tri[1] - tri[0]).perp(&(tri[2] - tri[0]));

        if cross.abs() <= DEGENERATE_EPS * extent * extent {
            return Err(Error::Geometry(format!(
                "{} points are degenerate (three are collinear)",
                name
            )));
        }
    }

    Ok(())
}

/// Direct linear transform with `h33 = 1`: two equations per correspondence.
fn solve_dlt(
    src: &[na::Point2<f64>],
    dst: &[na::Point2<f64>],
) -> Result<na::Matrix3<f64>, Error> {
    let mut a = na::SMatrix::<f64, 8, 8>::zeros();
    let mut b = na::SVector::<f64, 8>::zeros();

    for (i, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r = 2 * i;

        a.row_mut(r)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
        b[r] = u;
        b[r + 1] = v;
    }

    let h = a
        .lu()
        .solve(&b)
        .ok_or_else(|| Error::Geometry("point configuration is degenerate".into()))?;

    if h.iter().any(|v| !v.is_finite()) {
        return Err(Error::Geometry("point configuration is degenerate".into()));
    }

    Ok(na::Matrix3::new(
        h[0], h[1], h[2], //
        h[3], h[4], h[5], //
        h[6], h[7], 1.0,
    ))
}
