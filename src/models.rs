//! Planar projective transformation model.

use nalgebra::{Matrix3, Vector3};

use crate::types::Point2D;

/// Planar projective transformation represented by a 3x3 matrix.
///
/// Matrices produced by the solver are normalised so that `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// The identity transform, also returned as the "no estimate" sentinel.
    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn is_identity(&self) -> bool {
        self.h == Matrix3::identity()
    }

    /// Build from nine row-major values.
    pub fn from_row_major(values: &[f64; 9]) -> Self {
        Self::new(Matrix3::from_row_slice(values))
    }

    /// The nine matrix entries in row-major order.
    pub fn to_row_major(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for r in 0..3 {
            for c in 0..3 {
                out[3 * r + c] = self.h[(r, c)];
            }
        }
        out
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Divide by the bottom-right entry.
    ///
    /// Returns `None` if that entry is zero or the result is not finite.
    pub fn normalized(&self) -> Option<Self> {
        let scale = self.h[(2, 2)];
        if scale == 0.0 || !scale.is_finite() {
            return None;
        }
        let h = self.h / scale;
        if h.iter().all(|v| v.is_finite()) {
            Some(Self::new(h))
        } else {
            None
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().and_then(|inv| Self::new(inv).normalized())
    }

    /// Map `point` through the transform and dehomogenise.
    ///
    /// Returns `None` for points sent to infinity (w == 0) or non-finite results.
    pub fn project(&self, point: &Point2D) -> Option<Point2D> {
        let p = self.h * Vector3::new(point.x, point.y, 1.0);
        if p.z == 0.0 {
            return None;
        }
        let out = Point2D::new(p.x / p.z, p.y / p.z);
        if out.x.is_finite() && out.y.is_finite() {
            Some(out)
        } else {
            None
        }
    }

    /// Euclidean distance between the projection of `source` and `target`.
    ///
    /// Points that cannot be projected have infinite error.
    pub fn reprojection_error(&self, source: &Point2D, target: &Point2D) -> f64 {
        match self.project(source) {
            Some(p) => (p - *target).norm(),
            None => f64::INFINITY,
        }
    }

    /// Compare two homographies after normalising each to unit Frobenius norm
    /// with a consistent sign.
    pub fn approx_eq_up_to_scale(&self, other: &Homography, eps: f64) -> bool {
        let canonical = |m: &Matrix3<f64>| -> Option<Matrix3<f64>> {
            let norm = m.norm();
            if norm == 0.0 || !norm.is_finite() {
                return None;
            }
            let pivot = m
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            Some(m * (pivot.signum() / norm))
        };
        match (canonical(&self.h), canonical(&other.h)) {
            (Some(a), Some(b)) => (a - b).amax() < eps,
            _ => false,
        }
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}
