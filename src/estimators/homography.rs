//! Homography estimation via the Direct Linear Transform.
//!
//! [`compute_homography`] solves the minimal four-point problem exactly as the
//! DLT prescribes: two rows per correspondence, null vector of the system from
//! the SVD, then division by the bottom-right entry. [`fit_homography`] is the
//! over-determined variant with Hartley conditioning, used to refit a model on
//! its inliers.

use nalgebra::{DMatrix, Matrix3};
use tracing::trace;

use crate::core::Estimator;
use crate::error::{DegeneracyKind, EstimationError, Result};
use crate::models::Homography;
use crate::types::{CorrespondenceSet, Point2D, MIN_CORRESPONDENCES};

/// Twice the triangle area below this fraction of the squared edge lengths
/// counts as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-9;
/// Second-smallest singular value below this fraction of the largest means
/// the null space is not one-dimensional.
const RANK_TOLERANCE: f64 = 1e-12;
/// `|h[(2, 2)]|` at or below this fraction of the Frobenius norm is treated
/// as zero.
const ZERO_SCALE_TOLERANCE: f64 = 1e-10;

/// `true` if any three of `points` lie on a common line (or coincide).
pub fn has_collinear_triplet(points: &[Point2D]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let ab = points[j] - points[i];
                let ac = points[k] - points[i];
                let cross = ab.x * ac.y - ab.y * ac.x;
                let scale = ab.norm_squared().max(ac.norm_squared());
                if cross.abs() <= COLLINEAR_TOLERANCE * scale {
                    return true;
                }
            }
        }
    }
    false
}

/// Append the two DLT rows of `(source, target)` at row `r`.
fn fill_dlt_rows(a: &mut DMatrix<f64>, r: usize, source: &Point2D, target: &Point2D) {
    let (x, y) = (source.x, source.y);
    let (x_t, y_t) = (target.x, target.y);

    a[(r, 0)] = -x;
    a[(r, 1)] = -y;
    a[(r, 2)] = -1.0;
    a[(r, 6)] = x * x_t;
    a[(r, 7)] = y * x_t;
    a[(r, 8)] = x_t;

    a[(r + 1, 3)] = -x;
    a[(r + 1, 4)] = -y;
    a[(r + 1, 5)] = -1.0;
    a[(r + 1, 6)] = x * y_t;
    a[(r + 1, 7)] = y * y_t;
    a[(r + 1, 8)] = y_t;
}

/// Right singular vector of the smallest singular value, reshaped to 3x3.
///
/// `a` must have at least nine rows so the full right singular basis is
/// available; callers pad with zero rows, which leaves `AᵀA` unchanged.
fn null_vector(a: DMatrix<f64>) -> Result<Matrix3<f64>> {
    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(EstimationError::SvdFailed)?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));
    let largest = svd.singular_values[order[order.len() - 1]];
    let second_smallest = svd.singular_values[order[1]];
    if !largest.is_finite() || second_smallest <= RANK_TOLERANCE * largest {
        return Err(EstimationError::DegenerateSample(DegeneracyKind::RankDeficient));
    }

    let h = v_t.row(order[0]);
    let mut h_mat = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            h_mat[(r, c)] = h[3 * r + c];
        }
    }
    Ok(h_mat)
}

/// Fix the homogeneous scale by dividing by `h[(2, 2)]`.
///
/// The SVD never returns an exact zero, so the entry counts as zero when
/// `|h[(2, 2)]| <= 1e-10 * ||h||_F`. Such a candidate is discarded rather than
/// rescaled some other way. Only transforms whose translation exceeds about
/// `1e10` times their linear part fall under this rule.
fn normalize_scale(h: Matrix3<f64>) -> Result<Homography> {
    if h.iter().any(|v| !v.is_finite()) {
        return Err(EstimationError::DegenerateSample(DegeneracyKind::NonFinite));
    }
    if h[(2, 2)].abs() <= ZERO_SCALE_TOLERANCE * h.norm() {
        return Err(EstimationError::DegenerateSample(DegeneracyKind::ZeroScale));
    }
    Homography::new(h)
        .normalized()
        .ok_or(EstimationError::DegenerateSample(DegeneracyKind::NonFinite))
}

/// Exact homography mapping four source points onto four target points.
///
/// Fails with [`EstimationError::DegenerateSample`] when three points on
/// either side are collinear, when the DLT system does not have a
/// one-dimensional null space, or when the solution cannot be normalised.
pub fn compute_homography(source: &[Point2D; 4], target: &[Point2D; 4]) -> Result<Homography> {
    if has_collinear_triplet(source) || has_collinear_triplet(target) {
        return Err(EstimationError::DegenerateSample(DegeneracyKind::Collinear));
    }

    // 8x9 system padded with a zero row.
    let mut a = DMatrix::<f64>::zeros(9, 9);
    for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
        fill_dlt_rows(&mut a, 2 * i, s, t);
    }

    normalize_scale(null_vector(a)?)
}

/// Translate the centroid to the origin and scale the mean distance to √2.
fn conditioning_transform(points: &[Point2D]) -> Matrix3<f64> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > f64::EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn apply(t: &Matrix3<f64>, p: &Point2D) -> Point2D {
    // Conditioning transforms are affine, so w stays 1.
    Point2D::new(
        t[(0, 0)] * p.x + t[(0, 1)] * p.y + t[(0, 2)],
        t[(1, 0)] * p.x + t[(1, 1)] * p.y + t[(1, 2)],
    )
}

/// Least-squares homography over four or more correspondences.
pub fn fit_homography(source: &[Point2D], target: &[Point2D]) -> Result<Homography> {
    let n = source.len();
    if target.len() != n {
        return Err(EstimationError::LengthMismatch {
            source_len: n,
            target_len: target.len(),
        });
    }
    if n < MIN_CORRESPONDENCES {
        return Err(EstimationError::InsufficientCorrespondences { got: n });
    }

    let t_src = conditioning_transform(source);
    let t_dst = conditioning_transform(target);

    let mut a = DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
        fill_dlt_rows(&mut a, 2 * i, &apply(&t_src, s), &apply(&t_dst, t));
    }

    let h_norm = null_vector(a)?;
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or(EstimationError::DegenerateSample(DegeneracyKind::RankDeficient))?;
    normalize_scale(t_dst_inv * h_norm * t_src)
}

/// Four-point homography estimator for the consensus search.
#[derive(Debug, Default, Clone, Copy)]
pub struct HomographyEstimator;

impl HomographyEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl Estimator for HomographyEstimator {
    type Model = Homography;

    fn sample_size(&self) -> usize {
        MIN_CORRESPONDENCES
    }

    fn is_valid_sample(&self, data: &CorrespondenceSet, sample: &[usize]) -> bool {
        if sample.len() < self.sample_size() || sample.iter().any(|&i| i >= data.len()) {
            return false;
        }
        for i in 0..sample.len() {
            for j in (i + 1)..sample.len() {
                if sample[i] == sample[j] {
                    return false;
                }
            }
        }
        true
    }

    fn estimate_model(&self, data: &CorrespondenceSet, sample: &[usize]) -> Vec<Homography> {
        let (source, target) = data.select(sample);
        let minimal = (
            <[Point2D; 4]>::try_from(source.as_slice()),
            <[Point2D; 4]>::try_from(target.as_slice()),
        );
        let result = match minimal {
            (Ok(s), Ok(t)) => compute_homography(&s, &t),
            _ => fit_homography(&source, &target),
        };
        match result {
            Ok(h) => vec![h],
            Err(err) => {
                trace!(?sample, %err, "sample rejected");
                Vec::new()
            }
        }
    }

    fn is_valid_model(
        &self,
        model: &Homography,
        _data: &CorrespondenceSet,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        // Near-singular samples are rejected earlier by the collinearity and
        // rank checks, so only exact singularity is left to catch.
        let det = model.h.determinant();
        det.is_finite() && det != 0.0
    }
}
