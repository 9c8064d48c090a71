//! Core shared types: points and the correspondence set the search reads.

use nalgebra::{DMatrix, Point2};

use crate::error::{EstimationError, Result};

/// A 2D point in image coordinates.
pub type Point2D = Point2<f64>;

/// Minimum number of correspondences needed to determine a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Two parallel point sequences where `source[i]` corresponds to `target[i]`.
///
/// The set is validated on construction and never mutated afterwards:
/// both sides have the same length, there are at least four pairs, and every
/// coordinate is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceSet {
    source: Vec<Point2D>,
    target: Vec<Point2D>,
}

impl CorrespondenceSet {
    pub fn new(source: Vec<Point2D>, target: Vec<Point2D>) -> Result<Self> {
        if source.len() != target.len() {
            return Err(EstimationError::LengthMismatch {
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        if source.len() < MIN_CORRESPONDENCES {
            return Err(EstimationError::InsufficientCorrespondences { got: source.len() });
        }
        if let Some(index) = source
            .iter()
            .zip(target.iter())
            .position(|(s, t)| !s.coords.iter().chain(t.coords.iter()).all(|v| v.is_finite()))
        {
            return Err(EstimationError::NonFiniteCoordinate { index });
        }
        Ok(Self { source, target })
    }

    /// Build from `(source, target)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Point2D, Point2D)>,
    {
        let (source, target): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::new(source, target)
    }

    /// Build from two Nx2 matrices, one row per point.
    pub fn from_matrices(points1: &DMatrix<f64>, points2: &DMatrix<f64>) -> Result<Self> {
        if points1.ncols() != 2 || points2.ncols() != 2 {
            return Err(EstimationError::InvalidInput(
                "points must be Nx2 matrices".to_string(),
            ));
        }
        let rows = |m: &DMatrix<f64>| -> Vec<Point2D> {
            m.row_iter().map(|r| Point2D::new(r[0], r[1])).collect()
        };
        Self::new(rows(points1), rows(points2))
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Always `false` for a validated set; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source(&self) -> &[Point2D] {
        &self.source
    }

    pub fn target(&self) -> &[Point2D] {
        &self.target
    }

    pub fn pair(&self, index: usize) -> (&Point2D, &Point2D) {
        (&self.source[index], &self.target[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point2D, &Point2D)> + '_ {
        self.source.iter().zip(self.target.iter())
    }

    /// Gather the pairs at `indices`, in order.
    pub fn select(&self, indices: &[usize]) -> (Vec<Point2D>, Vec<Point2D>) {
        indices
            .iter()
            .map(|&i| (self.source[i], self.target[i]))
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(0.0, 1.0),
        ]
    }

    #[test]
    fn rejects_fewer_than_four_pairs() {
        let pts = square()[..3].to_vec();
        let err = CorrespondenceSet::new(pts.clone(), pts).unwrap_err();
        assert!(matches!(
            err,
            EstimationError::InsufficientCorrespondences { got: 3 }
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut target = square();
        target.push(Point2D::new(2.0, 2.0));
        let err = CorrespondenceSet::new(square(), target).unwrap_err();
        assert!(matches!(
            err,
            EstimationError::LengthMismatch {
                source_len: 4,
                target_len: 5
            }
        ));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let mut target = square();
        target[2] = Point2D::new(f64::NAN, 1.0);
        let err = CorrespondenceSet::new(square(), target).unwrap_err();
        assert!(matches!(err, EstimationError::NonFiniteCoordinate { index: 2 }));
    }

    #[test]
    fn select_gathers_pairs_in_order() {
        let target: Vec<_> = square().iter().map(|p| Point2D::new(p.x * 2.0, p.y * 2.0)).collect();
        let set = CorrespondenceSet::new(square(), target).unwrap();
        let (s, t) = set.select(&[2, 0]);
        assert_eq!(s, vec![Point2D::new(1.0, 1.0), Point2D::new(0.0, 0.0)]);
        assert_eq!(t, vec![Point2D::new(2.0, 2.0), Point2D::new(0.0, 0.0)]);
    }

    #[test]
    fn from_pairs_keeps_pair_order() {
        let pairs: Vec<_> = square()
            .into_iter()
            .map(|p| (p, Point2D::new(p.y, p.x)))
            .collect();
        let set = CorrespondenceSet::from_pairs(pairs.clone()).unwrap();
        let back: Vec<_> = set.iter().map(|(s, t)| (*s, *t)).collect();
        assert_eq!(back, pairs);
        assert!(matches!(
            CorrespondenceSet::from_pairs(pairs.into_iter().take(2)),
            Err(EstimationError::InsufficientCorrespondences { got: 2 })
        ));
    }

    #[test]
    fn from_matrices_reads_rows() {
        let p1 = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let p2 = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 2.0, 1.0, 2.0, 2.0, 1.0, 2.0]);
        let set = CorrespondenceSet::from_matrices(&p1, &p2).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.pair(1), (&Point2D::new(1.0, 0.0), &Point2D::new(2.0, 1.0)));
    }
}
