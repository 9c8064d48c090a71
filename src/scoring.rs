//! Inlier-count scoring.
//!
//! A correspondence is an inlier when its residual is strictly below the
//! threshold. NaN and infinite residuals never count.

use std::marker::PhantomData;

use crate::core::Scoring;
use crate::models::Homography;
use crate::types::CorrespondenceSet;

/// Support of a candidate model, ordered by inlier count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    pub inlier_count: usize,
}

impl Score {
    pub fn new(inlier_count: usize) -> Self {
        Self { inlier_count }
    }
}

/// Residual signature: `(data, model, correspondence_index) -> residual`.
pub type ResidualFn<M> = fn(&CorrespondenceSet, &M, usize) -> f64;

/// RANSAC-style scoring that counts inliers using a residual function.
pub struct InlierCountScoring<M, F>
where
    F: Fn(&CorrespondenceSet, &M, usize) -> f64,
{
    threshold: f64,
    residual_fn: F,
    _marker: PhantomData<fn(&M)>,
}

impl<M, F> InlierCountScoring<M, F>
where
    F: Fn(&CorrespondenceSet, &M, usize) -> f64,
{
    pub fn new(threshold: f64, residual_fn: F) -> Self {
        Self {
            threshold,
            residual_fn,
            _marker: PhantomData,
        }
    }
}

impl<M, F> Scoring<M> for InlierCountScoring<M, F>
where
    F: Fn(&CorrespondenceSet, &M, usize) -> f64,
{
    type Score = Score;

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, data: &CorrespondenceSet, model: &M, inliers_out: &mut Vec<usize>) -> Score {
        inliers_out.clear();
        for i in 0..data.len() {
            if (self.residual_fn)(data, model, i) < self.threshold {
                inliers_out.push(i);
            }
        }
        Score::new(inliers_out.len())
    }
}

/// Forward reprojection error of correspondence `index` under `model`.
pub fn reprojection_residual(data: &CorrespondenceSet, model: &Homography, index: usize) -> f64 {
    let (source, target) = data.pair(index);
    model.reprojection_error(source, target)
}

/// Scoring used by the homography search.
pub type ReprojectionScoring = InlierCountScoring<Homography, ResidualFn<Homography>>;

pub fn reprojection_scoring(threshold: f64) -> ReprojectionScoring {
    InlierCountScoring::new(threshold, reprojection_residual as ResidualFn<Homography>)
}

/// Indices of the correspondences `model` maps within `threshold`.
pub fn inliers_of(model: &Homography, data: &CorrespondenceSet, threshold: f64) -> Vec<usize> {
    let mut inliers = Vec::new();
    reprojection_scoring(threshold).score(data, model, &mut inliers);
    inliers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2D;

    fn set_with_offsets(offsets: &[f64]) -> CorrespondenceSet {
        let source: Vec<_> = (0..offsets.len())
            .map(|i| Point2D::new(i as f64, (i * i) as f64))
            .collect();
        let target = source
            .iter()
            .zip(offsets)
            .map(|(p, d)| Point2D::new(p.x + d, p.y))
            .collect();
        CorrespondenceSet::new(source, target).unwrap()
    }

    #[test]
    fn counts_strictly_below_threshold() {
        let data = set_with_offsets(&[0.1, 0.4, 0.6, 0.5, 0.3]);
        let scoring = reprojection_scoring(0.5);
        let mut inliers = Vec::new();
        let s = scoring.score(&data, &Homography::identity(), &mut inliers);

        assert_eq!(s.inlier_count, 3);
        assert_eq!(inliers, vec![0, 1, 4]);
    }

    #[test]
    fn larger_threshold_never_loses_inliers() {
        let data = set_with_offsets(&[0.0, 2.0, 7.5, 1.0, 30.0, 4.0, 0.25]);
        let h = Homography::identity();
        let mut last = 0;
        for t in [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0] {
            let count = inliers_of(&h, &data, t).len();
            assert!(count >= last);
            last = count;
        }
        assert_eq!(last, 7);
    }

    #[test]
    fn unprojectable_points_are_outliers() {
        let data = set_with_offsets(&[0.0, 0.0, 0.0, 0.0]);
        // w = x - 1 vanishes for the second source point (1, 1).
        let h = Homography::from_row_major(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0]);
        let inliers = inliers_of(&h, &data, f64::MAX);
        assert!(!inliers.contains(&1));
    }

    #[test]
    fn custom_residuals_plug_in() {
        let data = set_with_offsets(&[0.0; 6]);
        let scoring = InlierCountScoring::new(2.5, |_d: &CorrespondenceSet, _m: &(), i| i as f64);
        let mut inliers = Vec::new();
        assert_eq!(scoring.score(&data, &(), &mut inliers), Score::new(3));
    }
}
