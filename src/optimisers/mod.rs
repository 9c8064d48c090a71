//! Refinement of the winning hypothesis on its consensus set.

use crate::core::{Estimator, LocalOptimizer, Scoring};
use crate::types::CorrespondenceSet;

/// Iterated least-squares refit on the inlier set.
///
/// Each round refits the model on the current inliers and rescores it. A
/// refit is kept only if it scores at least as well; rounds stop once the
/// inlier set stops growing.
pub struct LeastSquaresOptimizer<E, Sc> {
    estimator: E,
    scoring: Sc,
    max_iterations: usize,
}

impl<E, Sc> LeastSquaresOptimizer<E, Sc>
where
    E: Estimator,
    Sc: Scoring<E::Model>,
{
    pub fn new(estimator: E, scoring: Sc) -> Self {
        Self {
            estimator,
            scoring,
            max_iterations: 10,
        }
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }
}

impl<E, Sc> LocalOptimizer<E::Model, Sc::Score> for LeastSquaresOptimizer<E, Sc>
where
    E: Estimator,
    Sc: Scoring<E::Model>,
{
    fn run(
        &mut self,
        data: &CorrespondenceSet,
        inliers: &[usize],
        model: &E::Model,
        best_score: &Sc::Score,
    ) -> (E::Model, Sc::Score, Vec<usize>) {
        let mut model = model.clone();
        let mut score = best_score.clone();
        let mut inliers = inliers.to_vec();
        let mut refit_inliers = Vec::new();
        let threshold = self.scoring.threshold();

        for _ in 0..self.max_iterations {
            if inliers.len() < self.estimator.sample_size() {
                break;
            }
            let Some(refit) = self.estimator.estimate_model(data, &inliers).into_iter().next() else {
                break;
            };
            if !self.estimator.is_valid_model(&refit, data, &inliers, threshold) {
                break;
            }
            let refit_score = self.scoring.score(data, &refit, &mut refit_inliers);
            if refit_score < score {
                break;
            }
            let grew = refit_score > score;
            model = refit;
            score = refit_score;
            std::mem::swap(&mut inliers, &mut refit_inliers);
            if !grew {
                break;
            }
        }

        (model, score, inliers)
    }
}
