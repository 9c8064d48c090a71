//! Data-parallel evaluation of the sampling loop on the rayon pool.
//!
//! Iterations are independent apart from the best-so-far value, so each one
//! is computed in isolation and the candidates are folded with
//! [`better_candidate`]. Iteration `i` samples from its own generator seeded
//! with `derive_seed(seed, i)`, which makes the outcome independent of the
//! thread count and identical for equal seeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;

use crate::core::{better_candidate, Candidate, Estimator, Sampler, Scoring, SearchOutcome};
use crate::estimators::HomographyEstimator;
use crate::models::Homography;
use crate::samplers::UniformRandomSampler;
use crate::scoring::{reprojection_scoring, Score};
use crate::types::CorrespondenceSet;
use crate::utils::derive_seed;

/// Evaluate a single iteration: sample, solve, score.
///
/// Returns `None` when the sample is degenerate or no model has any support.
fn evaluate_iteration(
    data: &CorrespondenceSet,
    estimator: &HomographyEstimator,
    threshold: f64,
    seed: u64,
    iteration: usize,
) -> Option<Candidate<Homography, Score>> {
    let sample_size = estimator.sample_size();
    let mut sample = vec![0usize; sample_size];
    let mut sampler = UniformRandomSampler::from_seed(derive_seed(seed, iteration as u64));
    if !sampler.sample(data.len(), sample_size, &mut sample)
        || !estimator.is_valid_sample(data, &sample)
    {
        return None;
    }

    let scoring = reprojection_scoring(threshold);
    let mut inliers = Vec::new();
    estimator
        .estimate_model(data, &sample)
        .into_iter()
        .filter(|model| estimator.is_valid_model(model, data, &sample, threshold))
        .map(|model| {
            let score = scoring.score(data, &model, &mut inliers);
            Candidate {
                model,
                score,
                inliers: inliers.clone(),
                iteration,
            }
        })
        .filter(|candidate| candidate.score > Score::default())
        .reduce(better_candidate)
}

/// Parallel homography search over `iteration_count` iterations.
///
/// Iterations started after `time_limit` has elapsed are skipped.
pub fn search_parallel(
    data: &CorrespondenceSet,
    iteration_count: usize,
    threshold: f64,
    seed: u64,
    time_limit: Option<Duration>,
) -> SearchOutcome<Homography, Score> {
    let estimator = HomographyEstimator::new();
    let started = Instant::now();
    let skipped = AtomicUsize::new(0);
    let degenerate = AtomicUsize::new(0);

    let best = (0..iteration_count)
        .into_par_iter()
        .filter_map(|iteration| {
            if time_limit.is_some_and(|limit| started.elapsed() >= limit) {
                skipped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            let candidate = evaluate_iteration(data, &estimator, threshold, seed, iteration);
            if candidate.is_none() {
                degenerate.fetch_add(1, Ordering::Relaxed);
            }
            candidate
        })
        .reduce_with(better_candidate);

    let skipped = skipped.into_inner();
    let outcome = SearchOutcome {
        best,
        iterations: iteration_count - skipped,
        degenerate_samples: degenerate.into_inner(),
        timed_out: skipped > 0,
    };
    debug!(
        iterations = outcome.iterations,
        degenerate_samples = outcome.degenerate_samples,
        found = outcome.best.is_some(),
        "parallel consensus search finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2D;

    fn scene() -> CorrespondenceSet {
        let truth = Homography::from_row_major(&[0.8, 0.1, 12.0, -0.2, 1.1, 3.0, 3e-4, -2e-4, 1.0]);
        let mut source = Vec::new();
        let mut target = Vec::new();
        for i in 0..30 {
            let p = Point2D::new((i * 13 % 97) as f64 * 3.0, (i * 29 % 89) as f64 * 2.5);
            let q = truth.project(&p).unwrap();
            source.push(p);
            // Every fourth pair is a gross outlier.
            if i % 4 == 3 {
                target.push(Point2D::new(q.y + 150.0, q.x - 90.0));
            } else {
                target.push(q);
            }
        }
        CorrespondenceSet::new(source, target).unwrap()
    }

    #[test]
    fn same_seed_gives_same_result() {
        let data = scene();
        let a = search_parallel(&data, 200, 1.0, 17, None);
        let b = search_parallel(&data, 200, 1.0, 17, None);
        let (a, b) = (a.best.unwrap(), b.best.unwrap());
        assert_eq!(a.iteration, b.iteration);
        assert_eq!(a.model, b.model);
        assert_eq!(a.inliers, b.inliers);
    }

    #[test]
    fn finds_all_inliers() {
        let data = scene();
        let outcome = search_parallel(&data, 300, 1.0, 5, None);
        assert_eq!(outcome.iterations, 300);
        assert!(!outcome.timed_out);
        let best = outcome.best.unwrap();
        assert_eq!(best.score.inlier_count, 23);
        assert!(best.inliers.iter().all(|i| i % 4 != 3));
    }

    #[test]
    fn matches_sequential_evaluation_of_each_iteration() {
        let data = scene();
        let estimator = HomographyEstimator::new();
        let sequential = (0..100)
            .filter_map(|i| evaluate_iteration(&data, &estimator, 1.0, 3, i))
            .reduce(better_candidate)
            .unwrap();
        let parallel = search_parallel(&data, 100, 1.0, 3, None).best.unwrap();
        assert_eq!(sequential.iteration, parallel.iteration);
        assert_eq!(sequential.score, parallel.score);
    }

    #[test]
    fn zero_time_limit_skips_everything() {
        let outcome = search_parallel(&scene(), 50, 1.0, 1, Some(Duration::ZERO));
        assert!(outcome.best.is_none());
        assert!(outcome.timed_out);
        assert_eq!(outcome.iterations, 0);
    }
}
