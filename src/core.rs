//! Core traits and the consensus search loop.
//!
//! The search is assembled from small pluggable parts:
//! - [`Estimator`] turns a minimal sample into candidate models,
//! - [`Sampler`] draws minimal samples of correspondence indices,
//! - [`Scoring`] counts the support of a candidate,
//! - [`TerminationCriterion`] may shrink the iteration budget,
//! - [`LocalOptimizer`] optionally polishes the winner once the loop ends.
//!
//! [`ConsensusSearch`] wires them together. The best-so-far state lives in an
//! explicit [`Candidate`] accumulator owned by a single `run` call.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::types::CorrespondenceSet;

/// Estimator responsible for generating model hypotheses from minimal samples.
pub trait Estimator {
    /// Model type produced by this estimator.
    type Model: Clone;

    /// Size of a minimal sample for this estimator.
    fn sample_size(&self) -> usize;

    /// Check whether a given sample can be handed to `estimate_model`.
    fn is_valid_sample(&self, data: &CorrespondenceSet, sample: &[usize]) -> bool;

    /// Estimate candidate models from a sample. An empty vector means the
    /// sample was degenerate.
    fn estimate_model(&self, data: &CorrespondenceSet, sample: &[usize]) -> Vec<Self::Model>;

    /// Validate a candidate model before scoring.
    fn is_valid_model(
        &self,
        model: &Self::Model,
        data: &CorrespondenceSet,
        sample: &[usize],
        threshold: f64,
    ) -> bool;
}

/// Sampler responsible for drawing minimal samples.
pub trait Sampler {
    /// Draw `sample_size` distinct indices from `[0, point_count)` into
    /// `out_indices`.
    ///
    /// Returns `false` if a valid sample could not be drawn.
    fn sample(&mut self, point_count: usize, sample_size: usize, out_indices: &mut [usize]) -> bool;

    /// Feedback after an iteration; stateless samplers ignore it.
    fn update(&mut self, _sample: &[usize], _iteration: usize) {}
}

/// Scoring strategy used to evaluate model quality and determine inliers.
pub trait Scoring<M> {
    /// Score type; larger is better. `Default` is the score of a model with
    /// no support, which never becomes the best candidate.
    type Score: Clone + PartialOrd + Default;

    /// Inlier/outlier threshold for residuals.
    fn threshold(&self) -> f64;

    /// Score a model, writing the indices of its inliers to `inliers_out`.
    fn score(&self, data: &CorrespondenceSet, model: &M, inliers_out: &mut Vec<usize>)
        -> Self::Score;
}

/// Refinement applied to the winning candidate after the sampling loop.
pub trait LocalOptimizer<M, S> {
    /// Returns `(refined_model, refined_score, refined_inliers)`.
    fn run(
        &mut self,
        data: &CorrespondenceSet,
        inliers: &[usize],
        model: &M,
        best_score: &S,
    ) -> (M, S, Vec<usize>);
}

/// Optimizer that returns its input unchanged.
pub struct NoopLocalOptimizer;

impl<M: Clone, S: Clone> LocalOptimizer<M, S> for NoopLocalOptimizer {
    fn run(
        &mut self,
        _data: &CorrespondenceSet,
        inliers: &[usize],
        model: &M,
        best_score: &S,
    ) -> (M, S, Vec<usize>) {
        (model.clone(), best_score.clone(), inliers.to_vec())
    }
}

/// Termination criterion deciding when the loop can stop.
pub trait TerminationCriterion<S> {
    /// Called whenever the best candidate improves. May lower
    /// `max_iterations`; returns `true` to stop immediately.
    fn check(
        &mut self,
        data: &CorrespondenceSet,
        best_score: &S,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool;
}

/// Run exactly the configured number of iterations.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedIterations;

impl<S> TerminationCriterion<S> for FixedIterations {
    fn check(
        &mut self,
        _data: &CorrespondenceSet,
        _best_score: &S,
        _sample_size: usize,
        _max_iterations: &mut usize,
    ) -> bool {
        false
    }
}

/// Adaptive criterion shrinking the budget from the current inlier ratio.
///
/// The update rule follows the standard formula
/// `N = log(1 - confidence) / log(1 - inlier_ratio^sample_size)`; the budget
/// is never raised above its configured value.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceTermination {
    /// Desired confidence in (0, 1).
    pub confidence: f64,
}

impl TerminationCriterion<crate::scoring::Score> for ConfidenceTermination {
    fn check(
        &mut self,
        data: &CorrespondenceSet,
        best_score: &crate::scoring::Score,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool {
        let n = data.len() as f64;
        if n <= 0.0 {
            return false;
        }

        let inlier_ratio = (best_score.inlier_count as f64 / n).clamp(0.0, 1.0);
        if inlier_ratio <= 0.0 {
            return false;
        }
        if inlier_ratio >= 1.0 {
            // Every correspondence agrees; no better candidate can exist.
            return true;
        }

        let p_good_sample = inlier_ratio.powi(sample_size as i32);
        if p_good_sample <= 0.0 || p_good_sample >= 1.0 {
            return false;
        }

        let log_one_minus_conf = (1.0 - self.confidence).ln();
        let log_one_minus_p = (1.0 - p_good_sample).ln();
        if !log_one_minus_conf.is_finite() || !log_one_minus_p.is_finite() {
            return false;
        }

        let required = (log_one_minus_conf / log_one_minus_p).ceil().max(1.0) as usize;
        if required < *max_iterations {
            *max_iterations = required;
        }
        false
    }
}

/// A scored hypothesis: the best-so-far accumulator of the search.
#[derive(Debug, Clone)]
pub struct Candidate<M, S> {
    pub model: M,
    pub score: S,
    pub inliers: Vec<usize>,
    /// Zero-based iteration that produced the model.
    pub iteration: usize,
}

/// Pick the better of two candidates: higher score first, then the earlier
/// iteration.
pub fn better_candidate<M, S: PartialOrd>(a: Candidate<M, S>, b: Candidate<M, S>) -> Candidate<M, S> {
    if b.score > a.score || (b.score == a.score && b.iteration < a.iteration) {
        b
    } else {
        a
    }
}

/// Result of one [`ConsensusSearch::run`].
#[derive(Debug, Clone)]
pub struct SearchOutcome<M, S> {
    pub best: Option<Candidate<M, S>>,
    /// Iterations actually consumed.
    pub iterations: usize,
    /// Iterations whose sample produced no usable model.
    pub degenerate_samples: usize,
    /// Whether the wall-clock limit cut the run short.
    pub timed_out: bool,
}

/// Random-sampling consensus search over minimal samples.
pub struct ConsensusSearch<E, Sa, Sc, T, LO = NoopLocalOptimizer>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    T: TerminationCriterion<Sc::Score>,
    LO: LocalOptimizer<E::Model, Sc::Score>,
{
    pub iteration_count: usize,
    pub time_limit: Option<Duration>,
    pub estimator: E,
    pub sampler: Sa,
    pub scoring: Sc,
    pub termination: T,
    pub final_optimizer: Option<LO>,
}

impl<E, Sa, Sc, T, LO> ConsensusSearch<E, Sa, Sc, T, LO>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    T: TerminationCriterion<Sc::Score>,
    LO: LocalOptimizer<E::Model, Sc::Score>,
{
    pub fn new(iteration_count: usize, estimator: E, sampler: Sa, scoring: Sc, termination: T) -> Self {
        Self {
            iteration_count,
            time_limit: None,
            estimator,
            sampler,
            scoring,
            termination,
            final_optimizer: None,
        }
    }

    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_final_optimizer(mut self, optimizer: Option<LO>) -> Self {
        self.final_optimizer = optimizer;
        self
    }

    /// Run the sample → solve → score loop over `data`.
    ///
    /// A sample that cannot be drawn or solved consumes its iteration and
    /// contributes nothing. A candidate replaces the best only if its score
    /// is strictly greater, so ties keep the earlier candidate. The first
    /// candidate must beat `Score::default()`, so a run where nothing has
    /// support ends with `best == None`.
    pub fn run(&mut self, data: &CorrespondenceSet) -> SearchOutcome<E::Model, Sc::Score> {
        let sample_size = self.estimator.sample_size();
        let mut sample = vec![0usize; sample_size];
        let mut tmp_inliers = Vec::new();
        let threshold = self.scoring.threshold();

        let started = Instant::now();
        let mut max_iterations = self.iteration_count;
        let mut best: Option<Candidate<E::Model, Sc::Score>> = None;
        let mut iteration = 0usize;
        let mut degenerate_samples = 0usize;
        let mut timed_out = false;

        while iteration < max_iterations {
            if let Some(limit) = self.time_limit {
                if started.elapsed() >= limit {
                    timed_out = true;
                    debug!(iteration, ?limit, "consensus search hit its time limit");
                    break;
                }
            }
            let current = iteration;
            iteration += 1;

            if !self.sampler.sample(data.len(), sample_size, &mut sample)
                || !self.estimator.is_valid_sample(data, &sample)
            {
                degenerate_samples += 1;
                self.sampler.update(&sample, current);
                continue;
            }

            let models = self.estimator.estimate_model(data, &sample);
            if models.is_empty() {
                degenerate_samples += 1;
            }

            let mut improved = false;
            for model in models {
                if !self.estimator.is_valid_model(&model, data, &sample, threshold) {
                    continue;
                }

                let score = self.scoring.score(data, &model, &mut tmp_inliers);
                let better = match &best {
                    None => score > Sc::Score::default(),
                    Some(b) => score > b.score,
                };
                if better {
                    trace!(iteration = current, inliers = tmp_inliers.len(), "new best candidate");
                    best = Some(Candidate {
                        model,
                        score,
                        inliers: tmp_inliers.clone(),
                        iteration: current,
                    });
                    improved = true;
                }
            }

            self.sampler.update(&sample, current);

            if improved {
                if let Some(b) = &best {
                    if self
                        .termination
                        .check(data, &b.score, sample_size, &mut max_iterations)
                    {
                        debug!(iteration, "termination criterion stopped the search");
                        break;
                    }
                }
            }
        }

        if let Some(optimizer) = self.final_optimizer.as_mut() {
            best = best.map(|b| {
                if b.inliers.len() <= sample_size {
                    return b;
                }
                let (model, score, inliers) = optimizer.run(data, &b.inliers, &b.model, &b.score);
                if score >= b.score {
                    Candidate {
                        model,
                        score,
                        inliers,
                        iteration: b.iteration,
                    }
                } else {
                    b
                }
            });
        }

        debug!(
            iterations = iteration,
            degenerate_samples,
            found = best.is_some(),
            "consensus search finished"
        );

        SearchOutcome {
            best,
            iterations: iteration,
            degenerate_samples,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorrespondenceSet, Point2D};

    #[derive(Clone, Debug, PartialEq)]
    struct MockModel(usize);

    /// Produces one model per sample whose score is read from a script.
    struct ScriptedEstimator;

    impl Estimator for ScriptedEstimator {
        type Model = MockModel;

        fn sample_size(&self) -> usize {
            1
        }

        fn is_valid_sample(&self, _data: &CorrespondenceSet, _sample: &[usize]) -> bool {
            true
        }

        fn estimate_model(&self, _data: &CorrespondenceSet, sample: &[usize]) -> Vec<MockModel> {
            vec![MockModel(sample[0])]
        }

        fn is_valid_model(
            &self,
            _model: &MockModel,
            _data: &CorrespondenceSet,
            _sample: &[usize],
            _threshold: f64,
        ) -> bool {
            true
        }
    }

    /// Emits indices 0, 1, 2, ... cyclically.
    struct SequentialSampler {
        next: usize,
        updates: usize,
    }

    impl Sampler for SequentialSampler {
        fn sample(&mut self, point_count: usize, sample_size: usize, out: &mut [usize]) -> bool {
            for v in out.iter_mut().take(sample_size) {
                *v = self.next % point_count;
                self.next += 1;
            }
            true
        }

        fn update(&mut self, _sample: &[usize], _iteration: usize) {
            self.updates += 1;
        }
    }

    struct ScriptedScoring(Vec<usize>);

    impl Scoring<MockModel> for ScriptedScoring {
        type Score = usize;

        fn threshold(&self) -> f64 {
            1.0
        }

        fn score(&self, _data: &CorrespondenceSet, model: &MockModel, inliers_out: &mut Vec<usize>) -> usize {
            inliers_out.clear();
            inliers_out.extend(0..self.0[model.0]);
            self.0[model.0]
        }
    }

    fn data(n: usize) -> CorrespondenceSet {
        let pts: Vec<_> = (0..n).map(|i| Point2D::new(i as f64, 0.0)).collect();
        CorrespondenceSet::new(pts.clone(), pts).unwrap()
    }

    #[test]
    fn keeps_highest_score_and_earliest_on_ties() {
        let scores = vec![1, 3, 2, 3, 0];
        let mut search: ConsensusSearch<_, _, _, _> = ConsensusSearch::new(
            5,
            ScriptedEstimator,
            SequentialSampler { next: 0, updates: 0 },
            ScriptedScoring(scores),
            FixedIterations,
        );
        let outcome = search.run(&data(5));
        let best = outcome.best.unwrap();
        assert_eq!(best.model, MockModel(1));
        assert_eq!(best.score, 3);
        assert_eq!(best.iteration, 1);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(search.sampler.updates, 5);
    }

    #[test]
    fn zero_support_never_becomes_best() {
        let mut search: ConsensusSearch<_, _, _, _> = ConsensusSearch::new(
            4,
            ScriptedEstimator,
            SequentialSampler { next: 0, updates: 0 },
            ScriptedScoring(vec![0; 4]),
            FixedIterations,
        );
        let outcome = search.run(&data(4));
        assert!(outcome.best.is_none());
        assert_eq!(outcome.iterations, 4);
    }

    #[test]
    fn zero_time_limit_runs_no_iterations() {
        let mut search: ConsensusSearch<_, _, _, _> = ConsensusSearch::new(
            100,
            ScriptedEstimator,
            SequentialSampler { next: 0, updates: 0 },
            ScriptedScoring(vec![1; 4]),
            FixedIterations,
        )
        .with_time_limit(Some(Duration::ZERO));
        let outcome = search.run(&data(4));
        assert!(outcome.timed_out);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.best.is_none());
    }

    #[test]
    fn better_candidate_prefers_score_then_iteration() {
        let a = Candidate { model: (), score: 4, inliers: vec![], iteration: 7 };
        let b = Candidate { model: (), score: 4, inliers: vec![], iteration: 2 };
        assert_eq!(better_candidate(a.clone(), b.clone()).iteration, 2);
        assert_eq!(better_candidate(b.clone(), a.clone()).iteration, 2);
        let c = Candidate { model: (), score: 5, inliers: vec![], iteration: 9 };
        assert_eq!(better_candidate(b, c).iteration, 9);
    }

    #[test]
    fn confidence_termination_shrinks_budget() {
        let set = data(10);
        let mut term = ConfidenceTermination { confidence: 0.99 };
        let mut max_iterations = 1000;
        let stop = term.check(&set, &crate::scoring::Score::new(8), 4, &mut max_iterations);
        assert!(!stop);
        // log(0.01) / log(1 - 0.8^4) = 8.74
        assert_eq!(max_iterations, 9);

        let mut max_iterations = 5;
        term.check(&set, &crate::scoring::Score::new(5), 4, &mut max_iterations);
        assert_eq!(max_iterations, 5);

        assert!(term.check(&set, &crate::scoring::Score::new(10), 4, &mut max_iterations));
    }
}
