//! High-level entry points for homography estimation.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::core::{
    ConfidenceTermination, ConsensusSearch, FixedIterations, LocalOptimizer, SearchOutcome,
};
use crate::error::Result;
use crate::estimators::HomographyEstimator;
use crate::models::Homography;
use crate::optimisers::LeastSquaresOptimizer;
use crate::parallel::search_parallel;
use crate::samplers::UniformRandomSampler;
use crate::scoring::{reprojection_scoring, ReprojectionScoring, Score};
use crate::settings::RansacSettings;
use crate::types::{CorrespondenceSet, Point2D, MIN_CORRESPONDENCES};

/// Result of a homography estimation.
#[derive(Debug, Clone)]
pub struct EstimationResult {
    /// Best homography, or the identity when `found` is `false`.
    pub model: Homography,
    /// Indices of the correspondences the model explains.
    pub inliers: Vec<usize>,
    pub score: Score,
    /// Number of iterations performed.
    pub iterations: usize,
    /// `false` when no candidate with at least one inlier was produced. The
    /// identity returned in that case means "unknown", not "no motion".
    pub found: bool,
}

impl EstimationResult {
    fn from_outcome(outcome: SearchOutcome<Homography, Score>) -> Self {
        match outcome.best {
            Some(best) => Self {
                model: best.model,
                inliers: best.inliers,
                score: best.score,
                iterations: outcome.iterations,
                found: true,
            },
            _ => {
                warn!(
                    iterations = outcome.iterations,
                    degenerate_samples = outcome.degenerate_samples,
                    "no homography could be determined; returning identity"
                );
                Self {
                    model: Homography::identity(),
                    inliers: Vec::new(),
                    score: Score::default(),
                    iterations: outcome.iterations,
                    found: false,
                }
            }
        }
    }
}

fn refiner(threshold: f64) -> LeastSquaresOptimizer<HomographyEstimator, ReprojectionScoring> {
    LeastSquaresOptimizer::new(HomographyEstimator::new(), reprojection_scoring(threshold))
}

fn search_sequential(
    correspondences: &CorrespondenceSet,
    settings: &RansacSettings,
) -> SearchOutcome<Homography, Score> {
    let sampler = UniformRandomSampler::with_optional_seed(settings.seed);
    let scoring = reprojection_scoring(settings.inlier_threshold);
    let optimizer = settings
        .refine_with_inliers
        .then(|| refiner(settings.inlier_threshold));

    match settings.confidence {
        Some(confidence) => ConsensusSearch::new(
            settings.iteration_count,
            HomographyEstimator::new(),
            sampler,
            scoring,
            ConfidenceTermination { confidence },
        )
        .with_time_limit(settings.time_limit())
        .with_final_optimizer(optimizer)
        .run(correspondences),
        None => ConsensusSearch::new(
            settings.iteration_count,
            HomographyEstimator::new(),
            sampler,
            scoring,
            FixedIterations,
        )
        .with_time_limit(settings.time_limit())
        .with_final_optimizer(optimizer)
        .run(correspondences),
    }
}

/// Robustly estimate the homography mapping `source` onto `target`.
///
/// Per-sample failures are absorbed by the search; only invalid settings
/// produce an error. When no usable candidate was found the result holds the
/// identity with `found == false`.
pub fn estimate(
    correspondences: &CorrespondenceSet,
    settings: &RansacSettings,
) -> Result<EstimationResult> {
    settings.validate()?;
    debug!(
        correspondences = correspondences.len(),
        iterations = settings.iteration_count,
        threshold = settings.inlier_threshold,
        parallel = settings.parallel,
        "estimating homography"
    );

    let outcome = if settings.parallel {
        let seed = settings.seed.unwrap_or_else(rand::random);
        let mut outcome = search_parallel(
            correspondences,
            settings.iteration_count,
            settings.inlier_threshold,
            seed,
            settings.time_limit(),
        );
        if settings.refine_with_inliers {
            if let Some(best) = outcome.best.as_mut() {
                if best.inliers.len() > MIN_CORRESPONDENCES {
                    let (model, score, inliers) = refiner(settings.inlier_threshold).run(
                        correspondences,
                        &best.inliers,
                        &best.model,
                        &best.score,
                    );
                    if score >= best.score {
                        best.model = model;
                        best.score = score;
                        best.inliers = inliers;
                    }
                }
            }
        }
        outcome
    } else {
        search_sequential(correspondences, settings)
    };

    Ok(EstimationResult::from_outcome(outcome))
}

/// Validate two point lists and estimate the homography between them.
///
/// # Arguments
/// * `source` - Points in the first image
/// * `target` - Corresponding points in the second image
/// * `settings_opt` - Optional settings (uses defaults if None)
pub fn estimate_homography(
    source: &[Point2D],
    target: &[Point2D],
    settings_opt: Option<RansacSettings>,
) -> Result<EstimationResult> {
    let correspondences = CorrespondenceSet::new(source.to_vec(), target.to_vec())?;
    estimate(&correspondences, &settings_opt.unwrap_or_default())
}

/// Same as [`estimate_homography`] for two Nx2 matrices.
pub fn estimate_homography_matrix(
    points1: &DMatrix<f64>,
    points2: &DMatrix<f64>,
    settings_opt: Option<RansacSettings>,
) -> Result<EstimationResult> {
    let correspondences = CorrespondenceSet::from_matrices(points1, points2)?;
    estimate(&correspondences, &settings_opt.unwrap_or_default())
}
