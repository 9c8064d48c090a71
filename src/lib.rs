//! # homography-ransac - Robust planar homography estimation
//!
//! Estimates the 3x3 projective transform relating two sets of 2D point
//! correspondences, some of which may be wrong. Random minimal samples of
//! four pairs are solved with the direct linear transform, every candidate
//! is scored by counting the pairs it reprojects within a threshold, and the
//! best-supported candidate wins.
//!
//! ## Quick Start
//!
//! ```rust
//! use homography_ransac::{estimate_homography, Point2D, RansacSettings};
//!
//! let source = vec![
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(1.0, 0.0),
//!     Point2D::new(1.0, 1.0),
//!     Point2D::new(0.0, 1.0),
//! ];
//! let target: Vec<_> = source.iter().map(|p| Point2D::new(2.0 * p.x, 2.0 * p.y)).collect();
//!
//! let settings = RansacSettings::new(10, 1.0).with_seed(0);
//! let result = estimate_homography(&source, &target, Some(settings)).unwrap();
//! assert!(result.found);
//! assert_eq!(result.inliers.len(), 4);
//! ```
//!
//! ## Extending the Library
//!
//! The search in [`core::ConsensusSearch`] is generic over a handful of
//! traits, so parts can be swapped without touching the loop:
//!
//! - **[`Estimator`](core::Estimator)**: turn a minimal sample into models
//! - **[`Sampler`](core::Sampler)**: draw minimal samples
//! - **[`Scoring<M>`](core::Scoring)**: measure the support of a model
//! - **[`LocalOptimizer<M, S>`](core::LocalOptimizer)**: polish the winner
//! - **[`TerminationCriterion<S>`](core::TerminationCriterion)**: stop early
//!
//! ## Modules
//!
//! - **[`api`](api)**: High-level entry points
//! - **[`core`](core)**: Core traits and the consensus search loop
//! - **[`estimators`](estimators)**: Four-point and least-squares homography solvers
//! - **[`samplers`](samplers)**: Uniform minimal-sample drawing
//! - **[`scoring`](scoring)**: Inlier counting
//! - **[`optimisers`](optimisers)**: Refitting on the inlier set
//! - **[`parallel`](parallel)**: The search on the rayon thread pool
//! - **[`settings`](settings)**: Run configuration, loadable from TOML

pub mod api;
pub mod core;
pub mod error;
pub mod estimators;
pub mod models;
pub mod optimisers;
pub mod parallel;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod types;
pub mod utils;

// Re-export high-level API
pub use api::{estimate, estimate_homography, estimate_homography_matrix, EstimationResult};

// Re-export core traits for easy access
pub use core::{Estimator, LocalOptimizer, Sampler, Scoring, TerminationCriterion};

pub use error::{DegeneracyKind, EstimationError, Result};
pub use estimators::{compute_homography, fit_homography, HomographyEstimator};
pub use models::Homography;
pub use scoring::Score;
pub use settings::RansacSettings;
pub use types::{CorrespondenceSet, Point2D};
