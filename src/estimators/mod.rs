//! Estimators producing model hypotheses from correspondence samples.

pub mod homography;

pub use homography::{compute_homography, fit_homography, HomographyEstimator};
