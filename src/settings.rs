//! Configuration of one estimation run.
//!
//! Settings are plain data: they can be built in code, or loaded from TOML
//! where every key is optional and falls back to its default.
//!
//! ```toml
//! iteration_count = 2000
//! inlier_threshold = 3.0
//! seed = 42
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};

/// Settings for the homography consensus search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacSettings {
    /// Number of random minimal samples to try.
    pub iteration_count: usize,
    /// Maximum reprojection error, in point units, for an inlier.
    pub inlier_threshold: f64,
    /// Seed for reproducible sampling; entropy-seeded when absent.
    pub seed: Option<u64>,
    /// Stop early once this confidence of having drawn an all-inlier sample
    /// is reached. Absent means run every iteration.
    pub confidence: Option<f64>,
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Refit the winner on its inliers after the search.
    pub refine_with_inliers: bool,
    /// Evaluate iterations on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RansacSettings {
    fn default() -> Self {
        Self {
            iteration_count: 1000,
            inlier_threshold: 50.0,
            seed: None,
            confidence: None,
            time_limit_ms: None,
            refine_with_inliers: false,
            parallel: false,
        }
    }
}

impl RansacSettings {
    pub fn new(iteration_count: usize, inlier_threshold: f64) -> Self {
        Self {
            iteration_count,
            inlier_threshold,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iteration_count == 0 {
            return Err(EstimationError::InvalidSettings(
                "iteration_count must be positive".to_string(),
            ));
        }
        if !(self.inlier_threshold.is_finite() && self.inlier_threshold > 0.0) {
            return Err(EstimationError::InvalidSettings(format!(
                "inlier_threshold must be positive and finite, got {}",
                self.inlier_threshold
            )));
        }
        if let Some(c) = self.confidence {
            if !(c > 0.0 && c < 1.0) {
                return Err(EstimationError::InvalidSettings(format!(
                    "confidence must lie in (0, 1), got {c}"
                )));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s).map_err(|e| EstimationError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EstimationError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EstimationError::Config(e.to_string()))
    }
}
