//! Error type shared by the solver, the consensus search and configuration
//! loading.

use thiserror::Error;

/// Reason a minimal sample was rejected by the homography solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegeneracyKind {
    /// Three of the four points lie on a common line.
    Collinear,
    /// The DLT system has no distinct one-dimensional null space.
    RankDeficient,
    /// The bottom-right entry is zero, so the scale cannot be fixed.
    ZeroScale,
    /// The solution contains NaN or infinite entries.
    NonFinite,
}

impl std::fmt::Display for DegeneracyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DegeneracyKind::Collinear => "collinear points",
            DegeneracyKind::RankDeficient => "rank-deficient system",
            DegeneracyKind::ZeroScale => "zero homogeneous scale",
            DegeneracyKind::NonFinite => "non-finite solution",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("need at least 4 point correspondences, got {got}")]
    InsufficientCorrespondences { got: usize },
    #[error("source has {source_len} points but target has {target_len}")]
    LengthMismatch { source_len: usize, target_len: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("correspondence {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("degenerate sample: {0}")]
    DegenerateSample(DegeneracyKind),
    #[error("svd failed")]
    SvdFailed,
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EstimationError>;
