//! Error taxonomy of the transfer-matrix core.
//!
//! Every failure is raised synchronously by the call that detects it. The core
//! never retries: a [`StrataError::NumericalInstability`] from the eigen
//! propagator is handled by the caller switching to the matrix-exponential
//! strategy, and an [`StrataError::UnsupportedMedium`] by picking a strategy
//! whose assumptions the medium satisfies.

use thiserror::Error;

/// Result type used throughout the solver core.
pub type Result<T> = std::result::Result<T, StrataError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrataError {
    /// Malformed tensor or refractive index input.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// The selected propagator cannot represent the given medium.
    #[error("unsupported medium for the {strategy} propagator: {reason}")]
    UnsupportedMedium { strategy: String, reason: String },

    /// Eigen-mode sorting or matrix inversion lost confidence.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// The 2x2 block of the global matrix used for extraction is singular.
    #[error("singular stack: {0}")]
    SingularStack(String),

    /// The structure lacks its two semi-infinite half-spaces.
    #[error("structure needs at least the two half-spaces, got {0} layer(s)")]
    EmptyStructure(usize),

    /// A numeric input is out of its physical range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl StrataError {
    pub fn unsupported(strategy: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedMedium {
            strategy: strategy.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether selecting a different propagator strategy can resolve the error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMedium { .. } | Self::NumericalInstability(_)
        )
    }
}
