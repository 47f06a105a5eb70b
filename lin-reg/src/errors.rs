use thiserror::Error;

/// Convenience type alias for this crate
pub type Result<T> = std::result::Result<T, LinRegError>;

/// Everything that can go wrong while fitting or using a readout
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinRegError {
    /// No output weights have been solved for yet
    #[error("the regressor has not been fitted yet")]
    NotFitted,

    /// A batch without any samples
    #[error("received a batch with zero samples")]
    EmptyBatch,

    /// Targets with zero columns
    #[error("targets have no columns")]
    NoTargets,

    #[error("design has {x_rows} samples but targets have {y_rows}")]
    SampleMismatch { x_rows: usize, y_rows: usize },

    /// The number of features differs from the first batch
    #[error("expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    /// The number of targets differs from the first batch
    #[error("expected {expected} targets, got {got}")]
    TargetMismatch { expected: usize, got: usize },

    #[error("input contains NaN or infinite values")]
    NonFinite,

    /// `K + ridge * I` could not be inverted, or its inverse is unusable
    #[error("regularized gram matrix of dimension {dim} is singular or ill-conditioned")]
    SingularMatrix { dim: usize },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The sufficient statistics were discarded by a finalizing fit
    #[error("the regressor was finalized, reset it before fitting again")]
    AlreadyFinalized,
}
