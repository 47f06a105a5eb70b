use serde::{Deserialize, Serialize};

use crate::{LinRegError, Result};

/// Selects how the readout is regularized and how it interacts with
/// streamed batches.
///
/// The two conventions produce different weights for the same data, so a
/// stored model must always be used with the variant that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Running ridge solution `W = (K + alpha * I)^-1 * C`.
    /// Once weights exist, each batch applies a corrective delta computed
    /// with the freshly inverted matrix.
    Incremental,
    /// Sample scaled ridge solution `W = (K + alpha * n * I)^-1 * C`,
    /// where `n` counts every sample seen since the last reset.
    /// Supports dropping the statistics after the final solve.
    FastIncremental,
}

impl Variant {
    /// The value added to the diagonal of the gram matrix
    #[inline(always)]
    pub fn ridge(&self, alpha: f64, n_samples: usize) -> f64 {
        match self {
            Variant::Incremental => alpha,
            Variant::FastIncremental => alpha * n_samples as f64,
        }
    }
}

/// The hyperparameters of an `IncrementalRegressor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// L2 regularization strength, must be positive
    pub alpha: f64,
    /// Append a constant column so a non zero offset can be fitted.
    /// Use this if the inputs are not mean free.
    pub fit_intercept: bool,
    /// Standardize the features before fitting
    pub normalize: bool,
    /// Regularization convention and batch interaction mode
    pub variant: Variant,
}

impl Params {
    /// Running ridge regression with the customary small regularization
    pub fn incremental(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            normalize: false,
            variant: Variant::Incremental,
        }
    }

    /// Sample scaled ridge regression
    pub fn fast_incremental(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            normalize: false,
            variant: Variant::FastIncremental,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(LinRegError::InvalidParam(format!(
                "alpha must be finite and positive, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::incremental(1e-5)
    }
}

/// Per call switches of `IncrementalRegressor::partial_fit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFitOptions {
    /// Update the running normalization statistics with this batch.
    /// If false the scaler is refit on this batch alone.
    pub partial_normalize: bool,
    /// Drop all accumulated state before processing the batch
    pub reset: bool,
    /// Reject batches containing NaN or infinite values
    pub validate: bool,
    /// Skip the matrix inversion for this batch.
    /// The incremental variant only honours this until the first solve.
    pub postpone_inverse: bool,
    /// Solve, then discard the statistics. Only valid for
    /// `Variant::FastIncremental`.
    pub finalize: bool,
}

impl PartialFitOptions {
    pub fn partial_normalize(mut self, partial_normalize: bool) -> Self {
        self.partial_normalize = partial_normalize;
        self
    }

    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn postpone_inverse(mut self, postpone_inverse: bool) -> Self {
        self.postpone_inverse = postpone_inverse;
        self
    }

    pub fn finalize(mut self, finalize: bool) -> Self {
        self.finalize = finalize;
        self
    }

    pub(crate) fn check(&self, variant: Variant) -> Result<()> {
        if !self.finalize {
            return Ok(());
        }
        if variant != Variant::FastIncremental {
            return Err(LinRegError::InvalidOption(
                "finalize is only supported by the fast incremental variant".to_string(),
            ));
        }
        if self.postpone_inverse {
            return Err(LinRegError::InvalidOption(
                "finalize requires a solve and cannot be combined with postpone_inverse"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PartialFitOptions {
    fn default() -> Self {
        Self {
            partial_normalize: true,
            reset: false,
            validate: true,
            postpone_inverse: false,
            finalize: false,
        }
    }
}
