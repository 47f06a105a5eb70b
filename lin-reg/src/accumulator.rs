use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// The running sufficient statistics of a least squares problem.
/// Holding these is enough to solve for the readout without keeping any of
/// the samples around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SufficientStats {
    /// `X^T * X`, dimension (d, d)
    gram: DMatrix<f64>,
    /// `X^T * Y`, dimension (d, k)
    cross: DMatrix<f64>,
    /// Number of rows that went into the statistics
    n_samples: usize,
}

impl SufficientStats {
    /// The statistics of a single preprocessed batch
    ///
    /// # Arguments
    /// design: (n, d) preprocessed inputs
    /// targets: (n, k) targets
    pub fn from_batch(design: &DMatrix<f64>, targets: &DMatrix<f64>) -> Self {
        debug_assert_eq!(design.nrows(), targets.nrows());
        let design_t = design.transpose();

        Self {
            gram: &design_t * design,
            cross: &design_t * targets,
            n_samples: design.nrows(),
        }
    }

    /// These statistics with another batch folded in
    pub fn merged(&self, batch: &SufficientStats) -> Self {
        debug_assert_eq!(self.gram.shape(), batch.gram.shape());
        debug_assert_eq!(self.cross.shape(), batch.cross.shape());

        Self {
            gram: &self.gram + &batch.gram,
            cross: &self.cross + &batch.cross,
            n_samples: self.n_samples + batch.n_samples,
        }
    }

    /// The statistics of the design mapped row-wise by `map`,
    /// i.e. of `X * map^T`
    pub fn projected(&self, map: &DMatrix<f64>) -> Self {
        Self {
            gram: map * &self.gram * map.transpose(),
            cross: map * &self.cross,
            n_samples: self.n_samples,
        }
    }

    #[inline(always)]
    pub fn gram(&self) -> &DMatrix<f64> {
        &self.gram
    }

    #[inline(always)]
    pub fn cross(&self) -> &DMatrix<f64> {
        &self.cross
    }

    #[inline(always)]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + (self.gram.len() + self.cross.len()) * std::mem::size_of::<f64>()
    }
}
