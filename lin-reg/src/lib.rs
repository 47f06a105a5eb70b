//! Ridge regression readouts for reservoir computers.
//!
//! The readout can be fit on all data at once or streamed batch by batch,
//! accumulating `X^T * X` and `X^T * Y` so the samples never have to be kept.

#[macro_use]
extern crate log;

use nalgebra::{DMatrix, DMatrixView};

mod accumulator;
mod design;
mod errors;
mod params;
mod preprocessing;
mod regressor;
mod scaler;
mod solve;

pub use accumulator::SufficientStats;
pub use design::DesignMatrix;
pub use errors::{LinRegError, Result};
pub use params::{Params, PartialFitOptions, Variant};
pub use preprocessing::Preprocessor;
pub use regressor::IncrementalRegressor;
pub use scaler::StandardScaler;

/// Generic way of performing linear regression and fitting the readout matrix
pub trait LinReg {
    /// Fit a readout matrix, mapping inputs to targets, discarding any
    /// previous fit
    ///
    /// # Parameters
    /// design: Input data with one sample per row
    /// targets: Target data with one sample per row and a column per output
    ///
    /// # Returns
    /// The readout matrix of shape (design columns [+ 1 for the intercept], target columns)
    fn fit_readout<'a>(
        &mut self,
        design: &'a DMatrixView<'a, f64>,
        targets: &'a DMatrixView<'a, f64>,
    ) -> Result<DMatrix<f64>>;
}
