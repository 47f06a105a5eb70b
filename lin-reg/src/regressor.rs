use nalgebra::{DMatrix, DMatrixView, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    solve::{corrective_update, regularized_inverse, ridge_solution},
    DesignMatrix, LinReg, LinRegError, Params, PartialFitOptions, Preprocessor, Result,
    StandardScaler, SufficientStats, Variant,
};

/// Ridge regression that can be fit in one go or batch by batch.
/// The readout of reservoir computers (echo state networks, extreme
/// learning machines) streams its hidden states through this.
///
/// Streaming a dataset through `partial_fit` in any number of contiguous
/// batches yields the same weights as `fit` on the whole dataset, up to
/// floating point summation order. With normalization the statistics are
/// kept in raw feature space and standardized with the running scaler at
/// solve time, so this holds for normalized models as well.
///
/// Every operation either succeeds completely or leaves the model as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalRegressor {
    params: Params,
    preprocessor: Preprocessor,
    stats: Option<SufficientStats>,
    /// (d, k), the last row holds the intercept if one is fitted
    output_weights: Option<DMatrix<f64>>,
    n_features_in: Option<usize>,
    n_targets: Option<usize>,
    n_samples_seen: usize,
    finalized: bool,
}

impl IncrementalRegressor {
    /// Create an unfitted regressor
    ///
    /// # Errors
    /// If `alpha` is not finite and positive
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        let preprocessor = Preprocessor::new(params.fit_intercept, params.normalize);

        Ok(Self {
            params,
            preprocessor,
            stats: None,
            output_weights: None,
            n_features_in: None,
            n_targets: None,
            n_samples_seen: 0,
            finalized: false,
        })
    }

    /// Fit on the whole dataset, discarding anything learned before.
    /// The normalization, if enabled, is refit on `x`.
    /// The fast incremental variant finalizes, dropping its statistics.
    ///
    /// # Arguments
    /// x: (n_samples, n_features) inputs
    /// y: (n_samples, n_targets) targets, or a vector for a single target
    pub fn fit<X, Y>(&mut self, x: &X, y: &Y) -> Result<&mut Self>
    where
        X: DesignMatrix + ?Sized,
        Y: DesignMatrix + ?Sized,
    {
        let opts = PartialFitOptions::default()
            .partial_normalize(false)
            .reset(true)
            .finalize(self.params.variant == Variant::FastIncremental);
        self.partial_fit(x, y, opts)?;
        info!(
            "fit {:?} readout on {} samples, weights: {:?}",
            self.params.variant,
            self.n_samples_seen,
            self.output_weights.as_ref().map(|w| w.shape())
        );

        Ok(self)
    }

    /// Fold a batch into the model.
    ///
    /// The number of features and targets of the first batch are locked in
    /// until the model is reset.
    ///
    /// # Arguments
    /// x: (n_samples, n_features) inputs
    /// y: (n_samples, n_targets) targets, or a vector for a single target
    /// opts: see `PartialFitOptions`
    pub fn partial_fit<X, Y>(&mut self, x: &X, y: &Y, opts: PartialFitOptions) -> Result<&mut Self>
    where
        X: DesignMatrix + ?Sized,
        Y: DesignMatrix + ?Sized,
    {
        opts.check(self.params.variant)?;
        if self.finalized && !opts.reset {
            return Err(LinRegError::AlreadyFinalized);
        }
        let (n_samples, n_features) = x.shape();
        let (y_rows, n_targets) = y.shape();
        self.check_batch(n_samples, n_features, y_rows, n_targets, opts.reset)?;

        let x = x.to_dense();
        let y = y.to_dense();
        if opts.validate && (!all_finite(&x) || !all_finite(&y)) {
            return Err(LinRegError::NonFinite);
        }

        // Everything below works on copies, `self` is only touched on commit
        let fresh;
        let (base_preprocessor, prior_stats, prior_weights) = if opts.reset {
            fresh = Preprocessor::new(self.params.fit_intercept, self.params.normalize);
            (&fresh, None, None)
        } else {
            (&self.preprocessor, self.stats.as_ref(), self.output_weights.as_ref())
        };

        let preprocessor = base_preprocessor.fitted(&x, opts.partial_normalize);
        let design = preprocessor.accumulation_design(&x);
        let batch = SufficientStats::from_batch(&design, &y);
        let stats = match prior_stats {
            Some(prior) => prior.merged(&batch),
            None => batch,
        };
        let system = preprocessor.normalized(&stats);
        let ridge = self.params.variant.ridge(self.params.alpha, stats.n_samples());
        debug!(
            "partial_fit: batch ({}, {}), samples seen: {}, ridge: {}",
            n_samples,
            n_features,
            stats.n_samples(),
            ridge
        );

        let output_weights = match self.params.variant {
            Variant::Incremental => match prior_weights {
                None if opts.postpone_inverse => {
                    debug!("postponing inverse");
                    None
                }
                None => Some(ridge_solution(&system, ridge)?),
                Some(weights) => {
                    if opts.postpone_inverse {
                        debug!("weights already exist, postpone_inverse has no effect");
                    }
                    if preprocessor.is_normalizing() {
                        // the previous weights belong to the previous scaling
                        debug!("normalization moved, solving from the statistics");
                        Some(ridge_solution(&system, ridge)?)
                    } else {
                        let p = regularized_inverse(system.gram(), ridge)?;
                        Some(corrective_update(&p, weights, &design, &y)?)
                    }
                }
            },
            Variant::FastIncremental => {
                if opts.postpone_inverse {
                    debug!("skipping output weight update");
                    prior_weights.cloned()
                } else {
                    Some(ridge_solution(&system, ridge)?)
                }
            }
        };

        // commit
        self.n_samples_seen = stats.n_samples();
        self.stats = if opts.finalize {
            debug!("finalized, dropping sufficient statistics");
            None
        } else {
            Some(stats)
        };
        self.preprocessor = preprocessor;
        self.output_weights = output_weights;
        self.n_features_in = Some(n_features);
        self.n_targets = Some(n_targets);
        self.finalized = opts.finalize;

        Ok(self)
    }

    /// Predict the targets of `x`, (n_samples, n_targets)
    pub fn predict<X>(&self, x: &X) -> Result<DMatrix<f64>>
    where
        X: DesignMatrix + ?Sized,
    {
        let weights = self.output_weights.as_ref().ok_or(LinRegError::NotFitted)?;
        let (_, n_features) = x.shape();
        if let Some(expected) = self.n_features_in {
            if expected != n_features {
                return Err(LinRegError::FeatureMismatch {
                    expected,
                    got: n_features,
                });
            }
        }

        let design = self.preprocessor.transform(&x.to_dense());
        Ok(design * weights)
    }

    /// The coefficient of determination R^2 of the prediction,
    /// averaged uniformly over all targets
    pub fn score<X, Y>(&self, x: &X, y: &Y) -> Result<f64>
    where
        X: DesignMatrix + ?Sized,
        Y: DesignMatrix + ?Sized,
    {
        let pred = self.predict(x)?;
        let y = y.to_dense();
        if pred.nrows() != y.nrows() {
            return Err(LinRegError::SampleMismatch {
                x_rows: pred.nrows(),
                y_rows: y.nrows(),
            });
        }
        if pred.ncols() != y.ncols() {
            return Err(LinRegError::TargetMismatch {
                expected: pred.ncols(),
                got: y.ncols(),
            });
        }
        if y.nrows() == 0 {
            return Err(LinRegError::EmptyBatch);
        }
        if y.ncols() == 0 {
            return Err(LinRegError::NoTargets);
        }

        let total: f64 = y
            .column_iter()
            .zip(pred.column_iter())
            .map(|(truth, estimate)| {
                let mean = truth.mean();
                let ss_res: f64 = truth.iter().zip(estimate.iter()).map(|(t, p)| (t - p).powi(2)).sum();
                let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
                match (ss_res == 0.0, ss_tot == 0.0) {
                    (true, _) => 1.0,
                    (false, true) => 0.0,
                    (false, false) => 1.0 - ss_res / ss_tot,
                }
            })
            .sum();

        Ok(total / y.ncols() as f64)
    }

    /// The weights without the intercept, (n_targets, n_features).
    /// `None` until the first solve.
    pub fn coef(&self) -> Option<DMatrix<f64>> {
        let weights = self.output_weights.as_ref()?;
        let weights_t = weights.transpose();
        if self.params.fit_intercept {
            Some(weights_t.columns(0, weights_t.ncols() - 1).clone_owned())
        } else {
            Some(weights_t)
        }
    }

    /// The intercept of every target.
    /// Empty if no intercept is fitted, `None` until the first solve.
    pub fn intercept(&self) -> Option<DVector<f64>> {
        let weights = self.output_weights.as_ref()?;
        if self.params.fit_intercept {
            Some(weights.row(weights.nrows() - 1).transpose())
        } else {
            Some(DVector::zeros(0))
        }
    }

    /// Forget everything learned so far, keeping the hyperparameters
    pub fn reset(&mut self) {
        self.preprocessor.reset();
        self.stats = None;
        self.output_weights = None;
        self.n_features_in = None;
        self.n_targets = None;
        self.n_samples_seen = 0;
        self.finalized = false;
    }

    #[inline(always)]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The full solution including the intercept row, (d, n_targets)
    #[inline(always)]
    pub fn output_weights(&self) -> Option<&DMatrix<f64>> {
        self.output_weights.as_ref()
    }

    /// The accumulated statistics, `None` before the first batch and after
    /// finalizing. When normalizing they are those of the raw features plus
    /// a column of 1s, (n_features + 1) wide.
    #[inline(always)]
    pub fn statistics(&self) -> Option<&SufficientStats> {
        self.stats.as_ref()
    }

    #[inline(always)]
    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.preprocessor.scaler()
    }

    #[inline(always)]
    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    #[inline(always)]
    pub fn n_targets(&self) -> Option<usize> {
        self.n_targets
    }

    /// Samples folded in since the last reset
    #[inline(always)]
    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    #[inline(always)]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Bytes held by the model, including its matrices
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.preprocessor.size_bytes()
            + self.stats.as_ref().map_or(0, |s| s.size_bytes())
            + self.output_weights.as_ref().map_or(0, |w| w.len() * std::mem::size_of::<f64>())
    }

    /// Shape checks that must pass before any state is modified
    fn check_batch(
        &self,
        n_samples: usize,
        n_features: usize,
        y_rows: usize,
        n_targets: usize,
        reset: bool,
    ) -> Result<()> {
        if n_samples == 0 {
            return Err(LinRegError::EmptyBatch);
        }
        if y_rows != n_samples {
            return Err(LinRegError::SampleMismatch {
                x_rows: n_samples,
                y_rows,
            });
        }
        if n_targets == 0 {
            return Err(LinRegError::NoTargets);
        }
        if reset {
            return Ok(());
        }
        if let Some(expected) = self.n_features_in {
            if expected != n_features {
                return Err(LinRegError::FeatureMismatch {
                    expected,
                    got: n_features,
                });
            }
        }
        if let Some(expected) = self.n_targets {
            if expected != n_targets {
                return Err(LinRegError::TargetMismatch {
                    expected,
                    got: n_targets,
                });
            }
        }
        Ok(())
    }
}

impl LinReg for IncrementalRegressor {
    fn fit_readout<'a>(
        &mut self,
        design: &'a DMatrixView<'a, f64>,
        targets: &'a DMatrixView<'a, f64>,
    ) -> Result<DMatrix<f64>> {
        self.fit(design, targets)?;
        self.output_weights.clone().ok_or(LinRegError::NotFitted)
    }
}

#[inline]
fn all_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}
