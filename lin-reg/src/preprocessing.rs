use std::borrow::Cow;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{StandardScaler, SufficientStats};

/// Turns raw feature batches into the design of the regression:
/// optional standardization of the features, then an optional column of 1s
/// for the intercept.
///
/// Without normalization the design is accumulated as is. With normalization
/// the raw features and a column of 1s are accumulated instead, and the
/// standardization is applied to the statistics when solving. Since the
/// standardization is affine, `T * (X|1)^T * (X|1) * T^T` is the gram matrix
/// of the standardized design for every state of the scaler, so batches seen
/// before the scaler moved are rescaled along with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    fit_intercept: bool,
    // only present when normalizing
    scaler: Option<StandardScaler>,
}

impl Preprocessor {
    pub fn new(fit_intercept: bool, normalize: bool) -> Self {
        Self {
            fit_intercept,
            scaler: normalize.then(StandardScaler::default),
        }
    }

    /// Columns of the design for a batch with `n_features` features
    #[inline(always)]
    pub fn design_dim(&self, n_features: usize) -> usize {
        if self.fit_intercept {
            n_features + 1
        } else {
            n_features
        }
    }

    #[inline(always)]
    pub fn is_normalizing(&self) -> bool {
        self.scaler.is_some()
    }

    /// Fit the normalization on `x`.
    /// Returns the updated preprocessor, leaving `self` untouched so the
    /// caller decides when to commit.
    ///
    /// # Arguments
    /// partial_normalize: merge the batch into the running statistics if true,
    /// refit them on this batch alone otherwise
    pub fn fitted(&self, x: &DMatrix<f64>, partial_normalize: bool) -> Self {
        let mut next = self.clone();
        if let Some(scaler) = next.scaler.as_mut() {
            if partial_normalize {
                scaler.partial_fit(x);
            } else {
                scaler.fit(x);
            }
        }

        next
    }

    /// The rows folded into the sufficient statistics for `x`:
    /// the design itself, or the raw features and a column of 1s when
    /// normalizing
    pub fn accumulation_design(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        if self.scaler.is_some() {
            let ncols = x.ncols();
            x.clone().insert_column(ncols, 1.0)
        } else {
            self.transform(x)
        }
    }

    /// The statistics of the design under the current normalization,
    /// from the accumulated ones
    pub fn normalized<'s>(&self, stats: &'s SufficientStats) -> Cow<'s, SufficientStats> {
        match &self.scaler {
            Some(scaler) => Cow::Owned(stats.projected(&self.normalization_map(scaler))),
            None => Cow::Borrowed(stats),
        }
    }

    /// `T` with `design = T * (x|1)` per sample, (design dim, n_features + 1)
    fn normalization_map(&self, scaler: &StandardScaler) -> DMatrix<f64> {
        let n_features = scaler.mean().len();
        let scale = scaler.scale();
        let mut map = DMatrix::zeros(self.design_dim(n_features), n_features + 1);
        for j in 0..n_features {
            map[(j, j)] = 1.0 / scale[j];
            map[(j, n_features)] = -scaler.mean()[j] / scale[j];
        }
        if self.fit_intercept {
            map[(n_features, n_features)] = 1.0;
        }

        map
    }

    /// Transform `x` with the current statistics, never refitting them
    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(x),
            None => x.clone(),
        };
        if self.fit_intercept {
            let ncols = x.ncols();
            x.insert_column(ncols, 1.0)
        } else {
            x
        }
    }

    /// Forget the normalization statistics
    pub fn reset(&mut self) {
        if let Some(scaler) = self.scaler.as_mut() {
            *scaler = StandardScaler::default();
        }
    }

    #[inline(always)]
    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.scaler.as_ref().map_or(0, |s| s.size_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_intercept_column() {
        let p = Preprocessor::new(true, false);
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let design = p.fitted(&x, true).transform(&x);

        assert_eq!(p.design_dim(2), 3);
        assert_eq!(p.accumulation_design(&x), design);
        assert_eq!(design, DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 1.0, 3.0, 4.0, 1.0]));
    }

    #[test]
    fn passthrough_without_options() {
        let p = Preprocessor::new(false, false);
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(p.design_dim(2), 2);
        assert_eq!(p.transform(&x), x);
        assert!(p.scaler().is_none());
    }

    #[test]
    fn normalization_keeps_intercept_column() {
        let p = Preprocessor::new(true, true);
        let x = DMatrix::from_row_slice(3, 1, &[10.0, 20.0, 30.0]);
        let next = p.fitted(&x, false);
        let design = next.transform(&x);

        // `p` itself is left as it was
        assert_eq!(p.scaler().map(|s| s.n_samples_seen()), Some(0));
        assert_eq!(next.scaler().map(|s| s.n_samples_seen()), Some(3));

        assert_eq!(design[(1, 0)], 0.0);
        assert!(design[(0, 0)] < 0.0 && design[(2, 0)] > 0.0);
        assert!(design.column(1).iter().all(|v| *v == 1.0));
    }

    #[test]
    fn partial_normalize_merges_batches() {
        let p = Preprocessor::new(false, true);
        let p = p.fitted(&DMatrix::from_row_slice(2, 1, &[0.0, 2.0]), true);
        let merged = p.fitted(&DMatrix::from_row_slice(2, 1, &[4.0, 6.0]), true);
        let refit = p.fitted(&DMatrix::from_row_slice(2, 1, &[4.0, 6.0]), false);

        assert_eq!(merged.scaler().map(|s| s.mean()[0]), Some(3.0));
        assert_eq!(refit.scaler().map(|s| s.mean()[0]), Some(5.0));
    }

    #[test]
    fn normalized_statistics_match_standardized_design() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let x = DMatrix::from_row_slice(4, 2, &[1.0, 100.0, 2.0, 300.0, 4.0, 200.0, 7.0, 500.0]);
        let y = DMatrix::from_row_slice(4, 1, &[1.0, -2.0, 0.5, 3.0]);

        for fit_intercept in [true, false] {
            let p = Preprocessor::new(fit_intercept, true).fitted(&x, false);
            let accumulated = SufficientStats::from_batch(&p.accumulation_design(&x), &y);
            let direct = SufficientStats::from_batch(&p.transform(&x), &y);
            let normalized = p.normalized(&accumulated);
            debug!("normalized gram: {}, direct gram: {}", normalized.gram(), direct.gram());

            assert_eq!(accumulated.gram().shape(), (3, 3));
            assert_eq!(normalized.gram().shape(), direct.gram().shape());
            assert!((normalized.gram() - direct.gram()).abs().max() < 1e-9);
            assert!((normalized.cross() - direct.cross()).abs().max() < 1e-9);
            assert_eq!(normalized.n_samples(), 4);
        }
    }

    #[test]
    fn earlier_batches_follow_the_scaler() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let first = DMatrix::from_row_slice(2, 1, &[0.0, 2.0]);
        let second = DMatrix::from_row_slice(3, 1, &[10.0, 12.0, 20.0]);
        let y1 = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let y2 = DMatrix::from_row_slice(3, 1, &[3.0, 4.0, 5.0]);

        let p = Preprocessor::new(true, true).fitted(&first, true);
        let stats = SufficientStats::from_batch(&p.accumulation_design(&first), &y1);
        let p = p.fitted(&second, true);
        let stats = stats.merged(&SufficientStats::from_batch(&p.accumulation_design(&second), &y2));

        let all = DMatrix::from_row_slice(5, 1, &[0.0, 2.0, 10.0, 12.0, 20.0]);
        let all_y = DMatrix::from_row_slice(5, 1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let direct = SufficientStats::from_batch(&p.transform(&all), &all_y);
        let normalized = p.normalized(&stats);

        assert!((normalized.gram() - direct.gram()).abs().max() < 1e-9);
        assert!((normalized.cross() - direct.cross()).abs().max() < 1e-9);
    }

    #[test]
    fn plain_statistics_are_borrowed() {
        let p = Preprocessor::new(true, false);
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let stats = SufficientStats::from_batch(&p.accumulation_design(&x), &x);

        assert!(matches!(p.normalized(&stats), Cow::Borrowed(_)));
    }
}
