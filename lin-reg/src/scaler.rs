use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as constant columns
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Removes the mean and scales each column to unit variance.
/// The statistics can be fit at once or merged batch by batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    n_samples_seen: usize,
    mean: DVector<f64>,
    // population variance
    var: DVector<f64>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            n_samples_seen: 0,
            mean: DVector::zeros(0),
            var: DVector::zeros(0),
        }
    }
}

impl StandardScaler {
    /// Refit the statistics on this batch alone
    pub fn fit(&mut self, x: &DMatrix<f64>) {
        *self = Self::default();
        self.partial_fit(x);
    }

    /// Merge the statistics of `x` into the running ones
    pub fn partial_fit(&mut self, x: &DMatrix<f64>) {
        let n_b = x.nrows();
        if n_b == 0 {
            return;
        }
        let mean_b: DVector<f64> = x.row_mean().transpose();
        let var_b: DVector<f64> = x.row_variance().transpose();

        if self.n_samples_seen == 0 {
            self.n_samples_seen = n_b;
            self.mean = mean_b;
            self.var = var_b;
            return;
        }

        let n_a = self.n_samples_seen as f64;
        let n_b = n_b as f64;
        let n = n_a + n_b;
        let delta = &mean_b - &self.mean;
        let m2 = &self.var * n_a + var_b * n_b + delta.component_mul(&delta) * (n_a * n_b / n);

        self.mean += delta * (n_b / n);
        self.var = m2 / n;
        self.n_samples_seen += x.nrows();
    }

    /// Standardize `x` with the current statistics
    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let scale = self.scale();
        let mut out = x.clone();
        for (j, mut col) in out.column_iter_mut().enumerate() {
            col.add_scalar_mut(-self.mean[j]);
            col /= scale[j];
        }
        out
    }

    /// Per column standard deviation, with constant columns mapped to 1
    pub fn scale(&self) -> DVector<f64> {
        self.var.map(|v| {
            let s = v.sqrt();
            if s < MIN_SCALE {
                1.0
            } else {
                s
            }
        })
    }

    #[inline(always)]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    #[inline(always)]
    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    /// Bytes held by the scaler, including its heap allocations
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + (self.mean.len() + self.var.len()) * std::mem::size_of::<f64>()
    }
}
