use nalgebra::{DMatrix, Dim, Matrix};

use crate::{LinRegError, Result, SufficientStats};

/// `(K + ridge * I)^-1`
///
/// Fails if the regularized gram matrix can not be inverted or the inverse
/// is not finite. No further regularization is attempted.
pub(crate) fn regularized_inverse(gram: &DMatrix<f64>, ridge: f64) -> Result<DMatrix<f64>> {
    let dim = gram.nrows();
    let reg_m: DMatrix<f64> =
        Matrix::from_diagonal_element_generic(Dim::from_usize(dim), Dim::from_usize(dim), ridge);

    let inv = (gram + reg_m).try_inverse().ok_or(LinRegError::SingularMatrix { dim })?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(LinRegError::SingularMatrix { dim });
    }
    trace!("regularized inverse: {}", inv);

    Ok(inv)
}

/// Weights that overflowed on the way are reported like a failed inversion
fn finite_weights(weights: DMatrix<f64>) -> Result<DMatrix<f64>> {
    if weights.iter().all(|v| v.is_finite()) {
        Ok(weights)
    } else {
        Err(LinRegError::SingularMatrix { dim: weights.nrows() })
    }
}

/// Solve the ridge problem from scratch, `P * C`
pub(crate) fn ridge_solution(stats: &SufficientStats, ridge: f64) -> Result<DMatrix<f64>> {
    let p = regularized_inverse(stats.gram(), ridge)?;
    finite_weights(p * stats.cross())
}

/// Corrects existing weights with a new batch, `W + P * X^T * (Y - X * W)`,
/// where `P` is the inverse of the regularized gram matrix that already
/// includes the batch.
pub(crate) fn corrective_update(
    p: &DMatrix<f64>,
    weights: &DMatrix<f64>,
    design: &DMatrix<f64>,
    targets: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let residual = targets - design * weights;
    finite_weights(weights + p * (design.transpose() * residual))
}
