use nalgebra::{DMatrix, DMatrixView, DVector};

/// Anything that can be used as a design or target matrix, one sample per row
pub trait DesignMatrix {
    /// (samples, columns)
    fn shape(&self) -> (usize, usize);

    /// A dense copy of the samples
    fn to_dense(&self) -> DMatrix<f64>;
}

impl DesignMatrix for DMatrix<f64> {
    #[inline(always)]
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    #[inline(always)]
    fn to_dense(&self) -> DMatrix<f64> {
        self.clone()
    }
}

impl<'a> DesignMatrix for DMatrixView<'a, f64> {
    #[inline(always)]
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    #[inline(always)]
    fn to_dense(&self) -> DMatrix<f64> {
        self.clone_owned()
    }
}

/// A single column, e.g. the targets of a single-output regression
impl DesignMatrix for DVector<f64> {
    #[inline(always)]
    fn shape(&self) -> (usize, usize) {
        (self.len(), 1)
    }

    fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.len(), 1, self.as_slice())
    }
}

#[cfg(feature = "sparse")]
impl DesignMatrix for nalgebra::sparse::CsMatrix<f64> {
    #[inline(always)]
    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_and_view_agree() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let view = m.rows(1, 2);

        assert_eq!(DesignMatrix::shape(&m), (3, 2));
        assert_eq!(DesignMatrix::shape(&view), (2, 2));
        assert_eq!(view.to_dense(), DMatrix::from_row_slice(2, 2, &[3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn vector_is_one_column() {
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        assert_eq!(DesignMatrix::shape(&v), (3, 1));
        assert_eq!(v.to_dense(), DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]));
    }

    #[cfg(feature = "sparse")]
    #[test]
    fn sparse_densifies() {
        use nalgebra::sparse::CsMatrix;

        let cs = CsMatrix::from_triplet(2, 3, &[0, 1], &[2, 0], &[4.0, -1.0]);
        assert_eq!(DesignMatrix::shape(&cs), (2, 3));
        assert_eq!(
            cs.to_dense(),
            DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 4.0, -1.0, 0.0, 0.0])
        );
    }
}
