//! Sparse direct factorizations.
//!
//! LU goes through `faer` (symbolic analysis, then a numeric factorization
//! with partial pivoting). Cholesky goes through `nalgebra-sparse`. Both are
//! computed once per session and reused for every right-hand side.

use faer::prelude::SpSolver;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::SparseColMat;
use faer::Mat;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;

use super::sparse::CscMatrix;
use crate::error::{Result, SpicyError};

fn check_rhs(n: usize, b: &DVector<f64>) -> Result<()> {
    if b.len() != n {
        return Err(SpicyError::DimensionMismatch {
            expected: n,
            actual: b.len(),
        });
    }
    Ok(())
}

/// Hand the compressed columns over to `faer`.
fn to_faer(a: &CscMatrix) -> Result<SparseColMat<usize, f64>> {
    let mut triplets = Vec::with_capacity(a.nnz());
    for col in 0..a.ncols() {
        triplets.extend(a.column(col).map(|(row, value)| (row, col, value)));
    }
    SparseColMat::<usize, f64>::try_new_from_triplets(a.nrows(), a.ncols(), &triplets).map_err(
        |e| SpicyError::SparseFormat {
            message: format!("{:?}", e),
        },
    )
}

/// Sparse LU factors `P A Q = L U`.
pub struct SparseLu {
    n: usize,
    lu: Lu<usize, f64>,
}

impl std::fmt::Debug for SparseLu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseLu").field("n", &self.n).finish()
    }
}

impl SparseLu {
    /// Analyze the pattern of `a`, then factorize its values.
    ///
    /// A structurally singular pattern is a [`SpicyError::SingularMatrix`]
    /// here; a numerically zero pivot surfaces from [`SparseLu::solve`].
    pub fn factor(a: &CscMatrix) -> Result<Self> {
        let n = a.ncols();
        if a.nrows() != n {
            return Err(SpicyError::DimensionMismatch {
                expected: n,
                actual: a.nrows(),
            });
        }

        let mat = to_faer(a)?;
        let symbolic = SymbolicLu::try_new(mat.symbolic()).map_err(|e| {
            tracing::debug!(error = ?e, "sparse LU symbolic analysis failed");
            SpicyError::SingularMatrix
        })?;
        let lu = Lu::try_new_with_symbolic(symbolic, mat.as_ref()).map_err(|e| {
            tracing::debug!(error = ?e, "sparse LU factorization failed");
            SpicyError::SingularMatrix
        })?;

        tracing::debug!(n, nnz = a.nnz(), "sparse LU factorized");
        Ok(Self { n, lu })
    }

    /// Solve `A x = b` with the stored factors.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        check_rhs(self.n, b)?;
        if self.n == 0 {
            return Ok(DVector::zeros(0));
        }

        let rhs = Mat::<f64>::from_fn(self.n, 1, |i, _| b[i]);
        let x = self.lu.solve(&rhs);

        let solution = DVector::from_fn(self.n, |i, _| x[(i, 0)]);
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(SpicyError::SingularMatrix);
        }
        Ok(solution)
    }
}

/// Sparse Cholesky factor `A = L Lᵀ`.
pub struct SparseCholesky {
    factor: CscCholesky<f64>,
}

impl std::fmt::Debug for SparseCholesky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseCholesky")
            .field("l_nnz", &self.factor.l().nnz())
            .finish()
    }
}

impl SparseCholesky {
    /// Factorize a symmetric positive definite matrix.
    pub fn factor(a: &CscMatrix) -> Result<Self> {
        let csc = a.to_nalgebra()?;
        let factor = CscCholesky::factor(&csc).map_err(|e| {
            tracing::debug!(error = ?e, "sparse Cholesky failed");
            SpicyError::NotPositiveDefinite
        })?;
        tracing::debug!(l_nnz = factor.l().nnz(), "sparse Cholesky factorized");
        Ok(Self { factor })
    }

    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        check_rhs(self.factor.l().ncols(), b)?;
        let mut x = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
        self.factor.solve_mut(&mut x);
        Ok(DVector::from_column_slice(x.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::TripletMatrix;
    use approx::assert_relative_eq;

    fn csc(dense: &DMatrix<f64>) -> CscMatrix {
        let mut t = TripletMatrix::new(dense.nrows(), dense.ncols());
        for j in 0..dense.ncols() {
            for i in 0..dense.nrows() {
                if dense[(i, j)] != 0.0 {
                    t.reserve(1).unwrap();
                    t.push(i, j, dense[(i, j)]);
                }
            }
        }
        t.compress()
    }

    #[test]
    fn test_lu_needs_pivoting() {
        // Zero in the (0,0) position: MNA with a voltage source at row 0
        let dense = DMatrix::from_row_slice(
            3,
            3,
            &[0.0, 1.0, 0.0, 1.0, 0.5, -0.5, 0.0, -0.5, 1.0],
        );
        let b = DVector::from_vec(vec![5.0, 0.0, 0.0]);

        let lu = SparseLu::factor(&csc(&dense)).unwrap();
        let x = lu.solve(&b).unwrap();
        assert_relative_eq!(&dense * &x, b, epsilon = 1e-12);
    }

    #[test]
    fn test_lu_matches_dense() {
        let dense = DMatrix::from_row_slice(
            4,
            4,
            &[
                4.0, -1.0, 0.0, 1.0, //
                -1.0, 4.0, -1.0, 0.0, //
                0.0, -1.0, 4.0, -1.0, //
                2.0, 0.0, -1.0, 3.0,
            ],
        );
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let lu = SparseLu::factor(&csc(&dense)).unwrap();
        let x = lu.solve(&b).unwrap();
        let expected = dense.lu().solve(&b).unwrap();
        assert_relative_eq!(x, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_lu_reused_for_several_rhs() {
        let dense = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 5.0, 7.0]);
        let lu = SparseLu::factor(&csc(&dense)).unwrap();
        for b in [[11.0, 13.0], [1.0, 0.0], [0.0, -3.0]] {
            let b = DVector::from_row_slice(&b);
            assert_relative_eq!(&dense * lu.solve(&b).unwrap(), b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lu_singular() {
        let dense = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let result = SparseLu::factor(&csc(&dense)).and_then(|lu| lu.solve(&b));
        assert!(matches!(result, Err(SpicyError::SingularMatrix)));
    }

    #[test]
    fn test_lu_rhs_length() {
        let lu = SparseLu::factor(&csc(&DMatrix::identity(3, 3))).unwrap();
        assert!(matches!(
            lu.solve(&DVector::zeros(2)),
            Err(SpicyError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_cholesky_solve() {
        let dense = DMatrix::from_row_slice(
            3,
            3,
            &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 3.0],
        );
        let b = DVector::from_vec(vec![1.0, 0.0, 2.0]);
        let chol = SparseCholesky::factor(&csc(&dense)).unwrap();
        let x = chol.solve(&b).unwrap();
        assert_relative_eq!(&dense * &x, b, epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let dense = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(matches!(
            SparseCholesky::factor(&csc(&dense)),
            Err(SpicyError::NotPositiveDefinite)
        ));
    }
}
