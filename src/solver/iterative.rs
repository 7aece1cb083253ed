//! Jacobi-preconditioned Krylov solvers.
//!
//! Both methods start from `x = 0` and stop once the relative residual
//! `‖r‖ / max(‖b‖, 1)` drops to the tolerance or the iteration cap is hit.
//! The work vectors are allocated once, when the solver is created, and
//! reused for every right-hand side.

use nalgebra::{DMatrix, DVector};

use super::sparse::CscMatrix;
use super::system::{MnaSystem, SystemMatrix};
use super::{KrylovMethod, BREAKDOWN_EPSILON, ITOL_DEFAULT, MAX_ITERATIONS};
use crate::error::{Result, SpicyError};

/// Matrix-free view of a square system matrix.
pub trait LinearOperator {
    fn dim(&self) -> usize;

    fn diagonal(&self) -> DVector<f64>;

    /// `y = A x`
    fn mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>);

    /// `y = Aᵀ x`
    fn tr_mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>);
}

impl LinearOperator for DMatrix<f64> {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn diagonal(&self) -> DVector<f64> {
        DMatrix::diagonal(self)
    }

    fn mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        y.gemv(1.0, self, x, 0.0);
    }

    fn tr_mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        y.gemv_tr(1.0, self, x, 0.0);
    }
}

impl LinearOperator for CscMatrix {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn diagonal(&self) -> DVector<f64> {
        CscMatrix::diagonal(self)
    }

    fn mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        CscMatrix::mul_vec_into(self, x, y)
    }

    fn tr_mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        CscMatrix::tr_mul_vec_into(self, x, y)
    }
}

impl LinearOperator for SystemMatrix {
    fn dim(&self) -> usize {
        SystemMatrix::dim(self)
    }

    fn diagonal(&self) -> DVector<f64> {
        match self {
            SystemMatrix::Dense(a) => LinearOperator::diagonal(a),
            SystemMatrix::Sparse(a) => LinearOperator::diagonal(a),
        }
    }

    fn mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        match self {
            SystemMatrix::Dense(a) => LinearOperator::mul_vec_into(a, x, y),
            SystemMatrix::Sparse(a) => LinearOperator::mul_vec_into(a, x, y),
        }
    }

    fn tr_mul_vec_into(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        match self {
            SystemMatrix::Dense(a) => LinearOperator::tr_mul_vec_into(a, x, y),
            SystemMatrix::Sparse(a) => LinearOperator::tr_mul_vec_into(a, x, y),
        }
    }
}

/// Stopping and breakdown parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub breakdown_epsilon: f64,
}

impl Default for IterativeConfig {
    fn default() -> Self {
        Self {
            tolerance: ITOL_DEFAULT,
            max_iterations: MAX_ITERATIONS,
            breakdown_epsilon: BREAKDOWN_EPSILON,
        }
    }
}

/// How a Krylov solve ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeOutcome {
    pub iterations: usize,
    /// `‖r‖ / max(‖b‖, 1)` at exit
    pub relative_residual: f64,
    pub converged: bool,
}

/// Work vectors only BiCG needs.
#[derive(Debug, Clone)]
struct ShadowVectors {
    z: DVector<f64>,
    r: DVector<f64>,
    p: DVector<f64>,
    q: DVector<f64>,
}

impl ShadowVectors {
    fn new(n: usize) -> Self {
        Self {
            z: DVector::zeros(n),
            r: DVector::zeros(n),
            p: DVector::zeros(n),
            q: DVector::zeros(n),
        }
    }
}

/// CG or BiCG with a Jacobi preconditioner and preallocated workspace.
#[derive(Debug, Clone)]
pub struct IterativeSolver {
    method: KrylovMethod,
    config: IterativeConfig,
    /// Jacobi diagonal `M`
    precond: DVector<f64>,
    x: DVector<f64>,
    z: DVector<f64>,
    r: DVector<f64>,
    p: DVector<f64>,
    q: DVector<f64>,
    shadow: Option<ShadowVectors>,
}

impl IterativeSolver {
    /// Build the preconditioner and allocate the workspace for `system`.
    pub fn new(system: &MnaSystem, method: KrylovMethod, config: IterativeConfig) -> Self {
        Self::for_operator(&system.matrix, method, config)
    }

    /// Same as [`IterativeSolver::new`] for any operator.
    pub fn for_operator<A: LinearOperator + ?Sized>(
        a: &A,
        method: KrylovMethod,
        config: IterativeConfig,
    ) -> Self {
        let n = a.dim();
        let precond = jacobi(&a.diagonal());
        tracing::debug!(
            n,
            method = method.name(),
            tolerance = config.tolerance,
            "Krylov workspace allocated"
        );
        Self {
            method,
            config,
            precond,
            x: DVector::zeros(n),
            z: DVector::zeros(n),
            r: DVector::zeros(n),
            p: DVector::zeros(n),
            q: DVector::zeros(n),
            shadow: match method {
                KrylovMethod::Cg => None,
                KrylovMethod::BiCg => Some(ShadowVectors::new(n)),
            },
        }
    }

    pub fn method(&self) -> KrylovMethod {
        self.method
    }

    pub fn config(&self) -> &IterativeConfig {
        &self.config
    }

    /// Iterate of the last solve.
    pub fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    /// Solve `A x = b`; the result is left in [`IterativeSolver::solution`].
    ///
    /// Reaching the iteration cap is not an error: the outcome says
    /// `converged: false` and the last iterate is kept.
    pub fn solve<A: LinearOperator + ?Sized>(
        &mut self,
        a: &A,
        b: &DVector<f64>,
    ) -> Result<IterativeOutcome> {
        let n = self.x.len();
        if b.len() != n || a.dim() != n {
            return Err(SpicyError::DimensionMismatch {
                expected: n,
                actual: if b.len() != n { b.len() } else { a.dim() },
            });
        }

        let outcome = match self.method {
            KrylovMethod::Cg => self.conjugate_gradient(a, b),
            KrylovMethod::BiCg => self.biconjugate_gradient(a, b)?,
        };

        if outcome.converged {
            tracing::trace!(
                iterations = outcome.iterations,
                residual = outcome.relative_residual,
                "converged"
            );
        } else {
            tracing::warn!(
                method = self.method.name(),
                iterations = outcome.iterations,
                residual = outcome.relative_residual,
                tolerance = self.config.tolerance,
                "iteration cap reached without convergence"
            );
        }
        Ok(outcome)
    }

    fn conjugate_gradient<A: LinearOperator + ?Sized>(
        &mut self,
        a: &A,
        b: &DVector<f64>,
    ) -> IterativeOutcome {
        let b_norm = b.norm().max(1.0);
        self.x.fill(0.0);
        self.r.copy_from(b);

        let mut rho_prev = 0.0;
        let mut iter = 0;
        while iter < self.config.max_iterations {
            if self.r.norm() / b_norm <= self.config.tolerance {
                break;
            }

            self.z.copy_from(&self.r);
            self.z.component_div_assign(&self.precond);
            let rho = self.r.dot(&self.z);

            if iter == 0 {
                self.p.copy_from(&self.z);
            } else {
                self.p.axpy(1.0, &self.z, rho / rho_prev);
            }

            a.mul_vec_into(&self.p, &mut self.q);
            let alpha = rho / self.p.dot(&self.q);
            self.x.axpy(alpha, &self.p, 1.0);
            self.r.axpy(-alpha, &self.q, 1.0);

            rho_prev = rho;
            iter += 1;
        }

        self.outcome(iter, b_norm)
    }

    fn biconjugate_gradient<A: LinearOperator + ?Sized>(
        &mut self,
        a: &A,
        b: &DVector<f64>,
    ) -> Result<IterativeOutcome> {
        let n = self.x.len();
        let eps = self.config.breakdown_epsilon;
        let b_norm = b.norm().max(1.0);
        let shadow = self.shadow.get_or_insert_with(|| ShadowVectors::new(n));

        self.x.fill(0.0);
        self.r.copy_from(b);
        shadow.r.copy_from(b);

        let mut rho_prev = 0.0;
        let mut iter = 0;
        while iter < self.config.max_iterations {
            if self.r.norm() / b_norm <= self.config.tolerance {
                break;
            }

            self.z.copy_from(&self.r);
            self.z.component_div_assign(&self.precond);
            shadow.z.copy_from(&shadow.r);
            shadow.z.component_div_assign(&self.precond);

            let rho = shadow.r.dot(&self.z);
            if rho.abs() < eps {
                return Err(SpicyError::breakdown("BiCG", iter, "rho", rho));
            }

            if iter == 0 {
                self.p.copy_from(&self.z);
                shadow.p.copy_from(&shadow.z);
            } else {
                let beta = rho / rho_prev;
                self.p.axpy(1.0, &self.z, beta);
                shadow.p.axpy(1.0, &shadow.z, beta);
            }

            a.mul_vec_into(&self.p, &mut self.q);
            a.tr_mul_vec_into(&shadow.p, &mut shadow.q);

            let omega = shadow.p.dot(&self.q);
            if omega.abs() < eps {
                return Err(SpicyError::breakdown("BiCG", iter, "omega", omega));
            }

            let alpha = rho / omega;
            self.x.axpy(alpha, &self.p, 1.0);
            self.r.axpy(-alpha, &self.q, 1.0);
            shadow.r.axpy(-alpha, &shadow.q, 1.0);

            rho_prev = rho;
            iter += 1;
        }

        Ok(self.outcome(iter, b_norm))
    }

    fn outcome(&self, iterations: usize, b_norm: f64) -> IterativeOutcome {
        let relative_residual = self.r.norm() / b_norm;
        IterativeOutcome {
            iterations,
            relative_residual,
            converged: relative_residual <= self.config.tolerance,
        }
    }
}

/// Jacobi diagonal: ones, with every nonzero diagonal entry copied in.
fn jacobi(diagonal: &DVector<f64>) -> DVector<f64> {
    diagonal.map(|d| if d != 0.0 { d } else { 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::TripletMatrix;
    use approx::assert_relative_eq;

    fn tight() -> IterativeConfig {
        IterativeConfig {
            tolerance: 1e-12,
            max_iterations: 100,
            breakdown_epsilon: 1e-30,
        }
    }

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            4,
            &[
                4.0, -1.0, 0.0, 0.0, //
                -1.0, 4.0, -1.0, 0.0, //
                0.0, -1.0, 4.0, -1.0, //
                0.0, 0.0, -1.0, 3.0,
            ],
        )
    }

    fn to_csc(dense: &DMatrix<f64>) -> CscMatrix {
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
    fn test_jacobi_keeps_ones_for_zero_diagonal() {
        let m = jacobi(&DVector::from_vec(vec![2.0, 0.0, -3.0]));
        assert_eq!(m, DVector::from_vec(vec![2.0, 1.0, -3.0]));
    }

    #[test]
    fn test_cg_and_bicg_agree_with_lu() {
        let a = spd();
        let b = DVector::from_vec(vec![1.0, 2.0, 0.0, -1.0]);
        let expected = a.clone().lu().solve(&b).unwrap();

        for method in [KrylovMethod::Cg, KrylovMethod::BiCg] {
            let mut solver = IterativeSolver::for_operator(&a, method, tight());
            let outcome = solver.solve(&a, &b).unwrap();
            assert!(outcome.converged, "{} did not converge", method.name());
            assert_relative_eq!(solver.solution(), &expected, epsilon = 1e-9, max_relative = 1e-6);

            let sparse = to_csc(&a);
            let mut solver = IterativeSolver::for_operator(&sparse, method, tight());
            solver.solve(&sparse, &b).unwrap();
            assert_relative_eq!(solver.solution(), &expected, epsilon = 1e-9, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_bicg_nonsymmetric() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, -1.0, 3.0, 1.0, 0.0, 2.0, 5.0]);
        let b = DVector::from_vec(vec![1.0, 0.0, 2.0]);
        let expected = a.clone().lu().solve(&b).unwrap();

        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::BiCg, tight());
        let outcome = solver.solve(&a, &b).unwrap();
        assert!(outcome.converged);
        assert_relative_eq!(solver.solution(), &expected, epsilon = 1e-9, max_relative = 1e-6);
    }

    #[test]
    fn test_bicg_breakdown_on_rho() {
        // diag(1, -1) with b = [1, 1]: r̃·M⁻¹r = 1 - 1 = 0 on the first step
        let a = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0]));
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let config = IterativeConfig::default();
        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::BiCg, config);
        assert!(matches!(
            solver.solve(&a, &b),
            Err(SpicyError::SolverBreakdown {
                method: "BiCG",
                iteration: 0,
                quantity: "rho",
                ..
            })
        ));
    }

    #[test]
    fn test_bicg_breakdown_on_omega() {
        // Unit diagonal, so M = I; bᵀAb = (b₁ - b₂)² vanishes for b = [1, 1]
        let a = DMatrix::from_row_slice(2, 2, &[1.0, -3.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::BiCg, tight());
        assert!(matches!(
            solver.solve(&a, &b),
            Err(SpicyError::SolverBreakdown {
                method: "BiCG",
                iteration: 0,
                quantity: "omega",
                ..
            })
        ));
    }

    #[test]
    fn test_bicg_breakdown_after_first_step() {
        // Lower triangular with b = e₁: the first step leaves r = [0, -1]
        // but annihilates the shadow residual, so rho is zero at iteration 1
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, 0.0]);
        for config in [tight(), IterativeConfig::default()] {
            let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::BiCg, config);
            let err = solver.solve(&a, &b).unwrap_err();
            assert!(matches!(
                err,
                SpicyError::SolverBreakdown {
                    method: "BiCG",
                    iteration: 1,
                    quantity: "rho",
                    ..
                }
            ));
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn test_zero_rhs_needs_no_iteration() {
        let a = spd();
        let b = DVector::zeros(4);
        let config = IterativeConfig::default();
        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::Cg, config);
        let outcome = solver.solve(&a, &b).unwrap();
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.converged);
        assert_eq!(solver.solution(), &DVector::zeros(4));
    }

    #[test]
    fn test_iteration_cap_reported() {
        let a = spd();
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let config = IterativeConfig {
            tolerance: 1e-14,
            max_iterations: 1,
            ..IterativeConfig::default()
        };
        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::Cg, config);
        let outcome = solver.solve(&a, &b).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.converged);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = spd();
        let config = IterativeConfig::default();
        let mut solver = IterativeSolver::for_operator(&a, KrylovMethod::Cg, config);
        assert!(matches!(
            solver.solve(&a, &DVector::zeros(3)),
            Err(SpicyError::DimensionMismatch { expected: 4, actual: 3 })
        ));
    }
}
