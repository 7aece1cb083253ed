//! Direct factorizations, computed once and reused for every solve.

use nalgebra::linalg::{Cholesky, LU};
use nalgebra::{DVector, Dyn};

use super::sparse_direct::{SparseCholesky, SparseLu};
use super::system::{MnaSystem, SystemMatrix};
use super::DirectMethod;
use crate::error::{Result, SpicyError};

/// A factorized system matrix.
#[derive(Debug)]
pub enum DirectSolver {
    DenseLu(LU<f64, Dyn, Dyn>),
    DenseCholesky(Cholesky<f64, Dyn>),
    SparseLu(SparseLu),
    SparseCholesky(SparseCholesky),
}

impl DirectSolver {
    /// Factorize the system matrix.
    ///
    /// The input is not checked beforehand. A non-SPD matrix handed to
    /// Cholesky is reported only when the factorization itself fails.
    pub fn factorize(system: &MnaSystem, method: DirectMethod) -> Result<Self> {
        let _span = tracing::info_span!("factorize", ?method, dim = system.dim()).entered();

        let solver = match (&system.matrix, method) {
            (SystemMatrix::Dense(a), DirectMethod::Lu) => DirectSolver::DenseLu(a.clone().lu()),
            (SystemMatrix::Dense(a), DirectMethod::Cholesky) => {
                let chol = a.clone().cholesky().ok_or(SpicyError::NotPositiveDefinite)?;
                DirectSolver::DenseCholesky(chol)
            }
            (SystemMatrix::Sparse(a), DirectMethod::Lu) => {
                DirectSolver::SparseLu(SparseLu::factor(a)?)
            }
            (SystemMatrix::Sparse(a), DirectMethod::Cholesky) => {
                DirectSolver::SparseCholesky(SparseCholesky::factor(a)?)
            }
        };
        Ok(solver)
    }

    /// Solve `A x = rhs`.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        match self {
            DirectSolver::DenseLu(lu) => {
                let mut x = rhs.clone();
                if lu.solve_mut(&mut x) {
                    Ok(x)
                } else {
                    Err(SpicyError::SingularMatrix)
                }
            }
            DirectSolver::DenseCholesky(chol) => {
                let mut x = rhs.clone();
                chol.solve_mut(&mut x);
                Ok(x)
            }
            DirectSolver::SparseLu(lu) => lu.solve(rhs),
            DirectSolver::SparseCholesky(chol) => chol.solve(rhs),
        }
    }

    pub fn method(&self) -> DirectMethod {
        match self {
            DirectSolver::DenseLu(_) | DirectSolver::SparseLu(_) => DirectMethod::Lu,
            DirectSolver::DenseCholesky(_) | DirectSolver::SparseCholesky(_) => {
                DirectMethod::Cholesky
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, Element, ElementKind, Group, NodeId};
    use crate::solver::StorageMode;
    use approx::assert_relative_eq;

    /// 1 A into node 1, 1 Ω from 1 to 2, 2 Ω from 2 to ground.
    fn series() -> Circuit {
        let mut c = Circuit::new();
        let n1 = c.add_node("1");
        let n2 = c.add_node("2");
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I1", NodeId::GROUND, n1, 1.0),
            Group::One,
        )
        .unwrap();
        c.add_element(Element::new(ElementKind::Resistor, "R1", n1, n2, 1.0), Group::One)
            .unwrap();
        c.add_element(
            Element::new(ElementKind::Resistor, "R2", n2, NodeId::GROUND, 2.0),
            Group::One,
        )
        .unwrap();
        c
    }

    /// 5 V source on node `in`, divider 1 kΩ / 2 kΩ to `out`.
    fn divider() -> Circuit {
        let mut c = Circuit::new();
        let vin = c.add_node("in");
        let out = c.add_node("out");
        c.add_element(
            Element::new(ElementKind::VoltageSource, "V1", vin, NodeId::GROUND, 5.0),
            Group::Two,
        )
        .unwrap();
        c.add_element(Element::new(ElementKind::Resistor, "R1", vin, out, 1e3), Group::One)
            .unwrap();
        c.add_element(
            Element::new(ElementKind::Resistor, "R2", out, NodeId::GROUND, 2e3),
            Group::One,
        )
        .unwrap();
        c
    }

    #[test]
    fn test_series_all_direct_backends() {
        let c = series();
        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            let system = MnaSystem::build(&c, storage).unwrap();
            for method in [DirectMethod::Lu, DirectMethod::Cholesky] {
                let solver = DirectSolver::factorize(&system, method).unwrap();
                assert_eq!(solver.method(), method);
                let x = solver.solve(&system.rhs).unwrap();
                assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
                assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_voltage_source_lu() {
        let c = divider();
        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            let system = MnaSystem::build(&c, storage).unwrap();
            let x = DirectSolver::factorize(&system, DirectMethod::Lu)
                .unwrap()
                .solve(&system.rhs)
                .unwrap();
            assert_relative_eq!(x[0], 5.0, epsilon = 1e-9);
            assert_relative_eq!(x[1], 5.0 * 2.0 / 3.0, epsilon = 1e-9);
            // Branch current flows into the source's positive terminal
            assert_relative_eq!(x[2], -5.0 / 3e3, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cholesky_on_indefinite_mna() {
        // A voltage source gives a zero diagonal: not SPD
        let c = divider();
        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            let system = MnaSystem::build(&c, storage).unwrap();
            assert!(matches!(
                DirectSolver::factorize(&system, DirectMethod::Cholesky),
                Err(SpicyError::NotPositiveDefinite)
            ));
        }
    }

    #[test]
    fn test_floating_node_is_singular() {
        let mut c = Circuit::new();
        let a = c.add_node("a");
        let b = c.add_node("b");
        c.add_element(Element::new(ElementKind::Resistor, "R1", a, b, 1.0), Group::One)
            .unwrap();
        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            let system = MnaSystem::build(&c, storage).unwrap();
            let result = DirectSolver::factorize(&system, DirectMethod::Lu)
                .and_then(|solver| solver.solve(&system.rhs));
            assert!(matches!(result, Err(SpicyError::SingularMatrix)));
        }
    }
}
