//! Assembled MNA system.

use nalgebra::{DMatrix, DVector};

use super::mna::{stamp_circuit, DenseTarget, TripletTarget};
use super::sparse::CscMatrix;
use super::StorageMode;
use crate::circuit::Circuit;
use crate::error::Result;

/// System matrix in one of the two storage modes.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemMatrix {
    Dense(DMatrix<f64>),
    Sparse(CscMatrix),
}

impl SystemMatrix {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        match self {
            SystemMatrix::Dense(m) => m.nrows(),
            SystemMatrix::Sparse(m) => m.nrows(),
        }
    }

    pub fn storage(&self) -> StorageMode {
        match self {
            SystemMatrix::Dense(_) => StorageMode::Dense,
            SystemMatrix::Sparse(_) => StorageMode::Sparse,
        }
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            SystemMatrix::Dense(m) => m.clone(),
            SystemMatrix::Sparse(m) => m.to_dense(),
        }
    }
}

/// `A x = b` for one circuit topology.
///
/// The matrix is built once. Sweeps only touch `rhs`; in sparse mode
/// `default_rhs` keeps the unperturbed vector they restart from.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    pub matrix: SystemMatrix,
    pub rhs: DVector<f64>,
    pub default_rhs: Option<DVector<f64>>,
}

impl MnaSystem {
    /// Stamp `circuit` into freshly zeroed storage.
    pub fn build(circuit: &Circuit, storage: StorageMode) -> Result<Self> {
        let dim = circuit.matrix_size();
        let _span = tracing::info_span!("mna_build", dim, ?storage).entered();

        let system = match storage {
            StorageMode::Dense => {
                let mut target = DenseTarget::new(dim);
                stamp_circuit(circuit, &mut target)?;
                MnaSystem {
                    matrix: SystemMatrix::Dense(target.matrix),
                    rhs: target.rhs,
                    default_rhs: None,
                }
            }
            StorageMode::Sparse => {
                let mut target = TripletTarget::new(dim);
                stamp_circuit(circuit, &mut target)?;
                let triplets = target.triplets.len();
                let matrix = target.triplets.compress();
                tracing::debug!(triplets, nnz = matrix.nnz(), "compressed system matrix");
                MnaSystem {
                    matrix: SystemMatrix::Sparse(matrix),
                    rhs: target.rhs,
                    default_rhs: Some(target.default_rhs),
                }
            }
        };

        tracing::debug!(
            nodes = circuit.node_count() - 1,
            branches = circuit.group2.len(),
            "MNA system assembled"
        );
        Ok(system)
    }

    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    pub fn storage(&self) -> StorageMode {
        self.matrix.storage()
    }

    /// Copy the unperturbed right-hand side back (sparse mode only).
    pub fn reset_rhs(&mut self) {
        if let Some(default) = &self.default_rhs {
            self.rhs.copy_from(default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Element, ElementKind, Group, NodeId};

    fn ladder() -> Circuit {
        let mut c = Circuit::new();
        let n1 = c.add_node("1");
        let n2 = c.add_node("2");
        let n3 = c.add_node("3");
        for (name, pos, neg, value) in [
            ("R1", n1, n2, 1.0),
            ("R2", n2, n3, 2.0),
            ("R3", n3, NodeId::GROUND, 3.0),
            ("R4", n1, NodeId::GROUND, 10.0),
        ] {
            c.add_element(Element::new(ElementKind::Resistor, name, pos, neg, value), Group::One)
                .unwrap();
        }
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I1", NodeId::GROUND, n1, 2.0),
            Group::One,
        )
        .unwrap();
        c
    }

    #[test]
    fn test_dense_and_sparse_equivalent() {
        let c = ladder();
        let dense = MnaSystem::build(&c, StorageMode::Dense).unwrap();
        let sparse = MnaSystem::build(&c, StorageMode::Sparse).unwrap();

        assert_eq!(dense.dim(), 3);
        assert_eq!(dense.matrix.to_dense(), sparse.matrix.to_dense());
        assert_eq!(dense.rhs, sparse.rhs);
        assert_eq!(sparse.default_rhs.as_ref(), Some(&sparse.rhs));
        assert!(dense.default_rhs.is_none());
    }

    #[test]
    fn test_build_is_idempotent() {
        let c = ladder();
        let first = MnaSystem::build(&c, StorageMode::Sparse).unwrap();
        let second = MnaSystem::build(&c, StorageMode::Sparse).unwrap();
        assert_eq!(first.matrix, second.matrix);
        assert_eq!(first.rhs, second.rhs);
    }

    #[test]
    fn test_reset_rhs() {
        let c = ladder();
        let mut sparse = MnaSystem::build(&c, StorageMode::Sparse).unwrap();
        sparse.rhs[0] = 42.0;
        sparse.reset_rhs();
        assert_eq!(sparse.rhs[0], 2.0);
    }
}
