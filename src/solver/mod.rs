//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for DC analysis.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = b where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - b is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ Bᵀ  0 ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B connects voltage sources and inductors to nodes
//! - v is the vector of node voltages
//! - j is the vector of group-2 branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of voltage source values (0 for inductors)
//!
//! ## Strategies
//!
//! The system is assembled once, dense or sparse, and solved with one of
//! four strategies picked through [`SolverOptions`]:
//!
//! - LU (dense or sparse), factorized once
//! - Cholesky (dense or sparse), factorized once, SPD systems only
//! - Jacobi-preconditioned Conjugate Gradient, symmetric systems
//! - Jacobi-preconditioned Biconjugate Gradient, general systems

mod direct;
mod iterative;
mod mna;
mod session;
mod sparse;
mod sparse_direct;
mod system;

pub use direct::DirectSolver;
pub use iterative::{IterativeConfig, IterativeOutcome, IterativeSolver, LinearOperator};
pub use mna::{stamp_circuit, DenseTarget, StampTarget, TripletTarget};
pub use session::{Session, SolveReport};
pub use sparse::{CscMatrix, TripletMatrix};
pub use sparse_direct::{SparseCholesky, SparseLu};
pub use system::{MnaSystem, SystemMatrix};

use std::fmt;
use std::str::FromStr;

use crate::netlist::OptionsDef;

/// Default relative residual tolerance for the Krylov methods.
pub const ITOL_DEFAULT: f64 = 1e-3;

/// Default iteration cap for the Krylov methods.
pub const MAX_ITERATIONS: usize = 1000;

/// Inner products below this magnitude are a BiCG breakdown.
pub const BREAKDOWN_EPSILON: f64 = 1e-14;

/// How the MNA matrix is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    #[default]
    Dense,
    Sparse,
}

/// Direct factorization flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMethod {
    Lu,
    Cholesky,
}

/// Krylov method flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KrylovMethod {
    /// Conjugate Gradient (symmetric systems)
    Cg,
    /// Biconjugate Gradient (general systems)
    BiCg,
}

impl KrylovMethod {
    pub fn name(&self) -> &'static str {
        match self {
            KrylovMethod::Cg => "CG",
            KrylovMethod::BiCg => "BiCG",
        }
    }
}

/// Solution strategy, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverMethod {
    #[default]
    Lu,
    Cholesky,
    Cg,
    BiCg,
}

impl SolverMethod {
    /// Pick the strategy the way `.OPTIONS` flags combine:
    /// `SPD` alone is Cholesky, `ITER` alone is BiCG, both is CG.
    pub fn from_flags(spd: bool, iter: bool) -> Self {
        match (spd, iter) {
            (false, false) => SolverMethod::Lu,
            (true, false) => SolverMethod::Cholesky,
            (true, true) => SolverMethod::Cg,
            (false, true) => SolverMethod::BiCg,
        }
    }
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverMethod::Lu => "lu",
            SolverMethod::Cholesky => "cholesky",
            SolverMethod::Cg => "cg",
            SolverMethod::BiCg => "bicg",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SolverMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lu" => Ok(SolverMethod::Lu),
            "cholesky" | "chol" => Ok(SolverMethod::Cholesky),
            "cg" => Ok(SolverMethod::Cg),
            "bicg" | "bi-cg" => Ok(SolverMethod::BiCg),
            other => Err(format!("unknown solver '{}' (expected lu, cholesky, cg or bicg)", other)),
        }
    }
}

/// Configuration for a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Dense or compressed-column storage.
    pub storage: StorageMode,
    /// Solution strategy.
    pub method: SolverMethod,
    /// Krylov stopping threshold on `‖r‖ / max(‖b‖, 1)`.
    pub tolerance: f64,
    /// Krylov iteration cap.
    pub max_iterations: usize,
    /// BiCG breakdown threshold.
    pub breakdown_epsilon: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            storage: StorageMode::Dense,
            method: SolverMethod::Lu,
            tolerance: ITOL_DEFAULT,
            max_iterations: MAX_ITERATIONS,
            breakdown_epsilon: BREAKDOWN_EPSILON,
        }
    }
}

impl SolverOptions {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the netlist's `.OPTIONS` flags.
    pub fn from_netlist(options: &OptionsDef) -> Self {
        let mut config = Self::new()
            .with_method(SolverMethod::from_flags(options.spd, options.iter))
            .with_storage(if options.sparse {
                StorageMode::Sparse
            } else {
                StorageMode::Dense
            });
        if let Some(itol) = options.itol {
            config = config.with_tolerance(itol);
        }
        config
    }

    /// Set the storage mode.
    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    /// Set the solution strategy.
    pub fn with_method(mut self, method: SolverMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the Krylov tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the Krylov iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the BiCG breakdown threshold.
    pub fn with_breakdown_epsilon(mut self, epsilon: f64) -> Self {
        self.breakdown_epsilon = epsilon;
        self
    }

    /// Iterative settings carried by this configuration.
    pub fn iterative_config(&self) -> IterativeConfig {
        IterativeConfig {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            breakdown_epsilon: self.breakdown_epsilon,
        }
    }
}
