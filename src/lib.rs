//! # Spicy Core
//!
//! A DC circuit simulator built on Modified Nodal Analysis.
//!
//! This library provides:
//! - A SPICE-flavoured netlist reader
//! - MNA system assembly in dense or compressed-column storage
//! - Direct (LU, Cholesky) and Jacobi-preconditioned Krylov (CG, BiCG) solvers
//! - DC operating point and source sweeps
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`netlist`] - Lexer and parser for the netlist format
//! - [`circuit`] - Node table and the two element groups
//! - [`solver`] - Stamping, sparse storage, factorizations, Krylov methods and
//!   the [`Session`] that ties them together
//! - [`sweep`] - `.DC` sweep specification and sample sinks
//! - [`analysis`] - Executor for the netlist's `.DC` / `.PLOT` commands
//!
//! ## Usage
//!
//! ```bash
//! spicy divider.cir --output-dir results/
//! ```
//!
//! ```no_run
//! use spicy_core::{netlist, Circuit, Session, SolverOptions};
//!
//! let ast = netlist::parse("I1 0 1 1\nR1 1 0 1k\n")?;
//! let circuit = Circuit::from_ast(&ast)?;
//! let mut session = Session::new(circuit, SolverOptions::from_netlist(&ast.options))?;
//! session.operating_point()?;
//! println!("V(1) = {:?}", session.circuit().node_voltage("1"));
//! # Ok::<(), spicy_core::SpicyError>(())
//! ```
//!
//! ## Simulation Method
//!
//! Group-1 elements (resistors, current sources, capacitors) are stamped
//! directly into the node equations. Group-2 elements (voltage sources,
//! inductors, and R/I/C explicitly flagged `G2`) each add one branch-current
//! unknown. The matrix is assembled and factorized once; a sweep only edits
//! the right-hand side before each solve.

pub mod analysis;
pub mod circuit;
pub mod error;
pub mod netlist;
pub mod solver;
pub mod sweep;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SpicyError};
pub use solver::{Session, SolverOptions};
