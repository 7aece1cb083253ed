//! Error types for the Spicy DC engine.
//!
//! This module provides a unified error type [`SpicyError`] that covers
//! netlist parsing, system assembly, factorization, iterative solving and
//! sweep execution.
//!
//! Errors fall into two classes. Invariant violations and numerically
//! unsolvable setups (allocation failure, unknown element type, solver
//! breakdown) end the run. Malformed sweep or plot commands are skipped by
//! the command executor, which moves on to the next command; use
//! [`SpicyError::is_recoverable`] to tell them apart.

use thiserror::Error;

/// Result type alias using [`SpicyError`].
pub type Result<T> = std::result::Result<T, SpicyError>;

/// Unified error type for all Spicy operations.
#[derive(Error, Debug)]
pub enum SpicyError {
    // ============ Netlist Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Invalid element definition
    #[error("Invalid element '{name}' at line {line}: {message}")]
    InvalidElement {
        name: String,
        line: usize,
        message: String,
    },

    /// Duplicate element name
    #[error("Duplicate element name '{name}'")]
    DuplicateElement { name: String },

    /// Node not found in the node table
    #[error("Node '{node}' not found in circuit")]
    NodeNotFound { node: String },

    // ============ Assembly Errors ============
    /// Element type tag outside the recognized set, or not valid in its group
    #[error("Unknown element type '{tag}' for '{name}' in group {group}")]
    UnknownElementType {
        tag: char,
        name: String,
        group: u8,
    },

    /// Resistor with a value of exactly zero
    #[error("Resistor '{name}' has zero resistance")]
    ZeroResistance { name: String },

    /// Storage for the system could not be reserved
    #[error("Out of memory while allocating {what} ({requested} entries)")]
    OutOfMemory { what: &'static str, requested: usize },

    /// Vector length does not match the system dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Compressed-column data rejected by the sparse backend
    #[error("Invalid sparse matrix structure: {message}")]
    SparseFormat { message: String },

    // ============ Solver Errors ============
    /// LU factorization met a zero pivot
    #[error("Singular matrix - circuit may have a floating node or a voltage source loop")]
    SingularMatrix,

    /// Cholesky factorization on a matrix that is not positive definite
    #[error("Matrix is not symmetric positive definite - Cholesky is not applicable")]
    NotPositiveDefinite,

    /// Krylov method met a numerically zero inner product
    #[error(
        "{method} breakdown at iteration {iteration}: |{quantity}| = {value:.3e} is below threshold"
    )]
    SolverBreakdown {
        method: &'static str,
        iteration: usize,
        quantity: &'static str,
        value: f64,
    },

    // ============ Sweep Errors ============
    /// Malformed `.DC` command
    #[error("Invalid sweep command '{command}': {reason}")]
    InvalidSweep { command: String, reason: String },

    /// Malformed `.PLOT` / `.PRINT` command
    #[error("Invalid plot command '{command}': {reason}")]
    InvalidPlot { command: String, reason: String },

    // ============ I/O Errors ============
    /// Error reading the netlist file
    #[error("Failed to read netlist '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing results
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpicyError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid element error
    pub fn invalid_element(
        name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidElement {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid sweep command error
    pub fn invalid_sweep(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSweep {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid plot command error
    pub fn invalid_plot(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlot {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create a Krylov breakdown error
    pub fn breakdown(
        method: &'static str,
        iteration: usize,
        quantity: &'static str,
        value: f64,
    ) -> Self {
        Self::SolverBreakdown {
            method,
            iteration,
            quantity,
            value,
        }
    }

    /// Whether the command executor may skip the failing command and go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidSweep { .. } | Self::InvalidPlot { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(SpicyError::invalid_sweep(".DC I1", "not enough arguments").is_recoverable());
        assert!(SpicyError::invalid_plot(".PLOT", "not enough arguments").is_recoverable());
        assert!(!SpicyError::SingularMatrix.is_recoverable());
        assert!(!SpicyError::breakdown("BiCG", 0, "rho", 0.0).is_recoverable());
    }

    #[test]
    fn test_breakdown_message() {
        let err = SpicyError::breakdown("BiCG", 3, "omega", 1e-20);
        let msg = err.to_string();
        assert!(msg.contains("BiCG"));
        assert!(msg.contains("iteration 3"));
        assert!(msg.contains("omega"));
    }
}
