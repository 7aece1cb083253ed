//! Syntax tree produced by the netlist parser.

use crate::circuit::{ElementKind, Group};

/// Complete representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct NetlistAst {
    /// Element lines, in file order
    pub elements: Vec<ElementDef>,
    /// Merged `.OPTIONS` lines
    pub options: OptionsDef,
    /// `.DC`, `.PLOT` and `.PRINT` lines, verbatim and in file order
    pub commands: Vec<String>,
}

impl NetlistAst {
    /// Create a new empty netlist.
    pub fn new() -> Self {
        Self::default()
    }
}

/// An element line.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub kind: ElementKind,
    /// Full element name, type letter included
    pub name: String,
    /// `[positive, negative]` node names
    pub nodes: [String; 2],
    pub value: f64,
    /// Explicit group from the optional `G2` field
    pub group: Option<Group>,
    /// Source line number for error reporting
    pub line: usize,
}

/// Flags collected from `.OPTIONS` lines.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptionsDef {
    /// `SPD`: the matrix is symmetric positive definite
    pub spd: bool,
    /// `ITER`: use a Krylov method instead of a direct factorization
    pub iter: bool,
    /// `SPARSE`: assemble in compressed-column form
    pub sparse: bool,
    /// `ITOL=<value>`: Krylov relative tolerance
    pub itol: Option<f64>,
}
