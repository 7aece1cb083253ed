//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a node in the circuit.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }

    /// Row/column of this node in the MNA system.
    ///
    /// Ground is not an unknown and has no row, so it maps to `None`.
    pub fn matrix_index(&self) -> Option<usize> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// Which element list an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Stamped directly, no extra unknown.
    One,
    /// Adds one auxiliary unknown (branch current) to the system.
    Two,
}

impl Group {
    /// Group number as written in diagnostics.
    pub fn number(&self) -> u8 {
        match self {
            Group::One => 1,
            Group::Two => 2,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.number())
    }
}

/// A node of the circuit together with its last solved voltage.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Voltage written back after every solve (0 for ground).
    pub voltage: f64,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voltage: 0.0,
        }
    }
}
