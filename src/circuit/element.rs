//! Circuit elements for DC analysis.
//!
//! Only the two-terminal linear elements a DC operating point needs are
//! modelled: resistors, capacitors (open at DC), inductors (short at DC) and
//! independent voltage / current sources.

use std::fmt;

use super::types::{Group, NodeId};

/// Element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Resistor (R)
    Resistor,
    /// Independent current source (I), current flows through the source
    /// from `pos` to `neg`, i.e. it is injected into `neg`
    CurrentSource,
    /// Capacitor (C), open circuit at DC
    Capacitor,
    /// Independent voltage source (V)
    VoltageSource,
    /// Inductor (L), zero-valued voltage source at DC
    Inductor,
}

impl ElementKind {
    /// Decode a netlist type tag (first letter of the element name).
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'I' => Some(Self::CurrentSource),
            'C' => Some(Self::Capacitor),
            'V' => Some(Self::VoltageSource),
            'L' => Some(Self::Inductor),
            _ => None,
        }
    }

    /// The single-letter tag for this kind.
    pub fn tag(&self) -> char {
        match self {
            Self::Resistor => 'R',
            Self::CurrentSource => 'I',
            Self::Capacitor => 'C',
            Self::VoltageSource => 'V',
            Self::Inductor => 'L',
        }
    }

    /// Group this kind lands in when the netlist does not ask otherwise.
    pub fn default_group(&self) -> Group {
        match self {
            Self::Resistor | Self::CurrentSource | Self::Capacitor => Group::One,
            Self::VoltageSource | Self::Inductor => Group::Two,
        }
    }

    /// Whether this kind may be listed in `group`.
    ///
    /// V and L always need a branch unknown. R, I and C may be moved to group
    /// 2 with the optional `G2` field, where they are reserved and stamp
    /// nothing.
    pub fn allowed_in(&self, group: Group) -> bool {
        match group {
            Group::One => self.default_group() == Group::One,
            Group::Two => true,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A circuit element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub name: String,
    /// Positive terminal
    pub pos: NodeId,
    /// Negative terminal
    pub neg: NodeId,
    /// Current value (may be moved by a sweep)
    pub value: f64,
    /// Operating-point value, restored after every sweep
    pub op_point_value: f64,
}

impl Element {
    /// Create a new element; the given value becomes its operating point.
    pub fn new(
        kind: ElementKind,
        name: impl Into<String>,
        pos: NodeId,
        neg: NodeId,
        value: f64,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            pos,
            neg,
            value,
            op_point_value: value,
        }
    }

    /// Set the value used by the next stamp or sweep sample.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Return to the operating-point value.
    pub fn restore(&mut self) {
        self.value = self.op_point_value;
    }

    /// Whether `name` designates this element (case-insensitive, SPICE style).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
