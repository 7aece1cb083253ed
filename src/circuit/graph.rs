//! Circuit container: node table and the two element lists.

use std::collections::HashMap;

use nalgebra::DVector;

use super::element::{Element, ElementKind};
use super::types::{Group, Node, NodeId};
use crate::error::{Result, SpicyError};
use crate::netlist::NetlistAst;

/// A complete circuit ready for analysis.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Elements stamped without extra unknowns, in netlist order
    pub group1: Vec<Element>,

    /// Elements owning one auxiliary unknown each, in netlist order
    pub group2: Vec<Element>,

    /// Mapping from node names to node IDs
    pub node_map: HashMap<String, NodeId>,

    /// Nodes indexed by ID; entry 0 is ground
    pub nodes: Vec<Node>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit holding only the ground node.
    pub fn new() -> Self {
        let mut node_map = HashMap::new();
        node_map.insert("0".to_string(), NodeId::GROUND);
        Self {
            group1: Vec::new(),
            group2: Vec::new(),
            node_map,
            nodes: vec![Node::new("0")],
        }
    }

    /// Build a circuit from a parsed netlist.
    pub fn from_ast(ast: &NetlistAst) -> Result<Self> {
        let mut circuit = Circuit::new();

        for def in &ast.elements {
            let pos = circuit.add_node(&def.nodes[0]);
            let neg = circuit.add_node(&def.nodes[1]);
            let group = def.group.unwrap_or_else(|| def.kind.default_group());
            let element = Element::new(def.kind, def.name.clone(), pos, neg, def.value);
            circuit.add_element(element, group).map_err(|e| match e {
                SpicyError::DuplicateElement { .. } | SpicyError::UnknownElementType { .. } => {
                    SpicyError::invalid_element(&def.name, def.line, e.to_string())
                }
                other => other,
            })?;
        }

        Ok(circuit)
    }

    /// Look up a node by name, inserting it when it is new.
    ///
    /// `0` and `GND` (any case) are ground.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if is_ground_name(name) {
            return NodeId::GROUND;
        }
        if let Some(&id) = self.node_map.get(name) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name));
        self.node_map.insert(name.to_string(), id);
        id
    }

    /// Find a node by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        if is_ground_name(name) {
            return Some(NodeId::GROUND);
        }
        self.node_map.get(name).copied()
    }

    /// Append an element to `group`.
    pub fn add_element(&mut self, element: Element, group: Group) -> Result<()> {
        if !element.kind.allowed_in(group) {
            return Err(SpicyError::UnknownElementType {
                tag: element.kind.tag(),
                name: element.name,
                group: group.number(),
            });
        }
        if self.find_element(&element.name).is_some() {
            return Err(SpicyError::DuplicateElement { name: element.name });
        }
        for node in [element.pos, element.neg] {
            if node.0 >= self.nodes.len() {
                return Err(SpicyError::NodeNotFound {
                    node: node.to_string(),
                });
            }
        }
        match group {
            Group::One => self.group1.push(element),
            Group::Two => self.group2.push(element),
        }
        Ok(())
    }

    /// Find an element by name in either group.
    pub fn find_element(&self, name: &str) -> Option<(Group, usize)> {
        if let Some(i) = self.group1.iter().position(|e| e.is_named(name)) {
            return Some((Group::One, i));
        }
        self.group2
            .iter()
            .position(|e| e.is_named(name))
            .map(|i| (Group::Two, i))
    }

    /// Find an element of a given kind in one group.
    pub fn find_in_group(&self, group: Group, kind: ElementKind, name: &str) -> Option<usize> {
        self.elements(group)
            .iter()
            .position(|e| e.kind == kind && e.is_named(name))
    }

    /// Elements of one group.
    pub fn elements(&self, group: Group) -> &[Element] {
        match group {
            Group::One => &self.group1,
            Group::Two => &self.group2,
        }
    }

    /// Mutable access to one element.
    pub fn element_mut(&mut self, group: Group, index: usize) -> &mut Element {
        match group {
            Group::One => &mut self.group1[index],
            Group::Two => &mut self.group2[index],
        }
    }

    /// Number of nodes, ground included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Dimension of the MNA system: non-ground nodes plus one row per group-2 element.
    pub fn matrix_size(&self) -> usize {
        (self.node_count() - 1) + self.group2.len()
    }

    /// Row/column of the auxiliary unknown owned by the `index`-th group-2 element.
    pub fn aux_index(&self, index: usize) -> usize {
        (self.node_count() - 1) + index
    }

    /// Write a solution vector back into the node voltages.
    ///
    /// Node `id` receives `x[id - 1]`; ground stays at 0.
    pub fn apply_solution(&mut self, x: &DVector<f64>) {
        for (id, node) in self.nodes.iter_mut().enumerate().skip(1) {
            node.voltage = x[id - 1];
        }
    }

    /// Last solved voltage of a node.
    pub fn voltage(&self, node: NodeId) -> f64 {
        self.nodes.get(node.0).map(|n| n.voltage).unwrap_or(0.0)
    }

    /// Last solved voltage of a node by name.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        self.find_node(name).map(|id| self.voltage(id))
    }
}

fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("gnd")
}
