//! MNA stamping.
//!
//! Every element contributes a fixed pattern ("stamp") of additions to the
//! matrix and right-hand side. The stamps are written through
//! [`StampTarget`], so the same code fills the dense system and the sparse
//! triplet store.
//!
//! Terminal convention: `p` is the positive terminal, `m` the negative one.
//! A ground terminal has no row and its part of the stamp is skipped.

use nalgebra::{DMatrix, DVector};

use super::sparse::TripletMatrix;
use crate::circuit::{Circuit, Element, ElementKind, NodeId};
use crate::error::{Result, SpicyError};

/// Sink for matrix and right-hand-side contributions.
pub trait StampTarget {
    /// Make room for `entries` matrix additions about to be written.
    fn reserve(&mut self, _entries: usize) -> Result<()> {
        Ok(())
    }

    /// `A[row, col] += value`
    fn add_matrix(&mut self, row: usize, col: usize, value: f64);

    /// `b[row] += value`
    fn add_rhs(&mut self, row: usize, value: f64);
}

/// Dense system storage.
#[derive(Debug, Clone)]
pub struct DenseTarget {
    pub matrix: DMatrix<f64>,
    pub rhs: DVector<f64>,
}

impl DenseTarget {
    /// Zeroed `dim × dim` system.
    pub fn new(dim: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(dim, dim),
            rhs: DVector::zeros(dim),
        }
    }
}

impl StampTarget for DenseTarget {
    fn add_matrix(&mut self, row: usize, col: usize, value: f64) {
        self.matrix[(row, col)] += value;
    }

    fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }
}

/// Sparse system storage before compression.
///
/// The right-hand side is written twice: once into the live vector that
/// sweeps perturb, once into the pristine default copy.
#[derive(Debug, Clone)]
pub struct TripletTarget {
    pub triplets: TripletMatrix,
    pub rhs: DVector<f64>,
    pub default_rhs: DVector<f64>,
}

impl TripletTarget {
    pub fn new(dim: usize) -> Self {
        Self {
            triplets: TripletMatrix::new(dim, dim),
            rhs: DVector::zeros(dim),
            default_rhs: DVector::zeros(dim),
        }
    }
}

impl StampTarget for TripletTarget {
    fn reserve(&mut self, entries: usize) -> Result<()> {
        self.triplets.reserve(entries)
    }

    fn add_matrix(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push(row, col, value);
    }

    fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
        self.default_rhs[row] += value;
    }
}

/// Stamp every element of `circuit` into `target`.
///
/// Group-1 elements come first, then each group-2 element with its own
/// auxiliary row.
pub fn stamp_circuit<T: StampTarget>(circuit: &Circuit, target: &mut T) -> Result<()> {
    for element in &circuit.group1 {
        stamp_group1(element, target)?;
    }
    for (i, element) in circuit.group2.iter().enumerate() {
        stamp_group2(element, circuit.aux_index(i), target)?;
    }
    Ok(())
}

fn stamp_group1<T: StampTarget>(element: &Element, target: &mut T) -> Result<()> {
    match element.kind {
        ElementKind::Resistor => stamp_resistor(element, target),
        ElementKind::CurrentSource => {
            stamp_current_source(element.pos, element.neg, element.value, target);
            Ok(())
        }
        // Open circuit at DC
        ElementKind::Capacitor => Ok(()),
        ElementKind::VoltageSource | ElementKind::Inductor => Err(SpicyError::UnknownElementType {
            tag: element.kind.tag(),
            name: element.name.clone(),
            group: 1,
        }),
    }
}

fn stamp_group2<T: StampTarget>(element: &Element, k: usize, target: &mut T) -> Result<()> {
    match element.kind {
        ElementKind::VoltageSource => {
            stamp_branch(target, element.pos, element.neg, k, Some(element.value))
        }
        // Short circuit at DC: same coupling, no source term
        ElementKind::Inductor => stamp_branch(target, element.pos, element.neg, k, None),
        ElementKind::Resistor | ElementKind::CurrentSource | ElementKind::Capacitor => {
            tracing::trace!(element = %element.name, "group-2 {} has no DC stamp", element.kind);
            Ok(())
        }
    }
}

/// Conductance `1/R` between `p` and `m`.
fn stamp_resistor<T: StampTarget>(element: &Element, target: &mut T) -> Result<()> {
    if element.value == 0.0 {
        return Err(SpicyError::ZeroResistance {
            name: element.name.clone(),
        });
    }
    let g = 1.0 / element.value;

    match (element.pos.matrix_index(), element.neg.matrix_index()) {
        (Some(p), Some(m)) => {
            target.reserve(4)?;
            target.add_matrix(p, p, g);
            target.add_matrix(m, m, g);
            target.add_matrix(p, m, -g);
            target.add_matrix(m, p, -g);
        }
        (Some(p), None) => {
            target.reserve(1)?;
            target.add_matrix(p, p, g);
        }
        (None, Some(m)) => {
            target.reserve(1)?;
            target.add_matrix(m, m, g);
        }
        (None, None) => {
            tracing::debug!(
                element = %element.name,
                "resistor with both terminals grounded, skipped"
            );
        }
    }
    Ok(())
}

/// Current `s` flows through the source from `pos` to `neg`, i.e. it is
/// injected into `neg` and drawn from `pos`.
fn stamp_current_source<T: StampTarget>(pos: NodeId, neg: NodeId, s: f64, target: &mut T) {
    if let Some(m) = neg.matrix_index() {
        target.add_rhs(m, s);
    }
    if let Some(p) = pos.matrix_index() {
        target.add_rhs(p, -s);
    }
}

/// Couple auxiliary row `k` to the branch `pos`/`neg`.
///
/// Row `k` reads `V(pos) - V(neg) = s`; column `k` carries the branch current
/// into the node equations. `rhs` is `Some(s)` for a voltage source and
/// `None` for an inductor.
pub fn stamp_branch<T: StampTarget + ?Sized>(
    target: &mut T,
    pos: NodeId,
    neg: NodeId,
    k: usize,
    rhs: Option<f64>,
) -> Result<()> {
    let m = neg.matrix_index();
    let p = pos.matrix_index();
    let entries = 2 * (usize::from(m.is_some()) + usize::from(p.is_some()));
    if entries > 0 {
        target.reserve(entries)?;
    }

    if let Some(m) = m {
        target.add_matrix(k, m, -1.0);
        target.add_matrix(m, k, -1.0);
    }
    if let Some(p) = p {
        target.add_matrix(k, p, 1.0);
        target.add_matrix(p, k, 1.0);
    }
    if let Some(s) = rhs {
        target.add_rhs(k, s);
    }
    Ok(())
}
