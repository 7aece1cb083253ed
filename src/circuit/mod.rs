//! Circuit representation consumed by the MNA engine.
//!
//! A [`Circuit`] is the node table plus two ordered element lists. Group 1
//! holds elements that stamp directly into the node equations (R, I, C);
//! group 2 holds elements that own an auxiliary unknown (V, L). The order of
//! group 2 fixes the row of each auxiliary unknown.

mod element;
mod graph;
mod types;

pub use element::{Element, ElementKind};
pub use graph::Circuit;
pub use types::*;
