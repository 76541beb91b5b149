// src/physics/bonds/mod.rs
//! Periodic bond graph over unit-cell atoms and the traversal built on it.

pub mod graph;
pub mod traversal;

use serde::{Deserialize, Serialize};

pub use graph::{PeriodicBondGraph, PeriodicEdge};
pub use traversal::{breadth_first, connected_images, covalent_only, Visit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondKind {
    Covalent,
    HydrogenBond,
    CloseContact,
}

impl BondKind {
    pub fn is_covalent(&self) -> bool {
        matches!(self, BondKind::Covalent)
    }

    /// Hydrogen bonds and close contacts, the edges contact atoms are drawn from.
    pub fn is_contact(&self) -> bool {
        !self.is_covalent()
    }
}
