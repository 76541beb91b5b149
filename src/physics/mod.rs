// src/physics/mod.rs
pub mod bonds;
pub mod crystal;
pub mod dimers;
pub mod fragments;
pub mod miller;
pub mod periodic_cell;
pub mod slab;

pub use crystal::{Crystal, CrystalError};
pub use dimers::{DimerMappingTable, FragmentDimer};
pub use miller::{CrystalPlane, MillerIndex, PlaneError};
pub use periodic_cell::{PeriodicCell, Periodicity};
pub use slab::{Slab, SlabError, SlabOptions};
