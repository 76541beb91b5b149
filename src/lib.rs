// src/lib.rs
//! Periodic crystal core: generic atom addressing, the periodic bond graph,
//! fragment discovery, materialized structures, dimer enumeration and
//! Miller plane / slab geometry.

pub mod config;
pub mod model;
pub mod physics;
pub mod state;
pub mod structure;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use model::{DimerIndex, FragmentIndex, GenericAtomIndex};
pub use physics::crystal::Crystal;
pub use physics::slab::{Slab, SlabOptions};
pub use state::Session;
pub use structure::Structure;
