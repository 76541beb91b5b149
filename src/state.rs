// src/state.rs
use crate::config::Config;
use crate::physics::crystal::Crystal;
use crate::physics::slab::{Slab, SlabError, SlabOptions};
use crate::structure::Structure;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    NoStructure,
    Slab(SlabError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::NoStructure => write!(f, "No structure is open"),
            SessionError::Slab(e) => write!(f, "Slab cut failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SlabError> for SessionError {
    fn from(e: SlabError) -> Self {
        SessionError::Slab(e)
    }
}

/// Owns the crystal definitions and the structures materialized from them.
pub struct Session {
    pub config: Config,
    crystals: Vec<Arc<Crystal>>,
    structures: Vec<Structure>,
    current: Option<usize>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            crystals: Vec::new(),
            structures: Vec::new(),
            current: None,
        }
    }

    /// Register a crystal and open its unit cell as the current structure.
    pub fn add_crystal(&mut self, crystal: Crystal) -> usize {
        let crystal = Arc::new(crystal);
        log::info!("Opened crystal '{}' ({} atoms in cell)", crystal.title, crystal.cell().num_atoms());
        self.crystals.push(crystal.clone());
        self.push_structure(Structure::from_crystal(crystal))
    }

    /// Cut a slab from the crystal behind the current structure and open it.
    pub fn cut_slab(&mut self, options: SlabOptions) -> Result<usize, SessionError> {
        let crystal = self.current_structure().ok_or(SessionError::NoStructure)?.kind().crystal().clone();
        let slab = Slab::new(crystal, options, &self.config)?;
        log::info!(
            "Cut {} slab, {:.2} Å thick, {} atoms",
            options.miller,
            options.thickness,
            slab.cell().num_atoms()
        );
        Ok(self.push_structure(Structure::from_slab(Arc::new(slab))))
    }

    fn push_structure(&mut self, structure: Structure) -> usize {
        self.structures.push(structure);
        let index = self.structures.len() - 1;
        self.current = Some(index);
        index
    }

    pub fn crystals(&self) -> &[Arc<Crystal>] {
        &self.crystals
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    pub fn structure_mut(&mut self, index: usize) -> Option<&mut Structure> {
        self.structures.get_mut(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.structures.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn current_structure(&self) -> Option<&Structure> {
        self.structures.get(self.current?)
    }

    pub fn current_structure_mut(&mut self) -> Option<&mut Structure> {
        self.structures.get_mut(self.current?)
    }

    /// Close a structure. Crystals stay registered while any structure uses them.
    pub fn remove_structure(&mut self, index: usize) -> Option<Structure> {
        if index >= self.structures.len() {
            return None;
        }
        let removed = self.structures.remove(index);
        self.current = match self.current {
            _ if self.structures.is_empty() => None,
            Some(c) if c > index => Some(c - 1),
            Some(c) if c == index => Some(index.min(self.structures.len() - 1)),
            other => other,
        };
        let structures = &self.structures;
        self.crystals
            .retain(|c| structures.iter().any(|s| Arc::ptr_eq(s.kind().crystal(), c)));
        Some(removed)
    }
}
