// src/structure/state.rs
//! JSON summary of a structure, enough to rebuild its atom set without
//! repeating any traversal once the crystal definition is supplied again.

use super::{AtomFlags, Structure, StructureKind};
use crate::model::index::GenericAtomIndex;
use crate::physics::miller::MillerIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureTag {
    Crystal,
    Slab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabSummary {
    pub miller: MillerIndex,
    /// Lower cut plane, in units of d(hkl).
    pub offset: f64,
    pub thickness: f64,
    pub termination: Option<String>,
    /// Slab cell vectors as rows.
    pub basis: [[f64; 3]; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomState {
    pub index: GenericAtomIndex,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureState {
    pub kind: StructureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slab: Option<SlabSummary>,
    #[serde(default)]
    pub show_contacts: bool,
    pub atoms: Vec<AtomState>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    Json(String),
    KindMismatch { expected: StructureTag, found: StructureTag },
    /// The stored slab parameters differ from the slab being restored into.
    SlabMismatch(String),
    UnknownAtom(GenericAtomIndex),
    DuplicateAtom(GenericAtomIndex),
    InvalidFlags(u32),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StateError::Json(msg) => write!(f, "Malformed structure state: {}", msg),
            StateError::KindMismatch { expected, found } => {
                write!(f, "State is for a {:?} structure, not a {:?}", found, expected)
            }
            StateError::SlabMismatch(msg) => write!(f, "Slab parameters differ: {}", msg),
            StateError::UnknownAtom(idx) => write!(f, "Atom {:?} is not in the cell", idx),
            StateError::DuplicateAtom(idx) => write!(f, "Atom {:?} listed twice", idx),
            StateError::InvalidFlags(bits) => write!(f, "Unknown atom flags {:#x}", bits),
        }
    }
}

impl std::error::Error for StateError {}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Json(e.to_string())
    }
}

impl StructureState {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Structure {
    pub fn state(&self) -> StructureState {
        let (kind, slab) = match &self.kind {
            StructureKind::Crystal(_) => (StructureTag::Crystal, None),
            StructureKind::Slab(slab) => {
                let options = slab.options();
                (
                    StructureTag::Slab,
                    Some(SlabSummary {
                        miller: options.miller,
                        offset: options.offset,
                        thickness: options.thickness,
                        termination: slab.termination().map(str::to_string),
                        basis: slab.basis(),
                    }),
                )
            }
        };
        StructureState {
            kind,
            slab,
            show_contacts: self.show_contacts,
            atoms: self
                .atoms
                .iter()
                .zip(&self.flags)
                .map(|(index, flags)| AtomState {
                    index: *index,
                    flags: flags.bits(),
                })
                .collect(),
        }
    }

    /// Replace the atom set with a stored one. The state is validated in full
    /// first; on error the structure is left untouched.
    pub fn restore_state(&mut self, state: &StructureState) -> Result<(), StateError> {
        self.validate_state(state)?;

        self.retain_rows(|_, _, _| false);
        for atom in &state.atoms {
            self.push_atoms(&[atom.index], AtomFlags::from_bits_truncate(atom.flags));
        }
        self.show_contacts = state.show_contacts;
        self.update();
        log::info!("Restored {} atoms into {} structure", self.num_atoms(), self.kind.name());
        Ok(())
    }

    pub fn restore_json(&mut self, text: &str) -> Result<(), StateError> {
        let state = StructureState::from_json(text)?;
        self.restore_state(&state)
    }

    fn validate_state(&self, state: &StructureState) -> Result<(), StateError> {
        let expected = if self.kind.is_slab() {
            StructureTag::Slab
        } else {
            StructureTag::Crystal
        };
        if state.kind != expected {
            return Err(StateError::KindMismatch {
                expected,
                found: state.kind,
            });
        }

        if let StructureKind::Slab(slab) = &self.kind {
            let Some(stored) = &state.slab else {
                return Err(StateError::SlabMismatch("missing slab summary".to_string()));
            };
            let options = slab.options();
            if stored.miller != options.miller {
                return Err(StateError::SlabMismatch(format!(
                    "plane {} vs {}",
                    stored.miller, options.miller
                )));
            }
            if (stored.offset - options.offset).abs() > 1e-6 || (stored.thickness - options.thickness).abs() > 1e-6 {
                return Err(StateError::SlabMismatch(format!(
                    "offset {} thickness {} vs offset {} thickness {}",
                    stored.offset, stored.thickness, options.offset, options.thickness
                )));
            }
        }

        let mut seen = HashSet::with_capacity(state.atoms.len());
        for atom in &state.atoms {
            if !self.cell().contains(&atom.index) {
                return Err(StateError::UnknownAtom(atom.index));
            }
            if !seen.insert(atom.index) {
                return Err(StateError::DuplicateAtom(atom.index));
            }
            if AtomFlags::from_bits(atom.flags).is_none() {
                return Err(StateError::InvalidFlags(atom.flags));
            }
        }
        Ok(())
    }
}
