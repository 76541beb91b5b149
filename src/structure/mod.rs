// src/structure/mod.rs
//! The materialized structure: the finite set of atom images currently shown,
//! with the bonds and fragments derived from it.

pub mod mutation;
pub mod pairs;
pub mod state;

use crate::model::fragment::Fragment;
use crate::model::index::{FragmentIndex, GenericAtomIndex};
use crate::physics::bonds::{connected_images, covalent_only, BondKind};
use crate::physics::crystal::Crystal;
use crate::physics::periodic_cell::PeriodicCell;
use crate::physics::slab::Slab;
use bitflags::bitflags;
use nalgebra::{Matrix3, Vector3};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use std::sync::Arc;

pub use pairs::{FragmentPairSettings, FragmentPairs, SymmetryRelatedPair};
pub use state::{StateError, StructureState};

bitflags! {
    /// Per-atom display and selection state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AtomFlags: u32 {
        const SELECTED = 0x1;
        /// Shown only as a non-covalent neighbour; ignored by completeness checks.
        const CONTACT = 0x2;
    }
}

/// The crystal definition a structure is materialized from.
#[derive(Debug, Clone)]
pub enum StructureKind {
    Crystal(Arc<Crystal>),
    Slab(Arc<Slab>),
}

impl StructureKind {
    pub fn cell(&self) -> &PeriodicCell {
        match self {
            StructureKind::Crystal(c) => c.cell(),
            StructureKind::Slab(s) => s.cell(),
        }
    }

    pub fn crystal(&self) -> &Arc<Crystal> {
        match self {
            StructureKind::Crystal(c) => c,
            StructureKind::Slab(s) => s.crystal(),
        }
    }

    pub fn is_slab(&self) -> bool {
        matches!(self, StructureKind::Slab(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            StructureKind::Crystal(_) => "crystal",
            StructureKind::Slab(_) => "slab",
        }
    }
}

/// Atom images materialized from a periodic cell.
///
/// Rows of the atom table are addressed by `usize`; every row holds exactly
/// one [`GenericAtomIndex`] and `index_map` is its inverse. Bond lists and
/// fragments are re-derived from the atom table after every mutation.
#[derive(Debug, Clone)]
pub struct Structure {
    kind: StructureKind,
    atoms: Vec<GenericAtomIndex>,
    symbols: Vec<&'static str>,
    labels: Vec<String>,
    positions: Vec<Vector3<f64>>,
    flags: Vec<AtomFlags>,
    index_map: HashMap<GenericAtomIndex, usize>,

    covalent_bonds: Vec<(usize, usize)>,
    hydrogen_bonds: Vec<(usize, usize)>,
    close_contacts: Vec<(usize, usize)>,

    fragments: Vec<Fragment>,
    /// Row -> position in `fragments`; `None` for contact atoms.
    atom_fragment: Vec<Option<usize>>,
    show_contacts: bool,
}

impl Structure {
    /// An empty structure over `kind`.
    pub fn new(kind: StructureKind) -> Self {
        Self {
            kind,
            atoms: Vec::new(),
            symbols: Vec::new(),
            labels: Vec::new(),
            positions: Vec::new(),
            flags: Vec::new(),
            index_map: HashMap::new(),
            covalent_bonds: Vec::new(),
            hydrogen_bonds: Vec::new(),
            close_contacts: Vec::new(),
            fragments: Vec::new(),
            atom_fragment: Vec::new(),
            show_contacts: false,
        }
    }

    /// The unit-cell atoms of a crystal, all at offset zero.
    pub fn from_crystal(crystal: Arc<Crystal>) -> Self {
        let mut structure = Self::new(StructureKind::Crystal(crystal));
        structure.add_unit_cell_atoms();
        structure
    }

    /// The atoms of one slab cell.
    pub fn from_slab(slab: Arc<Slab>) -> Self {
        let mut structure = Self::new(StructureKind::Slab(slab));
        structure.add_unit_cell_atoms();
        structure
    }

    fn add_unit_cell_atoms(&mut self) {
        let indices: Vec<GenericAtomIndex> = (0..self.cell().num_atoms())
            .map(|i| GenericAtomIndex::new(i as i32, 0, 0, 0))
            .collect();
        self.add_atoms(&indices);
    }

    pub fn kind(&self) -> &StructureKind {
        &self.kind
    }

    pub fn cell(&self) -> &PeriodicCell {
        self.kind.cell()
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atom_indices(&self) -> &[GenericAtomIndex] {
        &self.atoms
    }

    pub fn symbols(&self) -> &[&'static str] {
        &self.symbols
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn flags(&self) -> &[AtomFlags] {
        &self.flags
    }

    pub fn atom_flags(&self, row: usize) -> Option<AtomFlags> {
        self.flags.get(row).copied()
    }

    pub fn show_contacts(&self) -> bool {
        self.show_contacts
    }

    pub fn generic_index_to_index(&self, index: &GenericAtomIndex) -> Option<usize> {
        self.index_map.get(index).copied()
    }

    pub fn index_to_generic_index(&self, row: usize) -> Option<GenericAtomIndex> {
        self.atoms.get(row).copied()
    }

    /// Anisotropic displacement tensor of the atom in `row`, if it has one.
    pub fn atom_adp(&self, row: usize) -> Option<Matrix3<f64>> {
        let index = self.atoms.get(row)?;
        self.cell().atoms().get(index.unique as usize)?.adp
    }

    pub fn bonds(&self, kind: BondKind) -> &[(usize, usize)] {
        match kind {
            BondKind::Covalent => &self.covalent_bonds,
            BondKind::HydrogenBond => &self.hydrogen_bonds,
            BondKind::CloseContact => &self.close_contacts,
        }
    }

    pub fn covalent_bonds(&self) -> &[(usize, usize)] {
        &self.covalent_bonds
    }

    pub fn hydrogen_bonds(&self) -> &[(usize, usize)] {
        &self.hydrogen_bonds
    }

    pub fn close_contacts(&self) -> &[(usize, usize)] {
        &self.close_contacts
    }

    /// Fragments made of the materialized non-contact atoms.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment_for_atom(&self, row: usize) -> Option<&Fragment> {
        let k = (*self.atom_fragment.get(row)?)?;
        self.fragments.get(k)
    }

    /// Position in [`Self::fragments`] of the fragment holding `row`.
    pub fn fragment_slot_for_atom(&self, row: usize) -> Option<usize> {
        self.atom_fragment.get(row).copied().flatten()
    }

    pub fn fragment_index_for_atom(&self, row: usize) -> FragmentIndex {
        self.fragment_for_atom(row).map_or(FragmentIndex::INVALID, |f| f.index)
    }

    /// Rows of the atoms in fragment `k`.
    pub fn fragment_rows(&self, k: usize) -> Vec<usize> {
        let Some(fragment) = self.fragments.get(k) else {
            return Vec::new();
        };
        fragment
            .atom_indices
            .iter()
            .filter_map(|idx| self.generic_index_to_index(idx))
            .collect()
    }

    /// Fragments with at least one atom carrying all of `flags`.
    pub fn fragments_for_flags(&self, flags: AtomFlags) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.contains(flags))
            .filter_map(|(row, _)| self.fragment_slot_for_atom(row))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn unit_cell_fragments(&self) -> &[Fragment] {
        self.cell().unit_cell_fragments()
    }

    pub fn symmetry_unique_fragments(&self) -> &[Fragment] {
        self.cell().symmetry_unique_fragments()
    }

    /// `true` when every atom image covalently reachable from fragment `k`
    /// is materialized as a regular atom.
    pub fn is_fragment_complete(&self, k: usize) -> bool {
        self.missing_fragment_images(k).is_empty()
    }

    pub fn has_incomplete_fragments(&self) -> bool {
        (0..self.fragments.len()).any(|k| !self.is_fragment_complete(k))
    }

    /// Covalently reachable images of fragment `k` that are absent or only
    /// present as contact atoms.
    pub(crate) fn missing_fragment_images(&self, k: usize) -> Vec<GenericAtomIndex> {
        let Some(root) = self.fragments.get(k).and_then(|f| f.atom_indices.first()) else {
            return Vec::new();
        };
        connected_images(self.cell().graph(), root.unique as usize, root.offset(), covalent_only)
            .into_iter()
            .filter(|idx| match self.generic_index_to_index(idx) {
                Some(row) => self.flags[row].contains(AtomFlags::CONTACT),
                None => true,
            })
            .collect()
    }

    /// Re-derive bond lists and fragments from the atom table.
    pub(crate) fn update(&mut self) {
        self.update_bonds();
        self.update_fragments();
        log::debug!(
            "Structure ({}): {} atoms, {} bonds, {} H-bonds, {} contacts, {} fragments",
            self.kind.name(),
            self.atoms.len(),
            self.covalent_bonds.len(),
            self.hydrogen_bonds.len(),
            self.close_contacts.len(),
            self.fragments.len()
        );
    }

    fn update_bonds(&mut self) {
        self.covalent_bonds.clear();
        self.hydrogen_bonds.clear();
        self.close_contacts.clear();

        let graph = self.kind.cell().graph();
        for (i, atom) in self.atoms.iter().enumerate() {
            for (target, edge) in graph.edges(atom.unique as usize) {
                let image = GenericAtomIndex::from_offset(target, atom.offset() + edge.offset);
                let Some(&j) = self.index_map.get(&image) else {
                    continue;
                };
                if j <= i {
                    continue;
                }
                match edge.kind {
                    BondKind::Covalent => self.covalent_bonds.push((i, j)),
                    BondKind::HydrogenBond => self.hydrogen_bonds.push((i, j)),
                    BondKind::CloseContact => self.close_contacts.push((i, j)),
                }
            }
        }
        self.covalent_bonds.sort_unstable();
        self.hydrogen_bonds.sort_unstable();
        self.close_contacts.sort_unstable();
    }

    fn update_fragments(&mut self) {
        let n = self.atoms.len();
        let mut components = UnionFind::<usize>::new(n);
        for &(i, j) in &self.covalent_bonds {
            if !self.flags[i].contains(AtomFlags::CONTACT) && !self.flags[j].contains(AtomFlags::CONTACT) {
                components.union(i, j);
            }
        }

        // Fragments are ordered by their first row
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut members: Vec<Vec<GenericAtomIndex>> = Vec::new();
        let mut atom_fragment = vec![None; n];
        for row in 0..n {
            if self.flags[row].contains(AtomFlags::CONTACT) {
                continue;
            }
            let root = components.find(row);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[slot].push(self.atoms[row]);
            atom_fragment[row] = Some(slot);
        }

        let cell = self.kind.cell();
        self.fragments = members.iter().map(|m| cell.make_fragment(m)).collect();
        self.atom_fragment = atom_fragment;
    }

    pub(crate) fn rebuild_index_map(&mut self) {
        self.index_map = self.atoms.iter().enumerate().map(|(row, idx)| (*idx, row)).collect();
    }

    /// Append rows for `indices`, skipping ones already present or not in the cell.
    /// Does not re-derive bonds or fragments.
    pub(crate) fn push_atoms(&mut self, indices: &[GenericAtomIndex], flags: AtomFlags) -> usize {
        let kind = self.kind.clone();
        let cell = kind.cell();
        let mut added = 0;
        for idx in indices {
            if self.index_map.contains_key(idx) {
                continue;
            }
            let Some(position) = cell.position(idx) else {
                log::warn!("Ignoring atom {:?}: not an atom of the {} cell", idx, kind.name());
                continue;
            };
            let atom = &cell.atoms()[idx.unique as usize];
            self.index_map.insert(*idx, self.atoms.len());
            self.atoms.push(*idx);
            self.symbols.push(atom.symbol());
            self.labels.push(atom.label.clone());
            self.positions.push(position);
            self.flags.push(flags);
            added += 1;
        }
        added
    }

    /// Keep only the rows for which `keep` is true, renumbering the survivors.
    /// Does not re-derive bonds or fragments.
    pub(crate) fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize, &GenericAtomIndex, AtomFlags) -> bool,
    {
        let before = self.atoms.len();
        let mask: Vec<bool> = (0..before).map(|row| keep(row, &self.atoms[row], self.flags[row])).collect();

        retain_by_mask(&mut self.atoms, &mask);
        retain_by_mask(&mut self.symbols, &mask);
        retain_by_mask(&mut self.labels, &mask);
        retain_by_mask(&mut self.positions, &mask);
        retain_by_mask(&mut self.flags, &mask);

        self.rebuild_index_map();
        before - self.atoms.len()
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, mask: &[bool]) {
    let mut keep = mask.iter();
    values.retain(|_| keep.next().copied().unwrap_or(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{inverted_pair_crystal, two_atom_crystal, water_dimer_crystal};

    fn assert_map_consistent(structure: &Structure) {
        assert_eq!(structure.index_map.len(), structure.num_atoms());
        for row in 0..structure.num_atoms() {
            let idx = structure.index_to_generic_index(row).unwrap();
            assert_eq!(structure.generic_index_to_index(&idx), Some(row));
        }
        for idx in structure.atom_indices() {
            let row = structure.generic_index_to_index(idx).unwrap();
            assert_eq!(structure.index_to_generic_index(row), Some(*idx));
        }
    }

    #[test]
    fn test_from_crystal_materializes_unit_cell() {
        let structure = Structure::from_crystal(Arc::new(inverted_pair_crystal()));
        assert_eq!(structure.num_atoms(), 4);
        assert!(structure.atom_indices().iter().all(|i| i.offset() == Vector3::zeros()));
        assert_map_consistent(&structure);
        assert_eq!(structure.symbols()[0], "C");
        assert_eq!(structure.labels()[2], "O1");
    }

    #[test]
    fn test_map_round_trip() {
        let mut structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        structure.add_atoms(&[
            GenericAtomIndex::new(1, 0, 0, 0),
            GenericAtomIndex::new(0, 2, -1, 0),
            GenericAtomIndex::new(0, 0, 0, 0),
        ]);
        assert_eq!(structure.num_atoms(), 3);
        assert_map_consistent(&structure);
        assert_eq!(structure.index_to_generic_index(3), None);
        assert_eq!(structure.generic_index_to_index(&GenericAtomIndex::new(1, 5, 5, 5)), None);
    }

    #[test]
    fn test_fragments_from_materialized_bonds() {
        let structure = Structure::from_crystal(two_atom_crystal());
        assert_eq!(structure.covalent_bonds(), &[(0, 1)]);
        assert_eq!(structure.fragments().len(), 1);
        let fragment = structure.fragment_for_atom(1).unwrap();
        assert_eq!(fragment.size(), 2);
        assert_eq!(fragment.index, FragmentIndex::new(0, 0, 0, 0));
        assert!(!structure.has_incomplete_fragments());
        for f in structure.fragments() {
            assert!(f.atom_indices.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_half_fragment_is_incomplete() {
        let mut structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        structure.add_atoms(&[GenericAtomIndex::new(0, 0, 0, 0)]);
        assert_eq!(structure.fragments().len(), 1);
        assert!(structure.has_incomplete_fragments());
        assert_eq!(structure.fragment_index_for_atom(0), FragmentIndex::INVALID);
        assert_eq!(structure.missing_fragment_images(0), vec![GenericAtomIndex::new(1, 0, 0, 0)]);
    }

    #[test]
    fn test_hydrogen_bonds_listed_by_kind() {
        let structure = Structure::from_crystal(water_dimer_crystal());
        assert_eq!(structure.fragments().len(), 2);
        assert_eq!(structure.bonds(BondKind::Covalent).len(), 4);
        assert_eq!(structure.hydrogen_bonds(), &[(2, 3)]);
    }

    #[test]
    fn test_fragments_for_flags() {
        let mut structure = Structure::from_crystal(Arc::new(inverted_pair_crystal()));
        assert!(structure.fragments_for_flags(AtomFlags::SELECTED).is_empty());
        structure.select_rows(&[3]);
        let selected = structure.fragments_for_flags(AtomFlags::SELECTED);
        assert_eq!(selected.len(), 1);
        assert!(structure.fragment_rows(selected[0]).contains(&3));
    }

    #[test]
    fn test_adp_lookup() {
        let structure = Structure::from_crystal(two_atom_crystal());
        assert!(structure.atom_adp(0).is_none());
        assert!(structure.atom_adp(10).is_none());
    }
}
