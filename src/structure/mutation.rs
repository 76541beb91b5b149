// src/structure/mutation.rs
//! Operations that grow or shrink the materialized atom set.
//!
//! Every public operation leaves the bond lists and fragments re-derived
//! from the atom table before it returns.

use super::{AtomFlags, Structure};
use crate::model::index::GenericAtomIndex;
use crate::physics::bonds::{connected_images, covalent_only};
use nalgebra::Vector3;
use std::collections::{HashMap, HashSet};

impl Structure {
    /// Materialize atom images; already present or foreign indices are skipped.
    /// An atom shown only as a contact becomes a regular atom.
    pub fn add_atoms(&mut self, indices: &[GenericAtomIndex]) -> usize {
        let mut added = 0;
        self.with_contacts_regenerated(|s| {
            added = s.push_atoms(indices, AtomFlags::empty());
        });
        added
    }

    /// Remove atom images; contacts are regenerated around the atoms left.
    pub fn delete_atoms(&mut self, indices: &[GenericAtomIndex]) -> usize {
        let doomed: HashSet<GenericAtomIndex> = indices.iter().copied().collect();
        let mut removed = 0;
        self.with_contacts_regenerated(|s| {
            removed = s.retain_rows(|_, idx, _| !doomed.contains(idx));
        });
        removed
    }

    /// Delete atoms by row; rows past the end are ignored.
    pub fn delete_rows(&mut self, rows: &[usize]) -> usize {
        let doomed: Vec<GenericAtomIndex> = rows
            .iter()
            .filter_map(|&row| self.index_to_generic_index(row))
            .collect();
        self.delete_atoms(&doomed)
    }

    pub fn clear(&mut self) {
        self.retain_rows(|_, _, _| false);
        self.update();
    }

    /// Add every missing image of the molecule containing the atom in `row`.
    pub fn complete_fragment_containing(&mut self, row: usize) -> usize {
        match self.index_to_generic_index(row) {
            Some(index) => self.complete_fragment_containing_index(&index),
            None => 0,
        }
    }

    /// Add every missing image of the molecule containing `index`.
    ///
    /// Contact atoms present beforehand are regenerated around the completed
    /// molecule. Returns the net number of atoms added.
    pub fn complete_fragment_containing_index(&mut self, index: &GenericAtomIndex) -> usize {
        if !self.cell().contains(index) {
            return 0;
        }
        let before = self.num_atoms();
        self.with_contacts_regenerated(|s| {
            let images = connected_images(s.cell().graph(), index.unique as usize, index.offset(), covalent_only);
            s.push_atoms(&images, AtomFlags::empty());
        });
        self.num_atoms().saturating_sub(before)
    }

    pub fn complete_all_fragments(&mut self) -> usize {
        let before = self.num_atoms();
        self.with_contacts_regenerated(|s| {
            let missing: Vec<GenericAtomIndex> = (0..s.fragments.len())
                .flat_map(|k| s.missing_fragment_images(k))
                .collect();
            s.push_atoms(&missing, AtomFlags::empty());
        });
        self.num_atoms().saturating_sub(before)
    }

    /// Remove every fragment with a missing covalently bonded image.
    pub fn delete_incomplete_fragments(&mut self) -> usize {
        let incomplete: HashSet<usize> = (0..self.fragments.len())
            .filter(|&k| !self.is_fragment_complete(k))
            .collect();
        if incomplete.is_empty() {
            return 0;
        }
        let doomed: Vec<GenericAtomIndex> = (0..self.num_atoms())
            .filter(|&row| matches!(self.atom_fragment[row], Some(k) if incomplete.contains(&k)))
            .map(|row| self.atoms[row])
            .collect();
        let removed = self.delete_atoms(&doomed);
        log::info!("Deleted {} atoms in {} incomplete fragments", removed, incomplete.len());
        removed
    }

    /// Materialize every atom image within `radius` Å of the current atoms
    /// (or of the selected atoms only).
    pub fn expand_atoms_within_radius(&mut self, radius: f64, selected_only: bool) -> usize {
        let centers: Vec<GenericAtomIndex> = self
            .atoms
            .iter()
            .zip(&self.flags)
            .filter(|(_, f)| !f.contains(AtomFlags::CONTACT))
            .filter(|(_, f)| !selected_only || f.contains(AtomFlags::SELECTED))
            .map(|(idx, _)| *idx)
            .collect();
        if centers.is_empty() {
            return 0;
        }

        // Neighbour regions per unit-cell atom, at offset zero
        let kind = self.kind.clone();
        let cell = kind.cell();
        let mut regions: HashMap<i32, Vec<GenericAtomIndex>> = HashMap::new();
        let mut found = Vec::new();
        for center in &centers {
            let region = regions.entry(center.unique).or_insert_with(|| {
                let origin = GenericAtomIndex::new(center.unique, 0, 0, 0);
                cell.neighbor_images(&origin, radius).into_iter().map(|(idx, _)| idx).collect()
            });
            found.extend(region.iter().map(|idx| idx.translated(center.offset())));
        }
        found.sort_unstable();
        found.dedup();

        let before = self.num_atoms();
        self.with_contacts_regenerated(|s| {
            s.push_atoms(&found, AtomFlags::empty());
        });
        self.num_atoms().saturating_sub(before)
    }

    /// Materialize every atom image with fractional coordinates in `[lower, upper]`.
    /// For slabs the non-periodic axis is bounded by the slab cell itself.
    pub fn pack_unit_cells(&mut self, lower: &Vector3<f64>, upper: &Vector3<f64>) -> usize {
        let images = self.cell().images_in_bounds(lower, upper);
        let before = self.num_atoms();
        self.with_contacts_regenerated(|s| {
            s.push_atoms(&images, AtomFlags::empty());
        });
        self.num_atoms().saturating_sub(before)
    }

    /// Materialize every cell atom shifted by up to `cells` lattice vectors
    /// along each periodic axis; slabs are never shifted along their normal.
    pub fn add_periodic_images(&mut self, cells: i32) -> usize {
        let cells = cells.max(0);
        let range = self.cell().periodicity().clamp(Vector3::new(cells, cells, cells));
        let mut images = Vec::new();
        for unique in 0..self.cell().num_atoms() {
            for x in -range.x..=range.x {
                for y in -range.y..=range.y {
                    for z in -range.z..=range.z {
                        images.push(GenericAtomIndex::new(unique as i32, x, y, z));
                    }
                }
            }
        }
        let before = self.num_atoms();
        self.with_contacts_regenerated(|s| {
            s.push_atoms(&images, AtomFlags::empty());
        });
        self.num_atoms().saturating_sub(before)
    }

    /// Show or hide the non-covalent neighbours of the materialized atoms.
    pub fn set_show_contacts(&mut self, show: bool) {
        self.show_contacts = show;
        self.remove_contact_atoms();
        if show {
            self.add_contact_atoms();
        }
        self.update();
    }

    pub fn select_rows(&mut self, rows: &[usize]) {
        for &row in rows {
            if let Some(flags) = self.flags.get_mut(row) {
                flags.insert(AtomFlags::SELECTED);
            }
        }
    }

    /// Select every atom of the fragment holding `row`.
    pub fn select_fragment_containing(&mut self, row: usize) {
        let Some(k) = self.fragment_slot_for_atom(row) else {
            return;
        };
        let rows = self.fragment_rows(k);
        self.select_rows(&rows);
    }

    pub fn clear_selection(&mut self) {
        for flags in &mut self.flags {
            flags.remove(AtomFlags::SELECTED);
        }
    }

    pub fn selected_rows(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.contains(AtomFlags::SELECTED))
            .map(|(row, _)| row)
            .collect()
    }

    pub fn delete_selected_atoms(&mut self) -> usize {
        let doomed: Vec<GenericAtomIndex> = self
            .atoms
            .iter()
            .zip(&self.flags)
            .filter(|(_, f)| f.contains(AtomFlags::SELECTED) && !f.contains(AtomFlags::CONTACT))
            .map(|(idx, _)| *idx)
            .collect();
        self.delete_atoms(&doomed)
    }

    /// Run `edit` with contact atoms removed, then put them back around the
    /// new atom set if there were any.
    fn with_contacts_regenerated<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut Self),
    {
        let had_contacts = self.show_contacts || self.flags.iter().any(|f| f.contains(AtomFlags::CONTACT));
        if had_contacts {
            self.remove_contact_atoms();
        }
        edit(self);
        if had_contacts {
            self.add_contact_atoms();
        }
        self.update();
    }

    fn remove_contact_atoms(&mut self) -> usize {
        self.retain_rows(|_, _, flags| !flags.contains(AtomFlags::CONTACT))
    }

    /// Targets of hydrogen-bond and close-contact edges of every regular atom.
    fn add_contact_atoms(&mut self) -> usize {
        let kind = self.kind.clone();
        let graph = kind.cell().graph();
        let mut targets = Vec::new();
        for (idx, flags) in self.atoms.iter().zip(&self.flags) {
            if flags.contains(AtomFlags::CONTACT) {
                continue;
            }
            for (target, edge) in graph.edges(idx.unique as usize) {
                if edge.kind.is_contact() {
                    targets.push(GenericAtomIndex::from_offset(target, idx.offset() + edge.offset));
                }
            }
        }
        self.push_atoms(&targets, AtomFlags::CONTACT)
    }
}
