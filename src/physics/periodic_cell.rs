// src/physics/periodic_cell.rs

use crate::config::Config;
use crate::model::asymmetric_unit::CellAtom;
use crate::model::fragment::Fragment;
use crate::model::index::GenericAtomIndex;
use crate::model::symmetry::SymmetryOperation;
use crate::model::unit_cell::UnitCell;
use crate::physics::bonds::PeriodicBondGraph;
use crate::physics::dimers::DimerTableCache;
use crate::utils::linalg::{minimum_image, round_to_lattice, wrap_fractional};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Periodicity {
    /// Bulk crystal, periodic along a, b and c.
    Three,
    /// Slab, periodic along a and b only.
    Two,
}

impl Periodicity {
    pub fn axes(&self) -> [bool; 3] {
        match self {
            Periodicity::Three => [true, true, true],
            Periodicity::Two => [true, true, false],
        }
    }

    /// Zero the offset components along non-periodic axes.
    pub fn clamp(&self, offset: Vector3<i32>) -> Vector3<i32> {
        match self {
            Periodicity::Three => offset,
            Periodicity::Two => Vector3::new(offset.x, offset.y, 0),
        }
    }
}

/// The read-only part of a crystal definition shared by every structure cut from it.
///
/// Holds the unit-cell atoms, the symmetry operations acting on them, the
/// periodic bond graph and the unit-cell and symmetry-unique fragments.
#[derive(Debug, Clone)]
pub struct PeriodicCell {
    pub(crate) lattice: UnitCell,
    pub(crate) periodicity: Periodicity,
    pub(crate) atoms: Vec<CellAtom>,
    pub(crate) operations: Vec<SymmetryOperation>,
    /// `atom_map[op][i] = (j, shift)`: op maps atom i onto atom j in cell `shift`.
    pub(crate) atom_map: Vec<Vec<Option<(usize, Vector3<i32>)>>>,
    pub(crate) graph: PeriodicBondGraph,
    pub(crate) fragments: Vec<Fragment>,
    pub(crate) unique_fragments: Vec<Fragment>,
    /// Unit-cell atom -> (unit-cell fragment, cell of the atom inside that fragment).
    pub(crate) atom_fragment: Vec<Option<(usize, Vector3<i32>)>>,
    pub(crate) rmsd_tolerance: f64,
    pub(crate) dimer_tables: DimerTableCache,
}

impl PeriodicCell {
    pub fn new(
        lattice: UnitCell,
        periodicity: Periodicity,
        atoms: Vec<CellAtom>,
        operations: Vec<SymmetryOperation>,
        config: &Config,
    ) -> Self {
        let operations = if operations.is_empty() {
            vec![SymmetryOperation::identity()]
        } else {
            operations
        };
        let atom_map = build_atom_map(&lattice, &atoms, &operations, config.symmetry.duplicate_tolerance);
        let graph = PeriodicBondGraph::covalent(&lattice, &atoms, periodicity.axes(), &config.bonds);

        let mut cell = Self {
            lattice,
            periodicity,
            atoms,
            operations,
            atom_map,
            graph,
            fragments: Vec::new(),
            unique_fragments: Vec::new(),
            atom_fragment: Vec::new(),
            rmsd_tolerance: config.symmetry.fragment_rmsd_tolerance,
            dimer_tables: DimerTableCache::default(),
        };
        cell.discover_unit_cell_fragments();

        if config.bonds.include_contacts {
            let atom_fragment = cell.atom_fragment.clone();
            let same_molecule = move |i: usize, j: usize, offset: Vector3<i32>| match (atom_fragment[i], atom_fragment[j]) {
                (Some((fi, oi)), Some((fj, oj))) => fi == fj && oj - oi == offset,
                _ => false,
            };
            cell.graph
                .add_contacts(&cell.lattice, &cell.atoms, periodicity.axes(), &config.bonds, same_molecule);
        }

        cell.derive_unique_fragments();
        log::debug!(
            "Periodic cell: {} atoms, {} operations, {} fragments ({} unique)",
            cell.atoms.len(),
            cell.operations.len(),
            cell.fragments.len(),
            cell.unique_fragments.len()
        );
        cell
    }

    pub fn lattice(&self) -> &UnitCell {
        &self.lattice
    }

    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    pub fn atoms(&self) -> &[CellAtom] {
        &self.atoms
    }

    pub fn operations(&self) -> &[SymmetryOperation] {
        &self.operations
    }

    pub fn graph(&self) -> &PeriodicBondGraph {
        &self.graph
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// `true` if the index names an atom of this cell with an offset allowed by the periodicity.
    pub fn contains(&self, index: &GenericAtomIndex) -> bool {
        index.unique >= 0
            && (index.unique as usize) < self.atoms.len()
            && self.periodicity.clamp(index.offset()) == index.offset()
    }

    /// Cartesian position of an atom image.
    pub fn position(&self, index: &GenericAtomIndex) -> Option<Vector3<f64>> {
        if !self.contains(index) {
            return None;
        }
        let atom = &self.atoms[index.unique as usize];
        Some(atom.cart + self.lattice.translation(&index.offset()))
    }

    pub fn atomic_number(&self, index: &GenericAtomIndex) -> Option<u32> {
        if !self.contains(index) {
            return None;
        }
        Some(self.atoms[index.unique as usize].atomic_number)
    }

    /// Image of atom `index` under operation `op`.
    pub fn transform_atom_index(&self, op: usize, index: &GenericAtomIndex) -> Option<GenericAtomIndex> {
        if !self.contains(index) {
            return None;
        }
        let (j, shift) = (*self.atom_map.get(op)?.get(index.unique as usize)?)?;
        let rotated = self.operations[op].rotate_offset(&index.offset());
        Some(GenericAtomIndex::from_offset(j, rotated + shift))
    }

    /// Every atom image within `radius` Å of `center`, excluding `center` itself.
    pub fn neighbor_images(&self, center: &GenericAtomIndex, radius: f64) -> Vec<(GenericAtomIndex, f64)> {
        let Some(origin) = self.position(center) else {
            return Vec::new();
        };
        let range = self.periodicity.clamp(self.lattice.cells_within(radius));
        let base = center.offset();

        let mut out = Vec::new();
        for (j, atom) in self.atoms.iter().enumerate() {
            for x in -range.x..=range.x {
                for y in -range.y..=range.y {
                    for z in -range.z..=range.z {
                        let offset = base + Vector3::new(x, y, z);
                        let image = GenericAtomIndex::from_offset(j, offset);
                        if image == *center {
                            continue;
                        }
                        let d = (atom.cart + self.lattice.translation(&offset) - origin).norm();
                        if d <= radius {
                            out.push((image, d));
                        }
                    }
                }
            }
        }
        out
    }

    /// Atom images whose fractional coordinates lie in `[lower, upper]` (inclusive).
    pub fn images_in_bounds(&self, lower: &Vector3<f64>, upper: &Vector3<f64>) -> Vec<GenericAtomIndex> {
        let tol = 1e-6;
        let axes = self.periodicity.axes();
        let mut out = Vec::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            let mut ranges = [(0, 0); 3];
            for k in 0..3 {
                if axes[k] {
                    ranges[k] = (
                        (lower[k] - atom.frac[k] - tol).ceil() as i32,
                        (upper[k] - atom.frac[k] + tol).floor() as i32,
                    );
                } else if atom.frac[k] < lower[k] - tol || atom.frac[k] > upper[k] + tol {
                    ranges[k] = (1, 0);
                }
            }
            for x in ranges[0].0..=ranges[0].1 {
                for y in ranges[1].0..=ranges[1].1 {
                    for z in ranges[2].0..=ranges[2].1 {
                        out.push(GenericAtomIndex::new(i as i32, x, y, z));
                    }
                }
            }
        }
        out.sort();
        out
    }
}

/// For each operation, where every unit-cell atom lands.
fn build_atom_map(
    lattice: &UnitCell,
    atoms: &[CellAtom],
    operations: &[SymmetryOperation],
    tolerance: f64,
) -> Vec<Vec<Option<(usize, Vector3<i32>)>>> {
    let tolerance = tolerance.max(1e-3);
    let mut misses = 0;
    let mut map = Vec::with_capacity(operations.len());
    for op in operations {
        let mut row = Vec::with_capacity(atoms.len());
        for atom in atoms {
            let image = op.apply(&atom.frac);
            let wrapped = wrap_fractional(&image, 1e-6);
            let target = atoms.iter().position(|other| {
                other.atomic_number == atom.atomic_number
                    && lattice.to_cartesian(&minimum_image(&(other.frac - wrapped))).norm() < tolerance
            });
            if target.is_none() {
                misses += 1;
            }
            row.push(target.map(|j| (j, round_to_lattice(&(image - atoms[j].frac)))));
        }
        map.push(row);
    }
    if misses > 0 {
        log::warn!("{} atom images have no counterpart in the unit cell", misses);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rock_salt_cell, two_atom_molecule_cell};

    #[test]
    fn test_atom_map_is_permutation() {
        let cell = rock_salt_cell();
        for row in &cell.atom_map {
            let mut targets: Vec<usize> = row.iter().map(|e| e.unwrap().0).collect();
            targets.sort();
            targets.dedup();
            assert_eq!(targets.len(), cell.num_atoms());
        }
    }

    #[test]
    fn test_transform_atom_index_applies_rotation() {
        let cell = rock_salt_cell();
        // Find the inversion
        let inv = cell
            .operations()
            .iter()
            .position(|op| op.rotation == -nalgebra::Matrix3::<i32>::identity() && op.translation.norm() < 1e-8)
            .unwrap();
        let idx = GenericAtomIndex::new(0, 1, 2, 3);
        let image = cell.transform_atom_index(inv, &idx).unwrap();
        let p = cell.position(&idx).unwrap();
        let q = cell.position(&image).unwrap();
        assert!((p + q).norm() < 1e-6);
    }

    #[test]
    fn test_contains_respects_periodicity() {
        let cell = two_atom_molecule_cell();
        assert!(cell.contains(&GenericAtomIndex::new(1, 0, 0, 5)));
        assert!(!cell.contains(&GenericAtomIndex::new(2, 0, 0, 0)));
        assert!(!cell.contains(&GenericAtomIndex::new(-1, 0, 0, 0)));
        assert!(cell.position(&GenericAtomIndex::new(7, 0, 0, 0)).is_none());
    }

    #[test]
    fn test_neighbor_images() {
        let cell = two_atom_molecule_cell();
        let center = GenericAtomIndex::new(0, 0, 0, 0);
        let near = cell.neighbor_images(&center, 2.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].0, GenericAtomIndex::new(1, 0, 0, 0));

        // Lattice images of the same atom appear once the radius reaches a
        let far = cell.neighbor_images(&center, 10.0);
        assert!(far.iter().any(|(i, _)| *i == GenericAtomIndex::new(0, 1, 0, 0)));
        assert!(far.iter().all(|(i, d)| *i != center && *d <= 10.0));
    }

    #[test]
    fn test_images_in_bounds_includes_faces() {
        let cell = rock_salt_cell();
        let images = cell.images_in_bounds(&Vector3::zeros(), &Vector3::new(1.0, 1.0, 1.0));
        // 8 corners + 6 faces of Na, 12 edges + 1 body of Cl
        assert_eq!(images.len(), 27);
    }
}
