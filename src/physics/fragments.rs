// src/physics/fragments.rs
//! Fragment construction, unit-cell fragment discovery and symmetry matching.

use crate::model::fragment::{Fragment, FragmentTransform};
use crate::model::index::{FragmentIndex, GenericAtomIndex};
use crate::physics::bonds::{connected_images, covalent_only};
use crate::physics::periodic_cell::PeriodicCell;
use nalgebra::Vector3;

/// Result of a successful symmetry search between two fragments.
#[derive(Debug, Clone)]
pub struct SymmetryMatch {
    /// Maps the reference fragment onto the target, in Cartesian space.
    pub transform: FragmentTransform,
    /// Fractional RMSD of the matched atoms.
    pub rmsd: f64,
}

impl PeriodicCell {
    pub fn unit_cell_fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn symmetry_unique_fragments(&self) -> &[Fragment] {
        &self.unique_fragments
    }

    /// Unit-cell fragment image that contains atom `index`.
    pub fn fragment_index_of_atom(&self, index: &GenericAtomIndex) -> FragmentIndex {
        if !self.contains(index) {
            return FragmentIndex::INVALID;
        }
        match self.atom_fragment.get(index.unique as usize).copied().flatten() {
            Some((u, inner)) => FragmentIndex::from_offset(u, index.offset() - inner),
            None => FragmentIndex::INVALID,
        }
    }

    /// Atom images of a fragment image, i.e. the unit-cell fragment translated by its offset.
    pub fn fragment_atoms(&self, index: &FragmentIndex) -> Option<Vec<GenericAtomIndex>> {
        if !index.is_valid() {
            return None;
        }
        let canonical = self.fragments.get(index.u as usize)?;
        Some(
            canonical
                .atom_indices
                .iter()
                .map(|a| a.translated(index.offset()))
                .collect(),
        )
    }

    /// The whole molecule containing one atom image.
    pub fn fragment_containing(&self, atom: &GenericAtomIndex) -> Option<Fragment> {
        if !self.contains(atom) {
            return None;
        }
        let images = connected_images(&self.graph, atom.unique as usize, atom.offset(), covalent_only);
        Some(self.make_fragment(&images))
    }

    /// Build a fragment from any set of atom images.
    ///
    /// Indices are sorted and deduplicated; indices that do not name an atom
    /// of this cell are dropped. The identity comes from the matching
    /// unit-cell fragment if the set is one of its lattice images, otherwise
    /// from a symmetry search against the symmetry-unique fragments.
    pub fn make_fragment(&self, indices: &[GenericAtomIndex]) -> Fragment {
        let mut sorted: Vec<GenericAtomIndex> = indices.iter().copied().filter(|i| self.contains(i)).collect();
        if sorted.len() != indices.len() {
            log::warn!(
                "make_fragment: dropped {} indices outside the cell",
                indices.len() - sorted.len()
            );
        }
        sorted.sort();
        sorted.dedup();

        let mut fragment = self.build_fragment(sorted);
        if let Some((u, shift)) = self.find_unit_cell_fragment(&fragment.atom_indices) {
            let canonical = &self.fragments[u];
            fragment.index = FragmentIndex::from_offset(u, shift);
            fragment.asymmetric_fragment_index = canonical.asymmetric_fragment_index;
            fragment.asymmetric_fragment_transform = canonical
                .asymmetric_fragment_transform
                .then_translate(&self.lattice.translation(&shift));
            return fragment;
        }

        for (k, unique) in self.unique_fragments.iter().enumerate() {
            if let Some(found) = self.get_transformation(unique, &fragment) {
                fragment.asymmetric_fragment_index = FragmentIndex::new(k as i32, 0, 0, 0);
                fragment.asymmetric_fragment_transform = found.transform;
                break;
            }
        }
        fragment
    }

    /// Unit-cell fragment `u` and uniform offset `shift` with
    /// `fragments[u] + shift == indices`, atom for atom in sorted order.
    pub fn find_unit_cell_fragment(&self, indices: &[GenericAtomIndex]) -> Option<(usize, Vector3<i32>)> {
        let first = indices.first()?;
        let (u, inner) = (*self.atom_fragment.get(first.unique as usize)?)?;
        let canonical = &self.fragments[u];
        if canonical.atom_indices.len() != indices.len() {
            return None;
        }
        let shift = first.offset() - inner;
        canonical
            .atom_indices
            .iter()
            .zip(indices)
            .all(|(c, i)| c.translated(shift) == *i)
            .then_some((u, shift))
    }

    /// Find the symmetry operation mapping `reference` onto `target`.
    ///
    /// Returns `None` straight away when the fragments differ in size or
    /// composition. Otherwise operations are tried in table order: the
    /// reference is transformed, translated so the centroids coincide, and
    /// each atom is paired with the nearest unused target atom of the same
    /// element. The first operation with fractional RMSD below tolerance wins.
    pub fn get_transformation(&self, reference: &Fragment, target: &Fragment) -> Option<SymmetryMatch> {
        if reference.size() != target.size() || reference.is_empty() {
            return None;
        }
        if reference.composition() != target.composition() {
            return None;
        }

        let n = reference.size();
        let ref_frac: Vec<Vector3<f64>> = reference.positions.iter().map(|p| self.lattice.to_fractional(p)).collect();
        let tgt_frac: Vec<Vector3<f64>> = target.positions.iter().map(|p| self.lattice.to_fractional(p)).collect();
        let tgt_centroid = tgt_frac.iter().sum::<Vector3<f64>>() / n as f64;

        for (op_index, op) in self.operations.iter().enumerate() {
            let moved: Vec<Vector3<f64>> = ref_frac.iter().map(|p| op.apply(p)).collect();
            let shift = tgt_centroid - moved.iter().sum::<Vector3<f64>>() / n as f64;

            let mut used = vec![false; n];
            let mut sum_sq = 0.0;
            let mut complete = true;
            for (k, p) in moved.iter().enumerate() {
                let p = p + shift;
                let z = reference.atomic_numbers[k];
                let nearest = (0..n)
                    .filter(|&m| !used[m] && target.atomic_numbers[m] == z)
                    .map(|m| (m, (tgt_frac[m] - p).norm_squared()))
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                match nearest {
                    Some((m, d2)) => {
                        used[m] = true;
                        sum_sq += d2;
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                continue;
            }

            let rmsd = (sum_sq / n as f64).sqrt();
            if rmsd < self.rmsd_tolerance {
                let transform = FragmentTransform {
                    rotation: self.lattice.cartesian_rotation(&op.rotation),
                    translation: self.lattice.to_cartesian(&(op.translation + shift)),
                    symop: op_index,
                };
                return Some(SymmetryMatch { transform, rmsd });
            }
        }
        None
    }

    /// Image of a fragment image under symmetry operation `op`.
    pub fn transform_fragment_index(&self, op: usize, index: &FragmentIndex) -> FragmentIndex {
        let Some(atoms) = self.fragment_atoms(index) else {
            return FragmentIndex::INVALID;
        };
        let Some(first) = atoms.first() else {
            return FragmentIndex::INVALID;
        };
        match self.transform_atom_index(op, first) {
            Some(image) => self.fragment_index_of_atom(&image),
            None => FragmentIndex::INVALID,
        }
    }

    /// Covalent components of the unit-cell atoms, each translated so that its
    /// fractional centroid lies in [0,1) along the periodic axes.
    pub(crate) fn discover_unit_cell_fragments(&mut self) {
        let n = self.atoms.len();
        self.atom_fragment = vec![None; n];
        self.fragments.clear();

        for root in 0..n {
            if self.atom_fragment[root].is_some() {
                continue;
            }
            let images = connected_images(&self.graph, root, Vector3::zeros(), covalent_only);
            let centroid = images
                .iter()
                .map(|i| self.atoms[i.unique as usize].frac + i.offset().map(|v| v as f64))
                .sum::<Vector3<f64>>()
                / images.len() as f64;
            let shift = self.periodicity.clamp(centroid.map(|c| -(c.floor() as i32)));

            let u = self.fragments.len();
            let indices: Vec<GenericAtomIndex> = images.iter().map(|i| i.translated(shift)).collect();
            for idx in &indices {
                self.atom_fragment[idx.unique as usize] = Some((u, idx.offset()));
            }
            let mut fragment = self.build_fragment(indices);
            fragment.index = FragmentIndex::new(u as i32, 0, 0, 0);
            self.fragments.push(fragment);
        }
    }

    /// Assign every unit-cell fragment to a symmetry-unique fragment.
    pub(crate) fn derive_unique_fragments(&mut self) {
        self.unique_fragments.clear();
        for u in 0..self.fragments.len() {
            let found = self
                .unique_fragments
                .iter()
                .enumerate()
                .find_map(|(k, unique)| self.get_transformation(unique, &self.fragments[u]).map(|m| (k, m)));

            match found {
                Some((k, m)) => {
                    self.fragments[u].asymmetric_fragment_index = FragmentIndex::new(k as i32, 0, 0, 0);
                    self.fragments[u].asymmetric_fragment_transform = m.transform;
                }
                None => {
                    let k = self.unique_fragments.len();
                    self.fragments[u].asymmetric_fragment_index = FragmentIndex::new(k as i32, 0, 0, 0);
                    self.fragments[u].asymmetric_fragment_transform = FragmentTransform::identity();
                    self.unique_fragments.push(self.fragments[u].clone());
                }
            }
        }
    }

    /// Fragment with positions and atomic numbers filled in, identity unset.
    fn build_fragment(&self, atom_indices: Vec<GenericAtomIndex>) -> Fragment {
        let mut atomic_numbers = Vec::with_capacity(atom_indices.len());
        let mut positions = Vec::with_capacity(atom_indices.len());
        for idx in &atom_indices {
            let atom = &self.atoms[idx.unique as usize];
            atomic_numbers.push(atom.atomic_number);
            positions.push(atom.cart + self.lattice.translation(&idx.offset()));
        }
        Fragment {
            atom_indices,
            atomic_numbers,
            positions,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{inverted_pair_cell, two_atom_molecule_cell};

    #[test]
    fn test_make_fragment_sorts_and_dedups() {
        let cell = two_atom_molecule_cell();
        let f = cell.make_fragment(&[
            GenericAtomIndex::new(1, 2, 0, 0),
            GenericAtomIndex::new(0, 2, 0, 0),
            GenericAtomIndex::new(1, 2, 0, 0),
            GenericAtomIndex::new(9, 0, 0, 0),
        ]);
        assert_eq!(f.size(), 2);
        assert!(f.atom_indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(f.index, FragmentIndex::new(0, 2, 0, 0));
        assert_eq!(f.asymmetric_fragment_index, FragmentIndex::new(0, 0, 0, 0));
        assert!((f.asymmetric_fragment_transform.translation - Vector3::new(20.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_partial_fragment_has_no_index() {
        let cell = two_atom_molecule_cell();
        let f = cell.make_fragment(&[GenericAtomIndex::new(0, 0, 0, 0)]);
        assert!(!f.index.is_valid());
        assert!(!f.asymmetric_fragment_index.is_valid());
        assert!(f.asymmetric_fragment_transform.is_identity());
    }

    #[test]
    fn test_unit_cell_fragment_centroids_inside_cell() {
        let cell = inverted_pair_cell();
        assert_eq!(cell.unit_cell_fragments().len(), 2);
        for f in cell.unit_cell_fragments() {
            let c = cell.lattice().to_fractional(&f.centroid());
            assert!(c.iter().all(|x| (0.0..1.0).contains(x)));
        }
    }

    #[test]
    fn test_symmetry_equivalent_fragments_match() {
        let cell = inverted_pair_cell();
        assert_eq!(cell.symmetry_unique_fragments().len(), 1);
        let frags = cell.unit_cell_fragments();
        let found = cell.get_transformation(&frags[0], &frags[1]).unwrap();
        assert!(found.rmsd < 1e-6);
        // A pure translation does not relate the two: the inversion is needed
        assert_eq!(found.transform.symop, 1);
        for (p, z) in frags[0].positions.iter().zip(&frags[0].atomic_numbers) {
            let q = found.transform.apply(p);
            assert!(frags[1]
                .positions
                .iter()
                .zip(&frags[1].atomic_numbers)
                .any(|(r, w)| w == z && (r - q).norm() < 1e-6));
        }
        assert_eq!(frags[1].asymmetric_fragment_index, FragmentIndex::new(0, 0, 0, 0));
    }

    #[test]
    fn test_different_composition_fails_fast() {
        let cell = inverted_pair_cell();
        let frags = cell.unit_cell_fragments();
        let mut other = frags[1].clone();
        other.atomic_numbers = vec![7, 7];
        assert!(cell.get_transformation(&frags[0], &other).is_none());

        let single = cell.make_fragment(&[GenericAtomIndex::new(0, 0, 0, 0)]);
        assert!(cell.get_transformation(&frags[0], &single).is_none());
    }

    #[test]
    fn test_transform_fragment_index() {
        let cell = inverted_pair_cell();
        let image = cell.transform_fragment_index(1, &FragmentIndex::new(0, 0, 0, 0));
        assert_eq!(image, FragmentIndex::new(1, -1, -1, -1));
        assert_eq!(
            cell.transform_fragment_index(0, &FragmentIndex::new(1, 2, 0, 0)),
            FragmentIndex::new(1, 2, 0, 0)
        );
        assert!(!cell.transform_fragment_index(1, &FragmentIndex::INVALID).is_valid());
        assert!(!cell.transform_fragment_index(5, &FragmentIndex::new(0, 0, 0, 0)).is_valid());
    }

    #[test]
    fn test_fragment_atoms_match_traversal() {
        let cell = inverted_pair_cell();
        let atoms = cell.fragment_atoms(&FragmentIndex::new(1, 0, 1, 0)).unwrap();
        let f = cell.make_fragment(&atoms);
        assert_eq!(f.index, FragmentIndex::new(1, 0, 1, 0));
        let whole = cell.fragment_containing(&GenericAtomIndex::new(3, 0, 1, 0)).unwrap();
        assert_eq!(whole.atom_indices, f.atom_indices);
    }
}
