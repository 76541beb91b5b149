// src/model/asymmetric_unit.rs

use crate::model::elements::{get_atomic_number, get_symbol};
use crate::model::index::GenericAtomIndex;
use crate::model::symmetry::SpaceGroup;
use crate::model::unit_cell::UnitCell;
use crate::utils::linalg::{minimum_image, wrap_fractional};
use nalgebra::{Matrix3, Vector3};

/// Atoms as given by a structure file, before symmetry expansion.
#[derive(Clone, Debug, Default)]
pub struct AsymmetricUnit {
    pub labels: Vec<String>,
    pub atomic_numbers: Vec<u32>,
    /// Fractional coordinates.
    pub positions: Vec<Vector3<f64>>,
    /// Cartesian displacement tensors U (Å²), if refined anisotropically.
    pub adps: Vec<Option<Matrix3<f64>>>,
}

impl AsymmetricUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one site; the element is taken from the label ("C1", "O2A").
    pub fn push(&mut self, label: &str, frac: [f64; 3]) {
        self.push_with_adp(label, frac, None);
    }

    pub fn push_with_adp(&mut self, label: &str, frac: [f64; 3], adp: Option<Matrix3<f64>>) {
        self.labels.push(label.to_string());
        self.atomic_numbers.push(get_atomic_number(label));
        self.positions.push(Vector3::from(frac));
        self.adps.push(adp);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Expand the asymmetric unit to the full unit cell.
    ///
    /// Sites are generated asymmetric-atom-major, operation-minor, wrapped into
    /// [0,1). A generated site closer than `tolerance` Å (periodically) to an
    /// already generated site of the same asymmetric atom is a special position
    /// duplicate and is dropped.
    pub fn unit_cell_atoms(&self, cell: &UnitCell, space_group: &SpaceGroup, tolerance: f64) -> Vec<CellAtom> {
        let mut atoms: Vec<CellAtom> = Vec::new();
        let wrap_tol = 1e-6;

        for asym in 0..self.len() {
            let first_generated = atoms.len();
            for (op_index, op) in space_group.operations().iter().enumerate() {
                let frac = wrap_fractional(&op.apply(&self.positions[asym]), wrap_tol);

                let is_duplicate = atoms[first_generated..].iter().any(|existing| {
                    let df = minimum_image(&(existing.frac - frac));
                    cell.to_cartesian(&df).norm() < tolerance
                });
                if is_duplicate {
                    continue;
                }

                let adp = self.adps[asym].map(|u| {
                    let r = cell.cartesian_rotation(&op.rotation);
                    r * u * r.transpose()
                });

                atoms.push(CellAtom {
                    label: self.labels[asym].clone(),
                    atomic_number: self.atomic_numbers[asym],
                    frac,
                    cart: cell.to_cartesian(&frac),
                    asymmetric_index: asym,
                    symop: op_index,
                    adp,
                    source: None,
                });
            }
        }
        atoms
    }
}

/// One atom of a periodic cell (a unit-cell site or a slab-cell site).
#[derive(Clone, Debug)]
pub struct CellAtom {
    pub label: String,
    pub atomic_number: u32,
    /// Fractional coordinates in the owning cell.
    pub frac: Vector3<f64>,
    pub cart: Vector3<f64>,
    pub asymmetric_index: usize,
    /// Operation that generated this site from its asymmetric atom.
    pub symop: usize,
    pub adp: Option<Matrix3<f64>>,
    /// For slab sites: the crystal atom image this site was cut from.
    pub source: Option<GenericAtomIndex>,
}

impl CellAtom {
    pub fn symbol(&self) -> &'static str {
        get_symbol(self.atomic_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_position_expands() {
        let cell = UnitCell::orthorhombic(5.0, 6.0, 7.0).unwrap();
        let sg = SpaceGroup::from_strings(2, &["x,y,z", "-x,-y,-z"]).unwrap();
        let mut asym = AsymmetricUnit::new();
        asym.push("C1", [0.1, 0.2, 0.3]);

        let atoms = asym.unit_cell_atoms(&cell, &sg, 1e-3);
        assert_eq!(atoms.len(), 2);
        assert!((atoms[1].frac - Vector3::new(0.9, 0.8, 0.7)).norm() < 1e-12);
        assert_eq!(atoms[1].symop, 1);
        assert_eq!(atoms[1].symbol(), "C");
    }

    #[test]
    fn test_special_position_merges() {
        let cell = UnitCell::cubic(5.0).unwrap();
        let sg = SpaceGroup::from_strings(2, &["x,y,z", "-x,-y,-z"]).unwrap();
        let mut asym = AsymmetricUnit::new();
        asym.push("Na1", [0.0, 0.0, 0.0]);
        asym.push("Cl1", [0.5, 0.5, 0.5]);

        let atoms = asym.unit_cell_atoms(&cell, &sg, 1e-3);
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].atomic_number, 11);
        assert_eq!(atoms[1].atomic_number, 17);
    }

    #[test]
    fn test_adp_rotated_with_site() {
        let cell = UnitCell::cubic(5.0).unwrap();
        let sg = SpaceGroup::from_strings(3, &["x,y,z", "y,x,z"]).unwrap();
        let mut asym = AsymmetricUnit::new();
        let u = Matrix3::new(0.02, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 0.03);
        asym.push_with_adp("O1", [0.1, 0.3, 0.2], Some(u));

        let atoms = asym.unit_cell_atoms(&cell, &sg, 1e-3);
        let swapped = atoms[1].adp.unwrap();
        assert!((swapped[(0, 0)] - 0.01).abs() < 1e-12);
        assert!((swapped[(1, 1)] - 0.02).abs() < 1e-12);
    }
}
