// src/testing.rs
//! Small crystals shared by the unit tests.

use crate::config::Config;
use crate::model::asymmetric_unit::{AsymmetricUnit, CellAtom};
use crate::model::symmetry::SpaceGroup;
use crate::model::unit_cell::UnitCell;
use crate::physics::crystal::Crystal;
use crate::physics::periodic_cell::PeriodicCell;
use std::sync::Arc;

/// P1 cell atoms from (label, fractional position) pairs.
pub fn cell_atoms(lattice: &UnitCell, sites: &[(&str, [f64; 3])]) -> Vec<CellAtom> {
    let mut asym = AsymmetricUnit::new();
    for (label, frac) in sites {
        asym.push(label, *frac);
    }
    asym.unit_cell_atoms(lattice, &SpaceGroup::p1(), 1e-3)
}

fn crystal(lattice: UnitCell, space_group: SpaceGroup, sites: &[(&str, [f64; 3])]) -> Crystal {
    let mut asym = AsymmetricUnit::new();
    for (label, frac) in sites {
        asym.push(label, *frac);
    }
    Crystal::new(lattice, space_group, asym, &Config::default()).unwrap()
}

/// Two water molecules in a 20 Å box; H2 of the first donates to O of the second.
pub fn water_dimer_cell() -> (UnitCell, Vec<CellAtom>) {
    let lattice = UnitCell::cubic(20.0).unwrap();
    let cart = [
        ("O1", [5.00, 5.00, 5.0]),
        ("H1", [4.76, 5.93, 5.0]),
        ("H2", [5.96, 5.00, 5.0]),
        ("O2", [7.86, 5.00, 5.0]),
        ("H3", [8.10, 5.93, 5.0]),
        ("H4", [8.10, 4.07, 5.0]),
    ];
    let sites: Vec<(&str, [f64; 3])> = cart
        .iter()
        .map(|(l, p)| (*l, [p[0] / 20.0, p[1] / 20.0, p[2] / 20.0]))
        .collect();
    let atoms = cell_atoms(&lattice, &sites);
    (lattice, atoms)
}

pub fn water_dimer_crystal() -> Arc<Crystal> {
    let (lattice, atoms) = water_dimer_cell();
    let sites: Vec<(&str, [f64; 3])> = atoms
        .iter()
        .map(|a| (a.label.as_str(), [a.frac.x, a.frac.y, a.frac.z]))
        .collect();
    Arc::new(crystal(lattice, SpaceGroup::p1(), &sites))
}

/// One C2 molecule (1.5 Å bond) in a 10 Å P1 box.
pub fn two_atom_crystal() -> Arc<Crystal> {
    Arc::new(crystal(
        UnitCell::cubic(10.0).unwrap(),
        SpaceGroup::p1(),
        &[("C1", [0.10, 0.1, 0.1]), ("C2", [0.25, 0.1, 0.1])],
    ))
}

pub fn two_atom_molecule_cell() -> PeriodicCell {
    two_atom_crystal().cell().clone()
}

/// P-1 with one CO molecule in the asymmetric unit: two molecules per cell,
/// related by the inversion only.
pub fn inverted_pair_crystal() -> Crystal {
    crystal(
        UnitCell::cubic(10.0).unwrap(),
        SpaceGroup::from_strings(2, &["x,y,z", "-x,-y,-z"]).unwrap(),
        &[("C1", [0.1, 0.1, 0.1]), ("O1", [0.2, 0.1, 0.1])],
    )
}

pub fn inverted_pair_cell() -> PeriodicCell {
    inverted_pair_crystal().cell().clone()
}

/// Conventional NaCl cell with the P-1 subgroup of its symmetry.
pub fn rock_salt_cell() -> PeriodicCell {
    crystal(
        UnitCell::cubic(5.64).unwrap(),
        SpaceGroup::from_strings(2, &["x,y,z", "-x,-y,-z"]).unwrap(),
        &[
            ("Na", [0.0, 0.0, 0.0]),
            ("Na", [0.0, 0.5, 0.5]),
            ("Na", [0.5, 0.0, 0.5]),
            ("Na", [0.5, 0.5, 0.0]),
            ("Cl", [0.5, 0.5, 0.5]),
            ("Cl", [0.5, 0.0, 0.0]),
            ("Cl", [0.0, 0.5, 0.0]),
            ("Cl", [0.0, 0.0, 0.5]),
        ],
    )
    .cell()
    .clone()
}

/// CO molecules in two layers, at z = 0.25 and z = 0.75 of a 12 Å c axis.
pub fn layered_crystal() -> Crystal {
    crystal(
        UnitCell::orthorhombic(6.0, 6.0, 12.0).unwrap(),
        SpaceGroup::p1(),
        &[
            ("C1", [0.1, 0.1, 0.25]),
            ("O1", [0.3, 0.1, 0.25]),
            ("C2", [0.1, 0.1, 0.75]),
            ("O2", [0.3, 0.1, 0.75]),
        ],
    )
}
