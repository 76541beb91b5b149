// src/physics/crystal.rs

use crate::config::Config;
use crate::model::asymmetric_unit::AsymmetricUnit;
use crate::model::symmetry::{SpaceGroup, SymmetryError};
use crate::model::unit_cell::UnitCell;
use crate::physics::periodic_cell::{PeriodicCell, Periodicity};
use crate::utils::linalg::{minimum_image, wrap_fractional};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CrystalError {
    EmptyAsymmetricUnit,
    /// Asymmetric unit columns have different lengths.
    InconsistentAtoms(String),
    Symmetry(SymmetryError),
}

impl fmt::Display for CrystalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrystalError::EmptyAsymmetricUnit => write!(f, "Crystal has no atoms"),
            CrystalError::InconsistentAtoms(msg) => write!(f, "Inconsistent asymmetric unit: {}", msg),
            CrystalError::Symmetry(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CrystalError {}

impl From<SymmetryError> for CrystalError {
    fn from(e: SymmetryError) -> Self {
        CrystalError::Symmetry(e)
    }
}

/// Crystal definition: lattice, space group, asymmetric unit and everything
/// derived from them. Immutable once built; share it through `Arc`.
#[derive(Debug, Clone)]
pub struct Crystal {
    pub title: String,
    asymmetric_unit: AsymmetricUnit,
    space_group: SpaceGroup,
    cell: PeriodicCell,
}

impl Crystal {
    pub fn new(
        lattice: UnitCell,
        space_group: SpaceGroup,
        asymmetric_unit: AsymmetricUnit,
        config: &Config,
    ) -> Result<Self, CrystalError> {
        if asymmetric_unit.is_empty() {
            return Err(CrystalError::EmptyAsymmetricUnit);
        }
        let n = asymmetric_unit.len();
        if asymmetric_unit.labels.len() != n || asymmetric_unit.atomic_numbers.len() != n || asymmetric_unit.adps.len() != n {
            return Err(CrystalError::InconsistentAtoms(format!(
                "{} positions, {} labels, {} atomic numbers, {} ADPs",
                n,
                asymmetric_unit.labels.len(),
                asymmetric_unit.atomic_numbers.len(),
                asymmetric_unit.adps.len()
            )));
        }
        if space_group.is_empty() {
            return Err(CrystalError::Symmetry(SymmetryError::MissingIdentity));
        }

        let atoms = asymmetric_unit.unit_cell_atoms(&lattice, &space_group, config.symmetry.duplicate_tolerance);
        log::info!(
            "Crystal: {} asymmetric atoms -> {} unit-cell atoms (space group {}, {} operations)",
            n,
            atoms.len(),
            space_group.number,
            space_group.len()
        );
        let cell = PeriodicCell::new(
            lattice,
            Periodicity::Three,
            atoms,
            space_group.operations().to_vec(),
            config,
        );

        Ok(Self {
            title: String::new(),
            asymmetric_unit,
            space_group,
            cell,
        })
    }

    /// Crystal from a full P1 atom list: the space group is detected with moyo
    /// and the atom list reduced to one representative per orbit.
    pub fn from_p1(lattice: UnitCell, atoms: AsymmetricUnit, config: &Config) -> Result<Self, CrystalError> {
        if atoms.is_empty() {
            return Err(CrystalError::EmptyAsymmetricUnit);
        }
        let space_group = SpaceGroup::detect(&lattice, &atoms.positions, &atoms.atomic_numbers, config.symmetry.symprec)?;

        let tolerance = config.symmetry.duplicate_tolerance.max(config.symmetry.symprec);
        let mut covered = vec![false; atoms.len()];
        let mut reduced = AsymmetricUnit::new();
        for i in 0..atoms.len() {
            if covered[i] {
                continue;
            }
            reduced.labels.push(atoms.labels[i].clone());
            reduced.atomic_numbers.push(atoms.atomic_numbers[i]);
            reduced.positions.push(atoms.positions[i]);
            reduced.adps.push(atoms.adps.get(i).copied().flatten());

            for op in space_group.operations() {
                let image = wrap_fractional(&op.apply(&atoms.positions[i]), 1e-6);
                for j in i..atoms.len() {
                    if covered[j] || atoms.atomic_numbers[j] != atoms.atomic_numbers[i] {
                        continue;
                    }
                    let df = minimum_image(&(atoms.positions[j] - image));
                    if lattice.to_cartesian(&df).norm() < tolerance {
                        covered[j] = true;
                    }
                }
            }
        }
        log::debug!(
            "Reduced {} P1 atoms to {} asymmetric atoms",
            atoms.len(),
            reduced.len()
        );
        Self::new(lattice, space_group, reduced, config)
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn asymmetric_unit(&self) -> &AsymmetricUnit {
        &self.asymmetric_unit
    }

    pub fn space_group(&self) -> &SpaceGroup {
        &self.space_group
    }

    pub fn unit_cell(&self) -> &UnitCell {
        self.cell.lattice()
    }

    pub fn cell(&self) -> &PeriodicCell {
        &self.cell
    }
}
