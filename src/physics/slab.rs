// src/physics/slab.rs

use crate::config::Config;
use crate::model::asymmetric_unit::CellAtom;
use crate::model::index::GenericAtomIndex;
use crate::model::symmetry::SymmetryOperation;
use crate::model::unit_cell::{CellError, UnitCell};
use crate::physics::crystal::Crystal;
use crate::physics::miller::{CrystalPlane, MillerIndex, PlaneError};
use crate::physics::periodic_cell::{PeriodicCell, Periodicity};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Depths closer than this (Å) count as the same layer.
const LAYER_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub enum SlabError {
    Plane(PlaneError),
    InvalidThickness(f64),
    Cell(CellError),
    /// The window between the cut planes contains no molecule.
    Empty,
}

impl fmt::Display for SlabError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlabError::Plane(e) => write!(f, "{}", e),
            SlabError::InvalidThickness(t) => write!(f, "Slab thickness must be positive, got {}", t),
            SlabError::Cell(e) => write!(f, "{}", e),
            SlabError::Empty => write!(f, "No molecule lies inside the slab"),
        }
    }
}

impl std::error::Error for SlabError {}

impl From<PlaneError> for SlabError {
    fn from(e: PlaneError) -> Self {
        SlabError::Plane(e)
    }
}

impl From<CellError> for SlabError {
    fn from(e: CellError) -> Self {
        SlabError::Cell(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlabOptions {
    pub miller: MillerIndex,
    /// Position of the lower cut plane, in units of d(hkl).
    pub offset: f64,
    /// Depth of the slab along the plane normal (Å).
    pub thickness: f64,
}

/// A cut position that does not split any molecule layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Termination {
    pub tag: String,
    /// In units of d(hkl), in [0, 1).
    pub offset: f64,
}

/// Distinct terminations of the (hkl) surface: one cut midway between each
/// pair of consecutive molecular layers, tagged "t0", "t1", ... by depth.
pub fn terminations(crystal: &Crystal, miller: MillerIndex) -> Result<Vec<Termination>, PlaneError> {
    let cell = crystal.cell();
    let plane = CrystalPlane::new(cell.lattice(), miller, 0.0)?;
    let d = plane.d_spacing;

    let mut depths: Vec<f64> = cell
        .unit_cell_fragments()
        .iter()
        .map(|f| plane.depth(&f.centroid()).rem_euclid(d))
        .collect();
    depths.sort_by(|a, b| a.total_cmp(b));
    depths.dedup_by(|a, b| (*a - *b).abs() < LAYER_TOLERANCE);
    if depths.len() > 1 && (depths[0] + d - depths[depths.len() - 1]).abs() < LAYER_TOLERANCE {
        depths.pop();
    }

    let mut cuts: Vec<f64> = Vec::with_capacity(depths.len());
    for (i, depth) in depths.iter().enumerate() {
        let next = if i + 1 < depths.len() { depths[i + 1] } else { depths[0] + d };
        cuts.push(((depth + next) / 2.0).rem_euclid(d) / d);
    }
    cuts.sort_by(|a, b| a.total_cmp(b));

    Ok(cuts
        .into_iter()
        .enumerate()
        .map(|(i, offset)| Termination {
            tag: format!("t{}", i),
            offset,
        })
        .collect())
}

/// A 2-periodic cut of a crystal parallel to (hkl).
///
/// Whole molecules are kept: a molecule image belongs to the slab when its
/// centroid lies inside the in-plane cell and between the two cut planes.
/// The slab cell has the in-plane lattice vectors as a and b and
/// `normal * thickness` as c; its origin is the lower cut plane.
#[derive(Debug, Clone)]
pub struct Slab {
    crystal: Arc<Crystal>,
    options: SlabOptions,
    plane: CrystalPlane,
    cell: PeriodicCell,
    termination: Option<String>,
    stacking: Option<Vector3<i32>>,
}

impl Slab {
    pub fn new(crystal: Arc<Crystal>, options: SlabOptions, config: &Config) -> Result<Self, SlabError> {
        if !(options.thickness > 0.0) {
            return Err(SlabError::InvalidThickness(options.thickness));
        }
        let bulk = crystal.cell();
        let lattice = bulk.lattice();
        let plane = CrystalPlane::with_settings(lattice, options.miller, options.offset, &config.plane)?;

        let slab_lattice = UnitCell::from_basis(Matrix3::from_columns(&[
            plane.a,
            plane.b,
            plane.normal * options.thickness,
        ]))?;
        let to_slab = Matrix3::from_columns(&[plane.a, plane.b, plane.normal])
            .try_inverse()
            .ok_or(SlabError::Cell(CellError::SingularLattice))?;

        // Crystal cells that can hold a centroid of the slab cell
        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        for corner in 0..8 {
            let p = plane.origin
                + plane.a * (corner & 1) as f64
                + plane.b * ((corner >> 1) & 1) as f64
                + plane.normal * (options.thickness * ((corner >> 2) & 1) as f64);
            let f = lattice.to_fractional(&p);
            lo = lo.inf(&f);
            hi = hi.sup(&f);
        }
        let lo = lo.map(|v| v.floor() as i32 - 1);
        let hi = hi.map(|v| v.ceil() as i32 + 1);

        let tol = 1e-6;
        let mut atoms: Vec<CellAtom> = Vec::new();
        for (u, fragment) in bulk.unit_cell_fragments().iter().enumerate() {
            let centroid = fragment.centroid();
            for x in lo.x..=hi.x {
                for y in lo.y..=hi.y {
                    for z in lo.z..=hi.z {
                        let shift = Vector3::new(x, y, z);
                        let c = to_slab * (centroid + lattice.translation(&shift) - plane.origin);
                        let inside = c.x >= -tol
                            && c.x < 1.0 - tol
                            && c.y >= -tol
                            && c.y < 1.0 - tol
                            && c.z >= -tol
                            && c.z < options.thickness - tol;
                        if !inside {
                            continue;
                        }
                        for idx in &fragment.atom_indices {
                            let source = idx.translated(shift);
                            let Some(cart) = bulk.position(&source) else {
                                continue;
                            };
                            let bulk_atom = &bulk.atoms()[source.unique as usize];
                            let local = cart - plane.origin;
                            atoms.push(CellAtom {
                                label: bulk_atom.label.clone(),
                                atomic_number: bulk_atom.atomic_number,
                                frac: slab_lattice.to_fractional(&local),
                                cart: local,
                                asymmetric_index: bulk_atom.asymmetric_index,
                                symop: bulk_atom.symop,
                                adp: bulk_atom.adp,
                                source: Some(source),
                            });
                        }
                        log::trace!("Slab keeps fragment {} shifted by {:?}", u, shift);
                    }
                }
            }
        }

        if atoms.is_empty() {
            log::warn!(
                "Slab {} at offset {} with thickness {} is empty",
                options.miller,
                options.offset,
                options.thickness
            );
            return Err(SlabError::Empty);
        }

        let termination = terminations(&crystal, options.miller)
            .ok()
            .and_then(|ts| {
                let wrapped = options.offset.rem_euclid(1.0);
                ts.into_iter().find(|t| (t.offset - wrapped).abs() < 1e-6)
            })
            .map(|t| t.tag);

        let stacking = match plane.stacking_vector(lattice, config.plane.stacking_search_limit) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };

        let cell = PeriodicCell::new(
            slab_lattice,
            Periodicity::Two,
            atoms,
            vec![SymmetryOperation::identity()],
            config,
        );
        log::info!(
            "Slab {}: {} atoms, {} molecules, d = {:.4} Å",
            options.miller,
            cell.num_atoms(),
            cell.unit_cell_fragments().len(),
            plane.d_spacing
        );

        Ok(Self {
            crystal,
            options,
            plane,
            cell,
            termination,
            stacking,
        })
    }

    pub fn crystal(&self) -> &Arc<Crystal> {
        &self.crystal
    }

    pub fn options(&self) -> &SlabOptions {
        &self.options
    }

    pub fn plane(&self) -> &CrystalPlane {
        &self.plane
    }

    pub fn cell(&self) -> &PeriodicCell {
        &self.cell
    }

    pub fn termination(&self) -> Option<&str> {
        self.termination.as_deref()
    }

    /// Crystal lattice vector from one (hkl) layer to the next, if one was
    /// found within the configured search limit.
    pub fn stacking_vector(&self) -> Option<Vector3<i32>> {
        self.stacking
    }

    /// Slab cell vectors as rows: in-plane a, in-plane b, normal * thickness.
    pub fn basis(&self) -> [[f64; 3]; 3] {
        self.cell.lattice().lattice_rows()
    }

    /// Crystal atom image a slab atom was cut from.
    pub fn source_atom(&self, index: &GenericAtomIndex) -> Option<GenericAtomIndex> {
        let atom = self.cell.atoms().get(usize::try_from(index.unique).ok()?)?;
        let source = atom.source?;
        let shift = self.plane.lattice_a * index.x + self.plane.lattice_b * index.y;
        Some(source.translated(shift))
    }
}
