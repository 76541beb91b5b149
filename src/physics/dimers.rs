// src/physics/dimers.rs

use crate::model::fragment::Fragment;
use crate::model::index::{DimerIndex, FragmentIndex};
use crate::physics::periodic_cell::PeriodicCell;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Two fragment images considered as one pairwise interaction.
#[derive(Debug, Clone)]
pub struct FragmentDimer {
    pub index: DimerIndex,
    pub a: Fragment,
    pub b: Fragment,
    pub nearest_distance: f64,
    pub centroid_distance: f64,
}

impl FragmentDimer {
    pub fn new(a: Fragment, b: Fragment) -> Self {
        let nearest_distance = a.nearest_distance(&b);
        let centroid_distance = (a.centroid() - b.centroid()).norm();
        Self {
            index: DimerIndex::new(a.index, b.index),
            a,
            b,
            nearest_distance,
            centroid_distance,
        }
    }

    /// Sorted atomic numbers of both members.
    pub fn composition(&self) -> (Vec<u32>, Vec<u32>) {
        (self.a.composition(), self.b.composition())
    }
}

/// Every pair `(u @ 000, v @ hkl)` of unit-cell fragment images whose nearest
/// atoms are at most `radius` Å apart, ordered by `u`, then `v`, then offset.
pub fn unit_cell_dimers(cell: &PeriodicCell, radius: f64) -> Vec<FragmentDimer> {
    let fragments = cell.unit_cell_fragments();
    let extent = fragments.iter().map(|f| f.radius()).fold(0.0, f64::max);
    let range = cell
        .periodicity()
        .clamp(cell.lattice().cells_within(radius + 2.0 * extent));

    let dimers: Vec<Vec<FragmentDimer>> = (0..fragments.len())
        .into_par_iter()
        .map(|u| {
            let a = &fragments[u];
            let mut found = Vec::new();
            for (v, canonical) in fragments.iter().enumerate() {
                for x in -range.x..=range.x {
                    for y in -range.y..=range.y {
                        for z in -range.z..=range.z {
                            let offset = Vector3::new(x, y, z);
                            if u == v && offset == Vector3::zeros() {
                                continue;
                            }
                            let shift = cell.lattice().translation(&offset);
                            let centroid_gap = (canonical.centroid() + shift - a.centroid()).norm();
                            if centroid_gap > radius + a.radius() + canonical.radius() {
                                continue;
                            }
                            let Some(atoms) = cell.fragment_atoms(&FragmentIndex::from_offset(v, offset)) else {
                                continue;
                            };
                            let b = cell.make_fragment(&atoms);
                            if a.nearest_distance(&b) <= radius {
                                found.push(FragmentDimer::new(a.clone(), b));
                            }
                        }
                    }
                }
            }
            found
        })
        .collect();

    let dimers: Vec<FragmentDimer> = dimers.into_iter().flatten().collect();
    log::debug!("{} unit-cell dimers within {:.2} Å", dimers.len(), radius);
    dimers
}

/// Reduces dimers to symmetry-unique representatives.
///
/// The canonical form of a dimer has its first fragment in the origin cell.
/// With `consider_inversion` the swapped pair is canonicalised as well and the
/// smaller of the two forms kept, so `AB` and `BA` are the same interaction.
#[derive(Debug, Clone, Default)]
pub struct DimerMappingTable {
    consider_inversion: bool,
    unique_dimers: Vec<DimerIndex>,
    symmetry_unique: HashMap<DimerIndex, usize>,
    /// Canonical dimer -> operation mapping its representative onto it.
    operations: HashMap<DimerIndex, usize>,
}

impl DimerMappingTable {
    pub fn build(cell: &PeriodicCell, dimers: &[DimerIndex], consider_inversion: bool) -> Self {
        let mut table = Self {
            consider_inversion,
            ..Default::default()
        };

        for dimer in dimers {
            if !dimer.is_valid() {
                continue;
            }
            let canonical = table.canonical_dimer_index(dimer);
            if table.symmetry_unique.contains_key(&canonical) {
                continue;
            }
            let k = table.unique_dimers.len();
            table.unique_dimers.push(canonical);
            table.symmetry_unique.insert(canonical, k);
            table.operations.insert(canonical, 0);

            for op in 0..cell.operations().len() {
                let image = DimerIndex::new(
                    cell.transform_fragment_index(op, &canonical.a),
                    cell.transform_fragment_index(op, &canonical.b),
                );
                if !image.is_valid() {
                    continue;
                }
                let image = table.canonical_dimer_index(&image);
                table.symmetry_unique.entry(image).or_insert(k);
                table.operations.entry(image).or_insert(op);
            }
        }
        log::debug!(
            "Dimer mapping: {} dimers -> {} unique (inversion {})",
            dimers.len(),
            table.unique_dimers.len(),
            consider_inversion
        );
        table
    }

    pub fn consider_inversion(&self) -> bool {
        self.consider_inversion
    }

    pub fn canonical_dimer_index(&self, dimer: &DimerIndex) -> DimerIndex {
        let forward = dimer.at_origin();
        if !self.consider_inversion {
            return forward;
        }
        forward.min(dimer.reversed().at_origin())
    }

    /// Index and canonical form of the unique dimer `dimer` is an image of.
    pub fn symmetry_unique_dimer(&self, dimer: &DimerIndex) -> Option<(usize, DimerIndex)> {
        let canonical = self.canonical_dimer_index(dimer);
        let k = *self.symmetry_unique.get(&canonical)?;
        Some((k, self.unique_dimers[k]))
    }

    /// Operation that maps the representative onto the canonical form of `dimer`.
    pub fn operation_for(&self, dimer: &DimerIndex) -> Option<usize> {
        self.operations.get(&self.canonical_dimer_index(dimer)).copied()
    }

    pub fn unique_dimers(&self) -> &[DimerIndex] {
        &self.unique_dimers
    }

    /// Canonical dimers mapped onto unique dimer `k`, sorted.
    pub fn symmetry_related_dimers(&self, k: usize) -> Vec<DimerIndex> {
        let mut related: Vec<DimerIndex> = self
            .symmetry_unique
            .iter()
            .filter(|(_, v)| **v == k)
            .map(|(d, _)| *d)
            .collect();
        related.sort();
        related
    }
}

/// One mapping table per inversion setting, with the radius it was built for.
#[derive(Debug, Default)]
pub(crate) struct DimerTableCache {
    tables: [RwLock<Option<(f64, Arc<DimerMappingTable>)>>; 2],
}

impl Clone for DimerTableCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PeriodicCell {
    /// Mapping table covering every unit-cell dimer within `radius`.
    ///
    /// A table built for a larger radius also covers smaller ones, so it is
    /// reused until a call asks for more.
    pub fn dimer_mapping_table(&self, radius: f64, consider_inversion: bool) -> Arc<DimerMappingTable> {
        let slot = &self.dimer_tables.tables[usize::from(consider_inversion)];
        if let Ok(cached) = slot.read() {
            if let Some((covered, table)) = cached.as_ref() {
                if *covered >= radius {
                    return Arc::clone(table);
                }
            }
        }

        let dimers: Vec<DimerIndex> = unit_cell_dimers(self, radius).iter().map(|d| d.index).collect();
        let table = Arc::new(DimerMappingTable::build(self, &dimers, consider_inversion));
        if let Ok(mut cached) = slot.write() {
            *cached = Some((radius, Arc::clone(&table)));
        }
        table
    }
}
