// src/physics/bonds/graph.rs

use super::BondKind;
use crate::config::BondSettings;
use crate::model::asymmetric_unit::CellAtom;
use crate::model::elements::{get_atom_cov, get_atom_vdw, is_hbond_heavy_atom};
use crate::model::unit_cell::UnitCell;
use nalgebra::Vector3;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

/// Pairs closer than this are treated as the same point, never as a bond.
const OVERLAP_DISTANCE: f64 = 1e-4;

/// Edge payload: the neighbour sits in the cell `offset` away from the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicEdge {
    pub kind: BondKind,
    pub offset: Vector3<i32>,
    pub distance: f64,
}

/// Connectivity of the unit-cell atoms across periodic boundaries.
///
/// Vertex `n` is unit-cell atom `n`. Every bond is stored as two directed
/// edges, `i -> j` with offset `o` and `j -> i` with offset `-o`. A bond from an
/// atom to its own image in another cell is a self loop with a non-zero offset.
#[derive(Debug, Clone, Default)]
pub struct PeriodicBondGraph {
    graph: DiGraph<usize, PeriodicEdge>,
}

impl PeriodicBondGraph {
    pub fn new(vertex_count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(vertex_count, vertex_count * 4);
        for i in 0..vertex_count {
            graph.add_node(i);
        }
        Self { graph }
    }

    /// Covalent graph from covalent radius sums plus `settings.covalent_tolerance`.
    ///
    /// `periodic` switches the neighbour search off along non-periodic axes.
    pub fn covalent(lattice: &UnitCell, atoms: &[CellAtom], periodic: [bool; 3], settings: &BondSettings) -> Self {
        let mut graph = Self::new(atoms.len());
        let max_cov = atoms
            .iter()
            .map(|a| get_atom_cov(a.atomic_number))
            .fold(0.0, f64::max);
        let cutoff = 2.0 * max_cov + settings.covalent_tolerance;

        let pairs = pair_candidates(lattice, atoms, periodic, cutoff, |i, j, d| {
            d < get_atom_cov(atoms[i].atomic_number) + get_atom_cov(atoms[j].atomic_number) + settings.covalent_tolerance
        });
        for (i, j, offset, distance) in pairs {
            graph.add_bond(i, j, offset, BondKind::Covalent, distance);
        }
        log::debug!(
            "Covalent graph: {} atoms, {} bonds",
            graph.vertex_count(),
            graph.edge_count() / 2
        );
        graph
    }

    /// Add hydrogen-bond and close-contact edges.
    ///
    /// Pairs for which `same_molecule(i, j, offset)` holds are skipped, so
    /// contacts are only ever intermolecular. Only called while the owning
    /// cell is being built.
    pub(crate) fn add_contacts<F>(
        &mut self,
        lattice: &UnitCell,
        atoms: &[CellAtom],
        periodic: [bool; 3],
        settings: &BondSettings,
        same_molecule: F,
    ) where
        F: Fn(usize, usize, Vector3<i32>) -> bool + Sync,
    {
        let donor_h: Vec<bool> = (0..atoms.len())
            .map(|i| {
                atoms[i].atomic_number == 1
                    && self
                        .edges(i)
                        .any(|(t, e)| e.kind.is_covalent() && is_hbond_heavy_atom(atoms[t].atomic_number))
            })
            .collect();

        let max_vdw = atoms
            .iter()
            .map(|a| get_atom_vdw(a.atomic_number))
            .fold(0.0, f64::max);
        let extra = settings.vdw_tolerance.max(settings.hydrogen_bond_tolerance);
        let cutoff = 2.0 * max_vdw + extra;

        let pairs = pair_candidates(lattice, atoms, periodic, cutoff, |i, j, d| {
            let sum = get_atom_vdw(atoms[i].atomic_number) + get_atom_vdw(atoms[j].atomic_number);
            d <= sum + extra
        });

        let mut hydrogen_bonds = 0;
        let mut close_contacts = 0;
        for (i, j, offset, distance) in pairs {
            if same_molecule(i, j, offset) {
                continue;
            }
            let (zi, zj) = (atoms[i].atomic_number, atoms[j].atomic_number);
            let sum = get_atom_vdw(zi) + get_atom_vdw(zj);
            let hbond = (donor_h[i] && is_hbond_heavy_atom(zj)) || (donor_h[j] && is_hbond_heavy_atom(zi));

            if hbond && distance <= sum + settings.hydrogen_bond_tolerance {
                self.add_bond(i, j, offset, BondKind::HydrogenBond, distance);
                hydrogen_bonds += 1;
            } else if distance <= sum + settings.vdw_tolerance {
                self.add_bond(i, j, offset, BondKind::CloseContact, distance);
                close_contacts += 1;
            }
        }
        log::debug!(
            "Contact edges: {} hydrogen bonds, {} close contacts",
            hydrogen_bonds,
            close_contacts
        );
    }

    /// Insert one bond as a pair of directed edges.
    pub fn add_bond(&mut self, i: usize, j: usize, offset: Vector3<i32>, kind: BondKind, distance: f64) {
        let n = self.vertex_count();
        if i >= n || j >= n {
            log::warn!("Bond {} -> {} references an atom outside the cell ({} atoms)", i, j, n);
            return;
        }
        let (a, b) = (NodeIndex::new(i), NodeIndex::new(j));
        self.graph.add_edge(a, b, PeriodicEdge { kind, offset, distance });
        self.graph.add_edge(b, a, PeriodicEdge { kind, offset: -offset, distance });
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed edges (twice the number of bonds).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges of `vertex` as `(target, edge)`.
    pub fn edges(&self, vertex: usize) -> impl Iterator<Item = (usize, &PeriodicEdge)> + '_ {
        let valid = vertex < self.vertex_count();
        let node = NodeIndex::new(if valid { vertex } else { 0 });
        self.graph
            .edges(node)
            .filter(move |_| valid)
            .map(|e| (e.target().index(), e.weight()))
    }

    pub fn neighbors(&self, vertex: usize, kind: BondKind) -> impl Iterator<Item = (usize, &PeriodicEdge)> + '_ {
        self.edges(vertex).filter(move |(_, e)| e.kind == kind)
    }

    pub fn find_edge(&self, i: usize, j: usize, offset: Vector3<i32>) -> Option<&PeriodicEdge> {
        self.edges(i)
            .find(|(t, e)| *t == j && e.offset == offset)
            .map(|(_, e)| e)
    }

    /// One entry per bond of the given kind, `(i, j, edge)` with `i -> j`.
    pub fn bonds(&self, kind: BondKind) -> Vec<(usize, usize, PeriodicEdge)> {
        let mut out: Vec<(usize, usize, PeriodicEdge)> = self
            .graph
            .edge_references()
            .filter(|e| e.weight().kind == kind)
            .map(|e| (e.source().index(), e.target().index(), e.weight().clone()))
            .filter(|(i, j, e)| i < j || (i == j && is_positive(&e.offset)))
            .collect();
        out.sort_by_key(|(i, j, e)| (*i, *j, e.offset.x, e.offset.y, e.offset.z));
        out
    }
}

/// Lexicographically positive, used to keep one of the two directions of a self-image pair.
fn is_positive(v: &Vector3<i32>) -> bool {
    (v.x, v.y, v.z) > (0, 0, 0)
}

/// Half list of atom pairs `(i, j, offset, distance)` with `i <= j` accepted by `within`.
fn pair_candidates<F>(
    lattice: &UnitCell,
    atoms: &[CellAtom],
    periodic: [bool; 3],
    cutoff: f64,
    within: F,
) -> Vec<(usize, usize, Vector3<i32>, f64)>
where
    F: Fn(usize, usize, f64) -> bool + Sync,
{
    let range = lattice.cells_within(cutoff);
    let range = Vector3::new(
        if periodic[0] { range.x } else { 0 },
        if periodic[1] { range.y } else { 0 },
        if periodic[2] { range.z } else { 0 },
    );
    let mut offsets = Vec::new();
    for x in -range.x..=range.x {
        for y in -range.y..=range.y {
            for z in -range.z..=range.z {
                offsets.push(Vector3::new(x, y, z));
            }
        }
    }
    let shifts: Vec<Vector3<f64>> = offsets.iter().map(|o| lattice.translation(o)).collect();

    (0..atoms.len())
        .into_par_iter()
        .map(|i| {
            let mut found = Vec::new();
            for j in i..atoms.len() {
                let delta = atoms[j].cart - atoms[i].cart;
                for (offset, shift) in offsets.iter().zip(&shifts) {
                    if i == j && !is_positive(offset) {
                        continue;
                    }
                    let d = (delta + shift).norm();
                    if d > OVERLAP_DISTANCE && d <= cutoff && within(i, j, d) {
                        found.push((i, j, *offset, d));
                    }
                }
            }
            found
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}
