// src/physics/bonds/traversal.rs

use super::graph::{PeriodicBondGraph, PeriodicEdge};
use crate::model::index::GenericAtomIndex;
use nalgebra::Vector3;
use std::collections::VecDeque;

/// One step of a breadth-first walk.
#[derive(Debug, Clone)]
pub struct Visit {
    pub vertex: usize,
    /// `None` for the root.
    pub predecessor: Option<usize>,
    /// Edge the vertex was reached through, `None` for the root.
    pub edge: Option<PeriodicEdge>,
    /// Cell of this image: root offset plus the edge offsets along the BFS tree path.
    pub offset: Vector3<i32>,
}

impl Visit {
    pub fn atom_index(&self) -> GenericAtomIndex {
        GenericAtomIndex::from_offset(self.vertex, self.offset)
    }
}

pub fn covalent_only(edge: &PeriodicEdge) -> bool {
    edge.kind.is_covalent()
}

/// Breadth-first walk from `root` in cell `root_offset`.
///
/// Each unit-cell vertex is visited at most once per call, whatever offset
/// it is reached with; the visited set lives only for the duration of the
/// call. `visit` sees the root first, then vertices in FIFO order.
///
/// When the followed edges close a cycle with a non-zero total offset (a
/// polymer bonded to its own image) each vertex still appears once, at the
/// offset of the first path that reached it.
pub fn breadth_first<F, V>(graph: &PeriodicBondGraph, root: usize, root_offset: Vector3<i32>, mut follow: F, mut visit: V)
where
    F: FnMut(&PeriodicEdge) -> bool,
    V: FnMut(&Visit),
{
    let n = graph.vertex_count();
    if root >= n {
        log::warn!("Traversal root {} is not a unit-cell atom ({} atoms)", root, n);
        return;
    }

    let mut visited = vec![false; n];
    let mut queue: VecDeque<Visit> = VecDeque::new();
    visited[root] = true;
    queue.push_back(Visit {
        vertex: root,
        predecessor: None,
        edge: None,
        offset: root_offset,
    });

    while let Some(current) = queue.pop_front() {
        visit(&current);
        for (target, edge) in graph.edges(current.vertex) {
            if visited[target] || !follow(edge) {
                continue;
            }
            visited[target] = true;
            queue.push_back(Visit {
                vertex: target,
                predecessor: Some(current.vertex),
                edge: Some(edge.clone()),
                offset: current.offset + edge.offset,
            });
        }
    }
}

/// Every atom image reachable from `root` through followed edges, sorted.
pub fn connected_images<F>(graph: &PeriodicBondGraph, root: usize, root_offset: Vector3<i32>, follow: F) -> Vec<GenericAtomIndex>
where
    F: FnMut(&PeriodicEdge) -> bool,
{
    let mut images = Vec::new();
    breadth_first(graph, root, root_offset, follow, |v| images.push(v.atom_index()));
    images.sort();
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::bonds::BondKind;

    fn chain() -> PeriodicBondGraph {
        // 0 - 1 - 2, with 2 bonded to 0 of the next cell along x
        let mut g = PeriodicBondGraph::new(4);
        g.add_bond(0, 1, Vector3::zeros(), BondKind::Covalent, 1.5);
        g.add_bond(1, 2, Vector3::zeros(), BondKind::Covalent, 1.5);
        g.add_bond(2, 3, Vector3::new(0, 1, 0), BondKind::HydrogenBond, 2.0);
        g
    }

    #[test]
    fn test_offsets_accumulate() {
        let mut g = PeriodicBondGraph::new(3);
        g.add_bond(0, 1, Vector3::new(1, 0, 0), BondKind::Covalent, 1.5);
        g.add_bond(1, 2, Vector3::new(0, 0, -1), BondKind::Covalent, 1.5);

        let images = connected_images(&g, 0, Vector3::new(0, 2, 0), covalent_only);
        assert_eq!(
            images,
            vec![
                GenericAtomIndex::new(0, 0, 2, 0),
                GenericAtomIndex::new(1, 1, 2, 0),
                GenericAtomIndex::new(2, 1, 2, -1),
            ]
        );
    }

    #[test]
    fn test_root_visited_first_and_once() {
        let g = chain();
        let mut visits = Vec::new();
        breadth_first(&g, 1, Vector3::zeros(), covalent_only, |v| visits.push(v.clone()));
        assert_eq!(visits.len(), 3);
        assert_eq!(visits[0].vertex, 1);
        assert!(visits[0].predecessor.is_none());
        assert!(visits[0].edge.is_none());
        assert!(visits[1..].iter().all(|v| v.predecessor == Some(1)));
    }

    #[test]
    fn test_rejecting_predicate_visits_root_only() {
        let g = chain();
        let images = connected_images(&g, 2, Vector3::new(3, 0, 0), |_| false);
        assert_eq!(images, vec![GenericAtomIndex::new(2, 3, 0, 0)]);
    }

    #[test]
    fn test_predicate_selects_kinds() {
        let g = chain();
        let all = connected_images(&g, 0, Vector3::zeros(), |_| true);
        assert_eq!(all.len(), 4);
        assert!(all.contains(&GenericAtomIndex::new(3, 0, 1, 0)));
        assert_eq!(connected_images(&g, 0, Vector3::zeros(), covalent_only).len(), 3);
    }

    #[test]
    fn test_invalid_root_visits_nothing() {
        let g = chain();
        assert!(connected_images(&g, 10, Vector3::zeros(), |_| true).is_empty());
    }

    #[test]
    fn test_self_bonded_chain_keeps_first_offset() {
        // Polymer: 0 - 1 and 1 - 0' where 0' is atom 0 one cell along x.
        // The cycle has total offset (1,0,0); each vertex still appears once.
        let mut g = PeriodicBondGraph::new(2);
        g.add_bond(0, 1, Vector3::zeros(), BondKind::Covalent, 1.5);
        g.add_bond(1, 0, Vector3::new(1, 0, 0), BondKind::Covalent, 1.5);

        let from_zero = connected_images(&g, 0, Vector3::zeros(), covalent_only);
        assert_eq!(from_zero.len(), 2);
        assert_eq!(from_zero[0], GenericAtomIndex::new(0, 0, 0, 0));

        // Atom 1 is reached from atom 0 through one of two paths whose offsets differ
        let one = from_zero[1];
        assert_eq!(one.unique, 1);
        assert!(one.offset() == Vector3::zeros() || one.offset() == Vector3::new(-1, 0, 0));

        // A single-atom polymer collapses onto the root image
        let mut single = PeriodicBondGraph::new(1);
        single.add_bond(0, 0, Vector3::new(1, 0, 0), BondKind::Covalent, 1.5);
        assert_eq!(
            connected_images(&single, 0, Vector3::zeros(), covalent_only),
            vec![GenericAtomIndex::new(0, 0, 0, 0)]
        );
    }
}
