// src/model/fragment.rs

use crate::model::elements::get_symbol;
use crate::model::index::{FragmentIndex, GenericAtomIndex};
use nalgebra::{Matrix3, Vector3};
use std::collections::BTreeMap;

/// Rigid (possibly improper) transform in Cartesian space: `x' = R x + t`.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Space-group operation the transform was derived from (0 = identity).
    pub symop: usize,
}

impl Default for FragmentTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl FragmentTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            symop: 0,
        }
    }

    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Same transform followed by a pure translation.
    pub fn then_translate(&self, shift: &Vector3<f64>) -> Self {
        Self {
            rotation: self.rotation,
            translation: self.translation + shift,
            symop: self.symop,
        }
    }

    pub fn is_identity(&self) -> bool {
        (self.rotation - Matrix3::identity()).norm() < 1e-9 && self.translation.norm() < 1e-9
    }
}

/// A connected set of atom images.
///
/// `atom_indices` is always sorted and duplicate free; `atomic_numbers` and
/// `positions` are parallel to it and are derived from the owning cell.
#[derive(Clone, Debug, Default)]
pub struct Fragment {
    pub atom_indices: Vec<GenericAtomIndex>,
    pub atomic_numbers: Vec<u32>,
    /// Cartesian positions (Å).
    pub positions: Vec<Vector3<f64>>,
    pub index: FragmentIndex,
    pub asymmetric_fragment_index: FragmentIndex,
    pub asymmetric_fragment_transform: FragmentTransform,
}

impl Fragment {
    pub fn size(&self) -> usize {
        self.atom_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_indices.is_empty()
    }

    pub fn contains(&self, idx: &GenericAtomIndex) -> bool {
        self.atom_indices.binary_search(idx).is_ok()
    }

    pub fn centroid(&self) -> Vector3<f64> {
        if self.positions.is_empty() {
            return Vector3::zeros();
        }
        self.positions.iter().sum::<Vector3<f64>>() / self.positions.len() as f64
    }

    /// Largest distance of any atom from the centroid.
    pub fn radius(&self) -> f64 {
        let c = self.centroid();
        self.positions.iter().map(|p| (p - c).norm()).fold(0.0, f64::max)
    }

    /// Nearest atom–atom distance to another fragment: (distance, atom in self, atom in other).
    pub fn nearest_atom(&self, other: &Fragment) -> Option<(f64, usize, usize)> {
        let mut best: Option<(f64, usize, usize)> = None;
        for (i, p) in self.positions.iter().enumerate() {
            for (j, q) in other.positions.iter().enumerate() {
                let d = (p - q).norm();
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, i, j));
                }
            }
        }
        best
    }

    pub fn nearest_distance(&self, other: &Fragment) -> f64 {
        self.nearest_atom(other).map(|(d, _, _)| d).unwrap_or(f64::INFINITY)
    }

    /// Sorted atomic numbers, the multiset two symmetry-equivalent fragments share.
    pub fn composition(&self) -> Vec<u32> {
        let mut z = self.atomic_numbers.clone();
        z.sort_unstable();
        z
    }

    /// Chemical formula in Hill order (C, H, then alphabetical).
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for z in &self.atomic_numbers {
            *counts.entry(get_symbol(*z)).or_insert(0) += 1;
        }

        let mut parts: Vec<(&str, usize)> = Vec::new();
        if let Some(c) = counts.remove("C") {
            parts.push(("C", c));
            if let Some(h) = counts.remove("H") {
                parts.push(("H", h));
            }
        }
        parts.extend(counts);

        parts
            .into_iter()
            .map(|(el, count)| if count > 1 { format!("{}{}", el, count) } else { el.to_string() })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Fragment {
        Fragment {
            atom_indices: vec![
                GenericAtomIndex::new(0, 0, 0, 0),
                GenericAtomIndex::new(1, 0, 0, 0),
                GenericAtomIndex::new(2, 0, 0, 0),
            ],
            atomic_numbers: vec![8, 1, 1],
            positions: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.96, 0.0, 0.0),
                Vector3::new(-0.24, 0.93, 0.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_formula_hill_order() {
        let mut f = water();
        assert_eq!(f.formula(), "H2O");
        f.atomic_numbers = vec![6, 1, 1, 1, 1, 17];
        assert_eq!(f.formula(), "CH4Cl");
    }

    #[test]
    fn test_nearest_atom() {
        let a = water();
        let mut b = water();
        for p in b.positions.iter_mut() {
            *p += Vector3::new(3.0, 0.0, 0.0);
        }
        let (d, i, j) = a.nearest_atom(&b).unwrap();
        assert!((d - 2.04).abs() < 1e-9);
        assert_eq!((i, j), (1, 0));
        assert!(Fragment::default().nearest_distance(&a).is_infinite());
    }

    #[test]
    fn test_transform_translate() {
        let t = FragmentTransform::identity().then_translate(&Vector3::new(1.0, 2.0, 3.0));
        assert!(!t.is_identity());
        assert_eq!(t.apply(&Vector3::zeros()), Vector3::new(1.0, 2.0, 3.0));
        assert!(water().contains(&GenericAtomIndex::new(2, 0, 0, 0)));
    }
}
