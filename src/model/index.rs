// src/model/index.rs
//! Compound keys addressing atoms, fragments and fragment pairs across periodic images.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One periodic image of one unit-cell atom.
///
/// Ordering is lexicographic over `(unique, x, y, z)`, which is also the field
/// declaration order, so the derived `Ord` is the one fragments sort by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenericAtomIndex {
    pub unique: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GenericAtomIndex {
    pub const fn new(unique: i32, x: i32, y: i32, z: i32) -> Self {
        Self { unique, x, y, z }
    }

    pub fn from_offset(unique: usize, offset: Vector3<i32>) -> Self {
        Self::new(unique as i32, offset.x, offset.y, offset.z)
    }

    pub fn offset(&self) -> Vector3<i32> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn translated(&self, shift: Vector3<i32>) -> Self {
        Self::new(self.unique, self.x + shift.x, self.y + shift.y, self.z + shift.z)
    }
}

impl fmt::Display for GenericAtomIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{} {} {}]", self.unique, self.x, self.y, self.z)
    }
}

/// One periodic image of one unit-cell fragment. `u == -1` means "no fragment".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentIndex {
    pub u: i32,
    pub h: i32,
    pub k: i32,
    pub l: i32,
}

impl FragmentIndex {
    pub const INVALID: FragmentIndex = FragmentIndex { u: -1, h: 0, k: 0, l: 0 };

    pub const fn new(u: i32, h: i32, k: i32, l: i32) -> Self {
        Self { u, h, k, l }
    }

    pub fn from_offset(u: usize, offset: Vector3<i32>) -> Self {
        Self::new(u as i32, offset.x, offset.y, offset.z)
    }

    pub fn is_valid(&self) -> bool {
        self.u >= 0
    }

    pub fn offset(&self) -> Vector3<i32> {
        Vector3::new(self.h, self.k, self.l)
    }

    pub fn translated(&self, shift: Vector3<i32>) -> Self {
        if !self.is_valid() {
            return *self;
        }
        Self::new(self.u, self.h + shift.x, self.k + shift.y, self.l + shift.z)
    }
}

impl Default for FragmentIndex {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for FragmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}[{} {} {}]", self.u, self.h, self.k, self.l)
        } else {
            write!(f, "INVALID")
        }
    }
}

/// Ordered pair of fragment images, the key of one pairwise interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimerIndex {
    pub a: FragmentIndex,
    pub b: FragmentIndex,
}

impl DimerIndex {
    pub const fn new(a: FragmentIndex, b: FragmentIndex) -> Self {
        Self { a, b }
    }

    pub fn is_valid(&self) -> bool {
        self.a.is_valid() && self.b.is_valid()
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.b, self.a)
    }

    /// Translate so that `a` sits in the origin cell.
    pub fn at_origin(&self) -> Self {
        let shift = -self.a.offset();
        Self::new(self.a.translated(shift), self.b.translated(shift))
    }
}

impl fmt::Display for DimerIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_index_ordering() {
        let mut v = vec![
            GenericAtomIndex::new(1, 0, 0, 0),
            GenericAtomIndex::new(0, 1, 0, 0),
            GenericAtomIndex::new(0, 0, 0, -1),
            GenericAtomIndex::new(0, 0, 0, 0),
        ];
        v.sort();
        assert_eq!(v[0], GenericAtomIndex::new(0, 0, 0, -1));
        assert_eq!(v[1], GenericAtomIndex::new(0, 0, 0, 0));
        assert_eq!(v[2], GenericAtomIndex::new(0, 1, 0, 0));
        assert_eq!(v[3], GenericAtomIndex::new(1, 0, 0, 0));
    }

    #[test]
    fn test_equality_needs_offset_and_atom() {
        let a = GenericAtomIndex::new(3, 1, 0, 0);
        assert_ne!(a, GenericAtomIndex::new(3, 0, 0, 0));
        assert_ne!(a, GenericAtomIndex::new(2, 1, 0, 0));
        assert_eq!(a, GenericAtomIndex::new(3, 0, 0, 0).translated(Vector3::new(1, 0, 0)));
    }

    #[test]
    fn test_invalid_fragment_index() {
        assert!(!FragmentIndex::INVALID.is_valid());
        assert!(!FragmentIndex::default().is_valid());
        assert_eq!(FragmentIndex::INVALID.translated(Vector3::new(1, 1, 1)), FragmentIndex::INVALID);
        assert_eq!(FragmentIndex::INVALID.to_string(), "INVALID");
    }

    #[test]
    fn test_dimer_at_origin() {
        let d = DimerIndex::new(FragmentIndex::new(0, 1, -1, 2), FragmentIndex::new(1, 2, 0, 2));
        let o = d.at_origin();
        assert_eq!(o.a, FragmentIndex::new(0, 0, 0, 0));
        assert_eq!(o.b, FragmentIndex::new(1, 1, 1, 0));
    }
}
