// src/model/symmetry.rs

use crate::model::unit_cell::UnitCell;
use moyo::base::{AngleTolerance, Cell, Lattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::{Matrix3, Vector3};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SymmetryError {
    /// A Jones-faithful string such as "x,y+1/2,-z" could not be read.
    Parse(String),
    /// The operation list does not contain the identity.
    MissingIdentity,
    /// moyo could not determine the space group.
    Detection(String),
}

impl fmt::Display for SymmetryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymmetryError::Parse(s) => write!(f, "Cannot parse symmetry operation '{}'", s),
            SymmetryError::MissingIdentity => write!(f, "Symmetry operations must include x,y,z"),
            SymmetryError::Detection(msg) => write!(f, "Symmetry search failed: {}", msg),
        }
    }
}

impl std::error::Error for SymmetryError {}

/// A space-group operation in fractional coordinates: `x' = R x + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperation {
    pub rotation: Matrix3<i32>,
    pub translation: Vector3<f64>,
}

impl SymmetryOperation {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: Matrix3<i32>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    /// Parse a Jones-faithful representation, e.g. `"-x+1/2, y, -z+1/2"`.
    pub fn from_string(op: &str) -> Result<Self, SymmetryError> {
        let parts: Vec<&str> = op.split(',').collect();
        if parts.len() != 3 {
            return Err(SymmetryError::Parse(op.to_string()));
        }

        let mut rotation = Matrix3::zeros();
        let mut translation = Vector3::zeros();
        for (row, expr) in parts.iter().enumerate() {
            let (coefficients, constant) =
                parse_expression(expr).ok_or_else(|| SymmetryError::Parse(op.to_string()))?;
            for col in 0..3 {
                rotation[(row, col)] = coefficients[col];
            }
            translation[row] = constant;
        }
        Ok(Self { rotation, translation })
    }

    pub fn apply(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.map(|v| v as f64) * frac + self.translation
    }

    /// Rotation part only, on an integer lattice vector.
    pub fn rotate_offset(&self, offset: &Vector3<i32>) -> Vector3<i32> {
        self.rotation * offset
    }

    pub fn determinant(&self) -> i32 {
        let r = &self.rotation;
        r[(0, 0)] * (r[(1, 1)] * r[(2, 2)] - r[(1, 2)] * r[(2, 1)])
            - r[(0, 1)] * (r[(1, 0)] * r[(2, 2)] - r[(1, 2)] * r[(2, 0)])
            + r[(0, 2)] * (r[(1, 0)] * r[(2, 1)] - r[(1, 1)] * r[(2, 0)])
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == Matrix3::identity() && self.translation.iter().all(|t| t.abs() < 1e-8)
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &SymmetryOperation) -> SymmetryOperation {
        SymmetryOperation {
            rotation: self.rotation * other.rotation,
            translation: self.rotation.map(|v| v as f64) * other.translation + self.translation,
        }
    }
}

impl fmt::Display for SymmetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let axes = ['x', 'y', 'z'];
        let mut rows = Vec::with_capacity(3);
        for row in 0..3 {
            let mut s = String::new();
            for (col, axis) in axes.iter().enumerate() {
                match self.rotation[(row, col)] {
                    0 => {}
                    1 => {
                        if !s.is_empty() {
                            s.push('+');
                        }
                        s.push(*axis);
                    }
                    -1 => {
                        s.push('-');
                        s.push(*axis);
                    }
                    n => s.push_str(&format!("{:+}{}", n, axis)),
                }
            }
            let t = self.translation[row];
            if t.abs() > 1e-8 {
                s.push_str(&format_fraction(t));
            }
            rows.push(s);
        }
        write!(f, "{}", rows.join(","))
    }
}

fn format_fraction(t: f64) -> String {
    for den in [2, 3, 4, 6, 8, 12] {
        let num = t * den as f64;
        if (num - num.round()).abs() < 1e-6 {
            return format!("{:+}/{}", num.round() as i32, den);
        }
    }
    format!("{:+.6}", t)
}

// Split by + or - but keep the delimiter, then read each term
fn parse_expression(expr: &str) -> Option<([i32; 3], f64)> {
    let s = expr.replace(' ', "").to_lowercase();
    if s.is_empty() {
        return None;
    }

    let mut coefficients = [0; 3];
    let mut constant = 0.0;
    let mut current_term = String::new();

    let mut read_term = |term: &str| -> Option<()> {
        let (sign, body) = match term.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, term.strip_prefix('+').unwrap_or(term)),
        };
        if let Some(axis) = ['x', 'y', 'z'].iter().position(|c| body.ends_with(*c)) {
            let factor = &body[..body.len() - 1];
            let factor: i32 = if factor.is_empty() { 1 } else { factor.trim_end_matches('*').parse().ok()? };
            coefficients[axis] += sign * factor;
        } else if let Some(idx) = body.find('/') {
            let num: f64 = body[..idx].parse().ok()?;
            let den: f64 = body[idx + 1..].parse().ok()?;
            if den == 0.0 {
                return None;
            }
            constant += sign as f64 * num / den;
        } else {
            constant += sign as f64 * body.parse::<f64>().ok()?;
        }
        Some(())
    };

    for c in s.chars() {
        if (c == '+' || c == '-') && !current_term.is_empty() {
            read_term(&current_term)?;
            current_term.clear();
        }
        current_term.push(c);
    }
    if !current_term.is_empty() {
        read_term(&current_term)?;
    }
    Some((coefficients, constant))
}

/// Space group as an ordered operation table. The identity is always operation 0.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGroup {
    pub number: i32,
    operations: Vec<SymmetryOperation>,
}

impl SpaceGroup {
    pub fn p1() -> Self {
        Self {
            number: 1,
            operations: vec![SymmetryOperation::identity()],
        }
    }

    pub fn from_operations(number: i32, operations: Vec<SymmetryOperation>) -> Result<Self, SymmetryError> {
        let Some(pos) = operations.iter().position(|op| op.is_identity()) else {
            return Err(SymmetryError::MissingIdentity);
        };
        let mut operations = operations;
        if pos != 0 {
            let identity = operations.remove(pos);
            operations.insert(0, identity);
        }
        Ok(Self { number, operations })
    }

    pub fn from_strings(number: i32, ops: &[&str]) -> Result<Self, SymmetryError> {
        let operations = ops
            .iter()
            .map(|s| SymmetryOperation::from_string(s))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_operations(number, operations)
    }

    /// Determine the space group of a P1 cell with moyo.
    ///
    /// `positions` are fractional, `numbers` atomic numbers. The returned
    /// operations act on the fractional coordinates of the cell as given.
    pub fn detect(
        cell: &UnitCell,
        positions: &[Vector3<f64>],
        numbers: &[u32],
        symprec: f64,
    ) -> Result<Self, SymmetryError> {
        // Moyo takes row-wise lattice vectors
        let lattice = Lattice::new(cell.direct().transpose());
        let numbers: Vec<i32> = numbers.iter().map(|z| (*z).max(1) as i32).collect();
        let moyo_cell = Cell::new(lattice, positions.to_vec(), numbers);

        let dataset = MoyoDataset::new(&moyo_cell, symprec, AngleTolerance::Default, Setting::Spglib, true)
            .map_err(|e| SymmetryError::Detection(format!("{:?}", e)))?;

        let operations = dataset
            .operations
            .iter()
            .map(|op| SymmetryOperation::new(op.rotation, op.translation))
            .collect();
        log::debug!(
            "moyo: space group {} with {} operations",
            dataset.number,
            dataset.operations.len()
        );
        Self::from_operations(dataset.number, operations)
    }

    pub fn operations(&self) -> &[SymmetryOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn crystal_system(&self) -> &'static str {
        match self.number {
            1..=2 => "Triclinic",
            3..=15 => "Monoclinic",
            16..=74 => "Orthorhombic",
            75..=142 => "Tetragonal",
            143..=167 => "Trigonal",
            168..=194 => "Hexagonal",
            195..=230 => "Cubic",
            _ => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        let op = SymmetryOperation::from_string("x,y,z").unwrap();
        assert!(op.is_identity());
        assert_eq!(op.determinant(), 1);
    }

    #[test]
    fn test_parse_screw_axis() {
        let op = SymmetryOperation::from_string("-x, y+1/2, -z+1/2").unwrap();
        assert_eq!(op.rotation, Matrix3::new(-1, 0, 0, 0, 1, 0, 0, 0, -1));
        assert!((op.translation - Vector3::new(0.0, 0.5, 0.5)).norm() < 1e-12);
        let p = op.apply(&Vector3::new(0.1, 0.2, 0.3));
        assert!((p - Vector3::new(-0.1, 0.7, 0.2)).norm() < 1e-12);
    }

    #[test]
    fn test_parse_hexagonal_terms() {
        let op = SymmetryOperation::from_string("x-y,x,z+1/6").unwrap();
        assert_eq!(op.rotation, Matrix3::new(1, -1, 0, 1, 0, 0, 0, 0, 1));
        assert!((op.translation.z - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_errors() {
        assert!(SymmetryOperation::from_string("x,y").is_err());
        assert!(SymmetryOperation::from_string("x,y,q").is_err());
        assert!(SymmetryOperation::from_string("x,y,1/0").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["-x,y+1/2,-z+1/2", "x-y,x,z+1/6", "-x,-y,-z"] {
            let op = SymmetryOperation::from_string(s).unwrap();
            let again = SymmetryOperation::from_string(&op.to_string()).unwrap();
            assert_eq!(op.rotation, again.rotation);
            assert!((op.translation - again.translation).norm() < 1e-9);
        }
    }

    #[test]
    fn test_identity_moved_first() {
        let sg = SpaceGroup::from_strings(2, &["-x,-y,-z", "x,y,z"]).unwrap();
        assert!(sg.operations()[0].is_identity());
        assert_eq!(sg.operations()[1].determinant(), -1);
        assert_eq!(sg.crystal_system(), "Triclinic");
        assert_eq!(SpaceGroup::from_strings(2, &["-x,-y,-z"]), Err(SymmetryError::MissingIdentity));
    }

    #[test]
    fn test_compose() {
        let a = SymmetryOperation::from_string("-x,y+1/2,-z").unwrap();
        let twice = a.compose(&a);
        assert_eq!(twice.rotation, Matrix3::identity());
        assert!((twice.translation - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_detect_rock_salt() {
        let cell = UnitCell::cubic(5.64).unwrap();
        let mut positions = Vec::new();
        let mut numbers = Vec::new();
        let fcc = [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]];
        for p in fcc {
            positions.push(Vector3::new(p[0], p[1], p[2]));
            numbers.push(11);
            positions.push(Vector3::new(p[0] + 0.5, p[1], p[2]).map(|v| v % 1.0));
            numbers.push(17);
        }
        let sg = SpaceGroup::detect(&cell, &positions, &numbers, 1e-4).unwrap();
        assert_eq!(sg.number, 225);
        assert_eq!(sg.crystal_system(), "Cubic");
        assert!(sg.operations()[0].is_identity());
    }
}
