// src/model/unit_cell.rs

use crate::utils::linalg::{lattice_columns, lattice_rows};
use nalgebra::{Matrix3, Vector3};
use std::fmt;

const SINGULAR_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub enum CellError {
    SingularLattice,
    InvalidParameters(String),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CellError::SingularLattice => write!(f, "Lattice matrix is singular (zero volume)"),
            CellError::InvalidParameters(msg) => write!(f, "Invalid cell parameters: {}", msg),
        }
    }
}

impl std::error::Error for CellError {}

/// Direct and reciprocal lattice of a periodic cell.
///
/// Convention: the columns of `direct` are the lattice vectors a, b, c, so
/// `cart = direct * frac`. The columns of `reciprocal` are a*, b*, c* without
/// the 2π factor (`a · a* = 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    direct: Matrix3<f64>,
    inverse: Matrix3<f64>,
    reciprocal: Matrix3<f64>,
}

impl UnitCell {
    pub fn from_basis(direct: Matrix3<f64>) -> Result<Self, CellError> {
        if direct.determinant().abs() < SINGULAR_TOLERANCE {
            return Err(CellError::SingularLattice);
        }
        let inverse = direct.try_inverse().ok_or(CellError::SingularLattice)?;
        Ok(Self {
            direct,
            inverse,
            reciprocal: inverse.transpose(),
        })
    }

    /// Lattice vectors given as rows, the layout `Structure` files use.
    pub fn from_lattice_rows(lattice: [[f64; 3]; 3]) -> Result<Self, CellError> {
        Self::from_basis(lattice_columns(lattice))
    }

    /// Standard setting: a along x, b in the xy plane. Angles in degrees.
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self, CellError> {
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return Err(CellError::InvalidParameters(format!(
                "lengths must be positive, got {} {} {}",
                a, b, c
            )));
        }
        let (alpha_r, beta_r, gamma_r) = (alpha.to_radians(), beta.to_radians(), gamma.to_radians());
        let v2 = 1.0 - alpha_r.cos().powi(2) - beta_r.cos().powi(2) - gamma_r.cos().powi(2)
            + 2.0 * alpha_r.cos() * beta_r.cos() * gamma_r.cos();
        if v2 <= 0.0 || gamma_r.sin().abs() < SINGULAR_TOLERANCE {
            return Err(CellError::InvalidParameters(format!(
                "angles {} {} {} do not describe a cell",
                alpha, beta, gamma
            )));
        }
        let v = v2.sqrt();

        let lattice = [
            [a, 0.0, 0.0],
            [b * gamma_r.cos(), b * gamma_r.sin(), 0.0],
            [
                c * beta_r.cos(),
                c * (alpha_r.cos() - beta_r.cos() * gamma_r.cos()) / gamma_r.sin(),
                c * v / gamma_r.sin(),
            ],
        ];
        Self::from_lattice_rows(lattice)
    }

    pub fn cubic(a: f64) -> Result<Self, CellError> {
        Self::from_parameters(a, a, a, 90.0, 90.0, 90.0)
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, CellError> {
        Self::from_parameters(a, b, c, 90.0, 90.0, 90.0)
    }

    pub fn direct(&self) -> &Matrix3<f64> {
        &self.direct
    }

    pub fn reciprocal(&self) -> &Matrix3<f64> {
        &self.reciprocal
    }

    pub fn lattice_rows(&self) -> [[f64; 3]; 3] {
        lattice_rows(&self.direct)
    }

    pub fn a(&self) -> Vector3<f64> {
        self.direct.column(0).into_owned()
    }

    pub fn b(&self) -> Vector3<f64> {
        self.direct.column(1).into_owned()
    }

    pub fn c(&self) -> Vector3<f64> {
        self.direct.column(2).into_owned()
    }

    pub fn volume(&self) -> f64 {
        self.direct.determinant().abs()
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.direct * frac
    }

    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cart
    }

    /// Translation vector (in Å) of an integer cell offset.
    pub fn translation(&self, offset: &Vector3<i32>) -> Vector3<f64> {
        self.direct * offset.map(|v| v as f64)
    }

    /// Cartesian form of a fractional (integer) rotation: L R L⁻¹.
    pub fn cartesian_rotation(&self, rotation: &Matrix3<i32>) -> Matrix3<f64> {
        self.direct * rotation.map(|v| v as f64) * self.inverse
    }

    /// Perpendicular distance between opposite faces along each axis (d100, d010, d001).
    pub fn face_widths(&self) -> Vector3<f64> {
        Vector3::new(
            1.0 / self.reciprocal.column(0).norm(),
            1.0 / self.reciprocal.column(1).norm(),
            1.0 / self.reciprocal.column(2).norm(),
        )
    }

    /// Number of cells along each axis needed to cover `radius` Å from any point in a cell.
    pub fn cells_within(&self, radius: f64) -> Vector3<i32> {
        self.face_widths().map(|w| (radius / w).ceil() as i32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_reciprocal() {
        let cell = UnitCell::cubic(4.0).unwrap();
        let r = cell.reciprocal();
        assert!((r[(0, 0)] - 0.25).abs() < 1e-12);
        assert!(r[(1, 0)].abs() < 1e-12);
        assert!((cell.volume() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_frac_cart_roundtrip() {
        let cell = UnitCell::from_parameters(5.1, 6.3, 7.2, 85.0, 101.0, 113.0).unwrap();
        let f = Vector3::new(0.13, 0.77, -0.4);
        let back = cell.to_fractional(&cell.to_cartesian(&f));
        assert!((back - f).norm() < 1e-12);
    }

    #[test]
    fn test_reciprocal_duality() {
        let cell = UnitCell::from_parameters(5.1, 6.3, 7.2, 85.0, 101.0, 113.0).unwrap();
        let product = cell.direct().transpose() * cell.reciprocal();
        assert!((product - Matrix3::identity()).norm() < 1e-12);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(UnitCell::from_parameters(-1.0, 1.0, 1.0, 90.0, 90.0, 90.0).is_err());
        assert!(UnitCell::from_parameters(1.0, 1.0, 1.0, 120.0, 120.0, 120.0).is_err());
        assert_eq!(
            UnitCell::from_lattice_rows([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
            Err(CellError::SingularLattice)
        );
    }

    #[test]
    fn test_face_widths_hexagonal() {
        let cell = UnitCell::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0).unwrap();
        let w = cell.face_widths();
        assert!((w.x - 3.0 * (60.0f64).to_radians().sin()).abs() < 1e-9);
        assert!((w.z - 5.0).abs() < 1e-9);
    }
}
