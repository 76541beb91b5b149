// src/utils/linalg.rs

use nalgebra::{Matrix3, Vector3};

/// Build the column-basis matrix from row-major lattice vectors
///
/// # Arguments
/// * `lattice` - Lattice vectors as rows [[ax, ay, az], [bx, by, bz], [cx, cy, cz]]
///
/// # Returns
/// Matrix whose columns are a, b and c, so that
/// ```text
/// Cartesian = Basis × Fractional
/// ```
pub fn lattice_columns(lattice: [[f64; 3]; 3]) -> Matrix3<f64> {
  Matrix3::from_columns(&[
    Vector3::from(lattice[0]),
    Vector3::from(lattice[1]),
    Vector3::from(lattice[2]),
  ])
}

/// Inverse of [`lattice_columns`]: columns back to row-major arrays.
pub fn lattice_rows(basis: &Matrix3<f64>) -> [[f64; 3]; 3] {
  let mut rows = [[0.0; 3]; 3];
  for (i, row) in rows.iter_mut().enumerate() {
    let col = basis.column(i);
    *row = [col[0], col[1], col[2]];
  }
  rows
}

/// Wrap a fractional coordinate into [0, 1)
///
/// Values within `tol` of 1.0 snap to 0.0 so that sites sitting on a cell face
/// are not duplicated on the opposite face.
pub fn wrap_coordinate(x: f64, tol: f64) -> f64 {
  let mut w = x.rem_euclid(1.0);
  if w >= 1.0 - tol || w.abs() < tol {
    w = 0.0;
  }
  w
}

/// Wrap every component of a fractional vector, see [`wrap_coordinate`].
pub fn wrap_fractional(v: &Vector3<f64>, tol: f64) -> Vector3<f64> {
  Vector3::new(
    wrap_coordinate(v.x, tol),
    wrap_coordinate(v.y, tol),
    wrap_coordinate(v.z, tol),
  )
}

/// Fractional difference reduced to the nearest periodic image, per component in [-0.5, 0.5].
pub fn minimum_image(df: &Vector3<f64>) -> Vector3<f64> {
  Vector3::new(df.x - df.x.round(), df.y - df.y.round(), df.z - df.z.round())
}

/// Greatest common divisor, always non-negative. `gcd(0, 0) == 0`.
pub fn gcd(a: i32, b: i32) -> i32 {
  let (mut a, mut b) = (a.abs(), b.abs());
  while b != 0 {
    let t = a % b;
    a = b;
    b = t;
  }
  a
}

/// Round a fractional vector to the integer lattice translation it represents.
pub fn round_to_lattice(v: &Vector3<f64>) -> Vector3<i32> {
  Vector3::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cubic_lattice() {
    let basis = lattice_columns([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]]);
    let cart = basis * Vector3::new(0.5, 0.5, 0.5);

    assert!((cart[0] - 2.5).abs() < 1e-10);
    assert!((cart[1] - 2.5).abs() < 1e-10);
    assert!((cart[2] - 2.5).abs() < 1e-10);
  }

  #[test]
  fn test_rows_roundtrip() {
    // Non-orthogonal lattice
    let rows = [[4.0, 0.0, 0.0], [2.0, 3.46, 0.0], [0.0, 0.0, 5.0]];
    let back = lattice_rows(&lattice_columns(rows));
    assert_eq!(rows, back);
  }

  #[test]
  fn test_wrap() {
    assert!((wrap_coordinate(1.25, 1e-6) - 0.25).abs() < 1e-12);
    assert!((wrap_coordinate(-0.25, 1e-6) - 0.75).abs() < 1e-12);
    assert_eq!(wrap_coordinate(0.9999999, 1e-5), 0.0);
  }

  #[test]
  fn test_gcd() {
    assert_eq!(gcd(12, -18), 6);
    assert_eq!(gcd(0, 5), 5);
    assert_eq!(gcd(0, 0), 0);
  }

  #[test]
  fn test_minimum_image() {
    let d = minimum_image(&Vector3::new(0.9, -0.6, 0.2));
    assert!((d.x + 0.1).abs() < 1e-12);
    assert!((d.y - 0.4).abs() < 1e-12);
    assert!((d.z - 0.2).abs() < 1e-12);
  }
}
