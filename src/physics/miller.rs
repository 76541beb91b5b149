// src/physics/miller.rs

use crate::config::PlaneSettings;
use crate::model::unit_cell::UnitCell;
use crate::utils::linalg::gcd;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MillerIndex {
    pub h: i32,
    pub k: i32,
    pub l: i32,
}

impl MillerIndex {
    pub const fn new(h: i32, k: i32, l: i32) -> Self {
        Self { h, k, l }
    }

    pub fn is_zero(&self) -> bool {
        self.h == 0 && self.k == 0 && self.l == 0
    }

    pub fn as_vector(&self) -> Vector3<i32> {
        Vector3::new(self.h, self.k, self.l)
    }

    /// Divide out the common factor: (2,2,0) -> (1,1,0).
    pub fn reduced(&self) -> Self {
        let g = gcd(gcd(self.h, self.k), self.l);
        if g == 0 {
            return *self;
        }
        Self::new(self.h / g, self.k / g, self.l / g)
    }

    pub fn dot(&self, v: &Vector3<i32>) -> i32 {
        self.h * v.x + self.k * v.y + self.l * v.z
    }
}

impl fmt::Display for MillerIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} {} {})", self.h, self.k, self.l)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaneError {
    ZeroIndices,
    /// No two non-collinear in-plane lattice vectors were found.
    DegenerateBasis(MillerIndex),
    /// No lattice vector with `h·u + k·v + l·w = 1` inside the search limit.
    NoStackingVector(MillerIndex),
}

impl fmt::Display for PlaneError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlaneError::ZeroIndices => write!(f, "Miller indices cannot be (0 0 0)"),
            PlaneError::DegenerateBasis(m) => write!(f, "Could not define an in-plane basis for {}", m),
            PlaneError::NoStackingVector(m) => write!(f, "Could not find a stacking vector for {}", m),
        }
    }
}

impl std::error::Error for PlaneError {}

/// A lattice plane (h k l) with its spacing, orientation and in-plane lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalPlane {
    pub miller: MillerIndex,
    /// Position of the plane along the normal, in units of `d_spacing`.
    pub offset: f64,
    /// Interplanar spacing d = 1 / |R·(h,k,l)|.
    pub d_spacing: f64,
    /// Unit normal, parallel to the reciprocal vector h a* + k b* + l c*.
    pub normal: Vector3<f64>,
    /// Cartesian point of the plane closest to the cell origin.
    pub origin: Vector3<f64>,
    /// In-plane lattice vectors in units of a, b, c with `a × b` along `normal`.
    pub lattice_a: Vector3<i32>,
    pub lattice_b: Vector3<i32>,
    /// Cartesian in-plane basis.
    pub a: Vector3<f64>,
    pub b: Vector3<f64>,
}

impl CrystalPlane {
    pub fn new(lattice: &UnitCell, miller: MillerIndex, offset: f64) -> Result<Self, PlaneError> {
        Self::with_settings(lattice, miller, offset, &PlaneSettings::default())
    }

    pub fn with_settings(
        lattice: &UnitCell,
        miller: MillerIndex,
        offset: f64,
        settings: &PlaneSettings,
    ) -> Result<Self, PlaneError> {
        if miller.is_zero() {
            log::warn!("Plane requested with zero Miller indices");
            return Err(PlaneError::ZeroIndices);
        }

        let g = lattice.reciprocal() * miller.as_vector().map(|v| v as f64);
        let d_spacing = 1.0 / g.norm();
        let normal = g.normalize();

        let (lattice_a, lattice_b) = in_plane_basis(lattice, &miller, &normal, settings.min_candidate_length)
            .ok_or_else(|| {
                log::warn!("Degenerate in-plane basis for {}", miller);
                PlaneError::DegenerateBasis(miller)
            })?;

        Ok(Self {
            miller,
            offset,
            d_spacing,
            normal,
            origin: normal * (offset * d_spacing),
            lattice_a,
            lattice_b,
            a: lattice.translation(&lattice_a),
            b: lattice.translation(&lattice_b),
        })
    }

    /// Signed distance of a Cartesian point from the parallel plane through the cell origin.
    pub fn depth(&self, cart: &Vector3<f64>) -> f64 {
        self.normal.dot(cart)
    }

    /// Area of the in-plane cell (Å²).
    pub fn area(&self) -> f64 {
        self.a.cross(&self.b).norm()
    }

    /// Shortest lattice vector `w` with `h·u + k·v + l·w = 1` for the reduced indices.
    pub fn stacking_vector(&self, lattice: &UnitCell, limit: i32) -> Result<Vector3<i32>, PlaneError> {
        let m = self.miller.reduced();
        let mut best: Option<(f64, Vector3<i32>)> = None;
        for u in -limit..=limit {
            for v in -limit..=limit {
                for w in -limit..=limit {
                    let cand = Vector3::new(u, v, w);
                    if m.dot(&cand) != 1 {
                        continue;
                    }
                    let len = lattice.translation(&cand).norm();
                    if best.map_or(true, |(l, _)| len < l - 1e-9) {
                        best = Some((len, cand));
                    }
                }
            }
        }
        best.map(|(_, v)| v).ok_or(PlaneError::NoStackingVector(self.miller))
    }

    /// Polygon where this plane cuts the unit cell, in Cartesian coordinates,
    /// ordered around its centroid.
    ///
    /// The plane of the family cut is `h x + k y + l z = level` with `level`
    /// the offset reduced into (0, 1]; level 0 would only touch the origin corner.
    pub fn intersection_polygon(&self, lattice: &UnitCell) -> Vec<Vector3<f64>> {
        let (h, k, l) = (self.miller.h as f64, self.miller.k as f64, self.miller.l as f64);
        let mut level = self.offset.rem_euclid(1.0);
        if level < 1e-9 {
            level = 1.0;
        }

        let edges = [
            ([0., 0., 0.], [1., 0., 0.]),
            ([0., 0., 0.], [0., 1., 0.]),
            ([0., 0., 0.], [0., 0., 1.]),
            ([1., 0., 0.], [0., 1., 0.]),
            ([1., 0., 0.], [0., 0., 1.]),
            ([0., 1., 0.], [1., 0., 0.]),
            ([0., 1., 0.], [0., 0., 1.]),
            ([0., 0., 1.], [1., 0., 0.]),
            ([0., 0., 1.], [0., 1., 0.]),
            ([1., 1., 0.], [0., 0., 1.]),
            ([1., 0., 1.], [0., 1., 0.]),
            ([0., 1., 1.], [1., 0., 0.]),
        ];

        let mut points: Vec<Vector3<f64>> = Vec::new();
        for (start, dir) in edges.iter() {
            let start_val = h * start[0] + k * start[1] + l * start[2];
            let dir_val = h * dir[0] + k * dir[1] + l * dir[2];
            if dir_val.abs() > 1e-6 {
                let t = (level - start_val) / dir_val;
                if (-0.0001..=1.0001).contains(&t) {
                    let frac = Vector3::new(start[0] + t * dir[0], start[1] + t * dir[1], start[2] + t * dir[2]);
                    let cart = lattice.to_cartesian(&frac);
                    // Corners are hit from up to three edges
                    if points.iter().all(|p| (p - cart).norm() > 1e-5) {
                        points.push(cart);
                    }
                }
            }
        }
        if points.len() < 3 {
            return vec![];
        }

        let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
        let u = (points[0] - centroid).normalize();
        let v = self.normal.cross(&u);
        points.sort_by(|p, q| {
            let (dp, dq) = (p - centroid, q - centroid);
            dp.dot(&v).atan2(dp.dot(&u)).total_cmp(&dq.dot(&v).atan2(dq.dot(&u)))
        });
        points
    }
}

/// Two shortest non-collinear lattice vectors lying in the plane, oriented so
/// that `a × b` points along `normal`.
fn in_plane_basis(
    lattice: &UnitCell,
    miller: &MillerIndex,
    normal: &Vector3<f64>,
    min_length: f64,
) -> Option<(Vector3<i32>, Vector3<i32>)> {
    let (h, k, l) = (miller.h, miller.k, miller.l);

    let mut seeds: Vec<Vector3<i32>> = Vec::new();
    let mut push_reduced = |v: Vector3<i32>| {
        let g = gcd(gcd(v.x, v.y), v.z);
        if g != 0 {
            seeds.push(v / g);
        }
    };
    push_reduced(Vector3::new(k, -h, 0));
    push_reduced(Vector3::new(l, 0, -h));
    push_reduced(Vector3::new(0, l, -k));
    if h == 0 {
        push_reduced(Vector3::new(1, 0, 0));
    }
    if k == 0 {
        push_reduced(Vector3::new(0, 1, 0));
    }
    if l == 0 {
        push_reduced(Vector3::new(0, 0, 1));
    }

    let mut candidates = seeds.clone();
    for i in 0..seeds.len() {
        for j in (i + 1)..seeds.len() {
            candidates.push(seeds[i] + seeds[j]);
            candidates.push(seeds[i] - seeds[j]);
        }
    }

    let mut scored: Vec<(f64, Vector3<i32>)> = candidates
        .into_iter()
        .filter(|v| miller.dot(v) == 0)
        .map(|v| (lattice.translation(&v).norm(), v))
        .filter(|(len, _)| *len > min_length)
        .collect();
    scored.sort_by(|p, q| p.0.total_cmp(&q.0).then_with(|| [q.1.x, q.1.y, q.1.z].cmp(&[p.1.x, p.1.y, p.1.z])));

    let (len_a, a) = *scored.first()?;
    let cart_a = lattice.translation(&a);
    let (_, b) = scored.iter().skip(1).find(|(len_b, b)| {
        let cart_b = lattice.translation(b);
        cart_a.cross(&cart_b).norm() > 1e-6 * len_a * len_b
    })?;

    let b = if cart_a.cross(&lattice.translation(b)).dot(normal) < 0.0 {
        -b
    } else {
        *b
    };
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_100() {
        let cell = UnitCell::cubic(4.2).unwrap();
        let plane = CrystalPlane::new(&cell, MillerIndex::new(1, 0, 0), 0.0).unwrap();
        assert!((plane.d_spacing - 4.2).abs() < 1e-9);
        let a_star = cell.reciprocal().column(0).normalize();
        assert!((plane.normal - a_star).norm() < 1e-12);
        assert!((plane.area() - 4.2 * 4.2).abs() < 1e-9);
        assert!(plane.a.cross(&plane.b).dot(&plane.normal) > 0.0);
        assert_eq!(plane.miller.dot(&plane.lattice_a), 0);
        assert_eq!(plane.miller.dot(&plane.lattice_b), 0);
    }

    #[test]
    fn test_d_spacing_of_higher_order() {
        let cell = UnitCell::cubic(4.0).unwrap();
        let plane = CrystalPlane::new(&cell, MillerIndex::new(2, 0, 0), 0.5).unwrap();
        assert!((plane.d_spacing - 2.0).abs() < 1e-9);
        assert!((plane.origin - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-9);

        let p111 = CrystalPlane::new(&cell, MillerIndex::new(1, 1, 1), 0.0).unwrap();
        assert!((p111.d_spacing - 4.0 / 3f64.sqrt()).abs() < 1e-9);
        // Shortest in-plane vectors are face diagonals
        assert!((p111.a.norm() - 4.0 * 2f64.sqrt()).abs() < 1e-9);
        assert!((p111.b.norm() - 4.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_monoclinic_basis_in_plane() {
        let cell = UnitCell::from_parameters(5.0, 7.0, 9.0, 90.0, 104.0, 90.0).unwrap();
        let plane = CrystalPlane::new(&cell, MillerIndex::new(1, 0, 2), 0.0).unwrap();
        assert!(plane.a.dot(&plane.normal).abs() < 1e-9);
        assert!(plane.b.dot(&plane.normal).abs() < 1e-9);
        assert!(plane.a.norm() <= plane.b.norm() + 1e-9);
    }

    #[test]
    fn test_zero_indices_fail() {
        let cell = UnitCell::cubic(4.0).unwrap();
        assert_eq!(
            CrystalPlane::new(&cell, MillerIndex::new(0, 0, 0), 0.0),
            Err(PlaneError::ZeroIndices)
        );
    }

    #[test]
    fn test_stacking_vector() {
        let cell = UnitCell::cubic(4.0).unwrap();
        let plane = CrystalPlane::new(&cell, MillerIndex::new(1, 1, 0), 0.0).unwrap();
        let w = plane.stacking_vector(&cell, 10).unwrap();
        assert_eq!(plane.miller.dot(&w), 1);
        assert!((cell.translation(&w).norm() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersection_polygon() {
        let cell = UnitCell::cubic(1.0).unwrap();
        let plane = CrystalPlane::new(&cell, MillerIndex::new(1, 1, 1), 0.0).unwrap();
        let poly = plane.intersection_polygon(&cell);
        assert_eq!(poly.len(), 3);
        for p in &poly {
            assert!((p.x + p.y + p.z - 1.0).abs() < 1e-9);
        }

        let half = CrystalPlane::new(&cell, MillerIndex::new(1, 1, 1), 0.5).unwrap();
        let poly = half.intersection_polygon(&cell);
        assert_eq!(poly.len(), 3);
        assert!(poly.iter().all(|p| (p.x + p.y + p.z - 0.5).abs() < 1e-9));

        let square = CrystalPlane::new(&cell, MillerIndex::new(0, 0, 1), 0.25).unwrap();
        assert_eq!(square.intersection_polygon(&cell).len(), 4);
    }

    #[test]
    fn test_reduced() {
        assert_eq!(MillerIndex::new(2, -4, 6).reduced(), MillerIndex::new(1, -2, 3));
        assert_eq!(MillerIndex::new(0, 0, 0).reduced(), MillerIndex::new(0, 0, 0));
        assert_eq!(MillerIndex::new(1, 0, 0).to_string(), "(1 0 0)");
    }
}
