// src/model/elements.rs

/// Per-element data used for bonding: (symbol, covalent radius, van der Waals radius)
/// Covalent radii follow Cordero et al. (2008), vdW radii Bondi (1964) with
/// Alvarez (2013) values where Bondi gives none. Index = atomic number - 1.
const ELEMENT_TABLE: [(&str, f64, f64); 56] = [
    // --- Period 1 ---
    ("H", 0.31, 1.20), ("He", 0.28, 1.40),
    // --- Period 2 ---
    ("Li", 1.28, 1.82), ("Be", 0.96, 1.53), ("B", 0.84, 1.92), ("C", 0.76, 1.70),
    ("N", 0.71, 1.55), ("O", 0.66, 1.52), ("F", 0.57, 1.47), ("Ne", 0.58, 1.54),
    // --- Period 3 ---
    ("Na", 1.66, 2.27), ("Mg", 1.41, 1.73), ("Al", 1.21, 1.84), ("Si", 1.11, 2.10),
    ("P", 1.07, 1.80), ("S", 1.05, 1.80), ("Cl", 1.02, 1.75), ("Ar", 1.06, 1.88),
    // --- Period 4 ---
    ("K", 2.03, 2.75), ("Ca", 1.76, 2.31), ("Sc", 1.70, 2.15), ("Ti", 1.60, 2.11),
    ("V", 1.53, 2.07), ("Cr", 1.39, 2.06), ("Mn", 1.39, 2.05), ("Fe", 1.32, 2.04),
    ("Co", 1.26, 2.00), ("Ni", 1.24, 1.63), ("Cu", 1.32, 1.40), ("Zn", 1.22, 1.39),
    ("Ga", 1.22, 1.87), ("Ge", 1.20, 2.11), ("As", 1.19, 1.85), ("Se", 1.20, 1.90),
    ("Br", 1.20, 1.85), ("Kr", 1.16, 2.02),
    // --- Period 5 ---
    ("Rb", 2.20, 3.03), ("Sr", 1.95, 2.49), ("Y", 1.90, 2.32), ("Zr", 1.75, 2.23),
    ("Nb", 1.64, 2.18), ("Mo", 1.54, 2.17), ("Tc", 1.47, 2.16), ("Ru", 1.46, 2.13),
    ("Rh", 1.42, 2.10), ("Pd", 1.39, 1.63), ("Ag", 1.45, 1.72), ("Cd", 1.44, 1.58),
    ("In", 1.42, 1.93), ("Sn", 1.39, 2.17), ("Sb", 1.39, 2.06), ("Te", 1.38, 2.06),
    ("I", 1.39, 1.98), ("Xe", 1.40, 2.16),
    // --- Period 6 (start) ---
    ("Cs", 2.44, 3.43), ("Ba", 2.15, 2.68),
];

/// Fallback radii for elements outside the table (and dummy atoms).
const DEFAULT_COVALENT_RADIUS: f64 = 1.50;
const DEFAULT_VDW_RADIUS: f64 = 2.00;

/// Returns the atomic number (Z) for an element symbol, 0 for unknown/dummy.
/// Matching is case-insensitive on the first letter only ("cl" -> Cl).
pub fn get_atomic_number(element: &str) -> u32 {
    let symbol = normalize_symbol(element);
    ELEMENT_TABLE
        .iter()
        .position(|(s, _, _)| *s == symbol)
        .map(|i| i as u32 + 1)
        .unwrap_or(0)
}

/// Returns the element symbol for Z, "X" for unknown.
pub fn get_symbol(atomic_number: u32) -> &'static str {
    lookup(atomic_number).map(|e| e.0).unwrap_or("X")
}

pub fn get_atom_cov(atomic_number: u32) -> f64 {
    lookup(atomic_number).map(|e| e.1).unwrap_or(DEFAULT_COVALENT_RADIUS)
}

pub fn get_atom_vdw(atomic_number: u32) -> f64 {
    lookup(atomic_number).map(|e| e.2).unwrap_or(DEFAULT_VDW_RADIUS)
}

/// Hydrogen-bond donors/acceptors considered by the contact classifier.
pub fn is_hbond_heavy_atom(atomic_number: u32) -> bool {
    matches!(atomic_number, 7 | 8 | 9)
}

fn lookup(atomic_number: u32) -> Option<&'static (&'static str, f64, f64)> {
    if atomic_number == 0 {
        return None;
    }
    ELEMENT_TABLE.get(atomic_number as usize - 1)
}

// Strip labels like "C12" or "O1A" down to the element part.
fn normalize_symbol(element: &str) -> String {
    let letters: String = element.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let mut chars = letters.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = first.to_ascii_uppercase().to_string();
    if let Some(second) = chars.next() {
        let candidate = format!("{}{}", out, second.to_ascii_lowercase());
        if ELEMENT_TABLE.iter().any(|(s, _, _)| *s == candidate) {
            return candidate;
        }
    }
    out.truncate(1);
    out
}
