//src/model/mod.rs
pub mod asymmetric_unit;
pub mod elements;
pub mod fragment;
pub mod index;
pub mod symmetry;
pub mod unit_cell;

// Re-exports for cleaner imports
pub use asymmetric_unit::{AsymmetricUnit, CellAtom};
pub use elements::{get_atomic_number, get_symbol};
pub use fragment::{Fragment, FragmentTransform};
pub use index::{DimerIndex, FragmentIndex, GenericAtomIndex};
pub use symmetry::{SpaceGroup, SymmetryError, SymmetryOperation};
pub use unit_cell::{CellError, UnitCell};
