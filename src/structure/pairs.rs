// src/structure/pairs.rs
//! Fragment pairs of a materialized structure, reduced to symmetry-unique dimers.

use super::Structure;
use crate::config::PairSettings;
use crate::model::fragment::Fragment;
use crate::model::index::DimerIndex;
use crate::physics::dimers::FragmentDimer;
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentPairSettings {
    /// Only pairs involving this fragment (position in `Structure::fragments`).
    pub key_fragment: Option<usize>,
    /// Nearest-atom distance cutoff in Å.
    pub radius: f64,
    /// Treat `AB` and `BA` as the same interaction.
    pub consider_inversion: bool,
}

impl Default for FragmentPairSettings {
    fn default() -> Self {
        Self::from(&PairSettings::default())
    }
}

impl From<&PairSettings> for FragmentPairSettings {
    fn from(settings: &PairSettings) -> Self {
        Self {
            key_fragment: None,
            radius: settings.radius,
            consider_inversion: settings.consider_inversion,
        }
    }
}

/// One raw pair and the unique interaction it is an instance of.
#[derive(Debug, Clone)]
pub struct SymmetryRelatedPair {
    pub dimer: FragmentDimer,
    /// Index into [`FragmentPairs::unique_pairs`]; `None` when either fragment
    /// is not a complete image of a unit-cell fragment.
    pub unique_index: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FragmentPairs {
    /// Symmetry-unique dimers, by ascending nearest-atom distance.
    pub unique_pairs: Vec<FragmentDimer>,
    /// Per structure fragment, its pairs by ascending nearest-atom distance.
    pub pairs: Vec<Vec<SymmetryRelatedPair>>,
}

impl FragmentPairs {
    pub fn total_pairs(&self) -> usize {
        self.pairs.iter().map(Vec::len).sum()
    }
}

impl Structure {
    /// Ordered pairs of distinct fragments within `settings.radius` of each
    /// other, grouped by the symmetry-unique dimer they instantiate.
    pub fn find_fragment_pairs(&self, settings: &FragmentPairSettings) -> FragmentPairs {
        let fragments = self.fragments();
        let mut result = FragmentPairs {
            unique_pairs: Vec::new(),
            pairs: vec![Vec::new(); fragments.len()],
        };
        let keys: Vec<usize> = match settings.key_fragment {
            Some(k) if k < fragments.len() => vec![k],
            Some(k) => {
                log::warn!("Key fragment {} out of range ({} fragments)", k, fragments.len());
                return result;
            }
            None => (0..fragments.len()).collect(),
        };

        let cell = self.cell();
        let table = cell.dimer_mapping_table(settings.radius, settings.consider_inversion);

        let raw: Vec<(usize, Vec<FragmentDimer>)> = keys
            .par_iter()
            .map(|&i| {
                let a = &fragments[i];
                let found = fragments
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .filter(|(_, b)| a.nearest_distance(b) <= settings.radius)
                    .map(|(_, b)| FragmentDimer::new(a.clone(), b.clone()))
                    .collect();
                (i, found)
            })
            .collect();

        // Table slot -> position in unique_pairs, in discovery order
        let mut slots: HashMap<usize, usize> = HashMap::new();
        for (i, dimers) in raw {
            for dimer in dimers {
                let unique_index = match table.symmetry_unique_dimer(&dimer.index) {
                    Some((slot, representative)) => match slots.get(&slot) {
                        Some(&u) => Some(u),
                        None => match representative_dimer(self, &representative) {
                            Some(unique) => {
                                result.unique_pairs.push(unique);
                                slots.insert(slot, result.unique_pairs.len() - 1);
                                Some(result.unique_pairs.len() - 1)
                            }
                            None => None,
                        },
                    },
                    None => None,
                };
                result.pairs[i].push(SymmetryRelatedPair { dimer, unique_index });
            }
        }

        // Stable sort of the unique list, then remap the back references
        let mut order: Vec<usize> = (0..result.unique_pairs.len()).collect();
        order.sort_by(|&x, &y| {
            result.unique_pairs[x]
                .nearest_distance
                .total_cmp(&result.unique_pairs[y].nearest_distance)
        });
        let mut remap = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }
        let mut unique: Vec<Option<FragmentDimer>> = result.unique_pairs.into_iter().map(Some).collect();
        result.unique_pairs = order.iter().filter_map(|&old| unique[old].take()).collect();

        for list in &mut result.pairs {
            for pair in list.iter_mut() {
                pair.unique_index = pair.unique_index.map(|u| remap[u]);
            }
            list.sort_by(|x, y| x.dimer.nearest_distance.total_cmp(&y.dimer.nearest_distance));
        }

        log::info!(
            "{} fragment pairs within {:.2} Å, {} symmetry unique",
            result.total_pairs(),
            settings.radius,
            result.unique_pairs.len()
        );
        result
    }
}

fn representative_dimer(structure: &Structure, index: &DimerIndex) -> Option<FragmentDimer> {
    let cell = structure.cell();
    let a: Fragment = cell.make_fragment(&cell.fragment_atoms(&index.a)?);
    let b: Fragment = cell.make_fragment(&cell.fragment_atoms(&index.b)?);
    Some(FragmentDimer::new(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::index::GenericAtomIndex;
    use crate::structure::StructureKind;
    use crate::testing::{inverted_pair_crystal, two_atom_crystal};
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn settings(radius: f64, consider_inversion: bool) -> FragmentPairSettings {
        FragmentPairSettings {
            key_fragment: None,
            radius,
            consider_inversion,
        }
    }

    #[test]
    fn test_inverted_pair_shares_one_unique_dimer() {
        let structure = Structure::from_crystal(Arc::new(inverted_pair_crystal()));
        let pairs = structure.find_fragment_pairs(&settings(4.0, false));
        assert_eq!(pairs.pairs.len(), 2);
        // The two molecules at offset zero are more than 4 Å apart
        assert_eq!(pairs.total_pairs(), 0);

        let mut grown = Structure::new(StructureKind::Crystal(Arc::new(inverted_pair_crystal())));
        grown.pack_unit_cells(&Vector3::new(-1.0, -1.0, -1.0), &Vector3::new(1.0, 1.0, 1.0));
        grown.delete_incomplete_fragments();
        let pairs = grown.find_fragment_pairs(&settings(4.0, false));
        assert!(pairs.total_pairs() > 0);
        assert_eq!(pairs.unique_pairs.len(), 1);
        for list in &pairs.pairs {
            for pair in list {
                assert_eq!(pair.unique_index, Some(0));
            }
        }
    }

    #[test]
    fn test_unique_dimers_match_raw_pairs() {
        let mut structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        structure.add_periodic_images(1);
        for radius in [4.0, 9.0] {
            for inversion in [false, true] {
                let pairs = structure.find_fragment_pairs(&settings(radius, inversion));
                for list in &pairs.pairs {
                    assert!(list.windows(2).all(|w| w[0].dimer.nearest_distance <= w[1].dimer.nearest_distance));
                    for pair in list {
                        let u = pair.unique_index.unwrap();
                        let unique = &pairs.unique_pairs[u];
                        assert!(unique.nearest_distance <= radius + 1e-9);
                        assert!((unique.nearest_distance - pair.dimer.nearest_distance).abs() < 1e-6);
                        let (ua, ub) = unique.composition();
                        let (ra, rb) = pair.dimer.composition();
                        assert!((ua == ra && ub == rb) || (ua == rb && ub == ra));
                    }
                }
                assert!(pairs
                    .unique_pairs
                    .windows(2)
                    .all(|w| w[0].nearest_distance <= w[1].nearest_distance));
            }
        }
    }

    #[test]
    fn test_key_fragment_restricts_pairs() {
        let mut structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        structure.add_periodic_images(1);
        let mut key = settings(9.0, true);
        key.key_fragment = Some(0);
        let pairs = structure.find_fragment_pairs(&key);
        assert!(pairs.pairs.iter().skip(1).all(Vec::is_empty));
        assert!(!pairs.pairs[0].is_empty());

        key.key_fragment = Some(10_000);
        assert_eq!(structure.find_fragment_pairs(&key).total_pairs(), 0);
    }

    #[test]
    fn test_incomplete_fragment_has_no_unique_dimer() {
        let mut structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        structure.add_atoms(&[
            GenericAtomIndex::new(0, 0, 0, 0),
            GenericAtomIndex::new(1, 0, 0, 0),
            GenericAtomIndex::new(0, 1, 0, 0),
        ]);
        let pairs = structure.find_fragment_pairs(&settings(9.0, false));
        let complete = structure.fragment_slot_for_atom(0).unwrap();
        assert_eq!(pairs.pairs[complete].len(), 1);
        assert_eq!(pairs.pairs[complete][0].unique_index, None);
    }

    #[test]
    fn test_empty_structure_has_no_pairs() {
        let structure = Structure::new(StructureKind::Crystal(two_atom_crystal()));
        let pairs = structure.find_fragment_pairs(&FragmentPairSettings::default());
        assert!(pairs.unique_pairs.is_empty());
        assert!(pairs.pairs.is_empty());
    }
}
