// src/config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

// --- Sections ---

/// Distance tolerances (Å) added to radius sums when building the bond graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondSettings {
  pub covalent_tolerance: f64,
  pub vdw_tolerance: f64,
  pub hydrogen_bond_tolerance: f64,
  /// Build hydrogen-bond / close-contact edges at all.
  pub include_contacts: bool,
}

impl Default for BondSettings {
  fn default() -> Self {
    Self {
      covalent_tolerance: 0.4,
      vdw_tolerance: 0.0,
      hydrogen_bond_tolerance: 0.0,
      include_contacts: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetrySettings {
  /// moyo tolerance for space-group detection (Å)
  pub symprec: f64,
  /// Fractional RMSD below which two fragments are symmetry images.
  pub fragment_rmsd_tolerance: f64,
  /// Sites closer than this (Å) after expansion are the same site.
  pub duplicate_tolerance: f64,
}

impl Default for SymmetrySettings {
  fn default() -> Self {
    Self {
      symprec: 1e-4,
      fragment_rmsd_tolerance: 1e-6,
      duplicate_tolerance: 1e-3,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneSettings {
  pub min_candidate_length: f64,
  pub stacking_search_limit: i32,
}

impl Default for PlaneSettings {
  fn default() -> Self {
    Self {
      min_candidate_length: 1e-3,
      stacking_search_limit: 10,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSettings {
  pub radius: f64,
  pub consider_inversion: bool,
}

impl Default for PairSettings {
  fn default() -> Self {
    Self {
      radius: 3.8,
      consider_inversion: true,
    }
  }
}

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
  #[serde(default)]
  pub bonds: BondSettings,

  #[serde(default)]
  pub symmetry: SymmetrySettings,

  #[serde(default)]
  pub plane: PlaneSettings,

  #[serde(default)]
  pub pairs: PairSettings,
}

impl Config {
  /// Loads config from standard OS location (e.g., ~/.config/cview/settings.json)
  pub fn load() -> (Self, String) {
    let path = Self::get_path();
    if path.exists() {
      match File::open(&path) {
        Ok(file) => {
          let reader = BufReader::new(file);
          match serde_json::from_reader(reader) {
            Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
            Err(e) => (Self::default(), format!("Error parsing config: {}", e)),
          }
        }
        Err(e) => (Self::default(), format!("Error opening config: {}", e)),
      }
    } else {
      (
        Self::default(),
        "No config found. Using defaults.".to_string(),
      )
    }
  }

  /// Saves config to standard OS location
  pub fn save(&self) -> String {
    let path = Self::get_path();
    if let Some(parent) = path.parent() {
      let _ = fs::create_dir_all(parent);
    }

    match File::create(&path) {
      Ok(file) => {
        let writer = BufWriter::new(file);
        match serde_json::to_writer_pretty(writer, self) {
          Ok(_) => format!("Config saved to {:?}", path),
          Err(e) => format!("Failed to save config: {}", e),
        }
      }
      Err(e) => format!("Could not create config file: {}", e),
    }
  }

  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  fn get_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("com", "example", "cview") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }
}
