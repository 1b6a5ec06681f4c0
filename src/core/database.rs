//! Technology parameter database.
//!
//! Zero-order unit models take their design parameters (water recovery,
//! per-solute removal fractions, energy intensity) from a database of
//! technology parameter sets rather than from code. Each technology is one
//! JSON document with a `default` entry and optional process-subtype entries
//! that overlay it:
//!
//! ```json
//! {
//!   "default": {
//!     "recovery_frac_mass_H2O": { "value": 1.0, "units": "dimensionless" },
//!     "removal_frac_mass_solute": {
//!       "bod": { "value": 0.7, "units": "dimensionless" }
//!     }
//!   },
//!   "diffused_aeration": { ... }
//! }
//! ```
//!
//! The built-in data ships embedded in the crate; [`Database::from_dir`]
//! loads user-supplied documents from disk instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Parameter lookup failure.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// No document exists for the requested technology.
    #[error("no parameter data available for technology {0}")]
    UnknownTechnology(String),

    /// The technology document has no entry for the requested subtype.
    #[error("technology {technology} has no parameter data for subtype {subtype}")]
    UnknownSubtype {
        /// Technology whose document was consulted.
        technology: String,
        /// Subtype that was not found.
        subtype: String,
    },

    /// Reading a parameter file from disk failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parameter file is not valid JSON of the expected shape.
    #[error("invalid parameter file {path}")]
    Json {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
}

/// One parameter value with its unit of measure as recorded in the database.
///
/// Values are stored in the units named by the document; callers convert to
/// SI at the point of use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterEntry {
    /// Numeric value in `units`.
    pub value: f64,

    /// Unit string, e.g. `kWh/m^3`.
    pub units: String,
}

/// The merged parameter set for one technology (and optional subtype).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TechnologyParameters {
    #[serde(default)]
    removal_frac_mass_solute: BTreeMap<String, ParameterEntry>,

    #[serde(flatten)]
    scalars: BTreeMap<String, ParameterEntry>,
}

impl TechnologyParameters {
    /// Looks up a scalar parameter such as `recovery_frac_mass_H2O`.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&ParameterEntry> {
        self.scalars.get(name)
    }

    /// Looks up the removal fraction recorded for one solute.
    #[must_use]
    pub fn solute_removal(&self, solute: &str) -> Option<&ParameterEntry> {
        self.removal_frac_mass_solute.get(solute)
    }

    /// All recorded solute removal fractions, in solute name order.
    pub fn solute_removals(&self) -> impl Iterator<Item = (&str, &ParameterEntry)> {
        self.removal_frac_mass_solute
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Overlays `subtype` entries onto this set, replacing matching keys.
    fn overlay(&mut self, subtype: &TechnologyParameters) {
        for (name, entry) in &subtype.scalars {
            self.scalars.insert(name.clone(), entry.clone());
        }
        for (solute, entry) in &subtype.removal_frac_mass_solute {
            self.removal_frac_mass_solute
                .insert(solute.clone(), entry.clone());
        }
    }
}

type TechnologyDocument = BTreeMap<String, TechnologyParameters>;

const BUILT_IN: &[(&str, &str)] = &[(
    "aeration_basin",
    include_str!("database/aeration_basin.json"),
)];

/// Database of technology parameter documents.
#[derive(Debug, Clone)]
pub struct Database {
    technologies: BTreeMap<String, TechnologyDocument>,
}

impl Database {
    /// Opens the built-in database.
    #[must_use]
    pub fn new() -> Self {
        let technologies = BUILT_IN
            .iter()
            .map(|(technology, text)| {
                let document: TechnologyDocument = serde_json::from_str(text)
                    .expect("built-in parameter documents are valid JSON");
                ((*technology).to_string(), document)
            })
            .collect();
        Self { technologies }
    }

    /// Loads a database from a directory of `<technology>.json` documents.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] if the directory cannot be read or any
    /// document fails to parse.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let mut technologies = BTreeMap::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(technology) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            let document: TechnologyDocument = serde_json::from_str(&text)
                .map_err(|source| DatabaseError::Json {
                    path: path.clone(),
                    source,
                })?;
            technologies.insert(technology.to_string(), document);
        }
        Ok(Self { technologies })
    }

    /// Returns the parameter set for a technology, with the subtype entries
    /// (if requested) overlaid on the technology defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] if the technology or subtype is unknown.
    pub fn get_unit_operation_parameters(
        &self,
        technology: &str,
        subtype: Option<&str>,
    ) -> Result<TechnologyParameters, DatabaseError> {
        let document = self
            .technologies
            .get(technology)
            .ok_or_else(|| DatabaseError::UnknownTechnology(technology.to_string()))?;
        let mut parameters = document.get("default").cloned().unwrap_or_default();
        if let Some(subtype) = subtype {
            let overlay =
                document
                    .get(subtype)
                    .ok_or_else(|| DatabaseError::UnknownSubtype {
                        technology: technology.to_string(),
                        subtype: subtype.to_string(),
                    })?;
            parameters.overlay(overlay);
        }
        Ok(parameters)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_aeration_basin_defaults() {
        let db = Database::new();
        let params = db
            .get_unit_operation_parameters("aeration_basin", None)
            .unwrap();

        assert_eq!(params.scalar("recovery_frac_mass_H2O").unwrap().value, 1.0);
        assert_eq!(
            params
                .scalar("energy_electric_flow_vol_inlet")
                .unwrap()
                .units,
            "kWh/m^3"
        );
        assert_eq!(params.solute_removal("bod").unwrap().value, 0.7);
        assert_eq!(params.solute_removal("viruses_enteric").unwrap().value, 0.99);
        assert!(params.solute_removal("foo").is_none());
    }

    #[test]
    fn subtype_overlays_default_entries() {
        let db = Database::new();
        let base = db
            .get_unit_operation_parameters("aeration_basin", None)
            .unwrap();
        let sub = db
            .get_unit_operation_parameters("aeration_basin", Some("diffused_aeration"))
            .unwrap();

        assert_ne!(
            base.scalar("energy_electric_flow_vol_inlet").unwrap().value,
            sub.scalar("energy_electric_flow_vol_inlet").unwrap().value
        );
        // Untouched keys fall through to the default entry.
        assert_eq!(
            base.scalar("recovery_frac_mass_H2O").unwrap().value,
            sub.scalar("recovery_frac_mass_H2O").unwrap().value
        );
        assert_eq!(
            base.solute_removal("bod").unwrap(),
            sub.solute_removal("bod").unwrap()
        );
    }

    #[test]
    fn unknown_lookups_are_reported_by_name() {
        let db = Database::new();
        assert!(matches!(
            db.get_unit_operation_parameters("warp_drive", None),
            Err(DatabaseError::UnknownTechnology(t)) if t == "warp_drive"
        ));
        assert!(matches!(
            db.get_unit_operation_parameters("aeration_basin", Some("surface")),
            Err(DatabaseError::UnknownSubtype { subtype, .. }) if subtype == "surface"
        ));
    }
}
