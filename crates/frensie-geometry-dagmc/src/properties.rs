//! Property names and configuration for DagMC models.
//!
//! Cells and surfaces of a DagMC model carry named properties. The names the
//! geometry layer looks for are configurable; everything is fixed once a
//! [`DagMc`](crate::DagMc) context has been built from a [`DagMcConfig`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use frensie_geometry::{GeometryError, Result};
use serde::{Deserialize, Serialize};

/// Names of the properties recognized on cells and surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    /// Flags cells that end a particle history.
    pub termination_cell: String,
    /// Flags surfaces that reflect particles.
    pub reflecting_surface: String,
    /// Material id of a cell.
    pub material: String,
    /// Density of a cell.
    pub density: String,
    /// Estimator membership of a cell or surface.
    pub estimator: String,
    /// Surface current estimator type.
    pub surface_current: String,
    /// Surface flux estimator type.
    pub surface_flux: String,
    /// Cell pulse height estimator type.
    pub cell_pulse_height: String,
    /// Cell track-length flux estimator type.
    pub cell_track_length_flux: String,
    /// Cell collision flux estimator type.
    pub cell_collision_flux: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            termination_cell: "termination.cell".into(),
            reflecting_surface: "reflecting.surface".into(),
            material: "material".into(),
            density: "density".into(),
            estimator: "estimator".into(),
            surface_current: "surface.current".into(),
            surface_flux: "surface.flux".into(),
            cell_pulse_height: "cell.pulse.height".into(),
            cell_track_length_flux: "cell.tl.flux".into(),
            cell_collision_flux: "cell.c.flux".into(),
        }
    }
}

impl PropertyNames {
    /// Names of properties that may appear on cells or surfaces.
    pub fn property_names(&self) -> [&str; 5] {
        [
            &self.termination_cell,
            &self.reflecting_surface,
            &self.material,
            &self.density,
            &self.estimator,
        ]
    }

    /// Names of the estimator types.
    pub fn estimator_type_names(&self) -> [&str; 5] {
        [
            &self.surface_current,
            &self.surface_flux,
            &self.cell_pulse_height,
            &self.cell_track_length_flux,
            &self.cell_collision_flux,
        ]
    }

    /// Check if a property name is one of the recognized names.
    pub fn is_known(&self, name: &str) -> bool {
        self.property_names().contains(&name)
    }

    /// Map an estimator type name to its kind.
    pub fn estimator_type(&self, name: &str) -> Option<EstimatorType> {
        if name == self.surface_current {
            Some(EstimatorType::SurfaceCurrent)
        } else if name == self.surface_flux {
            Some(EstimatorType::SurfaceFlux)
        } else if name == self.cell_pulse_height {
            Some(EstimatorType::CellPulseHeight)
        } else if name == self.cell_track_length_flux {
            Some(EstimatorType::CellTrackLengthFlux)
        } else if name == self.cell_collision_flux {
            Some(EstimatorType::CellCollisionFlux)
        } else {
            None
        }
    }

    /// Validate the names.
    ///
    /// Names must be non-empty, may not contain `_`, and must be distinct.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();

        for name in self
            .property_names()
            .into_iter()
            .chain(self.estimator_type_names())
        {
            if name.is_empty() {
                return Err(GeometryError::InvalidConfig(
                    "property names cannot be empty".into(),
                ));
            }
            if name.contains('_') {
                return Err(GeometryError::InvalidConfig(format!(
                    "property name '{name}' cannot contain '_'"
                )));
            }
            if !seen.insert(name) {
                return Err(GeometryError::InvalidConfig(format!(
                    "property name '{name}' is used more than once"
                )));
            }
        }

        Ok(())
    }
}

/// Settings used to load a DagMC model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DagMcConfig {
    /// Faceting tolerance handed to the engine (cm).
    pub facet_tolerance: f64,
    /// Keep hash tables for id/handle lookups instead of scanning the
    /// entity lists.
    pub use_fast_id_lookup: bool,
    /// Property names to look for.
    pub property_names: PropertyNames,
}

impl Default for DagMcConfig {
    fn default() -> Self {
        Self {
            facet_tolerance: 1e-3,
            use_fast_id_lookup: true,
            property_names: PropertyNames::default(),
        }
    }
}

impl DagMcConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.facet_tolerance.is_nan() || self.facet_tolerance <= 0.0 {
            return Err(GeometryError::InvalidConfig(
                "facet_tolerance must be positive".into(),
            ));
        }

        self.property_names.validate()
    }
}

/// Estimator kinds that can be attached to model entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorType {
    /// Current across a surface.
    SurfaceCurrent,
    /// Flux through a surface.
    SurfaceFlux,
    /// Energy deposited in a cell per history.
    CellPulseHeight,
    /// Track-length flux in a cell.
    CellTrackLengthFlux,
    /// Collision flux in a cell.
    CellCollisionFlux,
}

impl EstimatorType {
    /// True for estimators that score in cells.
    pub fn is_cell_estimator(self) -> bool {
        matches!(
            self,
            Self::CellPulseHeight | Self::CellTrackLengthFlux | Self::CellCollisionFlux
        )
    }

    /// True for estimators that score on surfaces.
    pub fn is_surface_estimator(self) -> bool {
        !self.is_cell_estimator()
    }
}

/// Particle scored by an estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleType {
    /// `n`
    Neutron,
    /// `p`
    Photon,
    /// `e`
    Electron,
}

impl FromStr for ParticleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "n" => Ok(Self::Neutron),
            "p" => Ok(Self::Photon),
            "e" => Ok(Self::Electron),
            other => Err(format!("invalid particle type '{other}' (choose n, p or e)")),
        }
    }
}

impl fmt::Display for ParticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Neutron => "n",
            Self::Photon => "p",
            Self::Electron => "e",
        };
        f.write_str(s)
    }
}

/// An estimator declared in the model and the entities attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorSpec {
    /// Kind of estimator.
    pub estimator_type: EstimatorType,
    /// Particle scored.
    pub particle_type: ParticleType,
    /// Cell or surface ids, ascending.
    pub entities: Vec<u64>,
}

/// Split an estimator property value of the form `id.type.ptype`.
///
/// The type sits between the first and the last `.`, so it may itself contain
/// dots (`cell.tl.flux`).
pub fn parse_estimator_value(
    value: &str,
    names: &PropertyNames,
) -> std::result::Result<(u64, EstimatorType, ParticleType), String> {
    let (first, last) = match (value.find('.'), value.rfind('.')) {
        (Some(first), Some(last)) if first != last => (first, last),
        _ => {
            return Err(format!(
                "estimator property '{value}' is invalid (the form needs to be id.type.ptype)"
            ))
        }
    };

    let id = value[..first]
        .parse::<u64>()
        .map_err(|_| format!("estimator property '{value}' has an invalid id"))?;

    let type_name = &value[first + 1..last];
    let estimator_type = names.estimator_type(type_name).ok_or_else(|| {
        format!("estimator {id} has an invalid estimator type ({type_name})")
    })?;

    let particle_type = value[last + 1..]
        .parse::<ParticleType>()
        .map_err(|err| format!("estimator {id}: {err}"))?;

    Ok((id, estimator_type, particle_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_are_valid() {
        let names = PropertyNames::default();
        assert!(names.validate().is_ok());
        assert!(names.is_known("termination.cell"));
        assert!(names.is_known("density"));
        assert!(!names.is_known("cell.tl.flux"));
    }

    #[test]
    fn test_underscore_rejected() {
        let names = PropertyNames {
            material: "mat_id".into(),
            ..PropertyNames::default()
        };
        assert!(matches!(
            names.validate(),
            Err(GeometryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let names = PropertyNames {
            density: "material".into(),
            ..PropertyNames::default()
        };
        assert!(names.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = DagMcConfig::from_toml_str(
            r#"
            facet_tolerance = 1e-4

            [property_names]
            termination_cell = "graveyard"
            "#,
        )
        .unwrap();

        assert_eq!(config.facet_tolerance, 1e-4);
        assert!(config.use_fast_id_lookup);
        assert_eq!(config.property_names.termination_cell, "graveyard");
        assert_eq!(config.property_names.material, "material");
    }

    #[test]
    fn test_config_rejects_bad_tolerance() {
        assert!(DagMcConfig::from_toml_str("facet_tolerance = 0.0").is_err());
    }

    #[test]
    fn test_parse_estimator_value() {
        let names = PropertyNames::default();

        let (id, ty, pt) = parse_estimator_value("3.cell.tl.flux.n", &names).unwrap();
        assert_eq!(id, 3);
        assert_eq!(ty, EstimatorType::CellTrackLengthFlux);
        assert_eq!(pt, ParticleType::Neutron);

        let (id, ty, pt) = parse_estimator_value("12.surface.current.p", &names).unwrap();
        assert_eq!(id, 12);
        assert_eq!(ty, EstimatorType::SurfaceCurrent);
        assert_eq!(pt, ParticleType::Photon);
    }

    #[test]
    fn test_parse_estimator_value_errors() {
        let names = PropertyNames::default();

        assert!(parse_estimator_value("3", &names).is_err());
        assert!(parse_estimator_value("3.n", &names).is_err());
        assert!(parse_estimator_value("x.cell.tl.flux.n", &names).is_err());
        assert!(parse_estimator_value("3.cell.bogus.n", &names).is_err());
        assert!(parse_estimator_value("3.cell.tl.flux.q", &names).is_err());
    }

    #[test]
    fn test_estimator_kinds() {
        assert!(EstimatorType::CellPulseHeight.is_cell_estimator());
        assert!(EstimatorType::SurfaceFlux.is_surface_estimator());
        assert!(!EstimatorType::SurfaceCurrent.is_cell_estimator());
    }
}
