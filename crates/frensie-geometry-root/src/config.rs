//! Root backend configuration.

use std::path::Path;

use frensie_geometry::{GeometryError, Result};
use serde::{Deserialize, Serialize};

/// Material names with a special meaning to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    /// Cells filled with this material end particle histories.
    pub terminal_material: String,
    /// Cells filled with this material are void.
    pub void_material: String,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            terminal_material: "graveyard".into(),
            void_material: "void".into(),
        }
    }
}

impl RootConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Check that both names are set and distinct.
    pub fn validate(&self) -> Result<()> {
        if self.terminal_material.is_empty() || self.void_material.is_empty() {
            return Err(GeometryError::InvalidConfig(
                "material names cannot be empty".into(),
            ));
        }

        if self.terminal_material == self.void_material {
            return Err(GeometryError::InvalidConfig(format!(
                "the void and terminal materials must differ (both are '{}')",
                self.void_material
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RootConfig::default();
        assert_eq!(config.terminal_material, "graveyard");
        assert_eq!(config.void_material, "void");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = RootConfig::from_toml_str("terminal_material = \"outside\"").unwrap();
        assert_eq!(config.terminal_material, "outside");
        assert_eq!(config.void_material, "void");
    }

    #[test]
    fn test_same_names_rejected() {
        let result = RootConfig::from_toml_str(
            "terminal_material = \"vacuum\"\nvoid_material = \"vacuum\"",
        );
        assert!(matches!(result, Err(GeometryError::InvalidConfig(_))));
    }
}
