use std::path::Path;

use serde::{Deserialize, Serialize};

/// The line format of a device-metadata dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `KEY=VALUE` lines, as printed by `udevadm info --query=property` or
    /// found in uevent files.
    #[default]
    Env,
    /// `T: payload` lines, as printed by `udevadm info --export-db`. `E:`
    /// lines carry properties; other tags are kept as database entries.
    Export,
}

/// What to do when a key appears twice within one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail with a `DuplicateKey` error.
    #[default]
    Reject,
    /// Keep the last value, at the position of the first occurrence.
    LastWins,
}

/// Configuration for the device-record parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct ParserConfig {
    /// The line format of the input.
    pub dialect: Dialect,

    /// How repeated keys within a block are handled.
    ///
    /// Applies to properties and attributes independently.
    pub duplicates: DuplicatePolicy,
}

impl ParserConfig {
    /// Configuration for `udevadm info --export-db` style input.
    #[must_use]
    pub fn export() -> Self {
        Self {
            dialect: Dialect::Export,
            ..Self::default()
        }
    }

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid configuration.
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors that can occur while saving a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The file could not be written.
    #[error("Failed to write config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be serialized.
    #[error("Failed to serialize config: {0}")]
    Toml(#[from] toml::ser::Error),
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        dialect: Dialect,

        #[serde(default)]
        duplicates: DuplicatePolicy,
    },
}

impl From<Versions> for ParserConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                dialect,
                duplicates,
            } => Self {
                dialect,
                duplicates,
            },
        }
    }
}

impl From<ParserConfig> for Versions {
    fn from(config: ParserConfig) -> Self {
        Self::V1 {
            dialect: config.dialect,
            duplicates: config.duplicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.dialect, Dialect::Env);
        assert_eq!(config.duplicates, DuplicatePolicy::Reject);
    }

    #[test]
    fn minimal_file() {
        let config: ParserConfig = toml::from_str("_version = \"1\"\n").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn full_file() {
        let config: ParserConfig = toml::from_str(
            "_version = \"1\"\ndialect = \"export\"\nduplicates = \"last-wins\"\n",
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::Export);
        assert_eq!(config.duplicates, DuplicatePolicy::LastWins);
    }

    #[test]
    fn missing_version_is_rejected() {
        assert!(toml::from_str::<ParserConfig>("dialect = \"env\"\n").is_err());
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        assert!(toml::from_str::<ParserConfig>("_version = \"1\"\ndialect = \"yaml\"\n").is_err());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("parseudev.toml");

        let config = ParserConfig {
            dialect: Dialect::Export,
            duplicates: DuplicatePolicy::LastWins,
        };
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("_version = \"1\""));

        assert_eq!(ParserConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_missing_file() {
        let tmp = tempdir().unwrap();
        let err = ParserConfig::load(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
