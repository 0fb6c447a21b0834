//! Whole-run configuration and its JSON round-trip.
//!
//! One JSON document drives every subcommand; each engine reads its own
//! section and ignores the rest. Sections and fields are all optional in
//! the file (anything absent takes its default), so a config can be as
//! small as `{"cluster": {"rlim": 0.25}}`. The CLI can write the effective
//! configuration back out, which is how a run becomes repeatable.

use serde::{Deserialize, Serialize};
use std::path::Path;

use frame_atlas_core::error::ConfigError;

use crate::artifacts::ArtifactConfig;
use crate::cluster::ClusterConfig;
use crate::embed::EmbeddingConfig;
use crate::locate::LocateConfig;

/// Configuration for a full pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Clustering engine settings.
    pub cluster: ClusterConfig,
    /// Locate engine settings.
    pub locate: LocateConfig,
    /// Embedding engine settings.
    pub embed: EmbeddingConfig,
    /// Which artifacts a clustering run writes.
    pub artifacts: ArtifactConfig,
}

impl RunConfig {
    /// Load a [`RunConfig`] from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::FileParse`] if the JSON is malformed, and
    /// [`ConfigError::InvalidValue`] if a field is out of range.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::FileParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration to pretty-printed JSON and write it to
    /// `path`, creating parent directories if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the directory cannot be created
    /// or the file cannot be written.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cluster.validate()?;
        self.locate.validate()?;
        self.embed.validate()
    }
}
