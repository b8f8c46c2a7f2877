//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs the settings it changes:
//!
//! ```json
//! { "min_quality": 10, "time_period": 30, "aligner": { "profile": "minimap2" } }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::graph::GraphOptions;
use crate::source::aligner::{AlignerConfig, AlignerProfile};
use crate::utils::validation::{
    validate_min_coverage, validate_preset, validate_threads, ValidationError,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records with a lower mapping quality are dropped before grouping
    pub min_quality: u8,

    /// Minimum bridge support for a join, passed to the model with every bridge
    pub min_coverage: f64,

    /// Reads between consolidation cycles, 0 disables count-driven cycles
    pub read_period: u64,

    /// Time between consolidation cycles in whole seconds, 0 disables timed cycles
    #[serde(with = "whole_seconds")]
    pub time_period: Duration,

    /// Drop short scaffolds from the sequence output
    pub trim: bool,

    pub graph: GraphOptions,

    pub aligner: AlignerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_quality: 1,
            min_coverage: 1.0,
            read_period: 50,
            time_period: Duration::from_secs(10),
            trim: false,
            graph: GraphOptions::default(),
            aligner: AlignerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read or `ConfigError::Parse`
    /// if it is not a valid configuration.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the JSON is malformed or has wrongly typed fields.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the values a run depends on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a negative or non-finite coverage, zero aligner
    /// threads, or an unknown minimap2 preset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_min_coverage(self.min_coverage)?;
        validate_threads(self.aligner.threads)?;
        if self.aligner.profile == AlignerProfile::Minimap2 {
            validate_preset(&self.aligner.preset)?;
        }
        Ok(())
    }

    /// Options for the contig graph, with the top-level trim flag applied
    #[must_use]
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            trim: self.trim || self.graph.trim,
            ..self.graph.clone()
        }
    }
}

mod whole_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
