//! TOML configuration for an analysis run.
//!
//! Every section and field is optional: a missing file section falls back to
//! the compiled-in defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a single analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded analysis configuration");
        Ok(config)
    }

    /// Shorthand for a default configuration pointing at the given files.
    pub fn with_paths(input: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::default();
        cfg.paths.input = input.into();
        cfg.paths.database = database.into();
        cfg
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Access log to analyse (delimited text with a header row).
    pub input: PathBuf,
    /// SQLite file receiving the `acessos` table.
    pub database: PathBuf,
    /// Directory receiving the rendered charts.
    pub charts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("portaria_log.csv"),
            database: PathBuf::from("acessos.db"),
            charts_dir: PathBuf::from("charts"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Layout of the input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Field delimiter. Must be a single ASCII character.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Isolation forest parameters for response-time scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Expected share of outliers in the dataset, in `(0, 0.5]`.
    pub contamination: f64,
    /// Number of isolation trees.
    pub trees: usize,
    /// Subsample size per tree (capped at the dataset size).
    pub max_samples: usize,
    /// RNG seed; a fixed seed makes runs reproducible.
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
