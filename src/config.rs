use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::AnalysisError;
use crate::thresholds::ThresholdPolicy;

/// Top-level configuration for an analysis run.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Flat threshold overrides, `category_name -> value`. Ratio-type
    /// thresholds must lie in [0, 1]; time-type thresholds must be >= 0.
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,

    /// Show full file paths in evidence instead of basenames.
    #[serde(default)]
    pub full_path: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate a YAML configuration file. Threshold overrides
    /// outside their domain are a startup error, surfaced before ingestion.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        self.policy()
            .map(|_| ())
            .context("validating threshold overrides")
    }

    /// Build the threshold policy for this run: defaults plus overrides.
    pub fn policy(&self) -> Result<ThresholdPolicy, AnalysisError> {
        let mut policy = ThresholdPolicy::default();
        policy.apply_overrides(&self.thresholds)?;
        Ok(policy)
    }
}
