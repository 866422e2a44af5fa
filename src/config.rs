use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::queue::QueueConfig;
use crate::simulate::{MonteCarloConfig, DEFAULT_MONTE_CARLO_RUNS};
use crate::KsError;

/// Picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "kstwo.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub format: OutputFormat,
    /// Digits after the decimal point; shortest round-trip form when unset
    pub precision: Option<usize>,
    #[serde_as(as = "DefaultOnNull")]
    pub grid_points: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub monte_carlo_runs: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub seed: u64,
    /// Simulated seconds per queue run
    #[serde_as(as = "DefaultOnNull")]
    pub queue_duration: f64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let monte_carlo = MonteCarloConfig::default();
        Self {
            format: OutputFormat::Text,
            precision: None,
            grid_points: 101,
            monte_carlo_runs: DEFAULT_MONTE_CARLO_RUNS,
            seed: monte_carlo.seed,
            queue_duration: QueueConfig::default().duration,
        }
    }
}

impl ToolConfig {
    pub fn validate(&self) -> Result<(), KsError> {
        if self.grid_points < 2 {
            return Err(KsError::invalid("grid_points must be at least 2"));
        }

        if self.monte_carlo_runs == 0 {
            return Err(KsError::invalid(
                "monte_carlo_runs must be greater than zero",
            ));
        }

        if !(self.queue_duration.is_finite() && self.queue_duration > 0.0) {
            return Err(KsError::invalid("queue_duration must be positive"));
        }

        if matches!(self.precision, Some(p) if p > 17) {
            return Err(KsError::invalid("precision must be at most 17 digits"));
        }

        Ok(())
    }

    pub fn monte_carlo(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            runs: self.monte_carlo_runs,
            seed: self.seed,
        }
    }

    /// Equally spaced statistics covering `[0, 1]`
    pub fn statistic_grid(&self) -> Vec<f64> {
        let denom = (self.grid_points - 1) as f64;
        (0..self.grid_points)
            .map(|idx| idx as f64 / denom)
            .collect()
    }
}

/// Load from `path`, else from `kstwo.json` in the working directory, else
/// fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ToolConfig, KsError> {
    if let Some(path) = path {
        return load_config_file(path);
    }

    let cwd_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    if cwd_config.exists() {
        return load_config_file(&cwd_config);
    }

    debug!("no config file, using defaults");
    Ok(ToolConfig::default())
}

pub fn load_config_file(path: &Path) -> Result<ToolConfig, KsError> {
    debug!("loading config from {}", path.display());
    let raw = fs::read_to_string(path)?;
    let config: ToolConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}
