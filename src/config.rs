use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Preset, RiskBand, SourceDefinition};
use crate::models::TemporalKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub microplastic: TrackerConfig,
    pub pfas: TrackerConfig,
    pub stats: StatsConfig,
}

/// Catalog and band selection for one tracker. Explicit `sources` or
/// `bands` replace the preset's table wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    pub preset: Preset,
    pub sources: Option<Vec<SourceDefinition>>,
    pub bands: Option<Vec<RiskBand>>,
    pub temporal_key: TemporalKey,
}

/// Longest trailing window accepted for the monthly average (about a century).
pub const MAX_TRAILING_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum MonthlyAveragePolicy {
    /// Entries created within the last `days` days.
    TrailingDays { days: i64 },
    /// The `count` most recently created entries.
    RecentEntries { count: usize },
}

impl Default for MonthlyAveragePolicy {
    fn default() -> Self {
        MonthlyAveragePolicy::TrailingDays { days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    pub monthly_average: MonthlyAveragePolicy,
    pub expected_weeks: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            monthly_average: MonthlyAveragePolicy::default(),
            expected_weeks: 4,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given; otherwise the built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                let config = Self::from_toml_str(&contents)?;
                debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stats.expected_weeks == 0 {
            return Err(ConfigError::Invalid("stats.expected_weeks must be at least 1".to_string()));
        }
        match self.stats.monthly_average {
            MonthlyAveragePolicy::TrailingDays { days } if !(1..=MAX_TRAILING_DAYS).contains(&days) => {
                Err(ConfigError::Invalid(format!(
                    "stats.monthly_average.days must be between 1 and {MAX_TRAILING_DAYS}"
                )))
            }
            MonthlyAveragePolicy::RecentEntries { count } if count == 0 => Err(ConfigError::Invalid(
                "stats.monthly_average.count must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
