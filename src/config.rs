//! Run configuration.
//!
//! Every field has a default matching the production deployment, so a config
//! file is optional. A TOML file only needs the keys it overrides:
//!
//! ```toml
//! snapshot_path = "/srv/psd/latest.parquet"
//! parallel_fetch = true
//! tracked_codes = ["0813100", "2222000"]
//! tracked_descriptions = ["Meal, Soybean", "Oilseed, Soybean"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use serde::Deserialize;

use crate::error::PipelineError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.fas.usda.gov/api/psd";
pub const DEFAULT_API_KEY_ENV: &str = "USDA_API_KEY";
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/latest.parquet";

/// Oilseed complex: meals, oils and seeds for rapeseed, soybean, sunflowerseed and palm.
pub const DEFAULT_TRACKED_CODES: [&str; 14] = [
    "0813600", "0813100", "0813101", "0813500", "4239100", "4232000", "4232001", "4236000",
    "2226000", "2222000", "2222001", "2224000", "4243000", "4244000",
];

pub const DEFAULT_TRACKED_DESCRIPTIONS: [&str; 14] = [
    "Meal, Rapeseed",
    "Meal, Soybean",
    "Meal, Soybean (Local)",
    "Meal, Sunflowerseed",
    "Oil, Palm",
    "Oil, Palm Kernel",
    "Oil, Rapeseed",
    "Oil, Soybean",
    "Oil, Soybean (Local)",
    "Oil, Sunflowerseed",
    "Oilseed, Rapeseed",
    "Oilseed, Soybean",
    "Oilseed, Soybean (Local)",
    "Oilseed, Sunflowerseed",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_url: String,
    /// Environment variable holding the API key (never the key itself).
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Length of the trailing market-year window, ending at the current year.
    pub window_years: i32,
    pub tracked_codes: Vec<String>,
    pub tracked_descriptions: Vec<String>,
    pub snapshot_path: PathBuf,
    /// Write the snapshot after collapsing duplicate keys.
    pub aggregate: bool,
    /// Fan the per-(commodity, year) requests out over the rayon pool.
    pub parallel_fetch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 30,
            window_years: 5,
            tracked_codes: DEFAULT_TRACKED_CODES.iter().map(|s| s.to_string()).collect(),
            tracked_descriptions: DEFAULT_TRACKED_DESCRIPTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            aggregate: true,
            parallel_fetch: false,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let config = match path {
            None => Config::default(),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Config(format!("failed to read '{}': {e}", path.display()))
                })?;
                Self::from_toml(&text)?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, PipelineError> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window_years < 1 {
            return Err(PipelineError::Config("window_years must be at least 1".to_string()));
        }
        if self.tracked_codes.is_empty() {
            return Err(PipelineError::Config("tracked_codes is empty".to_string()));
        }
        if self.tracked_descriptions.is_empty() {
            return Err(PipelineError::Config("tracked_descriptions is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn window(&self) -> YearWindow {
        YearWindow::ending_at(chrono::Local::now().year(), self.window_years)
    }
}

/// Trailing market-year window: `min_year ..= current_year`.
///
/// `min_year = current_year + 1 - len`, so the window covers `len` years and the
/// snapshot keeps everything at or after `min_year` (next-year projections included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub current_year: i32,
    pub min_year: i32,
}

impl YearWindow {
    pub fn ending_at(current_year: i32, len: i32) -> Self {
        Self {
            current_year,
            min_year: current_year + 1 - len,
        }
    }

    /// Years requested from the series endpoint.
    pub fn fetch_years(&self) -> impl Iterator<Item = i32> {
        self.min_year..=self.current_year
    }

    pub fn contains(&self, market_year: i32) -> bool {
        market_year >= self.min_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_covers_five_years() {
        let window = YearWindow::ending_at(2026, 5);
        assert_eq!(window.min_year, 2022);
        assert_eq!(window.fetch_years().collect::<Vec<_>>(), vec![2022, 2023, 2024, 2025, 2026]);
        assert!(window.contains(2027));
        assert!(!window.contains(2021));
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let config = Config::from_toml(
            r#"
            snapshot_path = "/tmp/psd.parquet"
            parallel_fetch = true
            "#,
        )
        .unwrap();
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/psd.parquet"));
        assert!(config.parallel_fetch);
        assert_eq!(config.tracked_codes.len(), 14);
        assert_eq!(config.tracked_descriptions.len(), 14);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(Config::from_toml("snapshot = 'x'").is_err());
        let config = Config {
            window_years: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
