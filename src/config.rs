use crate::regression::RegressionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where results are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file
    ///
    /// Default: `benchtrend.db` in the working directory
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("benchtrend.db"),
        }
    }
}

/// Settings loaded from a TOML file; every field is optional
///
/// # Example
/// ```no_run
/// use benchtrend::config::Settings;
///
/// let settings = Settings::from_toml("benchtrend.toml")?;
/// println!("window: {}", settings.regression.window_size);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub regression: RegressionConfig,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or holds
    /// out-of-range regression thresholds.
    ///
    /// # Example TOML
    /// ```toml
    /// [storage]
    /// path = "/var/lib/benchtrend/results.db"
    ///
    /// [regression]
    /// window_size = 50
    /// threshold_z = 4.0
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.as_ref().display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).context("Failed to parse TOML settings")?;
        settings
            .regression
            .validate()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(settings)
    }
}
