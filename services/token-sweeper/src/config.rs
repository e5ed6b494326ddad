//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file defaults. The
//! sweeper only needs to know where the token file lives and, when
//! running as a daemon, how often to sweep.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Token file location
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Sweep cadence settings
#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    /// Run the sweep every this many seconds instead of once. Zero or
    /// absent means run once and exit.
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 0 }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        if config.store.path.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "store.path must not be empty".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-sweeper.toml")
    }
}
