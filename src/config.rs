//! Application defaults and the persisted API key file

use crate::Result;
use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Geolocation service, queried through the proxy being checked
pub const DEFAULT_GEO_API_URL: &str = "http://ip-api.com/json/";

/// Fraud scoring service, queried directly as `{base}/{api_key}/{ip}?strictness=1`
pub const DEFAULT_FRAUD_API_URL: &str = "https://ipqualityscore.com/api/json/ip";

/// Default number of concurrent probes
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default timeout for each network call in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Fraud score at or above which a proxy counts as high risk
pub const HIGH_RISK_THRESHOLD: u8 = 75;

/// Fraud score at or above which a proxy counts as medium risk
pub const MEDIUM_RISK_THRESHOLD: u8 = 30;

/// Template used for text exports when none is supplied
pub const DEFAULT_TEMPLATE: &str = "{Proxy IP}:{Port}:{Username}:{Password}";

/// Default location of the persisted config file
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
}

/// Settings remembered between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: String,
}

impl AppConfig {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| {
                warn!("Cannot read config file {:?}: {}", path, e);
                e
            })
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = serde_json::from_str(&content)
            .map_err(|e| {
                warn!("Config file {:?} is not valid JSON: {}", path, e);
                e
            })
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    /// Overwrite the config file with these settings
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string(self)?;
        fs::write(path, content)
            .map_err(|e| {
                warn!("Cannot write config file {:?}: {}", path, e);
                e
            })
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Pick the key given on the command line, or the stored one
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> String {
        override_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.api_key.clone())
    }
}
