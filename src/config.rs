use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::{OfflineError, Result};

const DEFAULT_DATA_DIR: &str = "pos-offline-data";
const DEFAULT_PROBE_INTERVAL_SECS: &str = "15";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub api_url: String,
    pub api_key: String,
    pub probe_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir: PathBuf = try_load(&lookup, "POS_OFFLINE_DATA_DIR", DEFAULT_DATA_DIR)?;
        let probe_secs: u64 = try_load(
            &lookup,
            "POS_OFFLINE_PROBE_INTERVAL_SECS",
            DEFAULT_PROBE_INTERVAL_SECS,
        )?;
        if probe_secs == 0 {
            return Err(OfflineError::Config(
                "POS_OFFLINE_PROBE_INTERVAL_SECS must be at least 1".into(),
            ));
        }

        Ok(Self {
            log_dir: data_dir.join("logs"),
            data_dir,
            api_url: required(&lookup, "POS_OFFLINE_API_URL")?,
            api_key: required(&lookup, "POS_OFFLINE_API_KEY")?,
            probe_interval: Duration::from_secs(probe_secs),
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            OfflineError::Config(format!("invalid {key}: {e}"))
        })
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            warn!("Environment variable {key} not found");
            Err(OfflineError::Config(format!("{key} is required")))
        }
    }
}
