//! Daemon configuration from the environment.
//!
//! | Variable                           | Default            |
//! |------------------------------------|--------------------|
//! | `METERWATCH_API_ADDR`              | `127.0.0.1:7786`   |
//! | `METERWATCH_READING_INTERVAL_SECS` | `10`               |
//! | `METERWATCH_ALARM_CONFIG`          | built-in defaults  |
//!
//! `METERWATCH_ALARM_CONFIG` names a JSON file holding an
//! [`AlarmConfig`].

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::monitor::{AlarmConfig, DEFAULT_READING_INTERVAL};

pub const API_ADDR_VAR: &str = "METERWATCH_API_ADDR";
pub const READING_INTERVAL_VAR: &str = "METERWATCH_READING_INTERVAL_SECS";
pub const ALARM_CONFIG_VAR: &str = "METERWATCH_ALARM_CONFIG";

const DEFAULT_API_ADDR: &str = "127.0.0.1:7786";

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub api_addr: SocketAddr,
    pub reading_interval: Duration,
    pub alarm_config: AlarmConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_addr = lookup(API_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_owned())
            .parse()
            .map_err(|_| invalid(API_ADDR_VAR, &lookup))?;

        let reading_interval = match lookup(READING_INTERVAL_VAR) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(invalid(READING_INTERVAL_VAR, &lookup)),
            },
            None => DEFAULT_READING_INTERVAL,
        };

        let alarm_config = match lookup(ALARM_CONFIG_VAR) {
            Some(path) => load_alarm_config(path)?,
            None => AlarmConfig::default(),
        };

        Ok(Self {
            api_addr,
            reading_interval,
            alarm_config,
        })
    }
}

fn invalid(name: &'static str, lookup: &impl Fn(&str) -> Option<String>) -> Error {
    Error::InvalidEnv {
        name,
        value: lookup(name).unwrap_or_default(),
    }
}

/// Read and validate an alarm configuration file.
pub fn load_alarm_config(path: impl AsRef<Path>) -> Result<AlarmConfig> {
    let text = fs::read_to_string(path)?;
    let config: AlarmConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}
