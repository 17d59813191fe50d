use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
/// 50 Hz matches the 20 ms default step of the tick timer.
pub const DEFAULT_TICK_HZ: u32 = 50;
pub const DEFAULT_TELEMETRY_DECIMATION: u32 = 10;
const MAX_TICK_HZ: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Runtime settings of the simulator daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub host: String,
    pub port: u16,
    pub tick_hz: u32,
    /// Forward every n-th tick's telemetry to clients.
    pub telemetry_decimation: u32,
    /// Log every status change sent to the indicator.
    pub status_log: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tick_hz: DEFAULT_TICK_HZ,
            telemetry_decimation: DEFAULT_TELEMETRY_DECIMATION,
            status_log: true,
        }
    }
}

impl SimulatorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be positive"));
        }
        if self.tick_hz > MAX_TICK_HZ {
            return Err(ConfigError::Invalid("tick_hz must not exceed 1000"));
        }
        if self.telemetry_decimation == 0 {
            return Err(ConfigError::Invalid("telemetry_decimation must be positive"));
        }
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
