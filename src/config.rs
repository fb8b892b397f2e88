//! Configuration for the emission monitoring agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the trained regression model artifact.
    pub model_path: PathBuf,

    /// Path to the append-only sensor CSV log.
    pub log_path: PathBuf,

    /// Predicted-emission level that arms the SMS alert.
    pub alert_threshold: f64,

    /// Lower display threshold that gates the mitigation suggestion.
    pub display_threshold: f64,

    /// Consecutive breaches of `alert_threshold` before an SMS fires.
    pub alert_run_length: u32,

    /// Consecutive breaches of a gas's regulatory limit before its
    /// mitigation advice is raised.
    pub gas_run_length: u32,

    /// Sampling period of the stream loop.
    #[serde(with = "duration_serde")]
    pub sample_period: Duration,

    /// Port for the HTTP query surface.
    pub http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emissionwatch");

        Self {
            model_path: data_dir.join("models").join("emissions_model.json"),
            log_path: data_dir.join("data").join("sensor_data.csv"),
            alert_threshold: 45.0,
            display_threshold: 40.0,
            alert_run_length: 5,
            gas_run_length: 5,
            sample_period: Duration::from_secs(5),
            http_port: 5002,
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults when no
    /// file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("emissionwatch")
            .join("config.json")
    }

    /// Ensure the model and log directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.model_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.alert_threshold, 45.0);
        assert_eq!(config.display_threshold, 40.0);
        assert_eq!(config.alert_run_length, 5);
        assert_eq!(config.sample_period, Duration::from_secs(5));
        assert!(config.display_threshold < config.alert_threshold);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sample_period, config.sample_period);
        assert_eq!(parsed.http_port, config.http_port);
    }
}
