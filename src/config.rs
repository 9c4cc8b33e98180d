//! Producer and collector configuration.
//!
//! Both configs load from JSON files; every field has a default so a file only
//! needs to carry what differs. Command-line flags are applied on top by the
//! binary and `validate()` runs last.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::devices::AlertPattern;
use crate::error::{Result, VitalinkError};
use crate::producer::alerts::AlertThresholds;
use crate::producer::fall::DEFAULT_FALL_THRESHOLD;

pub const DEFAULT_PORT: u16 = 12345;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| VitalinkError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| VitalinkError::Config(format!("invalid {}: {}", path.display(), e)))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// `host:port` of the collector.
    pub collector_addr: String,
    /// Delay between the end of one cycle and the start of the next.
    pub period_ms: u64,
    pub sensor_timeout_ms: u64,
    /// Upper bound on one actuator pattern.
    pub actuator_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub fall_threshold: f64,
    pub thresholds: AlertThresholds,
    /// Stop after this many cycles; run forever when unset.
    pub max_cycles: Option<u64>,
    /// GPIO pin of the buzzer; alerts are only logged when unset.
    pub buzzer_pin: Option<u32>,
    /// Seed for the simulated sensors.
    pub simulation_seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            collector_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            period_ms: 1_000,
            sensor_timeout_ms: 500,
            actuator_timeout_ms: 2_500,
            connect_timeout_ms: 5_000,
            fall_threshold: DEFAULT_FALL_THRESHOLD,
            thresholds: AlertThresholds::default(),
            max_cycles: None,
            buzzer_pin: None,
            simulation_seed: None,
        }
    }
}

impl ProducerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collector_addr.trim().is_empty() {
            return Err(VitalinkError::Config("collector_addr is empty".into()));
        }
        if self.sensor_timeout_ms == 0 {
            return Err(VitalinkError::Config("sensor_timeout_ms must be > 0".into()));
        }
        if self.actuator_timeout() < AlertPattern::LONG_SINGLE.total_duration() {
            return Err(VitalinkError::Config(format!(
                "actuator_timeout_ms ({}) is shorter than the longest alert pattern",
                self.actuator_timeout_ms
            )));
        }
        if !self.fall_threshold.is_finite() || self.fall_threshold <= 0.0 {
            return Err(VitalinkError::Config(format!(
                "fall_threshold must be a positive number, got {}",
                self.fall_threshold
            )));
        }
        if self.thresholds.heart_rate_low > self.thresholds.heart_rate_high {
            return Err(VitalinkError::Config(format!(
                "heart_rate_low ({}) above heart_rate_high ({})",
                self.thresholds.heart_rate_low, self.thresholds.heart_rate_high
            )));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Where the real-time mirror and keyed history live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON files under a local directory.
    Local { dir: PathBuf },
    /// Realtime-database REST endpoint.
    Rest {
        base_url: String,
        #[serde(default)]
        auth_token: Option<String>,
        #[serde(default = "default_rest_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_rest_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local {
            dir: PathBuf::from("vitalink_store"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub listen_addr: String,
    /// Durable CSV log.
    pub csv_path: PathBuf,
    pub store: StoreConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            csv_path: PathBuf::from("sensor_data.csv"),
            store: StoreConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(VitalinkError::Config("listen_addr is empty".into()));
        }
        if self.csv_path.as_os_str().is_empty() {
            return Err(VitalinkError::Config("csv_path is empty".into()));
        }
        if let StoreConfig::Rest { base_url, timeout_ms, .. } = &self.store {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(VitalinkError::Config(format!(
                    "store base_url must be http(s), got {:?}",
                    base_url
                )));
            }
            if *timeout_ms == 0 {
                return Err(VitalinkError::Config("store timeout_ms must be > 0".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        ProducerConfig::default().validate().unwrap();
        CollectorConfig::default().validate().unwrap();
        assert_eq!(ProducerConfig::default().period(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"collector_addr": "10.0.0.5:9000", "thresholds": {{"heart_rate_low": 50, "heart_rate_high": 120}}}}"#
        )
        .unwrap();

        let config = ProducerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.collector_addr, "10.0.0.5:9000");
        assert_eq!(config.thresholds.heart_rate_low, 50);
        assert_eq!(config.period_ms, 1_000);
        assert_eq!(config.fall_threshold, 2.5);
    }

    #[test]
    fn test_rest_store_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"store": {{"kind": "rest", "base_url": "https://vitals.example.com"}}}}"#
        )
        .unwrap();

        let config = CollectorConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Rest {
                base_url: "https://vitals.example.com".into(),
                auth_token: None,
                timeout_ms: 5_000,
            }
        );
        assert_eq!(config.csv_path, PathBuf::from("sensor_data.csv"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = ProducerConfig {
            actuator_timeout_ms: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VitalinkError::Config(_))));

        let config = ProducerConfig {
            thresholds: AlertThresholds {
                heart_rate_low: 120,
                heart_rate_high: 100,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CollectorConfig {
            store: StoreConfig::Rest {
                base_url: "ftp://x".into(),
                auth_token: None,
                timeout_ms: 10,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            ProducerConfig::from_file("/definitely/not/here.json"),
            Err(VitalinkError::Config(_))
        ));
    }
}
