//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `relaysync.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use relaysync_adapter_mqtt::MqttConfig;
use relaysync_adapter_udp::UdpRadioConfig;
use relaysync_app::control_loop::LoopConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message bus settings.
    pub mqtt: MqttConfig,
    /// Radio transport settings.
    pub radio: RadioConfig,
    /// Database settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Control loop timing.
    #[serde(rename = "loop")]
    pub control: ControlConfig,
}

/// Which radio transport to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioKind {
    /// Datagrams on the local network.
    #[default]
    Udp,
    /// In-memory simulated node.
    Virtual,
}

impl FromStr for RadioKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "virtual" => Ok(Self::Virtual),
            other => Err(ConfigError::Validation(format!(
                "unknown radio kind {other:?}"
            ))),
        }
    }
}

/// Radio transport configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub kind: RadioKind,
    /// Whether the simulated node acknowledges schedules (virtual only).
    pub auto_ack: bool,
    /// Socket settings (udp only).
    #[serde(flatten)]
    pub udp: UdpRadioConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` connection URL or file path.
    pub database_url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Control loop timing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Tick period in milliseconds.
    pub tick_millis: u64,
    /// Time sync broadcast period in seconds.
    pub time_sync_secs: u64,
}

impl ControlConfig {
    #[must_use]
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick: Duration::from_millis(self.tick_millis),
            time_sync: Duration::from_secs(self.time_sync_secs),
        }
    }
}

impl Config {
    /// Load configuration from `relaysync.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("relaysync.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("RELAYSYNC_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(val) = lookup("RELAYSYNC_MQTT_PORT") {
            self.mqtt.broker_port = val.parse().map_err(|_| {
                ConfigError::Validation(format!("invalid RELAYSYNC_MQTT_PORT {val:?}"))
            })?;
        }
        if let Some(val) = lookup("RELAYSYNC_BASE_TOPIC") {
            self.mqtt.base_topic = val;
        }
        if let Some(val) = lookup("RELAYSYNC_RADIO") {
            self.radio.kind = val.parse()?;
        }
        if let Some(val) = lookup("RELAYSYNC_DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Some(val) = lookup("RELAYSYNC_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker port must be non-zero".to_string(),
            ));
        }
        if self.mqtt.base_topic.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "base topic must not be empty".to_string(),
            ));
        }
        if self.control.tick_millis == 0 {
            return Err(ConfigError::Validation(
                "tick period must be non-zero".to_string(),
            ));
        }
        if self.control.time_sync_secs == 0 {
            return Err(ConfigError::Validation(
                "time sync period must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            kind: RadioKind::Udp,
            auto_ack: true,
            udp: UdpRadioConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:relaysync.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "relaysyncd=info,relaysync=info".to_string(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            time_sync_secs: 60,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.mqtt.base_topic, "relaysync");
        assert_eq!(config.radio.kind, RadioKind::Udp);
        assert!(config.radio.auto_ack);
        assert_eq!(config.radio.udp.bind, "0.0.0.0:4210");
        assert_eq!(config.storage.database_url, "sqlite:relaysync.db?mode=rwc");
        assert_eq!(config.control.tick_millis, 50);
        assert_eq!(config.control.time_sync_secs, 60);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.radio.udp.hub_address, "02:00:00:00:00:01");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [mqtt]
            broker_host = 'broker.lan'
            broker_port = 1884
            base_topic = 'greenhouse'

            [radio]
            kind = 'virtual'
            auto_ack = false
            bind = '127.0.0.1:5000'
            broadcast = '192.168.1.255:5000'

            [storage]
            database_url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [loop]
            tick_millis = 20
            time_sync_secs = 30
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.broker_host, "broker.lan");
        assert_eq!(config.mqtt.broker_port, 1884);
        assert_eq!(config.mqtt.base_topic, "greenhouse");
        assert_eq!(config.radio.kind, RadioKind::Virtual);
        assert!(!config.radio.auto_ack);
        assert_eq!(config.radio.udp.bind, "127.0.0.1:5000");
        assert_eq!(config.radio.udp.broadcast, "192.168.1.255:5000");
        assert_eq!(config.storage.database_url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(
            config.control.loop_config(),
            LoopConfig {
                tick: Duration::from_millis(20),
                time_sync: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn should_reject_unknown_radio_kind_in_toml() {
        let result: Result<Config, _> = toml::from_str("[radio]\nkind = 'lora'");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_apply_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("RELAYSYNC_MQTT_HOST", "10.0.0.2"),
                ("RELAYSYNC_MQTT_PORT", "8883"),
                ("RELAYSYNC_BASE_TOPIC", "farm"),
                ("RELAYSYNC_RADIO", "Virtual"),
                ("RELAYSYNC_DATABASE_URL", "sqlite::memory:"),
                ("RELAYSYNC_LOG", "warn"),
            ]))
            .unwrap();
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.mqtt.base_topic, "farm");
        assert_eq!(config.radio.kind, RadioKind::Virtual);
        assert_eq!(config.storage.database_url, "sqlite::memory:");
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_prefer_rust_log_over_relaysync_log() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("RELAYSYNC_LOG", "warn"), ("RUST_LOG", "trace")]))
            .unwrap();
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_reject_malformed_overrides() {
        let mut config = Config::default();
        assert!(
            config
                .apply_overrides(env(&[("RELAYSYNC_MQTT_PORT", "many")]))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(env(&[("RELAYSYNC_RADIO", "lora")]))
                .is_err()
        );
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.mqtt.broker_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_tick() {
        let mut config = Config::default();
        config.control.tick_millis = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_base_topic() {
        let mut config = Config::default();
        config.mqtt.base_topic = "/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
