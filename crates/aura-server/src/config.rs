// ============================================
// File: crates/aura-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the Aura server, supporting TOML
//! files and environment variable overrides.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Per-section validation
//! - Conversion into the settings each component takes
//!
//! ## Configuration Sections
//! - `provisioning`: RPC listen address, challenge lifetime, signatures
//! - `transport`: MQTT broker session and the address handed to devices
//! - `orchestrator`: Poll interval, canary size, health thresholds
//! - `pki`: Root CA subject, validity, optional persistence paths
//! - `storage`: Firmware blob directory
//! - `fleet`: Bootstrap tokens registered at startup
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [provisioning]
//! listen_addr = "0.0.0.0:50051"
//! challenge_ttl_secs = 300
//!
//! [transport]
//! broker_host = "localhost"
//! broker_port = 1883
//! public_host = "mqtt.aura.example.com"
//! public_port = 8883
//!
//! [orchestrator]
//! poll_interval_secs = 30
//! canary_size = 5
//!
//! [orchestrator.health]
//! rollback_threshold = 0.8
//!
//! [pki]
//! root_cert_path = "/var/lib/aura/root.pem"
//! root_key_path = "/var/lib/aura/root.key"
//! ```
//!
//! ## Environment Overrides
//! - `MQTT_BROKER`: `host` or `host:port`
//! - `STORAGE_PATH`: firmware directory
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - Overrides are applied before validation
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use aura_core::crypto::CaSettings;
use aura_core::protocol::{TopicLayout, DEFAULT_TOPIC_PREFIX};
use aura_transport::MqttConfig;

use crate::error::{Result, ServerError};
use crate::orchestrator::{HealthPolicy, OrchestratorSettings};
use crate::services::ProvisioningSettings;

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Provisioning RPC section.
    pub provisioning: ProvisioningConfig,
    /// MQTT section.
    pub transport: TransportConfig,
    /// Release orchestrator section.
    pub orchestrator: OrchestratorConfig,
    /// Root CA section.
    pub pki: PkiConfig,
    /// Firmware storage section.
    pub storage: StorageConfig,
    /// Startup fleet section.
    pub fleet: FleetConfig,
    /// Logging section.
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file, applying environment
    /// overrides.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or is invalid.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.apply_env_overrides()?;
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string without environment overrides.
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or is invalid.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let p = &self.provisioning;
        ensure(p.challenge_ttl_secs > 0, "provisioning.challenge_ttl_secs", "must be greater than 0")?;
        ensure(p.sweep_interval_secs > 0, "provisioning.sweep_interval_secs", "must be greater than 0")?;

        self.transport.validate()?;

        let o = &self.orchestrator;
        ensure(o.poll_interval_secs > 0, "orchestrator.poll_interval_secs", "must be greater than 0")?;
        ensure(o.canary_size > 0, "orchestrator.canary_size", "must be greater than 0")?;
        ensure(
            o.firmware_base_url
                .as_deref()
                .map_or(true, |url| url.starts_with("http://") || url.starts_with("https://")),
            "orchestrator.firmware_base_url",
            "must be an http(s) URL",
        )?;
        o.health.validate()?;

        let k = &self.pki;
        ensure(
            !k.organization.trim().is_empty() && !k.common_name.trim().is_empty(),
            "pki.common_name",
            "root subject cannot be empty",
        )?;
        ensure(
            k.device_validity_days > 0 && k.device_validity_days <= k.root_validity_days,
            "pki.device_validity_days",
            "must be between 1 and the root validity",
        )?;
        ensure(
            k.root_cert_path.is_some() == k.root_key_path.is_some(),
            "pki.root_key_path",
            "root_cert_path and root_key_path must be set together",
        )?;

        ensure(!self.storage.firmware_dir.as_os_str().is_empty(), "storage.firmware_dir", "cannot be empty")?;

        let tokens = &self.fleet.bootstrap_tokens;
        ensure(tokens.iter().all(|t| !t.trim().is_empty()), "fleet.bootstrap_tokens", "tokens cannot be empty")?;
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        ensure(unique.len() == tokens.len(), "fleet.bootstrap_tokens", "tokens must be unique")
    }

    /// Applies `MQTT_BROKER` and `STORAGE_PATH` from the process
    /// environment.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if an override cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(broker) = lookup("MQTT_BROKER").filter(|v| !v.trim().is_empty()) {
            let (host, port) = parse_broker(&broker)?;
            self.transport.broker_host = host;
            if let Some(port) = port {
                self.transport.broker_port = port;
            }
        }

        if let Some(path) = lookup("STORAGE_PATH").filter(|v| !v.trim().is_empty()) {
            self.storage.firmware_dir = PathBuf::from(path);
        }

        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Settings for [`crate::services::ProvisioningService`].
    #[must_use]
    pub fn provisioning_settings(&self) -> ProvisioningSettings {
        ProvisioningSettings {
            challenge_ttl: self.provisioning.challenge_ttl(),
            require_signature: self.provisioning.require_signature,
            transport_host: self.transport.public_host.clone(),
            transport_port: self.transport.public_port,
        }
    }
}

/// Returns `ConfigInvalid` for `field` unless `ok`.
fn ensure(ok: bool, field: &str, reason: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(ServerError::config_invalid(field, reason))
    }
}

/// Splits `host[:port]`.
fn parse_broker(value: &str) -> Result<(String, Option<u16>)> {
    let value = value.trim();
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ServerError::config_invalid("MQTT_BROKER", "port must be 1-65535"))?;
            Ok((host.to_string(), Some(port)))
        }
        Some(_) => Err(ServerError::config_invalid("MQTT_BROKER", "host cannot be empty")),
        None => Ok((value.to_string(), None)),
    }
}

// ============================================
// Sections
// ============================================

/// Provisioning RPC section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// RPC listen address.
    pub listen_addr: SocketAddr,
    /// Challenge lifetime in seconds.
    pub challenge_ttl_secs: u64,
    /// Require an Ed25519 signature over the challenge.
    pub require_signature: bool,
    /// Expired-challenge sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl ProvisioningConfig {
    /// Challenge lifetime.
    #[must_use]
    pub const fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    /// Period of the expired-challenge sweep.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 50051)),
            challenge_ttl_secs: 300,
            require_signature: false,
            sweep_interval_secs: 60,
        }
    }
}

/// MQTT section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Broker host the server connects to.
    pub broker_host: String,
    /// Broker port the server connects to.
    pub broker_port: u16,
    /// MQTT client id.
    pub client_id: String,
    /// Broker username.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// MQTT keep-alive in seconds.
    pub keep_alive_secs: u64,
    /// First reconnect delay in seconds.
    pub reconnect_initial_secs: u64,
    /// Reconnect delay cap in seconds.
    pub reconnect_max_secs: u64,
    /// Connect to the broker over TLS.
    pub tls: bool,
    /// Outgoing request queue capacity.
    pub channel_capacity: usize,
    /// Milliseconds a publish may wait for room in the queue.
    pub publish_timeout_ms: u64,
    /// Prefix of every device topic.
    pub topic_prefix: String,
    /// Broker host handed to enrolled devices.
    pub public_host: String,
    /// Broker port handed to enrolled devices.
    pub public_port: u16,
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        self.mqtt_config()
            .validate()
            .map_err(|e| ServerError::config_invalid("transport", e.to_string()))?;

        ensure(
            self.username.is_some() == self.password.is_some(),
            "transport.username",
            "username and password must be set together",
        )?;
        let prefix = self.topic_prefix.trim_matches('/');
        ensure(
            !prefix.is_empty() && !prefix.contains(['+', '#']),
            "transport.topic_prefix",
            "must be non-empty and free of wildcards",
        )?;
        ensure(!self.public_host.trim().is_empty(), "transport.public_host", "cannot be empty")?;
        ensure(self.public_port != 0, "transport.public_port", "cannot be 0")
    }

    /// Builds the broker session configuration.
    #[must_use]
    pub fn mqtt_config(&self) -> MqttConfig {
        let mut config = MqttConfig::new(&self.broker_host, self.broker_port)
            .with_client_id(&self.client_id)
            .with_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .with_reconnect_backoff(
                Duration::from_secs(self.reconnect_initial_secs),
                Duration::from_secs(self.reconnect_max_secs),
            )
            .with_tls(self.tls)
            .with_request_queue(
                self.channel_capacity,
                Duration::from_millis(self.publish_timeout_ms),
            );

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            config = config.with_credentials(user, pass);
        }
        config
    }

    /// Topic layout for the configured prefix.
    #[must_use]
    pub fn topic_layout(&self) -> TopicLayout {
        TopicLayout::new(self.topic_prefix.trim_matches('/'))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: aura_transport::traits::DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            reconnect_initial_secs: 5,
            reconnect_max_secs: 60,
            tls: false,
            channel_capacity: 64,
            publish_timeout_ms: 10_000,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            public_host: "mqtt.aura.example.com".to_string(),
            public_port: 8883,
        }
    }
}

/// Release orchestrator section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Seconds between orchestrator ticks.
    pub poll_interval_secs: u64,
    /// Devices per canary wave.
    pub canary_size: usize,
    /// Base URL devices download firmware from; the stored location is
    /// used when unset.
    pub firmware_base_url: Option<String>,
    /// Rollback/promotion thresholds.
    pub health: HealthPolicy,
}

impl OrchestratorConfig {
    /// Runtime settings for the orchestrator.
    #[must_use]
    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            canary_size: self.canary_size,
            firmware_base_url: self.firmware_base_url.clone(),
            policy: self.health,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            canary_size: 5,
            firmware_base_url: None,
            health: HealthPolicy::default(),
        }
    }
}

/// Root CA section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Subject organization of issued certificates.
    pub organization: String,
    /// Root certificate common name.
    pub common_name: String,
    /// Root certificate lifetime in days.
    pub root_validity_days: u32,
    /// Device certificate lifetime in days.
    pub device_validity_days: u32,
    /// Persisted root certificate (PEM). Ephemeral root when unset.
    pub root_cert_path: Option<PathBuf>,
    /// Persisted root private key (PEM).
    pub root_key_path: Option<PathBuf>,
}

impl PkiConfig {
    /// CA settings for this section.
    #[must_use]
    pub fn ca_settings(&self) -> CaSettings {
        CaSettings {
            organization: self.organization.clone(),
            common_name: self.common_name.clone(),
            root_validity_days: self.root_validity_days,
            device_validity_days: self.device_validity_days,
        }
    }

    /// Returns `(cert, key)` paths when the root is persistent.
    #[must_use]
    pub fn root_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.root_cert_path, &self.root_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

impl Default for PkiConfig {
    fn default() -> Self {
        let ca = CaSettings::default();
        Self {
            organization: ca.organization,
            common_name: ca.common_name,
            root_validity_days: ca.root_validity_days,
            device_validity_days: ca.device_validity_days,
            root_cert_path: None,
            root_key_path: None,
        }
    }
}

/// Firmware storage section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory firmware images are written to.
    pub firmware_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            firmware_dir: PathBuf::from("./data/firmware"),
        }
    }
}

/// Devices registered at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// One device is pre-registered per token.
    pub bootstrap_tokens: Vec<String>,
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provisioning.listen_addr.port(), 50051);
        assert_eq!(config.provisioning.challenge_ttl(), Duration::from_secs(300));
        assert_eq!(config.transport.mqtt_config().broker_addr(), "localhost:1883");
        assert_eq!(config.transport.client_id, "aura-ota-orchestrator");
        assert_eq!(config.orchestrator.settings().canary_size, 5);
        assert_eq!(config.pki.ca_settings(), CaSettings::default());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(ServerConfig::from_str("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [provisioning]
            listen_addr = "127.0.0.1:9000"
            challenge_ttl_secs = 120
            require_signature = true

            [transport]
            broker_host = "broker.internal"
            broker_port = 8883
            tls = true
            username = "orchestrator"
            password = "secret"
            topic_prefix = "fleet"
            channel_capacity = 512
            publish_timeout_ms = 2500

            [orchestrator]
            poll_interval_secs = 10
            canary_size = 3
            firmware_base_url = "https://cdn.example.com/fw"

            [orchestrator.health]
            rollback_threshold = 0.9

            [pki]
            root_cert_path = "/tmp/root.pem"
            root_key_path = "/tmp/root.key"

            [fleet]
            bootstrap_tokens = ["a", "b"]

            [logging]
            level = "debug"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert!(config.provisioning.require_signature);
        let mqtt = config.transport.mqtt_config();
        assert!(mqtt.tls);
        assert_eq!(mqtt.credentials, Some(("orchestrator".into(), "secret".into())));
        assert_eq!(mqtt.channel_capacity, 512);
        assert_eq!(mqtt.publish_timeout, Duration::from_millis(2500));
        assert_eq!(config.transport.topic_layout().prefix(), "fleet");

        let settings = config.orchestrator.settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
        assert!((settings.policy.rollback_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(settings.policy.min_observed_for_rollback, 5);

        assert!(config.pki.root_paths().is_some());
        assert_eq!(config.fleet.bootstrap_tokens.len(), 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[provisioning]\nchallenge_ttl_secs = 0",
            "[transport]\nbroker_port = 0",
            "[transport]\nchannel_capacity = 0",
            "[transport]\nusername = \"only-user\"",
            "[transport]\ntopic_prefix = \"a/+\"",
            "[orchestrator]\ncanary_size = 0",
            "[orchestrator]\nfirmware_base_url = \"ftp://x\"",
            "[orchestrator.health]\nrollback_threshold = 2.0",
            "[pki]\nroot_cert_path = \"/tmp/x.pem\"",
            "[pki]\ndevice_validity_days = 4000",
            "[fleet]\nbootstrap_tokens = [\"a\", \"a\"]",
        ];

        for case in cases {
            let err = ServerConfig::from_str(case).unwrap_err();
            assert!(err.is_config_error(), "{case} -> {err}");
        }
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            [("MQTT_BROKER", "broker.prod:2883"), ("STORAGE_PATH", "/srv/fw")].into();
        let mut config = ServerConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.transport.broker_host, "broker.prod");
        assert_eq!(config.transport.broker_port, 2883);
        assert_eq!(config.storage.firmware_dir, PathBuf::from("/srv/fw"));

        let mut host_only = ServerConfig::default();
        host_only
            .apply_overrides(|k| (k == "MQTT_BROKER").then(|| "mosquitto".to_string()))
            .unwrap();
        assert_eq!(host_only.transport.broker_host, "mosquitto");
        assert_eq!(host_only.transport.broker_port, 1883);

        let mut bad = ServerConfig::default();
        assert!(bad
            .apply_overrides(|k| (k == "MQTT_BROKER").then(|| "host:notaport".to_string()))
            .is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = ServerConfig::default();
        let parsed = ServerConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }
}
