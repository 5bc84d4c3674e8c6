//! Service configuration types and loading
//!
//! Configuration is YAML loaded through figment with `DATASRV_`-prefixed
//! environment overrides. Connector and channel sections keep every field
//! that is not consumed here in an open, order-preserving parameter map;
//! adapters and the channel attribute bag read from those maps.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{DataSrvError, Result};
use crate::utils::parse_duration;

/// Open, order-preserving parameter map for adapter-specific fields
pub type Section = serde_json::Map<String, serde_json::Value>;

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduling tick interval in seconds, process-wide
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Worker pool size; defaults to available CPU parallelism
    pub workers: Option<usize>,

    /// Connector configurations, declaration order preserved
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,

    /// Channel configurations
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl AppConfig {
    /// Load from a YAML file with `DATASRV_` environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let config: AppConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("DATASRV_").split("__"))
            .extract()?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }
}

/// Connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector ID, the join key channel bindings reference
    pub id: String,

    /// Adapter type, resolved through the registry
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable name
    pub name: Option<String>,

    /// Global identity; defaults to `id`
    pub uuid: Option<String>,

    /// Resolved enabled flag
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long to wait before retrying a broken connection
    pub reconnect_interval: Option<String>,

    /// Adapter-specific fields (addresses, credentials, polling parameters)
    #[serde(flatten)]
    pub parameters: Section,
}

impl ConnectorConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            uuid: None,
            enabled: true,
            reconnect_interval: None,
            parameters: Section::new(),
        }
    }

    /// Adapter parameter as a string, if present
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn reconnect_interval(&self) -> Result<Option<Duration>> {
        self.reconnect_interval
            .as_deref()
            .map(parse_duration)
            .transpose()
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel ID, unique within the runtime
    pub id: String,

    /// Human-readable name, derived from `id` when absent
    pub name: Option<String>,

    /// Value type tag (`bool`, `int`, `float`, `string`)
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Global identity; defaults to `id`
    pub uuid: Option<String>,

    /// Resolved enabled flag
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Acquisition frequency as a duration string; a channel without a
    /// frequency is never scheduled
    #[serde(alias = "frequency", alias = "resolution")]
    pub freq: Option<String>,

    /// Where the live value comes from
    pub reader: Option<BindingConfig>,

    /// Where values are archived to; `writer` is accepted as an alias
    #[serde(alias = "writer")]
    pub logger: Option<BindingConfig>,

    /// Any additional configured field, reachable by name on the channel
    #[serde(flatten)]
    pub attributes: Section,
}

impl ChannelConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: None,
            uuid: None,
            enabled: true,
            freq: None,
            reader: None,
            logger: None,
            attributes: Section::new(),
        }
    }

    pub fn with_freq(mut self, freq: &str) -> Self {
        self.freq = Some(freq.to_string());
        self
    }

    pub fn with_reader(mut self, connector: &str) -> Self {
        self.reader = Some(BindingConfig::new(connector));
        self
    }

    pub fn with_logger(mut self, connector: &str) -> Self {
        self.logger = Some(BindingConfig::new(connector));
        self
    }

    pub fn freq(&self) -> Result<Option<Duration>> {
        self.freq.as_deref().map(parse_duration).transpose()
    }
}

/// A channel's reference to a connector: target id plus connector-specific
/// address fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Target connector id
    pub connector: String,

    /// Connector-specific address/column overrides
    #[serde(flatten)]
    pub address: Section,
}

impl BindingConfig {
    pub fn new(connector: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            address: Section::new(),
        }
    }

    pub fn with_address(mut self, key: &str, value: serde_json::Value) -> Self {
        self.address.insert(key.to_string(), value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.address.get(key).and_then(|v| v.as_str())
    }
}

/// Validate cross-references before any component is built: every binding
/// must name a configured connector, channel ids must be unique.
pub fn validate(config: &AppConfig) -> Result<()> {
    let connector_ids: Vec<&str> = config.connectors.iter().map(|c| c.id.as_str()).collect();

    let mut seen = Vec::with_capacity(config.channels.len());
    for channel in &config.channels {
        if seen.contains(&channel.id.as_str()) {
            return Err(DataSrvError::config(format!(
                "Duplicate channel id: '{}'",
                channel.id
            )));
        }
        seen.push(channel.id.as_str());

        for (role, binding) in [("reader", &channel.reader), ("logger", &channel.logger)] {
            if let Some(binding) = binding {
                if !connector_ids.contains(&binding.connector.as_str()) {
                    return Err(DataSrvError::config(format!(
                        "Channel '{}' {} references unknown connector '{}'",
                        channel.id, role, binding.connector
                    )));
                }
            }
        }
    }

    let mut connector_seen = Vec::with_capacity(connector_ids.len());
    for id in connector_ids {
        if connector_seen.contains(&id) {
            return Err(DataSrvError::config(format!(
                "Duplicate connector id: '{id}'"
            )));
        }
        connector_seen.push(id);
    }

    // uuid defaults to id and must be unique process-wide, across
    // connectors and channels
    let mut uuids: Vec<&str> = Vec::new();
    let resources = config
        .connectors
        .iter()
        .map(|c| c.uuid.as_deref().unwrap_or(&c.id))
        .chain(config.channels.iter().map(|c| c.uuid.as_deref().unwrap_or(&c.id)));
    for uuid in resources {
        if uuids.contains(&uuid) {
            return Err(DataSrvError::config(format!("Duplicate uuid: '{uuid}'")));
        }
        uuids.push(uuid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
interval: 30
connectors:
  - id: store
    type: virtual
    reconnect_interval: 30s
channels:
  - id: grid_power
    type: float
    freq: 60s
    reader: { connector: store, address: p_grid }
    writer: { connector: store }
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.interval, 30);
        assert_eq!(config.connectors.len(), 1);
        assert_eq!(
            config.connectors[0].reconnect_interval().unwrap(),
            Some(Duration::from_secs(30))
        );

        let channel = &config.channels[0];
        assert_eq!(channel.freq().unwrap(), Some(Duration::from_secs(60)));
        assert_eq!(
            channel.reader.as_ref().unwrap().get_str("address"),
            Some("p_grid")
        );
        // `writer` is accepted as an alias for `logger`
        assert_eq!(
            channel.logger.as_ref().unwrap().connector.as_str(),
            "store"
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_unknown_connector() {
        let mut config = AppConfig::default();
        config.connectors.push(ConnectorConfig::new("a", "virtual"));
        config
            .channels
            .push(ChannelConfig::new("ch").with_reader("missing"));

        let err = validate(&config).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("unknown connector"));
    }

    #[test]
    fn test_validate_duplicates() {
        let mut config = AppConfig::default();
        config.channels.push(ChannelConfig::new("ch"));
        config.channels.push(ChannelConfig::new("ch"));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_uuid_unique_process_wide() {
        let mut config = AppConfig::default();
        config.connectors.push(ConnectorConfig::new("store", "virtual"));
        // A channel's explicit uuid colliding with a connector's
        // id-derived uuid is rejected
        let mut channel = ChannelConfig::new("grid");
        channel.uuid = Some("store".to_string());
        config.channels.push(channel);

        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("uuid"));
    }

    #[test]
    fn test_frequency_aliases() {
        let yaml = r#"
channels:
  - id: a
    frequency: 5m
  - id: b
    resolution: 15s
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.channels[0].freq().unwrap(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            config.channels[1].freq().unwrap(),
            Some(Duration::from_secs(15))
        );
    }
}
