//! Channel data model and state machine
//!
//! A channel is a named, typed, time-stamped value slot with an associated
//! lifecycle state, a reader binding and a logger (writer) binding. Channels
//! are mutable value cells shared between the orchestrator and its tasks;
//! they reference connectors by id only and never control their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BindingConfig, ChannelConfig, Section};
use crate::core::resource::Resource;
use crate::core::value::{Value, ValueKind};
use crate::error::Result;

// ============================================================================
// Channel state
// ============================================================================

/// Lifecycle state of a channel's value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChannelState {
    /// Channel is configured but disabled
    Disabled,
    /// Owning connector is being torn down
    Disconnecting,
    /// Owning connector is not connected
    #[default]
    Disconnected,
    /// Owning connector is being opened
    Connecting,
    /// Owning connector is open, no data received yet
    Connected,
    /// Holds usable data; the only state considered valid
    Valid,
    /// Requested but absent from the last read result
    NotAvailable,
    /// Owning connector failed for an unclassified reason
    UnknownError,
    /// Addressing or conversion failure for this channel
    ArgumentSyntaxError,
}

impl ChannelState {
    /// True for the only state that carries usable data
    pub fn is_valid(&self) -> bool {
        matches!(self, ChannelState::Valid)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Disabled => write!(f, "DISABLED"),
            ChannelState::Disconnecting => write!(f, "DISCONNECTING"),
            ChannelState::Disconnected => write!(f, "DISCONNECTED"),
            ChannelState::Connecting => write!(f, "CONNECTING"),
            ChannelState::Connected => write!(f, "CONNECTED"),
            ChannelState::Valid => write!(f, "VALID"),
            ChannelState::NotAvailable => write!(f, "NOT_AVAILABLE"),
            ChannelState::UnknownError => write!(f, "UNKNOWN_ERROR"),
            ChannelState::ArgumentSyntaxError => write!(f, "ARGUMENT_SYNTAX_ERROR"),
        }
    }
}

// ============================================================================
// Connector binding
// ============================================================================

/// A channel's reference to a connector: target id, connector-specific
/// address overrides, and the timestamp of the last successful use.
#[derive(Debug)]
pub struct Binding {
    connector: String,
    address: Section,
    timestamp: RwLock<Option<DateTime<Utc>>>,
}

impl Binding {
    pub fn new(config: &BindingConfig) -> Self {
        Self {
            connector: config.connector.clone(),
            address: config.address.clone(),
            timestamp: RwLock::new(None),
        }
    }

    /// Target connector id (lookup key, non-owning)
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Connector-specific address field, by name
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.address.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn address(&self) -> &Section {
        &self.address
    }

    /// Last successful use of this binding
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        *self.timestamp.read()
    }

    /// Record a successful use
    pub fn touch(&self, timestamp: DateTime<Utc>) {
        *self.timestamp.write() = Some(timestamp);
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Volatile channel fields, mutated under one lock so value, state and
/// timestamp always change together
#[derive(Debug)]
struct Record {
    value: Option<Value>,
    state: ChannelState,
    timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    resource: Resource,
    converter: ValueKind,
    freq: Option<Duration>,
    enabled: bool,
    reader: Option<Binding>,
    logger: Option<Binding>,
    record: RwLock<Record>,
}

/// Cheaply cloneable channel handle; clones share the same value cell
#[derive(Debug, Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Build a channel from its configuration section
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let resource = Resource::new(
            &config.id,
            config.name.as_deref(),
            config.kind.as_deref(),
            config.uuid.as_deref(),
            config.attributes.clone(),
        )?;
        let converter = ValueKind::parse(config.kind.as_deref().unwrap_or_default())?;
        let freq = config.freq()?;
        let state = if config.enabled {
            ChannelState::Disconnected
        } else {
            ChannelState::Disabled
        };

        debug!(
            "Configured channel '{}' (type {:?}, freq {:?})",
            resource.id(),
            converter,
            freq
        );

        Ok(Self {
            inner: Arc::new(Inner {
                resource,
                converter,
                freq,
                enabled: config.enabled,
                reader: config.reader.as_ref().map(Binding::new),
                logger: config.logger.as_ref().map(Binding::new),
                record: RwLock::new(Record {
                    value: None,
                    state,
                    timestamp: Utc::now(),
                }),
            }),
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    pub fn id(&self) -> &str {
        self.inner.resource.id()
    }

    pub fn uuid(&self) -> &str {
        self.inner.resource.uuid()
    }

    pub fn name(&self) -> &str {
        self.inner.resource.name()
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled
    }

    pub fn freq(&self) -> Option<Duration> {
        self.inner.freq
    }

    pub fn converter(&self) -> ValueKind {
        self.inner.converter
    }

    pub fn reader(&self) -> Option<&Binding> {
        self.inner.reader.as_ref()
    }

    pub fn logger(&self) -> Option<&Binding> {
        self.inner.logger.as_ref()
    }

    // ------------------------------------------------------------------
    // Volatile record
    // ------------------------------------------------------------------

    pub fn value(&self) -> Option<Value> {
        self.inner.record.read().value.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.inner.record.read().state
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.inner.record.read().timestamp
    }

    pub fn is_valid(&self) -> bool {
        self.inner.record.read().state.is_valid()
    }

    /// Store a value "now". Converts through the channel's value kind, sets
    /// the state to VALID and advances the timestamp, all under one lock.
    pub fn set_value(&self, value: Value) -> Result<()> {
        let converted = self.inner.converter.convert(value)?;
        let mut record = self.inner.record.write();
        let now = Utc::now();
        record.timestamp = now.max(record.timestamp);
        record.value = Some(converted);
        record.state = ChannelState::Valid;
        Ok(())
    }

    /// Store a value with the sample's own timestamp (read-result path).
    /// The sample timestamp is authoritative: a read over an explicit
    /// historical window may move the timestamp backwards.
    pub fn set_value_at(&self, value: Value, timestamp: DateTime<Utc>) -> Result<()> {
        let converted = self.inner.converter.convert(value)?;
        let mut record = self.inner.record.write();
        record.timestamp = timestamp;
        record.value = Some(converted);
        record.state = ChannelState::Valid;
        Ok(())
    }

    /// Transition the state. Any non-valid state clears the value.
    pub fn set_state(&self, state: ChannelState) {
        let mut record = self.inner.record.write();
        if !state.is_valid() {
            record.value = None;
        }
        record.state = state;
        record.timestamp = Utc::now().max(record.timestamp);
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Whether the scheduler should read this channel now: it must have a
    /// configured frequency and a reader binding, and either never have been
    /// read or have passed its next scheduled instant.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let (Some(freq), Some(reader)) = (self.inner.freq, self.reader()) else {
            return false;
        };
        if !self.inner.enabled {
            return false;
        }
        match reader.timestamp() {
            None => true,
            Some(last) => match chrono::Duration::from_std(freq) {
                Ok(freq) => last + freq <= now,
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;

    fn channel(config: ChannelConfig) -> Channel {
        Channel::from_config(&config).unwrap()
    }

    #[test]
    fn test_set_value_marks_valid() {
        let ch = channel(ChannelConfig::new("power"));
        assert_eq!(ch.state(), ChannelState::Disconnected);

        let before = ch.timestamp();
        ch.set_value(Value::from(42.0)).unwrap();
        assert_eq!(ch.state(), ChannelState::Valid);
        assert_eq!(ch.value(), Some(Value::Float(42.0)));
        assert!(ch.timestamp() >= before);

        let first = ch.timestamp();
        ch.set_value(Value::from(43.0)).unwrap();
        assert!(ch.timestamp() >= first);
    }

    #[test]
    fn test_non_valid_state_clears_value() {
        let ch = channel(ChannelConfig::new("power"));
        ch.set_value(Value::from(1.0)).unwrap();
        assert!(ch.value().is_some());

        ch.set_state(ChannelState::UnknownError);
        assert_eq!(ch.state(), ChannelState::UnknownError);
        assert!(ch.value().is_none());
    }

    #[test]
    fn test_converter_applied() {
        let mut config = ChannelConfig::new("counter");
        config.kind = Some("int".to_string());
        let ch = channel(config);

        ch.set_value(Value::from("7")).unwrap();
        assert_eq!(ch.value(), Some(Value::Integer(7)));
        assert!(ch.set_value(Value::from("x")).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let ch = channel(ChannelConfig::new("power"));
        let other = ch.clone();
        ch.set_value(Value::from(5.0)).unwrap();
        assert_eq!(other.value(), Some(Value::Float(5.0)));
    }

    #[test]
    fn test_due_scheduling() {
        let config = ChannelConfig::new("power")
            .with_freq("60s")
            .with_reader("store");
        let ch = channel(config);
        let now = Utc::now();

        // Never read: due on the very next tick
        assert!(ch.is_due(now));

        ch.reader().unwrap().touch(now);
        assert!(!ch.is_due(now + chrono::Duration::seconds(30)));
        assert!(ch.is_due(now + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_freq_less_never_due() {
        let ch = channel(ChannelConfig::new("power").with_reader("store"));
        assert!(!ch.is_due(Utc::now()));
    }

    #[test]
    fn test_reader_less_never_due() {
        let ch = channel(ChannelConfig::new("power").with_freq("60s"));
        assert!(!ch.is_due(Utc::now()));
    }

    #[test]
    fn test_binding_fields() {
        let binding = Binding::new(
            &BindingConfig::new("store").with_address("address", serde_json::json!("p_grid")),
        );
        assert_eq!(binding.connector(), "store");
        assert_eq!(binding.get_str("address"), Some("p_grid"));
        assert!(binding.timestamp().is_none());

        let now = Utc::now();
        binding.touch(now);
        assert_eq!(binding.timestamp(), Some(now));
    }
}
