//! Connector type registry
//!
//! Maps a configured `type` tag (plus aliases) to a factory building the
//! adapter instance. Adding a new adapter kind touches only the registry
//! setup, never the orchestrator. Registrations are kept in declaration
//! order so alias prefix resolution is deterministic.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::ConnectorConfig;
use crate::connector::Connector;
use crate::error::{DataSrvError, Result};

/// Factory building an adapter instance from its configuration section
pub type ConnectorFactory = Arc<dyn Fn(&ConnectorConfig) -> Result<Box<dyn Connector>> + Send + Sync>;

/// One registered connector type: tag, alias tags and factory
#[derive(Clone)]
pub struct Registration {
    tag: String,
    aliases: Vec<String>,
    factory: ConnectorFactory,
}

impl Registration {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Whether this registration resolves the configured type string:
    /// literal tag or alias first, then tag/alias as a prefix of the
    /// configured string.
    fn matches(&self, normalized: &str, prefix: bool) -> bool {
        if !prefix {
            return self.tag == normalized || self.aliases.iter().any(|a| a == normalized);
        }
        normalized.starts_with(&self.tag)
            || self.aliases.iter().any(|a| normalized.starts_with(a.as_str()))
    }
}

/// Ordered catalogue of connector types
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<Registration>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector type. A duplicate tag fails unless `replace`.
    pub fn register(
        &self,
        tag: &str,
        aliases: &[&str],
        factory: ConnectorFactory,
        replace: bool,
    ) -> Result<()> {
        let tag = tag.trim().to_lowercase();
        let registration = Registration {
            tag: tag.clone(),
            aliases: aliases.iter().map(|a| a.trim().to_lowercase()).collect(),
            factory,
        };

        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|r| r.tag == tag) {
            if !replace {
                return Err(DataSrvError::config(format!(
                    "Connector type '{tag}' is already registered"
                )));
            }
            *existing = registration;
        } else {
            entries.push(registration);
        }
        Ok(())
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.resolve(tag).is_some()
    }

    /// Registered type tags in declaration order
    pub fn registered_types(&self) -> Vec<String> {
        self.entries.read().iter().map(|r| r.tag.clone()).collect()
    }

    /// Resolve a configured type string, case-insensitive: literal tag,
    /// literal alias, then prefix match in declaration order.
    pub fn resolve(&self, tag: &str) -> Option<Registration> {
        let normalized = tag.trim().to_lowercase();
        let entries = self.entries.read();
        entries
            .iter()
            .find(|r| r.matches(&normalized, false))
            .or_else(|| entries.iter().find(|r| r.matches(&normalized, true)))
            .cloned()
    }

    /// Look up the configured `type` and invoke its factory
    pub fn initialize(&self, config: &ConnectorConfig) -> Result<Box<dyn Connector>> {
        let registration = self.resolve(&config.kind).ok_or_else(|| {
            DataSrvError::config(format!(
                "Unknown connector type '{}' for connector '{}'",
                config.kind, config.id
            ))
        })?;
        debug!(
            "Initializing connector '{}' as type '{}'",
            config.id,
            registration.tag()
        );
        (registration.factory)(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::virt::VirtualConnector;

    fn virtual_factory() -> ConnectorFactory {
        Arc::new(|config| Ok(Box::new(VirtualConnector::new(config)?) as Box<dyn Connector>))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = Registry::new();
        registry
            .register("virtual", &["virt"], virtual_factory(), false)
            .unwrap();

        assert!(registry.is_registered("virtual"));
        assert!(registry.is_registered("virt"));
        assert!(registry.is_registered("VIRTUAL"));
        assert!(!registry.is_registered("modbus"));
        assert_eq!(registry.registered_types(), vec!["virtual"]);
    }

    #[test]
    fn test_duplicate_rejected_unless_replace() {
        let registry = Registry::new();
        registry
            .register("virtual", &[], virtual_factory(), false)
            .unwrap();
        assert!(registry
            .register("virtual", &[], virtual_factory(), false)
            .is_err());
        assert!(registry
            .register("virtual", &["virt"], virtual_factory(), true)
            .is_ok());
        assert!(registry.is_registered("virt"));
    }

    #[test]
    fn test_prefix_resolution() {
        let registry = Registry::new();
        registry
            .register("virtual", &["virt"], virtual_factory(), false)
            .unwrap();

        // A configured type that extends a registered alias still resolves
        let registration = registry.resolve("virt_test").unwrap();
        assert_eq!(registration.tag(), "virtual");
        assert!(registry.resolve("mod_test").is_none());
    }

    #[test]
    fn test_initialize() {
        let registry = Registry::new();
        registry
            .register("virtual", &["virt"], virtual_factory(), false)
            .unwrap();

        let connector = registry
            .initialize(&ConnectorConfig::new("store", "virt"))
            .unwrap();
        assert_eq!(connector.id(), "store");

        let err = registry
            .initialize(&ConnectorConfig::new("x", "bacnet"))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
