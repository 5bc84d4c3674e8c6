//! Built-in connector adapters
//!
//! Every adapter implements the [`Connector`](crate::connector::Connector)
//! contract and is reached exclusively through the registry; the
//! orchestrator never names a concrete adapter type.

use std::sync::Arc;

use crate::connector::Connector;
use crate::core::channel::Channel;
use crate::core::register::Registry;
use crate::error::Result;

pub mod csv;
pub mod virt;

/// Storage column a channel maps to on the given connector: the binding's
/// `address` (or `column`) field when present, otherwise the channel id.
pub(crate) fn bound_column(channel: &Channel, connector: &str) -> String {
    for binding in [channel.reader(), channel.logger()].into_iter().flatten() {
        if binding.connector() != connector {
            continue;
        }
        if let Some(column) = binding.get_str("address").or_else(|| binding.get_str("column")) {
            return column.to_string();
        }
    }
    channel.id().to_string()
}

/// Registry preloaded with the built-in adapter types
pub fn default_registry() -> Result<Registry> {
    let registry = Registry::new();
    registry.register(
        "virtual",
        &["virt"],
        Arc::new(|config| Ok(Box::new(virt::VirtualConnector::new(config)?) as Box<dyn Connector>)),
        false,
    )?;
    registry.register(
        "csv",
        &["file"],
        Arc::new(|config| Ok(Box::new(csv::CsvConnector::new(config)?) as Box<dyn Connector>)),
        false,
    )?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorConfig;

    #[test]
    fn test_default_registry_types() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.registered_types(), vec!["virtual", "csv"]);
        assert!(registry.is_registered("virt"));
        assert!(registry.is_registered("file"));
    }

    #[test]
    fn test_csv_requires_path() {
        let registry = default_registry().unwrap();
        let err = registry
            .initialize(&ConnectorConfig::new("archive", "csv"))
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
