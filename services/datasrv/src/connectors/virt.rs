//! In-memory virtual connector
//!
//! Faithful time-indexed store with no transport behind it. Written samples
//! are kept as-is and handed back by later reads, which makes it the
//! loopback adapter of choice for channel wiring checks and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ConnectorConfig;
use crate::connector::Connector;
use crate::connectors::bound_column;
use crate::core::channels::Channels;
use crate::core::frame::TimeFrame;
use crate::core::resource::Resource;
use crate::error::Result;

/// Connector backed by an in-memory time-indexed table
#[derive(Debug)]
pub struct VirtualConnector {
    resource: Resource,
    /// channel id -> storage column, resolved at connect
    columns: HashMap<String, String>,
    store: TimeFrame,
}

impl VirtualConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        Ok(Self {
            resource: Resource::new(
                &config.id,
                config.name.as_deref(),
                Some(&config.kind),
                config.uuid.as_deref(),
                config.parameters.clone(),
            )?,
            columns: HashMap::new(),
            store: TimeFrame::new(),
        })
    }

    fn column_of(&self, id: &str) -> String {
        self.columns.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

#[async_trait]
impl Connector for VirtualConnector {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    async fn connect(&mut self, channels: &Channels) -> Result<()> {
        // The store survives reconnects; only the address map is rebuilt.
        self.columns = channels
            .iter()
            .map(|c| (c.id().to_string(), bound_column(c, self.resource.id())))
            .collect();
        debug!(
            "Virtual connector '{}' mapped {} channel(s)",
            self.resource.id(),
            self.columns.len()
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(
        &mut self,
        channels: &Channels,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimeFrame> {
        let window = self.store.slice(start, end);
        let mut frame = TimeFrame::new();
        for channel in channels {
            let column = self.column_of(channel.id());
            for (timestamp, value) in window.column(&column) {
                frame.insert(timestamp, channel.id(), value);
            }
        }
        Ok(frame)
    }

    async fn write(&mut self, data: &TimeFrame) -> Result<()> {
        for (timestamp, cells) in data.iter() {
            for (id, value) in cells {
                let column = self.column_of(id);
                self.store.insert(*timestamp, &column, value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindingConfig, ChannelConfig};
    use crate::core::channel::Channel;
    use crate::core::value::Value;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn connector() -> VirtualConnector {
        VirtualConnector::new(&ConnectorConfig::new("store", "virtual")).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let mut store = connector();
        store.connect(&Channels::new()).await.unwrap();

        let mut data = TimeFrame::new();
        data.insert(ts(10), "power", Value::from(1.5));
        data.insert(ts(20), "power", Value::from(2.5));
        store.write(&data).await.unwrap();

        let channels: Channels = [Channel::from_config(&ChannelConfig::new("power")).unwrap()]
            .into_iter()
            .collect();
        let frame = store.read(&channels, Some(ts(0)), None).await.unwrap();
        assert_eq!(frame.column("power").len(), 2);

        // An open window yields only the most recent sample
        let latest = store.read(&channels, None, None).await.unwrap();
        assert_eq!(latest.first_of("power"), Some((ts(20), Value::Float(2.5))));
    }

    #[tokio::test]
    async fn test_address_mapping() {
        let mut config = ChannelConfig::new("grid_power");
        config.reader = Some(
            BindingConfig::new("store").with_address("address", serde_json::json!("p_grid")),
        );
        let channels: Channels = [Channel::from_config(&config).unwrap()].into_iter().collect();

        let mut store = connector();
        store.connect(&channels).await.unwrap();

        // Writes keyed by channel id land in the bound storage column
        let data = TimeFrame::single(ts(10), "grid_power", Value::from(7.0));
        store.write(&data).await.unwrap();

        let frame = store.read(&channels, Some(ts(0)), None).await.unwrap();
        assert_eq!(frame.first_of("grid_power"), Some((ts(10), Value::Float(7.0))));
    }

    #[tokio::test]
    async fn test_store_survives_reconnect() {
        let mut store = connector();
        let channels: Channels = [Channel::from_config(&ChannelConfig::new("power")).unwrap()]
            .into_iter()
            .collect();
        store.connect(&channels).await.unwrap();
        store
            .write(&TimeFrame::single(ts(10), "power", Value::from(1.0)))
            .await
            .unwrap();

        store.disconnect().await.unwrap();
        store.connect(&channels).await.unwrap();
        let frame = store.read(&channels, Some(ts(0)), None).await.unwrap();
        assert!(!frame.is_empty());
    }
}
