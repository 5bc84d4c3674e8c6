//! Shared test fixtures: an instrumented mock connector plus config builders

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use datasrv::config::{AppConfig, BindingConfig, ChannelConfig, ConnectorConfig};
use datasrv::connector::Connector;
use datasrv::connectors::default_registry;
use datasrv::core::resource::Resource;
use datasrv::core::{Channels, Registry, TimeFrame};
use datasrv::error::{DataSrvError, Result};

/// Shared, externally inspectable state of every mock instance built from it
#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub connects: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    pub writes: Arc<AtomicUsize>,
    /// Fail connect with a connection fault
    pub fail_connect: Arc<AtomicBool>,
    /// Fail read with a connection fault (transport loss)
    pub drop_link_on_read: Arc<AtomicBool>,
    /// Fail read with a data fault (garbled response)
    pub garble_read: Arc<AtomicBool>,
    pub store: Arc<Mutex<TimeFrame>>,
}

impl MockState {
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Instrumented in-memory connector for fault-injection tests
#[derive(Debug)]
pub struct MockConnector {
    resource: Resource,
    state: MockState,
}

impl MockConnector {
    pub fn new(config: &ConnectorConfig, state: MockState) -> Result<Self> {
        Ok(Self {
            resource: Resource::new(
                &config.id,
                config.name.as_deref(),
                Some(&config.kind),
                config.uuid.as_deref(),
                config.parameters.clone(),
            )?,
            state,
        })
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    async fn connect(&mut self, _channels: &Channels) -> Result<()> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DataSrvError::connection("refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
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
        if self.state.drop_link_on_read.load(Ordering::SeqCst) {
            return Err(DataSrvError::connection("link lost"));
        }
        if self.state.garble_read.load(Ordering::SeqCst) {
            return Err(DataSrvError::data("garbled response"));
        }
        self.state.reads.fetch_add(1, Ordering::SeqCst);

        let window = self.state.store.lock().slice(start, end);
        let mut frame = TimeFrame::new();
        for channel in channels {
            for (timestamp, value) in window.column(channel.id()) {
                frame.insert(timestamp, channel.id(), value);
            }
        }
        Ok(frame)
    }

    async fn write(&mut self, data: &TimeFrame) -> Result<()> {
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        self.state.store.lock().merge(data.clone());
        Ok(())
    }
}

/// Default registry plus a `mock` type building from the given shared state
pub fn registry_with_mock(state: &MockState) -> Registry {
    let registry = default_registry().unwrap();
    let state = state.clone();
    registry
        .register(
            "mock",
            &[],
            Arc::new(move |config| {
                Ok(Box::new(MockConnector::new(config, state.clone())?) as Box<dyn Connector>)
            }),
            false,
        )
        .unwrap();
    registry
}

pub fn connector(id: &str, kind: &str) -> ConnectorConfig {
    ConnectorConfig::new(id, kind)
}

pub fn channel(id: &str, reader: Option<&str>, logger: Option<&str>) -> ChannelConfig {
    let mut config = ChannelConfig::new(id);
    config.kind = Some("float".to_string());
    config.freq = Some("1s".to_string());
    config.reader = reader.map(BindingConfig::new);
    config.logger = logger.map(BindingConfig::new);
    config
}

pub fn app_config(connectors: Vec<ConnectorConfig>, channels: Vec<ChannelConfig>) -> AppConfig {
    let mut config = AppConfig::default();
    config.interval = 1;
    config.connectors = connectors;
    config.channels = channels;
    config
}
