//! Connector contract and connection-state bookkeeping
//!
//! `Connector` is the abstract protocol-adapter contract: connect,
//! disconnect, read and write over a set of channels. Adapters stay free of
//! lifecycle concerns; the guard logic (configure-once, idempotent connect,
//! connection timestamps, per-connector operation exclusivity) lives in
//! `ConnectorHandle`, and `ConnectorContext` owns the handles in
//! declaration order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::ConnectorConfig;
use crate::core::channels::Channels;
use crate::core::frame::TimeFrame;
use crate::core::lifecycle::Lifecycle;
use crate::core::register::Registry;
use crate::core::resource::Resource;
use crate::error::{DataSrvError, Result};

/// Fallback wait before a broken connection is retried
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Connector contract
// ============================================================================

/// Abstract protocol-adapter contract.
///
/// Implementations own the transport; all parallelism is imposed from the
/// outside, one operation at a time per connector. `read` is optional:
/// push-only transports return a `NotSupported` fault.
#[async_trait]
pub trait Connector: std::fmt::Debug + Send + Sync {
    /// Identity and open attributes of this connector
    fn resource(&self) -> &Resource;

    /// Stable id used as the join key from channel bindings
    fn id(&self) -> &str {
        self.resource().id()
    }

    /// Adapter-specific configuration hook, run once inside the configure
    /// guard
    fn configure(&mut self, _config: &ConnectorConfig) -> Result<()> {
        Ok(())
    }

    /// Open the underlying resource for the given channel set
    async fn connect(&mut self, channels: &Channels) -> Result<()>;

    /// Release the underlying resource
    async fn disconnect(&mut self) -> Result<()>;

    /// Pull-mode fetch restricted to the requested window; an open window
    /// with both bounds `None` means "most recent sample"
    async fn read(
        &mut self,
        channels: &Channels,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimeFrame>;

    /// Push or persist a table of channel values
    async fn write(&mut self, data: &TimeFrame) -> Result<()>;
}

// ============================================================================
// Connection status
// ============================================================================

/// Mutable connection flags of one connector
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connect_timestamp: Option<DateTime<Utc>>,
    pub disconnect_timestamp: Option<DateTime<Utc>>,
}

// ============================================================================
// Connector handle
// ============================================================================

/// Guard wrapper around one adapter instance.
///
/// The tokio mutex enforces one operation at a time per connector; the
/// status record carries the connection flags the orchestrator schedules
/// reconnects from.
pub struct ConnectorHandle {
    id: String,
    uuid: String,
    driver: tokio::sync::Mutex<Box<dyn Connector>>,
    lifecycle: Mutex<Lifecycle>,
    status: RwLock<ConnectionStatus>,
    channels: RwLock<Channels>,
    reconnect_interval: Duration,
}

impl ConnectorHandle {
    pub fn new(driver: Box<dyn Connector>, config: &ConnectorConfig) -> Result<Self> {
        let reconnect_interval = config
            .reconnect_interval()?
            .unwrap_or(DEFAULT_RECONNECT_INTERVAL);
        Ok(Self {
            id: driver.id().to_string(),
            uuid: driver.resource().uuid().to_string(),
            driver: tokio::sync::Mutex::new(driver),
            lifecycle: Mutex::new(Lifecycle::new(config.enabled)),
            status: RwLock::new(ConnectionStatus::default()),
            channels: RwLock::new(Channels::new()),
            reconnect_interval,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Channels bound by the last connect
    pub fn channels(&self) -> Channels {
        self.channels.read().clone()
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    pub fn is_enabled(&self) -> bool {
        self.lifecycle.lock().is_enabled()
    }

    pub fn is_configured(&self) -> bool {
        self.lifecycle.lock().is_configured()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().is_active()
    }

    /// Side-effect-free liveness probe
    pub fn is_connected(&self) -> bool {
        self.status.read().connected
    }

    /// Whether the reconnect pass should retry this connector now
    pub fn reconnect_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active() || self.is_connected() {
            return false;
        }
        match self.status.read().disconnect_timestamp {
            None => true,
            Some(since) => match chrono::Duration::from_std(self.reconnect_interval) {
                Ok(wait) => since + wait <= now,
                Err(_) => false,
            },
        }
    }

    /// Run the adapter's configuration hook inside the configure guard
    pub async fn configure(&self, config: &ConnectorConfig) -> Result<()> {
        if !self.lifecycle.lock().start_configure(&self.id)? {
            return Ok(());
        }
        let mut driver = self.driver.lock().await;
        driver.configure(config)?;
        debug!("Configured connector '{}'", self.id);
        Ok(())
    }

    /// Activation guard; idempotent
    pub fn activate(&self) -> Result<()> {
        if self.lifecycle.lock().start_activate(&self.id)? {
            info!("Activated connector '{}'", self.id);
        }
        Ok(())
    }

    /// Deactivation guard; unconditionally idempotent, never fails
    pub fn deactivate(&self) {
        if self.lifecycle.lock().start_deactivate() {
            info!("Deactivated connector '{}'", self.id);
        }
    }

    /// Bind a channel set and open the underlying resource. Idempotent:
    /// when already connected the underlying open is not repeated and the
    /// connect timestamp is left untouched.
    pub async fn connect(&self, channels: &Channels) -> Result<()> {
        self.check_configured()?;
        if self.is_connected() {
            debug!("Connector '{}' is already connected", self.id);
            return Ok(());
        }

        let mut driver = self.driver.lock().await;
        match driver.connect(channels).await {
            Ok(()) => {
                *self.channels.write() = channels.clone();
                let mut status = self.status.write();
                status.connected = true;
                status.connect_timestamp = Some(Utc::now());
                info!(
                    "Connected connector '{}' ({} channels)",
                    self.id,
                    channels.len()
                );
                Ok(())
            },
            Err(e) => {
                // Stamp the failed attempt so the reconnect pass paces retries
                self.status.write().disconnect_timestamp = Some(Utc::now());
                Err(e.into_connector_fault(&self.id))
            },
        }
    }

    /// Release the underlying resource; safe to call when already
    /// disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let mut driver = self.driver.lock().await;
        let result = driver.disconnect().await;
        let mut status = self.status.write();
        status.connected = false;
        status.disconnect_timestamp = Some(Utc::now());
        drop(status);

        match result {
            Ok(()) => {
                info!("Disconnected connector '{}'", self.id);
                Ok(())
            },
            Err(e) => Err(e.into_connector_fault(&self.id)),
        }
    }

    pub async fn read(
        &self,
        channels: &Channels,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimeFrame> {
        self.check_configured()?;
        if !self.is_connected() {
            return Err(DataSrvError::not_connected(&self.id));
        }
        let mut driver = self.driver.lock().await;
        driver.read(channels, start, end).await
    }

    pub async fn write(&self, data: &TimeFrame) -> Result<()> {
        self.check_configured()?;
        if !self.is_connected() {
            return Err(DataSrvError::not_connected(&self.id));
        }
        let mut driver = self.driver.lock().await;
        driver.write(data).await
    }

    fn check_configured(&self) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_enabled() {
            return Err(DataSrvError::config(format!(
                "Connector '{}' is disabled",
                self.id
            )));
        }
        if !lifecycle.is_configured() {
            return Err(DataSrvError::config(format!(
                "Connector '{}' is not configured",
                self.id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Connector context
// ============================================================================

/// Owns the live connector handles in declaration order, keyed by id
pub struct ConnectorContext {
    registry: Registry,
    order: RwLock<Vec<String>>,
    handles: DashMap<String, Arc<ConnectorHandle>>,
}

impl ConnectorContext {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            order: RwLock::new(Vec::new()),
            handles: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.read().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConnectorHandle>> {
        self.handles.get(id).map(|h| h.clone())
    }

    /// Handles in declaration order
    pub fn iter(&self) -> Vec<Arc<ConnectorHandle>> {
        self.order
            .read()
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Instantiate and configure every enabled connector through the
    /// registry. Disabled connectors are skipped; a duplicate id is a
    /// configuration error.
    pub async fn configure(&self, configs: &[ConnectorConfig]) -> Result<()> {
        for config in configs {
            if !config.enabled {
                info!("Skipping disabled connector '{}'", config.id);
                continue;
            }
            if self.handles.contains_key(&config.id) {
                return Err(DataSrvError::config(format!(
                    "Duplicate connector id: '{}'",
                    config.id
                )));
            }

            let driver = self.registry.initialize(config)?;
            let handle = Arc::new(ConnectorHandle::new(driver, config)?);
            handle.configure(config).await?;

            self.order.write().push(handle.id().to_string());
            self.handles.insert(handle.id().to_string(), handle);
        }
        info!("Configured {} connectors", self.len());
        Ok(())
    }

    /// Activate every connector in declaration order. An activation failure
    /// is fatal and propagates.
    pub fn activate(&self) -> Result<()> {
        for handle in self.iter() {
            handle.activate()?;
        }
        Ok(())
    }

    /// Deactivate every connector in reverse declaration order; best-effort,
    /// a child failure never aborts its siblings' teardown.
    pub fn deactivate(&self) {
        for handle in self.iter().into_iter().rev() {
            handle.deactivate();
        }
    }

    /// Ids of connectors that are enabled and configured
    pub fn enabled_ids(&self) -> Vec<String> {
        self.iter()
            .into_iter()
            .filter(|h| h.is_enabled())
            .map(|h| h.id().to_string())
            .collect()
    }
}
