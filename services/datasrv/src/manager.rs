//! Acquisition orchestrator
//!
//! `DataManager` owns the channel registry and the connector context, runs
//! the periodic acquisition loop and fans work out as per-connector tasks
//! over a bounded worker pool. Connector faults are contained per cycle: a
//! failing connector degrades only its own channels, the loop itself never
//! stops for one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{self, AppConfig};
use crate::connector::{ConnectorContext, ConnectorHandle};
use crate::core::channel::{Channel, ChannelState};
use crate::core::channels::Channels;
use crate::core::frame::TimeFrame;
use crate::core::lifecycle::Lifecycle;
use crate::core::register::Registry;
use crate::error::{DataSrvError, Result};
use crate::task::{ConnectTask, LogTask, ReadTask, WriteTask};

const COMPONENT_ID: &str = "datasrv";
const EVENT_CAPACITY: usize = 64;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Central runtime orchestrating connectors and channels
pub struct DataManager {
    connectors: Arc<ConnectorContext>,
    channels: RwLock<Channels>,
    lifecycle: Mutex<Lifecycle>,
    interval: RwLock<Duration>,
    pool: RwLock<Arc<Semaphore>>,
    token: CancellationToken,
    events: broadcast::Sender<TimeFrame>,
}

impl DataManager {
    pub fn new(registry: Registry) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connectors: Arc::new(ConnectorContext::new(registry)),
            channels: RwLock::new(Channels::new()),
            lifecycle: Mutex::new(Lifecycle::new(true)),
            interval: RwLock::new(Duration::from_secs(60)),
            pool: RwLock::new(Arc::new(Semaphore::new(default_workers()))),
            token: CancellationToken::new(),
            events,
        }
    }

    pub fn connectors(&self) -> &ConnectorContext {
        &self.connectors
    }

    /// Snapshot of the channel registry; clones share the live value cells
    pub fn channels(&self) -> Channels {
        self.channels.read().clone()
    }

    pub fn interval(&self) -> Duration {
        *self.interval.read()
    }

    /// Live acquisition frames, one per loop cycle that produced data
    pub fn subscribe(&self) -> broadcast::Receiver<TimeFrame> {
        self.events.subscribe()
    }

    fn pool(&self) -> Arc<Semaphore> {
        self.pool.read().clone()
    }

    fn check_configured(&self) -> Result<()> {
        if !self.lifecycle.lock().is_configured() {
            return Err(DataSrvError::config("Data manager is not configured"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Validate the configuration, build connectors through the registry and
    /// build the channel registry. Runs once; a repeat call is a warned
    /// no-op.
    pub async fn configure(&self, config: &AppConfig) -> Result<()> {
        if !self.lifecycle.lock().start_configure(COMPONENT_ID)? {
            return Ok(());
        }
        config::validate(config)?;

        *self.interval.write() = config.interval();
        let workers = config.workers.unwrap_or_else(default_workers).max(1);
        *self.pool.write() = Arc::new(Semaphore::new(workers));

        self.connectors.configure(&config.connectors).await?;

        let mut channels = Channels::new();
        for channel_config in &config.channels {
            let channel = Channel::from_config(channel_config)?;
            // Bindings referencing a disabled connector are configured but
            // will never be serviced.
            for binding in [channel.reader(), channel.logger()].into_iter().flatten() {
                if self.connectors.get(binding.connector()).is_none() {
                    info!(
                        "Channel '{}' is bound to disabled connector '{}'",
                        channel.id(),
                        binding.connector()
                    );
                }
            }
            channels.push(channel);
        }
        info!(
            "Configured {} channels over {} connectors ({} workers, {:?} interval)",
            channels.len(),
            self.connectors.len(),
            workers,
            self.interval()
        );
        *self.channels.write() = channels;
        Ok(())
    }

    /// Activate self, then every connector in declaration order
    pub fn activate(&self) -> Result<()> {
        if !self.lifecycle.lock().start_activate(COMPONENT_ID)? {
            return Ok(());
        }
        self.connectors.activate()?;
        info!("Data manager activated");
        Ok(())
    }

    /// Disconnect and deactivate everything, children in reverse order.
    /// Best-effort teardown, never fails.
    pub async fn deactivate(&self) {
        self.disconnect().await;
        self.connectors.deactivate();
        if self.lifecycle.lock().start_deactivate() {
            info!("Data manager deactivated");
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Open connectors for the given channels (all when `None`), each for
    /// the channel subset bound to it. A restricted selection only touches
    /// the connectors it references. Failures are contained: a connector
    /// that cannot connect degrades only its own channels.
    pub async fn connect(&self, channels: Option<Channels>) -> Result<()> {
        self.check_configured()?;
        let restricted = channels.is_some();
        let selection = channels.unwrap_or_else(|| self.channels());
        let handles = self
            .connectors
            .iter()
            .into_iter()
            .filter(|h| !restricted || !selection.bound_to(h.id()).is_empty())
            .collect();
        self.connect_handles(handles, &selection).await;
        Ok(())
    }

    async fn connect_handles(&self, handles: Vec<Arc<ConnectorHandle>>, selection: &Channels) {
        let mut tasks = JoinSet::new();
        for handle in handles {
            let subset = selection.bound_to(handle.id());
            let pool = self.pool();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.ok();
                let id = handle.id().to_string();
                let result = ConnectTask {
                    connector: handle,
                    channels: subset.clone(),
                }
                .run()
                .await;
                (id, subset, result)
            });
        }

        let mut failures = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(()))) => {},
                Ok((id, subset, Err(e))) => {
                    failures += 1;
                    warn!("Connect of connector '{id}' failed: {e}");
                    subset.set_state_all(ChannelState::UnknownError);
                },
                Err(e) => {
                    failures += 1;
                    warn!("Connect task panicked: {e}");
                },
            }
        }
        if failures > 0 {
            warn!("{failures} connector(s) failed to connect");
        }
    }

    /// Disconnect every connector in reverse declaration order. Failures are
    /// contained and logged.
    pub async fn disconnect(&self) {
        for handle in self.connectors.iter().into_iter().rev() {
            if let Err(e) = handle.disconnect().await {
                warn!("Disconnect of connector '{}' failed: {e}", handle.id());
            }
        }
    }

    /// Read the given channels (all when `None`) grouped per reader
    /// connector, one task per connector. Returns the merged frame; channels
    /// of a failing connector are excluded from the result and degraded.
    pub async fn read(
        &self,
        channels: Option<Channels>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TimeFrame> {
        self.check_configured()?;
        let selected = channels.unwrap_or_else(|| self.channels());

        let mut tasks = JoinSet::new();
        for (id, group) in selected.group_by_reader() {
            let Some(handle) = self.connectors.get(&id) else {
                debug!("Skipping read group for unavailable connector '{id}'");
                continue;
            };
            let pool = self.pool();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.ok();
                let result = ReadTask {
                    connector: handle,
                    channels: group.clone(),
                    start,
                    end,
                }
                .run()
                .await;
                (id, group, result)
            });
        }

        let mut merged = TimeFrame::new();
        let now = Utc::now();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, group, Ok(frame))) => {
                    touch_readers(&group, now);
                    merged.merge(frame);
                },
                Ok((id, group, Err(e))) => {
                    warn!("Read from connector '{id}' failed: {e}");
                    // Reader bindings mark the last successful use only, so
                    // these channels stay due and are retried next tick.
                    group.set_state_all(ChannelState::UnknownError);
                },
                Err(e) => warn!("Read task panicked: {e}"),
            }
        }
        Ok(merged)
    }

    /// Push a frame out through the channels' logger bindings, one task per
    /// target connector. Each successfully written channel's value is
    /// updated from the input frame before dispatch; a failing connector
    /// rolls its channels back to an error state.
    pub async fn write(&self, data: &TimeFrame, channels: Option<Channels>) -> Result<()> {
        self.check_configured()?;
        let selected = channels.unwrap_or_else(|| self.channels());

        let mut tasks = JoinSet::new();
        for (id, group) in selected.group_by_logger() {
            let Some(handle) = self.connectors.get(&id) else {
                debug!("Skipping write group for unavailable connector '{id}'");
                continue;
            };
            let slice = data.select(&group.ids());
            if slice.is_empty() {
                continue;
            }

            // Optimistic update: the channel reflects the written value
            for channel in &group {
                if let Some((timestamp, value)) = slice.last_of(channel.id()) {
                    if let Err(e) = channel.set_value_at(value, timestamp) {
                        warn!("Channel '{}' rejected written value: {e}", channel.id());
                        channel.set_state(ChannelState::ArgumentSyntaxError);
                    }
                }
            }

            let pool = self.pool();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.ok();
                let result = WriteTask {
                    connector: handle,
                    channels: group.clone(),
                    data: slice,
                }
                .run()
                .await;
                (id, group, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, _, Ok(()))) => {},
                Ok((id, group, Err(e))) => {
                    warn!("Write to connector '{id}' failed: {e}");
                    group.set_state_all(ChannelState::UnknownError);
                },
                Err(e) => warn!("Write task panicked: {e}"),
            }
        }
        Ok(())
    }

    /// Persist every channel whose value changed since it was last logged,
    /// grouped per logger connector. Returns the number of dispatched tasks;
    /// a second call without new data dispatches none. Logger timestamps
    /// only advance on success, so a failed flush is retried next cycle.
    pub async fn log(&self, channels: Option<Channels>) -> Result<usize> {
        self.check_configured()?;
        let selected = channels
            .unwrap_or_else(|| self.channels())
            .filter(|c| c.is_valid() && logger_pending(c));

        let mut tasks = JoinSet::new();
        let mut dispatched = 0usize;
        for (id, group) in selected.group_by_logger() {
            let Some(handle) = self.connectors.get(&id) else {
                debug!("Skipping log group for unavailable connector '{id}'");
                continue;
            };
            let data = group.to_frame();
            if data.is_empty() {
                continue;
            }
            dispatched += 1;

            let pool = self.pool();
            tasks.spawn(async move {
                let _permit = pool.acquire_owned().await.ok();
                let result = LogTask {
                    connector: handle,
                    channels: group.clone(),
                    data,
                }
                .run()
                .await;
                (id, group, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, group, Ok(()))) => {
                    for channel in &group {
                        if let Some(logger) = channel.logger() {
                            logger.touch(channel.timestamp());
                        }
                    }
                },
                Ok((id, _, Err(e))) => warn!("Log to connector '{id}' failed: {e}"),
                Err(e) => warn!("Log task panicked: {e}"),
            }
        }
        Ok(dispatched)
    }

    // ------------------------------------------------------------------
    // Acquisition loop
    // ------------------------------------------------------------------

    /// Periodic acquisition loop: reconnect broken connectors, read due
    /// channels, broadcast the cycle's frame, persist changed values, then
    /// sleep until the next tick. Runs until interrupted; a final log flush
    /// happens on the way out.
    pub async fn run(&self) -> Result<()> {
        if !self.lifecycle.lock().is_active() {
            return Err(DataSrvError::config("Data manager is not active"));
        }
        info!("Acquisition loop started (interval {:?})", self.interval());

        loop {
            let now = Utc::now();

            let broken: Vec<Arc<ConnectorHandle>> = self
                .connectors
                .iter()
                .into_iter()
                .filter(|h| h.reconnect_due(now))
                .collect();
            if !broken.is_empty() {
                debug!("Reconnecting {} connector(s)", broken.len());
                let all = self.channels();
                self.connect_handles(broken, &all).await;
            }

            let due = self.channels().filter(|c| c.is_due(now));
            if !due.is_empty() {
                debug!("Reading {} due channel(s)", due.len());
                match self.read(Some(due), None, None).await {
                    Ok(frame) if !frame.is_empty() => {
                        let _ = self.events.send(frame);
                    },
                    Ok(_) => {},
                    Err(e) => warn!("Read cycle failed: {e}"),
                }
            }

            if let Err(e) = self.log(None).await {
                warn!("Log cycle failed: {e}");
            }

            // The next tick is anchored to "now", not to the previous tick,
            // so a long cycle does not cause a burst of catch-up runs.
            let deadline = tokio::time::Instant::now() + self.interval();
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("Interrupt received, flushing pending log data");
                    if let Err(e) = self.log(None).await {
                        warn!("Final log flush failed: {e}");
                    }
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        info!("Acquisition loop stopped");
        Ok(())
    }

    /// Request a clean stop of the acquisition loop
    pub fn interrupt(&self) {
        info!("Interrupt requested");
        self.token.cancel();
    }
}

fn touch_readers(group: &Channels, now: DateTime<Utc>) {
    for channel in group {
        if let Some(reader) = channel.reader() {
            reader.touch(now);
        }
    }
}

/// Whether the channel's current value postdates its last logged value
fn logger_pending(channel: &Channel) -> bool {
    match channel.logger() {
        None => false,
        Some(logger) => match logger.timestamp() {
            None => true,
            Some(logged) => logged < channel.timestamp(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindingConfig, ChannelConfig, ConnectorConfig};
    use crate::connectors::default_registry;
    use crate::core::value::Value;

    fn sample_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.interval = 1;
        config.connectors.push(ConnectorConfig::new("store", "virtual"));
        let mut channel = ChannelConfig::new("power").with_freq("1s");
        channel.kind = Some("float".to_string());
        channel.reader = Some(BindingConfig::new("store"));
        channel.logger = Some(BindingConfig::new("store"));
        config.channels.push(channel);
        config
    }

    async fn manager_with(config: &AppConfig) -> DataManager {
        let manager = DataManager::new(default_registry().unwrap());
        manager.configure(config).await.unwrap();
        manager.activate().unwrap();
        manager.connect(None).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_configure_validates() {
        let mut config = sample_config();
        config.channels.push(ChannelConfig::new("bad").with_reader("missing"));

        let manager = DataManager::new(default_registry().unwrap());
        assert!(manager.configure(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let manager = DataManager::new(default_registry().unwrap());
        assert!(manager.connect(None).await.is_err());
        assert!(manager.read(None, None, None).await.is_err());
        assert!(manager.activate().is_err());
    }

    #[tokio::test]
    async fn test_write_then_read_cycle() {
        let manager = manager_with(&sample_config()).await;

        let frame = TimeFrame::single(Utc::now(), "power", Value::from(42.0));
        manager.write(&frame, None).await.unwrap();

        let channel = manager.channels().get("power").unwrap().clone();
        assert_eq!(channel.value(), Some(Value::Float(42.0)));
        assert!(channel.is_valid());

        // The written sample comes back from the store
        let result = manager.read(None, None, None).await.unwrap();
        assert_eq!(result.last_of("power").map(|(_, v)| v), Some(Value::Float(42.0)));
    }

    #[tokio::test]
    async fn test_log_dispatches_only_changed() {
        let manager = manager_with(&sample_config()).await;

        let channel = manager.channels().get("power").unwrap().clone();
        channel.set_value(Value::from(1.0)).unwrap();

        assert_eq!(manager.log(None).await.unwrap(), 1);
        // Nothing changed since the flush: no task dispatched
        assert_eq!(manager.log(None).await.unwrap(), 0);

        channel.set_value(Value::from(2.0)).unwrap();
        assert_eq!(manager.log(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_interrupt() {
        let manager = Arc::new(manager_with(&sample_config()).await);

        let runner = manager.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.interrupt();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_deactivate_cascades() {
        let manager = manager_with(&sample_config()).await;
        assert!(manager.connectors().get("store").unwrap().is_connected());

        manager.deactivate().await;
        let store = manager.connectors().get("store").unwrap();
        assert!(!store.is_connected());
        assert!(!store.is_active());
    }
}
