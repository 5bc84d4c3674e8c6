//! Connector task family
//!
//! A task binds exactly one connector and a subset of channels and runs on a
//! pool worker. The shared invocation wrapper translates connector-level
//! faults into channel-state transitions: a connection fault forces the
//! owning connector down and degrades the task's channels before re-raising;
//! any unclassified fault is wrapped into a connector fault carrying the
//! connector's identity so the dispatcher only ever inspects connector
//! fault types.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::connector::ConnectorHandle;
use crate::core::channel::ChannelState;
use crate::core::channels::Channels;
use crate::core::frame::TimeFrame;
use crate::error::{DataSrvError, Result};

/// Shared invocation wrapper for all task kinds
async fn invoke<T>(
    connector: &ConnectorHandle,
    channels: &Channels,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match op.await {
        Ok(value) => Ok(value),
        Err(e) if e.is_connection() => {
            warn!(
                "Connection fault on connector '{}', forcing disconnect: {}",
                connector.id(),
                e
            );
            channels.set_state_all(ChannelState::Disconnecting);
            if let Err(de) = connector.disconnect().await {
                warn!(
                    "Forced disconnect of connector '{}' failed: {}",
                    connector.id(),
                    de
                );
            }
            channels.set_state_all(ChannelState::Disconnected);
            Err(e)
        },
        Err(e @ DataSrvError::ConnectorError { .. }) => Err(e),
        Err(e) => Err(e.into_connector_fault(connector.id())),
    }
}

// ============================================================================
// Connect
// ============================================================================

/// Opens one connector for its channel subset
pub struct ConnectTask {
    pub connector: Arc<ConnectorHandle>,
    pub channels: Channels,
}

impl ConnectTask {
    pub async fn run(self) -> Result<()> {
        self.channels.set_state_all(ChannelState::Connecting);
        invoke(
            &self.connector,
            &self.channels,
            self.connector.connect(&self.channels),
        )
        .await?;
        self.channels.set_state_all(ChannelState::Connected);
        Ok(())
    }
}

// ============================================================================
// Read
// ============================================================================

/// Pull-mode fetch for one connector's channel subset
pub struct ReadTask {
    pub connector: Arc<ConnectorHandle>,
    pub channels: Channels,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadTask {
    pub async fn run(self) -> Result<TimeFrame> {
        let frame = invoke(
            &self.connector,
            &self.channels,
            self.connector.read(&self.channels, self.start, self.end),
        )
        .await?;

        for channel in &self.channels {
            // A requested channel absent from the result, or present with
            // only null samples, is not available.
            if frame.is_null_column(channel.id()) {
                warn!(
                    "Channel '{}' not available in read result of connector '{}'",
                    channel.id(),
                    self.connector.id()
                );
                channel.set_state(ChannelState::NotAvailable);
                continue;
            }

            // Earliest non-null row: prefer the oldest unread sample so
            // queued transports drain in order.
            let sample = frame
                .column(channel.id())
                .into_iter()
                .find(|(_, v)| !v.is_null());
            if let Some((timestamp, value)) = sample {
                if let Err(e) = channel.set_value_at(value, timestamp) {
                    warn!(
                        "Channel '{}' rejected sample from connector '{}': {}",
                        channel.id(),
                        self.connector.id(),
                        e
                    );
                    channel.set_state(ChannelState::ArgumentSyntaxError);
                }
            }
        }
        Ok(frame)
    }
}

// ============================================================================
// Write
// ============================================================================

/// Pushes a prepared data slice to one connector
pub struct WriteTask {
    pub connector: Arc<ConnectorHandle>,
    pub channels: Channels,
    pub data: TimeFrame,
}

impl WriteTask {
    pub async fn run(self) -> Result<()> {
        invoke(
            &self.connector,
            &self.channels,
            self.connector.write(&self.data),
        )
        .await
    }
}

// ============================================================================
// Log
// ============================================================================

/// Background persistence against each channel's logging binding, distinct
/// from live acquisition
pub struct LogTask {
    pub connector: Arc<ConnectorHandle>,
    pub channels: Channels,
    pub data: TimeFrame,
}

impl LogTask {
    pub async fn run(self) -> Result<()> {
        invoke(
            &self.connector,
            &self.channels,
            self.connector.write(&self.data),
        )
        .await
    }
}
