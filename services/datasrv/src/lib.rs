//! Data Acquisition Service Library (`datasrv`)
//!
//! An async data-acquisition runtime for energy monitoring: connectors wrap
//! the protocol-specific transports, channels are the named, typed,
//! time-stamped value slots bound to them, and the data manager schedules
//! periodic reads, fans work out over a bounded worker pool and persists
//! changed values through each channel's logging binding.
//!
//! # Architecture
//!
//! - **`core`**: value model, time-indexed frames, channel state machine,
//!   lifecycle guards and the connector type registry
//! - **`connector`**: the abstract connector contract plus the guard handle
//!   and context that own live connector instances
//! - **`connectors`**: built-in adapters (in-memory virtual store, CSV file)
//! - **`task`**: per-connector work units (connect, read, write, log) with
//!   shared fault containment
//! - **`manager`**: the orchestrator and its periodic acquisition loop
//! - **`config`**: YAML configuration with environment overrides
//!
//! # Quick Start
//!
//! ```no_run
//! use datasrv::config::AppConfig;
//! use datasrv::connectors::default_registry;
//! use datasrv::manager::DataManager;
//! use datasrv::error::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(std::path::Path::new("datasrv.yaml"))?;
//!
//!     let manager = DataManager::new(default_registry()?);
//!     manager.configure(&config).await?;
//!     manager.activate()?;
//!     manager.connect(None).await?;
//!
//!     manager.run().await?;
//!     manager.deactivate().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connector;
pub mod connectors;
pub mod core;
pub mod error;
pub mod manager;
pub mod task;
pub mod utils;

pub use config::AppConfig;
pub use connector::{Connector, ConnectorContext, ConnectorHandle};
pub use core::{Channel, ChannelState, Channels, Registry, TimeFrame, Value};
pub use error::{DataSrvError, Result};
pub use manager::DataManager;
