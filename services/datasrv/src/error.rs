//! Error handling for the data acquisition service
//!
//! Defines the fault taxonomy shared by the whole runtime. Faults raised
//! inside dispatched tasks are classified at the orchestrator boundary and
//! turned into channel state transitions; faults raised while configuring
//! or activating a component are fatal to that component and propagate.

use thiserror::Error;

/// Data service error type
#[derive(Error, Debug, Clone)]
pub enum DataSrvError {
    /// Malformed or missing configuration, fatal to the offending component
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The transport or session itself is unusable; triggers forced
    /// disconnect of the owning connector and is retryable later
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Operation-level connector failure that does not imply a broken
    /// transport; carries the offending connector's identity
    #[error("Connector '{connector}' error: {message}")]
    ConnectorError { connector: String, message: String },

    /// Generic local resource error (missing or invalid identifier)
    #[error("Resource error: {0}")]
    ResourceError(String),

    /// Operation not supported by the connector (push-only transports)
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Data handling errors (serialization, parsing, conversion)
    #[error("Data error: {0}")]
    DataError(String),
}

/// Result type alias for the data service
pub type Result<T> = std::result::Result<T, DataSrvError>;

impl DataSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        DataSrvError::ConfigError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        DataSrvError::ConnectionError(msg.into())
    }

    pub fn connector(connector: impl Into<String>, msg: impl Into<String>) -> Self {
        DataSrvError::ConnectorError {
            connector: connector.into(),
            message: msg.into(),
        }
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        DataSrvError::ResourceError(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        DataSrvError::NotSupported(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        DataSrvError::IoError(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        DataSrvError::DataError(msg.into())
    }

    // Convenience constructors for specific cases
    pub fn connector_not_found(id: impl std::fmt::Display) -> Self {
        DataSrvError::ConfigError(format!("Connector not found: {id}"))
    }

    pub fn channel_not_found(id: impl std::fmt::Display) -> Self {
        DataSrvError::ResourceError(format!("Channel not found: {id}"))
    }

    pub fn not_connected(id: impl std::fmt::Display) -> Self {
        DataSrvError::ConnectionError(format!("Connector '{id}' is not connected"))
    }

    /// True for faults that make the owning connector's transport unusable
    pub fn is_connection(&self) -> bool {
        matches!(self, DataSrvError::ConnectionError(_))
    }

    /// True for faults that are fatal at configure/activate time
    pub fn is_fatal(&self) -> bool {
        matches!(self, DataSrvError::ConfigError(_))
    }

    /// Wrap an arbitrary fault into a connector fault carrying the
    /// offending connector's identity; connection and connector faults
    /// keep their classification.
    pub fn into_connector_fault(self, connector: &str) -> Self {
        match self {
            DataSrvError::ConnectionError(_) | DataSrvError::ConnectorError { .. } => self,
            other => DataSrvError::ConnectorError {
                connector: connector.to_string(),
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for DataSrvError {
    fn from(err: std::io::Error) -> Self {
        DataSrvError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for DataSrvError {
    fn from(err: serde_json::Error) -> Self {
        DataSrvError::DataError(format!("JSON: {err}"))
    }
}

impl From<serde_yaml::Error> for DataSrvError {
    fn from(err: serde_yaml::Error) -> Self {
        DataSrvError::DataError(format!("YAML: {err}"))
    }
}

impl From<csv::Error> for DataSrvError {
    fn from(err: csv::Error) -> Self {
        DataSrvError::DataError(format!("CSV: {err}"))
    }
}

impl From<figment::Error> for DataSrvError {
    fn from(err: figment::Error) -> Self {
        DataSrvError::ConfigError(err.to_string())
    }
}

// ============================================================================
// Extension trait for adding context to errors
// ============================================================================

/// Extension trait for adding context to errors
pub trait ErrorExt<T> {
    fn config_error(self, msg: &str) -> Result<T>;
    fn connection_error(self, msg: &str) -> Result<T>;
    fn io_error(self, msg: &str) -> Result<T>;
    fn data_error(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorExt<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn config_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| DataSrvError::ConfigError(format!("{msg}: {e}")))
    }

    fn connection_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| DataSrvError::ConnectionError(format!("{msg}: {e}")))
    }

    fn io_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| DataSrvError::IoError(format!("{msg}: {e}")))
    }

    fn data_error(self, msg: &str) -> Result<T> {
        self.map_err(|e| DataSrvError::DataError(format!("{msg}: {e}")))
    }
}
