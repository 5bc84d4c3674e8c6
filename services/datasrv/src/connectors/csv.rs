//! CSV file connector
//!
//! Archives samples to a single wide CSV file: one `timestamp` column in
//! RFC 3339 followed by one column per storage address. Reads parse the file
//! back into a time-indexed frame, so the file doubles as a readable store
//! for replay and inspection.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ConnectorConfig;
use crate::connector::Connector;
use crate::connectors::bound_column;
use crate::core::channels::Channels;
use crate::core::frame::TimeFrame;
use crate::core::resource::Resource;
use crate::core::value::Value;
use crate::error::{DataSrvError, Result};

/// Connector persisting to one wide CSV file
#[derive(Debug)]
pub struct CsvConnector {
    resource: Resource,
    path: PathBuf,
    /// channel id -> storage column, resolved at connect
    columns: HashMap<String, String>,
}

impl CsvConnector {
    pub fn new(config: &ConnectorConfig) -> Result<Self> {
        let path = config.get_str("path").ok_or_else(|| {
            DataSrvError::config(format!(
                "CSV connector '{}' requires a 'path' parameter",
                config.id
            ))
        })?;
        Ok(Self {
            resource: Resource::new(
                &config.id,
                config.name.as_deref(),
                Some(&config.kind),
                config.uuid.as_deref(),
                config.parameters.clone(),
            )?,
            path: PathBuf::from(path),
            columns: HashMap::new(),
        })
    }

    fn column_of(&self, id: &str) -> String {
        self.columns.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Parse the backing file into a frame; a missing file is an empty store
    fn load(&self) -> Result<TimeFrame> {
        let mut frame = TimeFrame::new();
        if !self.path.exists() {
            return Ok(frame);
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        for record in reader.records() {
            let record = record?;
            let Some(raw_ts) = record.get(0) else { continue };
            let timestamp = DateTime::parse_from_rfc3339(raw_ts)
                .map_err(|e| {
                    DataSrvError::data(format!(
                        "Invalid timestamp '{raw_ts}' in {}: {e}",
                        self.path.display()
                    ))
                })?
                .with_timezone(&Utc);

            for (index, cell) in record.iter().enumerate().skip(1) {
                if cell.is_empty() {
                    continue;
                }
                let Some(column) = headers.get(index) else { continue };
                frame.insert(timestamp, column, parse_cell(cell));
            }
        }
        Ok(frame)
    }

    /// Rewrite the backing file from a frame, rows in time order
    fn save(&self, frame: &TimeFrame) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let columns = frame.columns();
        let mut writer = csv::Writer::from_path(&self.path)?;
        let mut header = vec!["timestamp".to_string()];
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for (timestamp, cells) in frame.iter() {
            let mut row = vec![timestamp.to_rfc3339()];
            for column in &columns {
                row.push(match cells.get(column) {
                    Some(Value::Null) | None => String::new(),
                    Some(value) => value.to_string(),
                });
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Best-effort cell typing: bool, then integer, then float, else string
fn parse_cell(cell: &str) -> Value {
    if let Ok(b) = cell.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(cell.to_string())
}

#[async_trait]
impl Connector for CsvConnector {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    async fn connect(&mut self, channels: &Channels) -> Result<()> {
        self.columns = channels
            .iter()
            .map(|c| (c.id().to_string(), bound_column(c, self.resource.id())))
            .collect();
        // Surface an unparsable file at connect time rather than mid-cycle
        let store = self.load()?;
        debug!(
            "CSV connector '{}' opened {} ({} row(s))",
            self.resource.id(),
            self.path.display(),
            store.len()
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
        let window = self.load()?.slice(start, end);
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
        let mut store = self.load()?;
        for (timestamp, cells) in data.iter() {
            for (id, value) in cells {
                let column = self.column_of(id);
                store.insert(*timestamp, &column, value.clone());
            }
        }
        self.save(&store)
    }
}
