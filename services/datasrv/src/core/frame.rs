//! Wide time-indexed result table
//!
//! A `TimeFrame` is the table shape every connector read returns and every
//! write consumes: rows keyed by UTC timestamp, columns keyed by channel id.
//! Rows are kept sorted by time so window slicing and first/last lookups are
//! cheap.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::value::Value;

/// Time-indexed table with one column per channel id
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TimeFrame {
    rows: BTreeMap<DateTime<Utc>, BTreeMap<String, Value>>,
}

impl TimeFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame holding a single cell
    pub fn single(timestamp: DateTime<Utc>, column: &str, value: Value) -> Self {
        let mut frame = Self::new();
        frame.insert(timestamp, column, value);
        frame
    }

    /// Insert one cell, creating the row if needed
    pub fn insert(&mut self, timestamp: DateTime<Utc>, column: &str, value: Value) {
        self.rows
            .entry(timestamp)
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Merge another frame's cells into this one; on overlap the other
    /// frame's cells win.
    pub fn merge(&mut self, other: TimeFrame) {
        for (ts, cells) in other.rows {
            self.rows.entry(ts).or_default().extend(cells);
        }
    }

    /// Number of rows (distinct timestamps)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column identifiers present anywhere in the frame, sorted
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .rows
            .values()
            .flat_map(|cells| cells.keys().cloned())
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }

    /// Row timestamps in ascending order
    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.rows.keys()
    }

    /// Iterate rows in time order
    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &BTreeMap<String, Value>)> {
        self.rows.iter()
    }

    /// All samples of one column in time order
    pub fn column(&self, id: &str) -> Vec<(DateTime<Utc>, Value)> {
        self.rows
            .iter()
            .filter_map(|(ts, cells)| cells.get(id).map(|v| (*ts, v.clone())))
            .collect()
    }

    /// The earliest non-missing sample of a column
    pub fn first_of(&self, id: &str) -> Option<(DateTime<Utc>, Value)> {
        self.rows
            .iter()
            .find_map(|(ts, cells)| cells.get(id).map(|v| (*ts, v.clone())))
    }

    /// The latest non-missing sample of a column
    pub fn last_of(&self, id: &str) -> Option<(DateTime<Utc>, Value)> {
        self.rows
            .iter()
            .rev()
            .find_map(|(ts, cells)| cells.get(id).map(|v| (*ts, v.clone())))
    }

    /// True when the column is absent or holds only null samples
    pub fn is_null_column(&self, id: &str) -> bool {
        !self
            .rows
            .values()
            .any(|cells| cells.get(id).map(|v| !v.is_null()).unwrap_or(false))
    }

    /// Restrict to a time window. An open window with both bounds `None`
    /// means "most recent row only".
    pub fn slice(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> TimeFrame {
        if start.is_none() && end.is_none() {
            let mut frame = TimeFrame::new();
            if let Some((ts, cells)) = self.rows.iter().next_back() {
                frame.rows.insert(*ts, cells.clone());
            }
            return frame;
        }

        let rows = self
            .rows
            .iter()
            .filter(|(ts, _)| {
                start.map(|s| **ts >= s).unwrap_or(true) && end.map(|e| **ts <= e).unwrap_or(true)
            })
            .map(|(ts, cells)| (*ts, cells.clone()))
            .collect();
        TimeFrame { rows }
    }

    /// Keep only the given columns, dropping rows that end up empty
    pub fn select(&self, ids: &[String]) -> TimeFrame {
        let mut frame = TimeFrame::new();
        for (ts, cells) in &self.rows {
            for id in ids {
                if let Some(v) = cells.get(id) {
                    frame.insert(*ts, id, v.clone());
                }
            }
        }
        frame
    }
}
