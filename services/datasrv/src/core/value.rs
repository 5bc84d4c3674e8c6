//! Channel value type and converters
//!
//! `Value` is the single value representation moving between connectors and
//! channels. `ValueKind` is the pluggable coercion a channel applies before
//! accepting a sample.

use serde::{Deserialize, Serialize};

use crate::error::{DataSrvError, Result};

// ============================================================================
// Value
// ============================================================================

/// Value type for channel data exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Null,
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, ""),
        }
    }
}

impl Value {
    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(i) => Some(*i as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(v) => Some(v.round() as i64),
            Self::Bool(b) => Some(if *b { 1 } else { 0 }),
            Self::String(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Float(v) => Some(*v != 0.0),
            Self::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            Self::Null => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value into a channel value
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            },
            serde_json::Value::String(s) => Self::String(s.clone()),
            _ => Self::Null,
        }
    }
}

// ============================================================================
// Value converter
// ============================================================================

/// Target type a channel coerces incoming samples to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    String,
    /// Accept any value unchanged
    #[default]
    Any,
}

impl ValueKind {
    /// Parse from a configured `type` tag, case-insensitive
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim().to_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "integer" | "short" | "long" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "str" | "string" => Ok(Self::String),
            "" | "any" => Ok(Self::Any),
            other => Err(DataSrvError::config(format!(
                "Unknown channel value type: '{other}'"
            ))),
        }
    }

    /// Coerce a value into this kind, failing with a data error when the
    /// value cannot be represented.
    pub fn convert(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Any => Ok(value),
            Self::Bool => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| DataSrvError::data(format!("Cannot convert '{value}' to bool"))),
            Self::Integer => value
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| DataSrvError::data(format!("Cannot convert '{value}' to integer"))),
            Self::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| DataSrvError::data(format!("Cannot convert '{value}' to float"))),
            Self::String => Ok(Value::String(value.to_string())),
        }
    }
}
