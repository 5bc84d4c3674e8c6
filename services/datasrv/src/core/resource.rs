//! Resource identity and attribute base
//!
//! Everything configurable in the runtime (channels, connectors) is built on
//! a `Resource`: a sanitized scoped id, a process-wide uuid defaulting to the
//! id, a derived human-readable name, an optional type tag, and an open,
//! order-preserving attribute map for any additional configured field.

use std::time::Duration;

use serde::Serialize;

use crate::config::Section;
use crate::error::Result;
use crate::utils::{parse_duration, sanitize_id};

/// Identity and attribute base for channels and connectors
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    uuid: String,
    id: String,
    name: String,
    kind: Option<String>,
    attributes: Section,
}

impl Resource {
    /// Build a resource, sanitizing the id and deriving defaults.
    ///
    /// `uuid` falls back to the sanitized id; `name` is derived from the id
    /// when absent.
    pub fn new(
        id: &str,
        name: Option<&str>,
        kind: Option<&str>,
        uuid: Option<&str>,
        attributes: Section,
    ) -> Result<Self> {
        let id = sanitize_id(id)?;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| id.replace(['_', '-'], " "));
        let uuid = uuid.map(str::to_string).unwrap_or_else(|| id.clone());
        Ok(Self {
            uuid,
            id,
            name,
            kind: kind.map(str::to_string),
            attributes,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Any additional configured field, by name
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    /// Attribute parsed as a duration string (`"60s"`, `"5m"`, ...)
    pub fn get_duration(&self, key: &str) -> Result<Option<Duration>> {
        self.get_str(key).map(parse_duration).transpose()
    }

    /// Attribute keys in declaration order
    pub fn attribute_keys(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> Section {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let r = Resource::new("grid_power", None, None, None, Section::new()).unwrap();
        assert_eq!(r.id(), "grid_power");
        assert_eq!(r.uuid(), "grid_power");
        assert_eq!(r.name(), "grid power");
        assert!(r.kind().is_none());
    }

    #[test]
    fn test_sanitized_id() {
        let r = Resource::new("pv inverter.1", None, None, None, Section::new()).unwrap();
        assert_eq!(r.id(), "pv_inverter_1");
        assert!(Resource::new("", None, None, None, Section::new()).is_err());
    }

    #[test]
    fn test_attributes() {
        let r = Resource::new(
            "bat",
            Some("Battery"),
            Some("storage"),
            Some("site-1/bat"),
            attrs(&[
                ("capacity", serde_json::json!(8.8)),
                ("poll", serde_json::json!("15s")),
            ]),
        )
        .unwrap();

        assert_eq!(r.uuid(), "site-1/bat");
        assert_eq!(r.kind(), Some("storage"));
        assert_eq!(r.get_f64("capacity"), Some(8.8));
        assert_eq!(
            r.get_duration("poll").unwrap(),
            Some(Duration::from_secs(15))
        );
        assert!(r.get("missing").is_none());

        // Declaration order is preserved
        let keys: Vec<&String> = r.attribute_keys().collect();
        assert_eq!(keys, ["capacity", "poll"]);
    }
}
