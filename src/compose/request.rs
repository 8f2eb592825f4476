//! Scenario requests

use serde::Deserialize;

use super::ComposeError;
use crate::template::{Bindings, Value};

/// What a composed scenario must contain.
///
/// In TOML, entries are written as `[[entry]]` tables:
///
/// ```toml
/// base = "base"
///
/// [bindings]
/// batchmode = true
///
/// [[entry]]
/// template = "platform_ground"
/// bindings = { object_name = "GS-1", latitude = 40.4, longitude = -3.9, altitude = 0.6, body = "Earth" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioRequest {
    /// Base template id
    pub base: String,
    /// Bindings for the base template
    #[serde(default)]
    pub bindings: Bindings,
    /// Entries, in request order
    #[serde(default, rename = "entry")]
    pub entries: Vec<EntryRequest>,
}

/// One fragment to add
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntryRequest {
    pub template: String,
    #[serde(default)]
    pub bindings: Bindings,
}

impl ScenarioRequest {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            bindings: Bindings::new(),
            entries: Vec::new(),
        }
    }

    /// Read a request from TOML
    pub fn from_toml(content: &str) -> Result<Self, ComposeError> {
        Ok(toml::from_str(content)?)
    }

    /// Bind a base template placeholder
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Add an entry
    pub fn with_entry(mut self, entry: EntryRequest) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn push(&mut self, entry: EntryRequest) {
        self.entries.push(entry);
    }
}

impl EntryRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            bindings: Bindings::new(),
        }
    }

    /// Bind a placeholder
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let request = ScenarioRequest::from_toml(
            r#"
base = "base"

[bindings]
batchmode = true
epoch = { timestamp = "2024-01-01T00:00:00" }

[[entry]]
template = "platform_ground"
bindings = { object_name = "GS-1", latitude = 40.4, body = "Earth" }

[[entry]]
template = "transmitter"
bindings = { object_name = "GS-1" }
"#,
        )
        .expect("Should parse");
        assert_eq!(request.base, "base");
        assert_eq!(request.bindings["batchmode"], Value::Bool(true));
        assert_eq!(request.entries.len(), 2);
        assert_eq!(request.entries[0].bindings["latitude"], Value::Float(40.4));
        assert_eq!(request.entries[1].template, "transmitter");
    }

    #[test]
    fn test_from_toml_rejects_missing_base() {
        let result = ScenarioRequest::from_toml("[[entry]]\ntemplate = \"x\"\n");
        assert!(matches!(result, Err(ComposeError::Request(_))));
    }

    #[test]
    fn test_builder() {
        let request = ScenarioRequest::new("base")
            .with_binding("warnings", false)
            .with_entry(EntryRequest::new("link").with("link_name", "A - B"));
        assert_eq!(request.entries[0].bindings["link_name"], Value::text("A - B"));
        assert_eq!(request.bindings["warnings"], Value::Bool(false));
    }
}
