//! Event types for ingestion
//!
//! An event is an integer id plus an ordered list of string key/value
//! parameters. Parameter keys are not unique and their order is preserved
//! through every codec.

use serde::{Deserialize, Serialize};

/// A single key/value pair attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    /// Create a new parameter
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One ingested record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Event {
    /// Client-assigned event id
    pub id: i64,

    /// Ordered parameters, duplicates allowed
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Event {
    /// Create an event with no parameters
    pub fn new(id: i64) -> Self {
        Self {
            id,
            parameters: Vec::new(),
        }
    }

    /// Append a parameter (builder style)
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_parameter(key, value);
        self
    }

    /// Append a parameter in place
    pub fn push_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(key, value));
    }

    /// First value recorded under `key`, if any
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// Ordered sequence of events exchanged between ingestion and storage
pub type EventBatch = Vec<Event>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_parameter_order() {
        let event = Event::new(7)
            .with_parameter("level", "2")
            .with_parameter("score", "100")
            .with_parameter("level", "3");

        let keys: Vec<&str> = event.parameters.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["level", "score", "level"]);
    }

    #[test]
    fn test_get_returns_first_match() {
        let event = Event::new(1)
            .with_parameter("level", "2")
            .with_parameter("level", "9");

        assert_eq!(event.get("level"), Some("2"));
        assert_eq!(event.get("missing"), None);
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::new(7).with_parameter("level", "2");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"id":7,"parameters":[{"key":"level","value":"2"}]}"#);
    }

    #[test]
    fn test_missing_parameters_default_to_empty() {
        let event: Event = serde_json::from_str(r#"{"id":3}"#).unwrap();
        assert_eq!(event, Event::new(3));
    }
}
