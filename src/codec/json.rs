//! JSON array codec

use crate::types::{Event, EventBatch};

pub(super) fn encode(events: &[Event]) -> Result<String, String> {
    serde_json::to_string(events).map_err(|e| e.to_string())
}

pub(super) fn decode(text: &str) -> Result<EventBatch, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_array() {
        assert_eq!(encode(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_decode_accepts_whitespace() {
        let text = r#"
            [ { "id": 2, "parameters": [ { "key": "k", "value": "v" } ] } ]
        "#;
        let events = decode(text).unwrap();
        assert_eq!(events, vec![Event::new(2).with_parameter("k", "v")]);
    }

    #[test]
    fn test_decode_rejects_object() {
        assert!(decode(r#"{"id":1}"#).is_err());
    }
}
