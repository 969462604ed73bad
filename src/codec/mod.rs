//! Serialization formats for event batches
//!
//! A [`Codec`] is chosen once, when the store is constructed, and the same
//! value is used both to decode request bodies and to encode the persisted
//! collection.
//!
//! # Formats
//!
//! ```text
//! Xml        <events><event><id>7</id><parameters><parameter><key>level</key>...
//! Json       [{"id":7,"parameters":[{"key":"level","value":"2"}]}]
//! Delimited  7,level:2,score:100      (one event per line)
//! ```

mod delimited;
mod json;
mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::types::{Event, EventBatch};

/// Encoding used for request bodies and the persisted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    Xml,
    Json,
    #[default]
    Delimited,
}

impl Codec {
    /// All supported codecs
    pub const ALL: [Codec; 3] = [Codec::Xml, Codec::Json, Codec::Delimited];

    /// Encode a batch to text
    pub fn encode(&self, events: &[Event]) -> IngestResult<String> {
        let encoded = match self {
            Codec::Xml => xml::encode(events),
            Codec::Json => json::encode(events),
            Codec::Delimited => Ok(delimited::encode(events)),
        };
        encoded.map_err(|reason| IngestError::EncodeFailure {
            codec: *self,
            reason,
        })
    }

    /// Decode text to a batch
    ///
    /// Malformed input fails as a whole; no partial batch is returned.
    pub fn decode(&self, text: &str) -> IngestResult<EventBatch> {
        let decoded = match self {
            Codec::Xml => xml::decode(text),
            Codec::Json => json::decode(text),
            Codec::Delimited => delimited::decode(text),
        };
        decoded.map_err(|reason| IngestError::DecodeFailure {
            codec: *self,
            reason,
        })
    }

    /// Encoding of an empty collection, written when a store is created
    pub fn empty_collection(&self) -> IngestResult<String> {
        self.encode(&[])
    }

    /// File extension for stores using this codec
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Xml => "xml",
            Codec::Json => "json",
            Codec::Delimited => "csv",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Xml => write!(f, "xml"),
            Codec::Json => write!(f, "json"),
            Codec::Delimited => write!(f, "delimited"),
        }
    }
}

impl FromStr for Codec {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(Codec::Xml),
            "json" => Ok(Codec::Json),
            "csv" | "delimited" => Ok(Codec::Delimited),
            other => Err(IngestError::Config(format!(
                "unknown codec '{}' (expected xml, json or csv)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Parameter;
    use proptest::prelude::*;

    fn sample_batch() -> EventBatch {
        vec![
            Event::new(1),
            Event::new(7)
                .with_parameter("level", "2")
                .with_parameter("score", "100"),
            Event::new(-3)
                .with_parameter("tag", "a")
                .with_parameter("tag", "b")
                .with_parameter("empty", ""),
        ]
    }

    #[test]
    fn test_round_trip_all_codecs() {
        let batch = sample_batch();
        for codec in Codec::ALL {
            let text = codec.encode(&batch).unwrap();
            let decoded = codec.decode(&text).unwrap();
            assert_eq!(decoded, batch, "round trip failed for {}", codec);
        }
    }

    /// Strings for keys and values, including surrounding whitespace,
    /// markup characters and line breaks
    const FREE_TEXT: &str = "[ -~\t\né€✓]{0,12}";
    /// Delimited keys cannot contain `,` or `:`, values cannot contain `,`
    const DELIMITED_KEY: &str = "[ -+\\--9;-~\té€]{0,8}";
    const DELIMITED_VALUE: &str = "[ -+\\--~\té€]{0,12}";

    fn arb_batch(
        key: &'static str,
        value: &'static str,
    ) -> impl Strategy<Value = EventBatch> {
        let parameter = (key, value).prop_map(|(k, v)| Parameter::new(k, v));
        let event = (any::<i64>(), prop::collection::vec(parameter, 0..4))
            .prop_map(|(id, parameters)| Event { id, parameters });
        prop::collection::vec(event, 0..6)
    }

    proptest! {
        #[test]
        fn test_xml_round_trips_any_batch(batch in arb_batch(FREE_TEXT, FREE_TEXT)) {
            let text = Codec::Xml.encode(&batch).unwrap();
            prop_assert_eq!(Codec::Xml.decode(&text).unwrap(), batch);
        }

        #[test]
        fn test_json_round_trips_any_batch(batch in arb_batch(FREE_TEXT, FREE_TEXT)) {
            let text = Codec::Json.encode(&batch).unwrap();
            prop_assert_eq!(Codec::Json.decode(&text).unwrap(), batch);
        }

        #[test]
        fn test_delimited_round_trips_batch_without_separators(
            batch in arb_batch(DELIMITED_KEY, DELIMITED_VALUE)
        ) {
            let text = Codec::Delimited.encode(&batch).unwrap();
            prop_assert_eq!(Codec::Delimited.decode(&text).unwrap(), batch);
        }
    }

    #[test]
    fn test_empty_batch_round_trip_all_codecs() {
        for codec in Codec::ALL {
            let text = codec.empty_collection().unwrap();
            let decoded = codec.decode(&text).unwrap();
            assert!(decoded.is_empty(), "empty round trip failed for {}", codec);
        }
    }

    #[test]
    fn test_malformed_input_is_decode_failure() {
        for codec in Codec::ALL {
            let err = codec.decode("{{ not a batch").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DecodeFailure, "codec {}", codec);
        }
    }

    #[test]
    fn test_parse_codec_names() {
        assert_eq!("xml".parse::<Codec>().unwrap(), Codec::Xml);
        assert_eq!("JSON".parse::<Codec>().unwrap(), Codec::Json);
        assert_eq!("csv".parse::<Codec>().unwrap(), Codec::Delimited);
        assert_eq!("delimited".parse::<Codec>().unwrap(), Codec::Delimited);
        assert!("yaml".parse::<Codec>().is_err());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Codec::Xml.extension(), "xml");
        assert_eq!(Codec::Json.extension(), "json");
        assert_eq!(Codec::Delimited.extension(), "csv");
    }
}
