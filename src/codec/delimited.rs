//! Delimited text codec
//!
//! One event per line: the id, then one `key:value` token per parameter,
//! comma separated.
//!
//! Separators are not escaped. A key containing `,` or `:`, or a value
//! containing `,` or a line break, does not survive a round trip. Values
//! may contain `:` because a token is split at its first colon only.

use crate::types::{Event, EventBatch};

const RECORD_DELIMITER: char = '\n';
const FIELD_DELIMITER: char = ',';
const TOKEN_SEPARATOR: char = ':';

pub(super) fn encode(events: &[Event]) -> String {
    let mut out = String::new();
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            out.push(RECORD_DELIMITER);
        }
        out.push_str(&event.id.to_string());
        for param in &event.parameters {
            out.push(FIELD_DELIMITER);
            out.push_str(&param.key);
            out.push(TOKEN_SEPARATOR);
            out.push_str(&param.value);
        }
    }
    out
}

pub(super) fn decode(text: &str) -> Result<EventBatch, String> {
    let mut events = Vec::new();

    for (line_num, line) in text.split(RECORD_DELIMITER).enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(FIELD_DELIMITER);
        let id_field = fields.next().unwrap_or_default();
        let id = id_field
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("line {}: invalid id '{}': {}", line_num + 1, id_field, e))?;

        let mut event = Event::new(id);
        for token in fields {
            let (key, value) = token.split_once(TOKEN_SEPARATOR).ok_or_else(|| {
                format!(
                    "line {}: parameter '{}' is missing '{}'",
                    line_num + 1,
                    token,
                    TOKEN_SEPARATOR
                )
            })?;
            event.push_parameter(key, value);
        }
        events.push(event);
    }

    Ok(events)
}
