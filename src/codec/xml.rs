//! XML codec
//!
//! ```text
//! <events>
//!   <event>
//!     <id>7</id>
//!     <parameters>
//!       <parameter><key>level</key><value>2</value></parameter>
//!     </parameters>
//!   </event>
//! </events>
//! ```
//!
//! Keys and values are written as escaped text and read back verbatim,
//! whitespace included. Whitespace between elements is ignored.

use quick_xml::escape::escape;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;

use crate::types::{Event, EventBatch};

const ROOT: &str = "events";

pub(super) fn encode(events: &[Event]) -> Result<String, String> {
    let mut out = String::new();
    out.push_str("<events>");
    for event in events {
        out.push_str("<event><id>");
        out.push_str(&event.id.to_string());
        out.push_str("</id>");
        if !event.parameters.is_empty() {
            out.push_str("<parameters>");
            for param in &event.parameters {
                out.push_str("<parameter><key>");
                out.push_str(&escape(param.key.as_str()));
                out.push_str("</key><value>");
                out.push_str(&escape(param.value.as_str()));
                out.push_str("</value></parameter>");
            }
            out.push_str("</parameters>");
        }
        out.push_str("</event>");
    }
    out.push_str("</events>");
    Ok(out)
}

/// Leaf element whose text is being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Key,
    Value,
}

/// Partially read `<event>`
#[derive(Debug, Default)]
struct PendingEvent {
    id: Option<i64>,
    parameters: Vec<(String, String)>,
}

/// Partially read `<parameter>`
#[derive(Debug, Default)]
struct PendingParameter {
    key: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Default)]
struct DocumentState {
    in_root: bool,
    root_closed: bool,
    event: Option<PendingEvent>,
    parameter: Option<PendingParameter>,
    field: Option<Field>,
    text: String,
    events: EventBatch,
}

impl DocumentState {
    fn open(&mut self, name: &[u8]) -> Result<(), String> {
        match name {
            b"events" if !self.in_root && !self.root_closed => self.in_root = true,
            b"event" if self.in_root && self.event.is_none() => {
                self.event = Some(PendingEvent::default())
            }
            b"parameters" if self.event.is_some() && self.parameter.is_none() => {}
            b"parameter" if self.event.is_some() && self.parameter.is_none() => {
                self.parameter = Some(PendingParameter::default())
            }
            b"id" if self.event.is_some() && self.parameter.is_none() => self.begin(Field::Id),
            b"key" if self.parameter.is_some() => self.begin(Field::Key),
            b"value" if self.parameter.is_some() => self.begin(Field::Value),
            other => {
                return Err(format!(
                    "unexpected element <{}>",
                    String::from_utf8_lossy(other)
                ))
            }
        }
        Ok(())
    }

    fn begin(&mut self, field: Field) {
        self.field = Some(field);
        self.text.clear();
    }

    fn text(&mut self, text: &str) -> Result<(), String> {
        if self.field.is_some() {
            self.text.push_str(text);
            Ok(())
        } else if text.trim().is_empty() {
            Ok(())
        } else {
            Err(format!("unexpected text '{}'", text.trim()))
        }
    }

    fn close(&mut self, name: &[u8]) -> Result<(), String> {
        match name {
            b"id" | b"key" | b"value" => self.finish_field(),
            b"parameter" => {
                let param = self.parameter.take().unwrap_or_default();
                let key = param.key.ok_or("parameter without <key>")?;
                let value = param.value.unwrap_or_default();
                if let Some(event) = self.event.as_mut() {
                    event.parameters.push((key, value));
                }
                Ok(())
            }
            b"event" => {
                let pending = self.event.take().unwrap_or_default();
                let id = pending.id.ok_or("event without <id>")?;
                let mut event = Event::new(id);
                for (key, value) in pending.parameters {
                    event.push_parameter(key, value);
                }
                self.events.push(event);
                Ok(())
            }
            b"events" => {
                self.in_root = false;
                self.root_closed = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn finish_field(&mut self) -> Result<(), String> {
        let text = std::mem::take(&mut self.text);
        match self.field.take() {
            Some(Field::Id) => {
                let id = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| format!("invalid id '{}': {}", text, e))?;
                if let Some(event) = self.event.as_mut() {
                    event.id = Some(id);
                }
            }
            Some(Field::Key) => {
                if let Some(param) = self.parameter.as_mut() {
                    param.key = Some(text);
                }
            }
            Some(Field::Value) => {
                if let Some(param) = self.parameter.as_mut() {
                    param.value = Some(text);
                }
            }
            None => {}
        }
        Ok(())
    }
}

pub(super) fn decode(text: &str) -> Result<EventBatch, String> {
    if !text.trim_start().starts_with('<') {
        return Err(format!("expected an <{}> element", ROOT));
    }

    let mut reader = Reader::from_str(text);
    let mut state = DocumentState::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            XmlEvent::Start(e) => state.open(e.name().as_ref())?,
            XmlEvent::Empty(e) => {
                let name = e.name();
                state.open(name.as_ref())?;
                state.close(name.as_ref())?;
            }
            XmlEvent::End(e) => state.close(e.name().as_ref())?,
            XmlEvent::Text(e) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                state.text(&text)?;
            }
            XmlEvent::CData(e) => {
                let text = std::str::from_utf8(&e).map_err(|e| e.to_string())?;
                state.text(text)?;
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !state.root_closed {
        return Err(format!("missing closing </{}>", ROOT));
    }
    Ok(state.events)
}
