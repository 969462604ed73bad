//! Data types for the event ingestion server
//!
//! This module contains the event model shared by the codecs, the store
//! and the flush coordinator.

mod event;

pub use event::{Event, EventBatch, Parameter};
