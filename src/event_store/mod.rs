//! Event Store Module
//!
//! This module owns the persisted collection:
//! - `EventStore`: read-merge-write of the whole collection under one lock
//! - `EventStoreConfig`: base path and codec selection
//!
//! # Architecture
//!
//! ```text
//! Merge Path:
//! ┌────────────┐    ┌───────────┐    ┌──────────────┐    ┌────────────────┐
//! │ store lock │───►│ read file │───►│ decode +     │───►│ encode, write  │
//! │            │    │           │    │ append batch │    │ .tmp + rename  │
//! └────────────┘    └───────────┘    └──────────────┘    └────────────────┘
//! ```

mod store;

pub use store::{EventStore, EventStoreConfig};
