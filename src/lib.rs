//! Event Ingest Server
//!
//! Accepts event batches over plain TCP (a minimal HTTP POST), buffers
//! them in memory and periodically merges the buffer into a single
//! persisted collection file in XML, JSON or delimited-text form.
//!
//! # Features
//!
//! - **Bounded worker pool**: one OS-thread job per accepted connection
//! - **Threshold flushing**: the buffer is merged every N events
//! - **Read-merge-write store**: the whole collection is re-encoded and
//!   atomically replaced on every flush
//! - **Pluggable codecs**: chosen once per store
//! - **Deterministic shutdown**: drain workers, then flush what is left
//!
//! # Modules
//!
//! - `types`: Event model (Event, Parameter, EventBatch)
//! - `codec`: XML / JSON / delimited encoders
//! - `event_store`: Persisted collection with read-merge-write
//! - `flush`: Pending buffer and flush coordination
//! - `server`: TCP dispatcher, worker pool and request framing
//! - `config`: Environment-driven configuration
//! - `error`: Error taxonomy
//! - `logging`: tracing subscriber setup
//! - `utils`: Atomic file replacement
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_ingest::{EventStore, FlushCoordinator, IngestServer, ServerConfig};
//!
//! fn main() -> event_ingest::IngestResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let store = Arc::new(EventStore::with_config(config.store_config()));
//!     store.initialize_if_absent()?;
//!     let coordinator = Arc::new(FlushCoordinator::with_threshold(store, config.flush_threshold));
//!     let handle = IngestServer::bind(&config, coordinator)?.spawn()?;
//!     // ... wait for a shutdown signal ...
//!     handle.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod event_store;
pub mod flush;
pub mod logging;
pub mod server;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use codec::Codec;
pub use config::ServerConfig;
pub use error::{ErrorKind, IngestError, IngestResult};
pub use event_store::{EventStore, EventStoreConfig};
pub use flush::{FlushCoordinator, FlushStats};
pub use server::{IngestServer, ServerHandle, ShutdownReport};
pub use types::{Event, EventBatch, Parameter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
