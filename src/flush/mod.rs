//! Flush coordination between ingestion workers and the event store
//!
//! Two locks are involved and they are never nested:
//! - the buffer lock, held only to add events or swap the buffer out
//! - the store lock, held for the whole read-merge-write of a flush
//!
//! ```text
//! append ──► [buffer lock: extend, swap if ≥ threshold] ──► merge_and_persist ──► [store lock]
//! ```

mod coordinator;
mod stats;

pub use coordinator::{FlushCoordinator, DEFAULT_FLUSH_THRESHOLD};
pub use stats::FlushStats;
