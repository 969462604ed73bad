//! Event Ingest Server - Binary Entry Point
//!
//! Reads configuration from the environment, binds the listener and runs
//! until Ctrl+C or SIGTERM, then shuts down in order.

use std::sync::mpsc;
use std::sync::Arc;

use tracing::{error, info, warn};

use event_ingest::logging::init_logging;
use event_ingest::{
    EventStore, FlushCoordinator, IngestError, IngestResult, IngestServer, ServerConfig,
};

fn main() -> IngestResult<()> {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };
    init_logging(&config.log_level);
    info!(version = event_ingest::VERSION, "Starting {}", event_ingest::NAME);

    let store = Arc::new(EventStore::with_config(config.store_config()));
    if let Err(e) = store.initialize_if_absent() {
        warn!(error = %e, "Could not initialize store, flushes will retry");
    }
    match store.load() {
        Ok(events) => info!(path = %store.path().display(), persisted = events.len(), "Store ready"),
        Err(e) => warn!(error = %e, "Could not read store"),
    }

    let coordinator = Arc::new(FlushCoordinator::with_threshold(store, config.flush_threshold));

    let server = IngestServer::bind(&config, coordinator).map_err(|e| {
        error!(error = %e, "Failed to start listener");
        e
    })?;
    let handle = server.spawn()?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| IngestError::Config(format!("failed to install signal handler: {}", e)))?;

    info!(addr = %handle.local_addr(), "Accepting connections");
    let _ = rx.recv();
    info!("Shutdown requested");

    let report = handle.shutdown()?;
    if !report.drained {
        warn!(abandoned = report.abandoned, "Some connections did not finish before shutdown");
    }
    info!(flushed = report.flushed, "Goodbye");
    Ok(())
}
