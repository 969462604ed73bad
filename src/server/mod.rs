//! Connection Dispatcher
//!
//! A dedicated thread blocks on `accept` and hands every connection to the
//! worker pool. Shutdown is explicit and ordered:
//!
//! ```text
//! stop accept loop ──► join accept thread ──► drain workers ──► shutdown_flush
//! ```

mod connection;
mod framing;
mod pool;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{IngestError, IngestResult};
use crate::flush::{FlushCoordinator, FlushStats};

pub use connection::{handle_connection, ingest_request, ConnectionContext};
pub use framing::{extract_post_body, success_response};
pub use pool::WorkerPool;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound listener plus worker pool, not yet accepting
pub struct IngestServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: WorkerPool,
    context: Arc<ConnectionContext>,
    drain_timeout: Duration,
}

impl IngestServer {
    /// Bind `0.0.0.0:<port>` from config
    pub fn bind(config: &ServerConfig, coordinator: Arc<FlushCoordinator>) -> IngestResult<Self> {
        Self::bind_to(config.bind_addr(), config, coordinator)
    }

    /// Bind an explicit address; the rest comes from config
    pub fn bind_to(
        addr: SocketAddr,
        config: &ServerConfig,
        coordinator: Arc<FlushCoordinator>,
    ) -> IngestResult<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| IngestError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let pool = WorkerPool::new(config.worker_count())?;

        info!(addr = %local_addr, workers = pool.size(), codec = %config.codec, "Listener bound");

        Ok(Self {
            listener,
            local_addr,
            pool,
            context: Arc::new(ConnectionContext {
                codec: config.codec,
                coordinator,
                read_timeout: config.read_timeout,
                max_request_bytes: config.max_request_bytes,
            }),
            drain_timeout: config.drain_timeout,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the accept loop on its own thread
    pub fn spawn(self) -> IngestResult<ServerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let pool = Arc::new(self.pool);
        let coordinator = Arc::clone(&self.context.coordinator);

        let accept_thread = {
            let stop = Arc::clone(&stop);
            let pool = Arc::clone(&pool);
            let listener = self.listener;
            let context = self.context;
            thread::Builder::new()
                .name("ingest-accept".to_string())
                .spawn(move || accept_loop(listener, &pool, context, &stop))?
        };

        Ok(ServerHandle {
            local_addr: self.local_addr,
            stop,
            accept_thread: Some(accept_thread),
            pool,
            coordinator,
            drain_timeout: self.drain_timeout,
        })
    }
}

fn accept_loop(
    listener: TcpListener,
    pool: &WorkerPool,
    context: Arc<ConnectionContext>,
    stop: &AtomicBool,
) {
    for stream in listener.incoming() {
        let stopping = stop.load(Ordering::SeqCst);
        match stream {
            // The connection that observes the stop flag is served too
            Ok(stream) => {
                let context = Arc::clone(&context);
                pool.execute(move || handle_connection(stream, &context));
            }
            Err(e) if !stopping => {
                warn!(error = %e, "Accept failed");
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(_) => {}
        }
        if stopping {
            break;
        }
    }
    debug!("Accept loop stopped");
}

/// Wake a blocked `accept` and join the accept thread
///
/// If the wake connection cannot be made the thread is left detached and
/// `false` is returned, so shutdown never blocks on a join that cannot end.
fn stop_accept_thread(accept_thread: JoinHandle<()>, addr: SocketAddr) -> bool {
    match TcpStream::connect_timeout(&wake_addr(addr), WAKE_TIMEOUT) {
        Ok(_) => {
            if accept_thread.join().is_err() {
                error!("Accept thread panicked");
            }
            true
        }
        Err(e) => {
            error!(addr = %addr, error = %e, "Could not wake accept loop, leaving it detached");
            false
        }
    }
}

/// Outcome of a graceful shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// All in-flight connections finished within the drain timeout
    pub drained: bool,
    /// Connections still running when the drain gave up
    pub abandoned: usize,
    /// Events written by the final flush
    pub flushed: usize,
    /// Counters after the final flush
    pub stats: FlushStats,
}

/// Running server
///
/// Call [`ServerHandle::shutdown`] to stop it. Dropping a handle that was
/// not shut down runs the same sequence and logs the outcome.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    pool: Arc<WorkerPool>,
    coordinator: Arc<FlushCoordinator>,
    drain_timeout: Duration,
}

impl ServerHandle {
    /// Address the server listens on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Coordinator fed by this server
    pub fn coordinator(&self) -> &Arc<FlushCoordinator> {
        &self.coordinator
    }

    /// Stop accepting, drain workers, then flush what is buffered
    pub fn shutdown(mut self) -> IngestResult<ShutdownReport> {
        self.stop_and_flush()
    }

    fn stop_and_flush(&mut self) -> IngestResult<ShutdownReport> {
        if let Some(accept_thread) = self.accept_thread.take() {
            info!(addr = %self.local_addr, "Stopping accept loop");
            self.stop.store(true, Ordering::SeqCst);
            stop_accept_thread(accept_thread, self.local_addr);
        }

        let drained = self.pool.drain(self.drain_timeout);
        let abandoned = self.pool.in_flight();
        if drained {
            debug!("Worker pool drained");
        } else {
            warn!(abandoned, timeout = ?self.drain_timeout, "Drain timed out, continuing shutdown");
        }

        let flushed = self.coordinator.shutdown_flush()?;
        let stats = self.coordinator.stats();
        info!(
            flushes = stats.flushes,
            persisted = stats.events_persisted,
            dropped = stats.events_dropped,
            buffered = stats.buffered,
            "Server stopped"
        );

        Ok(ShutdownReport {
            drained,
            abandoned,
            flushed,
            stats,
        })
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.accept_thread.is_none() {
            return;
        }
        warn!("Server handle dropped without shutdown, shutting down now");
        if let Err(e) = self.stop_and_flush() {
            error!(error = %e, "Shutdown flush failed");
        }
    }
}

/// Loopback address that reaches a listener bound to `addr`
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}
