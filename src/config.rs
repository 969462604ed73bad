//! Process configuration
//!
//! Everything is fixed at startup. Values come from `EVENT_INGEST_*`
//! environment variables, falling back to defaults.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::codec::Codec;
use crate::error::{IngestError, IngestResult};
use crate::event_store::EventStoreConfig;
use crate::flush::DEFAULT_FLUSH_THRESHOLD;

const ENV_PREFIX: &str = "EVENT_INGEST_";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port, bound on all interfaces
    pub port: u16,
    /// Store base path; the codec adds the extension
    pub store_path: PathBuf,
    /// Codec for request bodies and the store file
    pub codec: Codec,
    /// Buffered events that trigger a flush
    pub flush_threshold: usize,
    /// Lower bound for the worker pool size
    pub min_workers: usize,
    /// Upper bound for the worker pool size
    pub max_workers: usize,
    /// How long a worker waits for request bytes
    pub read_timeout: Duration,
    /// How long shutdown waits for in-flight connections
    pub drain_timeout: Duration,
    /// Requests are truncated beyond this size
    pub max_request_bytes: usize,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

fn available_processors() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Default for ServerConfig {
    fn default() -> Self {
        let processors = available_processors();
        Self {
            port: 8080,
            store_path: PathBuf::from("events"),
            codec: Codec::Delimited,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            min_workers: processors,
            max_workers: processors * 2,
            read_timeout: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(5),
            max_request_bytes: 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Keys are the full variable names, e.g. `EVENT_INGEST_PORT`.
    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(key.as_str())
        };
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            config.port = parse_value("PORT", &port)?;
        }
        if let Some(path) = get("STORE_PATH") {
            config.store_path = resolve_path(&path);
        }
        if let Some(codec) = get("CODEC") {
            config.codec = codec.parse()?;
        }
        if let Some(threshold) = get("FLUSH_THRESHOLD") {
            config.flush_threshold = parse_value("FLUSH_THRESHOLD", &threshold)?;
        }
        if let Some(min) = get("MIN_WORKERS") {
            config.min_workers = parse_value("MIN_WORKERS", &min)?;
        }
        if let Some(max) = get("MAX_WORKERS") {
            config.max_workers = parse_value("MAX_WORKERS", &max)?;
        }
        if let Some(ms) = get("READ_TIMEOUT_MS") {
            config.read_timeout = Duration::from_millis(parse_value("READ_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = get("DRAIN_TIMEOUT_MS") {
            config.drain_timeout = Duration::from_millis(parse_value("DRAIN_TIMEOUT_MS", &ms)?);
        }
        if let Some(bytes) = get("MAX_REQUEST_BYTES") {
            config.max_request_bytes = parse_value("MAX_REQUEST_BYTES", &bytes)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> IngestResult<()> {
        if self.flush_threshold == 0 {
            return Err(IngestError::Config("flush threshold must be at least 1".into()));
        }
        if self.min_workers == 0 {
            return Err(IngestError::Config("min_workers must be at least 1".into()));
        }
        if self.max_workers < self.min_workers {
            return Err(IngestError::Config(format!(
                "max_workers ({}) is below min_workers ({})",
                self.max_workers, self.min_workers
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(IngestError::Config("read timeout must be non-zero".into()));
        }
        if self.max_request_bytes == 0 {
            return Err(IngestError::Config("max_request_bytes must be at least 1".into()));
        }
        Ok(())
    }

    /// Address to listen on
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Worker pool size: available processors clamped to the configured bounds
    pub fn worker_count(&self) -> usize {
        available_processors().clamp(self.min_workers, self.max_workers.max(self.min_workers))
    }

    /// Store settings derived from this config
    pub fn store_config(&self) -> EventStoreConfig {
        EventStoreConfig::new(&self.store_path, self.codec)
    }
}

fn parse_value<T>(name: &str, raw: &str) -> IngestResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        IngestError::Config(format!("{}{}='{}': {}", ENV_PREFIX, name, raw, e))
    })
}

fn resolve_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(dir) => dir.join(path),
        Err(_) => path.to_path_buf(),
    }
}
