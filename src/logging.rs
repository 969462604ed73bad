//! Logging setup
//!
//! Logs go to stderr through a `tracing-subscriber` fmt layer. `RUST_LOG`
//! takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging("debug");
        init_logging("not a valid [filter");
    }
}
