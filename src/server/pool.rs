//! Bounded worker pool
//!
//! A fixed set of OS threads (rayon) runs one job per accepted connection.
//! Jobs beyond the thread count queue inside the pool. The pool tracks jobs
//! that have been submitted but not finished so shutdown can wait for them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use crate::error::{IngestError, IngestResult};

#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Decrements the in-flight count when a job ends, including by panic
struct JobGuard(Arc<InFlight>);

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Fixed-size pool of connection workers
pub struct WorkerPool {
    pool: ThreadPool,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    /// Start `workers` threads (minimum 1)
    pub fn new(workers: usize) -> IngestResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("ingest-worker-{}", i))
            .panic_handler(|_| error!("Connection worker panicked"))
            .build()
            .map_err(|e| IngestError::Config(format!("failed to start worker pool: {}", e)))?;

        Ok(Self {
            pool,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Jobs submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    /// Run `job` on a worker; fire and forget
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.in_flight.count.lock() += 1;
        let guard = JobGuard(Arc::clone(&self.in_flight));
        self.pool.spawn(move || {
            let _guard = guard;
            job();
        });
    }

    /// Wait up to `timeout` for every submitted job to finish
    ///
    /// Returns false if jobs were still running when the wait gave up.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            if self.in_flight.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_pool_size() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(WorkerPool::new(0).unwrap().size(), 1);
    }

    #[test]
    fn test_drain_waits_for_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(10));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(pool.drain(Duration::from_secs(10)));
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_drain_times_out() {
        let pool = WorkerPool::new(1).unwrap();
        pool.execute(|| thread::sleep(Duration::from_millis(500)));

        assert!(!pool.drain(Duration::from_millis(20)));
        assert!(pool.drain(Duration::from_secs(10)));
    }

    #[test]
    fn test_panicking_job_is_counted_done() {
        let pool = WorkerPool::new(1).unwrap();
        pool.execute(|| panic!("boom"));

        assert!(pool.drain(Duration::from_secs(10)));
    }
}
