//! Background threads that pump one worker role

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::error::{AssetError, Result};
use crate::id::RoleId;
use crate::manager::AssetManager;

/// How long a worker waits for a job before re-checking the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// OS threads dedicated to one role, joined on shutdown or drop
pub struct WorkerPool {
    role: RoleId,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `threads` workers calling `wait_custom_thread(role)` in a loop.
    ///
    /// Workers stop when [`shutdown`](Self::shutdown) is called or when the
    /// manager terminates its queues.
    pub fn spawn(manager: &AssetManager, role: RoleId, threads: usize) -> Result<Self> {
        if role.0 >= manager.config().roles {
            return Err(AssetError::UnknownRole(role));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            role,
            stop: Arc::clone(&stop),
            threads: Vec::with_capacity(threads),
        };
        for index in 0..threads.max(1) {
            let manager = manager.clone();
            let stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name(format!("asset-{role}-{index}"))
                .spawn(move || worker_loop(manager, role, stop))?;
            pool.threads.push(handle);
        }
        debug!(%role, threads = pool.threads.len(), "worker pool started");
        Ok(pool)
    }

    pub fn role(&self) -> RoleId {
        self.role
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Stop and join every worker
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                debug!(role = %self.role, "asset worker panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker_loop(manager: AssetManager, role: RoleId, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        // Termination is the normal way out during shutdown, not an error.
        if manager.wait_custom_thread(role, POLL_INTERVAL).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    #[test]
    fn test_unknown_role_rejected() {
        let manager = AssetManager::with_provider(MemoryProvider::new());
        assert!(matches!(
            WorkerPool::spawn(&manager, RoleId(7), 1),
            Err(AssetError::UnknownRole(RoleId(7)))
        ));
    }

    #[test]
    fn test_terminate_ends_workers() {
        let manager = AssetManager::with_provider(MemoryProvider::new());
        let pool = WorkerPool::spawn(&manager, RoleId(0), 3).unwrap();
        assert_eq!(pool.len(), 3);
        manager.terminate();
        // Join returns because every worker saw Terminated
        pool.shutdown();
    }
}
