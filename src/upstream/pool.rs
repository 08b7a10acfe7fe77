//! Backend pool management.
//!
//! # Responsibilities
//! - Hold up to `capacity` idle backends in FIFO order
//! - Hand out an idle backend, or dial a fresh one after a bounded wait
//! - Take backends back, or close them when no slot frees up in time
//!
//! # Design Decisions
//! - The idle set is a bounded `mpsc` channel; the channel bound is the
//!   capacity, so the pool can never hold more than `capacity` backends
//! - The receiver sits behind an async mutex so many tasks can acquire;
//!   waiters queue fairly on the lock
//! - Both directions are bounded by timeouts; nothing blocks forever
//! - No health check on reuse: a backend the origin already closed fails
//!   on first use and is handled by the caller's failure path

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::Mutex;

use crate::config::PoolConfig;
use crate::observability::metrics;
use crate::upstream::backend::Backend;
use crate::upstream::origin::{DialError, Origin};

/// Bounded FIFO of idle backends to a single origin.
#[derive(Debug)]
pub struct BackendPool {
    origin: Origin,
    idle_tx: mpsc::Sender<Backend>,
    idle_rx: Mutex<mpsc::Receiver<Backend>>,
    capacity: usize,
    acquire_wait: Duration,
    release_wait: Duration,
}

impl BackendPool {
    /// Create an empty pool.
    ///
    /// # Panics
    /// If `config.capacity` is zero; validation rejects that earlier.
    pub fn new(origin: Origin, config: &PoolConfig) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(config.capacity);
        Self {
            origin,
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
            capacity: config.capacity,
            acquire_wait: config.acquire_wait(),
            release_wait: config.release_wait(),
        }
    }

    /// Take an idle backend, waiting at most `acquire_wait` for one; after
    /// that, dial the origin once. Dial errors are returned, not retried.
    pub async fn acquire(&self) -> Result<Backend, DialError> {
        let idle = tokio::time::timeout(self.acquire_wait, async {
            self.idle_rx.lock().await.recv().await
        })
        .await;

        if let Ok(Some(backend)) = idle {
            metrics::record_acquire("idle");
            metrics::record_pool_idle(self.idle_count());
            tracing::trace!(backend_id = %backend.id(), "Reusing idle backend");
            return Ok(backend);
        }

        match self.origin.dial().await {
            Ok(backend) => {
                metrics::record_acquire("dial");
                Ok(backend)
            }
            Err(e) => {
                metrics::record_dial_failure();
                Err(e)
            }
        }
    }

    /// Return a backend to the idle queue, waiting at most `release_wait`
    /// for a free slot. If the pool stays full, the backend is closed.
    pub async fn release(&self, backend: Backend) {
        let id = backend.id();
        match self.idle_tx.send_timeout(backend, self.release_wait).await {
            Ok(()) => {
                tracing::trace!(backend_id = %id, "Backend returned to pool");
                metrics::record_release("queued", self.idle_count());
            }
            Err(SendTimeoutError::Timeout(backend)) | Err(SendTimeoutError::Closed(backend)) => {
                tracing::debug!(backend_id = %id, capacity = self.capacity, "Pool full, discarding backend");
                backend.close("pool_full").await;
                metrics::record_release("discarded", self.idle_count());
            }
        }
    }

    /// Release on a spawned task so the caller can move on immediately.
    ///
    /// The task is bounded by `release_wait`; at shutdown it may be abandoned.
    pub fn release_in_background(self: &Arc<Self>, backend: Backend) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            pool.release(backend).await;
        });
    }

    /// Number of idle backends currently queued.
    pub fn idle_count(&self) -> usize {
        self.capacity - self.idle_tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquire_wait(&self) -> Duration {
        self.acquire_wait
    }

    pub fn release_wait(&self) -> Duration {
        self.release_wait
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}
