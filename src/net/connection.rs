//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Run every accepted connection as a tracked task
//! - Generate unique connection IDs for tracing
//! - Hand the live set to the drain step once the listener closes

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinSet;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks connection tasks until the drain step takes them over.
///
/// `None` once closed: no new connection may be tracked after that.
#[derive(Debug)]
pub struct ConnectionTracker {
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl ConnectionTracker {
    /// Create a new, open connection tracker.
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn a connection task. Returns false (dropping `conn`) once closed.
    pub fn spawn<F>(&self, conn: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(tasks) => {
                // Reap finished connections so the set only holds live ones.
                while tasks.try_join_next().is_some() {}
                tasks.spawn(conn);
                true
            }
            None => false,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> usize {
        let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(tasks) => {
                while tasks.try_join_next().is_some() {}
                tasks.len()
            }
            None => 0,
        }
    }

    /// Stop tracking new connections and take over the live ones.
    pub fn close(&self) -> DrainingConnections {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        DrainingConnections { tasks }
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Connections still running when the listener closed.
#[derive(Debug)]
pub struct DrainingConnections {
    tasks: JoinSet<()>,
}

impl DrainingConnections {
    /// Number of connections not yet finished.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait until every connection has finished.
    pub async fn wait(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }

    /// Forcibly close the remaining connections. Returns how many there were.
    pub async fn abort(mut self) -> usize {
        let remaining = self.tasks.len();
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        remaining
    }
}
