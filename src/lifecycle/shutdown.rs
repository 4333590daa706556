//! Stop signal shared by the tasks of a run group.

use tokio_util::sync::CancellationToken;

/// Broadcast stop signal.
///
/// Every clone observes the same signal. Firing is idempotent: the first
/// `fire` wakes all current and future waiters, later calls do nothing.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    /// Create a new, unfired stop signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal.
    pub fn fire(&self) {
        self.token.cancel();
    }

    /// Returns true once the signal has been fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal is fired.
    ///
    /// Resolves immediately if it already was.
    pub async fn fired(&self) {
        self.token.cancelled().await
    }
}
