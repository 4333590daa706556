//! OS signal handling.
//!
//! # Responsibilities
//! - Watch for SIGINT/SIGTERM (Ctrl+C elsewhere)
//! - Turn a received signal into a finished run-group task
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A signal ends the task with `Interrupted` so the group stops; callers
//!   treat `Interrupted` as a clean exit
//! - The task also returns when the group stops for another reason

use crate::lifecycle::{BoxError, StopSignal, Task};

/// The process was asked to stop by an OS signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by {signal}")]
pub struct Interrupted {
    pub signal: &'static str,
}

/// Task that ends when an interrupt or terminate signal arrives.
pub fn watch_task() -> Task {
    Task::new("signals", |stop: StopSignal| async move {
        tokio::select! {
            received = wait_for_signal() => {
                let signal = received?;
                tracing::info!(signal, "Shutdown signal received");
                Err::<(), BoxError>(Box::new(Interrupted { signal }))
            }
            _ = stop.fired() => Ok(()),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
