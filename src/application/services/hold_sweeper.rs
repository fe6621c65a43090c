//! # Hold Sweeper
//!
//! Background task that completes held credits once their hold has elapsed.
//!
//! Balances already treat matured credits as available at read time; the
//! sweep persists the transition so that transaction queries and exports
//! show the settled status.

use crate::application::error::ApplicationResult;
use crate::domain::value_objects::Timestamp;
use crate::infrastructure::persistence::LedgerStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Periodically releases matured credits.
#[derive(Debug, Clone)]
pub struct HoldSweeper {
    ledger: Arc<dyn LedgerStore>,
    interval: Duration,
}

impl HoldSweeper {
    /// Creates a sweeper running every `interval`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// Runs one sweep as of `as_of` and returns the number of released
    /// credits.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn sweep(&self, as_of: Timestamp) -> ApplicationResult<usize> {
        let released = self.ledger.release_matured(as_of).await?;
        if released > 0 {
            info!(released, as_of = %as_of, "Released matured credits");
        } else {
            debug!(as_of = %as_of, "No credits to release");
        }
        Ok(released)
    }

    /// Starts the sweep loop on the runtime.
    #[must_use]
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = self.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "Hold sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Hold sweeper received shutdown signal");
                        break;
                    }
                    _ = timer.tick() => {
                        if let Err(e) = self.sweep(Timestamp::now()).await {
                            error!(error = %e, "Hold sweep failed");
                        }
                    }
                }
            }

            info!("Hold sweeper stopped");
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running [`HoldSweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn stop(self) {
        // the loop may already be gone
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Hold sweeper task ended abnormally");
        }
    }

    /// Returns true while the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
