//! Periodic workers
//!
//! Each worker runs one engine pass per tick and watches a shutdown
//! signal between passes. A pass that fails with
//! [`Error::NotImplemented`](crate::Error::NotImplemented) stops the
//! worker for good: the deployment does not provide that rails hook,
//! so retrying every interval would only spam the logs.

use crate::engine::SettlementEngine;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Create a linked shutdown sender/signal pair
pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownSignal { rx })
}

/// Cooperative shutdown signal shared by the workers
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires, for one-shot passes
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        // The closed channel is handled in stopped()
        Self { rx }
    }

    /// Whether shutdown has been requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when shutdown is requested
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped without signalling: stay pending so
                // select loops fall through to their work arms
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Which engine pass a worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerJob {
    /// Settle deposits whose off-chain funds have arrived
    ExecuteDeposits,
    /// Hand claimed outgoing transfers to the rails
    ExecuteOutgoing,
    /// Poll in-flight outgoing transfers for completion
    PollOutgoing,
}

impl WorkerJob {
    /// Stable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WorkerJob::ExecuteDeposits => "execute_deposits",
            WorkerJob::ExecuteOutgoing => "execute_outgoing",
            WorkerJob::PollOutgoing => "poll_outgoing",
        }
    }
}

impl fmt::Display for WorkerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One periodic settlement worker
#[derive(Debug)]
pub struct Worker {
    engine: Arc<SettlementEngine>,
    job: WorkerJob,
    interval: Duration,
}

impl Worker {
    /// Create a worker running `job` every `interval`
    pub fn new(engine: Arc<SettlementEngine>, job: WorkerJob, interval: Duration) -> Self {
        Self {
            engine,
            job,
            interval,
        }
    }

    /// Run passes until shutdown or an unimplemented rails hook
    pub async fn run(self, shutdown: ShutdownSignal) {
        info!(
            "Worker {} starting, interval {:?}",
            self.job, self.interval
        );

        let mut stop_wait = shutdown.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_wait.stopped() => {
                    info!("Worker {} shutting down", self.job);
                    return;
                }
                _ = ticker.tick() => {}
            }

            let result = match self.job {
                WorkerJob::ExecuteDeposits => {
                    self.engine.execute_pending_deposits(&shutdown).await
                }
                WorkerJob::ExecuteOutgoing => {
                    self.engine.execute_outgoing_transfers(&shutdown).await
                }
                WorkerJob::PollOutgoing => {
                    self.engine.poll_outgoing_transfers(&shutdown).await
                }
            };

            match result {
                Ok(()) => {}
                Err(crate::Error::NotImplemented(hook)) => {
                    warn!(
                        "Worker {} stopping: rails hook {} not implemented",
                        self.job, hook
                    );
                    return;
                }
                Err(e) => {
                    error!("Worker {} pass failed: {}", self.job, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_fires() {
        let (tx, mut signal) = shutdown_channel();
        assert!(!signal.is_stopped());

        tx.send(true).unwrap();
        signal.stopped().await;
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn test_never_signal_stays_pending() {
        let mut signal = ShutdownSignal::never();
        assert!(!signal.is_stopped());

        let fired = tokio::time::timeout(Duration::from_millis(20), signal.stopped()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn test_job_names() {
        assert_eq!(WorkerJob::ExecuteDeposits.name(), "execute_deposits");
        assert_eq!(WorkerJob::ExecuteOutgoing.name(), "execute_outgoing");
        assert_eq!(WorkerJob::PollOutgoing.name(), "poll_outgoing");
    }
}
