//! Settlement notifications
//!
//! Each time a record reaches a resting state the engine hands a
//! point-in-time snapshot of it to the configured observer. Delivery
//! is best effort: a failing observer is logged and never blocks or
//! rolls back the settlement itself.

use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Receives transaction snapshots after each settlement step
#[async_trait]
pub trait SettlementObserver: Send + Sync {
    /// Called with the record snapshot after it reached a resting state
    async fn transaction_settled(&self, snapshot: &serde_json::Value) -> Result<()>;
}

/// Observer that logs each snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

#[async_trait]
impl SettlementObserver for LogObserver {
    async fn transaction_settled(&self, snapshot: &serde_json::Value) -> Result<()> {
        info!(
            "Transaction settled: id={} status={}",
            snapshot.get("id").and_then(|v| v.as_str()).unwrap_or("?"),
            snapshot
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("?"),
        );
        Ok(())
    }
}
