//! Off-chain rails integration
//!
//! The off-chain side of the bridge (bank transfers, cash pickup,
//! whatever the deployment settles against) is deployment-specific.
//! [`RailsClient`] is the hook surface a deployment implements; the
//! workers treat [`RailsError::NotImplemented`] as "this deployment
//! does not do this" and stop the corresponding loop rather than
//! retrying it forever.

use anchor_core::Transaction;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Result type for rails hooks
pub type RailsResult<T> = std::result::Result<T, RailsError>;

/// Errors surfaced by a rails integration
#[derive(Error, Debug)]
pub enum RailsError {
    /// The deployment does not implement this hook
    #[error("Rails hook not implemented: {0}")]
    NotImplemented(String),

    /// Any other integration failure; the affected records are
    /// released and retried on a later pass
    #[error("{0}")]
    Other(String),
}

/// Deployment-provided hooks into the off-chain rails
#[async_trait]
pub trait RailsClient: Send + Sync {
    /// Execute the off-chain leg of an outgoing transfer.
    ///
    /// The hook owns the record for the duration of the call and
    /// reports progress by mutating `transaction` (typically moving
    /// the status forward and filling in amounts). Leaving the status
    /// untouched is a contract violation the caller logs and skips.
    async fn execute_outgoing(&self, transaction: &mut Transaction) -> RailsResult<()>;

    /// Of the given in-flight outgoing transfers, which have been
    /// confirmed complete by the rails
    async fn poll_outgoing(&self, transactions: &[Transaction]) -> RailsResult<Vec<Uuid>>;

    /// Of the given deposits awaiting off-chain funds, which have
    /// had their funds arrive
    async fn poll_pending_deposits(&self, transactions: &[Transaction]) -> RailsResult<Vec<Uuid>>;
}

/// Rails client for deployments without an off-chain integration;
/// every hook reports [`RailsError::NotImplemented`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedRails;

#[async_trait]
impl RailsClient for UnimplementedRails {
    async fn execute_outgoing(&self, _transaction: &mut Transaction) -> RailsResult<()> {
        Err(RailsError::NotImplemented("execute_outgoing".to_string()))
    }

    async fn poll_outgoing(&self, _transactions: &[Transaction]) -> RailsResult<Vec<Uuid>> {
        Err(RailsError::NotImplemented("poll_outgoing".to_string()))
    }

    async fn poll_pending_deposits(
        &self,
        _transactions: &[Transaction],
    ) -> RailsResult<Vec<Uuid>> {
        Err(RailsError::NotImplemented(
            "poll_pending_deposits".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anchor_core::TransactionStatus;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct Inner {
        receivable: HashSet<Uuid>,
        completable: HashSet<Uuid>,
        execute_status: Option<TransactionStatus>,
        stale: bool,
        fail_execute: Option<String>,
        not_implemented: bool,
    }

    /// Scriptable rails for worker tests
    #[derive(Debug, Default)]
    pub struct ScriptedRails {
        inner: Mutex<Inner>,
    }

    impl ScriptedRails {
        pub fn new() -> Self {
            Self::default()
        }

        /// Mark a deposit's off-chain funds as arrived
        pub async fn mark_receivable(&self, id: Uuid) {
            self.inner.lock().await.receivable.insert(id);
        }

        /// Mark an outgoing transfer as confirmed complete
        pub async fn mark_completable(&self, id: Uuid) {
            self.inner.lock().await.completable.insert(id);
        }

        /// Status `execute_outgoing` moves records to (default
        /// `PendingExternal`)
        pub async fn set_execute_status(&self, status: TransactionStatus) {
            self.inner.lock().await.execute_status = Some(status);
        }

        /// Make `execute_outgoing` return without touching the record
        pub async fn set_stale(&self) {
            self.inner.lock().await.stale = true;
        }

        /// Make every hook report `NotImplemented`
        pub async fn set_not_implemented(&self) {
            self.inner.lock().await.not_implemented = true;
        }

        /// Make `execute_outgoing` fail with the given message
        pub async fn fail_execute(&self, message: &str) {
            self.inner.lock().await.fail_execute = Some(message.to_string());
        }
    }

    #[async_trait]
    impl RailsClient for ScriptedRails {
        async fn execute_outgoing(&self, transaction: &mut Transaction) -> RailsResult<()> {
            let inner = self.inner.lock().await;
            if inner.not_implemented {
                return Err(RailsError::NotImplemented("execute_outgoing".to_string()));
            }
            if let Some(message) = &inner.fail_execute {
                return Err(RailsError::Other(message.clone()));
            }
            if inner.stale {
                return Ok(());
            }
            transaction.status = inner
                .execute_status
                .unwrap_or(TransactionStatus::PendingExternal);
            Ok(())
        }

        async fn poll_outgoing(&self, transactions: &[Transaction]) -> RailsResult<Vec<Uuid>> {
            let inner = self.inner.lock().await;
            if inner.not_implemented {
                return Err(RailsError::NotImplemented("poll_outgoing".to_string()));
            }
            Ok(transactions
                .iter()
                .filter(|t| inner.completable.contains(&t.id))
                .map(|t| t.id)
                .collect())
        }

        async fn poll_pending_deposits(
            &self,
            transactions: &[Transaction],
        ) -> RailsResult<Vec<Uuid>> {
            let inner = self.inner.lock().await;
            if inner.not_implemented {
                return Err(RailsError::NotImplemented(
                    "poll_pending_deposits".to_string(),
                ));
            }
            Ok(transactions
                .iter()
                .filter(|t| inner.receivable.contains(&t.id))
                .map(|t| t.id)
                .collect())
        }
    }
}
