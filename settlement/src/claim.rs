//! Work claiming
//!
//! Thin coordination layer over [`TransactionStore::claim_batch`].
//! The coordinator hands each worker pass a [`ClaimedBatch`] that
//! tracks which claimed records the pass has already settled; whatever
//! is left when the pass ends (early error, shutdown) is released in
//! one call so no record stays claimed across passes.

use crate::Result;
use anchor_core::{ClaimFilter, Transaction, TransactionStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Claims batches of records for the settlement workers
#[derive(Clone)]
pub struct ClaimCoordinator {
    store: Arc<dyn TransactionStore>,
}

impl ClaimCoordinator {
    /// Create a coordinator over the given store
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Clear claim flags stranded by an unclean shutdown. Run once at
    /// process startup, before any worker claims.
    pub async fn recover(&self) -> Result<usize> {
        let released = self.store.release_all().await?;
        if released > 0 {
            info!("Recovered {} stranded claims", released);
        }
        Ok(released)
    }

    /// Claim the next batch matching `filter`
    pub async fn claim(&self, filter: &ClaimFilter) -> Result<ClaimedBatch> {
        let transactions = self.store.claim_batch(filter).await?;
        let remaining = transactions.iter().map(|t| t.id).collect();
        Ok(ClaimedBatch {
            store: Arc::clone(&self.store),
            transactions,
            remaining,
        })
    }
}

impl std::fmt::Debug for ClaimCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimCoordinator").finish()
    }
}

/// One claimed batch and its outstanding claims
pub struct ClaimedBatch {
    store: Arc<dyn TransactionStore>,
    transactions: Vec<Transaction>,
    remaining: HashSet<Uuid>,
}

impl ClaimedBatch {
    /// Take the claimed snapshots for processing
    pub fn take(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Record that `id` was persisted (and thereby released) by the
    /// processing step itself
    pub fn mark_done(&mut self, id: Uuid) {
        self.remaining.remove(&id);
    }

    /// Release every record not yet marked done. Returns how many
    /// were released.
    pub async fn release_remaining(&mut self) -> Result<usize> {
        if self.remaining.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = self.remaining.drain().collect();
        self.store.release(&ids).await?;
        Ok(ids.len())
    }

    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

impl std::fmt::Debug for ClaimedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedBatch")
            .field("remaining", &self.remaining.len())
            .finish()
    }
}
