//! Transaction store
//!
//! The store is the only shared mutable resource in the system. Its
//! contract carries the concurrency guarantees the settlement workers
//! rely on:
//!
//! - `claim_batch` atomically selects eligible records and sets
//!   `pending_execution_attempt` on exactly those records, so two
//!   concurrent workers can never claim the same record.
//! - every mutation of a claimed record goes through
//!   `update_and_release`, which persists the record and clears the
//!   claim flag in one storage transaction, so no record is left
//!   claimed after a processing attempt.
//! - `release_all` is the crash-recovery pass run at process startup:
//!   only an unclean kill can strand a claim flag.

use crate::status::TransactionStatus;
use crate::types::{Transaction, TransactionKind};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Eligibility predicate for claiming a batch of records.
///
/// Empty status/kind lists match any status/kind. Records with
/// `pending_signatures` set are excluded unless explicitly included:
/// a blocked record must not be picked up for direct submission until
/// an external actor clears the flag.
#[derive(Debug, Clone)]
pub struct ClaimFilter {
    /// Statuses eligible for claiming
    pub statuses: Vec<TransactionStatus>,

    /// Kinds eligible for claiming
    pub kinds: Vec<TransactionKind>,

    /// Also claim records awaiting external signatures
    pub include_pending_signatures: bool,

    /// Maximum batch size
    pub limit: usize,
}

impl ClaimFilter {
    /// Standard filter: given statuses and kinds, blocked records
    /// excluded, batch limit 100
    pub fn new(statuses: Vec<TransactionStatus>, kinds: Vec<TransactionKind>) -> Self {
        Self {
            statuses,
            kinds,
            include_pending_signatures: false,
            limit: 100,
        }
    }

    /// Override the batch limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `txn` matches this filter (ignoring the claim flag)
    pub fn matches(&self, txn: &Transaction) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&txn.status) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&txn.kind) {
            return false;
        }
        if txn.pending_signatures && !self.include_pending_signatures {
            return false;
        }
        true
    }
}

/// Persistence port for transactions
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new record
    async fn insert(&self, txn: &Transaction) -> Result<()>;

    /// Fetch a record by ID
    async fn get(&self, id: Uuid) -> Result<Transaction>;

    /// Persist a record, leaving the claim flag as-is
    async fn update(&self, txn: &Transaction) -> Result<()>;

    /// Atomically select eligible unclaimed records, mark them
    /// claimed, and return the selected snapshot.
    ///
    /// The lock window is strictly this call; processing happens
    /// outside it.
    async fn claim_batch(&self, filter: &ClaimFilter) -> Result<Vec<Transaction>>;

    /// Clear the claim flag on the given records without mutating
    /// anything else (used for unprocessed batch remainders)
    async fn release(&self, ids: &[Uuid]) -> Result<()>;

    /// Clear every claim flag in the store. Returns how many were
    /// cleared. Run once at process startup to recover from an
    /// unclean kill.
    async fn release_all(&self) -> Result<usize>;

    /// Persist a processed record and clear its claim flag in one
    /// storage transaction
    async fn update_and_release(&self, txn: &Transaction) -> Result<()>;
}

/// In-memory store.
///
/// The mutex makes the claim step atomic, which is all the claim
/// contract needs; used by tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, Transaction>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the store
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, txn: &Transaction) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Transaction> {
        let records = self.records.lock().await;
        records.get(&id).cloned().ok_or(Error::NotFound(id))
    }

    async fn update(&self, txn: &Transaction) -> Result<()> {
        let mut records = self.records.lock().await;
        if !records.contains_key(&txn.id) {
            return Err(Error::NotFound(txn.id));
        }
        records.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn claim_batch(&self, filter: &ClaimFilter) -> Result<Vec<Transaction>> {
        let mut records = self.records.lock().await;

        let mut eligible: Vec<Uuid> = records
            .values()
            .filter(|t| !t.pending_execution_attempt && filter.matches(t))
            .map(|t| t.id)
            .collect();

        // Oldest first, ID as tie-breaker, for deterministic batches
        eligible.sort_by_key(|id| {
            let t = &records[id];
            (t.started_at, t.id)
        });
        eligible.truncate(filter.limit);

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            if let Some(txn) = records.get_mut(&id) {
                txn.pending_execution_attempt = true;
                claimed.push(txn.clone());
            }
        }

        Ok(claimed)
    }

    async fn release(&self, ids: &[Uuid]) -> Result<()> {
        let mut records = self.records.lock().await;
        for id in ids {
            if let Some(txn) = records.get_mut(id) {
                txn.pending_execution_attempt = false;
            }
        }
        Ok(())
    }

    async fn release_all(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let mut released = 0;
        for txn in records.values_mut() {
            if txn.pending_execution_attempt {
                txn.pending_execution_attempt = false;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn update_and_release(&self, txn: &Transaction) -> Result<()> {
        let mut records = self.records.lock().await;
        if !records.contains_key(&txn.id) {
            return Err(Error::NotFound(txn.id));
        }
        let mut updated = txn.clone();
        updated.pending_execution_attempt = false;
        records.insert(updated.id, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, Protocol};
    use std::sync::Arc;

    fn test_asset() -> Asset {
        Asset {
            code: "USDC".to_string(),
            issuer: Some("GISSUER".to_string()),
            significant_decimals: 2,
            distribution_account: "GDIST".to_string(),
        }
    }

    fn pending_deposit() -> Transaction {
        let mut txn =
            Transaction::new(TransactionKind::Deposit, Protocol::Transfer, test_asset());
        txn.status = TransactionStatus::PendingAnchor;
        txn
    }

    fn deposit_filter() -> ClaimFilter {
        ClaimFilter::new(
            vec![TransactionStatus::PendingAnchor],
            vec![TransactionKind::Deposit],
        )
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = MemoryStore::new();
        let mut txn = pending_deposit();
        store.insert(&txn).await.unwrap();

        let fetched = store.get(txn.id).await.unwrap();
        assert_eq!(fetched.status, TransactionStatus::PendingAnchor);

        txn.transition_to(TransactionStatus::PendingStellar).unwrap();
        store.update(&txn).await.unwrap();
        let fetched = store.get(txn.id).await.unwrap();
        assert_eq!(fetched.status, TransactionStatus::PendingStellar);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_back_to_back_claims_are_disjoint() {
        let store = MemoryStore::new();
        for _ in 0..10 {
            store.insert(&pending_deposit()).await.unwrap();
        }

        let filter = deposit_filter().with_limit(10);
        let first = store.claim_batch(&filter).await.unwrap();
        assert_eq!(first.len(), 10);

        // All 10 rows already claimed: second call sees nothing
        let second = store.claim_batch(&filter).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_disjoint() {
        let store = Arc::new(MemoryStore::new());
        for _ in 0..20 {
            store.insert(&pending_deposit()).await.unwrap();
        }

        let filter = deposit_filter().with_limit(10);
        let (a, b) = tokio::join!(store.claim_batch(&filter), store.claim_batch(&filter));
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.len() + b.len(), 20);
        for txn in &a {
            assert!(!b.iter().any(|other| other.id == txn.id));
        }
    }

    #[tokio::test]
    async fn test_claim_respects_filter() {
        let store = MemoryStore::new();

        let deposit = pending_deposit();
        store.insert(&deposit).await.unwrap();

        let mut withdrawal =
            Transaction::new(TransactionKind::Withdrawal, Protocol::Transfer, test_asset());
        withdrawal.status = TransactionStatus::PendingAnchor;
        store.insert(&withdrawal).await.unwrap();

        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, deposit.id);
    }

    #[tokio::test]
    async fn test_blocked_records_invisible_to_standard_filter() {
        let store = MemoryStore::new();
        let mut txn = pending_deposit();
        txn.pending_signatures = true;
        store.insert(&txn).await.unwrap();

        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert!(claimed.is_empty());

        // Operator cleared the flag out-of-band: record eligible again
        let mut unblocked = store.get(txn.id).await.unwrap();
        unblocked.pending_signatures = false;
        store.update(&unblocked).await.unwrap();

        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert_eq!(claimed.len(), 1);
    }

    #[tokio::test]
    async fn test_release_makes_records_claimable_again() {
        let store = MemoryStore::new();
        let txn = pending_deposit();
        store.insert(&txn).await.unwrap();

        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert_eq!(claimed.len(), 1);

        store.release(&[txn.id]).await.unwrap();
        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert_eq!(claimed.len(), 1);
    }

    #[tokio::test]
    async fn test_release_all_recovers_stranded_claims() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            store.insert(&pending_deposit()).await.unwrap();
        }
        store
            .claim_batch(&deposit_filter().with_limit(2))
            .await
            .unwrap();

        let released = store.release_all().await.unwrap();
        assert_eq!(released, 2);

        let claimed = store.claim_batch(&deposit_filter()).await.unwrap();
        assert_eq!(claimed.len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_release_clears_claim() {
        let store = MemoryStore::new();
        let txn = pending_deposit();
        store.insert(&txn).await.unwrap();

        let mut claimed = store
            .claim_batch(&deposit_filter())
            .await
            .unwrap()
            .remove(0);
        claimed.transition_to(TransactionStatus::Completed).unwrap();
        store.update_and_release(&claimed).await.unwrap();

        let fetched = store.get(txn.id).await.unwrap();
        assert_eq!(fetched.status, TransactionStatus::Completed);
        assert!(!fetched.pending_execution_attempt);
    }
}
