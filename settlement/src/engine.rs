//! Settlement passes
//!
//! One engine instance backs all three workers. Each pass claims a
//! batch, drives every claimed record as far forward as the external
//! world allows, and releases whatever it could not finish. A record
//! is only ever mutated between a successful claim and the matching
//! release, so passes are safe to run concurrently with replicas of
//! this process.

use crate::callback::SettlementObserver;
use crate::claim::ClaimCoordinator;
use crate::config::Config;
use crate::poller::{ShutdownSignal, Worker, WorkerJob};
use crate::rails::{RailsClient, RailsError};
use crate::{Error, Result};
use anchor_core::{
    ClaimFilter, FeeOperation, FeeSchedule, Transaction, TransactionKind, TransactionStatus,
    TransactionStore,
};
use custody::{LedgerClient, PaymentOp, SubmissionOutcome, Submitter};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives claimed transactions through settlement
pub struct SettlementEngine {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<dyn LedgerClient>,
    rails: Arc<dyn RailsClient>,
    submitter: Submitter,
    coordinator: ClaimCoordinator,
    fees: FeeSchedule,
    observer: Arc<dyn SettlementObserver>,
    config: Config,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("service_name", &self.config.service_name)
            .finish()
    }
}

impl SettlementEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        config: Config,
        store: Arc<dyn TransactionStore>,
        ledger: Arc<dyn LedgerClient>,
        rails: Arc<dyn RailsClient>,
        observer: Arc<dyn SettlementObserver>,
    ) -> Result<Self> {
        if config.batch_limit == 0 {
            return Err(Error::Config("batch_limit must be positive".into()));
        }
        // Fail on malformed seeds at startup, not mid-settlement
        config.custody.signing_keys().map_err(Error::Custody)?;

        let submitter = Submitter::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            config.custody.clone(),
        );
        let coordinator = ClaimCoordinator::new(Arc::clone(&store));
        let fees = config.fees.clone();

        Ok(Self {
            store,
            ledger,
            rails,
            submitter,
            coordinator,
            fees,
            observer,
            config,
        })
    }

    /// Release claims stranded by an unclean shutdown. Run once at
    /// startup, before the workers start.
    pub async fn recover(&self) -> Result<usize> {
        self.coordinator.recover().await
    }

    /// Spawn the three interval workers, sharing one shutdown signal
    pub fn start(
        self: Arc<Self>,
        shutdown: ShutdownSignal,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let interval = std::time::Duration::from_secs(self.config.poll_interval_secs);
        [
            WorkerJob::ExecuteDeposits,
            WorkerJob::ExecuteOutgoing,
            WorkerJob::PollOutgoing,
        ]
        .into_iter()
        .map(|job| {
            let worker = Worker::new(Arc::clone(&self), job, interval);
            tokio::spawn(worker.run(shutdown.clone()))
        })
        .collect()
    }

    /// One deposit-settlement pass, to completion
    pub async fn run_deposits_once(&self) -> Result<()> {
        self.execute_pending_deposits(&ShutdownSignal::never())
            .await
    }

    /// One outgoing-execution pass, to completion
    pub async fn run_outgoing_once(&self) -> Result<()> {
        self.execute_outgoing_transfers(&ShutdownSignal::never())
            .await
    }

    /// One outgoing-poll pass, to completion
    pub async fn run_outgoing_poll_once(&self) -> Result<()> {
        self.poll_outgoing_transfers(&ShutdownSignal::never()).await
    }

    fn filter(&self, statuses: Vec<TransactionStatus>, kinds: Vec<TransactionKind>) -> ClaimFilter {
        ClaimFilter::new(statuses, kinds).with_limit(self.config.batch_limit)
    }

    /// Settle claimed deposits: wait for off-chain receipt, resolve
    /// amounts, then pay out on-chain through the custody engine.
    pub(crate) async fn execute_pending_deposits(&self, stop: &ShutdownSignal) -> Result<()> {
        let filter = self.filter(
            vec![
                TransactionStatus::PendingUserTransferStart,
                TransactionStatus::PendingExternal,
                TransactionStatus::PendingTrust,
                TransactionStatus::PendingStellar,
            ],
            vec![TransactionKind::Deposit],
        );

        let mut batch = self.coordinator.claim(&filter).await?;
        let transactions = batch.take();
        if transactions.is_empty() {
            return Ok(());
        }
        info!("Claimed {} deposits", transactions.len());

        // Only records still awaiting off-chain funds get polled
        let awaiting: Vec<Transaction> = transactions
            .iter()
            .filter(|t| Self::awaits_receipt(t.status))
            .cloned()
            .collect();

        let received: HashSet<Uuid> = if awaiting.is_empty() {
            HashSet::new()
        } else {
            match self.rails.poll_pending_deposits(&awaiting).await {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    batch.release_remaining().await?;
                    return Err(e.into());
                }
            }
        };

        for mut txn in transactions {
            if stop.is_stopped() {
                break;
            }

            let id = txn.id;
            match self.process_deposit(&mut txn, &received).await {
                Ok(true) => batch.mark_done(id),
                Ok(false) => {}
                Err(e) => {
                    error!("Deposit {} pass failed: {}", id, e);
                }
            }
        }

        batch.release_remaining().await?;
        Ok(())
    }

    fn awaits_receipt(status: TransactionStatus) -> bool {
        matches!(
            status,
            TransactionStatus::PendingUserTransferStart | TransactionStatus::PendingExternal
        )
    }

    /// Drive one claimed deposit as far as the outside world allows.
    ///
    /// Returns `Ok(true)` when the record was persisted and released
    /// in here, `Ok(false)` when the caller should release it
    /// unchanged.
    async fn process_deposit(
        &self,
        txn: &mut Transaction,
        received: &HashSet<Uuid>,
    ) -> Result<bool> {
        if Self::awaits_receipt(txn.status) {
            if !received.contains(&txn.id) {
                return Ok(false);
            }
            txn.transition_to(TransactionStatus::PendingAnchor)?;
        }

        if txn.status == TransactionStatus::PendingAnchor {
            if txn.amount_in.is_none() {
                warn!("Deposit {} received without an amount", txn.id);
                txn.transition_to(TransactionStatus::Error)?;
                self.store.update_and_release(txn).await?;
                self.notify(txn).await;
                return Ok(true);
            }
            self.finalize_amounts(txn)?;
            // Persist amounts before any ledger interaction
            self.store.update(txn).await?;
        }

        let destination = match &txn.to_address {
            Some(addr) => addr.clone(),
            None => {
                warn!("Deposit {} has no destination address", txn.id);
                txn.transition_to(TransactionStatus::Error)?;
                self.store.update_and_release(txn).await?;
                self.notify(txn).await;
                return Ok(true);
            }
        };

        let mut account = self.ledger.get_account(&destination).await?;

        if account.is_none() {
            if !self.submitter.config().account_creation_supported {
                warn!(
                    "Deposit {} destination {} does not exist and account creation is disabled",
                    txn.id, destination
                );
                txn.transition_to(TransactionStatus::Error)?;
                self.store.update_and_release(txn).await?;
                self.notify(txn).await;
                return Ok(true);
            }

            // Persist the intent before the ledger call so a crash
            // leaves the record in a retryable on-chain phase
            if txn.status != TransactionStatus::PendingStellar {
                txn.transition_to(TransactionStatus::PendingStellar)?;
                self.store.update(txn).await?;
            }

            let outcome = self
                .submitter
                .submit(txn, PaymentOp::CreateDestinationAccount, false)
                .await?;

            match outcome {
                SubmissionOutcome::Submitted { .. } => {
                    // The funding envelope is consumed; the payout
                    // gets its own. Persist the cleared fields so a
                    // crash here cannot replay the funding envelope
                    // as the payout.
                    txn.envelope = None;
                    txn.stellar_transaction_hash = None;
                    self.store.update(txn).await?;
                    account = Some(custody::AccountInfo {
                        account: destination.clone(),
                        trustlines: Vec::new(),
                        sequence: 0,
                    });
                }
                other => return self.settle_submission(txn, other).await,
            }
        }

        let has_trustline = account
            .as_ref()
            .map(|a| a.has_trustline(&txn.asset.code))
            .unwrap_or(false);

        if !has_trustline && !self.submitter.config().claimable_balances_supported {
            // Park until the client establishes the trustline; the
            // next pass re-checks it
            if txn.status != TransactionStatus::PendingTrust {
                txn.transition_to(TransactionStatus::PendingTrust)?;
            }
            self.store.update_and_release(txn).await?;
            return Ok(true);
        }

        if txn.status != TransactionStatus::PendingStellar {
            txn.transition_to(TransactionStatus::PendingStellar)?;
            self.store.update(txn).await?;
        }

        let outcome = self
            .submitter
            .submit(txn, PaymentOp::SendDepositAmount, has_trustline)
            .await?;
        self.settle_submission(txn, outcome).await
    }

    /// Persist the record according to a submission outcome
    async fn settle_submission(
        &self,
        txn: &mut Transaction,
        outcome: SubmissionOutcome,
    ) -> Result<bool> {
        match outcome {
            SubmissionOutcome::Submitted { hash } => {
                info!("Deposit {} paid out on-chain: {}", txn.id, hash);
                txn.transition_to(TransactionStatus::Completed)?;
                self.finalize_amounts(txn)?;
                self.store.update_and_release(txn).await?;
                self.notify(txn).await;
                Ok(true)
            }
            SubmissionOutcome::Pending { reason } => {
                info!("Deposit {} submission pending: {}", txn.id, reason);
                self.store.update_and_release(txn).await?;
                Ok(true)
            }
            SubmissionOutcome::Blocked => {
                info!("Deposit {} blocked on signature collection", txn.id);
                // pending_signatures is persisted, keeping the record
                // out of the standard claim filter
                self.store.update_and_release(txn).await?;
                Ok(true)
            }
            SubmissionOutcome::Failed { code, message } => {
                error!("Deposit {} failed permanently: {} ({})", txn.id, code, message);
                txn.transition_to(TransactionStatus::Error)?;
                self.store.update_and_release(txn).await?;
                self.notify(txn).await;
                Ok(true)
            }
        }
    }

    /// Hand claimed outgoing transfers to the rails hook
    pub(crate) async fn execute_outgoing_transfers(&self, stop: &ShutdownSignal) -> Result<()> {
        let filter = self.filter(
            vec![
                TransactionStatus::PendingAnchor,
                TransactionStatus::PendingReceiver,
            ],
            vec![TransactionKind::Withdrawal, TransactionKind::Send],
        );

        let mut batch = self.coordinator.claim(&filter).await?;
        let transactions = batch.take();
        if transactions.is_empty() {
            return Ok(());
        }
        info!("Claimed {} outgoing transfers", transactions.len());

        for mut txn in transactions {
            if stop.is_stopped() {
                break;
            }

            let id = txn.id;
            let status_before = txn.status;

            match self.rails.execute_outgoing(&mut txn).await {
                Ok(()) => {}
                Err(RailsError::NotImplemented(hook)) => {
                    batch.release_remaining().await?;
                    return Err(Error::NotImplemented(hook));
                }
                Err(e) => {
                    // Integration hiccup: leave the record for a
                    // later pass, keep going with the batch
                    error!("Outgoing transfer {} failed: {}", id, e);
                    continue;
                }
            }

            if txn.status == status_before {
                warn!(
                    "Outgoing transfer {} returned from rails with unchanged status {}",
                    id, txn.status
                );
                continue;
            }

            match self.persist_hook_result(&txn).await {
                Ok(()) => batch.mark_done(id),
                Err(e) => error!("Outgoing transfer {} not persisted: {}", id, e),
            }
        }

        batch.release_remaining().await?;
        Ok(())
    }

    /// Merge a rails hook's mutations onto the persisted record and
    /// release it. The status move is re-validated against the stored
    /// state so a hook can never move a record backward.
    async fn persist_hook_result(&self, processed: &Transaction) -> Result<()> {
        let mut fresh = self.store.get(processed.id).await?;
        fresh.transition_to(processed.status)?;

        if processed.amount_in.is_some() {
            fresh.amount_in = processed.amount_in;
        }
        if processed.amount_fee.is_some() {
            fresh.amount_fee = processed.amount_fee;
        }
        if processed.amount_out.is_some() {
            fresh.amount_out = processed.amount_out;
        }

        self.finalize_amounts(&mut fresh)?;
        self.store.update_and_release(&fresh).await?;
        self.notify(&fresh).await;
        Ok(())
    }

    /// Complete in-flight outgoing transfers the rails confirm
    pub(crate) async fn poll_outgoing_transfers(&self, stop: &ShutdownSignal) -> Result<()> {
        let filter = self.filter(
            vec![TransactionStatus::PendingExternal],
            vec![TransactionKind::Withdrawal, TransactionKind::Send],
        );

        let mut batch = self.coordinator.claim(&filter).await?;
        let transactions = batch.take();
        if transactions.is_empty() {
            return Ok(());
        }

        let completed: HashSet<Uuid> = match self.rails.poll_outgoing(&transactions).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                batch.release_remaining().await?;
                return Err(e.into());
            }
        };

        for txn in &transactions {
            if stop.is_stopped() {
                break;
            }
            if !completed.contains(&txn.id) {
                continue;
            }

            let result: Result<()> = async {
                let mut fresh = self.store.get(txn.id).await?;
                fresh.transition_to(TransactionStatus::Completed)?;
                self.finalize_amounts(&mut fresh)?;
                self.store.update_and_release(&fresh).await?;
                self.notify(&fresh).await;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => batch.mark_done(txn.id),
                Err(e) => error!("Outgoing transfer {} not completed: {}", txn.id, e),
            }
        }

        batch.release_remaining().await?;
        Ok(())
    }

    /// Fill in fee and net amount where they are still missing.
    ///
    /// A pre-computed fee is never overwritten: the fee was shown to
    /// the client and re-deriving it could change it.
    fn finalize_amounts(&self, txn: &mut Transaction) -> Result<()> {
        let Some(amount_in) = txn.amount_in else {
            return Ok(());
        };

        if txn.amount_fee.is_none() {
            let operation = match txn.kind {
                TransactionKind::Deposit => FeeOperation::Deposit,
                TransactionKind::Withdrawal => FeeOperation::Withdraw,
                TransactionKind::Send => FeeOperation::Send,
            };
            let fee = self
                .fees
                .calculate_fee(amount_in, operation, &txn.asset.code)?;
            txn.amount_fee = Some(txn.asset.round(fee));
        }

        if txn.amount_out.is_none() {
            if let Some(fee) = txn.amount_fee {
                txn.amount_out = Some(txn.asset.round(amount_in - fee));
            }
        }

        Ok(())
    }

    /// Best-effort settlement notification
    async fn notify(&self, txn: &Transaction) {
        let snapshot = match txn.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Transaction {} snapshot failed: {}", txn.id, e);
                return;
            }
        };
        if let Err(e) = self.observer.transaction_settled(&snapshot).await {
            warn!("Settlement notification for {} failed: {}", txn.id, e);
        }
    }
}
