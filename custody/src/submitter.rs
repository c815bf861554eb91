//! Custody submission engine
//!
//! Given a transaction requiring an on-chain payment or
//! account-creation operation, produces a submitted ledger
//! transaction hash — or a tagged outcome saying why it could not:
//!
//! - `Pending`: transient ledger failure; re-invoke later with the
//!   same inputs (safe because the envelope and sequence number are
//!   fixed once built)
//! - `Blocked`: the distribution account is multisig and the stored
//!   envelope does not yet meet the medium threshold; an operator
//!   must collect signatures out-of-band before re-invocation
//! - `Failed`: the construction of the transaction is itself wrong;
//!   the caller moves the record to `error` and stops retrying
//!
//! The engine owns the transaction store as well as the ledger port:
//! the signed envelope is written to the store before the ledger can
//! see it, so a crash during or after submission always restarts from
//! the same envelope and sequence number instead of building (and
//! paying) a second one.

use crate::config::CustodyConfig;
use crate::envelope::{LedgerOperation, TransactionEnvelope};
use crate::ledger::{LedgerClient, SubmitResult};
use crate::{Error, Result};
use anchor_core::{Transaction, TransactionStore};
use chrono::Utc;
use std::sync::Arc;

/// Ledger error code the network returns during surge pricing;
/// retried rather than failed
const INSUFFICIENT_FEE: &str = "tx_insufficient_fee";

/// Operation the caller wants submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOp {
    /// Fund the destination account before paying into it
    CreateDestinationAccount,
    /// Pay out the deposit amount
    SendDepositAmount,
}

/// Tagged result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The ledger accepted the transaction
    Submitted {
        /// Hash of the accepted ledger transaction
        hash: String,
    },
    /// Transient failure; retry this transaction later with
    /// identical inputs
    Pending {
        /// Why the submission did not land
        reason: String,
    },
    /// Waiting on external signature collection
    Blocked,
    /// Permanent failure; move the record to `error`
    Failed {
        /// Structured error code
        code: String,
        /// Human-readable message
        message: String,
    },
}

/// Custody submission engine
pub struct Submitter {
    /// Ledger port
    ledger: Arc<dyn LedgerClient>,

    /// Transaction store; envelopes are made durable here before
    /// submission
    store: Arc<dyn TransactionStore>,

    /// Custody configuration
    config: CustodyConfig,
}

impl Submitter {
    /// Create a new submitter
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
        config: CustodyConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            config,
        }
    }

    /// Custody configuration in use
    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// Build, sign, and submit the ledger transaction for `txn`.
    ///
    /// Mutates `txn` (envelope, `pending_signatures`,
    /// `stellar_transaction_hash`) and stores the signed envelope
    /// before submitting it, but never touches the status: status
    /// transitions belong to the caller, which must persist `txn`
    /// after every call regardless of the outcome.
    pub async fn submit(
        &self,
        txn: &mut Transaction,
        op: PaymentOp,
        has_trustline: bool,
    ) -> Result<SubmissionOutcome> {
        // An expired quote cannot be silently re-priced
        if let Some(quote) = &txn.quote {
            if quote.is_expired(Utc::now()) {
                return Ok(SubmissionOutcome::Failed {
                    code: "quote_expired".to_string(),
                    message: format!("Quote {} expired at {}", quote.id, quote.expires_at),
                });
            }
        }

        let source_account = txn
            .channel_account
            .clone()
            .unwrap_or_else(|| txn.asset.distribution_account.clone());

        // Signature requirement check runs against the distribution
        // account even when a channel account is the envelope source
        let distribution = &txn.asset.distribution_account;
        let signers = self.ledger.get_signers(distribution).await?;
        let thresholds = self.ledger.get_thresholds(distribution).await?;

        // A single-entry signer list is the account's master key
        let is_multisig =
            !(signers.len() == 1 && signers[0].weight >= thresholds.medium);

        // Reuse the persisted envelope; build at most once
        let mut envelope = match &txn.envelope {
            Some(blob) => TransactionEnvelope::decode(blob)?,
            None => {
                self.build_envelope(txn, op, has_trustline, &source_account)
                    .await?
            }
        };

        // Local signatures are deterministic and deduplicated by key,
        // so re-signing a persisted envelope cannot change it
        for keypair in self.config.signing_keys()? {
            envelope.sign(&keypair)?;
        }
        txn.envelope = Some(envelope.encode()?);

        let mut blocked = false;
        if is_multisig {
            let weight = envelope.signed_weight(&signers)?;
            if weight < thresholds.medium {
                tracing::info!(
                    "Transaction {} needs external signatures ({}/{} weight)",
                    txn.id,
                    weight,
                    thresholds.medium
                );
                txn.pending_signatures = true;
                blocked = true;
            } else {
                txn.pending_signatures = false;
            }
        }

        // The envelope must be durable before the network can see it:
        // restarting from a record without the envelope would build a
        // second one with a fresh sequence number, and the ledger
        // cannot deduplicate across sequences
        self.store.update(txn).await?;

        if blocked {
            return Ok(SubmissionOutcome::Blocked);
        }

        let result = match self.ledger.submit(&envelope).await {
            Ok(result) => result,
            // Connection-level failure: the envelope is stored and
            // unchanged, so the retry submits the same transaction
            Err(e) => {
                return Ok(SubmissionOutcome::Pending {
                    reason: e.to_string(),
                })
            }
        };

        Ok(Self::classify(txn, result))
    }

    fn classify(txn: &mut Transaction, result: SubmitResult) -> SubmissionOutcome {
        match result {
            SubmitResult::Accepted { hash } => {
                tracing::info!("Transaction {} accepted by ledger: {}", txn.id, hash);
                txn.stellar_transaction_hash = Some(hash.clone());
                SubmissionOutcome::Submitted { hash }
            }
            SubmitResult::Retryable { reason } => {
                tracing::warn!("Transaction {} submission retryable: {}", txn.id, reason);
                SubmissionOutcome::Pending { reason }
            }
            SubmitResult::Fatal { code, .. } if code == INSUFFICIENT_FEE => {
                // Surge pricing: the network will take the same
                // envelope once fees settle
                tracing::warn!("Transaction {} hit surge pricing", txn.id);
                SubmissionOutcome::Pending { reason: code }
            }
            SubmitResult::Fatal { code, message } => {
                tracing::error!(
                    "Transaction {} rejected by ledger: {} ({})",
                    txn.id,
                    code,
                    message
                );
                SubmissionOutcome::Failed { code, message }
            }
        }
    }

    /// Construct the envelope for `txn`. Called at most once per
    /// transaction: the sequence number and fee are fixed here.
    async fn build_envelope(
        &self,
        txn: &Transaction,
        op: PaymentOp,
        has_trustline: bool,
        source_account: &str,
    ) -> Result<TransactionEnvelope> {
        let destination = txn
            .to_address
            .clone()
            .ok_or_else(|| Error::MissingField("to_address".to_string()))?;

        let operation = match op {
            PaymentOp::CreateDestinationAccount => LedgerOperation::CreateAccount {
                destination,
                starting_balance: self.config.starting_balance,
            },
            PaymentOp::SendDepositAmount => {
                let amount = txn
                    .amount_out
                    .ok_or_else(|| Error::MissingField("amount_out".to_string()))?;

                if has_trustline {
                    LedgerOperation::Payment {
                        destination,
                        asset_code: txn.asset.code.clone(),
                        amount,
                    }
                } else if self.config.claimable_balances_supported {
                    LedgerOperation::CreateClaimableBalance {
                        claimant: destination,
                        asset_code: txn.asset.code.clone(),
                        amount,
                    }
                } else {
                    return Err(Error::Unsupported(
                        "Destination has no trustline and claimable balances are disabled"
                            .to_string(),
                    ));
                }
            }
        };

        let sequence = self.ledger.next_sequence(source_account).await?;
        let base_fee = self.ledger.current_base_fee().await?;
        let fee = self.config.max_base_fee.max(base_fee);

        tracing::debug!(
            "Built envelope for transaction {} (source {}, seq {}, fee {})",
            txn.id,
            source_account,
            sequence,
            fee
        );

        Ok(TransactionEnvelope::new(
            source_account,
            sequence,
            fee,
            txn.memo.clone(),
            txn.memo_type,
            operation,
        ))
    }
}
