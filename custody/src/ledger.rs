//! Abstract ledger client
//!
//! The distributed ledger is an external collaborator: this port
//! covers exactly what the custody engine and the settlement workers
//! need — signer and threshold lookups, account/trustline queries,
//! sequence numbers, the current base fee, and envelope submission
//! with a tri-state outcome.

use crate::envelope::TransactionEnvelope;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// One signer on a ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSigner {
    /// Hex-encoded public key
    pub key: String,

    /// Signing weight
    pub weight: u32,
}

/// Signing weight thresholds of a ledger account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    /// Low threshold
    pub low: u32,
    /// Medium threshold (payments and account creation)
    pub medium: u32,
    /// High threshold
    pub high: u32,
}

/// Ledger-side view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account identifier
    pub account: String,

    /// Asset codes the account holds trustlines for
    pub trustlines: Vec<String>,

    /// Current sequence number
    pub sequence: i64,
}

impl AccountInfo {
    /// Whether the account can receive `asset_code` directly
    pub fn has_trustline(&self, asset_code: &str) -> bool {
        self.trustlines.iter().any(|code| code == asset_code)
    }
}

/// Structured outcome of an envelope submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitResult {
    /// The ledger accepted the transaction
    Accepted {
        /// Hash of the accepted transaction
        hash: String,
    },
    /// Transient failure (network, 5xx): safe to retry with the same
    /// envelope
    Retryable {
        /// Human-readable reason
        reason: String,
    },
    /// Permanent rejection (4xx): the envelope itself is wrong
    Fatal {
        /// Structured ledger error code
        code: String,
        /// Human-readable message
        message: String,
    },
}

/// Capability boundary to the ledger network
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Signers of `account` with their weights
    async fn get_signers(&self, account: &str) -> Result<Vec<AccountSigner>>;

    /// Weight thresholds of `account`
    async fn get_thresholds(&self, account: &str) -> Result<Thresholds>;

    /// Account info, or `None` when the account does not exist
    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>>;

    /// Next usable sequence number for `account`
    async fn next_sequence(&self, account: &str) -> Result<i64>;

    /// Current network base fee
    async fn current_base_fee(&self) -> Result<u64>;

    /// Submit a signed envelope
    async fn submit(&self, envelope: &TransactionEnvelope) -> Result<SubmitResult>;
}

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, AccountInfo>,
    signers: HashMap<String, Vec<AccountSigner>>,
    thresholds: HashMap<String, Thresholds>,
    base_fee: u64,
    scripted_results: VecDeque<SubmitResult>,
    submissions: Vec<TransactionEnvelope>,
    sequence_calls: usize,
}

/// Scriptable in-memory ledger for tests.
///
/// Unscripted submissions are accepted with the envelope's own hash;
/// queue `SubmitResult`s to exercise the failure paths. Records every
/// submitted envelope so tests can assert exactly-once semantics.
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Create a mock with base fee 100, so configured fee ceilings
    /// dominate unless a test raises it
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                base_fee: 100,
                ..MockState::default()
            }),
        }
    }

    /// Register an existing account
    pub async fn add_account(&self, info: AccountInfo) {
        let mut state = self.state.lock().await;
        state.accounts.insert(info.account.clone(), info);
    }

    /// Set the signer list of an account
    pub async fn set_signers(&self, account: &str, signers: Vec<AccountSigner>) {
        let mut state = self.state.lock().await;
        state.signers.insert(account.to_string(), signers);
    }

    /// Set the thresholds of an account
    pub async fn set_thresholds(&self, account: &str, thresholds: Thresholds) {
        let mut state = self.state.lock().await;
        state.thresholds.insert(account.to_string(), thresholds);
    }

    /// Set the network base fee
    pub async fn set_base_fee(&self, base_fee: u64) {
        let mut state = self.state.lock().await;
        state.base_fee = base_fee;
    }

    /// Queue the result for the next submission
    pub async fn queue_submit_result(&self, result: SubmitResult) {
        let mut state = self.state.lock().await;
        state.scripted_results.push_back(result);
    }

    /// Every envelope submitted so far
    pub async fn submissions(&self) -> Vec<TransactionEnvelope> {
        let state = self.state.lock().await;
        state.submissions.clone()
    }

    /// How many times `next_sequence` was called (envelope builds)
    pub async fn sequence_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.sequence_calls
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_signers(&self, account: &str) -> Result<Vec<AccountSigner>> {
        let state = self.state.lock().await;
        Ok(state.signers.get(account).cloned().unwrap_or_else(|| {
            // Unconfigured accounts look like plain single-master accounts
            vec![AccountSigner {
                key: account.to_string(),
                weight: 1,
            }]
        }))
    }

    async fn get_thresholds(&self, account: &str) -> Result<Thresholds> {
        let state = self.state.lock().await;
        Ok(state.thresholds.get(account).copied().unwrap_or(Thresholds {
            low: 0,
            medium: 1,
            high: 1,
        }))
    }

    async fn get_account(&self, account: &str) -> Result<Option<AccountInfo>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(account).cloned())
    }

    async fn next_sequence(&self, account: &str) -> Result<i64> {
        let mut state = self.state.lock().await;
        state.sequence_calls += 1;
        let sequence = state
            .accounts
            .get_mut(account)
            .map(|info| {
                info.sequence += 1;
                info.sequence
            })
            .unwrap_or(1);
        Ok(sequence)
    }

    async fn current_base_fee(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state.base_fee)
    }

    async fn submit(&self, envelope: &TransactionEnvelope) -> Result<SubmitResult> {
        let mut state = self.state.lock().await;
        state.submissions.push(envelope.clone());

        if let Some(result) = state.scripted_results.pop_front() {
            return Ok(result);
        }

        Ok(SubmitResult::Accepted {
            hash: envelope.hash_hex().map_err(|e| {
                crate::Error::Ledger(format!("Unhashable envelope: {}", e))
            })?,
        })
    }
}
