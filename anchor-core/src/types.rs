//! Core types for the anchor settlement engine

use crate::status::TransactionStatus;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of transfer the record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Off-chain funds in, on-chain funds out
    Deposit,
    /// On-chain funds in, off-chain funds out
    Withdrawal,
    /// Anchor-to-anchor payment on behalf of a sender
    Send,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Send => "send",
        };
        write!(f, "{}", s)
    }
}

/// Which interoperability flow created the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Hosted deposit/withdraw flow
    Transfer,
    /// Interactive (webview) deposit/withdraw flow
    Interactive,
    /// Direct anchor-to-anchor payment flow
    DirectPayment,
}

/// Type of the memo correlating an on-chain payment to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoType {
    /// Free-form text memo
    Text,
    /// 64-bit integer memo
    Id,
    /// 32-byte hash memo
    Hash,
}

/// Ledger asset the anchor issues or distributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset code (e.g. "USDC")
    pub code: String,

    /// Issuing account, if not the native asset
    pub issuer: Option<String>,

    /// Number of decimal places meaningful for amounts of this asset
    pub significant_decimals: u32,

    /// Account from which the anchor pays out deposits
    pub distribution_account: String,
}

impl Asset {
    /// Round an amount to this asset's significant decimals
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.significant_decimals)
    }
}

/// Firm exchange rate between two assets, valid for a bounded window.
///
/// Owned by exactly one transaction and read-only once referenced by
/// a submitted ledger operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote ID
    pub id: Uuid,

    /// Asset the client sells
    pub sell_asset: String,

    /// Asset the client buys
    pub buy_asset: String,

    /// Units of `sell_asset` per unit of `buy_asset`
    pub price: Decimal,

    /// Expiry of the quoted price
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Whether the quote has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The central settlement entity: one client-initiated transfer.
///
/// Created by the intake flow, mutated exclusively by the settlement
/// workers and the custody submission engine, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque unique ID, immutable once created
    pub id: Uuid,

    /// Transfer kind
    pub kind: TransactionKind,

    /// Interoperability flow that created the record
    pub protocol: Protocol,

    /// Amount the client sends in (null until known)
    pub amount_in: Option<Decimal>,

    /// Amount the client receives (null until fee and amount_in resolve)
    pub amount_out: Option<Decimal>,

    /// Fee charged by the anchor (null until computed)
    pub amount_fee: Option<Decimal>,

    /// Asset being transferred
    pub asset: Asset,

    /// Asset the fee is charged in, when different from `asset`
    pub fee_asset: Option<Asset>,

    /// Firm quote fixing the exchange rate, if one was requested
    pub quote: Option<Quote>,

    /// Persisted signed-transaction blob (base64), if one was built.
    ///
    /// Never regenerated once signatures exist: rebuilding would
    /// invalidate them and must clear `pending_signatures`.
    pub envelope: Option<String>,

    /// Secondary signing account used as transaction source to avoid
    /// sequence-number contention on the distribution account
    pub channel_account: Option<String>,

    /// Hash of the submitted ledger transaction, set on success
    pub stellar_transaction_hash: Option<String>,

    /// Destination address (ledger account or off-chain identifier)
    pub to_address: Option<String>,

    /// Source address
    pub from_address: Option<String>,

    /// Memo embedded on-chain to correlate the payment to this record
    pub memo: Option<String>,

    /// Type of `memo`
    pub memo_type: Option<MemoType>,

    /// Lifecycle status
    pub status: TransactionStatus,

    /// Claim marker: set while a settlement worker owns the record
    pub pending_execution_attempt: bool,

    /// Set while multisig signature collection is outstanding
    pub pending_signatures: bool,

    /// Creation time
    pub started_at: DateTime<Utc>,

    /// Set if and only if the record reached `completed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a new record in the `incomplete` status
    pub fn new(kind: TransactionKind, protocol: Protocol, asset: Asset) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            protocol,
            amount_in: None,
            amount_out: None,
            amount_fee: None,
            asset,
            fee_asset: None,
            quote: None,
            envelope: None,
            channel_account: None,
            stellar_transaction_hash: None,
            to_address: None,
            from_address: None,
            memo: None,
            memo_type: None,
            status: TransactionStatus::Incomplete,
            pending_execution_attempt: false,
            pending_signatures: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move the record to `status`, enforcing monotonicity.
    ///
    /// Backward moves are rejected except into `error`. `completed_at`
    /// is set exactly when the target is the terminal success status.
    pub fn transition_to(&mut self, status: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(Error::InvalidTransition(format!(
                "{}: {} -> {}",
                self.id, self.status, status
            )));
        }

        tracing::debug!("Transaction {} status {} -> {}", self.id, self.status, status);
        self.status = status;

        if status == TransactionStatus::Completed {
            self.completed_at = Some(Utc::now());
        }

        Ok(())
    }

    /// Serialized snapshot for post-settlement callbacks
    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_asset() -> Asset {
        Asset {
            code: "USDC".to_string(),
            issuer: Some("GISSUER".to_string()),
            significant_decimals: 2,
            distribution_account: "GDIST".to_string(),
        }
    }

    #[test]
    fn test_new_transaction_defaults() {
        let txn = Transaction::new(TransactionKind::Deposit, Protocol::Transfer, test_asset());
        assert_eq!(txn.status, TransactionStatus::Incomplete);
        assert!(!txn.pending_execution_attempt);
        assert!(!txn.pending_signatures);
        assert!(txn.amount_in.is_none());
        assert!(txn.completed_at.is_none());
    }

    #[test]
    fn test_transition_sets_completed_at() {
        let mut txn =
            Transaction::new(TransactionKind::Deposit, Protocol::Transfer, test_asset());
        txn.transition_to(TransactionStatus::PendingUserTransferStart)
            .unwrap();
        txn.transition_to(TransactionStatus::PendingAnchor).unwrap();
        assert!(txn.completed_at.is_none());

        txn.transition_to(TransactionStatus::Completed).unwrap();
        assert!(txn.completed_at.is_some());
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut txn =
            Transaction::new(TransactionKind::Withdrawal, Protocol::Transfer, test_asset());
        txn.transition_to(TransactionStatus::PendingStellar).unwrap();

        let result = txn.transition_to(TransactionStatus::PendingAnchor);
        assert!(matches!(result, Err(Error::InvalidTransition(_))));
        assert_eq!(txn.status, TransactionStatus::PendingStellar);
    }

    #[test]
    fn test_error_always_reachable() {
        let mut txn = Transaction::new(TransactionKind::Send, Protocol::DirectPayment, test_asset());
        txn.transition_to(TransactionStatus::PendingStellar).unwrap();
        txn.transition_to(TransactionStatus::Error).unwrap();
        assert_eq!(txn.status, TransactionStatus::Error);
        assert!(txn.completed_at.is_none());
    }

    #[test]
    fn test_asset_rounding() {
        let asset = test_asset();
        assert_eq!(
            asset.round(Decimal::new(94005, 3)), // 94.005
            Decimal::new(9400, 2)                // 94.00 (banker's rounding)
        );
    }

    #[test]
    fn test_quote_expiry() {
        let quote = Quote {
            id: Uuid::new_v4(),
            sell_asset: "iso4217:USD".to_string(),
            buy_asset: "USDC".to_string(),
            price: Decimal::ONE,
            expires_at: Utc::now() - chrono::Duration::minutes(1),
        };
        assert!(quote.is_expired(Utc::now()));
    }
}
