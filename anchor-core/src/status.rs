//! Transaction status state machine
//!
//! Statuses follow the interoperability-protocol spellings
//! (`pending_user_transfer_start`, `pending_anchor`, ...). Forward
//! transitions are monotonic: a worker must never move a record
//! backward in the lifecycle, the single exception being `error`,
//! which is reachable from any non-terminal status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a transaction in the settlement lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Intake started but required information is still missing
    Incomplete,
    /// Waiting for the client to initiate the transfer of funds
    PendingUserTransferStart,
    /// Blocked on updated customer (KYC) information
    PendingCustomerInfoUpdate,
    /// Blocked on updated transaction information
    PendingTransactionInfoUpdate,
    /// Send flow: waiting on the sending anchor
    PendingSender,
    /// Send flow: waiting on the receiving anchor to pay out
    PendingReceiver,
    /// The anchor must now execute its side of the transfer
    PendingAnchor,
    /// Off-chain funds are in flight on external rails
    PendingExternal,
    /// Deposit only: destination cannot yet receive the asset
    PendingTrust,
    /// On-chain transaction submitted, awaiting ledger confirmation
    PendingStellar,
    /// Terminal success
    Completed,
    /// Terminal: funds were returned to the sender
    Refunded,
    /// Terminal failure; recoverable only by manual intervention
    Error,
}

impl TransactionStatus {
    /// Position of this status in the forward lifecycle.
    ///
    /// Statuses that can alternate within one phase (for example
    /// `pending_anchor` and `pending_external`) share a rank, so
    /// lateral moves between them are legal.
    pub fn lifecycle_rank(&self) -> u8 {
        match self {
            TransactionStatus::Incomplete => 0,
            TransactionStatus::PendingCustomerInfoUpdate => 1,
            TransactionStatus::PendingTransactionInfoUpdate => 1,
            TransactionStatus::PendingUserTransferStart => 2,
            TransactionStatus::PendingSender => 3,
            TransactionStatus::PendingReceiver => 4,
            TransactionStatus::PendingAnchor => 4,
            TransactionStatus::PendingExternal => 4,
            TransactionStatus::PendingTrust => 5,
            TransactionStatus::PendingStellar => 6,
            TransactionStatus::Completed => 7,
            TransactionStatus::Refunded => 7,
            TransactionStatus::Error => 7,
        }
    }

    /// Whether this status ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Refunded
                | TransactionStatus::Error
        )
    }

    /// Whether a transition from `self` to `target` is legal.
    ///
    /// Legal means: `self` is not terminal, and either the target is
    /// `error` or the target's rank is not lower than the current one.
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == TransactionStatus::Error {
            return true;
        }
        target.lifecycle_rank() >= self.lifecycle_rank()
    }

    /// All statuses, in lifecycle order
    pub fn all() -> &'static [TransactionStatus] {
        &[
            TransactionStatus::Incomplete,
            TransactionStatus::PendingCustomerInfoUpdate,
            TransactionStatus::PendingTransactionInfoUpdate,
            TransactionStatus::PendingUserTransferStart,
            TransactionStatus::PendingSender,
            TransactionStatus::PendingReceiver,
            TransactionStatus::PendingAnchor,
            TransactionStatus::PendingExternal,
            TransactionStatus::PendingTrust,
            TransactionStatus::PendingStellar,
            TransactionStatus::Completed,
            TransactionStatus::Refunded,
            TransactionStatus::Error,
        ]
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Incomplete => "incomplete",
            TransactionStatus::PendingUserTransferStart => "pending_user_transfer_start",
            TransactionStatus::PendingCustomerInfoUpdate => "pending_customer_info_update",
            TransactionStatus::PendingTransactionInfoUpdate => "pending_transaction_info_update",
            TransactionStatus::PendingSender => "pending_sender",
            TransactionStatus::PendingReceiver => "pending_receiver",
            TransactionStatus::PendingAnchor => "pending_anchor",
            TransactionStatus::PendingExternal => "pending_external",
            TransactionStatus::PendingTrust => "pending_trust",
            TransactionStatus::PendingStellar => "pending_stellar",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransactionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incomplete" => Ok(TransactionStatus::Incomplete),
            "pending_user_transfer_start" => Ok(TransactionStatus::PendingUserTransferStart),
            "pending_customer_info_update" => Ok(TransactionStatus::PendingCustomerInfoUpdate),
            "pending_transaction_info_update" => {
                Ok(TransactionStatus::PendingTransactionInfoUpdate)
            }
            "pending_sender" => Ok(TransactionStatus::PendingSender),
            "pending_receiver" => Ok(TransactionStatus::PendingReceiver),
            "pending_anchor" => Ok(TransactionStatus::PendingAnchor),
            "pending_external" => Ok(TransactionStatus::PendingExternal),
            "pending_trust" => Ok(TransactionStatus::PendingTrust),
            "pending_stellar" => Ok(TransactionStatus::PendingStellar),
            "completed" => Ok(TransactionStatus::Completed),
            "refunded" => Ok(TransactionStatus::Refunded),
            "error" => Ok(TransactionStatus::Error),
            other => Err(crate::Error::Other(format!("Unknown status: {}", other))),
        }
    }
}
