//! Custody Submission Engine
//!
//! Builds, signs, and submits ledger transactions for anchor
//! transfers, with multisig-aware blocking and strict exactly-once
//! submission semantics.
//!
//! # Architecture
//!
//! 1. **Signature requirement check**: fetch the distribution
//!    account's signers and thresholds; a single master signer at or
//!    above the medium threshold means the anchor can submit alone
//! 2. **Envelope construction**: built at most once per transaction
//!    and persisted before submission — signatures are invalidated by
//!    any rebuild, so a persisted envelope is always reused
//! 3. **Submission**: outcomes are classified into a tagged result
//!    (`Submitted` / `Pending` / `Blocked` / `Failed`) that callers
//!    match exhaustively
//!
//! The ledger itself is an abstract port ([`LedgerClient`]): this
//! crate never speaks a wire format.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod submitter;

// Re-exports
pub use config::CustodyConfig;
pub use envelope::{EnvelopeSignature, LedgerOperation, TransactionEnvelope};
pub use error::{Error, Result};
pub use keys::KeyPair;
pub use ledger::{AccountInfo, AccountSigner, LedgerClient, MockLedger, SubmitResult, Thresholds};
pub use submitter::{PaymentOp, SubmissionOutcome, Submitter};
