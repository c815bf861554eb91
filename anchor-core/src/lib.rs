//! Anchor Core
//!
//! Core entities for the anchor settlement engine: the transaction
//! record and its status state machine, ledger assets and quotes, the
//! fee calculator, and the transaction store.
//!
//! # Architecture
//!
//! A transaction is created by the public-facing intake flow in an
//! initial status and is then mutated exclusively by the settlement
//! workers and the custody submission engine:
//!
//! 1. **Intake**: record created in `incomplete` or an initial pending
//!    status
//! 2. **Settlement**: workers claim records, invoke off-chain rails or
//!    on-chain custody, and advance the status
//! 3. **Terminal**: `completed`, `refunded`, or `error` — records are
//!    never deleted
//!
//! Status transitions are monotonic: no worker may move a record
//! backward in the lifecycle except into `error`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod fee;
pub mod postgres;
pub mod status;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use fee::{FeeOperation, FeeRule, FeeSchedule};
pub use status::TransactionStatus;
pub use store::{ClaimFilter, MemoryStore, TransactionStore};
pub use types::{Asset, MemoType, Protocol, Quote, Transaction, TransactionKind};
