//! Settlement Engine
//!
//! Drives claimed transaction records through their remaining
//! lifecycle on both sides of the bridge:
//!
//! ```text
//!   +------------------+     +-----------------+     +----------+
//!   | deposit executor | --> | custody/ledger  | --> | observer |
//!   +------------------+     +-----------------+     +----------+
//!   +-------------------+    +-----------------+
//!   | outgoing executor | -> | off-chain rails |
//!   +-------------------+    +-----------------+
//!   +-------------------+    +-----------------+
//!   | outgoing poller   | -> | off-chain rails |
//!   +-------------------+    +-----------------+
//! ```
//!
//! # Work claiming
//!
//! Every worker claims its batch through [`ClaimCoordinator`], which
//! atomically flags the claimed records so concurrent workers (or
//! replicas of this process) never see the same record twice. A claim
//! is released when the record reaches a resting state, and
//! [`ClaimCoordinator::recover`] clears claims orphaned by a crash at
//! startup.
//!
//! # Example
//!
//! ```no_run
//! use anchor_core::MemoryStore;
//! use custody::MockLedger;
//! use settlement::{Config, LogObserver, SettlementEngine, UnimplementedRails};
//! use std::sync::Arc;
//!
//! # async fn run() -> settlement::Result<()> {
//! let engine = SettlementEngine::new(
//!     Config::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockLedger::new()),
//!     Arc::new(UnimplementedRails),
//!     Arc::new(LogObserver),
//! )?;
//!
//! engine.recover().await?;
//! engine.run_deposits_once().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod callback;
pub mod claim;
pub mod config;
pub mod engine;
pub mod error;
pub mod poller;
pub mod rails;

// Re-exports
pub use callback::{LogObserver, SettlementObserver};
pub use claim::{ClaimCoordinator, ClaimedBatch};
pub use config::Config;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use poller::{shutdown_channel, ShutdownSignal, Worker, WorkerJob};
pub use rails::{RailsClient, RailsError, UnimplementedRails};
