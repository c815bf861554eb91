//! Custody configuration

use crate::keys::KeyPair;
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for the custody submission engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// Hex-encoded 32-byte seeds of the locally held signing keys
    pub signing_seeds: Vec<String>,

    /// Fee ceiling; the envelope fee is the maximum of this and the
    /// network's current base fee
    pub max_base_fee: u64,

    /// Starting balance used when funding a destination account
    pub starting_balance: Decimal,

    /// Whether the custody provider supports claimable balances for
    /// recipients without a trustline
    pub claimable_balances_supported: bool,

    /// Whether the anchor funds non-existent destination accounts
    pub account_creation_supported: bool,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            signing_seeds: Vec::new(),
            max_base_fee: 1000,
            starting_balance: Decimal::new(2, 0),
            claimable_balances_supported: true,
            account_creation_supported: true,
        }
    }
}

impl CustodyConfig {
    /// Parse the configured seeds into signing key pairs
    pub fn signing_keys(&self) -> Result<Vec<KeyPair>> {
        self.signing_seeds
            .iter()
            .map(|seed| KeyPair::from_seed_hex(seed))
            .collect()
    }
}
