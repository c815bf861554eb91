//! Fee calculator
//!
//! Pure mapping from (amount, operation, asset code) to a fee, driven
//! by a configured schedule of fixed + percentage rules. Unrecognized
//! operation/asset pairs are an error rather than a zero fee.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a fee is charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeOperation {
    /// Deposit fee
    Deposit,
    /// Withdrawal fee
    Withdraw,
    /// Anchor-to-anchor send fee
    Send,
}

impl fmt::Display for FeeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeeOperation::Deposit => "deposit",
            FeeOperation::Withdraw => "withdraw",
            FeeOperation::Send => "send",
        };
        write!(f, "{}", s)
    }
}

/// One fee rule: `fixed + amount * percent / 100`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    /// Operation the rule applies to
    pub operation: FeeOperation,

    /// Asset code the rule applies to
    pub asset_code: String,

    /// Flat component, in units of the asset
    pub fixed: Decimal,

    /// Percentage component, in percentage points (1 = 1%)
    pub percent: Decimal,
}

/// Configured fee schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Rules, first match wins
    pub rules: Vec<FeeRule>,
}

impl FeeSchedule {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule
    pub fn with_rule(mut self, rule: FeeRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Calculate the fee for `amount` of `asset_code` under `operation`.
    ///
    /// Fails with `InvalidOperation` when no rule matches the pair.
    pub fn calculate_fee(
        &self,
        amount: Decimal,
        operation: FeeOperation,
        asset_code: &str,
    ) -> Result<Decimal> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.operation == operation && r.asset_code == asset_code)
            .ok_or_else(|| {
                Error::InvalidOperation(format!("{} not supported for {}", operation, asset_code))
            })?;

        Ok(rule.fixed + amount * rule.percent / Decimal::ONE_HUNDRED)
    }
}
