//! Transaction envelopes
//!
//! The envelope is the canonical, signable form of one ledger
//! operation: source account, sequence number, fee, memo, the
//! operation itself, and any collected signatures. The signing
//! payload is the SHA-256 hash of the bincode-serialized unsigned
//! body, so the payload is fixed the moment the envelope is built.
//!
//! Envelopes are persisted as base64 blobs on the transaction record
//! and are never regenerated once stored: a rebuild would change the
//! signing payload and silently invalidate every collected signature.

use crate::keys::{hash_bytes, verify_signature, KeyPair};
use crate::ledger::AccountSigner;
use crate::{Error, Result};
use anchor_core::MemoType;
use base64::Engine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One ledger operation carried by an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerOperation {
    /// Pay `amount` of an asset to an existing account with a trustline
    Payment {
        /// Destination account
        destination: String,
        /// Asset code
        asset_code: String,
        /// Amount to pay
        amount: Decimal,
    },
    /// Fund a destination account that does not exist yet
    CreateAccount {
        /// Destination account
        destination: String,
        /// Fixed starting balance in the native asset
        starting_balance: Decimal,
    },
    /// Deposit funds claimable by a recipient without a trustline
    CreateClaimableBalance {
        /// Claimant account
        claimant: String,
        /// Asset code
        asset_code: String,
        /// Amount deposited
        amount: Decimal,
    },
}

/// A detached signature over the envelope's signing payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSignature {
    /// Hex-encoded public key of the signer
    pub public_key: String,

    /// Ed25519 signature bytes
    pub signature: Vec<u8>,
}

/// Unsigned envelope body; the bincode serialization of this struct
/// is the canonical signing input
#[derive(Serialize)]
struct EnvelopeBody<'a> {
    source_account: &'a str,
    sequence: i64,
    fee: u64,
    memo: &'a Option<String>,
    memo_type: &'a Option<MemoType>,
    operation: &'a LedgerOperation,
}

/// A signed, serialized transaction ready for ledger submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    /// Source account (channel account if one is assigned, else the
    /// asset's distribution account)
    pub source_account: String,

    /// Sequence number fixed at build time
    pub sequence: i64,

    /// Fee in the ledger's smallest fee unit
    pub fee: u64,

    /// Memo correlating the on-chain transaction to the record
    pub memo: Option<String>,

    /// Type of `memo`
    pub memo_type: Option<MemoType>,

    /// The single operation this envelope carries
    pub operation: LedgerOperation,

    /// Collected signatures
    pub signatures: Vec<EnvelopeSignature>,
}

impl TransactionEnvelope {
    /// Create an unsigned envelope
    pub fn new(
        source_account: impl Into<String>,
        sequence: i64,
        fee: u64,
        memo: Option<String>,
        memo_type: Option<MemoType>,
        operation: LedgerOperation,
    ) -> Self {
        Self {
            source_account: source_account.into(),
            sequence,
            fee,
            memo,
            memo_type,
            operation,
            signatures: Vec::new(),
        }
    }

    /// SHA-256 over the canonical unsigned body
    pub fn signing_payload(&self) -> Result<[u8; 32]> {
        let body = EnvelopeBody {
            source_account: &self.source_account,
            sequence: self.sequence,
            fee: self.fee,
            memo: &self.memo,
            memo_type: &self.memo_type,
            operation: &self.operation,
        };
        Ok(hash_bytes(&bincode::serialize(&body)?))
    }

    /// Hex hash identifying this envelope
    pub fn hash_hex(&self) -> Result<String> {
        Ok(hex::encode(self.signing_payload()?))
    }

    /// Append a signature from `keypair`, skipping duplicates
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        let public_key = keypair.public_key_hex();
        if self.signatures.iter().any(|s| s.public_key == public_key) {
            return Ok(());
        }

        let payload = self.signing_payload()?;
        self.signatures.push(EnvelopeSignature {
            public_key,
            signature: keypair.sign(&payload).to_vec(),
        });
        Ok(())
    }

    /// Combined weight of the valid signatures from known signers.
    ///
    /// A signature only counts if it verifies against the signing
    /// payload and its key appears in the account's signer list.
    pub fn signed_weight(&self, signers: &[AccountSigner]) -> Result<u32> {
        let payload = self.signing_payload()?;

        let mut weight = 0;
        for signer in signers {
            let signed = self.signatures.iter().any(|s| {
                s.public_key == signer.key
                    && verify_signature(&payload, &s.signature, &s.public_key)
            });
            if signed {
                weight += signer.weight;
            }
        }
        Ok(weight)
    }

    /// Encode as the base64 blob persisted on the transaction record
    pub fn encode(&self) -> Result<String> {
        let bytes = bincode::serialize(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Decode a persisted base64 blob
    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(blob)
            .map_err(|e| Error::Encoding(format!("Invalid envelope blob: {}", e)))?;
        Ok(bincode::deserialize(&bytes)?)
    }
}
