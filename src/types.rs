//! Core types for queue reconstruction.
//!
//! Everything here is either an immutable read of on-chain state or a value
//! derived inside a single reconstruction pass.

use std::collections::BTreeMap;

use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Content-derived transaction identity (EIP-712 safeTxHash).
pub type TransactionIdentity = H256;

/// One multisig account on one chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub address: Address,
    pub chain_id: u64,
}

impl AccountIdentity {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self { address, chain_id }
    }
}

/// Account state read from the account contract.
///
/// Only `owners`, `threshold` and `nonce` drive the engine; the remaining
/// fields are fetched in the same batch for callers that render them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfiguration {
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: u64,
    pub version: Option<String>,
    pub modules: Vec<Address>,
    pub fallback_handler: Option<Address>,
    pub guard: Option<Address>,
    pub singleton: Option<Address>,
}

/// Call type of a multisig transaction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    #[default]
    Call = 0,
    DelegateCall = 1,
}

impl Operation {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Operation::Call),
            1 => Some(Operation::DelegateCall),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The content of a multisig transaction, i.e. everything its identity
/// is derived from apart from the account domain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParams {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: u64,
}

impl TransactionParams {
    /// A plain call with zero gas refund parameters.
    pub fn call(to: Address, value: U256, data: Bytes, nonce: u64) -> Self {
        Self { to, value, data, nonce, ..Default::default() }
    }
}

/// A transaction as returned by the store.
///
/// `stored == false` means the identity was never written; such a record
/// is never surfaced in a queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub identity: TransactionIdentity,
    pub stored: bool,
    pub params: TransactionParams,
}

impl TransactionRecord {
    /// Record for an identity the store has never seen.
    pub fn unstored(identity: TransactionIdentity) -> Self {
        Self { identity, stored: false, params: TransactionParams::default() }
    }
}

/// Compact EIP-2098 signature attributed to the owner it was queried for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub r: H256,
    /// `s` with the recovery bit packed into its top bit.
    pub vs: H256,
    pub identity: TransactionIdentity,
    /// Not cryptographically verified; see `core::recovery`.
    pub claimed_signer: Address,
}

/// A transaction with every signature gathered for it, keyed by signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub identity: TransactionIdentity,
    pub record: TransactionRecord,
    pub signatures: BTreeMap<Address, Signature>,
}

impl QueueEntry {
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Signatures in ascending signer order.
    pub fn signature_list(&self) -> Vec<Signature> {
        self.signatures.values().copied().collect()
    }
}

/// All competing queue entries proposed for one nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceGroup {
    /// Nonce of the signature buckets the entries were read from. This is
    /// authoritative; `record.params.nonce` is not cross-checked against it.
    pub nonce: u64,
    /// Ascending by identity bytes.
    pub entries: Vec<QueueEntry>,
}

impl NonceGroup {
    pub fn entry(&self, identity: &TransactionIdentity) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| &e.identity == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_roundtrip_values() {
        assert_eq!(Operation::from_u8(0), Some(Operation::Call));
        assert_eq!(Operation::from_u8(1), Some(Operation::DelegateCall));
        assert_eq!(Operation::from_u8(2), None);
        assert_eq!(Operation::DelegateCall.as_u8(), 1);
    }

    #[test]
    fn test_signature_list_is_sorted_by_signer() {
        let identity = H256::repeat_byte(0x11);
        let mut signatures = BTreeMap::new();
        for byte in [0x30u8, 0x10, 0x20] {
            let signer = Address::repeat_byte(byte);
            signatures.insert(
                signer,
                Signature { r: H256::zero(), vs: H256::zero(), identity, claimed_signer: signer },
            );
        }
        let entry = QueueEntry {
            identity,
            record: TransactionRecord::unstored(identity),
            signatures,
        };
        let order: Vec<Address> = entry.signature_list().iter().map(|s| s.claimed_signer).collect();
        assert_eq!(
            order,
            vec![Address::repeat_byte(0x10), Address::repeat_byte(0x20), Address::repeat_byte(0x30)]
        );
    }
}
