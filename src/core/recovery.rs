//! Optional early verification of claimed signers.
//!
//! Reconstruction attributes each signature to the owner whose bucket it
//! was read from. Execution re-verifies on chain; callers that want to
//! reject bad signatures sooner can run [`verify_entry`] on a queue entry.

use ethers::types::{Address, Signature as EcdsaSignature, H256, U256};
use serde::{Deserialize, Serialize};

use crate::core::quorum::expand_vs;
use crate::error::{QueueError, Result};
use crate::types::{QueueEntry, Signature, TransactionIdentity};

/// Outcome of recovering one signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerCheck {
    Verified,
    Mismatch { recovered: Address },
    Unrecoverable { reason: String },
}

/// Recover the address that produced `signature` over `identity`.
pub fn recover_signer(signature: &Signature, identity: &TransactionIdentity) -> Result<Address> {
    let (s, v) = expand_vs(&signature.vs);
    let ecdsa = EcdsaSignature {
        r: U256::from_big_endian(signature.r.as_bytes()),
        s: U256::from_big_endian(s.as_bytes()),
        v: v as u64,
    };
    ecdsa
        .recover(*identity)
        .map_err(|e| QueueError::Recovery { reason: e.to_string() })
}

/// Check every signature of `entry` against its claimed signer.
pub fn verify_entry(entry: &QueueEntry) -> Vec<(Address, SignerCheck)> {
    entry
        .signatures
        .values()
        .map(|signature| {
            let check = match recover_signer(signature, &entry.identity) {
                Ok(recovered) if recovered == signature.claimed_signer => SignerCheck::Verified,
                Ok(recovered) => SignerCheck::Mismatch { recovered },
                Err(e) => SignerCheck::Unrecoverable { reason: e.to_string() },
            };
            (signature.claimed_signer, check)
        })
        .collect()
}

/// Compact an `(r, s, v)` signature into EIP-2098 `(r, vs)`.
pub fn compact(signature: &EcdsaSignature) -> (H256, H256) {
    let mut r = [0u8; 32];
    let mut vs = [0u8; 32];
    signature.r.to_big_endian(&mut r);
    signature.s.to_big_endian(&mut vs);
    let parity = match signature.v {
        27 | 28 => signature.v - 27,
        v => v % 2,
    };
    if parity == 1 {
        vs[0] |= 0x80;
    }
    (H256(r), H256(vs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionRecord;
    use ethers::signers::{LocalWallet, Signer};
    use std::collections::BTreeMap;

    fn signed(wallet: &LocalWallet, identity: H256, claimed: Address) -> Signature {
        let raw = wallet.sign_hash(identity).unwrap();
        let (r, vs) = compact(&raw);
        Signature { r, vs, identity, claimed_signer: claimed }
    }

    #[test]
    fn test_recover_compact_signature() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let identity = H256::repeat_byte(0x5a);
        let signature = signed(&wallet, identity, wallet.address());
        assert_eq!(recover_signer(&signature, &identity).unwrap(), wallet.address());
    }

    #[test]
    fn test_verify_entry_flags_mismatch() {
        let honest = LocalWallet::new(&mut rand::thread_rng());
        let impostor = LocalWallet::new(&mut rand::thread_rng());
        let identity = H256::repeat_byte(0x77);
        let claimed = Address::repeat_byte(0x01);

        let mut signatures = BTreeMap::new();
        signatures.insert(honest.address(), signed(&honest, identity, honest.address()));
        signatures.insert(claimed, signed(&impostor, identity, claimed));

        let entry = QueueEntry { identity, record: TransactionRecord::unstored(identity), signatures };
        let checks: BTreeMap<Address, SignerCheck> = verify_entry(&entry).into_iter().collect();

        assert_eq!(checks[&honest.address()], SignerCheck::Verified);
        assert_eq!(checks[&claimed], SignerCheck::Mismatch { recovered: impostor.address() });
    }
}
