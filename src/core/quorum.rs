//! Quorum evaluation and authorization encoding.
//!
//! The account contract expects its signature blob as concatenated 65-byte
//! `r || s || v` triples sorted by ascending signer address. Entries are
//! collected as compact EIP-2098 `(r, vs)` pairs and expanded here.

use ethers::types::H256;

use crate::error::{QueueError, Result};
use crate::types::{QueueEntry, Signature};

/// Length of one expanded signature in the authorization blob.
pub const EXPANDED_SIGNATURE_LEN: usize = 65;

/// `true` once the entry has at least `threshold` distinct signers.
pub fn is_executable(entry: &QueueEntry, threshold: u64) -> bool {
    entry.signature_count() as u64 >= threshold
}

/// Split a compact `vs` into `(s, v)`, with `v` in `{27, 28}`.
pub fn expand_vs(vs: &H256) -> (H256, u8) {
    let mut s = *vs;
    let parity = s.0[0] >> 7;
    s.0[0] &= 0x7f;
    (s, 27 + parity)
}

/// Expand one compact signature into its 65-byte `r || s || v` form.
pub fn expand_signature(signature: &Signature) -> [u8; EXPANDED_SIGNATURE_LEN] {
    let (s, v) = expand_vs(&signature.vs);
    let mut out = [0u8; EXPANDED_SIGNATURE_LEN];
    out[..32].copy_from_slice(signature.r.as_bytes());
    out[32..64].copy_from_slice(s.as_bytes());
    out[64] = v;
    out
}

/// Serialize signatures into the authorization blob passed to execution.
///
/// Input order is irrelevant: signatures are sorted by claimed signer.
pub fn encode_authorization(signatures: &[Signature]) -> Result<Vec<u8>> {
    if signatures.is_empty() {
        return Err(QueueError::EmptyAuthorization);
    }

    let mut sorted: Vec<&Signature> = signatures.iter().collect();
    sorted.sort_by(|a, b| a.claimed_signer.cmp(&b.claimed_signer));

    let mut out = Vec::with_capacity(sorted.len() * EXPANDED_SIGNATURE_LEN);
    for signature in sorted {
        out.extend_from_slice(&expand_signature(signature));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionRecord;
    use ethers::types::Address;
    use std::collections::BTreeMap;

    fn sig(signer: u8, high_bit: bool) -> Signature {
        let mut vs = H256::repeat_byte(signer);
        if high_bit {
            vs.0[0] |= 0x80;
        } else {
            vs.0[0] &= 0x7f;
        }
        Signature {
            r: H256::repeat_byte(0xA0 | (signer & 0x0f)),
            vs,
            identity: H256::repeat_byte(0x42),
            claimed_signer: Address::repeat_byte(signer),
        }
    }

    fn entry_with(count: u8) -> QueueEntry {
        let identity = H256::repeat_byte(0x42);
        let signatures: BTreeMap<Address, Signature> =
            (1..=count).map(|i| (Address::repeat_byte(i), sig(i, false))).collect();
        QueueEntry { identity, record: TransactionRecord::unstored(identity), signatures }
    }

    #[test]
    fn test_expand_vs_clears_top_bit() {
        let (s, v) = expand_vs(&sig(0x05, true).vs);
        assert_eq!(v, 28);
        assert_eq!(s.0[0], 0x05);

        let (s, v) = expand_vs(&sig(0x05, false).vs);
        assert_eq!(v, 27);
        assert_eq!(s.0[0], 0x05);
    }

    #[test]
    fn test_is_executable_threshold() {
        assert!(!is_executable(&entry_with(1), 2));
        assert!(is_executable(&entry_with(2), 2));
        assert!(is_executable(&entry_with(3), 2));
    }

    #[test]
    fn test_threshold_monotonic() {
        let threshold = 3;
        let mut reached = false;
        for count in 0..6 {
            let now = is_executable(&entry_with(count), threshold);
            assert!(!(reached && !now), "executability regressed at {}", count);
            reached |= now;
        }
        assert!(reached);
    }

    #[test]
    fn test_empty_authorization_rejected() {
        assert!(matches!(encode_authorization(&[]), Err(QueueError::EmptyAuthorization)));
    }

    #[test]
    fn test_authorization_layout() {
        let blob = encode_authorization(&[sig(0x02, true), sig(0x01, false)]).unwrap();
        assert_eq!(blob.len(), 2 * EXPANDED_SIGNATURE_LEN);

        // Signer 0x01 first
        assert_eq!(&blob[..32], H256::repeat_byte(0xA1).as_bytes());
        assert_eq!(blob[64], 27);
        assert_eq!(&blob[65..97], H256::repeat_byte(0xA2).as_bytes());
        assert_eq!(blob[97], 0x02);
        assert_eq!(blob[129], 28);
    }

    #[test]
    fn test_authorization_permutation_invariant() {
        let a = sig(0x01, false);
        let b = sig(0x7f, true);
        let c = sig(0x33, true);
        let reference = encode_authorization(&[a, b, c]).unwrap();
        for perm in [[a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
            assert_eq!(encode_authorization(&perm).unwrap(), reference);
        }
    }
}
