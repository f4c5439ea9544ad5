//! Utility functions shared by the hashing, ABI and adapter layers.

use ethers::types::U256;
use sha3::{Digest, Keccak256};

use crate::error::{QueueError, Result};

/// Keccak-256 hash helper.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Four-byte ABI function selector for a canonical signature such as
/// `"getOwners()"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Prefix ABI-encoded arguments with a function selector.
pub fn with_selector(selector: [u8; 4], args: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len());
    out.extend_from_slice(&selector);
    out.extend_from_slice(args);
    out
}

/// Narrow an on-chain `uint256` to `u64`.
pub fn u256_to_u64(value: U256, what: &'static str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(QueueError::InvalidInput {
            reason: format!("{} does not fit in u64: {}", what, value),
        });
    }
    Ok(value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_selector_known_values() {
        // ERC-20 transfer(address,uint256)
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("getOwners()"), [0xa0, 0xe6, 0x7e, 0x2b]);
    }

    #[test]
    fn test_u256_narrowing() {
        assert_eq!(u256_to_u64(U256::from(42u64), "nonce").unwrap(), 42);
        assert!(u256_to_u64(U256::MAX, "nonce").is_err());
    }
}
