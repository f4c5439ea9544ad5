//! Account configuration reads.
//!
//! Owners, threshold and nonce are required; the auxiliary fields are read
//! in the same batch but may fail individually (older accounts have no
//! guard, some singletons lack `getStorageAt`).

use ethers::types::H256;
use tracing::{debug, instrument};

use crate::adapters::{BatchCallExecutor, Call, CallResult};
use crate::error::{QueueError, Result};
use crate::runtime::abi;
use crate::types::{AccountConfiguration, AccountIdentity};
use crate::utils::{keccak256, u256_to_u64};

/// Modules read per configuration fetch.
pub const MODULE_PAGE_SIZE: u64 = 10;

pub fn fallback_handler_slot() -> H256 {
    H256(keccak256(b"fallback_manager.handler.address"))
}

pub fn guard_slot() -> H256 {
    H256(keccak256(b"guard_manager.guard.address"))
}

/// Slot 0 holds the singleton (master copy) address of a proxy.
pub fn singleton_slot() -> H256 {
    H256::zero()
}

fn required<'r>(result: &'r CallResult, call: &'static str) -> Result<&'r [u8]> {
    result.data().ok_or_else(|| QueueError::Decode { call, reason: "call failed or returned no data".into() })
}

fn optional<T>(result: &CallResult, call: &'static str, decode: impl FnOnce(&[u8]) -> Result<T>) -> Option<T> {
    let data = result.data()?;
    match decode(data) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(call, error = %e, "ignoring undecodable auxiliary field");
            None
        }
    }
}

#[instrument(skip(executor, account), fields(account = ?account.address, chain_id = account.chain_id))]
pub async fn fetch_configuration<E: BatchCallExecutor + ?Sized>(
    executor: &E,
    account: &AccountIdentity,
) -> Result<AccountConfiguration> {
    let target = account.address;
    let calls = vec![
        Call::tolerant(target, abi::encode_no_args(abi::GET_OWNERS)),
        Call::tolerant(target, abi::encode_no_args(abi::GET_THRESHOLD)),
        Call::tolerant(target, abi::encode_no_args(abi::NONCE)),
        Call::tolerant(target, abi::encode_no_args(abi::VERSION)),
        Call::tolerant(target, abi::encode_get_modules_paginated(abi::SENTINEL_MODULES, MODULE_PAGE_SIZE)),
        Call::tolerant(target, abi::encode_get_storage_at(fallback_handler_slot())),
        Call::tolerant(target, abi::encode_get_storage_at(guard_slot())),
        Call::tolerant(target, abi::encode_get_storage_at(singleton_slot())),
    ];
    let expected = calls.len();
    let results = executor.execute(calls).await?;
    if results.len() != expected {
        return Err(QueueError::Transport {
            reason: format!("executor returned {} results for {} calls", results.len(), expected),
        });
    }

    let owners = abi::decode_owners(required(&results[0], "getOwners")?)?;
    let threshold = u256_to_u64(abi::decode_uint("getThreshold", required(&results[1], "getThreshold")?)?, "threshold")?;
    let nonce = u256_to_u64(abi::decode_uint("nonce", required(&results[2], "nonce")?)?, "nonce")?;

    if threshold == 0 || threshold > owners.len() as u64 {
        return Err(QueueError::Decode {
            call: "getThreshold",
            reason: format!("threshold {} invalid for {} owners", threshold, owners.len()),
        });
    }

    let version = optional(&results[3], "VERSION", |d| abi::decode_string("VERSION", d));
    let modules = optional(&results[4], "getModulesPaginated", abi::decode_modules_page)
        .map(|(modules, _next)| modules)
        .unwrap_or_default();
    let fallback_handler = optional(&results[5], "getStorageAt", abi::decode_storage_address).flatten();
    let guard = optional(&results[6], "getStorageAt", abi::decode_storage_address).flatten();
    let singleton = optional(&results[7], "getStorageAt", abi::decode_storage_address).flatten();

    debug!(owners = owners.len(), threshold, nonce, "fetched account configuration");

    Ok(AccountConfiguration { owners, threshold, nonce, version, modules, fallback_handler, guard, singleton })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_slots_are_distinct() {
        assert_ne!(fallback_handler_slot(), guard_slot());
        assert_eq!(
            format!("{:x}", fallback_handler_slot()),
            "6c9a6c4a39284e37ed1cf53d337577d14212a4870fb976a4366c693b939918d5"
        );
        assert_eq!(
            format!("{:x}", guard_slot()),
            "4a204f620c8c5ccdca3fd54d003badd85ba500436a431f0cbda4f558c93c34c8"
        );
    }
}
