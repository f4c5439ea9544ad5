//! In-memory store and account contracts.
//!
//! Serves the same calldata the engine sends on chain, so the whole
//! reconstruction path runs against it unchanged. The write side models the
//! store's append-only semantics: transactions are keyed by their
//! content-derived identity and signatures are only ever appended.
//! Failure injection covers the transport as a whole, whole targets, and
//! individual function selectors.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, H256, U256};
use tracing::debug;

use crate::adapters::{BatchCallExecutor, Call, CallResult};
use crate::core::hashing::transaction_identity;
use crate::error::{QueueError, Result};
use crate::runtime::{abi, account};
use crate::types::{AccountConfiguration, AccountIdentity, Signature, TransactionIdentity, TransactionParams};
use crate::utils::selector;

/// Storage key for one signer's signatures: (signer, account, chain id, nonce).
type SignatureKey = (Address, Address, u64, u64);

#[derive(Default)]
struct ChainState {
    transactions: HashMap<TransactionIdentity, TransactionParams>,
    signatures: HashMap<SignatureKey, Vec<Signature>>,
    accounts: HashMap<Address, AccountConfiguration>,
    transport_down: bool,
    failing_targets: HashSet<Address>,
    failing_selectors: HashSet<[u8; 4]>,
    batch_sizes: Vec<usize>,
}

/// A single chain holding one signature store and any number of accounts.
pub struct InMemoryChain {
    chain_id: u64,
    store: Address,
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    pub fn new(chain_id: u64, store: Address) -> Self {
        Self { chain_id, store, state: RwLock::new(ChainState::default()) }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn store_address(&self) -> Address {
        self.store
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deploy (or replace) an account with the given configuration.
    pub fn deploy_account(&self, address: Address, configuration: AccountConfiguration) -> AccountIdentity {
        self.write().accounts.insert(address, configuration);
        AccountIdentity::new(address, self.chain_id)
    }

    /// Simulate execution: advance the account's nonce.
    pub fn advance_nonce(&self, address: Address) {
        if let Some(account) = self.write().accounts.get_mut(&address) {
            account.nonce += 1;
        }
    }

    /// Durably store a transaction; returns its identity. Storing identical
    /// content again is a no-op.
    pub fn store_transaction(&self, account: &AccountIdentity, params: TransactionParams) -> TransactionIdentity {
        let identity = transaction_identity(account, &params);
        self.write().transactions.entry(identity).or_insert(params);
        identity
    }

    /// Append a signature to `signer`'s bucket for `nonce`. The store does
    /// not check that the identity exists or that the signature is valid.
    pub fn submit_signature(
        &self,
        signer: Address,
        account: &AccountIdentity,
        nonce: u64,
        identity: TransactionIdentity,
        r: H256,
        vs: H256,
    ) {
        let signature = Signature { r, vs, identity, claimed_signer: signer };
        self.write()
            .signatures
            .entry((signer, account.address, account.chain_id, nonce))
            .or_default()
            .push(signature);
    }

    /// Store a transaction and the proposer's signature in one step.
    pub fn propose(
        &self,
        signer: Address,
        account: &AccountIdentity,
        params: TransactionParams,
        r: H256,
        vs: H256,
    ) -> TransactionIdentity {
        let nonce = params.nonce;
        let identity = self.store_transaction(account, params);
        self.submit_signature(signer, account, nonce, identity, r, vs);
        identity
    }

    pub fn set_transport_down(&self, down: bool) {
        self.write().transport_down = down;
    }

    /// Every call to `target` reverts.
    pub fn fail_target(&self, target: Address) {
        self.write().failing_targets.insert(target);
    }

    /// Every call to the function with this canonical signature reverts.
    pub fn fail_function(&self, signature: &str) {
        self.write().failing_selectors.insert(selector(signature));
    }

    /// Number of calls in each batch executed so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.read().batch_sizes.clone()
    }

    fn dispatch(&self, state: &ChainState, call: &Call) -> CallResult {
        if call.calldata.len() < 4 || state.failing_targets.contains(&call.target) {
            return CallResult::failed();
        }
        let mut sel = [0u8; 4];
        sel.copy_from_slice(&call.calldata[..4]);
        if state.failing_selectors.contains(&sel) {
            return CallResult::failed();
        }
        let args = &call.calldata[4..];

        let data = if call.target == self.store {
            self.store_call(state, sel, args)
        } else if let Some(account) = state.accounts.get(&call.target) {
            account_call(account, sel, args)
        } else {
            None
        };
        data.map(CallResult::ok).unwrap_or_else(CallResult::failed)
    }

    fn store_call(&self, state: &ChainState, sel: [u8; 4], args: &[u8]) -> Option<Vec<u8>> {
        if sel == selector(abi::RETRIEVE_SIGNATURES) {
            let tokens = decode(
                &[
                    ParamType::Address,
                    ParamType::Address,
                    ParamType::Uint(256),
                    ParamType::Uint(256),
                    ParamType::Uint(256),
                    ParamType::Uint(256),
                ],
                args,
            )
            .ok()?;
            let mut it = tokens.into_iter();
            let signer = it.next()?.into_address()?;
            let account = it.next()?.into_address()?;
            let chain_id = small(it.next()?.into_uint()?)?;
            let nonce = small(it.next()?.into_uint()?)?;
            let offset = small(it.next()?.into_uint()?)? as usize;
            let limit = small(it.next()?.into_uint()?)? as usize;

            let all = state.signatures.get(&(signer, account, chain_id, nonce)).map(Vec::as_slice).unwrap_or(&[]);
            let start = offset.min(all.len());
            let end = start.saturating_add(limit).min(all.len());
            Some(abi::encode_signature_page(&all[start..end], all.len() as u64))
        } else if sel == selector(abi::RETRIEVE_TRANSACTION) {
            let bytes = decode(&[ParamType::FixedBytes(32)], args).ok()?.into_iter().next()?.into_fixed_bytes()?;
            let identity = H256::from_slice(&bytes);
            Some(match state.transactions.get(&identity) {
                Some(params) => abi::encode_transaction(true, params),
                None => abi::encode_transaction(false, &TransactionParams::default()),
            })
        } else {
            None
        }
    }
}

fn small(value: U256) -> Option<u64> {
    (value <= U256::from(u64::MAX)).then(|| value.as_u64())
}

fn storage_word(address: Option<Address>) -> Vec<u8> {
    let mut word = vec![0u8; 32];
    if let Some(address) = address {
        word[12..].copy_from_slice(address.as_bytes());
    }
    encode(&[Token::Bytes(word)])
}

fn account_call(account: &AccountConfiguration, sel: [u8; 4], args: &[u8]) -> Option<Vec<u8>> {
    if sel == selector(abi::GET_OWNERS) {
        Some(encode(&[Token::Array(account.owners.iter().map(|o| Token::Address(*o)).collect())]))
    } else if sel == selector(abi::GET_THRESHOLD) {
        Some(encode(&[Token::Uint(U256::from(account.threshold))]))
    } else if sel == selector(abi::NONCE) {
        Some(encode(&[Token::Uint(U256::from(account.nonce))]))
    } else if sel == selector(abi::VERSION) {
        account.version.as_ref().map(|v| encode(&[Token::String(v.clone())]))
    } else if sel == selector(abi::GET_MODULES_PAGINATED) {
        let modules = account.modules.iter().map(|m| Token::Address(*m)).collect();
        Some(encode(&[Token::Array(modules), Token::Address(abi::SENTINEL_MODULES)]))
    } else if sel == selector(abi::GET_STORAGE_AT) {
        let slot = decode(&[ParamType::Uint(256), ParamType::Uint(256)], args).ok()?.into_iter().next()?.into_uint()?;
        let mut slot_bytes = [0u8; 32];
        slot.to_big_endian(&mut slot_bytes);
        let slot = H256(slot_bytes);
        if slot == account::fallback_handler_slot() {
            Some(storage_word(account.fallback_handler))
        } else if slot == account::guard_slot() {
            Some(storage_word(account.guard))
        } else if slot == account::singleton_slot() {
            Some(storage_word(account.singleton))
        } else {
            Some(storage_word(None))
        }
    } else {
        None
    }
}

#[async_trait]
impl BatchCallExecutor for InMemoryChain {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallResult>> {
        let mut state = self.write();
        if state.transport_down {
            return Err(QueueError::Transport { reason: "in-memory transport is down".into() });
        }
        state.batch_sizes.push(calls.len());

        let mut results = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let result = self.dispatch(&state, call);
            if !result.success && !call.allow_failure {
                // Multicall3 reverts the whole aggregate in this case.
                return Err(QueueError::Transport { reason: format!("call {} reverted without allowFailure", index) });
            }
            results.push(result);
        }
        debug!(calls = calls.len(), "in-memory batch executed");
        Ok(results)
    }

    fn transport_id(&self) -> &'static str {
        "in-memory"
    }
}
