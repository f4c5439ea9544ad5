//! Calldata encoding and return-data decoding for the store, account and
//! Multicall3 contracts.
//!
//! Every read in the engine goes through a batch, so these functions only
//! produce and consume raw bytes; transport is the executor's concern.

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Address, H160, H256, U256};

use crate::adapters::{Call, CallResult};
use crate::error::{QueueError, Result};
use crate::types::{Operation, Signature, TransactionIdentity, TransactionParams, TransactionRecord};
use crate::utils::{selector, u256_to_u64, with_selector};

pub const RETRIEVE_SIGNATURES: &str = "retrieveSignatures(address,address,uint256,uint256,uint256,uint256)";
pub const RETRIEVE_TRANSACTION: &str = "retrieveTransaction(bytes32)";
pub const GET_OWNERS: &str = "getOwners()";
pub const GET_THRESHOLD: &str = "getThreshold()";
pub const NONCE: &str = "nonce()";
pub const VERSION: &str = "VERSION()";
pub const GET_MODULES_PAGINATED: &str = "getModulesPaginated(address,uint256)";
pub const GET_STORAGE_AT: &str = "getStorageAt(uint256,uint256)";
pub const AGGREGATE3: &str = "aggregate3((address,bool,bytes)[])";

/// Start/end marker of the account's module linked list.
pub const SENTINEL_MODULES: Address = H160([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

fn decode_err(call: &'static str, reason: impl ToString) -> QueueError {
    QueueError::Decode { call, reason: reason.to_string() }
}

fn fixed32(token: Token, call: &'static str) -> Result<H256> {
    let bytes = token.into_fixed_bytes().ok_or_else(|| decode_err(call, "expected bytes32"))?;
    if bytes.len() != 32 {
        return Err(decode_err(call, format!("bytes32 of length {}", bytes.len())));
    }
    Ok(H256::from_slice(&bytes))
}

fn uint(token: Token, call: &'static str) -> Result<U256> {
    token.into_uint().ok_or_else(|| decode_err(call, "expected uint256"))
}

fn address(token: Token, call: &'static str) -> Result<Address> {
    token.into_address().ok_or_else(|| decode_err(call, "expected address"))
}

// ---- store: signatures ----

pub fn encode_retrieve_signatures(
    signer: Address,
    account: Address,
    chain_id: u64,
    nonce: u64,
    offset: u64,
    limit: u64,
) -> Vec<u8> {
    with_selector(
        selector(RETRIEVE_SIGNATURES),
        &encode(&[
            Token::Address(signer),
            Token::Address(account),
            Token::Uint(U256::from(chain_id)),
            Token::Uint(U256::from(nonce)),
            Token::Uint(U256::from(offset)),
            Token::Uint(U256::from(limit)),
        ]),
    )
}

fn signature_page_types() -> Vec<ParamType> {
    vec![
        ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
        ]))),
        ParamType::Uint(256),
    ]
}

/// Decode one page of signatures. Each signature is attributed to `owner`,
/// the signer the page was queried for.
pub fn decode_signature_page(data: &[u8], owner: Address) -> Result<(Vec<Signature>, u64)> {
    const CALL: &str = "retrieveSignatures";
    let mut tokens = decode(&signature_page_types(), data).map_err(|e| decode_err(CALL, e))?.into_iter();
    let page = tokens
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| decode_err(CALL, "missing page"))?;
    let total = u256_to_u64(uint(tokens.next().ok_or_else(|| decode_err(CALL, "missing total"))?, CALL)?, "total")?;

    let mut signatures = Vec::with_capacity(page.len());
    for item in page {
        let mut fields = item.into_tuple().ok_or_else(|| decode_err(CALL, "expected tuple"))?.into_iter();
        let mut next = || fields.next().ok_or_else(|| decode_err(CALL, "short tuple"));
        let r = fixed32(next()?, CALL)?;
        let vs = fixed32(next()?, CALL)?;
        let identity = fixed32(next()?, CALL)?;
        signatures.push(Signature { r, vs, identity, claimed_signer: owner });
    }
    Ok((signatures, total))
}

/// Return data for a signature page, as the store contract produces it.
pub fn encode_signature_page(page: &[Signature], total: u64) -> Vec<u8> {
    let items = page
        .iter()
        .map(|s| {
            Token::Tuple(vec![
                Token::FixedBytes(s.r.as_bytes().to_vec()),
                Token::FixedBytes(s.vs.as_bytes().to_vec()),
                Token::FixedBytes(s.identity.as_bytes().to_vec()),
            ])
        })
        .collect();
    encode(&[Token::Array(items), Token::Uint(U256::from(total))])
}

// ---- store: transactions ----

pub fn encode_retrieve_transaction(identity: &TransactionIdentity) -> Vec<u8> {
    with_selector(
        selector(RETRIEVE_TRANSACTION),
        &encode(&[Token::FixedBytes(identity.as_bytes().to_vec())]),
    )
}

fn transaction_types() -> Vec<ParamType> {
    vec![ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Bytes,
        ParamType::Uint(8),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(256),
    ])]
}

pub fn decode_transaction(identity: TransactionIdentity, data: &[u8]) -> Result<TransactionRecord> {
    const CALL: &str = "retrieveTransaction";
    let fields = decode(&transaction_types(), data)
        .map_err(|e| decode_err(CALL, e))?
        .into_iter()
        .next()
        .and_then(Token::into_tuple)
        .ok_or_else(|| decode_err(CALL, "expected tuple"))?;
    let mut fields = fields.into_iter();
    let mut next = || fields.next().ok_or_else(|| decode_err(CALL, "short tuple"));

    let stored = next()?.into_bool().ok_or_else(|| decode_err(CALL, "expected bool"))?;
    let to = address(next()?, CALL)?;
    let value = uint(next()?, CALL)?;
    let calldata = next()?.into_bytes().ok_or_else(|| decode_err(CALL, "expected bytes"))?;
    let operation_raw = uint(next()?, CALL)?;
    let operation = if operation_raw > U256::from(u8::MAX) {
        None
    } else {
        Operation::from_u8(operation_raw.as_u32() as u8)
    }
    .ok_or_else(|| decode_err(CALL, format!("unknown operation {}", operation_raw)))?;
    let safe_tx_gas = uint(next()?, CALL)?;
    let base_gas = uint(next()?, CALL)?;
    let gas_price = uint(next()?, CALL)?;
    let gas_token = address(next()?, CALL)?;
    let refund_receiver = address(next()?, CALL)?;
    let nonce = u256_to_u64(uint(next()?, CALL)?, "nonce")?;

    Ok(TransactionRecord {
        identity,
        stored,
        params: TransactionParams {
            to,
            value,
            data: calldata.into(),
            operation,
            safe_tx_gas,
            base_gas,
            gas_price,
            gas_token,
            refund_receiver,
            nonce,
        },
    })
}

pub fn encode_transaction(stored: bool, params: &TransactionParams) -> Vec<u8> {
    encode(&[Token::Tuple(vec![
        Token::Bool(stored),
        Token::Address(params.to),
        Token::Uint(params.value),
        Token::Bytes(params.data.to_vec()),
        Token::Uint(U256::from(params.operation.as_u8())),
        Token::Uint(params.safe_tx_gas),
        Token::Uint(params.base_gas),
        Token::Uint(params.gas_price),
        Token::Address(params.gas_token),
        Token::Address(params.refund_receiver),
        Token::Uint(U256::from(params.nonce)),
    ])])
}

// ---- account ----

pub fn encode_no_args(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

pub fn encode_get_modules_paginated(start: Address, page_size: u64) -> Vec<u8> {
    with_selector(
        selector(GET_MODULES_PAGINATED),
        &encode(&[Token::Address(start), Token::Uint(U256::from(page_size))]),
    )
}

pub fn encode_get_storage_at(slot: H256) -> Vec<u8> {
    with_selector(
        selector(GET_STORAGE_AT),
        &encode(&[Token::Uint(U256::from_big_endian(slot.as_bytes())), Token::Uint(U256::one())]),
    )
}

pub fn decode_owners(data: &[u8]) -> Result<Vec<Address>> {
    decode(&[ParamType::Array(Box::new(ParamType::Address))], data)
        .map_err(|e| decode_err("getOwners", e))?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| decode_err("getOwners", "expected address[]"))?
        .into_iter()
        .map(|t| address(t, "getOwners"))
        .collect()
}

pub fn decode_uint(call: &'static str, data: &[u8]) -> Result<U256> {
    let token = decode(&[ParamType::Uint(256)], data)
        .map_err(|e| decode_err(call, e))?
        .into_iter()
        .next()
        .ok_or_else(|| decode_err(call, "empty return data"))?;
    uint(token, call)
}

pub fn decode_string(call: &'static str, data: &[u8]) -> Result<String> {
    decode(&[ParamType::String], data)
        .map_err(|e| decode_err(call, e))?
        .into_iter()
        .next()
        .and_then(Token::into_string)
        .ok_or_else(|| decode_err(call, "expected string"))
}

pub fn decode_modules_page(data: &[u8]) -> Result<(Vec<Address>, Address)> {
    const CALL: &str = "getModulesPaginated";
    let mut tokens = decode(&[ParamType::Array(Box::new(ParamType::Address)), ParamType::Address], data)
        .map_err(|e| decode_err(CALL, e))?
        .into_iter();
    let modules = tokens
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| decode_err(CALL, "expected address[]"))?
        .into_iter()
        .map(|t| address(t, CALL))
        .collect::<Result<Vec<_>>>()?;
    let next = address(tokens.next().ok_or_else(|| decode_err(CALL, "missing next"))?, CALL)?;
    Ok((modules, next))
}

/// Decode a one-word `getStorageAt` result as an address (zero means unset).
pub fn decode_storage_address(data: &[u8]) -> Result<Option<Address>> {
    const CALL: &str = "getStorageAt";
    let word = decode(&[ParamType::Bytes], data)
        .map_err(|e| decode_err(CALL, e))?
        .into_iter()
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| decode_err(CALL, "expected bytes"))?;
    if word.len() != 32 {
        return Err(decode_err(CALL, format!("storage word of length {}", word.len())));
    }
    let address = Address::from_slice(&word[12..]);
    Ok((!address.is_zero()).then_some(address))
}

// ---- multicall ----

pub fn encode_aggregate3(calls: &[Call]) -> Vec<u8> {
    let items = calls
        .iter()
        .map(|c| {
            Token::Tuple(vec![
                Token::Address(c.target),
                Token::Bool(c.allow_failure),
                Token::Bytes(c.calldata.to_vec()),
            ])
        })
        .collect();
    with_selector(selector(AGGREGATE3), &encode(&[Token::Array(items)]))
}

pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<CallResult>> {
    const CALL: &str = "aggregate3";
    let items = decode(
        &[ParamType::Array(Box::new(ParamType::Tuple(vec![ParamType::Bool, ParamType::Bytes])))],
        data,
    )
    .map_err(|e| decode_err(CALL, e))?
    .into_iter()
    .next()
    .and_then(Token::into_array)
    .ok_or_else(|| decode_err(CALL, "expected result array"))?;

    items
        .into_iter()
        .map(|item| {
            let mut fields = item.into_tuple().ok_or_else(|| decode_err(CALL, "expected tuple"))?.into_iter();
            let success = fields.next().and_then(Token::into_bool).ok_or_else(|| decode_err(CALL, "expected bool"))?;
            let return_data =
                fields.next().and_then(Token::into_bytes).ok_or_else(|| decode_err(CALL, "expected bytes"))?;
            Ok(CallResult { success, return_data: return_data.into() })
        })
        .collect()
}
