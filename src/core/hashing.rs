//! Transaction identity derivation.
//!
//! The identity is the EIP-712 hash a Safe account signs:
//! `keccak256(0x19 || 0x01 || domainSeparator || structHash)`.
//! It depends only on the transaction content and the (chainId, account)
//! domain, so independent proposers of identical content converge on it.

use ethers::abi::{encode, Token};
use ethers::types::{H256, U256};

use crate::types::{AccountIdentity, TransactionIdentity, TransactionParams};
use crate::utils::keccak256;

pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

/// EIP-712 domain separator for an account.
pub fn domain_separator(account: &AccountIdentity) -> [u8; 32] {
    keccak256(&encode(&[
        Token::FixedBytes(keccak256(DOMAIN_TYPE.as_bytes()).to_vec()),
        Token::Uint(U256::from(account.chain_id)),
        Token::Address(account.address),
    ]))
}

/// EIP-712 struct hash of the transaction content.
pub fn struct_hash(params: &TransactionParams) -> [u8; 32] {
    keccak256(&encode(&[
        Token::FixedBytes(keccak256(SAFE_TX_TYPE.as_bytes()).to_vec()),
        Token::Address(params.to),
        Token::Uint(params.value),
        Token::FixedBytes(keccak256(&params.data).to_vec()),
        Token::Uint(U256::from(params.operation.as_u8())),
        Token::Uint(params.safe_tx_gas),
        Token::Uint(params.base_gas),
        Token::Uint(params.gas_price),
        Token::Address(params.gas_token),
        Token::Address(params.refund_receiver),
        Token::Uint(U256::from(params.nonce)),
    ]))
}

/// Compute the transaction identity (safeTxHash) for `params` on `account`.
pub fn transaction_identity(account: &AccountIdentity, params: &TransactionParams) -> TransactionIdentity {
    let mut preimage = Vec::with_capacity(66);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(&domain_separator(account));
    preimage.extend_from_slice(&struct_hash(params));
    H256(keccak256(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;
    use ethers::types::Address;

    fn account() -> AccountIdentity {
        AccountIdentity::new(Address::repeat_byte(0xAA), 1)
    }

    #[test]
    fn test_type_hashes_match_safe_contract() {
        assert_eq!(
            hex::encode(keccak256(DOMAIN_TYPE.as_bytes())),
            "47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218"
        );
        assert_eq!(
            hex::encode(keccak256(SAFE_TX_TYPE.as_bytes())),
            "bb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8"
        );
    }

    #[test]
    fn test_identical_content_converges() {
        let a = TransactionParams::call(Address::repeat_byte(0xBE), U256::zero(), Default::default(), 5);
        let b = a.clone();
        assert_eq!(transaction_identity(&account(), &a), transaction_identity(&account(), &b));
    }

    #[test]
    fn test_every_field_is_bound() {
        let base = TransactionParams::call(Address::repeat_byte(0xBE), U256::zero(), Default::default(), 5);
        let id = transaction_identity(&account(), &base);

        let mut other = base.clone();
        other.nonce = 6;
        assert_ne!(transaction_identity(&account(), &other), id);

        let mut other = base.clone();
        other.data = vec![0x01].into();
        assert_ne!(transaction_identity(&account(), &other), id);

        let mut other = base.clone();
        other.operation = Operation::DelegateCall;
        assert_ne!(transaction_identity(&account(), &other), id);

        let mut other = base.clone();
        other.refund_receiver = Address::repeat_byte(0x01);
        assert_ne!(transaction_identity(&account(), &other), id);
    }

    #[test]
    fn test_domain_binds_chain_and_account() {
        let params = TransactionParams::call(Address::repeat_byte(0xBE), U256::zero(), Default::default(), 5);
        let id = transaction_identity(&account(), &params);
        let other_chain = AccountIdentity::new(account().address, 10);
        let other_account = AccountIdentity::new(Address::repeat_byte(0xAB), 1);
        assert_ne!(transaction_identity(&other_chain, &params), id);
        assert_ne!(transaction_identity(&other_account, &params), id);
    }
}
