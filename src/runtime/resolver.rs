//! Transaction Resolver.
//!
//! Fetches the stored parameters behind transaction identities. An identity
//! the store has never seen, a reverted slot, or undecodable return data all
//! resolve to an unstored record, which callers drop without complaint.

use ethers::types::Address;
use tracing::{debug, warn};

use crate::adapters::{BatchCallExecutor, Call, CallResult};
use crate::error::{QueueError, Result};
use crate::runtime::abi;
use crate::types::{TransactionIdentity, TransactionRecord};

pub struct TransactionResolver<'a, E: BatchCallExecutor + ?Sized> {
    executor: &'a E,
    store: Address,
}

impl<'a, E: BatchCallExecutor + ?Sized> TransactionResolver<'a, E> {
    pub fn new(executor: &'a E, store: Address) -> Self {
        Self { executor, store }
    }

    pub async fn resolve(&self, identity: TransactionIdentity) -> Result<TransactionRecord> {
        let mut records = self.resolve_many(&[identity]).await?;
        Ok(records.pop().unwrap_or_else(|| TransactionRecord::unstored(identity)))
    }

    /// Resolve all identities in one batch; output order matches input.
    pub async fn resolve_many(&self, identities: &[TransactionIdentity]) -> Result<Vec<TransactionRecord>> {
        if identities.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<Call> = identities
            .iter()
            .map(|id| Call::tolerant(self.store, abi::encode_retrieve_transaction(id)))
            .collect();
        debug!(calls = calls.len(), "resolving transactions");

        let results = self.executor.execute(calls).await?;
        if results.len() != identities.len() {
            return Err(QueueError::Transport {
                reason: format!("executor returned {} results for {} calls", results.len(), identities.len()),
            });
        }

        Ok(identities.iter().zip(results.iter()).map(|(id, result)| record_from(*id, result)).collect())
    }
}

fn record_from(identity: TransactionIdentity, result: &CallResult) -> TransactionRecord {
    let Some(data) = result.data() else {
        debug!(?identity, "transaction lookup failed; treating as unstored");
        return TransactionRecord::unstored(identity);
    };
    match abi::decode_transaction(identity, data) {
        Ok(record) => record,
        Err(e) => {
            warn!(?identity, error = %e, "undecodable transaction record; treating as unstored");
            TransactionRecord::unstored(identity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryChain;
    use crate::types::{AccountIdentity, TransactionParams};
    use ethers::types::{H256, U256};

    #[test]
    fn test_record_from_failed_slot() {
        let id = H256::repeat_byte(0x01);
        let record = record_from(id, &CallResult::failed());
        assert!(!record.stored);
        assert_eq!(record.identity, id);
    }

    #[test]
    fn test_record_from_garbage() {
        let record = record_from(H256::zero(), &CallResult::ok(vec![0xff; 7]));
        assert!(!record.stored);
    }

    #[test]
    fn test_record_from_stored() {
        let params = TransactionParams::call(Address::repeat_byte(0xBE), U256::one(), Default::default(), 2);
        let record = record_from(H256::zero(), &CallResult::ok(abi::encode_transaction(true, &params)));
        assert!(record.stored);
        assert_eq!(record.params, params);
    }

    #[tokio::test]
    async fn test_resolve_stored_and_unknown() {
        let chain = InMemoryChain::new(1, Address::repeat_byte(0x5E));
        let account = AccountIdentity::new(Address::repeat_byte(0xAA), 1);
        let params = TransactionParams::call(Address::repeat_byte(0xBE), U256::from(3u64), Default::default(), 4);
        let id = chain.store_transaction(&account, params.clone());
        let resolver = TransactionResolver::new(&chain, chain.store_address());

        let record = resolver.resolve(id).await.unwrap();
        assert!(record.stored);
        assert_eq!(record.params, params);

        let unknown = H256::repeat_byte(0xF0);
        let record = resolver.resolve(unknown).await.unwrap();
        assert!(!record.stored);
        assert_eq!(record.identity, unknown);
    }

    #[tokio::test]
    async fn test_resolve_many_is_one_batch() {
        let chain = InMemoryChain::new(1, Address::repeat_byte(0x5E));
        let resolver = TransactionResolver::new(&chain, chain.store_address());
        let ids: Vec<H256> = (1..=4).map(H256::from_low_u64_be).collect();

        let records = resolver.resolve_many(&ids).await.unwrap();
        assert_eq!(records.iter().map(|r| r.identity).collect::<Vec<_>>(), ids);
        assert_eq!(chain.batch_sizes(), vec![4]);
        assert!(resolver.resolve_many(&[]).await.unwrap().is_empty());
        assert_eq!(chain.batch_sizes().len(), 1);
    }
}
