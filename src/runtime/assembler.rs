//! Queue Assembler.
//!
//! Merges independently submitted signatures by transaction identity,
//! resolves each identity once, drops anything the store never durably
//! recorded and groups what remains by nonce.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ethers::types::Address;
use tracing::{debug, instrument};

use crate::adapters::BatchCallExecutor;
use crate::error::{QueueError, Result};
use crate::runtime::collector::{SignatureCollector, SignatureQuery};
use crate::runtime::resolver::TransactionResolver;
use crate::types::{AccountIdentity, NonceGroup, QueueEntry, Signature, TransactionIdentity, TransactionRecord};

/// Per-pass fold of collected signatures. Owned by one reconstruction
/// call and consumed by [`QueueAccumulator::finish`].
#[derive(Debug, Default)]
pub struct QueueAccumulator {
    buckets: BTreeMap<(u64, TransactionIdentity), BTreeMap<Address, Signature>>,
    identities: BTreeSet<TransactionIdentity>,
}

impl QueueAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold signatures read for `nonce`. A signer appearing twice for the
    /// same identity keeps its first signature.
    pub fn fold(&mut self, nonce: u64, signatures: impl IntoIterator<Item = Signature>) {
        for signature in signatures {
            self.identities.insert(signature.identity);
            self.buckets
                .entry((nonce, signature.identity))
                .or_default()
                .entry(signature.claimed_signer)
                .or_insert(signature);
        }
    }

    /// Distinct identities seen so far, ascending.
    pub fn identities(&self) -> Vec<TransactionIdentity> {
        self.identities.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Join buckets with their resolved records. Buckets whose record is
    /// missing or unstored are dropped whole; empty nonces are omitted.
    pub fn finish(self, records: &HashMap<TransactionIdentity, TransactionRecord>) -> Vec<NonceGroup> {
        let mut groups: BTreeMap<u64, Vec<QueueEntry>> = BTreeMap::new();

        for ((nonce, identity), signatures) in self.buckets {
            let record = match records.get(&identity) {
                Some(record) if record.stored => record.clone(),
                _ => {
                    debug!(nonce, ?identity, signatures = signatures.len(), "dropping bucket for unstored transaction");
                    continue;
                }
            };
            groups.entry(nonce).or_default().push(QueueEntry { identity, record, signatures });
        }

        // BTreeMap iteration already yields entries ascending by identity
        // within each nonce.
        groups
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(nonce, entries)| NonceGroup { nonce, entries })
            .collect()
    }
}

pub struct QueueAssembler<'a, E: BatchCallExecutor + ?Sized> {
    executor: &'a E,
    store: Address,
    page_size: u64,
    max_page_rounds: u32,
}

impl<'a, E: BatchCallExecutor + ?Sized> QueueAssembler<'a, E> {
    pub fn new(executor: &'a E, store: Address, page_size: u64, max_page_rounds: u32) -> Self {
        Self { executor, store, page_size, max_page_rounds }
    }

    /// Reconstruct the queue for nonces `[start_nonce, start_nonce + window)`.
    #[instrument(skip(self, account, owners), fields(account = ?account.address, chain_id = account.chain_id, owners = owners.len()))]
    pub async fn assemble(
        &self,
        account: &AccountIdentity,
        owners: &[Address],
        start_nonce: u64,
        window: u64,
    ) -> Result<Vec<NonceGroup>> {
        let end = start_nonce.checked_add(window).ok_or_else(|| QueueError::InvalidInput {
            reason: format!("nonce window {} from {} overflows", window, start_nonce),
        })?;

        let queries: Vec<SignatureQuery> = (start_nonce..end)
            .flat_map(|nonce| owners.iter().map(move |&owner| SignatureQuery { owner, account: *account, nonce }))
            .collect();
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let collector = SignatureCollector::new(self.executor, self.store, self.page_size, self.max_page_rounds);
        let collected = collector.collect_all(queries).await?;

        let mut accumulator = QueueAccumulator::new();
        for (query, signatures) in collected {
            accumulator.fold(query.nonce, signatures);
        }
        if accumulator.is_empty() {
            debug!("no signatures in window");
            return Ok(Vec::new());
        }

        let identities = accumulator.identities();
        let resolver = TransactionResolver::new(self.executor, self.store);
        let records: HashMap<TransactionIdentity, TransactionRecord> = resolver
            .resolve_many(&identities)
            .await?
            .into_iter()
            .map(|record| (record.identity, record))
            .collect();

        let groups = accumulator.finish(&records);
        debug!(
            identities = identities.len(),
            groups = groups.len(),
            entries = groups.iter().map(|g| g.entries.len()).sum::<usize>(),
            "assembled queue"
        );
        Ok(groups)
    }
}
