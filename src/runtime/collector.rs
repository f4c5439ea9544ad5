//! Signature Collector.
//!
//! Reads every signature one owner has submitted for an account, chain and
//! nonce. The store serves them in pages of at most `page_size`; a cursor
//! keeps requesting pages until one comes back empty or the running count
//! reaches the total the store reports.

use ethers::types::Address;
use tracing::{debug, warn};

use crate::adapters::{BatchCallExecutor, Call, CallResult};
use crate::error::{QueueError, Result};
use crate::runtime::abi;
use crate::types::{AccountIdentity, Signature};

/// One (owner, account, nonce) bucket to read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignatureQuery {
    pub owner: Address,
    pub account: AccountIdentity,
    pub nonce: u64,
}

/// Pagination state for a single [`SignatureQuery`].
#[derive(Clone, Debug)]
pub struct PageCursor {
    query: SignatureQuery,
    page_size: u64,
    offset: u64,
    collected: Vec<Signature>,
    done: bool,
}

impl PageCursor {
    pub fn new(query: SignatureQuery, page_size: u64) -> Self {
        Self { query, page_size, offset: 0, collected: Vec::new(), done: false }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Call for the next page, or `None` once the cursor is exhausted.
    pub fn next_call(&self, store: Address) -> Option<Call> {
        if self.done {
            return None;
        }
        let q = &self.query;
        Some(Call::tolerant(
            store,
            abi::encode_retrieve_signatures(q.owner, q.account.address, q.account.chain_id, q.nonce, self.offset, self.page_size),
        ))
    }

    /// Fold the result of the call produced by [`Self::next_call`].
    ///
    /// A failed or undecodable first page closes the cursor as "no data".
    /// The same on a continuation page is an error: the pages already read
    /// would otherwise pass for the whole bucket.
    pub fn absorb(&mut self, result: &CallResult) -> Result<()> {
        let decoded = match result.data() {
            Some(data) => abi::decode_signature_page(data, self.query.owner).map_err(|e| {
                warn!(owner = ?self.query.owner, nonce = self.query.nonce, error = %e, "undecodable signature page");
            }),
            None => {
                debug!(owner = ?self.query.owner, nonce = self.query.nonce, offset = self.offset, "signature page call failed");
                Err(())
            }
        };

        let Ok((page, total)) = decoded else {
            self.done = true;
            if self.offset > 0 {
                return Err(QueueError::IncompletePage {
                    owner: self.query.owner,
                    nonce: self.query.nonce,
                    offset: self.offset,
                });
            }
            return Ok(());
        };

        if page.is_empty() {
            self.done = true;
            return Ok(());
        }

        self.offset += page.len() as u64;
        self.collected.extend(page);
        if self.collected.len() as u64 >= total {
            self.done = true;
        }
        Ok(())
    }

    pub fn into_signatures(self) -> Vec<Signature> {
        self.collected
    }
}

/// Collects signatures through a batch executor.
pub struct SignatureCollector<'a, E: BatchCallExecutor + ?Sized> {
    executor: &'a E,
    store: Address,
    page_size: u64,
    max_rounds: u32,
}

impl<'a, E: BatchCallExecutor + ?Sized> SignatureCollector<'a, E> {
    pub fn new(executor: &'a E, store: Address, page_size: u64, max_rounds: u32) -> Self {
        Self { executor, store, page_size, max_rounds }
    }

    /// All signatures `owner` has submitted for `account` at `nonce`.
    pub async fn collect(&self, owner: Address, account: AccountIdentity, nonce: u64) -> Result<Vec<Signature>> {
        let query = SignatureQuery { owner, account, nonce };
        let mut results = self.collect_all(vec![query]).await?;
        Ok(results.pop().map(|(_, signatures)| signatures).unwrap_or_default())
    }

    /// Run every query to exhaustion. Each round is one batch carrying the
    /// next page of every cursor still open. Output order matches input.
    ///
    /// Fails with [`QueueError::PaginationLimit`] if cursors are still open
    /// after `max_rounds` rounds; a truncated bucket is never returned.
    pub async fn collect_all(&self, queries: Vec<SignatureQuery>) -> Result<Vec<(SignatureQuery, Vec<Signature>)>> {
        if self.page_size == 0 {
            return Err(QueueError::InvalidInput { reason: "page size must be positive".into() });
        }

        let mut cursors: Vec<PageCursor> = queries.into_iter().map(|q| PageCursor::new(q, self.page_size)).collect();
        let mut round = 0u32;

        loop {
            let open: Vec<usize> = (0..cursors.len()).filter(|&i| !cursors[i].is_done()).collect();
            if open.is_empty() {
                break;
            }
            if round >= self.max_rounds {
                warn!(open = open.len(), rounds = round, "signature pagination hit round limit");
                return Err(QueueError::PaginationLimit { rounds: round });
            }

            let calls: Vec<Call> = open.iter().filter_map(|&i| cursors[i].next_call(self.store)).collect();
            debug!(round, calls = calls.len(), "fetching signature pages");
            let results = self.executor.execute(calls).await?;
            if results.len() != open.len() {
                return Err(QueueError::Transport {
                    reason: format!("executor returned {} results for {} calls", results.len(), open.len()),
                });
            }

            for (i, result) in open.into_iter().zip(results.iter()) {
                cursors[i].absorb(result)?;
            }
            round += 1;
        }

        Ok(cursors.into_iter().map(|c| (c.query, c.into_signatures())).collect())
    }
}
