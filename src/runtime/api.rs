use std::future::Future;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::BatchCallExecutor;
use crate::config::EngineConfig;
use crate::core::{quorum, recovery};
use crate::error::{QueueError, Result};
use crate::runtime::account::fetch_configuration;
use crate::runtime::assembler::QueueAssembler;
use crate::types::{AccountConfiguration, AccountIdentity, NonceGroup, QueueEntry, Signature};

/// Queue for an account's current nonce window, with the configuration it
/// was read against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueue {
    pub account: AccountIdentity,
    pub configuration: AccountConfiguration,
    pub groups: Vec<NonceGroup>,
}

impl PendingQueue {
    /// Entries that have met the account threshold, in nonce order.
    pub fn executable(&self) -> Vec<&QueueEntry> {
        self.groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .filter(|e| quorum::is_executable(e, self.configuration.threshold))
            .collect()
    }

    /// Entries for the nonce the account will execute next.
    pub fn next_group(&self) -> Option<&NonceGroup> {
        self.groups.iter().find(|g| g.nonce == self.configuration.nonce)
    }
}

/// Caller-facing queue engine over any batch executor.
pub struct QueueEngine<E: BatchCallExecutor> {
    executor: E,
    config: EngineConfig,
}

impl<E: BatchCallExecutor> QueueEngine<E> {
    pub fn new(executor: E, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { executor, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Read owners, threshold, nonce and auxiliary fields in one batch.
    pub async fn fetch_configuration(&self, account: &AccountIdentity) -> Result<AccountConfiguration> {
        self.guarded(fetch_configuration(&self.executor, account), None).await
    }

    /// Reconstruct queue entries for nonces `[start_nonce, start_nonce + window)`.
    ///
    /// Either the whole window is returned or the pass fails; a transport
    /// failure or timeout never yields a shortened queue.
    pub async fn reconstruct_queue(
        &self,
        account: &AccountIdentity,
        owners: &[Address],
        start_nonce: u64,
        window: u64,
    ) -> Result<Vec<NonceGroup>> {
        self.guarded(self.assembler().assemble(account, owners, start_nonce, window), None).await
    }

    /// As [`Self::reconstruct_queue`], aborting with [`QueueError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn reconstruct_queue_cancellable(
        &self,
        account: &AccountIdentity,
        owners: &[Address],
        start_nonce: u64,
        window: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<NonceGroup>> {
        self.guarded(self.assembler().assemble(account, owners, start_nonce, window), Some(cancel)).await
    }

    /// Fetch the account configuration, then reconstruct the configured
    /// nonce window starting at the account's current nonce.
    #[instrument(skip(self, account), fields(account = ?account.address, chain_id = account.chain_id))]
    pub async fn reconstruct_pending(&self, account: &AccountIdentity) -> Result<PendingQueue> {
        let pass = async {
            let configuration = fetch_configuration(&self.executor, account).await?;
            let groups = self
                .assembler()
                .assemble(account, &configuration.owners, configuration.nonce, self.config.nonce_window)
                .await?;
            Ok(PendingQueue { account: *account, configuration, groups })
        };
        let pending = self.guarded(pass, None).await?;
        info!(
            nonce = pending.configuration.nonce,
            groups = pending.groups.len(),
            executable = pending.executable().len(),
            "reconstructed pending queue"
        );
        Ok(pending)
    }

    pub fn is_executable(entry: &QueueEntry, threshold: u64) -> bool {
        quorum::is_executable(entry, threshold)
    }

    pub fn encode_authorization(signatures: &[Signature]) -> Result<Vec<u8>> {
        quorum::encode_authorization(signatures)
    }

    /// Recover each signer of `entry`; see [`recovery::verify_entry`].
    pub fn verify_entry(entry: &QueueEntry) -> Vec<(Address, recovery::SignerCheck)> {
        recovery::verify_entry(entry)
    }

    fn assembler(&self) -> QueueAssembler<'_, E> {
        QueueAssembler::new(&self.executor, self.config.store_address, self.config.page_size, self.config.max_page_rounds)
    }

    /// Run `pass` under the configured timeout and optional cancellation.
    /// Dropping the inner future on abort discards any partial state.
    async fn guarded<T>(&self, pass: impl Future<Output = Result<T>>, cancel: Option<&CancellationToken>) -> Result<T> {
        let millis = self.config.timeout_ms;
        let timed = async {
            tokio::time::timeout(Duration::from_millis(millis), pass)
                .await
                .map_err(|_| {
                    warn!(millis, "reconstruction timed out");
                    QueueError::Timeout { millis }
                })
                .and_then(|inner| inner)
        };

        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    warn!("reconstruction cancelled");
                    Err(QueueError::Cancelled)
                }
                result = timed => result,
            },
            None => timed.await,
        }
    }
}
