//! Multicall3 batch executor.
//!
//! Uses `ethers-rs` to issue one `eth_call` to Multicall3 per batch.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest};
use tracing::{debug, warn};

use crate::adapters::{BatchCallExecutor, Call, CallResult};
use crate::config::EngineConfig;
use crate::error::{QueueError, Result};
use crate::runtime::abi;

/// Executes batches through a Multicall3 deployment.
pub struct MulticallExecutor {
    provider: Arc<Provider<Http>>,
    multicall: Address,
    redacted_url: String,
}

impl MulticallExecutor {
    pub fn new(provider: Arc<Provider<Http>>, multicall: Address) -> Self {
        Self { provider, multicall, redacted_url: "<provided>".to_string() }
    }

    /// Build an executor from the configured RPC URL and Multicall3 address.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| QueueError::Config { reason: format!("Invalid RPC URL: {}", e) })?;
        Ok(Self {
            provider: Arc::new(provider),
            multicall: config.multicall_address,
            redacted_url: redact_url(&config.rpc_url),
        })
    }

    pub fn multicall_address(&self) -> Address {
        self.multicall
    }
}

#[async_trait]
impl BatchCallExecutor for MulticallExecutor {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallResult>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let expected = calls.len();

        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.multicall)
            .data(abi::encode_aggregate3(&calls))
            .into();

        debug!(calls = expected, url = %self.redacted_url, "aggregate3 eth_call");
        let raw = self.provider.call(&tx, None).await.map_err(|e| {
            warn!(url = %self.redacted_url, error = %e, "aggregate3 eth_call failed");
            QueueError::Transport { reason: format!("aggregate3 call failed: {}", e) }
        })?;

        let results = abi::decode_aggregate3(&raw)
            .map_err(|e| QueueError::Transport { reason: format!("malformed aggregate3 response: {}", e) })?;
        if results.len() != expected {
            return Err(QueueError::Transport {
                reason: format!("aggregate3 returned {} results for {} calls", results.len(), expected),
            });
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            debug!(failed, calls = expected, "batch contained failing calls");
        }
        Ok(results)
    }

    fn transport_id(&self) -> &'static str {
        "multicall3"
    }
}

/// Strip credentials and path from an RPC URL before it reaches logs.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "<redacted>".to_string();
    };
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or(host);
    format!("{}://{}", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("https://user:pw@rpc.example.org/v3/KEY"), "https://rpc.example.org");
        assert_eq!(redact_url("http://localhost:8545"), "http://localhost:8545");
        assert_eq!(redact_url("garbage"), "<redacted>");
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig::with_store(Address::repeat_byte(1));
        let executor = MulticallExecutor::from_config(&config).unwrap();
        assert_eq!(executor.multicall_address(), config.multicall_address);
        assert_eq!(executor.transport_id(), "multicall3");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_rpc() {
        // Nothing listens on this port; an RPC attempt would fail.
        let mut config = EngineConfig::with_store(Address::repeat_byte(1));
        config.rpc_url = "http://127.0.0.1:9".to_string();
        let executor = MulticallExecutor::from_config(&config).unwrap();
        assert!(executor.execute(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_transport_error() {
        let mut config = EngineConfig::with_store(Address::repeat_byte(1));
        config.rpc_url = "http://127.0.0.1:9".to_string();
        let executor = MulticallExecutor::from_config(&config).unwrap();
        let calls = vec![Call::tolerant(Address::repeat_byte(2), vec![0x01])];
        assert!(matches!(executor.execute(calls).await, Err(QueueError::Transport { .. })));
    }
}
