//! Engine configuration.
//!
//! Defaults are usable against a local node; `from_env` applies overrides
//! from `SAFE_QUEUE_*` environment variables and `from_json` loads a JSON
//! document. Either way the result goes through `validate`.

use std::str::FromStr;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

pub const RPC_URL_ENV: &str = "SAFE_QUEUE_RPC_URL";
pub const STORE_ADDRESS_ENV: &str = "SAFE_QUEUE_STORE_ADDRESS";
pub const MULTICALL_ADDRESS_ENV: &str = "SAFE_QUEUE_MULTICALL_ADDRESS";
pub const PAGE_SIZE_ENV: &str = "SAFE_QUEUE_PAGE_SIZE";
pub const NONCE_WINDOW_ENV: &str = "SAFE_QUEUE_NONCE_WINDOW";
pub const MAX_PAGE_ROUNDS_ENV: &str = "SAFE_QUEUE_MAX_PAGE_ROUNDS";
pub const TIMEOUT_MS_ENV: &str = "SAFE_QUEUE_TIMEOUT_MS";

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Multicall3, deployed at the same address on most EVM chains.
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rpc_url: String,
    pub store_address: Address,
    pub multicall_address: Address,
    /// Signatures requested per page.
    pub page_size: u64,
    /// Nonces scanned from the account's current nonce.
    pub nonce_window: u64,
    /// Upper bound on pagination rounds in one pass.
    pub max_page_rounds: u32,
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            store_address: Address::zero(),
            multicall_address: Address::from_str(MULTICALL3_ADDRESS).unwrap_or_default(),
            page_size: 100,
            nonce_window: 10,
            max_page_rounds: 64,
            timeout_ms: 30_000,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env_value(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| QueueError::Config { reason: format!("{}={}: {}", name, raw, e) })
        })
        .transpose()
}

impl EngineConfig {
    /// Defaults overridden by any non-empty `SAFE_QUEUE_*` variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| QueueError::Config { reason: format!("invalid JSON: {}", e) })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env_value(RPC_URL_ENV) {
            self.rpc_url = url;
        }
        if let Some(address) = parse_env::<Address>(STORE_ADDRESS_ENV)? {
            self.store_address = address;
        }
        if let Some(address) = parse_env::<Address>(MULTICALL_ADDRESS_ENV)? {
            self.multicall_address = address;
        }
        if let Some(size) = parse_env(PAGE_SIZE_ENV)? {
            self.page_size = size;
        }
        if let Some(window) = parse_env(NONCE_WINDOW_ENV)? {
            self.nonce_window = window;
        }
        if let Some(rounds) = parse_env(MAX_PAGE_ROUNDS_ENV)? {
            self.max_page_rounds = rounds;
        }
        if let Some(timeout) = parse_env(TIMEOUT_MS_ENV)? {
            self.timeout_ms = timeout;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(QueueError::Config { reason: reason.to_string() });
        if self.store_address.is_zero() {
            return invalid("store_address is not set");
        }
        if self.page_size == 0 {
            return invalid("page_size must be positive");
        }
        if self.nonce_window == 0 {
            return invalid("nonce_window must be positive");
        }
        if self.max_page_rounds == 0 {
            return invalid("max_page_rounds must be positive");
        }
        if self.timeout_ms == 0 {
            return invalid("timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn with_store(store_address: Address) -> Self {
        Self { store_address, ..Self::default() }
    }
}
