//! # Safe Queue
//!
//! Reconstructs the pending transaction queue of an EVM multisig account
//! from an on-chain, append-only signature store.
//!
//! Owners write signatures (and, once, the transaction content they sign)
//! to the store. This crate reads them back, groups them by nonce and
//! content-derived transaction identity, and tells the caller which queued
//! transactions have reached the account threshold.
//!
//! ## Features
//!
//! - **Content addressing**: identities are EIP-712 safeTxHash values, so
//!   owners who sign identical parameters converge on one entry
//! - **Batched reads**: one Multicall3 batch per stage (and per page round)
//! - **Partial-failure isolation**: one failing call never hides the rest
//! - **Authorization encoding**: compact signatures expanded and ordered for
//!   `execTransaction`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use safe_queue::adapters::ethereum::MulticallExecutor;
//! use safe_queue::{AccountIdentity, EngineConfig, QueueEngine};
//!
//! # async fn run() -> safe_queue::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let executor = MulticallExecutor::from_config(&config)?;
//! let engine = QueueEngine::new(executor, config)?;
//!
//! let account = AccountIdentity::new("0x1111111111111111111111111111111111111111".parse().unwrap(), 1);
//! let pending = engine.reconstruct_pending(&account).await?;
//! for entry in pending.executable() {
//!     let blob = QueueEngine::<MulticallExecutor>::encode_authorization(&entry.signature_list())?;
//!     println!("{:?} ready with {} bytes of signatures", entry.identity, blob.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod runtime;
pub mod types;
pub mod utils;

pub use adapters::{BatchCallExecutor, Call, CallResult};
pub use config::EngineConfig;
pub use core::{encode_authorization, is_executable, transaction_identity, verify_entry, SignerCheck};
pub use error::{QueueError, Result};
pub use runtime::{PendingQueue, QueueEngine};
pub use types::{
    AccountConfiguration, AccountIdentity, NonceGroup, Operation, QueueEntry, Signature, TransactionIdentity,
    TransactionParams, TransactionRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
