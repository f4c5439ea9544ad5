//! Ethereum JSON-RPC executor.
//!
//! Batches are sent as a single Multicall3 `aggregate3` `eth_call`.

mod real_adapter;

pub use real_adapter::MulticallExecutor;
