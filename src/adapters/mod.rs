//! Batch call executors.
//!
//! Provides a unified interface for issuing many independent read-only
//! contract calls in one round trip, whatever the transport.

use async_trait::async_trait;
use ethers::types::{Address, Bytes};

use crate::error::Result;

pub mod ethereum;
pub mod memory;

/// One read-only call in a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub calldata: Bytes,
    /// When set, a revert of this call must not fail the batch.
    pub allow_failure: bool,
}

impl Call {
    /// A call whose failure is tolerated by the batch.
    pub fn tolerant(target: Address, calldata: Vec<u8>) -> Self {
        Self { target, calldata: calldata.into(), allow_failure: true }
    }
}

/// Per-call outcome, in the same position as its [`Call`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallResult {
    pub fn ok(return_data: Vec<u8>) -> Self {
        Self { success: true, return_data: return_data.into() }
    }

    pub fn failed() -> Self {
        Self { success: false, return_data: Bytes::default() }
    }

    /// Return data of a successful call that actually returned something.
    pub fn data(&self) -> Option<&[u8]> {
        if self.success && !self.return_data.is_empty() {
            Some(&self.return_data)
        } else {
            None
        }
    }
}

/// Trait for transports that execute call batches.
///
/// Implementors must return exactly one result per call, in input order.
/// `Err` is reserved for failure of the round trip as a whole; executors
/// never retry.
#[async_trait]
pub trait BatchCallExecutor: Send + Sync {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallResult>>;

    /// Get the transport identifier string.
    fn transport_id(&self) -> &'static str;
}

#[async_trait]
impl<T: BatchCallExecutor + ?Sized> BatchCallExecutor for std::sync::Arc<T> {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallResult>> {
        (**self).execute(calls).await
    }

    fn transport_id(&self) -> &'static str {
        (**self).transport_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_result_data() {
        assert_eq!(CallResult::ok(vec![1, 2]).data(), Some(&[1u8, 2][..]));
        assert_eq!(CallResult::ok(vec![]).data(), None);
        assert_eq!(CallResult::failed().data(), None);
    }
}
