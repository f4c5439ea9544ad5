//! Error types for queue reconstruction and authorization encoding.
//!
//! Provides strongly-typed errors using `thiserror`. Individual call
//! failures inside a batch are not errors: they are reported per slot by
//! the executor and treated as "no data" by the engine.

use ethers::types::Address;
use thiserror::Error;

/// Errors that can occur while reconstructing or authorizing a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The batch round trip itself failed (RPC unreachable, bad response envelope).
    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
    },
    /// An authorization was requested for zero signatures.
    #[error("Cannot encode an authorization with zero signatures")]
    EmptyAuthorization,
    /// Invalid input parameters
    #[error("Invalid input: {reason}")]
    InvalidInput {
        reason: String,
    },
    /// Return data of a call that must succeed could not be decoded.
    #[error("Failed to decode {call}: {reason}")]
    Decode {
        call: &'static str,
        reason: String,
    },
    /// Signature pagination did not reach the reported total within the
    /// round limit.
    #[error("Signature pagination incomplete after {rounds} rounds")]
    PaginationLimit {
        rounds: u32,
    },
    /// A continuation page failed after earlier pages of the same bucket
    /// were read.
    #[error("Signature page at offset {offset} failed for owner {owner:?} at nonce {nonce}")]
    IncompletePage {
        owner: Address,
        nonce: u64,
        offset: u64,
    },
    /// Reconstruction did not finish before the configured deadline.
    #[error("Reconstruction timed out after {millis} ms")]
    Timeout {
        millis: u64,
    },
    /// Reconstruction was cancelled by the caller.
    #[error("Reconstruction cancelled")]
    Cancelled,
    /// Signer recovery failed during optional verification.
    #[error("Signature recovery failed: {reason}")]
    Recovery {
        reason: String,
    },
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
    },
}

/// Result type alias for queue operations.
pub type Result<T> = core::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::Transport { reason: "connection refused".into() };
        assert_eq!(err.to_string(), "Transport error: connection refused");

        let err = QueueError::Decode { call: "getOwners", reason: "short return data".into() };
        assert!(err.to_string().contains("getOwners"));

        assert_eq!(QueueError::Timeout { millis: 250 }.to_string(), "Reconstruction timed out after 250 ms");
        assert_eq!(
            QueueError::PaginationLimit { rounds: 64 }.to_string(),
            "Signature pagination incomplete after 64 rounds"
        );
    }
}
