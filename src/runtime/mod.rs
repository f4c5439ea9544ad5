//! Queue reconstruction runtime.
//!
//! Every stage talks to chain state through a [`BatchCallExecutor`] so one
//! pass costs a bounded number of batches.
//!
//! [`BatchCallExecutor`]: crate::adapters::BatchCallExecutor

pub mod abi;
pub mod account;
pub mod api;
pub mod assembler;
pub mod collector;
pub mod resolver;

pub use account::fetch_configuration;
pub use api::{PendingQueue, QueueEngine};
pub use assembler::{QueueAccumulator, QueueAssembler};
pub use collector::{PageCursor, SignatureCollector, SignatureQuery};
pub use resolver::TransactionResolver;
