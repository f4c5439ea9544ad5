//! Pure, network-free logic of the engine:
//! - Transaction identity derivation (`hashing`)
//! - Quorum evaluation and authorization encoding (`quorum`)
//! - Optional signer recovery (`recovery`)

pub mod hashing;
pub mod quorum;
pub mod recovery;

pub use hashing::transaction_identity;
pub use quorum::{encode_authorization, is_executable};
pub use recovery::{verify_entry, SignerCheck};
