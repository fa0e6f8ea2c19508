//! Key custody and ownership verification
//!
//! Two independent security gates:
//! - [`KeyCustodyManager`] generates keypairs and holds encrypted private key
//!   material under per-owner derived keys. Plaintext leaves exactly once, at
//!   wallet creation.
//! - [`OwnershipVerifier`] proves control of an externally supplied public key
//!   through a signed challenge. No private key ever crosses this boundary.

pub mod keys;
pub mod ownership;

pub use keys::{EncryptedKeyMaterial, GeneratedKeypair, KeyCustodyManager};
pub use ownership::OwnershipVerifier;
