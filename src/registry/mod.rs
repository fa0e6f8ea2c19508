//! Wallet registry
//!
//! Catalog of wallet records (platform-created keys and externally linked
//! keys) plus their cached delegation projection. The store is the single
//! source of truth: owner-facing wallet lists are always derived from it at
//! read time, never kept as a second copy.

pub mod manager;
pub mod store;
pub mod types;

pub use manager::{CreatedWallet, WalletRegistry};
pub use store::WalletStore;
pub use types::{CustodyType, DelegationState, WalletRecord};
