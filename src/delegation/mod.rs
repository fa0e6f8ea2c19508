//! Delegated spending authority
//!
//! Builds on-chain approval instructions for client-side signing, verifies
//! delegation against ledger state (the source of truth), maintains the
//! cached projection in the wallet registry, and executes transfers under
//! the platform delegate key.

pub mod instruction;
pub mod manager;

pub use manager::{DelegationApproval, DelegationAuthorityManager};
