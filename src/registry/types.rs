//! Core types for the wallet registry
//!
//! Defines wallet records, custody types, and the derived delegation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::custody::EncryptedKeyMaterial;

/// A wallet record in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Unique record id
    pub id: String,

    /// Owning account id
    pub owner_id: String,

    /// Base58 public key, globally unique across all owners
    pub public_key: String,

    /// Custody type
    #[serde(rename = "type")]
    pub custody: CustodyType,

    /// Encrypted private key material.
    /// Present iff custody is Created; set exactly once, at creation.
    pub encrypted_private_key: Option<EncryptedKeyMaterial>,

    /// Cached delegation projection; the ledger is the source of truth
    pub has_delegation: bool,

    /// Expiry of the cached delegation; non-null whenever has_delegation is set
    pub delegation_expiry: Option<DateTime<Utc>>,

    /// When a delegation-approval instruction was last issued for this wallet
    #[serde(default)]
    pub delegation_requested_at: Option<DateTime<Utc>>,

    /// When the wallet was registered
    pub created_at: DateTime<Utc>,

    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    /// Build a Created-type record holding encrypted key material
    pub fn new_created(
        owner_id: impl Into<String>,
        public_key: impl Into<String>,
        encrypted_private_key: EncryptedKeyMaterial,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            public_key: public_key.into(),
            custody: CustodyType::Created,
            encrypted_private_key: Some(encrypted_private_key),
            has_delegation: false,
            delegation_expiry: None,
            delegation_requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a Connected-type record (public key only, no key material)
    pub fn new_connected(owner_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            public_key: public_key.into(),
            custody: CustodyType::Connected,
            encrypted_private_key: None,
            has_delegation: false,
            delegation_expiry: None,
            delegation_requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the delegation state at `now`.
    ///
    /// Expiry is evaluated lazily here; nothing sweeps expired records.
    pub fn delegation_state(&self, now: DateTime<Utc>) -> DelegationState {
        if self.has_delegation {
            match self.delegation_expiry {
                Some(expiry) if expiry > now => DelegationState::Active,
                _ => DelegationState::Expired,
            }
        } else if self.delegation_requested_at.is_some() {
            DelegationState::Requested
        } else {
            DelegationState::None
        }
    }
}

/// Whether the platform holds an encrypted copy of the wallet's private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyType {
    /// Keypair generated by the platform; encrypted private key held
    Created,

    /// Externally controlled key linked after proof of ownership
    Connected,
}

impl CustodyType {
    /// Check if this custody type carries encrypted key material
    pub fn holds_key_material(&self) -> bool {
        matches!(self, CustodyType::Created)
    }
}

impl std::fmt::Display for CustodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustodyType::Created => write!(f, "created"),
            CustodyType::Connected => write!(f, "connected"),
        }
    }
}

/// Delegation state derived from a wallet record; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationState {
    /// No delegation requested or granted
    None,

    /// Approval instruction issued, not yet confirmed on-chain
    Requested,

    /// Confirmed on-chain within the validity window
    Active,

    /// Previously confirmed, validity window elapsed
    Expired,
}

impl std::fmt::Display for DelegationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelegationState::None => write!(f, "none"),
            DelegationState::Requested => write!(f, "requested"),
            DelegationState::Active => write!(f, "active"),
            DelegationState::Expired => write!(f, "expired"),
        }
    }
}

/// Wallet document file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletFile {
    /// File format version
    #[serde(default = "default_version")]
    pub version: String,

    /// All wallet records
    pub wallets: Vec<WalletRecord>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for WalletFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            wallets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_record_has_no_key_material() {
        let record = WalletRecord::new_connected("u1", "PK1");
        assert_eq!(record.custody, CustodyType::Connected);
        assert!(record.encrypted_private_key.is_none());
        assert!(!record.has_delegation);
    }

    #[test]
    fn test_delegation_state_derivation() {
        let now = Utc::now();
        let mut record = WalletRecord::new_connected("u1", "PK1");

        assert_eq!(record.delegation_state(now), DelegationState::None);

        record.delegation_requested_at = Some(now);
        assert_eq!(record.delegation_state(now), DelegationState::Requested);

        record.has_delegation = true;
        record.delegation_expiry = Some(now + chrono::Duration::days(90));
        assert_eq!(record.delegation_state(now), DelegationState::Active);

        // Lazy expiry: same record, later clock
        let later = now + chrono::Duration::days(91);
        assert_eq!(record.delegation_state(later), DelegationState::Expired);
    }

    #[test]
    fn test_record_serialization_uses_type_tag() {
        let record = WalletRecord::new_connected("u1", "PK1");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
    }
}
