//! Wallet registry - catalog operations
//!
//! Coordinates key custody and the wallet store. All mutating operations
//! require an authenticated owner id.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::custody::KeyCustodyManager;
use crate::error::{Error, Result};

use super::store::WalletStore;
use super::types::WalletRecord;

/// Result of creating a wallet: the persisted record plus the one-time
/// plaintext private key for the end user. The plaintext is never stored.
#[derive(Debug)]
pub struct CreatedWallet {
    pub record: WalletRecord,
    pub public_key: String,
    pub private_key: String,
}

/// The catalog of wallet records and their delegation projection
pub struct WalletRegistry {
    store: Arc<WalletStore>,
    custody: KeyCustodyManager,
}

impl WalletRegistry {
    pub fn new(store: Arc<WalletStore>, custody: KeyCustodyManager) -> Self {
        Self { store, custody }
    }

    /// Generate, encrypt, and register a platform-custody wallet
    pub fn create_wallet(&self, owner_id: &str) -> Result<CreatedWallet> {
        require_owner(owner_id)?;

        let generated = self.custody.generate();
        let material = self.custody.encrypt(&generated.private_key, owner_id)?;

        let record = self
            .store
            .insert_new(WalletRecord::new_created(
                owner_id,
                &generated.public_key,
                material,
            ))?;

        info!(
            "Created wallet {} for owner {}",
            generated.public_key, owner_id
        );

        Ok(CreatedWallet {
            record,
            public_key: generated.public_key,
            private_key: generated.private_key,
        })
    }

    /// Register an externally controlled wallet by public key
    ///
    /// Ownership must already be proven via the challenge flow; this only
    /// records the link. Fails with Conflict if any owner holds the key.
    pub fn connect_wallet(&self, owner_id: &str, public_key: &str) -> Result<WalletRecord> {
        require_owner(owner_id)?;

        Pubkey::from_str(public_key)
            .map_err(|e| Error::Validation(format!("invalid public key {}: {}", public_key, e)))?;

        let record = self
            .store
            .insert_new(WalletRecord::new_connected(owner_id, public_key))?;

        info!("Connected wallet {} for owner {}", public_key, owner_id);
        Ok(record)
    }

    /// All wallets of an owner, derived from the store at read time
    pub fn list_wallets(&self, owner_id: &str) -> Result<Vec<WalletRecord>> {
        require_owner(owner_id)?;
        Ok(self.store.list_by_owner(owner_id))
    }

    /// Look up a wallet by public key
    pub fn find_by_public_key(&self, public_key: &str) -> Option<WalletRecord> {
        self.store.find_by_public_key(public_key)
    }

    /// Idempotently update the cached delegation projection of a wallet
    ///
    /// Only the delegation manager calls this, after an on-chain check.
    pub fn update_delegation_state(
        &self,
        public_key: &str,
        has_delegation: bool,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<WalletRecord> {
        if has_delegation && expiry.is_none() {
            return Err(Error::Validation(
                "an active delegation requires an expiry".to_string(),
            ));
        }

        self.store.update(public_key, |record| {
            record.has_delegation = has_delegation;
            record.delegation_expiry = if has_delegation { expiry } else { None };
        })
    }

    /// Stamp the time a delegation-approval instruction was issued
    pub fn mark_delegation_requested(&self, public_key: &str) -> Result<WalletRecord> {
        self.store.update(public_key, |record| {
            record.delegation_requested_at = Some(Utc::now());
        })
    }
}

/// Reject operations without an authenticated owner identity
fn require_owner(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(Error::Unauthorized(
            "operation requires an authenticated owner id".to_string(),
        ));
    }
    Ok(())
}
