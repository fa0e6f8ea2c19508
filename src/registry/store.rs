//! Wallet document store
//!
//! Keyed by public key with a uniqueness constraint enforced at insert.
//! Records live in a sharded concurrent map so updates are atomic per record
//! (the entry lock covers the whole read-modify-write). Optionally backed by
//! a versioned JSON document file reloaded at startup.

use std::path::PathBuf;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::types::{WalletFile, WalletRecord};

/// Concurrent wallet record store with optional file persistence
pub struct WalletStore {
    /// Records keyed by public key
    wallets: DashMap<String, WalletRecord>,

    /// Document file path; None keeps records in memory only
    path: Option<PathBuf>,
}

impl WalletStore {
    /// Create a store with no file backing
    pub fn in_memory() -> Self {
        Self {
            wallets: DashMap::new(),
            path: None,
        }
    }

    /// Load a store from a document file
    ///
    /// A missing file yields an empty store, same as first startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let file = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;

            serde_json::from_str::<WalletFile>(&content)
                .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            warn!("Wallet file {} not found, starting empty", path.display());
            WalletFile::default()
        };

        let wallets: DashMap<String, WalletRecord> = file
            .wallets
            .into_iter()
            .map(|w| (w.public_key.clone(), w))
            .collect();

        info!("Loaded {} wallet records", wallets.len());

        Ok(Self {
            wallets,
            path: Some(path),
        })
    }

    /// Insert a new record, enforcing public key uniqueness
    pub fn insert_new(&self, record: WalletRecord) -> Result<WalletRecord> {
        match self.wallets.entry(record.public_key.clone()) {
            Entry::Occupied(_) => {
                return Err(Error::Conflict(format!(
                    "public key already registered: {}",
                    record.public_key
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        self.save()?;
        Ok(record)
    }

    /// Find a record by public key
    pub fn find_by_public_key(&self, public_key: &str) -> Option<WalletRecord> {
        self.wallets.get(public_key).map(|r| r.value().clone())
    }

    /// All records for an owner, oldest first
    pub fn list_by_owner(&self, owner_id: &str) -> Vec<WalletRecord> {
        let mut records: Vec<WalletRecord> = self
            .wallets
            .iter()
            .filter(|r| r.value().owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();

        records.sort_by_key(|r| r.created_at);
        records
    }

    /// Atomically mutate one record and persist the result
    ///
    /// The closure runs under the record's entry lock; concurrent updates to
    /// the same public key serialize here instead of losing writes.
    pub fn update<F>(&self, public_key: &str, mutate: F) -> Result<WalletRecord>
    where
        F: FnOnce(&mut WalletRecord),
    {
        let snapshot = {
            let mut entry = self.wallets.get_mut(public_key).ok_or_else(|| {
                Error::NotFound(format!("wallet not found: {}", public_key))
            })?;

            mutate(entry.value_mut());
            entry.value_mut().updated_at = chrono::Utc::now();
            entry.value().clone()
        };

        self.save()?;
        Ok(snapshot)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Write the document file, when one is configured
    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut wallets: Vec<WalletRecord> = self.wallets.iter().map(|r| r.value().clone()).collect();
        wallets.sort_by_key(|r| r.created_at);

        let file = WalletFile {
            version: "1.0".to_string(),
            wallets,
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Storage(format!("Failed to serialize wallet file: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!("Saved wallet file ({} records)", self.wallets.len());
        Ok(())
    }
}
