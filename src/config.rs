//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    pub custody: CustodyConfig,
    pub delegation: DelegationConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    /// Network name for display and sanity checks ("mainnet-beta", "devnet", ...)
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustodyConfig {
    /// Master encryption secret. Custody operations refuse to start without it.
    #[serde(default = "default_master_secret")]
    pub master_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegationConfig {
    /// Platform delegate public key (non-sensitive)
    #[serde(default = "default_delegate_pubkey")]
    pub delegate_pubkey: String,

    /// Path to the delegate signing keypair file.
    /// None degrades delegated execution to unavailable; verification still works.
    #[serde(default)]
    pub delegate_keypair_path: Option<String>,

    /// Forward validity window applied to a verified delegation
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Path of the wallet document file. None keeps records in memory only.
    #[serde(default)]
    pub path: Option<String>,
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_network() -> String {
    "mainnet-beta".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_master_secret() -> String {
    std::env::var("CUSTODY_MASTER_SECRET").unwrap_or_default()
}

fn default_delegate_pubkey() -> String {
    std::env::var("DELEGATE_PUBKEY").unwrap_or_default()
}

fn default_validity_days() -> i64 {
    90
}

/// Minimum acceptable master secret length (bytes)
const MIN_MASTER_SECRET_LEN: usize = 16;

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.network", default_network())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix CUSTODY_)
            .add_source(
                config::Environment::with_prefix("CUSTODY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.custody.master_secret.is_empty() {
            anyhow::bail!(
                "custody.master_secret is required (set CUSTODY_MASTER_SECRET); \
                 refusing to start custody without it"
            );
        }

        if self.custody.master_secret.len() < MIN_MASTER_SECRET_LEN {
            anyhow::bail!(
                "custody.master_secret must be at least {} bytes",
                MIN_MASTER_SECRET_LEN
            );
        }

        if self.delegation.delegate_pubkey.is_empty() {
            anyhow::bail!("delegation.delegate_pubkey is required (set DELEGATE_PUBKEY)");
        }

        Pubkey::from_str(&self.delegation.delegate_pubkey).map_err(|e| {
            anyhow::anyhow!(
                "delegation.delegate_pubkey is not a valid public key: {}",
                e
            )
        })?;

        if self.delegation.validity_days <= 0 {
            anyhow::bail!("delegation.validity_days must be positive");
        }

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        Ok(())
    }

    /// Parsed platform delegate public key
    pub fn delegate_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.delegation.delegate_pubkey)
            .map_err(|e| anyhow::anyhow!("Invalid delegate pubkey: {}", e))
    }

    /// Load the delegate signing keypair, if a path is configured.
    ///
    /// The file holds the standard JSON byte array produced by solana-keygen.
    pub fn load_delegate_keypair(&self) -> crate::error::Result<Option<Keypair>> {
        use crate::error::Error;

        let Some(path) = &self.delegation.delegate_keypair_path else {
            return Ok(None);
        };

        // Refuse group/world-readable keypair files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(Error::InvalidKeypair(format!(
                        "Delegate keypair {} has insecure permissions {:o}. Run 'chmod 600 {}'",
                        path,
                        mode & 0o777,
                        path
                    )));
                }
            }
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidKeypair(format!("Failed to read delegate keypair {}: {}", path, e))
        })?;

        let bytes: Vec<u8> = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidKeypair(format!("Failed to parse delegate keypair JSON: {}", e))
        })?;

        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| Error::InvalidKeypair(format!("Invalid delegate keypair bytes: {}", e)))?;

        Ok(Some(keypair))
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    network: {}
    timeout: {}ms
  Custody:
    master_secret: {}
  Delegation:
    delegate_pubkey: {}
    delegate_keypair: {}
    validity_days: {}
  Store:
    path: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.network,
            self.rpc.timeout_ms,
            if self.custody.master_secret.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.delegation.delegate_pubkey,
            match &self.delegation.delegate_keypair_path {
                Some(_) => "*** (loaded from file)",
                None => "(not set - execution disabled)",
            },
            self.delegation.validity_days,
            self.store.path.as_deref().unwrap_or("(memory only)"),
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: default_rpc_endpoint(),
                network: default_network(),
                timeout_ms: default_timeout_ms(),
            },
            custody: CustodyConfig {
                master_secret: default_master_secret(),
            },
            delegation: DelegationConfig {
                delegate_pubkey: default_delegate_pubkey(),
                delegate_keypair_path: None,
                validity_days: default_validity_days(),
            },
            store: StoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            rpc: RpcConfig {
                endpoint: "https://api.devnet.solana.com".into(),
                network: "devnet".into(),
                timeout_ms: 30000,
            },
            custody: CustodyConfig {
                master_secret: "unit-test-master-secret".into(),
            },
            delegation: DelegationConfig {
                delegate_pubkey: solana_sdk::pubkey::Pubkey::new_unique().to_string(),
                delegate_keypair_path: None,
                validity_days: 90,
            },
            store: StoreConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_master_secret_rejected() {
        let mut config = valid_config();
        config.custody.master_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_master_secret_rejected() {
        let mut config = valid_config();
        config.custody.master_secret = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_delegate_pubkey_rejected() {
        let mut config = valid_config();
        config.delegation.delegate_pubkey = "not-a-pubkey".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_masked_display_hides_secret() {
        let config = valid_config();
        let display = config.masked_display();
        assert!(!display.contains("unit-test-master-secret"));
        assert!(display.contains("***"));
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
