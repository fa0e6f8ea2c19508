//! CLI command implementations

use anyhow::Result;
use dialoguer::Confirm;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::custody::{KeyCustodyManager, OwnershipVerifier};
use crate::delegation::{instruction, DelegationAuthorityManager};
use crate::error::Error;
use crate::ledger::{LedgerGateway, RpcLedgerGateway};
use crate::registry::{WalletRegistry, WalletStore};

/// Maximum accepted age of an ownership challenge at connect time
const CHALLENGE_MAX_AGE_MINUTES: i64 = 10;

/// Build the wallet registry from configuration
fn build_registry(config: &Config) -> Result<Arc<WalletRegistry>> {
    let store = match &config.store.path {
        Some(path) => WalletStore::load(path)?,
        None => WalletStore::in_memory(),
    };

    let custody = KeyCustodyManager::new(config.custody.master_secret.clone())?;

    Ok(Arc::new(WalletRegistry::new(Arc::new(store), custody)))
}

/// Build the delegation manager plus the registry it writes through
fn build_delegation(config: &Config) -> Result<(Arc<WalletRegistry>, DelegationAuthorityManager)> {
    let registry = build_registry(config)?;

    let ledger = Arc::new(RpcLedgerGateway::new(
        config.rpc.endpoint.clone(),
        std::time::Duration::from_millis(config.rpc.timeout_ms),
    ));

    let manager = DelegationAuthorityManager::new(
        ledger,
        registry.clone(),
        config.delegate_pubkey()?,
        config.load_delegate_keypair()?,
        config.delegation.validity_days,
    )?;

    Ok((registry, manager))
}

/// Create a platform-custody wallet and print the one-time private key
pub async fn wallet_create(config: &Config, owner: &str, force: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("The private key will be printed exactly once and never again. Continue?")
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Wallet creation cancelled");
            return Ok(());
        }
    }

    let registry = build_registry(config)?;
    let created = registry.create_wallet(owner)?;

    println!("Wallet created for owner {}", owner);
    println!("  public key:  {}", created.public_key);
    println!("  private key: {}", created.private_key);
    println!();
    println!("Store the private key now. It is not recoverable from this service.");

    Ok(())
}

/// Link an externally controlled wallet after verifying a signed challenge
pub async fn wallet_connect(
    config: &Config,
    owner: &str,
    pubkey: &str,
    challenge: &str,
    signature: &str,
) -> Result<()> {
    let verifier = OwnershipVerifier::new();

    let parts = verifier
        .parse_challenge(challenge)
        .ok_or_else(|| Error::Validation("malformed ownership challenge".to_string()))?;

    if parts.owner_id != owner {
        return Err(Error::Unauthorized(
            "challenge was issued for a different owner".to_string(),
        )
        .into());
    }

    if !parts.issued_within(chrono::Duration::minutes(CHALLENGE_MAX_AGE_MINUTES)) {
        return Err(Error::Unauthorized("ownership challenge has expired".to_string()).into());
    }

    if !verifier.verify(challenge, signature, pubkey) {
        return Err(Error::Unauthorized("ownership signature did not verify".to_string()).into());
    }

    let registry = build_registry(config)?;
    let record = registry.connect_wallet(owner, pubkey)?;

    println!("Wallet {} connected for owner {}", record.public_key, owner);
    Ok(())
}

/// List an owner's wallets with their delegation state
pub async fn wallet_list(config: &Config, owner: &str) -> Result<()> {
    let registry = build_registry(config)?;
    let wallets = registry.list_wallets(owner)?;

    if wallets.is_empty() {
        println!("No wallets for owner {}", owner);
        return Ok(());
    }

    let now = chrono::Utc::now();
    for wallet in wallets {
        println!(
            "{}  {}  delegation: {}{}",
            wallet.public_key,
            wallet.custody,
            wallet.delegation_state(now),
            wallet
                .delegation_expiry
                .map(|e| format!(" (expires {})", e.format("%Y-%m-%d")))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

/// Issue a fresh ownership challenge for an owner
pub async fn challenge_new(owner: &str) -> Result<()> {
    let challenge = OwnershipVerifier::new().create_challenge(owner)?;
    println!("{}", challenge);
    println!();
    println!("Sign this exact message with the wallet key and pass the base58 signature to 'wallet connect'.");
    Ok(())
}

/// Build an unsigned delegation approval for client-side signing
pub async fn delegation_instruction(
    config: &Config,
    owner: &str,
    wallet: &str,
    token_account: Option<String>,
    mint: Option<String>,
    amount: u64,
) -> Result<()> {
    let (registry, manager) = build_delegation(config)?;

    // The route layer's authorization check: the wallet must belong to the caller
    let record = registry
        .find_by_public_key(wallet)
        .ok_or_else(|| Error::NotFound(format!("wallet not registered: {}", wallet)))?;
    if record.owner_id != owner {
        return Err(
            Error::Unauthorized(format!("wallet {} does not belong to the caller", wallet)).into(),
        );
    }

    let token_account = match (token_account, mint) {
        (Some(account), _) => account,
        (None, Some(mint)) => {
            let wallet_key = wallet.parse()?;
            let mint_key = mint.parse()?;
            instruction::associated_token_account(&wallet_key, &mint_key).to_string()
        }
        (None, None) => {
            return Err(Error::Validation(
                "either --token-account or --mint is required".to_string(),
            )
            .into());
        }
    };

    let approval = manager
        .create_delegation_instruction(wallet, &token_account, amount)
        .await?;

    println!("Unsigned delegation approval (sign client-side and submit):");
    println!("{}", approval.encoded);
    println!();
    println!(
        "Grants delegate {} authority over up to {} base units at {}",
        approval.delegate, approval.amount, token_account
    );
    println!("After signing and submitting, run 'delegation refresh' to confirm.");

    Ok(())
}

/// Re-check the ledger and persist the wallet's delegation projection
pub async fn delegation_refresh(
    config: &Config,
    owner: &str,
    wallet: &str,
    token_account: &str,
) -> Result<()> {
    let (registry, manager) = build_delegation(config)?;

    let delegated = manager
        .update_delegation_status(owner, wallet, token_account)
        .await?;

    if delegated {
        let record = registry
            .find_by_public_key(wallet)
            .ok_or_else(|| Error::NotFound(format!("wallet not found: {}", wallet)))?;
        println!(
            "Delegation active; cached until {}",
            record
                .delegation_expiry
                .map(|e| e.to_rfc3339())
                .unwrap_or_default()
        );
    } else {
        println!("No delegation to the platform key on chain");
    }

    Ok(())
}

/// Read-only on-chain delegation check for a token account
pub async fn delegation_status(config: &Config, token_account: &str) -> Result<()> {
    let (_, manager) = build_delegation(config)?;

    let account = token_account
        .parse()
        .map_err(|e| Error::Validation(format!("invalid token account: {}", e)))?;

    if manager.verify_delegation(&account).await? {
        println!("{}: delegated to the platform key", token_account);
    } else {
        println!("{}: not delegated to the platform key", token_account);
    }

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check ledger RPC reachability
pub async fn health(config: &Config) -> Result<()> {
    let ledger = RpcLedgerGateway::new(
        config.rpc.endpoint.clone(),
        std::time::Duration::from_millis(config.rpc.timeout_ms),
    );

    print!("Ledger RPC ({}): ", config.rpc.network);
    match ledger.latest_blockhash().await {
        Ok(blockhash) => println!("OK (blockhash {})", blockhash),
        Err(e) => {
            println!("UNREACHABLE");
            return Err(e.into());
        }
    }

    match config.load_delegate_keypair()? {
        Some(_) => println!("Delegate signing key: loaded"),
        None => println!("Delegate signing key: not configured (execution disabled)"),
    }

    Ok(())
}
