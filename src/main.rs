//! Custodial wallet service CLI
//!
//! # WARNING
//! - 'wallet create' prints private key material exactly once. Run it on a
//!   trusted terminal only.
//! - Delegated execution moves real user funds and is deliberately not
//!   exposed here; it is reachable only through the library API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use wallet_custody::cli::commands;
use wallet_custody::config::Config;

/// Custodial wallet service - key custody and delegated spending authority
#[derive(Parser)]
#[command(name = "custody")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet registry commands
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Issue an ownership challenge for signing
    Challenge {
        /// Owner account id
        #[arg(long)]
        owner: String,
    },

    /// Delegated spending authority commands
    Delegation {
        #[command(subcommand)]
        action: DelegationAction,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check ledger RPC reachability and delegate key status
    Health,
}

#[derive(Subcommand)]
enum WalletAction {
    /// Create a platform-custody wallet (prints the private key once)
    Create {
        /// Owner account id
        #[arg(long)]
        owner: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Link an external wallet after proving ownership
    Connect {
        /// Owner account id
        #[arg(long)]
        owner: String,

        /// Wallet public key (base58)
        #[arg(long)]
        pubkey: String,

        /// Challenge message previously issued by 'challenge'
        #[arg(long)]
        challenge: String,

        /// Base58 signature over the challenge
        #[arg(long)]
        signature: String,
    },

    /// List an owner's wallets
    List {
        /// Owner account id
        #[arg(long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum DelegationAction {
    /// Build an unsigned delegation approval for client-side signing
    Instruction {
        /// Owner account id
        #[arg(long)]
        owner: String,

        /// Registered wallet public key
        #[arg(long)]
        wallet: String,

        /// Token account to delegate from
        #[arg(long)]
        token_account: Option<String>,

        /// Token mint; derives the wallet's associated token account
        #[arg(long)]
        mint: Option<String>,

        /// Maximum allowance in token base units
        #[arg(long)]
        amount: u64,
    },

    /// Re-check the ledger and update the cached delegation state
    Refresh {
        /// Owner account id
        #[arg(long)]
        owner: String,

        /// Registered wallet public key
        #[arg(long)]
        wallet: String,

        /// Token account the delegation was approved on
        #[arg(long)]
        token_account: String,
    },

    /// Read-only on-chain delegation check
    Status {
        /// Token account to inspect
        #[arg(long)]
        token_account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_custody=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create { owner, force } => {
                commands::wallet_create(&config, &owner, force).await
            }
            WalletAction::Connect {
                owner,
                pubkey,
                challenge,
                signature,
            } => commands::wallet_connect(&config, &owner, &pubkey, &challenge, &signature).await,
            WalletAction::List { owner } => commands::wallet_list(&config, &owner).await,
        },
        Commands::Challenge { owner } => commands::challenge_new(&owner).await,
        Commands::Delegation { action } => match action {
            DelegationAction::Instruction {
                owner,
                wallet,
                token_account,
                mint,
                amount,
            } => {
                commands::delegation_instruction(
                    &config,
                    &owner,
                    &wallet,
                    token_account,
                    mint,
                    amount,
                )
                .await
            }
            DelegationAction::Refresh {
                owner,
                wallet,
                token_account,
            } => commands::delegation_refresh(&config, &owner, &wallet, &token_account).await,
            DelegationAction::Status { token_account } => {
                commands::delegation_status(&config, &token_account).await
            }
        },
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
