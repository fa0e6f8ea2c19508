//! Ledger RPC gateway
//!
//! Thin async seam over the Solana RPC surface the subsystem consumes:
//! blockhash fetch for transaction binding, token-account reads for
//! delegation verification, and transaction submission. Failures are logged
//! with operation context and surfaced as [`Error::LedgerUnavailable`]; no
//! retry or backoff here.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Unpacked SPL token account fields the delegation checks care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountState {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub delegated_amount: u64,
}

impl TokenAccountState {
    /// True iff the on-chain delegate field names `delegate` with a live allowance
    pub fn is_delegated_to(&self, delegate: &Pubkey) -> bool {
        self.delegate.as_ref() == Some(delegate) && self.delegated_amount > 0
    }
}

/// Async ledger operations consumed by the delegation manager
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current blockhash, binding a transaction to a validity window
    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Token-account state, or None when the account does not exist
    async fn token_account(&self, address: &Pubkey) -> Result<Option<TokenAccountState>>;

    /// Submit a signed transaction and wait for confirmation
    async fn submit_transaction(&self, transaction: &Transaction) -> Result<Signature>;
}

/// Production gateway over the nonblocking Solana RPC client
pub struct RpcLedgerGateway {
    rpc: RpcClient,
}

impl RpcLedgerGateway {
    pub fn new(endpoint: String, timeout: std::time::Duration) -> Self {
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                endpoint,
                timeout,
                CommitmentConfig::confirmed(),
            ),
        }
    }

    pub fn endpoint(&self) -> String {
        self.rpc.url()
    }
}

#[async_trait]
impl LedgerGateway for RpcLedgerGateway {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.rpc.get_latest_blockhash().await.map_err(|e| {
            error!("Blockhash fetch failed: {}", e);
            Error::ledger("get_latest_blockhash", e)
        })
    }

    async fn token_account(&self, address: &Pubkey) -> Result<Option<TokenAccountState>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await
            .map_err(|e| {
                error!("Account fetch failed for {}: {}", address, e);
                Error::ledger("get_account", e)
            })?;

        let Some(account) = response.value else {
            debug!("Token account {} does not exist", address);
            return Ok(None);
        };

        unpack_token_account(address, &account.owner, &account.data).map(Some)
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.rpc
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(|e| {
                error!("Transaction submission failed: {}", e);
                Error::ledger("send_and_confirm_transaction", e)
            })
    }
}

/// Decode raw account data as an SPL token account
fn unpack_token_account(
    address: &Pubkey,
    program_owner: &Pubkey,
    data: &[u8],
) -> Result<TokenAccountState> {
    if *program_owner != spl_token::ID {
        return Err(Error::Validation(format!(
            "account {} is not owned by the token program",
            address
        )));
    }

    let state = spl_token::state::Account::unpack(data).map_err(|e| {
        Error::Validation(format!("account {} is not a token account: {}", address, e))
    })?;

    Ok(TokenAccountState {
        mint: state.mint,
        owner: state.owner,
        amount: state.amount,
        delegate: state.delegate.into(),
        delegated_amount: state.delegated_amount,
    })
}
