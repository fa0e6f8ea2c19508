//! Delegation authority manager
//!
//! Owns the platform delegate identity: builds approval instructions for
//! owners to sign, checks the ledger for granted authority, refreshes the
//! registry's cached projection, and spends under the delegate key.
//!
//! The ledger is the source of truth. The cached projection only ever
//! changes after an on-chain read, and a failed read changes nothing.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::LedgerGateway;
use crate::registry::WalletRegistry;

use super::instruction;

/// An unsigned delegation approval, ready for client-side signing
#[derive(Debug, Clone)]
pub struct DelegationApproval {
    /// Unsigned transaction; fee payer is the wallet owner
    pub transaction: Transaction,

    /// base64(bincode) encoding of the transaction for the wire
    pub encoded: String,

    /// The delegate being granted authority
    pub delegate: Pubkey,

    /// Upper bound of the granted allowance (token base units)
    pub amount: u64,
}

/// Manages on-chain delegated spending authority for registered wallets
pub struct DelegationAuthorityManager {
    ledger: Arc<dyn LedgerGateway>,
    registry: Arc<WalletRegistry>,

    /// Platform delegate public key; what the on-chain delegate field must equal
    delegate_pubkey: Pubkey,

    /// Delegate signing key, injected at startup. None disables execution
    /// while read-only verification keeps working.
    delegate_signer: Option<Arc<Keypair>>,

    /// Forward validity window applied on a successful verification
    validity: chrono::Duration,
}

impl std::fmt::Debug for DelegationAuthorityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationAuthorityManager")
            .field("delegate_pubkey", &self.delegate_pubkey)
            .field("delegate_signer", &self.delegate_signer.is_some())
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl DelegationAuthorityManager {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        registry: Arc<WalletRegistry>,
        delegate_pubkey: Pubkey,
        delegate_signer: Option<Keypair>,
        validity_days: i64,
    ) -> Result<Self> {
        if let Some(signer) = &delegate_signer {
            if signer.pubkey() != delegate_pubkey {
                return Err(Error::Config(format!(
                    "delegate signing key {} does not match configured delegate {}",
                    signer.pubkey(),
                    delegate_pubkey
                )));
            }
        } else {
            warn!("No delegate signing key loaded; delegated execution disabled");
        }

        Ok(Self {
            ledger,
            registry,
            delegate_pubkey,
            delegate_signer: delegate_signer.map(Arc::new),
            validity: chrono::Duration::days(validity_days),
        })
    }

    /// Build an unsigned approval granting the platform delegate authority
    /// over up to `amount` at `token_account`
    ///
    /// The owner signs client-side; the platform's copy of the owner key, if
    /// any, is never touched here.
    pub async fn create_delegation_instruction(
        &self,
        owner_public_key: &str,
        token_account: &str,
        amount: u64,
    ) -> Result<DelegationApproval> {
        let owner = parse_pubkey(owner_public_key, "owner public key")?;
        let token_account = parse_pubkey(token_account, "token account")?;

        if amount == 0 {
            return Err(Error::Validation(
                "delegation amount must be positive".to_string(),
            ));
        }

        // The wallet must already be registered to this platform
        if self.registry.find_by_public_key(owner_public_key).is_none() {
            return Err(Error::NotFound(format!(
                "wallet not registered: {}",
                owner_public_key
            )));
        }

        let approve =
            instruction::approve_delegate(&token_account, &self.delegate_pubkey, &owner, amount)?;

        // Bind to the current network state to bound the validity window
        let blockhash = self.ledger.latest_blockhash().await?;
        let transaction = instruction::unsigned_with_payer(&[approve], &owner, blockhash);
        let encoded = instruction::encode_unsigned(&transaction)?;

        self.registry.mark_delegation_requested(owner_public_key)?;

        info!(
            "Built delegation approval for wallet {} over {} (amount: {})",
            owner_public_key, token_account, amount
        );

        Ok(DelegationApproval {
            transaction,
            encoded,
            delegate: self.delegate_pubkey,
            amount,
        })
    }

    /// Check on-chain whether `token_account` delegates to the platform key
    ///
    /// Source of truth. A missing account means the delegation is genuinely
    /// absent (`Ok(false)`); an RPC failure propagates as
    /// [`Error::LedgerUnavailable`] and is never conflated with absence.
    pub async fn verify_delegation(&self, token_account: &Pubkey) -> Result<bool> {
        let Some(state) = self.ledger.token_account(token_account).await? else {
            debug!("Token account {} not found; no delegation", token_account);
            return Ok(false);
        };

        Ok(state.is_delegated_to(&self.delegate_pubkey))
    }

    /// Re-check the ledger and persist the wallet's delegation projection
    ///
    /// Returns the resolved on-chain answer. A ledger failure leaves the
    /// cached state untouched so a transient outage cannot clobber a
    /// still-valid expiry.
    pub async fn update_delegation_status(
        &self,
        owner_id: &str,
        public_key: &str,
        token_account: &str,
    ) -> Result<bool> {
        if owner_id.trim().is_empty() {
            return Err(Error::Unauthorized(
                "operation requires an authenticated owner id".to_string(),
            ));
        }

        let wallet = self
            .registry
            .find_by_public_key(public_key)
            .ok_or_else(|| Error::NotFound(format!("wallet not found: {}", public_key)))?;

        if wallet.owner_id != owner_id {
            return Err(Error::Unauthorized(format!(
                "wallet {} does not belong to the caller",
                public_key
            )));
        }

        let token_account = parse_pubkey(token_account, "token account")?;
        let delegated = self.verify_delegation(&token_account).await?;

        if delegated {
            let expiry = Utc::now() + self.validity;
            self.registry
                .update_delegation_state(public_key, true, Some(expiry))?;
            info!(
                "Delegation confirmed for wallet {} (expires {})",
                public_key, expiry
            );
        } else {
            self.registry
                .update_delegation_state(public_key, false, None)?;
            info!("No delegation on chain for wallet {}", public_key);
        }

        Ok(delegated)
    }

    /// Move up to the delegated allowance out of `token_account`
    ///
    /// Signed and fee-paid by the platform delegate key. Highest-privilege
    /// operation in the subsystem; reachable from trusted internal callers
    /// only, never wired to a user-facing endpoint.
    pub async fn execute_with_delegated_authority(
        &self,
        token_account: &str,
        destination: &str,
        amount: u64,
    ) -> Result<Signature> {
        let signer = self.delegate_signer.as_ref().ok_or_else(|| {
            Error::DelegationUnavailable("no delegate signing key loaded".to_string())
        })?;

        let source = parse_pubkey(token_account, "token account")?;
        let destination = parse_pubkey(destination, "destination")?;

        if amount == 0 {
            return Err(Error::Validation(
                "transfer amount must be positive".to_string(),
            ));
        }

        let transfer =
            instruction::delegated_transfer(&source, &destination, &signer.pubkey(), amount)?;

        let blockhash = self.ledger.latest_blockhash().await?;
        let transaction = Transaction::new_signed_with_payer(
            &[transfer],
            Some(&signer.pubkey()),
            &[signer.as_ref()],
            blockhash,
        );

        info!(
            "Executing delegated transfer of {} from {} to {}",
            amount, source, destination
        );

        let signature = self.ledger.submit_transaction(&transaction).await?;

        info!("Delegated transfer confirmed: {}", signature);
        Ok(signature)
    }
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| Error::Validation(format!("invalid {} {}: {}", what, value, e)))
}
