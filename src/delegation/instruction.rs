//! Instruction and transaction building for token delegation
//!
//! Thin wrappers over the SPL token instruction set plus the unsigned-
//! transaction wire encoding handed to clients for signing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

use crate::error::{Error, Result};

/// Approve `delegate` to move up to `amount` out of `token_account`
///
/// The wallet owner signs this; the platform never holds the owner key.
pub fn approve_delegate(
    token_account: &Pubkey,
    delegate: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    spl_token::instruction::approve(&spl_token::ID, token_account, delegate, owner, &[], amount)
        .map_err(|e| Error::Validation(format!("approve instruction build failed: {}", e)))
}

/// Move `amount` out of `source` under previously approved delegate authority
#[allow(deprecated)]
pub fn delegated_transfer(
    source: &Pubkey,
    destination: &Pubkey,
    delegate: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    spl_token::instruction::transfer(&spl_token::ID, source, destination, delegate, &[], amount)
        .map_err(|e| Error::Validation(format!("transfer instruction build failed: {}", e)))
}

/// Build an unsigned transaction bound to `blockhash`, fee payer `payer`
pub fn unsigned_with_payer(
    instructions: &[Instruction],
    payer: &Pubkey,
    blockhash: Hash,
) -> Transaction {
    Transaction::new_unsigned(Message::new_with_blockhash(
        instructions,
        Some(payer),
        &blockhash,
    ))
}

/// Encode an unsigned transaction for client-side signing
pub fn encode_unsigned(transaction: &Transaction) -> Result<String> {
    let bytes = bincode::serialize(transaction)
        .map_err(|e| Error::Serialization(format!("transaction encode failed: {}", e)))?;
    Ok(BASE64.encode(bytes))
}

/// Decode a transaction previously produced by [`encode_unsigned`]
pub fn decode_unsigned(encoded: &str) -> Result<Transaction> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::Serialization(format!("transaction decode failed: {}", e)))?;
    bincode::deserialize(&bytes)
        .map_err(|e| Error::Serialization(format!("transaction decode failed: {}", e)))
}

/// Derive the associated token account holding `mint` for `wallet`
pub fn associated_token_account(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_targets_token_program() {
        let token_account = Pubkey::new_unique();
        let delegate = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix = approve_delegate(&token_account, &delegate, &owner, 1_000).unwrap();

        assert_eq!(ix.program_id, spl_token::ID);
        // Owner must sign the approval
        assert!(ix
            .accounts
            .iter()
            .any(|meta| meta.pubkey == owner && meta.is_signer));
        assert!(ix
            .accounts
            .iter()
            .any(|meta| meta.pubkey == token_account && meta.is_writable));
    }

    #[test]
    fn test_delegated_transfer_signed_by_delegate() {
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let delegate = Pubkey::new_unique();

        let ix = delegated_transfer(&source, &destination, &delegate, 500).unwrap();

        assert_eq!(ix.program_id, spl_token::ID);
        assert!(ix
            .accounts
            .iter()
            .any(|meta| meta.pubkey == delegate && meta.is_signer));
    }

    #[test]
    fn test_unsigned_transaction_fee_payer() {
        let owner = Pubkey::new_unique();
        let ix = approve_delegate(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &owner,
            1_000,
        )
        .unwrap();

        let tx = unsigned_with_payer(&[ix], &owner, Hash::new_unique());

        assert_eq!(tx.message.account_keys[0], owner);
        // Unsigned: signature slots present but zeroed
        assert!(tx
            .signatures
            .iter()
            .all(|s| *s == solana_sdk::signature::Signature::default()));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let owner = Pubkey::new_unique();
        let ix = approve_delegate(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &owner,
            1_000,
        )
        .unwrap();
        let tx = unsigned_with_payer(&[ix], &owner, Hash::new_unique());

        let encoded = encode_unsigned(&tx).unwrap();
        let decoded = decode_unsigned(&encoded).unwrap();

        assert_eq!(decoded.message, tx.message);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_unsigned("!!!").is_err());
        assert!(decode_unsigned(&BASE64.encode([0u8; 4])).is_err());
    }

    #[test]
    fn test_ata_derivation_is_deterministic() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_eq!(
            associated_token_account(&wallet, &mint),
            associated_token_account(&wallet, &mint)
        );
    }
}
