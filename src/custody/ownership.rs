//! Wallet ownership verification via signed challenges
//!
//! The challenge is stateless: everything needed to check it later is in the
//! message itself (owner id, issue time, random nonce). Embedding the owner
//! id means a signature captured for one account cannot be replayed to link
//! the same key to a different account.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use solana_sdk::signature::Signature;

use crate::error::{Error, Result};

/// Challenge message prefix, also serving as a format version marker
const CHALLENGE_PREFIX: &str = "wallet-ownership:v1";

/// Nonce length embedded in each challenge (bytes, pre-encoding)
const NONCE_LEN: usize = 16;

/// Parsed fields of a challenge message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeParts {
    pub owner_id: String,
    pub issued_at: DateTime<Utc>,
    pub nonce: String,
}

impl ChallengeParts {
    /// Check the challenge was issued within `max_age` of now
    pub fn issued_within(&self, max_age: chrono::Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.issued_at);
        age >= chrono::Duration::zero() && age <= max_age
    }
}

/// Issues signing challenges and verifies detached signatures
///
/// No server-side challenge storage; no private key material ever reaches
/// this component.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipVerifier;

impl OwnershipVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Create a self-describing challenge message for an owner
    pub fn create_challenge(&self, owner_id: &str) -> Result<String> {
        if owner_id.is_empty() {
            return Err(Error::Unauthorized(
                "challenge requires an authenticated owner id".to_string(),
            ));
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        Ok(format!(
            "{}:{}:{}:{}",
            CHALLENGE_PREFIX,
            owner_id,
            Utc::now().timestamp_millis(),
            bs58::encode(nonce).into_string()
        ))
    }

    /// Parse a challenge message back into its fields
    ///
    /// Owner ids may themselves contain ':'; the timestamp and nonce are
    /// recovered from the right.
    pub fn parse_challenge(&self, message: &str) -> Option<ChallengeParts> {
        let rest = message.strip_prefix(CHALLENGE_PREFIX)?.strip_prefix(':')?;

        let mut fields = rest.rsplitn(3, ':');
        let nonce = fields.next()?;
        let millis: i64 = fields.next()?.parse().ok()?;
        let owner_id = fields.next()?;

        if owner_id.is_empty() || nonce.is_empty() {
            return None;
        }

        let issued_at = Utc.timestamp_millis_opt(millis).single()?;

        Some(ChallengeParts {
            owner_id: owner_id.to_string(),
            issued_at,
            nonce: nonce.to_string(),
        })
    }

    /// Verify a detached signature over the exact message bytes
    ///
    /// Fail-closed: malformed encodings and verification failures all return
    /// `false`. This function never errors.
    pub fn verify(&self, message: &str, signature: &str, public_key: &str) -> bool {
        let Ok(signature_bytes) = bs58::decode(signature).into_vec() else {
            return false;
        };
        let Ok(pubkey_bytes) = bs58::decode(public_key).into_vec() else {
            return false;
        };
        if pubkey_bytes.len() != 32 {
            return false;
        }
        let Ok(signature) = Signature::try_from(signature_bytes.as_slice()) else {
            return false;
        };

        signature.verify(&pubkey_bytes, message.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;

    fn sign(keypair: &Keypair, message: &str) -> String {
        bs58::encode(keypair.sign_message(message.as_bytes())).into_string()
    }

    #[test]
    fn test_challenge_embeds_owner_and_timestamp() {
        let verifier = OwnershipVerifier::new();
        let challenge = verifier.create_challenge("u1").unwrap();

        let parts = verifier.parse_challenge(&challenge).unwrap();
        assert_eq!(parts.owner_id, "u1");
        assert!(parts.issued_within(chrono::Duration::minutes(5)));
    }

    #[test]
    fn test_challenges_are_unique() {
        let verifier = OwnershipVerifier::new();
        assert_ne!(
            verifier.create_challenge("u1").unwrap(),
            verifier.create_challenge("u1").unwrap()
        );
    }

    #[test]
    fn test_empty_owner_rejected() {
        let verifier = OwnershipVerifier::new();
        assert!(matches!(
            verifier.create_challenge(""),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_owner_id_with_colons_survives_parse() {
        let verifier = OwnershipVerifier::new();
        let challenge = verifier.create_challenge("org:team:alice").unwrap();
        let parts = verifier.parse_challenge(&challenge).unwrap();
        assert_eq!(parts.owner_id, "org:team:alice");
    }

    #[test]
    fn test_stale_challenge_fails_freshness() {
        let parts = ChallengeParts {
            owner_id: "u1".into(),
            issued_at: Utc::now() - chrono::Duration::hours(2),
            nonce: "n".into(),
        };
        assert!(!parts.issued_within(chrono::Duration::minutes(5)));
    }

    #[test]
    fn test_valid_signature_verifies() {
        let verifier = OwnershipVerifier::new();
        let keypair = Keypair::new();
        let challenge = verifier.create_challenge("u1").unwrap();
        let signature = sign(&keypair, &challenge);

        assert!(verifier.verify(&challenge, &signature, &keypair.pubkey().to_string()));
    }

    #[test]
    fn test_modified_message_fails() {
        let verifier = OwnershipVerifier::new();
        let keypair = Keypair::new();
        let challenge = verifier.create_challenge("u1").unwrap();
        let signature = sign(&keypair, &challenge);

        let mut tampered = challenge.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(!verifier.verify(&tampered, &signature, &keypair.pubkey().to_string()));
    }

    #[test]
    fn test_modified_signature_fails() {
        let verifier = OwnershipVerifier::new();
        let keypair = Keypair::new();
        let challenge = verifier.create_challenge("u1").unwrap();

        let mut sig_bytes = bs58::decode(sign(&keypair, &challenge)).into_vec().unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered = bs58::encode(sig_bytes).into_string();

        assert!(!verifier.verify(&challenge, &tampered, &keypair.pubkey().to_string()));
    }

    #[test]
    fn test_wrong_public_key_fails() {
        let verifier = OwnershipVerifier::new();
        let keypair = Keypair::new();
        let other = Keypair::new();
        let challenge = verifier.create_challenge("u1").unwrap();
        let signature = sign(&keypair, &challenge);

        assert!(!verifier.verify(&challenge, &signature, &other.pubkey().to_string()));
    }

    #[test]
    fn test_malformed_inputs_fail_closed() {
        let verifier = OwnershipVerifier::new();
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey().to_string();
        let challenge = verifier.create_challenge("u1").unwrap();
        let signature = sign(&keypair, &challenge);

        // Garbage encodings return false, never panic or error
        assert!(!verifier.verify(&challenge, "%%%", &pubkey));
        assert!(!verifier.verify(&challenge, &signature, "%%%"));
        assert!(!verifier.verify(&challenge, "", &pubkey));
        assert!(!verifier.verify(&challenge, &signature, "abc"));
    }

    #[test]
    fn test_parse_rejects_foreign_messages() {
        let verifier = OwnershipVerifier::new();
        assert!(verifier.parse_challenge("something-else:u1:0:n").is_none());
        assert!(verifier.parse_challenge("wallet-ownership:v1:u1:nan:n").is_none());
        assert!(verifier.parse_challenge("").is_none());
    }
}
