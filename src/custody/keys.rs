//! Keypair generation and private key encryption
//!
//! Private key material is encrypted with AES-256-GCM under a key derived
//! from the master secret and the owning account id. The GCM tag is kept as
//! its own field so tampering with any of ciphertext, IV, or tag is
//! detectable at decrypt time.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use crate::error::{Error, Result};

/// AES-GCM initialization vector length (bytes)
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length (bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Length of exported private key material (full 64-byte Ed25519 keypair)
pub const PRIVATE_KEY_LEN: usize = 64;

/// Encrypted private key material as three explicit fields.
///
/// Stored and passed as-is; never re-serialized into a combined blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyMaterial {
    /// Base64 ciphertext (tag stripped)
    pub ciphertext: String,

    /// Base64 12-byte initialization vector, fresh per encryption
    pub iv: String,

    /// Base64 16-byte GCM authentication tag
    pub auth_tag: String,
}

/// One-time output of wallet creation
#[derive(Debug, Clone)]
pub struct GeneratedKeypair {
    /// Base58 public key
    pub public_key: String,

    /// Base58 private key material; shown to the end user exactly once
    pub private_key: String,
}

/// Generates keypairs and encrypts/decrypts private key material
pub struct KeyCustodyManager {
    master_secret: String,
}

impl KeyCustodyManager {
    /// Create a custody manager from the master encryption secret
    ///
    /// Refuses an empty secret: custody must not start unconfigured.
    pub fn new(master_secret: impl Into<String>) -> Result<Self> {
        let master_secret = master_secret.into();
        if master_secret.is_empty() {
            return Err(Error::Config(
                "master encryption secret is required for custody operations".to_string(),
            ));
        }
        Ok(Self { master_secret })
    }

    /// Generate a fresh Ed25519 keypair
    pub fn generate(&self) -> GeneratedKeypair {
        let keypair = Keypair::new();
        GeneratedKeypair {
            public_key: keypair.pubkey().to_string(),
            private_key: bs58::encode(keypair.to_bytes()).into_string(),
        }
    }

    /// Encrypt private key material for an owner
    ///
    /// Same owner always derives the same key; the IV is fresh per call.
    pub fn encrypt(&self, private_key: &str, owner_id: &str) -> Result<EncryptedKeyMaterial> {
        let cipher = self.cipher_for(owner_id)?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&iv), private_key.as_bytes())
            .map_err(|_| Error::Internal("private key encryption failed".to_string()))?;

        // AES-GCM appends the tag; keep it as a separate field
        let auth_tag = sealed.split_off(sealed.len() - AUTH_TAG_LEN);

        Ok(EncryptedKeyMaterial {
            ciphertext: BASE64.encode(&sealed),
            iv: BASE64.encode(iv),
            auth_tag: BASE64.encode(&auth_tag),
        })
    }

    /// Decrypt private key material for an owner
    ///
    /// Fails with [`Error::Integrity`] when the tag does not verify: tampered
    /// ciphertext, tampered IV or tag, or a different owner's derivation.
    pub fn decrypt(&self, material: &EncryptedKeyMaterial, owner_id: &str) -> Result<String> {
        let cipher = self.cipher_for(owner_id)?;

        let mut sealed = decode_field(&material.ciphertext, "ciphertext")?;
        let iv = decode_field(&material.iv, "iv")?;
        let auth_tag = decode_field(&material.auth_tag, "auth_tag")?;

        if iv.len() != IV_LEN || auth_tag.len() != AUTH_TAG_LEN {
            return Err(Error::Integrity(
                "encrypted key material has malformed IV or tag".to_string(),
            ));
        }

        sealed.extend_from_slice(&auth_tag);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
            .map_err(|_| {
                Error::Integrity(
                    "authentication tag mismatch (tampered data or wrong owner)".to_string(),
                )
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Integrity("decrypted key material is not valid UTF-8".to_string()))
    }

    /// Derive the owner-scoped symmetric key: SHA-256(master_secret || owner_id)
    fn derive_key(&self, owner_id: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.master_secret.as_bytes());
        hasher.update(owner_id.as_bytes());
        hasher.finalize().into()
    }

    fn cipher_for(&self, owner_id: &str) -> Result<Aes256Gcm> {
        let key = self.derive_key(owner_id);
        Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::Internal(format!("cipher init failed: {}", e)))
    }
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|_| Error::Integrity(format!("encrypted key field '{}' is not valid base64", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> KeyCustodyManager {
        KeyCustodyManager::new("test-master-secret-0123456789").unwrap()
    }

    /// Flip one byte of a base64 field and re-encode
    fn corrupt(field: &str) -> String {
        let mut bytes = BASE64.decode(field).unwrap();
        bytes[0] ^= 0x01;
        BASE64.encode(bytes)
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            KeyCustodyManager::new(""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_generate_well_formed() {
        let generated = manager().generate();

        let pubkey_bytes = bs58::decode(&generated.public_key).into_vec().unwrap();
        assert_eq!(pubkey_bytes.len(), 32);

        let secret_bytes = bs58::decode(&generated.private_key).into_vec().unwrap();
        assert_eq!(secret_bytes.len(), PRIVATE_KEY_LEN);

        // Private key material reconstructs the advertised public key
        let keypair = Keypair::from_bytes(&secret_bytes).unwrap();
        assert_eq!(keypair.pubkey().to_string(), generated.public_key);
    }

    #[test]
    fn test_generate_unique() {
        let custody = manager();
        assert_ne!(custody.generate().public_key, custody.generate().public_key);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let custody = manager();
        let generated = custody.generate();

        let material = custody.encrypt(&generated.private_key, "u1").unwrap();
        let decrypted = custody.decrypt(&material, "u1").unwrap();

        assert_eq!(decrypted, generated.private_key);
    }

    #[test]
    fn test_encrypted_fields_differ_from_plaintext() {
        let custody = manager();
        let generated = custody.generate();

        let material = custody.encrypt(&generated.private_key, "u1").unwrap();

        assert_ne!(material.ciphertext, generated.private_key);
        assert_ne!(material.iv, generated.private_key);
        assert_ne!(material.auth_tag, generated.private_key);
        assert_ne!(material.ciphertext, material.auth_tag);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let custody = manager();
        let generated = custody.generate();

        let first = custody.encrypt(&generated.private_key, "u1").unwrap();
        let second = custody.encrypt(&generated.private_key, "u1").unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);

        // Both still decrypt: same owner derives the same key
        assert_eq!(
            custody.decrypt(&first, "u1").unwrap(),
            custody.decrypt(&second, "u1").unwrap()
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let custody = manager();
        let mut material = custody.encrypt("secret-material", "u1").unwrap();
        material.ciphertext = corrupt(&material.ciphertext);

        assert!(matches!(
            custody.decrypt(&material, "u1"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_tampered_iv_fails() {
        let custody = manager();
        let mut material = custody.encrypt("secret-material", "u1").unwrap();
        material.iv = corrupt(&material.iv);

        assert!(matches!(
            custody.decrypt(&material, "u1"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_tampered_auth_tag_fails() {
        let custody = manager();
        let mut material = custody.encrypt("secret-material", "u1").unwrap();
        material.auth_tag = corrupt(&material.auth_tag);

        assert!(matches!(
            custody.decrypt(&material, "u1"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_no_cross_owner_decryption() {
        let custody = manager();
        let material = custody.encrypt("secret-material", "owner-a").unwrap();

        assert!(matches!(
            custody.decrypt(&material, "owner-b"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_malformed_base64_is_integrity_error() {
        let custody = manager();
        let mut material = custody.encrypt("secret-material", "u1").unwrap();
        material.ciphertext = "!!not base64!!".to_string();

        assert!(matches!(
            custody.decrypt(&material, "u1"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn test_material_serde_roundtrip() {
        let custody = manager();
        let material = custody.encrypt("secret-material", "u1").unwrap();

        let json = serde_json::to_string(&material).unwrap();
        let restored: EncryptedKeyMaterial = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, material);
        assert_eq!(custody.decrypt(&restored, "u1").unwrap(), "secret-material");
    }
}
