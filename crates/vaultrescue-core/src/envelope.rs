//! Encrypted backup envelopes.
//!
//! A signer backup file is a JSON map of vault id → reshare nonce →
//! ciphered vault. Payloads are AES-256-GCM under the signer's mnemonic
//! entropy, with a SHA-512 digest of the plaintext stored alongside the
//! ciphertext as a second integrity gate.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// AES-GCM nonce length used by the backup format.
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

const CIPHER_NAME: &str = "aes-256-gcm";

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("malformed backup file: {0}")]
    Malformed(String),
    #[error("unsupported cipher {0:?}, expected {CIPHER_NAME:?}")]
    UnsupportedCipher(String),
    #[error("decryption failed (wrong recovery phrase for this file?)")]
    DecryptionFailed,
    #[error("plaintext SHA-512 does not match the stored digest")]
    IntegrityMismatch,
    #[error("malformed vault payload: {0}")]
    MalformedVault(String),
}

/// Top level of a signer backup file.
#[derive(Debug, Deserialize)]
pub struct BackupFile {
    /// vault id → reshare nonce (decimal string) → ciphered vault.
    pub vaults: BTreeMap<String, BTreeMap<String, CipheredVault>>,
}

/// One encrypted vault payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CipheredVault {
    /// Base64 AES-256-GCM ciphertext (tag stored separately).
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    /// Cipher name; only `aes-256-gcm` is ever produced.
    pub cipher: String,
    /// Lowercase-hex SHA-512 of the plaintext.
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CipherParams {
    /// Hex, 12 bytes.
    pub iv: String,
    /// Hex, 16 bytes.
    pub tag: String,
}

/// Decrypted vault payload. No `Debug`: the share strings are key material.
#[derive(Deserialize, Zeroize, zeroize::ZeroizeOnDrop)]
pub struct ClearVault {
    #[zeroize(skip)]
    #[serde(default)]
    pub name: String,
    #[zeroize(skip)]
    pub threshold: usize,
    /// Legacy single-curve form: raw ECDSA share strings.
    #[serde(default)]
    pub shares: Option<Vec<String>>,
    /// Current multi-curve form.
    #[serde(default)]
    pub curves: Option<Vec<CurveShares>>,
}

#[derive(Deserialize, Zeroize, zeroize::ZeroizeOnDrop)]
pub struct CurveShares {
    #[zeroize(skip)]
    pub algorithm: String,
    pub shares: Vec<String>,
}

/// Parse the outer JSON of a backup file.
pub fn parse_backup(bytes: &[u8]) -> Result<BackupFile, EnvelopeError> {
    serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))
}

/// Reshare nonces travel as JSON object keys, so they arrive as strings.
pub fn parse_nonce(raw: &str) -> Result<u64, EnvelopeError> {
    raw.parse::<u64>().map_err(|_| {
        EnvelopeError::Malformed(format!("reshare nonce {raw:?} is not a non-negative integer"))
    })
}

/// Decrypt one vault payload and verify its SHA-512 digest.
///
/// Tag-check failure means the key (and therefore the phrase) does not match
/// this file; a digest mismatch after successful decryption means the
/// envelope itself is corrupt.
pub fn decrypt_vault(key: &[u8; 32], vault: &CipheredVault) -> Result<ClearVault, EnvelopeError> {
    if !vault.cipher.eq_ignore_ascii_case(CIPHER_NAME) {
        return Err(EnvelopeError::UnsupportedCipher(vault.cipher.clone()));
    }

    let iv = decode_hex_param("cipherparams.iv", &vault.cipherparams.iv, IV_LEN)?;
    let tag = decode_hex_param("cipherparams.tag", &vault.cipherparams.tag, TAG_LEN)?;
    let expected_hash = hex::decode(vault.hash.trim())
        .map_err(|e| EnvelopeError::Malformed(format!("hash: {e}")))?;
    if expected_hash.len() != Sha512::output_size() {
        return Err(EnvelopeError::Malformed(format!(
            "hash must be {} hex bytes, got {}",
            Sha512::output_size(),
            expected_hash.len()
        )));
    }

    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(vault.ciphertext.trim())
        .map_err(|e| EnvelopeError::Malformed(format!("ciphertext: {e}")))?;

    // The AEAD API expects the tag appended to the ciphertext.
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&ciphertext);
    combined.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), combined.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| EnvelopeError::DecryptionFailed)?;

    if Sha512::digest(plaintext.as_slice()).as_slice() != expected_hash.as_slice() {
        return Err(EnvelopeError::IntegrityMismatch);
    }

    serde_json::from_slice(&plaintext).map_err(|e| EnvelopeError::MalformedVault(e.to_string()))
}

fn decode_hex_param(field: &str, raw: &str, want: usize) -> Result<Vec<u8>, EnvelopeError> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| EnvelopeError::Malformed(format!("{field}: {e}")))?;
    if bytes.len() != want {
        return Err(EnvelopeError::Malformed(format!(
            "{field} must be {want} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::test_support::encrypt_vault;
    use super::*;

    const KEY: [u8; 32] = [0x11; 32];
    const IV: [u8; IV_LEN] = [0x22; IV_LEN];

    fn sample_clear_json() -> Vec<u8> {
        serde_json::json!({
            "name": "treasury",
            "threshold": 2,
            "curves": [
                {"algorithm": "ECDSA", "shares": ["{}", "{}"]},
                {"algorithm": "EDDSA", "shares": ["{}"]}
            ]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_decrypt_roundtrip() {
        let vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        let clear = decrypt_vault(&KEY, &vault).unwrap();
        assert_eq!(clear.name, "treasury");
        assert_eq!(clear.threshold, 2);
        let curves = clear.curves.as_ref().unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].algorithm, "ECDSA");
        assert_eq!(curves[0].shares.len(), 2);
    }

    #[test]
    fn test_wrong_key_is_decryption_failure() {
        let vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        let wrong = [0x12; 32];
        assert!(matches!(
            decrypt_vault(&wrong, &vault),
            Err(EnvelopeError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_tag_is_decryption_failure() {
        let mut vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        let mut tag = hex::decode(&vault.cipherparams.tag).unwrap();
        tag[0] ^= 0xff;
        vault.cipherparams.tag = hex::encode(tag);
        assert!(matches!(
            decrypt_vault(&KEY, &vault),
            Err(EnvelopeError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_stored_hash_mismatch_is_integrity_failure() {
        let mut vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        vault.hash = hex::encode([0u8; 64]);
        assert!(matches!(
            decrypt_vault(&KEY, &vault),
            Err(EnvelopeError::IntegrityMismatch)
        ));
    }

    #[test]
    fn test_unsupported_cipher_rejected() {
        let mut vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        vault.cipher = "aes-128-cbc".to_string();
        assert!(matches!(
            decrypt_vault(&KEY, &vault),
            Err(EnvelopeError::UnsupportedCipher(_))
        ));
    }

    #[test]
    fn test_short_iv_rejected() {
        let mut vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        vault.cipherparams.iv = "22".repeat(IV_LEN - 1);
        assert!(matches!(
            decrypt_vault(&KEY, &vault),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn test_legacy_share_array_parses() {
        let legacy = serde_json::json!({
            "name": "old-vault",
            "threshold": 2,
            "shares": ["{\"a\":1}", "{\"b\":2}"]
        })
        .to_string()
        .into_bytes();
        let vault = encrypt_vault(&KEY, &IV, &legacy);
        let clear = decrypt_vault(&KEY, &vault).unwrap();
        assert_eq!(clear.shares.as_ref().unwrap().len(), 2);
        assert!(clear.curves.is_none());
    }

    #[test]
    fn test_parse_backup_shape() {
        let vault = encrypt_vault(&KEY, &IV, &sample_clear_json());
        let file = serde_json::json!({
            "vaults": {"v1": {"0": {
                "ciphertext": vault.ciphertext,
                "cipherparams": {"iv": vault.cipherparams.iv, "tag": vault.cipherparams.tag},
                "cipher": vault.cipher,
                "hash": vault.hash,
            }}}
        });
        let parsed = parse_backup(file.to_string().as_bytes()).unwrap();
        assert_eq!(parsed.vaults.len(), 1);
        assert!(parsed.vaults["v1"].contains_key("0"));
    }

    #[test]
    fn test_parse_backup_rejects_wrong_shape() {
        assert!(matches!(
            parse_backup(br#"{"not_vaults": []}"#),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(parse_nonce("3").unwrap() == 3);
        assert!(parse_nonce("-1").is_err());
        assert!(parse_nonce("abc").is_err());
    }
}
