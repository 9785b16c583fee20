//! Mnemonic-derived backup encryption keys.
//!
//! Each signer backup is encrypted under the 32-byte entropy behind that
//! signer's 24-word BIP-39 recovery phrase: the entropy the phrase encodes,
//! not the PBKDF2 seed derived from it.

use bip39::{Language, Mnemonic};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Backups are always sealed with a full 24-word phrase (256-bit entropy).
pub const PHRASE_WORDS: usize = 24;

/// AES-256 key length, equal to the entropy behind a 24-word phrase.
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum MnemonicError {
    #[error("recovery phrase must be {PHRASE_WORDS} words, got {0}")]
    WrongWordCount(usize),
    #[error("invalid recovery phrase: {0}")]
    InvalidPhrase(String),
}

/// Turn a 24-word recovery phrase into the AES-256 key that seals the
/// signer's backup file.
///
/// Fails on wrong word count, unknown words, or a checksum mismatch. The
/// phrase and every intermediate buffer are wiped before returning.
pub fn phrase_to_key(phrase: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, MnemonicError> {
    let word_count = phrase.split_whitespace().count();
    if word_count != PHRASE_WORDS {
        return Err(MnemonicError::WrongWordCount(word_count));
    }

    let mut mnemonic = Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| MnemonicError::InvalidPhrase(e.to_string()))?;
    let (mut entropy, len) = mnemonic.to_entropy_array();
    mnemonic.zeroize();

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    if len != KEY_LEN {
        entropy.zeroize();
        return Err(MnemonicError::WrongWordCount(word_count));
    }
    key.copy_from_slice(&entropy[..KEY_LEN]);
    entropy.zeroize();
    Ok(key)
}
