//! Extended-public-key parsing.
//!
//! An xpub is the base58check encoding of the 78-byte BIP-32 payload:
//! `version[4] | depth[1] | fingerprint[4] | childNumber[4] | chainCode[32]
//! | pubKey[33]`. Only the chain code and public key feed derivation; the
//! header fields are kept for diagnostics.
//!
//! EdDSA cohorts reuse the container with `0x00 || ed25519-key` in the
//! pubKey slot; the pad byte is stripped here so downstream code always
//! sees the curve's native encoding.

use vaultrescue_core::curve::Curve;

use crate::HdError;

/// Decoded payload length (without the 4-byte checksum).
pub const XPUB_PAYLOAD_LEN: usize = 78;

#[derive(Debug, Clone)]
pub struct ParsedXpub {
    pub version: [u8; 4],
    pub depth: u8,
    pub parent_fingerprint: [u8; 4],
    pub child_number: u32,
    pub chain_code: [u8; 32],
    /// 33 bytes SEC1 compressed on the Weierstrass curves, 32 bytes on
    /// Edwards25519.
    pub pub_key: Vec<u8>,
}

/// Base58check-decode an xpub and pull the fields apart.
pub fn parse_xpub(raw: &str, curve: Curve) -> Result<ParsedXpub, HdError> {
    let payload = bs58::decode(raw.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| HdError::InvalidXpub(e.to_string()))?;
    if payload.len() != XPUB_PAYLOAD_LEN {
        return Err(HdError::InvalidXpub(format!(
            "payload must be {XPUB_PAYLOAD_LEN} bytes, got {}",
            payload.len()
        )));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&payload[0..4]);
    let depth = payload[4];
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(&payload[5..9]);
    let child_number = u32::from_be_bytes([payload[9], payload[10], payload[11], payload[12]]);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&payload[13..45]);
    let key_field = &payload[45..78];

    let pub_key = match curve {
        Curve::Secp256k1 | Curve::NistP256 => {
            if key_field[0] != 0x02 && key_field[0] != 0x03 {
                return Err(HdError::InvalidXpub(format!(
                    "public key prefix {:#04x} is not a compressed point",
                    key_field[0]
                )));
            }
            key_field.to_vec()
        }
        Curve::Edwards25519 => {
            if key_field[0] != 0x00 {
                return Err(HdError::InvalidXpub(format!(
                    "EdDSA public key must be zero-padded, found prefix {:#04x}",
                    key_field[0]
                )));
            }
            key_field[1..].to_vec()
        }
    };

    Ok(ParsedXpub {
        version,
        depth,
        parent_fingerprint,
        child_number,
        chain_code,
        pub_key,
    })
}
