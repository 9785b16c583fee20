//! Share-string decoding.
//!
//! Shares travel in two wire forms. V1 is the raw JSON of the signer's
//! party-save record. V2 is `_V2_<shareID>_` followed by
//! base64(raw-DEFLATE(json)) where the DEFLATE stream was compressed
//! against [`SHARE_DICTIONARY`]. The dictionary is part of the wire format:
//! it must stay bit-for-bit identical to the sender's copy, and any future
//! change has to arrive as a new version prefix, never as an edit here.

use base64::Engine;
use flate2::{Decompress, FlushDecompress, Status};
use num_bigint::BigUint;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::curve::Curve;

/// Wire prefix of a compressed share string.
pub const V2_PREFIX: &str = "_V2_";

/// Preset DEFLATE dictionary for V2 shares: the JSON keys and constants of
/// the party-save record, most frequent material last. Frozen.
pub static SHARE_DICTIONARY: &[u8] = b"\"PaillierSK\":{\"N\":,\"LambdaN\":,\"PhiN\":},\
\"NTildej\":[],\"H1j\":[],\"H2j\":[],\"Ks\":[],\"BigXj\":[{\"Curve\":\"secp256k1\",\"Coords\":[,]}],\
\"EDDSAPub\":{\"Curve\":\"ed25519\",\"Coords\":[,]},\
\"ECDSAPub\":{\"Curve\":\"secp256k1\",\"Coords\":[,]},null,\
{\"ShareID\":,\"Xi\":";

/// Inflated V2 share payloads never legitimately get anywhere near this.
const MAX_INFLATED_LEN: usize = 4 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("malformed share: {0}")]
    Malformed(String),
    #[error("compressed share id {prefix} does not match embedded id {embedded}")]
    ShareIdMismatch { prefix: String, embedded: String },
}

/// An arbitrary-precision non-negative integer off the wire, held as
/// big-endian bytes in a wiping buffer. Share values are secret; ids and
/// coordinates merely reuse the type.
#[derive(Clone)]
pub struct ShareScalar(Zeroizing<Vec<u8>>);

impl PartialEq for ShareScalar {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for ShareScalar {}

impl ShareScalar {
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        // Normalize away leading zeros so equality matches numeric equality.
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        ShareScalar(Zeroizing::new(bytes[start..].to_vec()))
    }

    pub fn from_decimal(text: &str) -> Option<Self> {
        let n = BigUint::parse_bytes(text.trim().as_bytes(), 10)?;
        let mut bytes = n.to_bytes_be();
        if bytes == [0] {
            bytes.clear();
        }
        Some(ShareScalar(Zeroizing::new(bytes)))
    }

    pub fn as_be_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Decimal rendering; only used for ids and error text, never for the
    /// secret share value.
    pub fn to_decimal(&self) -> String {
        BigUint::from_bytes_be(&self.0).to_string()
    }
}

impl fmt::Debug for ShareScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareScalar(<{} bytes>)", self.0.len())
    }
}

impl Zeroize for ShareScalar {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<'de> Deserialize<'de> for ShareScalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let mut text = match &value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected decimal integer, got {other}"
                )))
            }
        };
        let parsed = ShareScalar::from_decimal(&text)
            .ok_or_else(|| serde::de::Error::custom("invalid decimal integer"));
        text.zeroize();
        parsed
    }
}

/// Affine public-key coordinates as stored inside a share record.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredPoint {
    #[serde(rename = "Curve")]
    pub curve: String,
    /// `[X, Y]`, big-endian decimal.
    #[serde(rename = "Coords")]
    pub coords: (ShareScalar, ShareScalar),
}

impl StoredPoint {
    /// Map the wire curve name onto the capability enum.
    pub fn curve(&self) -> Option<Curve> {
        match self.curve.to_ascii_lowercase().as_str() {
            "secp256k1" => Some(Curve::Secp256k1),
            "p-256" | "p256" | "nist p-256" => Some(Curve::NistP256),
            "ed25519" | "edwards25519" | "curve25519" => Some(Curve::Edwards25519),
            _ => None,
        }
    }
}

/// The subset of a signer's party-save record that reconstruction needs.
/// Everything else in the record (Paillier keys, commitments, peer data)
/// is ignored on parse.
#[derive(Debug, Deserialize, Zeroize, zeroize::ZeroizeOnDrop)]
pub struct LocalPartySave {
    /// Shamir x-coordinate of this share.
    #[serde(rename = "ShareID")]
    #[zeroize(skip)]
    pub share_id: ShareScalar,
    /// Shamir y-coordinate, the secret share value.
    #[serde(rename = "Xi")]
    pub xi: ShareScalar,
    /// Distributed ECDSA public key, when the vault has one.
    #[serde(rename = "ECDSAPub", default)]
    #[zeroize(skip)]
    pub ecdsa_pub: Option<StoredPoint>,
    /// Distributed EdDSA public key, when the vault has one.
    #[serde(rename = "EDDSAPub", default)]
    #[zeroize(skip)]
    pub eddsa_pub: Option<StoredPoint>,
}

impl LocalPartySave {
    pub fn stored_pub(&self, algorithm: crate::index::Algorithm) -> Option<&StoredPoint> {
        match algorithm {
            crate::index::Algorithm::Ecdsa => self.ecdsa_pub.as_ref(),
            crate::index::Algorithm::Eddsa => self.eddsa_pub.as_ref(),
        }
    }
}

/// Decode one share string, V1 or V2.
pub fn decode_share(raw: &str) -> Result<LocalPartySave, ShareError> {
    let raw = raw.trim();
    match raw.strip_prefix(V2_PREFIX) {
        Some(rest) => decode_v2(rest),
        None => serde_json::from_str(raw).map_err(|e| ShareError::Malformed(e.to_string())),
    }
}

fn decode_v2(rest: &str) -> Result<LocalPartySave, ShareError> {
    let (id_text, body) = rest
        .split_once('_')
        .ok_or_else(|| ShareError::Malformed("V2 share is missing the id separator".into()))?;
    let prefix_id = ShareScalar::from_decimal(id_text)
        .ok_or_else(|| ShareError::Malformed(format!("V2 share id {id_text:?} is not decimal")))?;

    let compressed = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| ShareError::Malformed(format!("V2 base64: {e}")))?;
    let json = inflate_with_dictionary(&compressed)?;
    let save: LocalPartySave =
        serde_json::from_slice(&json).map_err(|e| ShareError::Malformed(e.to_string()))?;

    if save.share_id != prefix_id {
        return Err(ShareError::ShareIdMismatch {
            prefix: prefix_id.to_decimal(),
            embedded: save.share_id.to_decimal(),
        });
    }
    Ok(save)
}

fn inflate_with_dictionary(input: &[u8]) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    let mut inflater = Decompress::new(false);
    inflater
        .set_dictionary(SHARE_DICTIONARY)
        .map_err(|e| ShareError::Malformed(format!("inflate dictionary: {e}")))?;

    let mut out = Zeroizing::new(Vec::with_capacity(input.len().max(64) * 4));
    loop {
        let consumed = inflater.total_in() as usize;
        let status = inflater
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| ShareError::Malformed(format!("inflate: {e}")))?;
        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                if out.len() < out.capacity() {
                    // No progress possible despite spare output room.
                    return Err(ShareError::Malformed("truncated V2 share stream".into()));
                }
                if out.len() >= MAX_INFLATED_LEN {
                    return Err(ShareError::Malformed("V2 share inflates too large".into()));
                }
                let additional = out.capacity();
                out.reserve(additional);
            }
        }
    }
}
