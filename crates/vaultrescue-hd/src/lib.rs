//! VaultRescue HD
//!
//! Non-hardened BIP32-style child derivation from a recovered master
//! scalar, against a caller-supplied list of known extended public keys.
//!
//! The vault's signing cohort only ever derived non-hardened children
//! (hardened steps need the seed, which never existed as one piece), so
//! this crate refuses hardened path segments outright. Derivation runs on
//! secp256k1, NIST P-256, and Edwards25519 through the capability in
//! [`vaultrescue_core::curve`].

pub mod derive;
pub mod path;
pub mod records;
pub mod xpub;

use thiserror::Error;
use vaultrescue_core::curve::Curve;

pub use derive::{derive_child_keys, ChildKey, DeriveOptions, MasterKeys, ZeroChildPolicy};
pub use records::{derive_records, read_records, write_records, DerivationRecord, DerivedRecord};
pub use xpub::ParsedXpub;

#[derive(Error, Debug)]
pub enum HdError {
    #[error("invalid extended public key: {0}")]
    InvalidXpub(String),
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
    #[error("hardened derivation is not supported: {0}")]
    HardenedNotSupported(String),
    #[error("algorithm {algorithm:?} cannot be used with curve {curve:?}")]
    InvalidAlgorithmCurve { algorithm: String, curve: String },
    #[error("no {0} master key was recovered, cannot derive this record")]
    MissingMasterKey(&'static str),
    #[error("master key is not a valid scalar on {0}")]
    InvalidMasterKey(Curve),
    #[error("derivation produced the zero scalar at child index {0}")]
    InvalidChild(u32),
    #[error("record {row} ({address}): {source}")]
    Record {
        row: usize,
        address: String,
        #[source]
        source: Box<HdError>,
    },
    #[error("derivation records: {0}")]
    Csv(String),
}
