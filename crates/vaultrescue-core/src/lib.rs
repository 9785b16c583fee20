//! VaultRescue Core
//!
//! Reconstructs the private key(s) of a distributed-signing vault from a
//! quorum of encrypted signer backups.
//!
//! # Pipeline
//!
//! 1. Each backup file is unlocked with its signer's 24-word recovery
//!    phrase ([`mnemonic`]) and AES-256-GCM decrypted ([`envelope`]).
//! 2. Share strings are decoded from their V1/V2 wire forms ([`share`])
//!    and aggregated per vault, curve, and reshare nonce ([`index`]).
//! 3. A quorum of shares is interpolated back into the secret scalar
//!    ([`vss`]) and checked against the distributed public key the shares
//!    carry ([`recover`]).
//!
//! All secret material is wiped on drop; nothing here performs I/O.

pub mod curve;
pub mod envelope;
pub mod index;
pub mod mnemonic;
pub mod recover;
pub mod share;
pub mod vss;

pub use index::{Algorithm, BackupInput, VaultSummary};
pub use recover::{
    list_vaults, recover_vault, RecoverError, RecoverOptions, RecoveredVaultKey, VaultListing,
};
