//! Vault key recovery orchestration.
//!
//! Drives the pipeline for one invocation: decrypt and index every supplied
//! backup, pick the requested vault, reconstruct per curve, verify the
//! result against the public key the shares carry, and hand back wiped-on-
//! drop key material. Listing mode stops after indexing.

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::curve::{compressed_from_affine, CurveError};
use crate::index::{self, Algorithm, BackupInput, IndexError, VaultSummary};
use crate::vss::{self, VssError};

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("vault {0:?} not found in the supplied backups")]
    NoSuchVault(String),
    #[error("vault {vault_id}: {algorithm}: {source}")]
    Vss {
        vault_id: String,
        algorithm: Algorithm,
        #[source]
        source: VssError,
    },
    #[error("vault {vault_id}: {algorithm} shares carry no distributed public key to verify against")]
    MissingStoredPublicKey {
        vault_id: String,
        algorithm: Algorithm,
    },
    #[error("vault {vault_id}: {algorithm} stored public key is unusable: {source}")]
    BadStoredPublicKey {
        vault_id: String,
        algorithm: Algorithm,
        #[source]
        source: CurveError,
    },
    #[error(
        "vault {vault_id}: reconstructed {algorithm} key does not match the stored public key; \
         the share subset, reshare nonce, or threshold override is likely wrong"
    )]
    VerificationFailed {
        vault_id: String,
        algorithm: Algorithm,
    },
}

/// Per-invocation knobs. The defaults recover the newest cohort with the
/// vault's own threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverOptions {
    /// Restrict indexing to one reshare nonce instead of the highest seen.
    pub nonce_override: Option<u64>,
    /// Reconstruct with this many shares instead of the vault's recorded
    /// threshold.
    pub threshold_override: Option<usize>,
}

/// Listing-mode result.
#[derive(Debug)]
pub struct VaultListing {
    pub vaults: Vec<VaultSummary>,
    pub warnings: Vec<String>,
}

/// The recovered key material for one vault. Secret scalars wipe themselves
/// when this is dropped.
pub struct RecoveredVaultKey {
    pub vault_id: String,
    pub name: String,
    pub nonce: u64,
    pub threshold: usize,
    pub ecdsa_sk: Option<Zeroizing<[u8; 32]>>,
    pub eddsa_sk: Option<Zeroizing<[u8; 32]>>,
    /// 33-byte SEC1 compressed.
    pub ecdsa_pub: Option<Vec<u8>>,
    /// 32-byte canonical Ed25519 encoding.
    pub eddsa_pub: Option<Vec<u8>>,
    pub warnings: Vec<String>,
}

impl Zeroize for RecoveredVaultKey {
    fn zeroize(&mut self) {
        self.ecdsa_sk.zeroize();
        self.eddsa_sk.zeroize();
    }
}

impl std::fmt::Debug for RecoveredVaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveredVaultKey")
            .field("vault_id", &self.vault_id)
            .field("nonce", &self.nonce)
            .field("threshold", &self.threshold)
            .field("ecdsa", &self.ecdsa_sk.is_some())
            .field("eddsa", &self.eddsa_sk.is_some())
            .finish()
    }
}

/// Decrypt everything and report which vaults the backups describe.
pub fn list_vaults(inputs: &[BackupInput]) -> Result<VaultListing, RecoverError> {
    let index = index::build_index(inputs, None)?;
    Ok(VaultListing {
        vaults: index.summaries(),
        warnings: index.warnings,
    })
}

/// Reconstruct the private key(s) of one vault from a quorum of backups.
pub fn recover_vault(
    inputs: &[BackupInput],
    vault_id: &str,
    opts: &RecoverOptions,
) -> Result<RecoveredVaultKey, RecoverError> {
    let index = index::build_index(inputs, opts.nonce_override)?;
    let vault = index
        .vault(vault_id)
        .ok_or_else(|| RecoverError::NoSuchVault(vault_id.to_string()))?;
    let threshold = opts.threshold_override.unwrap_or(vault.threshold);

    let mut result = RecoveredVaultKey {
        vault_id: vault.vault_id.clone(),
        name: vault.name.clone(),
        nonce: vault.nonce,
        threshold,
        ecdsa_sk: None,
        eddsa_sk: None,
        ecdsa_pub: None,
        eddsa_pub: None,
        warnings: index.warnings.clone(),
    };

    for (&algorithm, shares) in &vault.shares {
        let curve = algorithm.tss_curve();
        let secret =
            vss::reconstruct_secret(curve, threshold, shares).map_err(|source| RecoverError::Vss {
                vault_id: vault.vault_id.clone(),
                algorithm,
                source,
            })?;

        // The interpolation yields *a* scalar for any subset; only agreement
        // with the distributed public key proves it is the vault secret.
        let stored = shares[0].stored_pub(algorithm).ok_or_else(|| {
            RecoverError::MissingStoredPublicKey {
                vault_id: vault.vault_id.clone(),
                algorithm,
            }
        })?;
        let expected = compressed_from_affine(
            curve,
            stored.coords.0.as_be_bytes(),
            stored.coords.1.as_be_bytes(),
        )
        .map_err(|source| RecoverError::BadStoredPublicKey {
            vault_id: vault.vault_id.clone(),
            algorithm,
            source,
        })?;
        let scalar = curve.scalar_from_be(secret.as_slice()).map_err(|source| {
            RecoverError::BadStoredPublicKey {
                vault_id: vault.vault_id.clone(),
                algorithm,
                source,
            }
        })?;
        let actual = scalar.mul_base();
        if actual != expected {
            return Err(RecoverError::VerificationFailed {
                vault_id: vault.vault_id.clone(),
                algorithm,
            });
        }
        log::info!(
            "vault {}: {algorithm} key reconstructed and verified at nonce {}",
            vault.vault_id,
            vault.nonce
        );

        match algorithm {
            Algorithm::Ecdsa => {
                result.ecdsa_sk = Some(secret);
                result.ecdsa_pub = Some(actual);
            }
            Algorithm::Eddsa => {
                result.eddsa_sk = Some(secret);
                result.eddsa_pub = Some(actual);
            }
        }
    }

    Ok(result)
}
