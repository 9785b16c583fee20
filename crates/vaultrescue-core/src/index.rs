//! Cross-file vault indexing.
//!
//! Each signer backup holds that signer's shares for every vault they are a
//! member of, keyed by reshare nonce. Reconstruction needs a quorum of
//! shares for one vault at one nonce, so the index decrypts every supplied
//! file, settles on a nonce per vault (the highest seen, unless overridden),
//! and aggregates the decoded shares per curve.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use zeroize::Zeroizing;

use crate::envelope::{self, EnvelopeError};
use crate::mnemonic::{self, MnemonicError};
use crate::share::{self, LocalPartySave, ShareError};

/// One backup file plus the phrase that unlocks it. `label` is only used in
/// log and error context (typically the file name).
pub struct BackupInput {
    pub label: String,
    pub bytes: Vec<u8>,
    pub phrase: Zeroizing<String>,
}

impl BackupInput {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>, phrase: impl Into<String>) -> Self {
        BackupInput {
            label: label.into(),
            bytes,
            phrase: Zeroizing::new(phrase.into()),
        }
    }
}

/// Signature algorithm a share set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Algorithm {
    Ecdsa,
    Eddsa,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Ecdsa => "ECDSA",
            Algorithm::Eddsa => "EDDSA",
        }
    }

    pub fn parse(raw: &str) -> Option<Algorithm> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ECDSA" => Some(Algorithm::Ecdsa),
            "EDDSA" | "ED25519" => Some(Algorithm::Eddsa),
            _ => None,
        }
    }

    /// The curve this algorithm's TSS shares live on.
    pub fn tss_curve(&self) -> crate::curve::Curve {
        match self {
            Algorithm::Ecdsa => crate::curve::Curve::Secp256k1,
            Algorithm::Eddsa => crate::curve::Curve::Edwards25519,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("{file}: {source}")]
    Phrase {
        file: String,
        #[source]
        source: MnemonicError,
    },
    #[error("{file}: {source}")]
    Envelope {
        file: String,
        #[source]
        source: EnvelopeError,
    },
    #[error("{file}: vault {vault_id} nonce {nonce}: {source}")]
    Share {
        file: String,
        vault_id: String,
        nonce: u64,
        #[source]
        source: ShareError,
    },
    #[error("{file}: vault {vault_id}: unknown share algorithm {algorithm:?}")]
    UnknownAlgorithm {
        file: String,
        vault_id: String,
        algorithm: String,
    },
}

/// Listing-mode row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSummary {
    pub vault_id: String,
    pub name: String,
    pub threshold: usize,
    pub share_count: usize,
    pub last_nonce: u64,
}

/// All aggregated shares for one vault at its settled nonce.
pub struct IndexedVault {
    pub vault_id: String,
    pub name: String,
    pub threshold: usize,
    pub nonce: u64,
    pub shares: BTreeMap<Algorithm, Vec<LocalPartySave>>,
}

impl IndexedVault {
    fn share_count(&self) -> usize {
        self.shares.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// The settled cross-file view.
pub struct VaultIndex {
    vaults: BTreeMap<String, IndexedVault>,
    /// Advisory findings (nonce disagreements, duplicate shares); never
    /// fatal on their own.
    pub warnings: Vec<String>,
}

impl VaultIndex {
    pub fn vault(&self, vault_id: &str) -> Option<&IndexedVault> {
        self.vaults.get(vault_id)
    }

    pub fn summaries(&self) -> Vec<VaultSummary> {
        self.vaults
            .values()
            .map(|v| VaultSummary {
                vault_id: v.vault_id.clone(),
                name: v.name.clone(),
                threshold: v.threshold,
                share_count: v.share_count(),
                last_nonce: v.nonce,
            })
            .collect()
    }
}

struct DecryptedEntry {
    file: String,
    vault_id: String,
    nonce: u64,
    clear: envelope::ClearVault,
}

/// Decrypt every supplied backup and aggregate shares per vault and curve.
///
/// With `nonce_override` set, only that reshare nonce is considered; without
/// it each vault settles on the highest nonce seen in any file, and files
/// whose own highest differs are reported in the warnings.
pub fn build_index(
    inputs: &[BackupInput],
    nonce_override: Option<u64>,
) -> Result<VaultIndex, IndexError> {
    let mut entries: Vec<DecryptedEntry> = Vec::new();
    let mut warnings = Vec::new();

    for input in inputs {
        let key = mnemonic::phrase_to_key(&input.phrase).map_err(|source| IndexError::Phrase {
            file: input.label.clone(),
            source,
        })?;
        let backup =
            envelope::parse_backup(&input.bytes).map_err(|source| IndexError::Envelope {
                file: input.label.clone(),
                source,
            })?;

        for (vault_id, by_nonce) in &backup.vaults {
            for (nonce_text, ciphered) in by_nonce {
                let nonce =
                    envelope::parse_nonce(nonce_text).map_err(|source| IndexError::Envelope {
                        file: input.label.clone(),
                        source,
                    })?;
                if nonce_override.is_some_and(|wanted| wanted != nonce) {
                    continue;
                }
                let clear = envelope::decrypt_vault(&key, ciphered).map_err(|source| {
                    IndexError::Envelope {
                        file: input.label.clone(),
                        source,
                    }
                })?;
                log::debug!(
                    "{}: decrypted vault {vault_id} at nonce {nonce}",
                    input.label
                );
                entries.push(DecryptedEntry {
                    file: input.label.clone(),
                    vault_id: vault_id.clone(),
                    nonce,
                    clear,
                });
            }
        }
    }

    // Settle a nonce per vault: the global maximum across files.
    let mut settled: BTreeMap<String, u64> = BTreeMap::new();
    for entry in &entries {
        let nonce = settled.entry(entry.vault_id.clone()).or_insert(entry.nonce);
        *nonce = (*nonce).max(entry.nonce);
    }

    // Report files whose own highest nonce for a vault falls short.
    let mut per_file_high: BTreeMap<(String, String), u64> = BTreeMap::new();
    for entry in &entries {
        let high = per_file_high
            .entry((entry.vault_id.clone(), entry.file.clone()))
            .or_insert(entry.nonce);
        *high = (*high).max(entry.nonce);
    }
    for ((vault_id, file), high) in &per_file_high {
        let global = settled[vault_id];
        if *high != global {
            let msg = format!(
                "vault {vault_id}: {file} stops at reshare nonce {high}, \
                 but another file reaches {global}; proceeding with {global}"
            );
            log::warn!("{msg}");
            warnings.push(msg);
        }
    }

    let mut vaults: BTreeMap<String, IndexedVault> = BTreeMap::new();
    let mut seen_ids: BTreeMap<(String, Algorithm), BTreeSet<Vec<u8>>> = BTreeMap::new();

    for entry in entries {
        if entry.nonce != settled[&entry.vault_id] {
            continue;
        }
        let vault = vaults
            .entry(entry.vault_id.clone())
            .or_insert_with(|| IndexedVault {
                vault_id: entry.vault_id.clone(),
                name: entry.clear.name.clone(),
                threshold: entry.clear.threshold,
                nonce: entry.nonce,
                shares: BTreeMap::new(),
            });
        if vault.threshold != entry.clear.threshold {
            warnings.push(format!(
                "vault {}: {} reports threshold {}, using {}",
                entry.vault_id, entry.file, entry.clear.threshold, vault.threshold
            ));
        }

        for (algorithm, raw_shares) in grouped_shares(&entry, &entry.clear)? {
            for raw in raw_shares {
                let save = share::decode_share(raw).map_err(|source| IndexError::Share {
                    file: entry.file.clone(),
                    vault_id: entry.vault_id.clone(),
                    nonce: entry.nonce,
                    source,
                })?;
                let seen = seen_ids
                    .entry((entry.vault_id.clone(), algorithm))
                    .or_default();
                if !seen.insert(save.share_id.as_be_bytes().to_vec()) {
                    log::debug!(
                        "vault {}: duplicate {algorithm} share id {} from {}, skipping",
                        entry.vault_id,
                        save.share_id.to_decimal(),
                        entry.file
                    );
                    continue;
                }
                let bucket = vault.shares.entry(algorithm).or_default();
                if let (Some(first), Some(new)) = (
                    bucket.first().and_then(|s| s.stored_pub(algorithm)),
                    save.stored_pub(algorithm),
                ) {
                    if first.coords != new.coords {
                        warnings.push(format!(
                            "vault {}: {} share {} carries a different {algorithm} public key \
                             than earlier shares at nonce {}",
                            entry.vault_id,
                            entry.file,
                            save.share_id.to_decimal(),
                            entry.nonce
                        ));
                    }
                }
                bucket.push(save);
            }
        }
    }

    Ok(VaultIndex { vaults, warnings })
}

/// Route a cleartext vault's share strings to their algorithms. The legacy
/// single-array form predates EdDSA support and is always ECDSA.
fn grouped_shares<'a>(
    entry: &DecryptedEntry,
    clear: &'a envelope::ClearVault,
) -> Result<Vec<(Algorithm, &'a [String])>, IndexError> {
    let mut grouped: Vec<(Algorithm, &[String])> = Vec::new();
    if let Some(legacy) = &clear.shares {
        grouped.push((Algorithm::Ecdsa, legacy.as_slice()));
    }
    if let Some(curves) = &clear.curves {
        for curve_shares in curves {
            let algorithm = Algorithm::parse(&curve_shares.algorithm).ok_or_else(|| {
                IndexError::UnknownAlgorithm {
                    file: entry.file.clone(),
                    vault_id: entry.vault_id.clone(),
                    algorithm: curve_shares.algorithm.clone(),
                }
            })?;
            grouped.push((algorithm, curve_shares.shares.as_slice()));
        }
    }
    Ok(grouped)
}
