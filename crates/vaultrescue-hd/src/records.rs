//! Derivation-record CSV intake and output.
//!
//! Input rows are `address,xpub,path,algorithm,curve,flags` (headers
//! case-insensitive, fields whitespace-trimmed, empty flags read as 0).
//! Output echoes every input column and appends `publickey,privatekey` in
//! lowercase hex, preserving row order.

use std::collections::HashMap;
use std::io::Read;

use zeroize::Zeroizing;

use vaultrescue_core::curve::Curve;

use crate::derive::{derive_child_keys, DeriveOptions, MasterKeys};
use crate::path::parse_path;
use crate::xpub::parse_xpub;
use crate::HdError;

/// Signature scheme requested for a derivation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdAlgorithm {
    Ecdsa,
    Eddsa,
    Schnorr,
}

impl HdAlgorithm {
    pub fn parse(raw: &str) -> Option<HdAlgorithm> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ECDSA" => Some(HdAlgorithm::Ecdsa),
            "EDDSA" | "ED25519" => Some(HdAlgorithm::Eddsa),
            "SCHNORR" => Some(HdAlgorithm::Schnorr),
            _ => None,
        }
    }
}

/// Curve-name aliases as they appear in the wild.
pub fn parse_curve(raw: &str) -> Option<Curve> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "secp256k1" => Some(Curve::Secp256k1),
        "p-256" | "p256" | "nist p-256" | "prime256v1" => Some(Curve::NistP256),
        "edwards25519" | "ed25519" | "curve25519" => Some(Curve::Edwards25519),
        _ => None,
    }
}

/// The algorithm/curve pairs the cohort ever produced.
fn validate_pair(algorithm: HdAlgorithm, curve: Curve) -> bool {
    matches!(
        (algorithm, curve),
        (HdAlgorithm::Ecdsa, Curve::Secp256k1)
            | (HdAlgorithm::Ecdsa, Curve::NistP256)
            | (HdAlgorithm::Schnorr, Curve::Secp256k1)
            | (HdAlgorithm::Eddsa, Curve::Edwards25519)
    )
}

/// One input row, fields kept verbatim for faithful echo on output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRecord {
    pub address: String,
    pub xpub: String,
    pub path: String,
    pub algorithm: String,
    pub curve: String,
    pub flags: u32,
}

/// An input row plus its derived key pair.
#[derive(Debug)]
pub struct DerivedRecord {
    pub record: DerivationRecord,
    /// Lowercase hex, 33 bytes for ECDSA/SCHNORR, 32 for EDDSA.
    pub public_key: String,
    /// Lowercase hex, 32 bytes; wiped on drop.
    pub private_key: Zeroizing<String>,
}

const REQUIRED_COLUMNS: [&str; 5] = ["address", "xpub", "path", "algorithm", "curve"];

/// Read derivation records from CSV.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<DerivationRecord>, HdError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| HdError::Csv(e.to_string()))?;
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (i, name) in headers.iter().enumerate() {
        columns.insert(name.trim().to_ascii_lowercase(), i);
    }
    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err(HdError::Csv(format!("missing column {required:?}")));
        }
    }
    let flags_column = columns.get("flags").copied();

    let field = |record: &csv::StringRecord, name: &str| -> String {
        columns
            .get(name)
            .and_then(|&i| record.get(i))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    let mut records = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| HdError::Csv(format!("row {}: {e}", row + 1)))?;
        let flags_text = flags_column
            .and_then(|i| record.get(i))
            .unwrap_or_default()
            .trim()
            .to_string();
        let flags = if flags_text.is_empty() {
            0
        } else {
            flags_text.parse().map_err(|_| {
                HdError::Csv(format!("row {}: bad flags {flags_text:?}", row + 1))
            })?
        };
        records.push(DerivationRecord {
            address: field(&record, "address"),
            xpub: field(&record, "xpub"),
            path: field(&record, "path"),
            algorithm: field(&record, "algorithm"),
            curve: field(&record, "curve"),
            flags,
        });
    }
    Ok(records)
}

/// Derive every record against the recovered master keys, preserving input
/// order. The first failing row aborts the run with its row number and
/// address label attached.
pub fn derive_records(
    records: &[DerivationRecord],
    masters: &MasterKeys<'_>,
    opts: &DeriveOptions,
) -> Result<Vec<DerivedRecord>, HdError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            derive_one(record, masters, opts).map_err(|source| HdError::Record {
                row: i + 1,
                address: record.address.clone(),
                source: Box::new(source),
            })
        })
        .collect()
}

fn derive_one(
    record: &DerivationRecord,
    masters: &MasterKeys<'_>,
    opts: &DeriveOptions,
) -> Result<DerivedRecord, HdError> {
    let algorithm = HdAlgorithm::parse(&record.algorithm).ok_or_else(|| {
        HdError::InvalidAlgorithmCurve {
            algorithm: record.algorithm.clone(),
            curve: record.curve.clone(),
        }
    })?;
    let curve = parse_curve(&record.curve).ok_or_else(|| HdError::InvalidAlgorithmCurve {
        algorithm: record.algorithm.clone(),
        curve: record.curve.clone(),
    })?;
    if !validate_pair(algorithm, curve) {
        return Err(HdError::InvalidAlgorithmCurve {
            algorithm: record.algorithm.clone(),
            curve: record.curve.clone(),
        });
    }

    let master = match algorithm {
        HdAlgorithm::Ecdsa | HdAlgorithm::Schnorr => {
            masters.ecdsa.ok_or(HdError::MissingMasterKey("ECDSA"))?
        }
        HdAlgorithm::Eddsa => masters.eddsa.ok_or(HdError::MissingMasterKey("EdDSA"))?,
    };

    let path = parse_path(&record.path)?;
    let xpub = parse_xpub(&record.xpub, curve)?;
    let child = derive_child_keys(curve, master, &xpub, &path, opts)?;
    log::debug!(
        "derived {} at {} on {curve} ({} steps)",
        record.address,
        record.path,
        path.len()
    );

    Ok(DerivedRecord {
        record: record.clone(),
        public_key: hex::encode(&child.pk),
        private_key: Zeroizing::new(hex::encode(child.sk.as_slice())),
    })
}

/// Render derived rows back to CSV, input columns first.
pub fn write_records(rows: &[DerivedRecord]) -> Result<String, HdError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "address",
            "xpub",
            "path",
            "algorithm",
            "curve",
            "flags",
            "publickey",
            "privatekey",
        ])
        .map_err(|e| HdError::Csv(e.to_string()))?;
    for row in rows {
        let flags = row.record.flags.to_string();
        writer
            .write_record([
                row.record.address.as_str(),
                row.record.xpub.as_str(),
                row.record.path.as_str(),
                row.record.algorithm.as_str(),
                row.record.curve.as_str(),
                flags.as_str(),
                row.public_key.as_str(),
                row.private_key.as_str(),
            ])
            .map_err(|e| HdError::Csv(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| HdError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| HdError::Csv(e.to_string()))
}
