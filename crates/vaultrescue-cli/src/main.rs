//! vaultrescue: recover distributed-vault private keys from signer backups.
//!
//! Recovery phrases are read from stdin, one line per `--backup` file in
//! argument order, so key material never lands in shell history or process
//! listings.
//!
//! # Usage
//!
//! ```bash
//! vaultrescue --backup a.json --backup b.json --list < phrases.txt
//! vaultrescue --backup a.json --backup b.json --vault <id> < phrases.txt
//! vaultrescue --backup a.json --backup b.json --vault <id> \
//!     --csv wallets.csv --csv-out derived.csv < phrases.txt
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use zeroize::Zeroizing;

use vaultrescue_core::{list_vaults, recover_vault, BackupInput, RecoverOptions};
use vaultrescue_hd::{derive_records, read_records, write_records, DeriveOptions, MasterKeys, ZeroChildPolicy};

struct Args {
    backups: Vec<PathBuf>,
    list: bool,
    vault: Option<String>,
    nonce: Option<u64>,
    threshold: Option<usize>,
    csv_in: Option<PathBuf>,
    csv_out: Option<PathBuf>,
    accept_zero_child: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    if args.backups.is_empty() {
        bail!("at least one --backup file is required (see --help)");
    }

    let inputs = read_inputs(&args.backups)?;

    if args.list {
        let listing = list_vaults(&inputs)?;
        for warning in &listing.warnings {
            log::warn!("{warning}");
        }
        // Listings go to stderr; stdout is reserved for key material.
        eprintln!("{:<26} {:<20} {:>9} {:>7} {:>6}", "VAULT ID", "NAME", "THRESHOLD", "SHARES", "NONCE");
        for vault in &listing.vaults {
            eprintln!(
                "{:<26} {:<20} {:>9} {:>7} {:>6}",
                vault.vault_id, vault.name, vault.threshold, vault.share_count, vault.last_nonce
            );
        }
        return Ok(());
    }

    let vault_id = match &args.vault {
        Some(id) => id,
        None => bail!("either --list or --vault <id> is required"),
    };

    let opts = RecoverOptions {
        nonce_override: args.nonce,
        threshold_override: args.threshold,
    };
    let recovered = recover_vault(&inputs, vault_id, &opts)
        .with_context(|| format!("recovering vault {vault_id}"))?;
    for warning in &recovered.warnings {
        log::warn!("{warning}");
    }

    println!("vault:     {} ({})", recovered.vault_id, recovered.name);
    println!("nonce:     {}", recovered.nonce);
    println!("threshold: {}", recovered.threshold);
    if let (Some(sk), Some(pk)) = (&recovered.ecdsa_sk, &recovered.ecdsa_pub) {
        println!("ecdsa sk:  {}", hex::encode(sk.as_slice()));
        println!("ecdsa pk:  {}", hex::encode(pk));
    }
    if let (Some(sk), Some(pk)) = (&recovered.eddsa_sk, &recovered.eddsa_pub) {
        println!("eddsa sk:  {}", hex::encode(sk.as_slice()));
        println!("eddsa pk:  {}", hex::encode(pk));
    }

    if let Some(csv_in) = &args.csv_in {
        let file = std::fs::File::open(csv_in)
            .with_context(|| format!("opening {}", csv_in.display()))?;
        let records = read_records(file)?;
        log::info!("deriving {} record(s) from {}", records.len(), csv_in.display());

        let masters = MasterKeys {
            ecdsa: recovered.ecdsa_sk.as_deref(),
            eddsa: recovered.eddsa_sk.as_deref(),
        };
        let derive_opts = DeriveOptions {
            zero_child_policy: if args.accept_zero_child {
                ZeroChildPolicy::Accept
            } else {
                ZeroChildPolicy::Reject
            },
        };
        let derived = derive_records(&records, &masters, &derive_opts)?;
        let csv_text = Zeroizing::new(write_records(&derived)?);

        match &args.csv_out {
            Some(path) => {
                std::fs::write(path, csv_text.as_bytes())
                    .with_context(|| format!("writing {}", path.display()))?;
                log::info!("wrote {} derived row(s) to {}", derived.len(), path.display());
            }
            None => {
                std::io::stdout().write_all(csv_text.as_bytes())?;
            }
        }
    }

    Ok(())
}

fn parse_args() -> Result<Args> {
    let raw: Vec<String> = std::env::args().collect();
    let mut args = Args {
        backups: Vec::new(),
        list: false,
        vault: None,
        nonce: None,
        threshold: None,
        csv_in: None,
        csv_out: None,
        accept_zero_child: false,
    };

    let mut i = 1;
    let value = |i: &mut usize| -> Result<String> {
        *i += 1;
        raw.get(*i)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} requires a value", raw[*i - 1]))
    };

    while i < raw.len() {
        match raw[i].as_str() {
            "--backup" | "-b" => args.backups.push(PathBuf::from(value(&mut i)?)),
            "--list" | "-l" => args.list = true,
            "--vault" | "-v" => args.vault = Some(value(&mut i)?),
            "--nonce" => {
                let text = value(&mut i)?;
                args.nonce = Some(text.parse().context("--nonce must be a non-negative integer")?);
            }
            "--threshold" | "-t" => {
                let text = value(&mut i)?;
                args.threshold = Some(text.parse().context("--threshold must be a positive integer")?);
            }
            "--csv" => args.csv_in = Some(PathBuf::from(value(&mut i)?)),
            "--csv-out" => args.csv_out = Some(PathBuf::from(value(&mut i)?)),
            "--accept-zero-child" => args.accept_zero_child = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("vaultrescue {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }
    Ok(args)
}

/// Read each backup file and pair it with a phrase line from stdin.
fn read_inputs(paths: &[PathBuf]) -> Result<Vec<BackupInput>> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let phrase = Zeroizing::new(
            lines
                .next()
                .transpose()
                .context("reading phrase from stdin")?
                .with_context(|| {
                    format!("stdin ended before a phrase for {}", path.display())
                })?,
        );
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        inputs.push(BackupInput::new(label, bytes, phrase.trim().to_string()));
    }
    Ok(inputs)
}

fn print_help() {
    println!(
        r#"vaultrescue: recover distributed-vault private keys from signer backups

USAGE:
    vaultrescue --backup <FILE>... (--list | --vault <ID>) [OPTIONS] < phrases.txt

Recovery phrases are read from stdin, one line per --backup file, in order.

OPTIONS:
    -b, --backup <FILE>      Signer backup file (repeat once per signer)
    -l, --list               List the vaults the backups describe, then exit
    -v, --vault <ID>         Recover this vault's private key(s)
    --nonce <N>              Use this reshare nonce instead of the highest seen
    -t, --threshold <N>      Override the vault's recorded threshold
    --csv <FILE>             Derive child keys for these records (address,xpub,
                             path,algorithm,curve,flags)
    --csv-out <FILE>         Write derived rows here (default: stdout)
    --accept-zero-child      Accept a zero child scalar instead of failing
    -h, --help               Show this help message
    -V, --version            Show version

EXAMPLES:
    # Which vaults do these backups hold?
    vaultrescue -b alice.json -b bob.json --list < phrases.txt

    # Recover one vault and derive its known wallet addresses
    vaultrescue -b alice.json -b bob.json -v yjanjbgmbrptwwa9i5v9c20x \
        --csv wallets.csv --csv-out derived.csv < phrases.txt
"#
    );
}
