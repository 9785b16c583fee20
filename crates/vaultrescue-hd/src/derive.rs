//! Child-key derivation.
//!
//! The BIP-32 non-hardened step, generalized over the curve capability:
//!
//! 1. `I = HMAC-SHA-512(chainCode, serialize(parentPub) || u32be(index))`
//! 2. `δ = I[0..32]` as a big-endian integer, reduced into the scalar field
//! 3. `child = (parent + δ) mod n`, `childPub = child · G`
//! 4. the next chain code is `I[32..64]`
//!
//! The parent public key enters the HMAC in the curve's wire encoding:
//! SEC1 compressed on the Weierstrass curves, the canonical 32-byte form on
//! Edwards25519.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use vaultrescue_core::curve::Curve;

use crate::xpub::ParsedXpub;
use crate::HdError;

type HmacSha512 = Hmac<Sha512>;

/// What to do when a derivation step lands on the zero scalar.
///
/// BIP-32 says skip to the next index; the signing cohorts this tool
/// recovers from accepted the raw sum instead. Rejecting is the safe
/// default, accepting reproduces the cohort's own (2⁻²⁵⁶-probability)
/// behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroChildPolicy {
    #[default]
    Reject,
    Accept,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeriveOptions {
    pub zero_child_policy: ZeroChildPolicy,
}

/// The recovered master scalars available to a derivation run. ECDSA and
/// SCHNORR records draw on the ECDSA master, EDDSA records on the EdDSA
/// master.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterKeys<'a> {
    pub ecdsa: Option<&'a [u8; 32]>,
    pub eddsa: Option<&'a [u8; 32]>,
}

/// One derived child: secret scalar (wiped on drop) plus its public key in
/// the curve's wire encoding.
pub struct ChildKey {
    pub sk: Zeroizing<[u8; 32]>,
    pub pk: Vec<u8>,
}

/// Walk `path` from the master scalar, using the xpub's chain code and
/// public key as the starting point.
pub fn derive_child_keys(
    curve: Curve,
    master_sk: &[u8; 32],
    xpub: &ParsedXpub,
    path: &[u32],
    opts: &DeriveOptions,
) -> Result<ChildKey, HdError> {
    let mut parent_sk = curve
        .scalar_from_be(master_sk)
        .map_err(|_| HdError::InvalidMasterKey(curve))?;
    let mut parent_pk = xpub.pub_key.clone();
    let mut chain_code = Zeroizing::new(xpub.chain_code);

    for &index in path {
        let mut mac = HmacSha512::new_from_slice(chain_code.as_slice())
            .map_err(|e| HdError::InvalidXpub(format!("chain code: {e}")))?;
        mac.update(&parent_pk);
        mac.update(&index.to_be_bytes());
        let mut digest = Zeroizing::new([0u8; 64]);
        digest.copy_from_slice(mac.finalize().into_bytes().as_slice());

        let mut left = [0u8; 32];
        left.copy_from_slice(&digest[..32]);
        let delta = curve.scalar_reduce_be(&left);
        left.zeroize();

        let child_sk = parent_sk.add(&delta);
        if child_sk.is_zero() && opts.zero_child_policy == ZeroChildPolicy::Reject {
            return Err(HdError::InvalidChild(index));
        }

        parent_pk = child_sk.mul_base();
        chain_code.copy_from_slice(&digest[32..]);
        parent_sk = child_sk;
    }

    Ok(ChildKey {
        sk: Zeroizing::new(parent_sk.to_be_bytes()),
        pk: parent_pk,
    })
}
