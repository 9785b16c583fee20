//! Shamir/VSS reconstruction.
//!
//! Lagrange interpolation at x = 0 over the scalar field of the target
//! curve. Any `threshold` distinct valid shares of a degree `threshold-1`
//! sharing recover the secret; the first `threshold` shares in input order
//! are the subset used.

use std::collections::BTreeSet;

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::curve::{Curve, Scalar};
use crate::share::LocalPartySave;

#[derive(Error, Debug)]
pub enum VssError {
    #[error("need {needed} shares to reconstruct, only {got} available")]
    InsufficientShares { needed: usize, got: usize },
    #[error("share id {0} is not a valid non-zero scalar on {1}")]
    InvalidShareId(String, Curve),
    #[error("share id {0} appears more than once")]
    DuplicateShareId(String),
    #[error("share {0} carries a value outside the scalar field of {1}")]
    InvalidShareValue(String, Curve),
    #[error("reconstruction produced the zero scalar")]
    ZeroSecret,
}

/// Reconstruct the vault secret for one curve from at least `threshold`
/// shares, returned as 32 big-endian bytes.
pub fn reconstruct_secret(
    curve: Curve,
    threshold: usize,
    shares: &[LocalPartySave],
) -> Result<Zeroizing<[u8; 32]>, VssError> {
    if shares.len() < threshold || threshold == 0 {
        return Err(VssError::InsufficientShares {
            needed: threshold,
            got: shares.len(),
        });
    }

    let subset = &shares[..threshold];
    let mut seen: BTreeSet<Vec<u8>> = BTreeSet::new();
    let mut points: Vec<(Scalar, Scalar)> = Vec::with_capacity(threshold);
    for save in subset {
        let id_decimal = save.share_id.to_decimal();
        if save.share_id.is_zero() {
            return Err(VssError::InvalidShareId(id_decimal, curve));
        }
        if !seen.insert(save.share_id.as_be_bytes().to_vec()) {
            return Err(VssError::DuplicateShareId(id_decimal));
        }
        let x = curve
            .scalar_from_be(save.share_id.as_be_bytes())
            .map_err(|_| VssError::InvalidShareId(id_decimal.clone(), curve))?;
        if x.is_zero() {
            return Err(VssError::InvalidShareId(id_decimal, curve));
        }
        let y = curve
            .scalar_from_be(save.xi.as_be_bytes())
            .map_err(|_| VssError::InvalidShareValue(id_decimal, curve))?;
        points.push((x, y));
    }

    let secret = interpolate_at_zero(curve, &points)?;
    points.zeroize();

    if secret.is_zero() {
        return Err(VssError::ZeroSecret);
    }
    Ok(Zeroizing::new(secret.to_be_bytes()))
}

/// `Σ_i y_i · Π_{j≠i} x_j · (x_j − x_i)^{-1}` over the curve's scalar
/// field, with the Lagrange basis evaluated at zero.
fn interpolate_at_zero(curve: Curve, points: &[(Scalar, Scalar)]) -> Result<Scalar, VssError> {
    let mut acc = curve.scalar_reduce_be(&[0u8; 32]);
    let mut one_bytes = [0u8; 32];
    one_bytes[31] = 1;
    let one = curve.scalar_reduce_be(&one_bytes);
    for (i, (x_i, y_i)) in points.iter().enumerate() {
        let mut num = one.clone();
        let mut den = one.clone();
        for (j, (x_j, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            num = num.mul(x_j);
            den = den.mul(&x_j.sub(x_i));
        }
        // Distinct ids make the denominator non-zero.
        let den_inv = den
            .invert()
            .ok_or_else(|| VssError::DuplicateShareId(format!("index {i}")))?;
        acc = acc.add(&y_i.mul(&num).mul(&den_inv));
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::share::ShareScalar;

    /// Evaluate `c_0 + c_1·x + … + c_t·x^t` and wrap each point as the
    /// share record the pipeline produces.
    fn deal_shares(curve: Curve, coeffs: &[&[u8]], ids: &[u8]) -> Vec<LocalPartySave> {
        let coeffs: Vec<Scalar> = coeffs
            .iter()
            .map(|c| curve.scalar_from_be(c).unwrap())
            .collect();
        ids.iter()
            .map(|&id| {
                let x = curve.scalar_from_be(&[id]).unwrap();
                let mut y = curve.scalar_reduce_be(&[0u8; 32]);
                for c in coeffs.iter().rev() {
                    y = y.mul(&x).add(c);
                }
                LocalPartySave {
                    share_id: ShareScalar::from_be_bytes(&[id]),
                    xi: ShareScalar::from_be_bytes(&y.to_be_bytes()),
                    ecdsa_pub: None,
                    eddsa_pub: None,
                }
            })
            .collect()
    }

    const SECRET: &[u8] = &[0x5e, 0xc2, 0xe7];

    #[test]
    fn test_reconstruct_2_of_3_secp256k1() {
        let shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x07, 0x01]], &[1, 2, 3]);
        for subset in [&shares[0..2], &shares[1..3]] {
            let secret = reconstruct_secret(Curve::Secp256k1, 2, subset).unwrap();
            assert_eq!(&secret[29..], SECRET);
            assert_eq!(&secret[..29], &[0u8; 29]);
        }
    }

    #[test]
    fn test_reconstruct_3_of_5_edwards25519() {
        let shares = deal_shares(
            Curve::Edwards25519,
            &[SECRET, &[0x11], &[0x23, 0x45]],
            &[1, 2, 3, 4, 5],
        );
        let secret = reconstruct_secret(Curve::Edwards25519, 3, &shares[2..5]).unwrap();
        assert_eq!(&secret[29..], SECRET);
    }

    #[test]
    fn test_uses_first_threshold_shares() {
        // Corrupt the last share; reconstruction over the first two must not
        // touch it.
        let mut shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x09]], &[1, 2, 3]);
        shares[2].xi = ShareScalar::from_be_bytes(&[0xde, 0xad]);
        let secret = reconstruct_secret(Curve::Secp256k1, 2, &shares).unwrap();
        assert_eq!(&secret[29..], SECRET);
    }

    #[test]
    fn test_too_few_shares_refused() {
        let shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x09], &[0x0a]], &[1, 2]);
        match reconstruct_secret(Curve::Secp256k1, 3, &shares) {
            Err(VssError::InsufficientShares { needed: 3, got: 2 }) => {}
            other => panic!("expected InsufficientShares, got {other:?}"),
        }
    }

    #[test]
    fn test_below_threshold_subset_gives_wrong_secret() {
        // Two shares of a degree-2 polynomial interpolate to *something*,
        // just never the secret; only the verifier can catch this, which is
        // why the caller must pass the vault's real threshold.
        let shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x09], &[0x0a]], &[1, 2, 3]);
        let wrong = reconstruct_secret(Curve::Secp256k1, 2, &shares[..2]).unwrap();
        assert_ne!(&wrong[29..], SECRET);
    }

    #[test]
    fn test_zero_share_id_rejected() {
        let mut shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x09]], &[1, 2]);
        shares[0].share_id = ShareScalar::from_be_bytes(&[]);
        assert!(matches!(
            reconstruct_secret(Curve::Secp256k1, 2, &shares),
            Err(VssError::InvalidShareId(..))
        ));
    }

    #[test]
    fn test_duplicate_share_id_rejected() {
        let shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x09]], &[2, 2]);
        assert!(matches!(
            reconstruct_secret(Curve::Secp256k1, 2, &shares),
            Err(VssError::DuplicateShareId(_))
        ));
    }

    #[test]
    fn test_share_value_outside_field_rejected() {
        let mut shares = deal_shares(Curve::Edwards25519, &[SECRET, &[0x09]], &[1, 2]);
        shares[1].xi = ShareScalar::from_be_bytes(&[0xff; 32]);
        assert!(matches!(
            reconstruct_secret(Curve::Edwards25519, 2, &shares),
            Err(VssError::InvalidShareValue(..))
        ));
    }

    #[test]
    fn test_deterministic() {
        let shares = deal_shares(Curve::Secp256k1, &[SECRET, &[0x31], &[0x07]], &[5, 9, 11, 2]);
        let a = reconstruct_secret(Curve::Secp256k1, 3, &shares).unwrap();
        let b = reconstruct_secret(Curve::Secp256k1, 3, &shares).unwrap();
        assert_eq!(*a, *b);
    }
}
