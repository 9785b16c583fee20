//! Derivation-path parsing.
//!
//! Accepts the usual textual forms (`m`, `m/`, `M/0/1`, a bare empty
//! string) and yields the list of child indices. Hardened markers (`'`,
//! `h`) and indices at or past 2³¹ are refused: the cohort never held the
//! seed in one piece, so hardened children were never derivable and any
//! such request is a caller mistake worth naming precisely.

use crate::HdError;

/// Highest allowed child index (non-hardened range).
pub const MAX_INDEX: u64 = (1 << 31) - 1;

/// Parse a path like `m/44/60/0/0/0` into `[44, 60, 0, 0, 0]`.
pub fn parse_path(raw: &str) -> Result<Vec<u32>, HdError> {
    let trimmed = raw.trim();
    let rest = match trimmed {
        "" | "m" | "M" => return Ok(Vec::new()),
        _ => trimmed
            .strip_prefix("m/")
            .or_else(|| trimmed.strip_prefix("M/"))
            .ok_or_else(|| HdError::InvalidPath(format!("{trimmed:?} must start with m/")))?,
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    rest.split('/').map(parse_segment).collect()
}

fn parse_segment(segment: &str) -> Result<u32, HdError> {
    let segment = segment.trim();
    if segment.ends_with('\'') || segment.ends_with('h') || segment.ends_with('H') {
        return Err(HdError::HardenedNotSupported(segment.to_string()));
    }
    let value: u64 = segment
        .parse()
        .map_err(|_| HdError::InvalidPath(format!("bad index {segment:?}")))?;
    if value > MAX_INDEX {
        return Err(HdError::HardenedNotSupported(segment.to_string()));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_forms() {
        for raw in ["", "m", "M", "m/", "M/", "  m  "] {
            assert_eq!(parse_path(raw).unwrap(), Vec::<u32>::new(), "{raw:?}");
        }
    }

    #[test]
    fn test_simple_paths() {
        assert_eq!(parse_path("m/0").unwrap(), vec![0]);
        assert_eq!(parse_path("M/0").unwrap(), vec![0]);
        assert_eq!(parse_path("m/44/60/0/0/0").unwrap(), vec![44, 60, 0, 0, 0]);
        assert_eq!(parse_path("m/2147483647").unwrap(), vec![2147483647]);
    }

    #[test]
    fn test_hardened_markers_rejected() {
        for raw in ["m/0'", "m/0h", "m/44'/60", "m/5H"] {
            assert!(
                matches!(parse_path(raw), Err(HdError::HardenedNotSupported(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_hardened_range_rejected() {
        assert!(matches!(
            parse_path("m/2147483648"),
            Err(HdError::HardenedNotSupported(_))
        ));
        assert!(matches!(
            parse_path("m/99999999999999"),
            Err(HdError::HardenedNotSupported(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for raw in ["m/-1", "m/abc", "m//0", "44/60", "x/0", "m/0/"] {
            assert!(
                matches!(parse_path(raw), Err(HdError::InvalidPath(_))),
                "{raw:?}"
            );
        }
    }
}
