//! The boundary predicate: a pure function of `(average, level, entry)`
//! deciding whether an entry terminates a bucket.

use crate::entry::{Digest, Entry};
use crate::error::{Error, Result};

/// Validate an `average` value per §4.1: integral (trivially true for `u32`)
/// and in `[1, u32::MAX]`.
pub const fn validate_average(average: u32) -> Result<()> {
    if average == 0 {
        return Err(Error::InvalidAverage { average });
    }
    Ok(())
}

/// `⌊2^32 / average⌋`, computed in `u64` since the exact quotient at
/// `average == 1` is `2^32`, one past `u32::MAX`; clamped down to
/// `u32::MAX` so `average == 1` still means "almost every entry is a
/// boundary" rather than wrapping to zero and meaning the opposite.
fn boundary_threshold(average: u32) -> u32 {
    let threshold = (1u64 << 32) / u64::from(average);
    u32::try_from(threshold).unwrap_or(u32::MAX)
}

/// Decide whether `entry` terminates a bucket at `level` for trees
/// configured with `average`.
///
/// Computes `digest = H(concat(byte(level), key))`, takes the first four
/// bytes of the digest as a big-endian `u32` `h32`, and returns
/// `h32 < floor(2^32 / average)`. Mixing `level` into the hash means the same
/// key is not a boundary at every level, which prevents degenerate towers;
/// leaving `val` out of the hash means updating a value in place never
/// reshapes the tree.
pub fn is_boundary(average: u32, level: u32, entry: &Entry) -> Result<bool> {
    validate_average(average)?;
    let level_byte = u8::try_from(level).map_err(|_| Error::InvalidBucket {
        reason: format!("level {level} does not fit in a single byte"),
    })?;
    let mut buf = Vec::with_capacity(1 + entry.key.len());
    buf.push(level_byte);
    buf.extend_from_slice(&entry.key);
    let digest = Digest::of(&buf);
    Ok(digest.h32()? < boundary_threshold(average))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_average() {
        assert!(matches!(
            validate_average(0),
            Err(Error::InvalidAverage { average: 0 })
        ));
    }

    #[test]
    fn accepts_nonzero_average() {
        assert!(validate_average(1).is_ok());
        assert!(validate_average(u32::MAX).is_ok());
    }

    #[test]
    fn is_deterministic_for_same_inputs() {
        let entry = Entry::new(vec![1, 2, 3], vec![9]);
        let a = is_boundary(32, 0, &entry).expect("valid");
        let b = is_boundary(32, 0, &entry).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn level_changes_the_outcome_for_some_keys() {
        // Not every key differs by level, but across many keys at least one
        // should, confirming level is actually mixed into the hash.
        let differs = (0u32..256).any(|i| {
            let entry = Entry::new(i.to_be_bytes().to_vec(), vec![]);
            let at_0 = is_boundary(8, 0, &entry).expect("valid");
            let at_1 = is_boundary(8, 1, &entry).expect("valid");
            at_0 != at_1
        });
        assert!(differs, "level must be mixed into the boundary hash");
    }

    #[test]
    fn val_does_not_affect_outcome() {
        let key = vec![7, 7, 7];
        let a = Entry::new(key.clone(), vec![1]);
        let b = Entry::new(key, vec![2, 2, 2, 2]);
        assert_eq!(
            is_boundary(16, 0, &a).expect("valid"),
            is_boundary(16, 0, &b).expect("valid"),
            "val must not affect boundary decision"
        );
    }

    #[test]
    fn boundary_rarity_is_roughly_one_over_average() {
        let average = 16u32;
        let samples = 20_000u32;
        let boundaries = (0..samples)
            .filter(|i| {
                let entry = Entry::new(i.to_be_bytes().to_vec(), vec![]);
                is_boundary(average, 0, &entry).expect("valid")
            })
            .count();
        let observed = f64::from(u32::try_from(boundaries).expect("fits")) / f64::from(samples);
        let expected = 1.0 / f64::from(average);
        // Generous tolerance: within 30% relative error over 20k samples.
        assert!(
            (observed - expected).abs() < expected * 0.3,
            "observed boundary rate {observed} too far from expected {expected}"
        );
    }
}
