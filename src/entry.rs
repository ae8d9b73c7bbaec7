//! The entry, digest, and prefix types that make up a bucket.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The content digest of an encoded bucket's bytes. A thin newtype over
/// `blake3::Hash`, which already gives us `Display` (hex), `Eq`, `Hash`,
/// `Copy`, and `serde` support (via the `serde` feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(blake3::Hash);

impl Digest {
    /// Hash a buffer of bytes into a digest.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    /// The raw 32 bytes of the digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Hex-encoded representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }

    /// The first four bytes of the digest, interpreted as a big-endian `u32`,
    /// as used by the boundary predicate. `InsufficientHash` can only occur
    /// here if a future change to the hash's output width violates the
    /// 4-byte minimum; BLAKE3's output is always 32 bytes.
    pub fn h32(&self) -> Result<u32> {
        let bytes = self.as_bytes();
        if bytes.len() < 4 {
            return Err(Error::InsufficientHash { found: bytes.len() });
        }
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reconstruct a digest from a byte slice (used when a `val` field in an
    /// interior entry is interpreted as a child digest).
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| Error::InvalidBucket {
            reason: format!("expected a 32-byte digest, found {} bytes", bytes.len()),
        })?;
        Ok(Self(blake3::Hash::from_bytes(arr)))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Digest> for Vec<u8> {
    fn from(digest: Digest) -> Self {
        digest.as_bytes().to_vec()
    }
}

/// The `(average, level)` pair shared by every bucket on one level of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefix {
    pub average: u32,
    pub level: u32,
}

impl Prefix {
    #[must_use]
    pub const fn new(average: u32, level: u32) -> Self {
        Self { average, level }
    }

    /// The prefix of this bucket's children, one level down.
    #[must_use]
    pub const fn child(&self) -> Self {
        Self {
            average: self.average,
            level: self.level.saturating_sub(1),
        }
    }
}

/// An immutable key-value record. The data model is frozen to key-only
/// ordering (see `SPEC_FULL.md` §3 and §9): there is no `seq` field, and
/// entries are ordered solely by `key`.
///
/// On level 0 buckets `val` is user payload; on level > 0 buckets `val` is
/// the digest bytes of the child bucket whose last entry's key equals `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Vec<u8>,
    pub val: Vec<u8>,
}

impl Entry {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, val: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            val: val.into(),
        }
    }

    /// Build an interior entry pointing at a child bucket.
    #[must_use]
    pub fn pointer(key: impl Into<Vec<u8>>, child_digest: Digest) -> Self {
        Self {
            key: key.into(),
            val: child_digest.as_bytes().to_vec(),
        }
    }

    /// Interpret `val` as a child digest (only meaningful on interior entries).
    pub fn child_digest(&self) -> Result<Digest> {
        Digest::from_slice(&self.val)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trips_through_bytes() {
        let digest = Digest::of(b"hello");
        let bytes = digest.as_bytes().to_vec();
        let back = Digest::from_slice(&bytes).expect("valid digest bytes");
        assert_eq!(digest, back);
    }

    #[test]
    fn digest_of_is_deterministic() {
        assert_eq!(Digest::of(b"abc"), Digest::of(b"abc"));
        assert_ne!(Digest::of(b"abc"), Digest::of(b"abd"));
    }

    #[test]
    fn entries_order_by_key_only() {
        let a = Entry::new(vec![1], vec![9]);
        let b = Entry::new(vec![2], vec![0]);
        assert!(a < b);
    }

    #[test]
    fn pointer_entry_round_trips_child_digest() {
        let digest = Digest::of(b"child bytes");
        let entry = Entry::pointer(vec![5], digest);
        assert_eq!(entry.child_digest().expect("valid digest"), digest);
    }
}
