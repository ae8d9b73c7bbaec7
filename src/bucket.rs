//! The in-memory bucket model: prefix, entries, eagerly-computed digest, and
//! optional traversal context.

use tracing::instrument;

use crate::boundary::is_boundary;
use crate::codec;
use crate::config::MAX_LEVEL;
use crate::entry::{Digest, Entry, Prefix};
use crate::error::{Error, Result};

/// The cached encode of a bucket's bytes and digest, computed once at
/// construction (per the design note in §9: "eagerly compute at
/// construction" rather than lazily on first access).
#[derive(Debug, Clone)]
pub struct Addressed {
    pub bytes: Vec<u8>,
    pub digest: Digest,
}

/// Whether a bucket is the leftmost (`is_tail`) and/or rightmost (`is_head`)
/// bucket on its level within its enclosing subtree. Reconstructed during
/// traversal, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub is_tail: bool,
    pub is_head: bool,
}

impl Context {
    #[must_use]
    pub const fn root() -> Self {
        Self {
            is_tail: true,
            is_head: true,
        }
    }
}

/// An ordered, duplicate-free, content-addressed sequence of entries sharing
/// a prefix. See `SPEC_FULL.md` §3 for the full invariant list.
#[derive(Debug, Clone)]
pub struct Bucket {
    prefix: Prefix,
    entries: Vec<Entry>,
    addressed: Addressed,
    context: Option<Context>,
}

impl Bucket {
    /// Build a bucket from a prefix and entries that have already been
    /// validated by the caller (the mutation engine's chunking step
    /// guarantees the order/boundary invariants by construction — see
    /// `SPEC_FULL.md` §4.4). Computes `bytes`/`digest` eagerly.
    #[instrument(skip(entries))]
    pub fn new_unchecked(prefix: Prefix, entries: Vec<Entry>) -> Result<Self> {
        let (bytes, digest) = codec::encode(prefix, &entries)?;
        Ok(Self {
            prefix,
            entries,
            addressed: Addressed { bytes, digest },
            context: None,
        })
    }

    /// Build and fully validate a bucket against the structural invariants
    /// in §3/§4.2, given whether it is known to be the tree's root.
    pub fn new(prefix: Prefix, entries: Vec<Entry>, is_root: bool) -> Result<Self> {
        validate_shape(prefix, &entries, is_root)?;
        Self::new_unchecked(prefix, entries)
    }

    #[must_use]
    pub const fn prefix(&self) -> Prefix {
        self.prefix
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn digest(&self) -> Digest {
        self.addressed.digest
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.addressed.bytes
    }

    #[must_use]
    pub const fn context(&self) -> Option<Context> {
        self.context
    }

    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn last_key(&self) -> Option<&[u8]> {
        self.entries.last().map(|e| e.key.as_slice())
    }

    /// Decode and fully validate a bucket loaded from the block store,
    /// matching it against an expected prefix and (optionally) an expected
    /// key range and tail/head context, per §4.2's "Optional range check"
    /// and "Optional prefix check".
    #[instrument(skip(bytes))]
    pub fn load(
        bytes: &[u8],
        expected_prefix: Prefix,
        range: Option<(Option<&[u8]>, &[u8])>,
        context: Context,
        is_root: bool,
    ) -> Result<Self> {
        let (prefix, entries) = codec::decode(bytes)?;
        if prefix.average != expected_prefix.average || prefix.level != expected_prefix.level {
            return Err(Error::PrefixMismatch {
                expected_average: expected_prefix.average,
                expected_level: expected_prefix.level,
                actual_average: prefix.average,
                actual_level: prefix.level,
            });
        }
        validate_shape(prefix, &entries, is_root)?;
        validate_boundary_rule(prefix, &entries, context.is_head)?;
        if let Some((min_excl, max_incl)) = range {
            validate_range(&entries, min_excl, max_incl, context.is_head)?;
        }
        let digest = Digest::of(bytes);
        Ok(Self {
            prefix,
            entries,
            addressed: Addressed {
                bytes: bytes.to_vec(),
                digest,
            },
            context: Some(context),
        })
    }
}

fn validate_shape(prefix: Prefix, entries: &[Entry], is_root: bool) -> Result<()> {
    if prefix.average == 0 {
        return Err(Error::InvalidAverage {
            average: prefix.average,
        });
    }
    if prefix.level > MAX_LEVEL {
        return Err(Error::InvalidBucket {
            reason: format!("level {} exceeds MAX_LEVEL {MAX_LEVEL}", prefix.level),
        });
    }
    for pair in entries.windows(2) {
        if pair[0].key >= pair[1].key {
            return Err(Error::InvalidBucket {
                reason: "entries are not strictly increasing by key".to_string(),
            });
        }
    }
    let is_only_empty_root = entries.is_empty() && is_root && prefix.level == 0;
    if entries.is_empty() && !is_only_empty_root {
        return Err(Error::InvalidBucket {
            reason: "only the root of an empty tree may have zero entries".to_string(),
        });
    }
    if is_root && prefix.level > 0 && entries.len() < 2 {
        return Err(Error::InvalidBucket {
            reason: format!(
                "root bucket at level {} must have at least 2 entries, found {}",
                prefix.level,
                entries.len()
            ),
        });
    }
    Ok(())
}

fn validate_boundary_rule(prefix: Prefix, entries: &[Entry], is_head: bool) -> Result<()> {
    let Some((last, rest)) = entries.split_last() else {
        return Ok(());
    };
    for entry in rest {
        if is_boundary(prefix.average, prefix.level, entry)? {
            return Err(Error::InvalidBucket {
                reason: "a non-last entry must not be a boundary".to_string(),
            });
        }
    }
    if !is_head && !is_boundary(prefix.average, prefix.level, last)? {
        return Err(Error::InvalidBucket {
            reason: "the last entry must be a boundary unless the bucket is a level head"
                .to_string(),
        });
    }
    Ok(())
}

fn validate_range(
    entries: &[Entry],
    min_excl: Option<&[u8]>,
    max_incl: &[u8],
    is_head: bool,
) -> Result<()> {
    if let Some(first) = entries.first()
        && let Some(min) = min_excl
        && first.key.as_slice() <= min
    {
        return Err(Error::RangeMismatch {
            reason: "first entry does not exceed the exclusive lower bound".to_string(),
        });
    }
    if let Some(last) = entries.last()
        && !is_head
        && last.key.as_slice() != max_incl
    {
        return Err(Error::RangeMismatch {
            reason: "last entry does not equal the expected inclusive upper bound".to_string(),
        });
    }
    Ok(())
}
