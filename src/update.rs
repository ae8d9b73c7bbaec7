//! The `Update` tagged sum, replacing the source's duck-typed
//! `Tuple | Entry | StrictEntry` update shapes (see `SPEC_FULL.md` §9).

/// One instruction to apply to a tree's level-0 entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Insert a new key, or overwrite its value if already present.
    Insert { key: Vec<u8>, val: Vec<u8> },
    /// Remove `key` unconditionally, if present.
    Remove { key: Vec<u8> },
    /// Remove `key` only if its stored value equals `val`; otherwise a no-op.
    StrictRemove { key: Vec<u8>, val: Vec<u8> },
}

impl Update {
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Insert { key, .. } | Self::Remove { key } | Self::StrictRemove { key, .. } => {
                key
            }
        }
    }
}

/// Validate that `updates` is strictly increasing by key (no duplicates),
/// per §4.4's requirement that batches be sorted and deduplicated.
pub fn validate_sorted(updates: &[Update]) -> crate::error::Result<()> {
    for pair in updates.windows(2) {
        if pair[0].key() >= pair[1].key() {
            return Err(crate::error::Error::UnsortedUpdates {
                reason: "updates must be strictly increasing by key, with no duplicate keys"
                    .to_string(),
            });
        }
    }
    Ok(())
}
