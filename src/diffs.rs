//! Diff output types, replacing the source's `(old | null, new | null)`
//! sentinel tuples with a tagged sum (see `SPEC_FULL.md` §9).

use crate::bucket::Bucket;
use crate::entry::Entry;

/// A single difference between two trees. For entries, all three variants
/// are possible. For buckets, content addressing makes `Changed`
/// unreachable — any change to a bucket's contents produces a new digest,
/// hence a new bucket — so bucket diffs only ever use `Added`/`Removed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff<T> {
    Added(T),
    Removed(T),
    Changed(T, T),
}

pub type EntryDiff = Diff<Entry>;
pub type BucketDiff = Diff<Bucket>;

/// The combined output of one mutation level or of a full tree diff.
#[derive(Debug, Clone, Default)]
pub struct ProllyTreeDiff {
    pub entries: Vec<EntryDiff>,
    pub buckets: Vec<BucketDiff>,
}

impl ProllyTreeDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.buckets.is_empty()
    }

    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
        self.buckets.extend(other.buckets);
    }
}
