//! The mutation engine: applies sorted update batches to a tree's level-0
//! entries and rebuilds every affected level from scratch.
//!
//! The source algorithm carries leftover entries across incremental cursor
//! steps, touching only the buckets on the path of each changed key. This
//! engine instead fully materializes level 0, applies every batch, and
//! re-chunks bottom-up — asymptotically worse, but its correctness follows
//! directly from the boundary predicate and needs no incremental
//! bookkeeping to get right (see `SPEC_FULL.md` §4.4/§9).

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::instrument;

use crate::boundary::is_boundary;
use crate::bucket::{Bucket, Context};
use crate::config::MAX_LEVEL;
use crate::diffs::{Diff, EntryDiff, ProllyTreeDiff};
use crate::entry::{Digest, Entry, Prefix};
use crate::error::{Error, Result};
use crate::store::BlockStore;
use crate::tree::Tree;
use crate::update::{validate_sorted, Update};

/// The result of a [`mutate`] call: a new root plus the information needed
/// to persist it and to inspect what changed.
pub struct MutationOutcome {
    root: Bucket,
    new_blocks: Vec<(Digest, Vec<u8>)>,
    diffs: Vec<ProllyTreeDiff>,
}

impl MutationOutcome {
    /// The new tree's root digest, without committing.
    #[must_use]
    pub fn root_digest(&self) -> Digest {
        self.root.digest()
    }

    /// Per-level diffs, level 0 first. Level 0 carries both entry and bucket
    /// diffs; every other level carries bucket diffs only.
    #[must_use]
    pub fn diffs(&self) -> &[ProllyTreeDiff] {
        &self.diffs
    }

    /// Consume the outcome's diffs as an iterator, level 0 first. The
    /// batches are computed eagerly up front; this just hands them out one
    /// at a time for callers that want to process a mutation's effects
    /// level by level.
    pub fn into_diffs(self) -> std::vec::IntoIter<ProllyTreeDiff> {
        self.diffs.into_iter()
    }

    /// Write every newly created bucket to `store`. Block puts are
    /// idempotent, so this is safe to call more than once.
    pub fn persist(&self, store: &impl BlockStore) -> Result<()> {
        for (digest, bytes) in &self.new_blocks {
            store.put(*digest, bytes.clone())?;
        }
        Ok(())
    }

    /// Consume the outcome, producing the tree with the new root. Callers
    /// should [`Self::persist`] first, or the new tree's buckets will be
    /// unreadable from `store`.
    #[must_use]
    pub fn into_tree(self) -> Tree {
        Tree { root: self.root }
    }
}

/// Apply `batches` of updates, in order, to `tree`'s level-0 entries, and
/// rebuild every level above. Each batch must be sorted and deduplicated by
/// key ([`validate_sorted`]); batches are applied sequentially, so the same
/// key may be touched by more than one batch.
#[instrument(skip(store, batches))]
pub fn mutate(
    store: &impl BlockStore,
    tree: &Tree,
    batches: Vec<Vec<Update>>,
) -> Result<MutationOutcome> {
    let average = tree.average();
    let old_entries = collect_entries(store, tree.root())?;
    let old_levels = collect_buckets_by_level(store, tree.root())?;

    let mut entries = old_entries.clone();
    for batch in &batches {
        validate_sorted(batch)?;
        entries = apply_batch(entries, batch);
    }

    let new_levels = build_levels(average, entries.clone())?;
    let root = new_levels
        .last()
        .and_then(|level| level.first())
        .expect("build_levels always produces a single-bucket top level")
        .clone();

    let level_count = old_levels.len().max(new_levels.len());
    let mut diffs = Vec::with_capacity(level_count);
    for level in 0..level_count {
        let old_buckets = old_levels.get(level).map_or(&[][..], Vec::as_slice);
        let new_buckets = new_levels.get(level).map_or(&[][..], Vec::as_slice);
        let old_digests: HashSet<Digest> = old_buckets.iter().map(Bucket::digest).collect();
        let new_digests: HashSet<Digest> = new_buckets.iter().map(Bucket::digest).collect();

        let mut diff = ProllyTreeDiff::default();
        for bucket in old_buckets {
            if !new_digests.contains(&bucket.digest()) {
                diff.buckets.push(Diff::Removed(bucket.clone()));
            }
        }
        for bucket in new_buckets {
            if !old_digests.contains(&bucket.digest()) {
                diff.buckets.push(Diff::Added(bucket.clone()));
            }
        }
        if level == 0 {
            diff.entries = diff_entries(&old_entries, &entries);
        }
        diffs.push(diff);
    }

    let new_blocks = new_levels
        .iter()
        .flatten()
        .map(|bucket| (bucket.digest(), bucket.bytes().to_vec()))
        .collect();

    Ok(MutationOutcome {
        root,
        new_blocks,
        diffs,
    })
}

/// Merge-walk `entries` (sorted by key) against one sorted, deduplicated
/// `batch`, applying each update in key order.
fn apply_batch(entries: Vec<Entry>, batch: &[Update]) -> Vec<Entry> {
    let mut result = Vec::with_capacity(entries.len() + batch.len());
    let mut entries = entries.into_iter().peekable();
    let mut updates = batch.iter().peekable();

    loop {
        match (entries.peek(), updates.peek()) {
            (None, None) => break,
            (Some(_), None) => result.push(entries.next().expect("peeked Some")),
            (None, Some(_)) => {
                if let Update::Insert { key, val } = updates.next().expect("peeked Some") {
                    result.push(Entry::new(key.clone(), val.clone()));
                }
            }
            (Some(entry), Some(update)) => match entry.key.as_slice().cmp(update.key()) {
                Ordering::Less => result.push(entries.next().expect("peeked Some")),
                Ordering::Greater => {
                    if let Update::Insert { key, val } = updates.next().expect("peeked Some") {
                        result.push(Entry::new(key.clone(), val.clone()));
                    }
                }
                Ordering::Equal => {
                    let entry = entries.next().expect("peeked Some");
                    match updates.next().expect("peeked Some") {
                        Update::Insert { key, val } => {
                            result.push(Entry::new(key.clone(), val.clone()));
                        }
                        Update::Remove { .. } => {}
                        Update::StrictRemove { val, .. } => {
                            if &entry.val != val {
                                result.push(entry);
                            }
                        }
                    }
                }
            },
        }
    }
    result
}

fn diff_entries(old: &[Entry], new: &[Entry]) -> Vec<EntryDiff> {
    let mut out = Vec::new();
    let mut oi = 0usize;
    let mut ni = 0usize;
    while oi < old.len() && ni < new.len() {
        match old[oi].key.cmp(&new[ni].key) {
            Ordering::Less => {
                out.push(Diff::Removed(old[oi].clone()));
                oi += 1;
            }
            Ordering::Greater => {
                out.push(Diff::Added(new[ni].clone()));
                ni += 1;
            }
            Ordering::Equal => {
                if old[oi].val != new[ni].val {
                    out.push(Diff::Changed(old[oi].clone(), new[ni].clone()));
                }
                oi += 1;
                ni += 1;
            }
        }
    }
    out.extend(old[oi..].iter().cloned().map(Diff::Removed));
    out.extend(new[ni..].iter().cloned().map(Diff::Added));
    out
}

/// Chunk sorted, deduplicated `entries` via the boundary predicate, then
/// recursively build parent levels from pointer entries until a single
/// bucket remains.
fn build_levels(average: u32, entries: Vec<Entry>) -> Result<Vec<Vec<Bucket>>> {
    if entries.is_empty() {
        let root = Bucket::new(Prefix::new(average, 0), vec![], true)?;
        return Ok(vec![vec![root]]);
    }

    let mut levels = Vec::new();
    let mut current = entries;
    let mut level = 0u32;
    loop {
        if level > MAX_LEVEL {
            return Err(Error::MaxLevelExceeded {
                max_level: MAX_LEVEL,
            });
        }
        let chunks = chunk_entries(average, level, &current)?;
        let is_root = chunks.len() == 1;
        let prefix = Prefix::new(average, level);
        let buckets: Vec<Bucket> = chunks
            .into_iter()
            .map(|chunk| {
                if is_root {
                    Bucket::new(prefix, chunk, true)
                } else {
                    Bucket::new_unchecked(prefix, chunk)
                }
            })
            .collect::<Result<_>>()?;

        if is_root {
            levels.push(buckets);
            break;
        }

        current = buckets
            .iter()
            .map(|bucket| {
                let last_key = bucket
                    .last_key()
                    .expect("every chunk produced by chunk_entries is non-empty");
                Entry::pointer(last_key.to_vec(), bucket.digest())
            })
            .collect();
        levels.push(buckets);
        level += 1;
    }
    Ok(levels)
}

fn chunk_entries(average: u32, level: u32, entries: &[Entry]) -> Result<Vec<Vec<Entry>>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for entry in entries {
        current.push(entry.clone());
        if is_boundary(average, level, entry)? {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

/// Walk every level-0 bucket reachable from `bucket` and concatenate their
/// entries in key order.
fn collect_entries(store: &impl BlockStore, bucket: &Bucket) -> Result<Vec<Entry>> {
    if bucket.prefix().level == 0 {
        return Ok(bucket.entries().to_vec());
    }
    let mut out = Vec::new();
    let child_prefix = bucket.prefix().child();
    for entry in bucket.entries() {
        let bytes = store.get(entry.child_digest()?)?;
        let child = Bucket::load(&bytes, child_prefix, None, Context::root(), false)?;
        out.extend(collect_entries(store, &child)?);
    }
    Ok(out)
}

/// Walk every bucket reachable from `root`, grouped by level and
/// deduplicated by digest (shared subtrees are visited once).
fn collect_buckets_by_level(store: &impl BlockStore, root: &Bucket) -> Result<Vec<Vec<Bucket>>> {
    let mut levels: Vec<Vec<Bucket>> = Vec::new();
    let mut seen: Vec<HashSet<Digest>> = Vec::new();
    walk_buckets(store, root, &mut levels, &mut seen)?;
    Ok(levels)
}

fn walk_buckets(
    store: &impl BlockStore,
    bucket: &Bucket,
    levels: &mut Vec<Vec<Bucket>>,
    seen: &mut Vec<HashSet<Digest>>,
) -> Result<()> {
    let level = bucket.prefix().level as usize;
    if levels.len() <= level {
        levels.resize_with(level + 1, Vec::new);
        seen.resize_with(level + 1, HashSet::new);
    }
    if !seen[level].insert(bucket.digest()) {
        return Ok(());
    }
    levels[level].push(bucket.clone());
    if bucket.prefix().level > 0 {
        let child_prefix = bucket.prefix().child();
        for entry in bucket.entries() {
            let bytes = store.get(entry.child_digest()?)?;
            let child = Bucket::load(&bytes, child_prefix, None, Context::root(), false)?;
            walk_buckets(store, &child, levels, seen)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlockStore;
    use crate::tree::{create_empty_tree, load_tree};

    fn inserts(keys: &[u8]) -> Vec<Update> {
        keys.iter()
            .map(|&k| Update::Insert {
                key: vec![k],
                val: vec![k],
            })
            .collect()
    }

    #[test]
    fn mutating_an_empty_tree_inserts_everything() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(&store, &tree, vec![inserts(&[1, 2, 3, 4, 5])]).expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();
        assert!(!tree.is_empty());

        let entries = collect_entries(&store, tree.root()).expect("walk succeeds");
        assert_eq!(entries.len(), 5);
        assert!(entries.windows(2).all(|w| w[0].key < w[1].key));
    }

    #[test]
    fn second_batch_sees_first_batchs_effects() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(
            &store,
            &tree,
            vec![inserts(&[1, 2, 3]), vec![Update::Remove { key: vec![2] }]],
        )
        .expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();
        let entries = collect_entries(&store, tree.root()).expect("walk succeeds");
        assert_eq!(entries.iter().map(|e| e.key.clone()).collect::<Vec<_>>(), vec![vec![1], vec![3]]);
    }

    #[test]
    fn strict_remove_is_a_no_op_on_value_mismatch() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(&store, &tree, vec![inserts(&[1])]).expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();

        let outcome = mutate(
            &store,
            &tree,
            vec![vec![Update::StrictRemove {
                key: vec![1],
                val: vec![99],
            }]],
        )
        .expect("mutates");
        assert!(outcome.diffs()[0].entries.is_empty());
        assert_eq!(outcome.root_digest(), tree.root_digest());
    }

    #[test]
    fn identical_batch_produces_no_entry_diff() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(&store, &tree, vec![inserts(&[1, 2, 3])]).expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();

        let outcome = mutate(
            &store,
            &tree,
            vec![vec![Update::Insert {
                key: vec![2],
                val: vec![2],
            }]],
        )
        .expect("mutates");
        assert!(outcome.diffs()[0].entries.is_empty());
        assert_eq!(outcome.root_digest(), tree.root_digest());
    }

    #[test]
    fn removing_every_key_empties_the_tree() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(&store, &tree, vec![inserts(&[1, 2, 3])]).expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();

        let removals = vec![
            Update::Remove { key: vec![1] },
            Update::Remove { key: vec![2] },
            Update::Remove { key: vec![3] },
        ];
        let outcome = mutate(&store, &tree, vec![removals]).expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();
        assert!(tree.is_empty());
    }

    #[test]
    fn persisted_root_is_loadable() {
        let store = MemoryBlockStore::new();
        let tree = create_empty_tree(4).expect("empty tree");
        let outcome = mutate(&store, &tree, vec![inserts(&[1, 2, 3, 4, 5, 6, 7, 8])])
            .expect("mutates");
        outcome.persist(&store).expect("persists");
        let tree = outcome.into_tree();
        let loaded =
            load_tree(&store, tree.root_digest(), tree.average()).expect("loads");
        assert_eq!(loaded.root_digest(), tree.root_digest());
    }
}
