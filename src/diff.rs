//! The diff engine: a recursive, digest-pruned comparison of two trees,
//! each potentially backed by a different block store.
//!
//! The source interleaves two cursors level by level, carrying an
//! "unequalize" phase to realign them when the two trees have grown to
//! different heights. This engine instead recurses bucket-pair by
//! bucket-pair: an identical digest on both sides prunes the whole
//! subtree; differing pointer-entry keys at the same position mean the two
//! sides partition that range differently, so the whole child subtree on
//! the narrower side is reported wholesale; and the moment either side of
//! a pair reaches level 0, the other side's remaining subtree is fully
//! walked and merged against it directly, so mismatched tree heights never
//! need special-casing (see `SPEC_FULL.md` §4.5/§9).

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::instrument;

use crate::bucket::{Bucket, Context};
use crate::diffs::{Diff, ProllyTreeDiff};
use crate::entry::{Digest, Entry};
use crate::error::Result;
use crate::store::BlockStore;
use crate::tree::Tree;

/// Compute the symmetric difference between `left` and `right`, each read
/// from its own store.
#[instrument(skip(left_store, right_store))]
pub fn diff(
    left_store: &impl BlockStore,
    left: &Tree,
    right_store: &impl BlockStore,
    right: &Tree,
) -> Result<ProllyTreeDiff> {
    let mut acc = ProllyTreeDiff::default();
    let mut visited = HashSet::new();
    diff_buckets(
        left_store,
        left.root(),
        right_store,
        right.root(),
        &mut acc,
        &mut visited,
    )?;
    Ok(acc)
}

fn diff_buckets(
    ls: &impl BlockStore,
    lb: &Bucket,
    rs: &impl BlockStore,
    rb: &Bucket,
    acc: &mut ProllyTreeDiff,
    visited: &mut HashSet<(Digest, Digest)>,
) -> Result<()> {
    if lb.digest() == rb.digest() {
        return Ok(());
    }
    if !visited.insert((lb.digest(), rb.digest())) {
        return Ok(());
    }

    // Any two buckets reaching this point differ, whether because their own
    // entries differ (a leaf) or because a descendant changed (an interior
    // bucket's encoded pointer entries change along with it). Either way the
    // old bucket is gone and a new one has taken its place.
    acc.buckets.push(Diff::Removed(lb.clone()));
    acc.buckets.push(Diff::Added(rb.clone()));

    match (lb.prefix().level == 0, rb.prefix().level == 0) {
        (true, true) => {
            merge_entry_diffs(lb.entries(), rb.entries(), acc);
        }
        (true, false) => {
            let right_entries = collect_all_entries(rs, rb)?;
            merge_entry_diffs(lb.entries(), &right_entries, acc);
            record_descendant_buckets(rs, rb, false, acc)?;
        }
        (false, true) => {
            let left_entries = collect_all_entries(ls, lb)?;
            merge_entry_diffs(&left_entries, rb.entries(), acc);
            record_descendant_buckets(ls, lb, true, acc)?;
        }
        (false, false) => diff_children(ls, lb, rs, rb, acc, visited)?,
    }
    Ok(())
}

/// Both buckets are interior (level > 0): merge their pointer entries by
/// key. A shared key with equal child digest is an identical subtree
/// (pruned); a shared key with different digests recurses; a key present
/// on only one side reports its entire child subtree as added or removed.
fn diff_children(
    ls: &impl BlockStore,
    lb: &Bucket,
    rs: &impl BlockStore,
    rb: &Bucket,
    acc: &mut ProllyTreeDiff,
    visited: &mut HashSet<(Digest, Digest)>,
) -> Result<()> {
    let (mut li, mut ri) = (0usize, 0usize);
    let l_entries = lb.entries();
    let r_entries = rb.entries();
    let l_child_prefix = lb.prefix().child();
    let r_child_prefix = rb.prefix().child();

    while li < l_entries.len() || ri < r_entries.len() {
        match (l_entries.get(li), r_entries.get(ri)) {
            (Some(le), Some(re)) => match le.key.cmp(&re.key) {
                Ordering::Less => {
                    emit_whole_subtree(ls, load_child(ls, le, l_child_prefix)?, true, acc)?;
                    li += 1;
                }
                Ordering::Greater => {
                    emit_whole_subtree(rs, load_child(rs, re, r_child_prefix)?, false, acc)?;
                    ri += 1;
                }
                Ordering::Equal => {
                    if le.val != re.val {
                        let lchild = load_child(ls, le, l_child_prefix)?;
                        let rchild = load_child(rs, re, r_child_prefix)?;
                        diff_buckets(ls, &lchild, rs, &rchild, acc, visited)?;
                    }
                    li += 1;
                    ri += 1;
                }
            },
            (Some(le), None) => {
                emit_whole_subtree(ls, load_child(ls, le, l_child_prefix)?, true, acc)?;
                li += 1;
            }
            (None, Some(re)) => {
                emit_whole_subtree(rs, load_child(rs, re, r_child_prefix)?, false, acc)?;
                ri += 1;
            }
            (None, None) => break,
        }
    }
    Ok(())
}

fn load_child(
    store: &impl BlockStore,
    pointer: &Entry,
    child_prefix: crate::entry::Prefix,
) -> Result<Bucket> {
    let bytes = store.get(pointer.child_digest()?)?;
    Bucket::load(&bytes, child_prefix, None, Context::root(), false)
}

/// Report an entire subtree as added (if it belongs to the right tree) or
/// removed (if it belongs to the left tree), recursing to leaf entries.
fn emit_whole_subtree(
    store: &impl BlockStore,
    bucket: Bucket,
    is_left: bool,
    acc: &mut ProllyTreeDiff,
) -> Result<()> {
    acc.buckets.push(if is_left {
        Diff::Removed(bucket.clone())
    } else {
        Diff::Added(bucket.clone())
    });
    if bucket.prefix().level == 0 {
        for entry in bucket.entries() {
            acc.entries.push(if is_left {
                Diff::Removed(entry.clone())
            } else {
                Diff::Added(entry.clone())
            });
        }
    } else {
        let child_prefix = bucket.prefix().child();
        for entry in bucket.entries() {
            let child = load_child(store, entry, child_prefix)?;
            emit_whole_subtree(store, child, is_left, acc)?;
        }
    }
    Ok(())
}

/// Two-pointer merge of sorted, deduplicated entries, reporting left-only
/// as removed, right-only as added, and same-key differing-value as
/// changed.
fn merge_entry_diffs(left: &[Entry], right: &[Entry], acc: &mut ProllyTreeDiff) {
    let (mut li, mut ri) = (0usize, 0usize);
    while li < left.len() && ri < right.len() {
        match left[li].key.cmp(&right[ri].key) {
            Ordering::Less => {
                acc.entries.push(Diff::Removed(left[li].clone()));
                li += 1;
            }
            Ordering::Greater => {
                acc.entries.push(Diff::Added(right[ri].clone()));
                ri += 1;
            }
            Ordering::Equal => {
                if left[li].val != right[ri].val {
                    acc.entries
                        .push(Diff::Changed(left[li].clone(), right[ri].clone()));
                }
                li += 1;
                ri += 1;
            }
        }
    }
    acc.entries
        .extend(left[li..].iter().cloned().map(Diff::Removed));
    acc.entries
        .extend(right[ri..].iter().cloned().map(Diff::Added));
}

/// Record every bucket below `bucket` (exclusive) as wholly `Added` or
/// `Removed`, without touching entry diffs — used when the other side of a
/// comparison bottomed out at level 0 and the entries were already reported
/// by a flat merge against `bucket`'s collected leaves. `bucket` itself is
/// assumed already recorded by the caller.
fn record_descendant_buckets(
    store: &impl BlockStore,
    bucket: &Bucket,
    is_left: bool,
    acc: &mut ProllyTreeDiff,
) -> Result<()> {
    if bucket.prefix().level == 0 {
        return Ok(());
    }
    let child_prefix = bucket.prefix().child();
    for entry in bucket.entries() {
        let child = load_child(store, entry, child_prefix)?;
        acc.buckets.push(if is_left {
            Diff::Removed(child.clone())
        } else {
            Diff::Added(child.clone())
        });
        record_descendant_buckets(store, &child, is_left, acc)?;
    }
    Ok(())
}

fn collect_all_entries(store: &impl BlockStore, bucket: &Bucket) -> Result<Vec<Entry>> {
    if bucket.prefix().level == 0 {
        return Ok(bucket.entries().to_vec());
    }
    let child_prefix = bucket.prefix().child();
    let mut out = Vec::new();
    for entry in bucket.entries() {
        let child = load_child(store, entry, child_prefix)?;
        out.extend(collect_all_entries(store, &child)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutate::mutate;
    use crate::store::MemoryBlockStore;
    use crate::tree::create_empty_tree;
    use crate::update::Update;

    fn tree_with(store: &MemoryBlockStore, keys: &[u8]) -> Tree {
        let empty = create_empty_tree(4).expect("empty tree");
        let updates = keys
            .iter()
            .map(|&k| Update::Insert {
                key: vec![k],
                val: vec![k],
            })
            .collect();
        let outcome = mutate(store, &empty, vec![updates]).expect("mutates");
        outcome.persist(store).expect("persists");
        outcome.into_tree()
    }

    #[test]
    fn identical_trees_have_no_diff() {
        let store = MemoryBlockStore::new();
        let tree = tree_with(&store, &[1, 2, 3, 4, 5]);
        let result = diff(&store, &tree, &store, &tree).expect("diffs");
        assert!(result.entries.is_empty());
        assert!(result.buckets.is_empty());
    }

    #[test]
    fn added_key_shows_up_as_added() {
        let store = MemoryBlockStore::new();
        let left = tree_with(&store, &[1, 2, 3]);
        let right = tree_with(&store, &[1, 2, 3, 4]);
        let result = diff(&store, &left, &store, &right).expect("diffs");
        assert_eq!(
            result.entries,
            vec![Diff::Added(Entry::new(vec![4], vec![4]))]
        );
    }

    #[test]
    fn changed_value_shows_up_as_changed() {
        let left_store = MemoryBlockStore::new();
        let left = tree_with(&left_store, &[1, 2, 3]);
        let right_store = MemoryBlockStore::new();
        let right_base = tree_with(&right_store, &[1, 2, 3]);
        let outcome = mutate(
            &right_store,
            &right_base,
            vec![vec![Update::Insert {
                key: vec![2],
                val: vec![99],
            }]],
        )
        .expect("mutates");
        outcome.persist(&right_store).expect("persists");
        let right = outcome.into_tree();

        let result = diff(&left_store, &left, &right_store, &right).expect("diffs");
        assert_eq!(result.entries.len(), 1);
        assert!(matches!(result.entries[0], Diff::Changed(_, _)));
    }

    #[test]
    fn removed_key_shows_up_as_removed() {
        let store = MemoryBlockStore::new();
        let left = tree_with(&store, &[1, 2, 3, 4]);
        let right = tree_with(&store, &[1, 2, 3]);
        let result = diff(&store, &left, &store, &right).expect("diffs");
        assert_eq!(
            result.entries,
            vec![Diff::Removed(Entry::new(vec![4], vec![4]))]
        );
    }

    #[test]
    fn diffing_against_an_empty_tree_reports_every_entry_as_added() {
        let store = MemoryBlockStore::new();
        let left = create_empty_tree(4).expect("empty tree");
        let right = tree_with(&store, &[1, 2, 3]);
        let result = diff(&store, &left, &store, &right).expect("diffs");
        assert_eq!(result.entries.len(), 3);
        assert!(result.entries.iter().all(|d| matches!(d, Diff::Added(_))));
    }

    #[test]
    fn diff_is_empty_between_two_independently_built_identical_trees() {
        let left_store = MemoryBlockStore::new();
        let left = tree_with(&left_store, &[10, 20, 30, 40, 50, 60]);
        let right_store = MemoryBlockStore::new();
        let right = tree_with(&right_store, &[10, 20, 30, 40, 50, 60]);
        let result = diff(&left_store, &left, &right_store, &right).expect("diffs");
        assert!(result.is_empty());
    }
}
