//! The public operations built atop the cursor, mutation, and diff engines:
//! point search, range scan, three-way merge, and store-to-store sync.
//! See `SPEC_FULL.md` §4.6.

use tracing::instrument;

use crate::cursor::Cursor;
use crate::diff::diff;
use crate::diffs::Diff;
use crate::entry::Entry;
use crate::error::Result;
use crate::mutate::{mutate, MutationOutcome};
use crate::store::BlockStore;
use crate::tree::Tree;
use crate::update::Update;

/// Look up each of `keys` in `tree`, in the order given. `None` where the
/// key is absent.
#[instrument(skip(store, tree, keys))]
pub fn search(
    store: &impl BlockStore,
    tree: &Tree,
    keys: &[Vec<u8>],
) -> Result<Vec<Option<Entry>>> {
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        if tree.is_empty() {
            out.push(None);
            continue;
        }
        let mut cursor = Cursor::at_root(store, tree);
        cursor.jump_to(key, 0)?;
        if cursor.done() {
            out.push(None);
            continue;
        }
        let entry = cursor.current_entry()?;
        out.push((entry.key == *key).then(|| entry.clone()));
    }
    Ok(out)
}

/// Collect every entry with `min_key < key <= max_key` (either bound may be
/// omitted for an open range).
#[instrument(skip(store, tree))]
pub fn range(
    store: &impl BlockStore,
    tree: &Tree,
    min_key: Option<&[u8]>,
    max_key: Option<&[u8]>,
) -> Result<Vec<Entry>> {
    if tree.is_empty() {
        return Ok(Vec::new());
    }
    let mut cursor = Cursor::at_root(store, tree);
    cursor.jump_to(min_key.unwrap_or(&[]), 0)?;

    let mut out = Vec::new();
    while !cursor.done() {
        let entry = cursor.current_entry()?.clone();
        if let Some(min) = min_key {
            if entry.key.as_slice() <= min {
                cursor.next(None)?;
                continue;
            }
        }
        if let Some(max) = max_key {
            if entry.key.as_slice() > max {
                break;
            }
        }
        out.push(entry);
        cursor.next(None)?;
    }
    Ok(out)
}

/// Three-way-free merge: every entry present only in `remote` is inserted
/// into `local`; every entry present only in `local` is left untouched;
/// entries present in both with different values are resolved by `choose`.
/// Produces a [`MutationOutcome`] the caller still needs to persist and
/// commit, exactly like [`mutate`].
#[instrument(skip(local_store, local, remote_store, remote, choose))]
pub fn merge(
    local_store: &impl BlockStore,
    local: &Tree,
    remote_store: &impl BlockStore,
    remote: &Tree,
    choose: impl Fn(&Entry, &Entry) -> Entry,
) -> Result<MutationOutcome> {
    let changes = diff(local_store, local, remote_store, remote)?;
    let mut updates: Vec<Update> = changes
        .entries
        .into_iter()
        .filter_map(|entry_diff| match entry_diff {
            Diff::Added(remote_only) => Some(Update::Insert {
                key: remote_only.key,
                val: remote_only.val,
            }),
            Diff::Removed(_) => None,
            Diff::Changed(local_entry, remote_entry) => {
                let chosen = choose(&local_entry, &remote_entry);
                Some(Update::Insert {
                    key: chosen.key,
                    val: chosen.val,
                })
            }
        })
        .collect();
    updates.sort_by(|a, b| a.key().cmp(b.key()));
    mutate(local_store, local, vec![updates])
}

/// Diff `target` against `remote`; copy every bucket the diff reports as
/// added (i.e. only on `remote`'s side) from `remote_store` into
/// `local_store`; then hand back a tree pointed at `remote`'s root. Relies
/// on content addressing: the diff already prunes identical subtrees, so
/// only the genuinely new buckets get copied.
#[instrument(skip(local_store, target, remote, remote_store))]
pub fn sync(
    local_store: &impl BlockStore,
    target: &Tree,
    remote: &Tree,
    remote_store: &impl BlockStore,
) -> Result<Tree> {
    let changes = diff(local_store, target, remote_store, remote)?;
    for bucket_diff in changes.buckets {
        if let Diff::Added(bucket) = bucket_diff {
            local_store.put(bucket.digest(), bucket.bytes().to_vec())?;
        }
    }
    // The diff only records a bucket pair when it differs from its
    // counterpart; an unchanged root (target already equals remote) is
    // never visited, so make sure it ends up in `local_store` regardless.
    local_store.put(remote.root_digest(), remote.root().bytes().to_vec())?;
    Ok(Tree {
        root: remote.root().clone(),
    })
}
