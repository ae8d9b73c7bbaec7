//! The cursor: an ordered-traversal state machine over a content-addressed
//! DAG, supporting level-wise advancement, jumps, and (defensively) locking.
//! See `SPEC_FULL.md` §4.3.

use tracing::instrument;

use crate::bucket::{Bucket, Context};
use crate::entry::{Entry, Prefix};
use crate::error::{Error, Result};
use crate::store::BlockStore;
use crate::tree::Tree;

struct PathEntry {
    bucket: Bucket,
    context: Context,
}

/// A stateful traversal object over one tree.
///
/// Locking discipline is enforced by the borrow checker rather than at
/// runtime: every mutating operation takes `&mut self`, so two mutating
/// calls can never run concurrently on the same cursor through the safe
/// API. The `locked` flag and [`Error::CursorLocked`] remain as a defensive
/// re-entrancy guard (see `SPEC_FULL.md` §4.3/§9).
pub struct Cursor<'s, S: BlockStore> {
    store: &'s S,
    average: u32,
    path: Vec<PathEntry>,
    current_index: usize,
    done: bool,
    locked: bool,
}

impl<'s, S: BlockStore> Cursor<'s, S> {
    /// Position a fresh cursor at the root of `tree`.
    pub fn at_root(store: &'s S, tree: &Tree) -> Self {
        let root = tree.root.clone().with_context(Context::root());
        let is_empty = root.is_empty();
        Self {
            store,
            average: root.prefix().average,
            path: vec![PathEntry {
                bucket: root,
                context: Context::root(),
            }],
            current_index: 0,
            done: is_empty,
            locked: false,
        }
    }

    fn begin_op(&mut self) -> Result<()> {
        if self.locked {
            return Err(Error::CursorLocked);
        }
        self.locked = true;
        Ok(())
    }

    fn end_op(&mut self) {
        self.locked = false;
    }

    #[must_use]
    pub fn locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.done
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.path.last().map_or(0, |p| p.bucket.prefix().level)
    }

    #[must_use]
    pub fn root_level(&self) -> u32 {
        self.path.first().map_or(0, |p| p.bucket.prefix().level)
    }

    #[must_use]
    pub fn current_bucket(&self) -> &Bucket {
        &self
            .path
            .last()
            .expect("cursor path is never empty")
            .bucket
    }

    pub fn current_entry(&self) -> Result<&Entry> {
        self.current_bucket()
            .entries()
            .get(self.current_index)
            .ok_or(Error::EmptyCursor)
    }

    /// The path from root to current bucket, inclusive.
    pub fn buckets(&self) -> Vec<&Bucket> {
        self.path.iter().map(|p| &p.bucket).collect()
    }

    /// Whether the current path is the leftmost bucket on every level.
    #[must_use]
    pub fn is_at_tail(&self) -> bool {
        self.path.iter().all(|p| p.context.is_tail)
    }

    /// Whether the current path is the rightmost bucket on every level.
    #[must_use]
    pub fn is_at_head(&self) -> bool {
        self.path.iter().all(|p| p.context.is_head)
    }

    /// The `[min_excl, max_incl]` range covering every descendant of the
    /// current path: the parent's previous sibling's key (or none) and the
    /// current entry's key.
    pub fn key_range(&self) -> Result<(Option<Vec<u8>>, Vec<u8>)> {
        let bucket = self.current_bucket();
        let entry = self.current_entry()?;
        let min_excl = if self.current_index == 0 {
            None
        } else {
            bucket
                .entries()
                .get(self.current_index - 1)
                .map(|e| e.key.clone())
        };
        Ok((min_excl, entry.key.clone()))
    }

    /// Reset the path from root and descend to the entry covering `key` at
    /// `level`. The only cursor operation that may move backward.
    #[instrument(skip(self, key))]
    pub fn jump_to(&mut self, key: &[u8], level: u32) -> Result<()> {
        self.begin_op()?;
        let result = self.jump_to_inner(key, level);
        self.end_op();
        result
    }

    fn jump_to_inner(&mut self, key: &[u8], level: u32) -> Result<()> {
        let root_level = self.root_level();
        if level > root_level {
            return Err(Error::LevelOutOfRange {
                requested: level,
                root_level,
            });
        }
        self.path.truncate(1);
        self.path[0].context = Context::root();
        self.done = self.path[0].bucket.is_empty();
        self.current_index = find_index_for_key(&self.path[0].bucket, key);
        while !self.done && self.level() > level {
            self.descend(Some(key))?;
        }
        Ok(())
    }

    /// Advance one entry at `level` (default: the current level).
    #[instrument(skip(self))]
    pub fn next(&mut self, level: Option<u32>) -> Result<()> {
        self.begin_op()?;
        let result = self.advance(level, None);
        self.end_op();
        result
    }

    /// Advance to the first entry of the next bucket at `level`.
    #[instrument(skip(self))]
    pub fn next_bucket(&mut self, level: Option<u32>) -> Result<()> {
        self.begin_op()?;
        let result = self.advance_bucket(level);
        self.end_op();
        result
    }

    /// Advance to the first entry `>= key` at `level`; monotone.
    #[instrument(skip(self, key))]
    pub fn next_key(&mut self, key: &[u8], level: Option<u32>) -> Result<()> {
        self.begin_op()?;
        let result = self.advance(level, Some(key));
        self.end_op();
        result
    }

    fn advance_bucket(&mut self, level: Option<u32>) -> Result<()> {
        let target_level = level.unwrap_or_else(|| self.level());
        let root_level = self.root_level();
        if target_level > root_level {
            return Err(Error::LevelOutOfRange {
                requested: target_level,
                root_level,
            });
        }
        if target_level >= root_level {
            self.done = true;
            return Ok(());
        }
        self.advance(Some(target_level + 1), None)?;
        if self.done {
            return Ok(());
        }
        while self.level() > target_level {
            self.descend(None)?;
        }
        Ok(())
    }

    fn advance(&mut self, level: Option<u32>, target_key: Option<&[u8]>) -> Result<()> {
        let target_level = level.unwrap_or_else(|| self.level());
        let root_level = self.root_level();
        if target_level > root_level {
            return Err(Error::LevelOutOfRange {
                requested: target_level,
                root_level,
            });
        }
        if self.done {
            return Ok(());
        }
        self.align_to_level(target_level)?;

        loop {
            let overflow = match target_key {
                Some(key) => self.current_bucket().last_key().is_none_or(|k| k < key),
                None => self.current_index + 1 >= self.current_bucket().entries().len(),
            };
            if !overflow {
                break;
            }
            if self.level() >= root_level {
                self.done = true;
                return Ok(());
            }
            self.ascend_one()?;
        }

        match target_key {
            Some(key) => {
                self.current_index = find_index_for_key(self.current_bucket(), key);
            }
            None => {
                self.current_index += 1;
            }
        }

        while self.level() > target_level {
            self.descend(target_key)?;
        }
        Ok(())
    }

    /// Ascend to `level`, then descend back down to the original level if
    /// `level` was above it, using the default guide (first entry ≥ the
    /// prior key, else last) at the ascended level, and index 0 at each
    /// re-descended level.
    fn align_to_level(&mut self, level: u32) -> Result<()> {
        let current = self.level();
        if level > current {
            let guide = self.current_entry()?.key.clone();
            while self.level() < level {
                self.ascend_to_guide(&guide)?;
            }
        } else {
            while self.level() > level {
                self.descend(None)?;
            }
        }
        Ok(())
    }

    fn ascend_one(&mut self) -> Result<()> {
        let guide = self.current_entry()?.key.clone();
        self.ascend_to_guide(&guide)
    }

    fn ascend_to_guide(&mut self, guide: &[u8]) -> Result<()> {
        if self.path.len() <= 1 {
            return Err(Error::LevelOutOfRange {
                requested: self.level() + 1,
                root_level: self.root_level(),
            });
        }
        self.path.pop();
        self.current_index = find_index_for_key(self.current_bucket(), guide);
        Ok(())
    }

    /// Descend one level, following the digest in the current entry's
    /// `val`. If `target_key` is given, the new index is chosen by binary
    /// search (targeted descent); otherwise it defaults to 0 (descending
    /// after an ascend).
    fn descend(&mut self, target_key: Option<&[u8]>) -> Result<()> {
        let entry = self.current_entry()?.clone();
        let parent_context = self
            .path
            .last()
            .expect("cursor path is never empty")
            .context;
        let idx = self.current_index;
        let parent_bucket_level = self.current_bucket().prefix().level;
        let min_excl = if idx == 0 {
            None
        } else {
            self.current_bucket()
                .entries()
                .get(idx - 1)
                .map(|e| e.key.as_slice())
        };
        let max_incl = entry.key.as_slice();
        let is_tail = idx == 0 && parent_context.is_tail;
        let is_head = idx + 1 == self.current_bucket().entries().len() && parent_context.is_head;
        let expected_prefix = Prefix::new(self.average, parent_bucket_level.saturating_sub(1));
        let digest = entry.child_digest()?;
        let bytes = self.store.get(digest)?;
        let bucket = Bucket::load(
            &bytes,
            expected_prefix,
            Some((min_excl, max_incl)),
            Context { is_tail, is_head },
            false,
        )?;
        self.current_index = target_key.map_or(0, |key| find_index_for_key(&bucket, key));
        self.path.push(PathEntry {
            bucket,
            context: Context { is_tail, is_head },
        });
        Ok(())
    }
}

/// First index whose entry's key is `>= key`, clamped to the last index if
/// every entry's key is smaller (or the bucket is empty, in which case 0).
fn find_index_for_key(bucket: &Bucket, key: &[u8]) -> usize {
    let entries = bucket.entries();
    if entries.is_empty() {
        return 0;
    }
    let idx = entries.partition_point(|e| e.key.as_slice() < key);
    idx.min(entries.len() - 1)
}
