//! The tree handle: a single content-addressed root bucket plus the
//! configuration that was baked into it.

use tracing::instrument;

use crate::bucket::Bucket;
use crate::config::TreeConfig;
use crate::entry::{Digest, Prefix};
use crate::error::Result;
use crate::store::BlockStore;

/// A prolly tree: nothing but a pointer to its root bucket. Everything else
/// (levels, entries, shape) is reachable by walking from `root` through a
/// [`BlockStore`].
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) root: Bucket,
}

impl Tree {
    /// The tree's root digest, its stable external identity.
    #[must_use]
    pub fn root_digest(&self) -> Digest {
        self.root.digest()
    }

    /// The root bucket's level (tree height).
    #[must_use]
    pub fn height(&self) -> u32 {
        self.root.prefix().level
    }

    #[must_use]
    pub fn average(&self) -> u32 {
        self.root.prefix().average
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    #[must_use]
    pub const fn root(&self) -> &Bucket {
        &self.root
    }
}

/// Create a fresh, empty tree for the given `average`. Corresponds to the
/// zero-entry root bucket described in §3's empty-tree special case.
#[instrument]
pub fn create_empty_tree(average: u32) -> Result<Tree> {
    let config = TreeConfig::new(average)?;
    let root = Bucket::new(Prefix::new(config.average, 0), vec![], true)?;
    Ok(Tree { root })
}

/// Load a tree by fetching and validating its root bucket from `store`.
#[instrument(skip(store))]
pub fn load_tree(store: &impl BlockStore, root_digest: Digest, average: u32) -> Result<Tree> {
    let bytes = store.get(root_digest)?;
    let (prefix, _) = crate::codec::decode(&bytes)?;
    let root = Bucket::load(
        &bytes,
        Prefix::new(average, prefix.level),
        None,
        crate::bucket::Context::root(),
        true,
    )?;
    Ok(Tree { root })
}
