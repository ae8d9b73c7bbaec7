//! The block store abstraction: a trivial `get(digest) -> bytes` /
//! `put(digest, bytes) -> ok` interface. Out of scope per `SPEC_FULL.md` §1
//! as a concrete implementation, but the trait itself and a reference
//! in-memory implementation live here since nothing else in the crate is
//! testable without one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::instrument;

use crate::entry::Digest;
use crate::error::{Error, Result};

/// Fetch and persist content-addressed byte blocks.
pub trait BlockStore {
    /// Fetch the bytes for `digest`. Returns [`Error::NotFound`] on a miss.
    fn get(&self, digest: Digest) -> Result<Vec<u8>>;

    /// Persist `bytes` under `digest`. Writes are idempotent: buckets are
    /// content-addressed, so writing the same digest twice is a no-op from
    /// the caller's perspective.
    fn put(&self, digest: Digest, bytes: Vec<u8>) -> Result<()>;
}

/// A reference in-memory [`BlockStore`], safe to share across threads.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlockStore {
    blocks: Arc<Mutex<HashMap<Digest, Vec<u8>>>>,
}

impl MemoryBlockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryBlockStore {
    #[instrument(skip(self))]
    fn get(&self, digest: Digest) -> Result<Vec<u8>> {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&digest)
            .cloned()
            .ok_or(Error::NotFound {
                digest: digest.to_hex(),
            })
    }

    #[instrument(skip(self, bytes))]
    fn put(&self, digest: Digest, bytes: Vec<u8>) -> Result<()> {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(digest, bytes);
        Ok(())
    }
}

impl<T: BlockStore + ?Sized> BlockStore for &T {
    fn get(&self, digest: Digest) -> Result<Vec<u8>> {
        (**self).get(digest)
    }

    fn put(&self, digest: Digest, bytes: Vec<u8>) -> Result<()> {
        (**self).put(digest, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_digest_is_not_found() {
        let store = MemoryBlockStore::new();
        let digest = Digest::of(b"nope");
        assert!(matches!(store.get(digest), Err(Error::NotFound { .. })));
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryBlockStore::new();
        let digest = Digest::of(b"payload");
        store.put(digest, b"payload".to_vec()).expect("put succeeds");
        assert_eq!(store.get(digest).expect("get succeeds"), b"payload".to_vec());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_is_idempotent() {
        let store = MemoryBlockStore::new();
        let digest = Digest::of(b"payload");
        store.put(digest, b"payload".to_vec()).expect("put succeeds");
        store.put(digest, b"payload".to_vec()).expect("put succeeds");
        assert_eq!(store.len(), 1);
    }
}
