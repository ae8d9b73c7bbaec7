#![forbid(unsafe_code)]
//! A probabilistic, content-addressed, history-independent ordered
//! key-value index: a prolly tree.
//!
//! A tree is nothing but a digest pointing at a root [`bucket::Bucket`] in a
//! [`store::BlockStore`]. Bucket boundaries are decided by a deterministic,
//! content-derived predicate ([`boundary::is_boundary`]) rather than a fixed
//! fanout, so two trees holding the same key-value pairs converge to
//! byte-identical structure regardless of the order their entries were
//! written in. That property is what makes the tree usable as a
//! content-addressed sync target: [`facade::diff`] (re-exported from
//! [`diff`]) and [`facade::sync`] lean on it to skip identical subtrees
//! entirely.
//!
//! # Conventions
//!
//! - **Errors**: every fallible function returns [`error::Result`]; see
//!   [`error::Error`] for the full taxonomy.
//! - **Logging**: instrumented with `tracing`; enable a subscriber to see
//!   per-operation spans (mutation batches, cursor descents, block fetches).
//! - **Block storage**: this crate only defines the [`store::BlockStore`]
//!   trait and an in-memory reference implementation. A real deployment
//!   backs it with content-addressed storage of its own choosing.
//!
//! # Layout
//!
//! - [`entry`] — digests, prefixes, and the key/value entry type.
//! - [`boundary`] — the chunk-boundary predicate.
//! - [`codec`] — canonical CBOR encoding of a bucket's bytes.
//! - [`bucket`] — the validated, content-addressed bucket type.
//! - [`store`] — the block store trait and an in-memory implementation.
//! - [`tree`] — the tree handle and constructors.
//! - [`cursor`] — ordered, level-wise traversal over a tree.
//! - [`update`] — the insert/remove/strict-remove update sum type.
//! - [`diffs`] — diff output types shared by mutation and diffing.
//! - [`mutate`] — the batch mutation engine.
//! - [`diff`] — the tree-to-tree diff engine.
//! - [`facade`] — search, range, merge, and sync built on the above.

pub mod boundary;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod diff;
pub mod diffs;
pub mod entry;
pub mod error;
pub mod facade;
pub mod mutate;
pub mod store;
pub mod tree;
pub mod update;

pub use bucket::Bucket;
pub use entry::{Digest, Entry, Prefix};
pub use error::{Error, Result};
pub use store::{BlockStore, MemoryBlockStore};
pub use tree::{create_empty_tree, load_tree, Tree};
pub use update::Update;
