//! Canonical binary encoding for buckets, via CBOR (`ciborium`).
//!
//! Wire format (see `SPEC_FULL.md` §4.2 and §6):
//!
//! ```text
//! Bucket := { average: u32, level: u32, entries: [Entry, ...] }
//! Entry  := [ key: bytes, val: bytes ]
//! ```
//!
//! The source spec's `base`/seq-delta encoding is dropped entirely: this
//! crate's data model has no `seq` field (see the key-only freeze in
//! `SPEC_FULL.md` §3), so there is nothing to delta-encode against.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::entry::{Digest, Entry, Prefix};
use crate::error::Result;

#[derive(Serialize, Deserialize)]
struct WireEntry(ByteBuf, ByteBuf);

#[derive(Serialize, Deserialize)]
struct WireBucket {
    average: u32,
    level: u32,
    entries: Vec<WireEntry>,
}

/// Encode a bucket's prefix and entries into canonical bytes, and hash them.
///
/// Returns `(bytes, digest)`, matching the codec contract in §4.2.
pub fn encode(prefix: Prefix, entries: &[Entry]) -> Result<(Vec<u8>, Digest)> {
    let wire = WireBucket {
        average: prefix.average,
        level: prefix.level,
        entries: entries
            .iter()
            .map(|e| WireEntry(ByteBuf::from(e.key.clone()), ByteBuf::from(e.val.clone())))
            .collect(),
    };
    let mut bytes = Vec::new();
    ciborium::into_writer(&wire, &mut bytes)?;
    let digest = Digest::of(&bytes);
    Ok((bytes, digest))
}

/// Decode bytes into a `(prefix, entries)` pair, without any of the
/// structural/range/prefix validation layered on top by [`crate::bucket`].
/// This is the raw wire-level decode; callers that need validated buckets
/// should go through `Bucket::load`.
pub fn decode(bytes: &[u8]) -> Result<(Prefix, Vec<Entry>)> {
    let wire: WireBucket = ciborium::from_reader(bytes)?;
    let entries = wire
        .entries
        .into_iter()
        .map(|WireEntry(key, val)| Entry {
            key: key.into_vec(),
            val: val.into_vec(),
        })
        .collect();
    Ok((Prefix::new(wire.average, wire.level), entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_deterministic() {
        let prefix = Prefix::new(32, 0);
        let entries = vec![Entry::new(vec![1], vec![9]), Entry::new(vec![2], vec![8])];
        let (bytes_a, digest_a) = encode(prefix, &entries).expect("encodes");
        let (bytes_b, digest_b) = encode(prefix, &entries).expect("encodes");
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(digest_a, digest_b);
    }

    #[test]
    fn decode_inverts_encode() {
        let prefix = Prefix::new(16, 2);
        let entries = vec![
            Entry::new(vec![1, 2], vec![3, 4]),
            Entry::new(vec![5, 6], vec![7, 8]),
        ];
        let (bytes, _) = encode(prefix, &entries).expect("encodes");
        let (decoded_prefix, decoded_entries) = decode(&bytes).expect("decodes");
        assert_eq!(decoded_prefix, prefix);
        assert_eq!(decoded_entries, entries);
    }

    #[test]
    fn empty_entries_round_trip() {
        let prefix = Prefix::new(32, 0);
        let (bytes, _) = encode(prefix, &[]).expect("encodes");
        let (decoded_prefix, decoded_entries) = decode(&bytes).expect("decodes");
        assert_eq!(decoded_prefix, prefix);
        assert!(decoded_entries.is_empty());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode(&[0xff, 0x00, 0x01]).is_err());
    }
}
