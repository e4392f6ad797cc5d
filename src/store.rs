//! The injected storage callbacks (§6): `make_blob` and `make_tree`. The
//! splitting and tree-assembly core is generic over `BlobStore::Id`; this
//! module also ships [`MemoryStore`], a reference implementation backed by
//! an in-process map, so the crate is runnable end to end without a real
//! backing store.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::digest::Digest;
use crate::error::Result;
use crate::tree::Shalist;

/// The storage callbacks a splitting session needs: a way to persist a leaf
/// blob and a way to persist a serialized [`Shalist`] as a tree node,
/// each returning a content identifier.
///
/// Implementations are responsible for their own deduplication (identical
/// bytes in ⟹ identical id out); the core never inspects identifiers beyond
/// comparing them for equality.
pub trait BlobStore: Send + Sync {
    type Id: Clone + Eq + std::hash::Hash + Send + Sync + 'static;

    /// Stores a leaf payload and returns its content address.
    fn make_blob(&self, bytes: &[u8]) -> Result<Self::Id>;

    /// Serializes and stores a shalist as an inner tree node, returning its
    /// content address.
    fn make_tree(&self, shalist: &Shalist<Self::Id>) -> Result<Self::Id>;
}

/// Canonical byte encoding of a [`Shalist`], used by [`MemoryStore`] to hash
/// and store tree nodes. Not a stability promise for any on-disk format;
/// just enough structure that two equal shalists hash equally.
fn encode_shalist(shalist: &Shalist<Digest>) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in &shalist.entries {
        out.extend_from_slice(&entry.mode.as_octal().to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        let id_bytes = entry.id.as_slice();
        out.extend_from_slice(&(id_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(id_bytes);
    }
    out
}

/// A reference [`BlobStore`] backed by an in-process `HashMap`. Useful for
/// tests and for embedding this crate where a full on-disk pack store isn't
/// needed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<Digest, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored bytes for a previously returned identifier, if any.
    pub fn get(&self, id: &Digest) -> Option<Bytes> {
        self.objects.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl BlobStore for MemoryStore {
    type Id = Digest;

    fn make_blob(&self, bytes: &[u8]) -> Result<Digest> {
        let digest: Digest = blake3::hash(bytes).into();
        self.objects
            .write()
            .insert(digest.clone(), Bytes::copy_from_slice(bytes));
        Ok(digest)
    }

    fn make_tree(&self, shalist: &Shalist<Digest>) -> Result<Digest> {
        let encoded = encode_shalist(shalist);
        let digest: Digest = blake3::hash(&encoded).into();
        self.objects.write().insert(digest.clone(), encoded.into());
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_blob_is_content_addressed() {
        let store = MemoryStore::new();
        let a = store.make_blob(b"same bytes").unwrap();
        let b = store.make_blob(b"same bytes").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_bytes_get_different_ids() {
        let store = MemoryStore::new();
        let a = store.make_blob(b"one").unwrap();
        let b = store.make_blob(b"two").unwrap();
        assert_ne!(a, b);
    }
}
