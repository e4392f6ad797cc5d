use bytes::Bytes;
use data_encoding::BASE64;

/// The length, in bytes, of a [`Digest`].
pub const DIGEST_LEN: usize = 32;

/// A content hash identifying a stored blob or tree.
///
/// This is the concrete identifier type used by [`crate::store::MemoryStore`].
/// The splitting and tree-assembly core itself is generic over the
/// identifier type a store chooses to hand back (see [`crate::store::BlobStore`]);
/// `Digest` is simply the reference implementation's choice, a blake3 hash.
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct Digest(Bytes);

impl Digest {
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<blake3::Hash> for Digest {
    fn from(value: blake3::Hash) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<&[u8; DIGEST_LEN]> for Digest {
    fn from(value: &[u8; DIGEST_LEN]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b3:{}", BASE64.encode(&self.0))
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self)
    }
}
