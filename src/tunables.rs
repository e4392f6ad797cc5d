use serde::Deserialize;

use crate::error::{Error, Result};

/// The compile-time constants of §6, made runtime-configurable. Deriving
/// `Deserialize` lets an embedder load these from whatever configuration
/// format their application already uses; `#[serde(default)]` means a
/// partial document still produces sane values for the rest.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Hard cap on chunk size, in bytes.
    pub blob_max: usize,
    /// Size of a single underlying read, in bytes.
    pub blob_read_size: usize,
    /// Per-level fanout cap; a stack is force-flushed at this length.
    pub max_per_tree: usize,
    /// Tree branching factor. Must be a non-zero power of two.
    pub fanout: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            blob_max: 32 * 1024,
            blob_read_size: 1024 * 1024,
            max_per_tree: 256,
            fanout: 16,
        }
    }
}

impl Tunables {
    /// `fanbits = log2(fanout)`. §9 treats `fanout == 0` as a rejected
    /// configuration rather than porting the source's dead zero-fanout
    /// branch, so this is only called after [`Tunables::validate`].
    pub(crate) fn fanbits(&self) -> u32 {
        self.fanout.trailing_zeros()
    }

    /// Rejects configurations the core cannot run with: a zero or
    /// non-power-of-two fanout, or a read size too small to ever fill a
    /// full-size peek window.
    pub fn validate(&self) -> Result<()> {
        if self.fanout == 0 || !self.fanout.is_power_of_two() {
            return Err(Error::Invariant(format!(
                "fanout must be a non-zero power of two, got {}",
                self.fanout
            )));
        }
        if self.blob_read_size <= self.blob_max {
            return Err(Error::Invariant(format!(
                "blob_read_size ({}) must exceed blob_max ({})",
                self.blob_read_size, self.blob_max
            )));
        }
        if self.blob_read_size > usize::MAX / 2 {
            return Err(Error::Invariant(format!(
                "blob_read_size ({}) is too large to double for the stream buffer",
                self.blob_read_size
            )));
        }
        Ok(())
    }
}
