//! Top-level entry points (§4.5): owns the collaborators for one split
//! session and exposes the three operations a caller actually needs.
//!
//! Per §9's rewrite of the source's global mutable state, `total_split` and
//! the splitter kernel / store are owned by this session object rather than
//! living as module globals.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::instrument;

use crate::chunker::{hashsplit_iter, ProgressFn};
use crate::error::Result;
use crate::splitter::Splitter;
use crate::store::BlobStore;
use crate::tree::{Mode, Shalist, TreeBuilder};
use crate::tunables::Tunables;

/// Invoked once per emitted chunk, with its size in bytes. The counterpart
/// to [`ProgressFn`], which reports per-read progress instead.
pub type ChunkProgressFn = Rc<RefCell<dyn FnMut(u64)>>;

/// Owns a splitter kernel, a store, and this session's tunables and running
/// byte counter. A `SplitSession` is single-use: build one per backup run.
pub struct SplitSession<K, S> {
    kernel: K,
    store: S,
    tunables: Tunables,
    total_split: AtomicU64,
}

impl<K: Splitter, S: BlobStore> SplitSession<K, S> {
    pub fn new(kernel: K, store: S, tunables: Tunables) -> Result<Self> {
        tunables.validate()?;
        Ok(Self {
            kernel,
            store,
            tunables,
            total_split: AtomicU64::new(0),
        })
    }

    /// Total bytes handed to `make_blob` so far in this session. A future
    /// extension running several sessions concurrently can simply use one
    /// `SplitSession` per splitter, since this is already a per-session
    /// atomic rather than a process-wide global (§5).
    pub fn total_split(&self) -> u64 {
        self.total_split.load(Ordering::Relaxed)
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// Drives §4.3 and calls `make_blob` for each chunk, returning a lazy
    /// sequence of `(identifier, size, level)`.
    #[instrument(skip(self, files, read_progress, chunk_progress), fields(keep_boundaries, file_count = files.len()))]
    pub fn split_to_blobs<'s, 'f>(
        &'s self,
        files: Vec<Box<dyn Read + 'f>>,
        keep_boundaries: bool,
        read_progress: Option<ProgressFn>,
        chunk_progress: Option<ChunkProgressFn>,
    ) -> impl Iterator<Item = Result<(S::Id, u64, usize)>> + 's
    where
        'f: 's,
    {
        hashsplit_iter(&self.kernel, self.tunables, files, keep_boundaries, read_progress).map(
            move |chunk| {
                let chunk = chunk?;
                let size = chunk.data.len() as u64;
                let id = self.store.make_blob(&chunk.data)?;
                self.total_split.fetch_add(size, Ordering::Relaxed);
                if let Some(cb) = &chunk_progress {
                    (cb.borrow_mut())(size);
                }
                Ok((id, size, chunk.level))
            },
        )
    }

    /// Runs §4.4 over the blob sequence and returns the final top-level
    /// shalist.
    #[instrument(skip(self, files, read_progress, chunk_progress), fields(keep_boundaries))]
    pub fn split_to_shalist<'f>(
        &self,
        files: Vec<Box<dyn Read + 'f>>,
        keep_boundaries: bool,
        read_progress: Option<ProgressFn>,
        chunk_progress: Option<ChunkProgressFn>,
    ) -> Result<Shalist<S::Id>> {
        let mut builder = TreeBuilder::new(&self.store, self.tunables.max_per_tree);
        for item in self.split_to_blobs(files, keep_boundaries, read_progress, chunk_progress) {
            let (id, size, level) = item?;
            builder.push_leaf(id, size, level)?;
        }
        builder.finish()
    }

    /// §4.5's empty/single/multi collapsing rule: an empty input produces a
    /// lone empty blob, a single-entry shalist is returned unwrapped, and
    /// anything larger is wrapped in one more tree node.
    #[instrument(skip(self, files, read_progress, chunk_progress), fields(keep_boundaries))]
    pub fn split_to_blob_or_tree<'f>(
        &self,
        files: Vec<Box<dyn Read + 'f>>,
        keep_boundaries: bool,
        read_progress: Option<ProgressFn>,
        chunk_progress: Option<ChunkProgressFn>,
    ) -> Result<(Mode, S::Id)> {
        let shalist =
            self.split_to_shalist(files, keep_boundaries, read_progress, chunk_progress)?;

        match shalist.len() {
            0 => Ok((Mode::File, self.store.make_blob(b"")?)),
            1 => {
                let entry = shalist.entries.into_iter().next().expect("len == 1");
                Ok((entry.mode, entry.id))
            }
            _ => {
                let id = self.store.make_tree(&shalist)?;
                Ok((Mode::Tree, id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::Rollsum;
    use crate::store::MemoryStore;
    use std::io::Cursor;

    fn session() -> SplitSession<Rollsum, MemoryStore> {
        SplitSession::new(Rollsum::default(), MemoryStore::new(), Tunables::default()).unwrap()
    }

    #[test]
    fn empty_input_produces_a_single_empty_blob() {
        let s = session();
        let files: Vec<Box<dyn Read>> = vec![Box::new(Cursor::new(Vec::<u8>::new()))];
        let (mode, id) = s.split_to_blob_or_tree(files, false, None, None).unwrap();
        assert_eq!(mode, Mode::File);
        assert_eq!(s.store.get(&id).unwrap().len(), 0);
    }

    #[test]
    fn single_byte_produces_one_leaf() {
        let s = session();
        let files: Vec<Box<dyn Read>> = vec![Box::new(Cursor::new(vec![0x41u8]))];
        let (mode, id) = s.split_to_blob_or_tree(files, false, None, None).unwrap();
        assert_eq!(mode, Mode::File);
        assert_eq!(&s.store.get(&id).unwrap()[..], &[0x41]);
    }

    #[test]
    fn large_zero_input_builds_a_shallow_tree() {
        let s = session();
        let data = vec![0u8; 10 * 1024 * 1024];
        let files: Vec<Box<dyn Read>> = vec![Box::new(Cursor::new(data))];
        let (mode, _id) = s.split_to_blob_or_tree(files, false, None, None).unwrap();
        assert_eq!(mode, Mode::Tree);
        assert!(s.total_split() >= 10 * 1024 * 1024);
    }

    #[test]
    fn determinism_same_input_same_shalist() {
        let s1 = session();
        let s2 = session();
        let data: Vec<u8> = (0..2_000_000u32).map(|i| (i * 2654435761) as u8).collect();

        let files1: Vec<Box<dyn Read>> = vec![Box::new(Cursor::new(data.clone()))];
        let files2: Vec<Box<dyn Read>> = vec![Box::new(Cursor::new(data))];

        let sl1 = s1.split_to_shalist(files1, false, None, None).unwrap();
        let sl2 = s2.split_to_shalist(files2, false, None, None).unwrap();
        assert_eq!(sl1, sl2);
    }
}
