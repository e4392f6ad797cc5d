//! The hash-split iterator (§4.3): drives a [`Splitter`] kernel over data
//! pulled through a [`StreamBuffer`], producing a lazy sequence of
//! `(chunk, level)` pairs.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use bytes::Bytes;
use tracing::trace;

use crate::buffer::StreamBuffer;
use crate::error::Result;
use crate::splitter::Splitter;
use crate::tunables::Tunables;

/// A chunk of input bytes together with the tree level its boundary implies
/// (§3). A forced end-of-window or end-of-stream cut always has `level = 0`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub data: Bytes,
    pub level: usize,
}

/// Invoked once per completed read with `(file_index, bytes_since_start_of_file)`.
/// `Rc<RefCell<_>>` rather than a plain `&mut dyn FnMut` because
/// `keep_boundaries` mode needs to share one callback across a sequence of
/// independently-owned per-file splitters (§4.3); the pipeline itself is
/// single-threaded (§5), so this costs nothing.
pub type ProgressFn = Rc<RefCell<dyn FnMut(usize, u64) -> std::io::Result<()>>>;

/// Drives a single continuous hash-split session over an ordered sequence of
/// readers, treating them as one logical byte stream (§4.3's fill-then-split
/// loop). Used directly for `keep_boundaries = false`, and once per file
/// (via [`hashsplit_iter`]) for `keep_boundaries = true`.
pub struct ChunkSplitter<'k, K: Splitter> {
    kernel: &'k K,
    tunables: Tunables,
    buf: StreamBuffer,
    files: std::vec::IntoIter<Box<dyn Read + 'k>>,
    current: Option<Box<dyn Read + 'k>>,
    next_file_index: usize,
    file_index: usize,
    bytes_in_file: u64,
    progress: Option<ProgressFn>,
    done: bool,
}

impl<'k, K: Splitter> ChunkSplitter<'k, K> {
    pub fn new(
        kernel: &'k K,
        tunables: Tunables,
        files: Vec<Box<dyn Read + 'k>>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            kernel,
            buf: StreamBuffer::new(tunables.blob_read_size),
            tunables,
            files: files.into_iter(),
            current: None,
            next_file_index: 0,
            file_index: 0,
            bytes_in_file: 0,
            progress,
            done: false,
        }
    }

    /// Step 1 of §4.3: pull reads until the buffer holds a full peek window
    /// or every input stream is exhausted.
    fn refill(&mut self) -> Result<()> {
        while self.buf.used() < self.tunables.blob_max {
            if self.current.is_none() {
                match self.files.next() {
                    Some(r) => {
                        self.current = Some(r);
                        self.file_index = self.next_file_index;
                        self.next_file_index += 1;
                        self.bytes_in_file = 0;
                    }
                    None => return Ok(()),
                }
            }

            let view = self.buf.prepare_put(self.tunables.blob_read_size)?;
            let n = self.current.as_mut().expect("just ensured").read(view)?;
            if n == 0 {
                self.current = None;
                continue;
            }
            self.buf.commit_put(n)?;
            self.bytes_in_file += n as u64;

            if let Some(progress) = &self.progress {
                (progress.borrow_mut())(self.file_index, self.bytes_in_file)?;
            }
        }
        Ok(())
    }

    /// Steps 2-4 of §4.3: terminate if drained, otherwise ask the kernel for
    /// the next boundary and emit accordingly.
    fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.done {
            return Ok(None);
        }

        self.refill()?;
        if self.buf.used() == 0 {
            self.done = true;
            return Ok(None);
        }

        let window = self.buf.peek(self.tunables.blob_max);
        let split = self.kernel.find_boundary(window);

        let (emit_len, level) = if split.found() {
            let basebits = self.kernel.basebits();
            let level = ((split.bits - basebits) / self.tunables.fanbits()) as usize;
            (split.offset, level)
        } else {
            // No boundary anywhere in the peek: either the window is
            // unsplittable, or we're draining the final, less-than-BLOB_MAX
            // tail. Either way, emit everything currently peeked.
            (window.len(), 0)
        };

        let data = Bytes::copy_from_slice(&window[..emit_len]);
        self.buf.eat(emit_len)?;

        trace!(size = emit_len, level, "chunk emitted");
        Ok(Some(Chunk { data, level }))
    }
}

impl<'k, K: Splitter> Iterator for ChunkSplitter<'k, K> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Builds the hash-split sequence for an ordered set of input streams
/// (§4.3). When `keep_boundaries` is true, a fresh [`ChunkSplitter`] session
/// is started for each file so a forced `level = 0` cut always lands at a
/// file boundary; the shared `progress` callback is wrapped per file so its
/// `file_index` argument reflects the true outer file count rather than
/// always reporting 0.
pub fn hashsplit_iter<'k, K: Splitter + 'k>(
    kernel: &'k K,
    tunables: Tunables,
    files: Vec<Box<dyn Read + 'k>>,
    keep_boundaries: bool,
    progress: Option<ProgressFn>,
) -> Box<dyn Iterator<Item = Result<Chunk>> + 'k> {
    if keep_boundaries {
        let iter = files.into_iter().enumerate().flat_map(move |(real_index, file)| {
            let remapped: Option<ProgressFn> = progress.clone().map(|shared| {
                Rc::new(RefCell::new(move |_file_index: usize, nbytes: u64| {
                    (&mut *shared.borrow_mut())(real_index, nbytes)
                })) as ProgressFn
            });
            ChunkSplitter::new(kernel, tunables, vec![file], remapped)
        });
        Box::new(iter)
    } else {
        Box::new(ChunkSplitter::new(kernel, tunables, files, progress))
    }
}
