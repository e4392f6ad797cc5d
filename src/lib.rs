//! Content-defined chunking and hierarchical tree assembly for a
//! deduplicating backup system.
//!
//! A rolling-hash [`splitter`] walks an input stream and declares chunk
//! boundaries; a [`buffer::StreamBuffer`] feeds it without per-byte
//! allocation; [`chunker`] turns that into a lazy `(chunk, level)` sequence;
//! and [`tree`] folds that sequence into a bounded-fanout, content-addressed
//! tree via [`session::SplitSession`]. Reconstruction, compression,
//! encryption, and the on-disk pack format are out of scope: this crate only
//! produces identifiers through an injected [`store::BlobStore`].

pub mod buffer;
pub mod chunker;
pub mod digest;
pub mod error;
pub mod session;
pub mod splitter;
pub mod store;
pub mod tree;
pub mod tunables;

pub use chunker::Chunk;
pub use digest::Digest;
pub use error::{Error, Result};
pub use session::SplitSession;
pub use splitter::{Rollsum, SplitPoint, Splitter};
pub use store::{BlobStore, MemoryStore};
pub use tree::{Mode, Shalist, ShalistEntry, TreeBuilder};
pub use tunables::Tunables;
