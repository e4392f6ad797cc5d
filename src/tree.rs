//! Folds a linear sequence of `(identifier, size, level)` triples into a
//! multi-level content-addressed tree, driven by a per-level stack and a
//! fanout cap (§4.4).

use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::store::BlobStore;

/// The two node kinds the tree builder ever emits. `Symlink` is part of the
/// on-disk mode vocabulary (§6) but is never constructed by this crate; it is
/// kept so a caller mixing our leaves into a richer tree (one that also
/// carries symlinks) can share the same `Mode` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    File,
    Tree,
    Symlink,
}

impl Mode {
    /// The historical octal mode constants this layout is compatible with.
    pub const fn as_octal(self) -> u32 {
        match self {
            Mode::File => 0o100644,
            Mode::Tree => 0o040000,
            Mode::Symlink => 0o120000,
        }
    }
}

/// One entry of a [`Shalist`]: a child's mode, its layout-derived name, and
/// its stored identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShalistEntry<Id> {
    pub mode: Mode,
    pub name: String,
    pub id: Id,
}

/// An ordered child-list serialization used as the body of an inner tree
/// node (§3, §6). `name` is the cumulative byte offset of each child within
/// the node, rendered as fixed-width lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shalist<Id> {
    pub entries: Vec<ShalistEntry<Id>>,
    pub total_size: u64,
}

impl<Id> Shalist<Id> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

type StackEntry<Id> = (Mode, Id, u64);

/// Renders `entries` as a [`Shalist`], computing cumulative offsets and the
/// shared fixed hex width from the total size (§3, §6).
fn make_shalist<Id>(entries: Vec<StackEntry<Id>>) -> Result<Shalist<Id>> {
    let total: u64 = entries.iter().try_fold(0u64, |acc, (_, _, size)| {
        acc.checked_add(*size)
            .ok_or_else(|| Error::Invariant("shalist total size overflowed u64".into()))
    })?;

    let width = format!("{total:x}").len();

    let mut ofs = 0u64;
    let mut out = Vec::with_capacity(entries.len());
    for (mode, id, size) in entries {
        out.push(ShalistEntry {
            mode,
            name: format!("{ofs:0width$x}"),
            id,
        });
        ofs += size;
    }

    if ofs != total {
        return Err(Error::Invariant(
            "shalist offset accumulation drifted from declared total".into(),
        ));
    }

    Ok(Shalist {
        entries: out,
        total_size: total,
    })
}

/// Drives the §4.4 squish algorithm over a per-level stack, asking a
/// [`BlobStore`] to materialize each intermediate tree node.
pub struct TreeBuilder<'s, S: BlobStore> {
    store: &'s S,
    max_per_tree: usize,
    stacks: Vec<Vec<StackEntry<S::Id>>>,
}

impl<'s, S: BlobStore> TreeBuilder<'s, S> {
    pub fn new(store: &'s S, max_per_tree: usize) -> Self {
        Self {
            store,
            max_per_tree,
            stacks: vec![Vec::new()],
        }
    }

    /// Pushes a freshly split leaf chunk onto level 0 and folds the stacks
    /// upward according to `level`.
    #[instrument(skip(self, id), fields(size, level))]
    pub fn push_leaf(&mut self, id: S::Id, size: u64, level: usize) -> Result<()> {
        self.stacks[0].push((Mode::File, id, size));
        self.squish(level)
    }

    /// Drains every stack into the topmost one and returns the resulting
    /// root shalist. Called once, after the last chunk has been pushed.
    #[instrument(skip(self))]
    pub fn finish(mut self) -> Result<Shalist<S::Id>> {
        let top = self.stacks.len() - 1;
        self.squish(top)?;
        let root = self.stacks.pop().expect("stacks is never empty");
        debug_assert!(
            self.stacks.iter().all(Vec::is_empty),
            "every stack below the top must be drained after finish()"
        );
        make_shalist(root)
    }

    /// `squish(n)`: iterate `i` from 0 upward while `i < n` or `stacks[i]`
    /// has overflowed the fanout cap, folding each level into the next.
    #[instrument(skip(self))]
    fn squish(&mut self, n: usize) -> Result<()> {
        let mut i = 0;
        while i < n || self.stacks[i].len() >= self.max_per_tree {
            if self.stacks[i].len() >= self.max_per_tree {
                warn!(level = i, len = self.stacks[i].len(), "fanout overflow forces flush");
            }
            if self.stacks.len() <= i + 1 {
                self.stacks.push(Vec::new());
            }

            let entries = std::mem::take(&mut self.stacks[i]);
            match entries.len() {
                0 => {}
                // A single entry is promoted as-is, never wrapped in a
                // degenerate one-child tree.
                1 => self.stacks[i + 1].extend(entries),
                _ => {
                    let shalist = make_shalist(entries)?;
                    let total_size = shalist.total_size;
                    let tree_id = self.store.make_tree(&shalist)?;
                    debug!(level = i, children = shalist.len(), total_size, "squished level into tree node");
                    self.stacks[i + 1].push((Mode::Tree, tree_id, total_size));
                }
            }

            i += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn shalist_offsets_are_prefix_sums() {
        let store = MemoryStore::default();
        let mut b = TreeBuilder::new(&store, 256);
        let id1 = store.make_blob(b"aaaa").unwrap();
        let id2 = store.make_blob(b"bb").unwrap();
        b.push_leaf(id1, 4, 0).unwrap();
        b.push_leaf(id2, 2, 0).unwrap();
        let shalist = b.finish().unwrap();

        assert_eq!(shalist.total_size, 6);
        assert_eq!(shalist.entries[0].name, "0");
        assert_eq!(shalist.entries[1].name, "4");
    }

    #[test]
    fn single_leaf_is_not_wrapped_in_a_tree() {
        let store = MemoryStore::default();
        let mut b = TreeBuilder::new(&store, 256);
        let id = store.make_blob(b"solo").unwrap();
        b.push_leaf(id.clone(), 4, 0).unwrap();
        let shalist = b.finish().unwrap();

        assert_eq!(shalist.len(), 1);
        assert_eq!(shalist.entries[0].mode, Mode::File);
        assert_eq!(shalist.entries[0].id, id);
    }

    #[test]
    fn fanout_overflow_forces_a_flush() {
        let store = MemoryStore::default();
        let mut b = TreeBuilder::new(&store, 4);
        for i in 0..10u8 {
            let id = store.make_blob(&[i]).unwrap();
            b.push_leaf(id, 1, 0).unwrap();
        }
        // with max_per_tree = 4, level 0 must have flushed into level 1
        // at least twice by now.
        assert!(b.stacks[1].len() >= 2);
    }
}
