//! The zero-allocation streaming buffer (§4.2). Holds bytes `[start,
//! start+length)` of an owned backing array sized so a full `BLOB_MAX` peek
//! is always contiguous after a read-in.
//!
//! Per §9's rewrite of the source's ownership idioms, the buffer
//! *exclusively* owns its backing array for the session; `peek` returns a
//! borrow tied to `&self`, so the borrow checker enforces that callers
//! cannot retain a peek view across a `prepare_put`/`commit_put`/`eat` call
//! that mutates it.

use crate::error::{Error, Result};

pub struct StreamBuffer {
    data: Box<[u8]>,
    start: usize,
    length: usize,
}

impl StreamBuffer {
    /// Builds a buffer sized `2 * blob_read_size`, matching §4.2's sizing
    /// rationale (one compaction copy amortized per megabyte read).
    ///
    /// Callers reach this only through a [`Tunables`](crate::tunables::Tunables)
    /// that has already passed `validate()`, which rejects a `blob_read_size`
    /// too large to double; the `expect` below is an invariant, not a config
    /// check.
    pub fn new(blob_read_size: usize) -> Self {
        let size = blob_read_size
            .checked_mul(2)
            .expect("blob_read_size too large to double (should have been rejected by Tunables::validate)");
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            start: 0,
            length: 0,
        }
    }

    /// Resident byte count.
    pub fn used(&self) -> usize {
        self.length
    }

    /// A read-only view of the first `min(n, used())` resident bytes. No
    /// allocation, no copy.
    pub fn peek(&self, n: usize) -> &[u8] {
        let n = n.min(self.length);
        &self.data[self.start..self.start + n]
    }

    /// Advances past `n` resident bytes.
    pub fn eat(&mut self, n: usize) -> Result<()> {
        if n > self.length {
            return Err(Error::Invariant(format!(
                "eat({n}) exceeds {} resident bytes",
                self.length
            )));
        }
        self.start += n;
        self.length -= n;
        Ok(())
    }

    /// A writable view of exactly `max_n` bytes positioned right after the
    /// resident bytes, compacting the buffer down to offset 0 first if it
    /// would otherwise overflow the backing array. The returned view is
    /// always contiguous.
    pub fn prepare_put(&mut self, max_n: usize) -> Result<&mut [u8]> {
        let end = self.start + self.length;
        if end + max_n > self.data.len() {
            if self.length + max_n > self.data.len() {
                return Err(Error::Invariant(format!(
                    "prepare_put({max_n}) cannot fit alongside {} resident bytes in a buffer of capacity {}",
                    self.length,
                    self.data.len()
                )));
            }
            self.data.copy_within(self.start..end, 0);
            self.start = 0;
        }
        let end = self.start + self.length;
        Ok(&mut self.data[end..end + max_n])
    }

    /// Records that the reader actually filled `actual_n` bytes of the view
    /// handed out by the preceding [`Self::prepare_put`].
    pub fn commit_put(&mut self, actual_n: usize) -> Result<()> {
        if self.start + self.length + actual_n > self.data.len() {
            return Err(Error::Invariant(
                "commit_put exceeds the view reserved by prepare_put".into(),
            ));
        }
        self.length += actual_n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_never_exceeds_resident_length() {
        let mut buf = StreamBuffer::new(16);
        buf.prepare_put(4).unwrap();
        buf.commit_put(4).unwrap();
        assert_eq!(buf.peek(100).len(), 4);
        assert_eq!(buf.used(), 4);
    }

    #[test]
    fn eat_advances_and_shrinks() {
        let mut buf = StreamBuffer::new(16);
        buf.prepare_put(10).unwrap().copy_from_slice(&[0; 10]);
        buf.commit_put(10).unwrap();
        buf.eat(4).unwrap();
        assert_eq!(buf.used(), 6);
    }

    #[test]
    fn eat_beyond_resident_is_an_invariant_error() {
        let mut buf = StreamBuffer::new(16);
        buf.prepare_put(2).unwrap();
        buf.commit_put(2).unwrap();
        assert!(buf.eat(3).is_err());
    }

    #[test]
    fn prepare_put_compacts_instead_of_overflowing() {
        // capacity 32: fill, drain most, then request a put that only fits
        // if the resident tail is shifted back down to 0.
        let mut buf = StreamBuffer::new(16);
        buf.prepare_put(16).unwrap();
        buf.commit_put(16).unwrap();
        buf.eat(14).unwrap(); // 2 bytes resident, but start == 14
        let view = buf.prepare_put(20).unwrap();
        assert_eq!(view.len(), 20);
        buf.commit_put(20).unwrap();
        assert_eq!(buf.used(), 22);
    }

    #[test]
    fn prepare_put_rejects_a_request_that_cannot_fit() {
        let mut buf = StreamBuffer::new(4);
        assert!(buf.prepare_put(100).is_err());
    }

    #[test]
    fn roundtrip_preserves_bytes() {
        let mut buf = StreamBuffer::new(16);
        {
            let view = buf.prepare_put(5).unwrap();
            view.copy_from_slice(b"hello");
        }
        buf.commit_put(5).unwrap();
        assert_eq!(buf.peek(5), b"hello");
        buf.eat(2).unwrap();
        assert_eq!(buf.peek(5), b"llo");
    }
}
