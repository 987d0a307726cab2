//! Growable sliding buffer for TLS record staging
//!
//! Each of the four bridge buffers (ciphertext in/out, plaintext in/out) is a
//! `GrowBuffer`. Data is appended at `end` and consumed from `start`, with
//! lazy compaction via `copy_within()` so the engine always sees contiguous
//! slices. Unlike a fixed slide buffer, capacity can be doubled on demand
//! when the engine reports that a record does not fit.
//!
//! Capacity never shrinks, and growth never reorders or drops unread bytes.

use std::io::Read;

/// A sliding buffer whose capacity can be doubled up to a caller-supplied cap.
///
/// # Example
/// ```ignore
/// let mut buf = GrowBuffer::new(4);
/// buf.extend_from_slice(b"abcd");
/// buf.grow(1024)?;
/// assert_eq!(buf.capacity(), 8);
/// assert_eq!(buf.as_slice(), b"abcd");
/// ```
pub struct GrowBuffer {
    data: Box<[u8]>,
    /// Start offset of unread data (inclusive)
    start: usize,
    /// End offset of unread data (exclusive)
    end: usize,
}

impl GrowBuffer {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    /// Returns the number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the space available after `end`.
    ///
    /// Space consumed from the front is only reclaimed by `compact()`.
    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.end
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Get the writable region after the unread data.
    ///
    /// After writing, call `advance_write(n)` to mark bytes as written.
    #[inline]
    pub fn write_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.end..]
    }

    /// # Panics
    /// Panics in debug mode if there isn't enough capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        debug_assert!(
            self.remaining_capacity() >= data.len(),
            "GrowBuffer overflow: need {} bytes, have {}",
            data.len(),
            self.remaining_capacity()
        );
        let end = self.end;
        self.data[end..end + data.len()].copy_from_slice(data);
        self.end += data.len();
    }

    #[inline]
    pub fn advance_write(&mut self, n: usize) {
        debug_assert!(
            self.end + n <= self.data.len(),
            "GrowBuffer advance_write overflow: end={}, n={}, capacity={}",
            self.end,
            n,
            self.data.len()
        );
        self.end += n;
    }

    /// Consume n bytes from the front of the buffer.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        debug_assert!(
            n <= self.len(),
            "GrowBuffer consume underflow: n={}, len={}",
            n,
            self.len()
        );
        self.start += n;

        // Reset offsets if buffer is now empty
        if self.start >= self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Move unread data to the front, discarding already-consumed bytes.
    #[inline]
    pub fn compact(&mut self) {
        if self.start > 0 && self.start < self.end {
            self.data.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        } else if self.start >= self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Double the capacity, never exceeding `max_capacity`.
    ///
    /// Unread bytes are copied to the front of the new storage. Fails with
    /// `OutOfMemory` when the buffer is already at `max_capacity`.
    pub fn grow(&mut self, max_capacity: usize) -> std::io::Result<()> {
        let capacity = self.data.len();
        if capacity >= max_capacity {
            return Err(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                format!(
                    "buffer capacity limit reached: {} bytes (max {})",
                    capacity, max_capacity
                ),
            ));
        }

        let new_capacity = capacity.saturating_mul(2).clamp(1, max_capacity);
        let mut data = vec![0u8; new_capacity].into_boxed_slice();
        let len = self.len();
        data[..len].copy_from_slice(self.as_slice());

        log::trace!("growing buffer from {} to {} bytes", capacity, new_capacity);

        self.data = data;
        self.start = 0;
        self.end = len;
        Ok(())
    }
}

impl Read for GrowBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let available = self.len();
        if available == 0 {
            return Ok(0);
        }
        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&self.data[self.start..self.start + to_read]);
        self.consume(to_read);
        Ok(to_read)
    }
}

impl std::fmt::Debug for GrowBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrowBuffer({}:{}/{})", self.start, self.end, self.data.len())
    }
}
