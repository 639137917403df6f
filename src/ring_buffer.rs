//! Bounded circular buffer with fixed capacity and fixed element type.
//!
//! Storage is an inline `[T; N]` array owned by the buffer, so placing a
//! `RingBuffer` in a `static` (or inside another struct) reserves exactly
//! `N * size_of::<T>()` bytes and nothing is ever allocated.
//!
//! ```text
//!        tail (oldest)          head (next write)
//!          │                      │
//!   ┌────┬─▼──┬────┬────┬────┬────▼┐
//!   │    │ A  │ B  │ C  │ D  │      │   count = 4, N = 6
//!   └────┴────┴────┴────┴────┴──────┘
//! ```
//!
//! The buffer is **not** synchronised.  When it is shared with an interrupt
//! handler the owner must wrap it in a critical section, see
//! [`AdvertisementQueue`](crate::comms::advertising::AdvertisementQueue).

use crate::error::{Error, Result};

/// Fixed-capacity FIFO.  `push` never overwrites.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    /// Index of the next write.
    head: usize,
    /// Index of the oldest element.
    tail: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Create an empty buffer with every slot initialised to `fill`.
    /// `const` so the buffer can back a `static`.
    pub const fn new_with(fill: T) -> Self {
        const { assert!(N > 0, "ring buffer capacity must be non-zero") };
        Self {
            data: [fill; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn len(&self) -> usize {
        self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn is_full(&self) -> bool {
        self.count >= N
    }

    /// Append `value` at the tail of the queue.
    ///
    /// Fails with [`Error::NoMemory`] when full; the buffer is left untouched.
    pub fn push(&mut self, value: T) -> Result<()> {
        self.check_indices();
        if self.is_full() {
            return Err(Error::NoMemory);
        }
        self.data[self.head] = value;
        self.head = (self.head + 1) % N;
        self.count += 1;
        Ok(())
    }

    /// Remove and return the oldest element.
    ///
    /// Fails with [`Error::NotFound`] when empty.
    pub fn pop_front(&mut self) -> Result<T> {
        self.check_indices();
        if self.is_empty() {
            return Err(Error::NotFound);
        }
        let value = self.data[self.tail];
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        Ok(value)
    }

    /// Borrow the element `index` positions after the oldest (0 = oldest).
    pub fn peek_at(&self, index: usize) -> Option<&T> {
        if index >= self.count {
            return None;
        }
        Some(&self.data[(self.tail + index) % N])
    }

    /// Most recently pushed element.
    pub fn newest(&self) -> Option<&T> {
        self.count.checked_sub(1).and_then(|i| self.peek_at(i))
    }

    /// Drop every element.  Slot contents are left in place and will be
    /// overwritten by later pushes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).map(move |i| &self.data[(self.tail + i) % N])
    }

    /// Indices can only leave their range through memory corruption; there
    /// is no sane way to continue from that.
    fn check_indices(&self) {
        assert!(
            self.head < N && self.tail < N && self.count <= N,
            "ring buffer indices corrupted (head={}, tail={}, count={}, cap={})",
            self.head,
            self.tail,
            self.count,
            N
        );
    }
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self::new_with(T::default())
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
