//! Ring Buffer Implementation

use crate::RingBufferError;

/// Capacity used when a buffer is requested with a capacity of zero
pub const DEFAULT_CAPACITY: usize = 8;

/// Fixed-capacity FIFO ring buffer
///
/// Positions are tracked with two monotonically increasing sequence
/// counters. The slot of a sequence number is `seq % capacity`, the number
/// of buffered items is `write_seq - read_seq`.
#[derive(Debug)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Box<[Option<T>]>,
    /// Capacity of the buffer
    capacity: usize,
    /// Sequence number of the next write
    write_seq: u64,
    /// Sequence number of the oldest buffered item
    read_seq: u64,
    /// Evict the oldest item when adding to a full buffer
    overwrite: bool,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer that rejects items when full
    pub fn new(capacity: usize) -> Self {
        Self::with_overwrite(capacity, false)
    }

    /// Create a new ring buffer with the given overwrite policy
    pub fn with_overwrite(capacity: usize, overwrite: bool) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        let storage: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
        Self {
            storage: storage.into_boxed_slice(),
            capacity,
            write_seq: 0,
            read_seq: 0,
            overwrite,
        }
    }

    fn slot(&self, seq: u64) -> usize {
        (seq % self.capacity as u64) as usize
    }

    /// Add an item at the write position
    ///
    /// Returns the evicted item if the buffer was full and overwriting is
    /// enabled. Fails without touching the buffer if it is full and
    /// overwriting is disabled.
    pub fn add(&mut self, item: T) -> Result<Option<T>, RingBufferError> {
        let mut evicted = None;
        if self.is_full() {
            if !self.overwrite {
                return Err(RingBufferError::Full {
                    capacity: self.capacity,
                });
            }
            let oldest = self.slot(self.read_seq);
            evicted = self.storage[oldest].take();
            self.read_seq += 1;
        }

        let idx = self.slot(self.write_seq);
        self.storage[idx] = Some(item);
        self.write_seq += 1;
        Ok(evicted)
    }

    /// Remove and return the oldest item
    pub fn remove(&mut self) -> Result<T, RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        let idx = self.slot(self.read_seq);
        let item = self.storage[idx].take().ok_or(RingBufferError::Empty)?;
        self.read_seq += 1;
        Ok(item)
    }

    /// Return the oldest item without removing it
    pub fn peek(&self) -> Result<&T, RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        self.storage[self.slot(self.read_seq)]
            .as_ref()
            .ok_or(RingBufferError::Empty)
    }

    /// Return the newest item without removing it
    pub fn newest(&self) -> Result<&T, RingBufferError> {
        if self.is_empty() {
            return Err(RingBufferError::Empty);
        }
        self.storage[self.slot(self.write_seq - 1)]
            .as_ref()
            .ok_or(RingBufferError::Empty)
    }

    /// Iterate over the buffered items, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (self.read_seq..self.write_seq).filter_map(move |seq| self.storage[self.slot(seq)].as_ref())
    }

    /// Number of buffered items
    pub fn size(&self) -> usize {
        (self.write_seq - self.read_seq) as usize
    }

    /// Alias for [`RingBuffer::size`]
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.write_seq == self.read_seq
    }

    /// Check if buffer holds at least one item
    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity
    }

    /// Check if buffer can take another item without eviction
    pub fn is_not_full(&self) -> bool {
        !self.is_full()
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.size() as f64 / self.capacity as f64
    }

    /// Change the overwrite policy for future additions
    pub fn set_overwrite(&mut self, overwrite: bool) {
        self.overwrite = overwrite;
    }

    /// Current overwrite policy
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Sequence number of the next write
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Sequence number of the oldest buffered item
    pub fn read_seq(&self) -> u64 {
        self.read_seq
    }

    /// Reset both sequence counters to zero
    ///
    /// Storage stays allocated; stale slots are overwritten by later adds.
    pub fn clear(&mut self) {
        self.write_seq = 0;
        self.read_seq = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy the newest `count` items, oldest first
    pub fn latest(&self, count: usize) -> Vec<T> {
        let skip = self.size().saturating_sub(count);
        self.iter().skip(skip).cloned().collect()
    }
}
