//! Memory limited chunk buffer.

use deepsize::DeepSizeOf;
use rayon;

/// Buffer limited by the approximate memory consumed by its items.
///
/// The footprint of an item is its [`DeepSizeOf`] estimate: the inline size of the value plus the
/// heap memory it owns. The buffer is full once the total reaches the limit, so the item crossing
/// the limit is still accepted.
pub struct ChunkBuffer<T> {
    limit: u64,
    current_size: u64,
    inner: Vec<T>,
}

impl<T: DeepSizeOf> ChunkBuffer<T> {
    pub fn new(limit: u64) -> Self {
        ChunkBuffer {
            limit,
            current_size: 0,
            inner: Vec::new(),
        }
    }

    /// Adds a new element to the buffer.
    pub fn push(&mut self, item: T) {
        self.current_size += item.deep_size_of() as u64;
        self.inner.push(item);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.current_size >= self.limit
    }

    /// Approximate memory consumed by buffered items.
    pub fn mem_size(&self) -> u64 {
        self.current_size
    }
}

impl<T> IntoIterator for ChunkBuffer<T> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<T: Send> rayon::slice::ParallelSliceMut<T> for ChunkBuffer<T> {
    fn as_parallel_slice_mut(&mut self) -> &mut [T] {
        self.inner.as_mut_slice()
    }
}
