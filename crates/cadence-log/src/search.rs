//! Sorted index search
//!
//! Both searches return the lower bound of `key`: the first position whose
//! identifier is not less than `key`. The linear variant exists to
//! cross-check the binary one.

use cadence_core::EventId;

use crate::GapBuffer;

/// Random access over a sorted sequence of identifiers
pub trait SortedIndex {
    fn len(&self) -> usize;

    fn key_at(&self, index: usize) -> EventId;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SortedIndex for [EventId] {
    #[inline]
    fn len(&self) -> usize {
        <[EventId]>::len(self)
    }

    #[inline]
    fn key_at(&self, index: usize) -> EventId {
        self[index]
    }
}

impl SortedIndex for Vec<EventId> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn key_at(&self, index: usize) -> EventId {
        self[index]
    }
}

impl SortedIndex for GapBuffer<EventId> {
    #[inline]
    fn len(&self) -> usize {
        GapBuffer::len(self)
    }

    #[inline]
    fn key_at(&self, index: usize) -> EventId {
        self.get(index).copied().unwrap_or(EventId::UNSPECIFIED)
    }
}

/// Lower bound of `key` in O(log n)
pub fn binary_search<I: SortedIndex + ?Sized>(index: &I, key: EventId) -> usize {
    let mut lo = 0;
    let mut hi = index.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if index.key_at(mid) < key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Lower bound of `key` in O(n)
pub fn linear_search<I: SortedIndex + ?Sized>(index: &I, key: EventId) -> usize {
    (0..index.len())
        .find(|&i| index.key_at(i) >= key)
        .unwrap_or(index.len())
}

/// `Ok(position)` if `key` is stored, `Err(insertion point)` otherwise
pub fn find<I: SortedIndex + ?Sized>(index: &I, key: EventId) -> Result<usize, usize> {
    let pos = binary_search(index, key);
    if pos < index.len() && index.key_at(pos) == key {
        Ok(pos)
    } else {
        Err(pos)
    }
}
