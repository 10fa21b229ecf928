//! Gap buffer
//!
//! A growable array with a movable empty region (the gap). Inserting at the
//! gap is O(1); inserting elsewhere first moves the gap, which costs the
//! distance travelled. Runs of inserts near one position, like local appends
//! or an ordered catch-up from a peer, stay amortized O(1).

use std::fmt;

/// Smallest gap opened when the buffer grows
const MIN_GAP: usize = 8;

/// Growable array with a movable gap
#[derive(Clone)]
pub struct GapBuffer<T> {
    /// Physical storage; slots inside the gap are `None`
    slots: Vec<Option<T>>,
    /// First slot of the gap
    gap_start: usize,
    /// One past the last slot of the gap
    gap_end: usize,
}

impl<T> GapBuffer<T> {
    pub fn new() -> Self {
        GapBuffer {
            slots: Vec::new(),
            gap_start: 0,
            gap_end: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        GapBuffer {
            slots,
            gap_start: 0,
            gap_end: capacity,
        }
    }

    /// Number of stored elements
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.gap_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots, stored or free
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Logical position of the gap
    #[inline]
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    #[inline]
    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        if index < self.gap_start {
            index
        } else {
            index + self.gap_len()
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }
        let physical = self.physical(index);
        self.slots[physical].as_mut()
    }

    /// Insert `value` at logical position `index`
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        assert!(
            index <= self.len(),
            "insertion index {} out of bounds (len {})",
            index,
            self.len()
        );
        if self.gap_len() == 0 {
            self.grow();
        }
        self.move_gap(index);
        self.slots[self.gap_start] = Some(value);
        self.gap_start += 1;
    }

    pub fn push(&mut self, value: T) {
        self.insert(self.len(), value);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.gap_start = 0;
        self.gap_end = 0;
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.slots[..self.gap_start]
            .iter()
            .chain(self.slots[self.gap_end..].iter())
            .filter_map(Option::as_ref)
    }

    /// Move the gap so it starts at logical position `index`
    fn move_gap(&mut self, index: usize) {
        let gap = self.gap_len();
        if index < self.gap_start {
            // Shift [index, gap_start) right, behind the gap
            for i in (index..self.gap_start).rev() {
                self.slots[i + gap] = self.slots[i].take();
            }
        } else if index > self.gap_start {
            // Shift [gap_end, gap_end + delta) left, in front of the gap
            let delta = index - self.gap_start;
            for i in 0..delta {
                self.slots[self.gap_start + i] = self.slots[self.gap_end + i].take();
            }
        }
        self.gap_start = index;
        self.gap_end = index + gap;
    }

    /// Double the storage; the new free slots become the gap
    fn grow(&mut self) {
        let extra = self.slots.len().max(MIN_GAP);
        let tail = self.slots.split_off(self.gap_end);
        self.slots.resize_with(self.gap_start + extra, || None);
        self.slots.extend(tail);
        self.gap_end = self.gap_start + extra;
    }
}

impl<T> Default for GapBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for GapBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for GapBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut buffer = GapBuffer::new();
        for value in iter {
            buffer.push(value);
        }
        buffer
    }
}

impl<T: PartialEq> PartialEq for GapBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(buffer: &GapBuffer<u32>) -> Vec<u32> {
        buffer.iter().copied().collect()
    }

    #[test]
    fn test_push_keeps_gap_at_end() {
        let mut buffer = GapBuffer::new();
        for i in 0..100 {
            buffer.push(i);
            assert_eq!(buffer.gap_position(), buffer.len());
        }
        assert_eq!(contents(&buffer), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_insert_front_and_middle() {
        let mut buffer: GapBuffer<u32> = (0..5).collect();
        buffer.insert(0, 10);
        buffer.insert(3, 20);
        buffer.insert(buffer.len(), 30);
        assert_eq!(contents(&buffer), vec![10, 0, 1, 20, 2, 3, 4, 30]);
        assert_eq!(buffer.get(3), Some(&20));
        assert_eq!(buffer.get(8), None);
    }

    #[test]
    fn test_gap_moves_back_and_forth() {
        let mut buffer: GapBuffer<u32> = GapBuffer::with_capacity(4);
        let mut reference = Vec::new();
        let positions = [0usize, 1, 0, 3, 2, 5, 1, 7, 4, 0];
        for (value, &pos) in positions.iter().enumerate() {
            let pos = pos.min(reference.len());
            buffer.insert(pos, value as u32);
            reference.insert(pos, value as u32);
            assert_eq!(contents(&buffer), reference);
        }
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut buffer: GapBuffer<u32> = (0..20).collect();
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(7);
        assert_eq!(contents(&buffer), vec![7]);
    }

    #[test]
    fn test_get_mut() {
        let mut buffer: GapBuffer<u32> = (0..3).collect();
        buffer.insert(1, 9);
        if let Some(value) = buffer.get_mut(2) {
            *value = 42;
        }
        assert_eq!(contents(&buffer), vec![0, 9, 42, 2]);
    }

    #[test]
    #[should_panic]
    fn test_insert_out_of_bounds() {
        let mut buffer: GapBuffer<u32> = GapBuffer::new();
        buffer.insert(1, 0);
    }
}
