//! Ring Buffer Module
//!
//! Fixed-capacity circular storage for cache entries.

// == Ring Buffer ==
/// Bounded circular buffer of optional slots.
///
/// Writes go to the slot under the circular index, which then advances and
/// wraps to 0 at capacity, overwriting the oldest entry. Slots are visited in
/// index order (slot 0 upward) when scanning.
#[derive(Debug)]
pub struct RingBuffer<T> {
    /// Backing slots, `None` = never written
    slots: Vec<Option<T>>,
    /// Next slot to write
    next: usize,
    /// Number of slots ever written (highest index + 1)
    max_index_used: usize,
    /// Times the write index wrapped to 0
    wraps: u64,
}

impl<T> RingBuffer<T> {
    // == Constructor ==
    /// Allocates `capacity` empty slots. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            next: 0,
            max_index_used: 0,
            wraps: 0,
        }
    }

    // == Push ==
    /// Writes `item` into the next slot.
    ///
    /// Returns the slot index written and the entry it replaced, if any.
    pub fn push(&mut self, item: T) -> (usize, Option<T>) {
        let index = self.next;
        let replaced = self.slots[index].replace(item);
        self.max_index_used = self.max_index_used.max(index + 1);
        self.next += 1;
        if self.next >= self.slots.len() {
            self.next = 0;
            self.wraps += 1;
        }
        (index, replaced)
    }

    // == Iterate ==
    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots[..self.max_index_used]
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
    }

    /// Entry stored at `index`, if occupied.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    // == Clear ==
    /// Empties every slot and resets the index.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.next = 0;
        self.max_index_used = 0;
        self.wraps = 0;
    }

    // == Accessors ==
    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots[..self.max_index_used]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.max_index_used == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn max_index_used(&self) -> usize {
        self.max_index_used
    }

    pub fn wraps(&self) -> u64 {
        self.wraps
    }
}
