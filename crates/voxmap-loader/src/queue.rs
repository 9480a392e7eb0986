//! Pending load queue ordered by ascending priority value.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use voxmap_tile::TileAddress;

/// An entry in the heap. Entries whose generation no longer matches the
/// address's live generation are stale and skipped on pop.
#[derive(Clone, Debug)]
struct QueueEntry {
    address: TileAddress,
    priority: f64,
    /// Arrival order, kept across reprioritization.
    sequence: u64,
    generation: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap is a max-heap: the smallest priority, then the earliest
    // arrival, must compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Clone, Copy, Debug)]
struct Live {
    priority: f64,
    sequence: u64,
    generation: u64,
}

/// Priority queue of tile loads waiting for an in-flight slot.
///
/// Lower priority values (closer tiles) pop first; equal priorities pop in
/// arrival order. Supports priority updates and removal.
#[derive(Default)]
pub struct LoadQueue {
    heap: BinaryHeap<QueueEntry>,
    live: FxHashMap<TileAddress, Live>,
    next_sequence: u64,
    next_generation: u64,
}

impl LoadQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `address`, or update its priority if it is already queued.
    pub fn push(&mut self, address: TileAddress, priority: f64) {
        if !self.reprioritize(&address, priority) {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.insert(address, priority, sequence);
        }
    }

    /// Change the priority of a queued address. Returns `false` if it is not
    /// queued.
    pub fn reprioritize(&mut self, address: &TileAddress, priority: f64) -> bool {
        let Some(live) = self.live.get(address).copied() else {
            return false;
        };
        if live.priority.total_cmp(&priority) != Ordering::Equal {
            self.insert(address.clone(), priority, live.sequence);
        }
        true
    }

    /// Remove and return the most urgent address with its priority.
    pub fn pop(&mut self) -> Option<(TileAddress, f64)> {
        while let Some(entry) = self.heap.pop() {
            if let Some(live) = self.live.get(&entry.address)
                && live.generation == entry.generation
            {
                self.live.remove(&entry.address);
                return Some((entry.address, entry.priority));
            }
        }
        None
    }

    /// Drop `address` from the queue. Returns `false` if it was not queued.
    pub fn remove(&mut self, address: &TileAddress) -> bool {
        let removed = self.live.remove(address).is_some();
        self.compact();
        removed
    }

    #[must_use]
    pub fn contains(&self, address: &TileAddress) -> bool {
        self.live.contains_key(address)
    }

    #[must_use]
    pub fn priority(&self, address: &TileAddress) -> Option<f64> {
        self.live.get(address).map(|l| l.priority)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn insert(&mut self, address: TileAddress, priority: f64, sequence: u64) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(
            address.clone(),
            Live {
                priority,
                sequence,
                generation,
            },
        );
        self.heap.push(QueueEntry {
            address,
            priority,
            sequence,
            generation,
        });
        self.compact();
    }

    /// Rebuild the heap once stale entries dominate it.
    fn compact(&mut self) {
        if self.heap.len() <= 2 * self.live.len() + 64 {
            return;
        }
        let live = &self.live;
        self.heap.retain(|e| live.get(&e.address).is_some_and(|l| l.generation == e.generation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(x: i32) -> TileAddress {
        TileAddress::new("overworld", 0, x, 0)
    }

    fn drain(queue: &mut LoadQueue) -> Vec<i32> {
        std::iter::from_fn(|| queue.pop()).map(|(a, _)| a.x).collect()
    }

    #[test]
    fn test_pops_lowest_priority_first() {
        let mut queue = LoadQueue::new();
        queue.push(addr(1), 30.0);
        queue.push(addr(2), 10.0);
        queue.push(addr(3), 20.0);
        assert_eq!(drain(&mut queue), vec![2, 3, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_priorities_are_fifo() {
        let mut queue = LoadQueue::new();
        for x in [5, 3, 9, 1] {
            queue.push(addr(x), 7.0);
        }
        assert_eq!(drain(&mut queue), vec![5, 3, 9, 1]);
    }

    #[test]
    fn test_reprioritize_moves_entry() {
        let mut queue = LoadQueue::new();
        queue.push(addr(1), 10.0);
        queue.push(addr(2), 20.0);
        assert!(queue.reprioritize(&addr(2), 5.0));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.priority(&addr(2)), Some(5.0));
        assert_eq!(drain(&mut queue), vec![2, 1]);
        assert!(!queue.reprioritize(&addr(2), 1.0));
    }

    #[test]
    fn test_reprioritized_entry_keeps_arrival_order() {
        let mut queue = LoadQueue::new();
        queue.push(addr(1), 50.0);
        queue.push(addr(2), 10.0);
        queue.reprioritize(&addr(1), 10.0);
        assert_eq!(drain(&mut queue), vec![1, 2]);
    }

    #[test]
    fn test_push_existing_updates_instead_of_duplicating() {
        let mut queue = LoadQueue::new();
        queue.push(addr(1), 10.0);
        queue.push(addr(1), 3.0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some((addr(1), 3.0)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_remove() {
        let mut queue = LoadQueue::new();
        queue.push(addr(1), 1.0);
        queue.push(addr(2), 2.0);
        assert!(queue.remove(&addr(1)));
        assert!(!queue.remove(&addr(1)));
        assert!(!queue.contains(&addr(1)));
        assert_eq!(drain(&mut queue), vec![2]);
    }

    #[test]
    fn test_stale_entries_compacted() {
        let mut queue = LoadQueue::new();
        queue.push(addr(0), 0.0);
        for i in 0..1000 {
            queue.reprioritize(&addr(0), i as f64 + 1.0);
        }
        assert!(queue.heap.len() <= 2 * queue.len() + 65);
        assert_eq!(queue.pop(), Some((addr(0), 1000.0)));
    }
}
