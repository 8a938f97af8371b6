//! Binary heap ordered by an injected comparator

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

/// A total order over `T`; `Less` means "comes out first"
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

struct Ranked<T> {
    item: T,
    seq: u64,
    compare: Comparator<T>,
}

// BinaryHeap is a max-heap, so both comparisons are reversed to pop the
// smallest item first. Equal items come out in insertion order.
impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&other.item, &self.item).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Ranked<T> {}

/// Min-heap over `T` under a caller-supplied order
pub struct PriorityHeap<T> {
    heap: BinaryHeap<Ranked<T>>,
    compare: Comparator<T>,
    next_seq: u64,
}

impl<T> PriorityHeap<T> {
    pub fn new(compare: Comparator<T>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            compare,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Ranked {
            item,
            seq,
            compare: Arc::clone(&self.compare),
        });
    }

    /// Removes and returns the smallest item
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|ranked| ranked.item)
    }

    /// Returns the smallest item without removing it
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|ranked| &ranked.item)
    }

    /// Iterates over all items in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|ranked| &ranked.item)
    }

    /// Removes every item, smallest first
    pub fn drain_sorted(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.heap.len());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }

    /// Compares two items under the heap's order
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityHeap")
            .field("len", &self.heap.len())
            .finish()
    }
}
