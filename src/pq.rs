//! Timer priority queue
//!
//! A binary min-heap keyed by `(deadline, tie, id)` with a side table of live
//! entries. Removal is lazy: the side table is authoritative and heap keys
//! whose id is no longer live are discarded when they reach the top.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Clone, Debug)]
struct Key {
    deadline: f64,
    tie: u64,
    id: u64,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that std's max-heap pops the earliest deadline first.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .total_cmp(&other.deadline)
            .then(self.tie.cmp(&other.tie))
            .then(self.id.cmp(&other.id))
            .reverse()
    }
}

struct Entry<M> {
    deadline: f64,
    tie: u64,
    meta: M,
}

/// Min-priority queue of timer entries.
pub struct MinPq<M> {
    heap: BinaryHeap<Key>,
    live: HashMap<u64, Entry<M>>,
}

impl<M> Default for MinPq<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MinPq<M> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
        }
    }

    /// Insert an entry. Returns false (and leaves the queue untouched) if
    /// `id` is already live.
    pub fn push(&mut self, id: u64, deadline: f64, tie: u64, meta: M) -> bool {
        if self.live.contains_key(&id) {
            return false;
        }
        self.live.insert(id, Entry { deadline, tie, meta });
        self.heap.push(Key { deadline, tie, id });
        true
    }

    /// Remove an entry by id, returning its metadata.
    pub fn remove(&mut self, id: u64) -> Option<M> {
        self.live.remove(&id).map(|e| e.meta)
    }

    /// Earliest live deadline.
    pub fn peek_deadline(&mut self) -> Option<f64> {
        self.discard_stale();
        self.heap.peek().map(|k| k.deadline)
    }

    /// Pop the earliest live entry as `(id, deadline, meta)`.
    pub fn pop(&mut self) -> Option<(u64, f64, M)> {
        self.discard_stale();
        let key = self.heap.pop()?;
        let entry = self.live.remove(&key.id)?;
        Some((key.id, entry.deadline, entry.meta))
    }

    /// Pop every entry whose deadline is bit-identical to `deadline`, in tie
    /// order.
    pub fn pop_all_at(&mut self, deadline: f64) -> Vec<(u64, M)> {
        let mut batch = Vec::new();
        while let Some(dl) = self.peek_deadline() {
            if dl.to_bits() != deadline.to_bits() {
                break;
            }
            if let Some((id, _, meta)) = self.pop() {
                batch.push((id, meta));
            }
        }
        batch
    }

    fn discard_stale(&mut self) {
        while let Some(k) = self.heap.peek() {
            match self.live.get(&k.id) {
                Some(e) if e.deadline.to_bits() == k.deadline.to_bits() && e.tie == k.tie => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }
}
