//! Bounded class queues — FIFO and deadline-ordered
//!
//! Fixed-size, no-alloc. Not interrupt-safe on their own: the scheduler
//! only touches them inside its critical section, next to the pending
//! registry update.
//!
//! Author: Moroya Sakamoto

use heapless::{Deque, Vec};

use crate::task::{Deadline, TaskId};

/// FIFO ring of task ids
pub struct FifoQueue<const N: usize> {
    ring: Deque<TaskId, N>,
}

impl<const N: usize> FifoQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self { ring: Deque::new() }
    }

    /// Append at the tail
    ///
    /// Returns the id back if the queue is full.
    pub fn push(&mut self, id: TaskId) -> Result<(), TaskId> {
        self.ring.push_back(id)
    }

    /// Take from the head
    pub fn pop(&mut self) -> Option<TaskId> {
        self.ring.pop_front()
    }

    pub fn peek(&self) -> Option<TaskId> {
        self.ring.front().copied()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Occurrences of `id` (0 or 1 in a well-formed scheduler)
    pub fn count(&self, id: TaskId) -> usize {
        self.ring.iter().filter(|q| **q == id).count()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const N: usize> Default for FifoQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue entry with its stored deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    deadline: Deadline,
    id: TaskId,
}

/// Earliest-deadline-first queue
///
/// Kept sorted latest-first so the earliest deadline pops from the back
/// in O(1). Equal deadlines leave in post order.
pub struct DeadlineQueue<const N: usize> {
    entries: Vec<Entry, N>,
}

impl<const N: usize> DeadlineQueue<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert in deadline order
    ///
    /// Returns the id back if the queue is full.
    pub fn push(&mut self, id: TaskId, deadline: Deadline) -> Result<(), TaskId> {
        // Ahead of every entry due no later, so older equal deadlines
        // stay closer to the back.
        let pos = self
            .entries
            .iter()
            .position(|e| !deadline.is_before(e.deadline))
            .unwrap_or(self.entries.len());
        self.entries
            .insert(pos, Entry { deadline, id })
            .map_err(|e| e.id)
    }

    /// Take the earliest deadline
    pub fn pop(&mut self) -> Option<(TaskId, Deadline)> {
        self.entries.pop().map(|e| (e.id, e.deadline))
    }

    pub fn peek(&self) -> Option<(TaskId, Deadline)> {
        self.entries.last().map(|e| (e.id, e.deadline))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn count(&self, id: TaskId) -> usize {
        self.entries.iter().filter(|e| e.id == id).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<const N: usize> Default for DeadlineQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
