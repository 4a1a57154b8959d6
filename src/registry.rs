//! Pending-state registry — one state byte per task id
//!
//! Tracks whether each task is idle, queued or running. Not synchronized
//! by itself: every call happens inside the scheduler's critical section,
//! paired with the matching queue push or pop.
//!
//! Author: Moroya Sakamoto

use crate::task::{TaskId, TaskState};

/// Per-class state table
///
/// Size: N bytes
pub struct PendingRegistry<const N: usize> {
    states: [TaskState; N],
}

impl<const N: usize> PendingRegistry<N> {
    /// All ids idle
    pub const fn new() -> Self {
        Self {
            states: [TaskState::Idle; N],
        }
    }

    /// Number of ids this registry covers
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Does `id` belong to this registry?
    pub const fn contains(&self, id: TaskId) -> bool {
        id.index() < N
    }

    /// Test-and-set the pending flag
    ///
    /// Returns false if `id` is already pending (post rejected). A running
    /// task may be marked again: that is the self-repost path.
    pub fn try_mark_pending(&mut self, id: TaskId) -> bool {
        match self.states.get_mut(id.index()) {
            Some(state @ (TaskState::Idle | TaskState::Running)) => {
                *state = TaskState::Pending;
                true
            }
            _ => false,
        }
    }

    /// Clear the pending flag of a task that was just dequeued
    pub fn clear_pending(&mut self, id: TaskId) {
        if let Some(state) = self.states.get_mut(id.index()) {
            debug_assert_eq!(*state, TaskState::Pending);
            *state = TaskState::Running;
        }
    }

    /// Undo a mark whose enqueue failed
    pub fn unmark(&mut self, id: TaskId) {
        if let Some(state) = self.states.get_mut(id.index()) {
            *state = TaskState::Idle;
        }
    }

    /// Body returned; Running → Idle unless it re-posted itself
    pub fn finish(&mut self, id: TaskId) {
        if let Some(state) = self.states.get_mut(id.index()) {
            if *state == TaskState::Running {
                *state = TaskState::Idle;
            }
        }
    }

    /// Current state (None if out of range)
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.states.get(id.index()).copied()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.state(id) == Some(TaskState::Pending)
    }

    /// Number of pending ids
    pub fn pending_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == TaskState::Pending)
            .count()
    }

    /// Clear every flag
    pub fn reset(&mut self) {
        self.states = [TaskState::Idle; N];
    }
}

impl<const N: usize> Default for PendingRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
