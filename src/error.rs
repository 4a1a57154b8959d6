//! Scheduler errors
//!
//! `AlreadyPending` is deliberately absent: a duplicate post is an `Ok`
//! outcome ([`PostResult`](crate::task::PostResult)), not a failure.
//!
//! Author: Moroya Sakamoto

use crate::task::{ClassId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    /// Id outside the namespace of its class
    #[error("task {id} outside {class} class (capacity {capacity})")]
    UnknownTask {
        class: ClassId,
        id: TaskId,
        capacity: usize,
    },
    /// Class queue overflowed; only possible if the pending registry and
    /// the queue disagree
    #[error("{class} queue full")]
    QueueFull { class: ClassId },
    /// Task table built for another namespace
    #[error("{class} task table bound to {found}, class is {expected}")]
    NamespaceMismatch {
        class: ClassId,
        expected: &'static str,
        found: &'static str,
    },
    /// Task table size differs from class capacity
    #[error("{class} task table has {table} slots, class capacity is {capacity}")]
    CapacityMismatch {
        class: ClassId,
        table: usize,
        capacity: usize,
    },
}

pub type Result<T> = core::result::Result<T, SchedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SchedError::UnknownTask {
            class: ClassId::Basic,
            id: TaskId::new(9),
            capacity: 4,
        };
        assert_eq!(err.to_string(), "task #9 outside basic class (capacity 4)");
    }
}
