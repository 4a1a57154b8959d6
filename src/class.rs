//! Scheduling classes — independent id namespace, queue and ordering
//!
//! A class pairs a pending registry with one queue. `post` is the
//! mark-and-enqueue pair, `pop` the dequeue-and-clear pair; the scheduler
//! calls both inside a single critical section.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use crate::queue::{DeadlineQueue, FifoQueue};
use crate::registry::PendingRegistry;
use crate::task::{ClassId, Deadline, PostResult, TaskId, TaskState, MAX_TASK_IDS};

/// Identity of a class instance: interface name plus optional label
///
/// Two instances of the same class type ("standard" and "high-priority"
/// basic tasks) differ by label and never share ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub interface: &'static str,
    pub label: Option<&'static str>,
}

impl Namespace {
    pub const fn new(interface: &'static str) -> Self {
        Self {
            interface,
            label: None,
        }
    }

    pub const fn labeled(interface: &'static str, label: &'static str) -> Self {
        Self {
            interface,
            label: Some(label),
        }
    }

    /// Label if present, interface name otherwise
    pub const fn name(&self) -> &'static str {
        match self.label {
            Some(label) => label,
            None => self.interface,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{}[{}]", self.interface, label),
            None => write!(f, "{}", self.interface),
        }
    }
}

/// Default namespace of the mandatory basic class
pub const BASIC: Namespace = Namespace::new("TaskBasic");
/// Default namespace of the high-priority FIFO class
pub const HIGH_PRIORITY: Namespace = Namespace::labeled("TaskBasic", "high-priority");
/// Default namespace of the EDF class
pub const EDF: Namespace = Namespace::new("TaskDeadline");

/// Dequeued task with its class parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queued {
    pub id: TaskId,
    pub deadline: Option<Deadline>,
}

/// Outcome of a class-level post, before error mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Posted(PostResult),
    OutOfRange,
    Overflow,
}

/// One scheduling class
pub trait SchedClass {
    /// Per-post parameter (`()` for FIFO, `Deadline` for EDF)
    type Params: Copy;

    fn namespace(&self) -> Namespace;
    fn capacity(&self) -> usize;

    /// Mark pending and enqueue; a rejected mark leaves the queue untouched
    fn post(&mut self, id: TaskId, params: Self::Params) -> Enqueue;
    /// Dequeue the next task and clear its pending flag
    fn pop(&mut self) -> Option<Queued>;
    /// Body of `id` returned
    fn finish(&mut self, id: TaskId);

    fn state(&self, id: TaskId) -> Option<TaskState>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn reset(&mut self);
}

const fn check_capacity(n: usize) {
    assert!(n <= MAX_TASK_IDS, "class capacity exceeds 255 task ids");
}

/// FIFO class (basic and high-priority tasks)
pub struct FifoClass<const N: usize> {
    namespace: Namespace,
    registry: PendingRegistry<N>,
    queue: FifoQueue<N>,
}

impl<const N: usize> FifoClass<N> {
    pub const fn new(namespace: Namespace) -> Self {
        check_capacity(N);
        Self {
            namespace,
            registry: PendingRegistry::new(),
            queue: FifoQueue::new(),
        }
    }

    /// Next id to leave, without dequeuing
    pub fn peek(&self) -> Option<TaskId> {
        self.queue.peek()
    }

    /// Registry and queue agree for `id`
    pub fn is_consistent(&self, id: TaskId) -> bool {
        self.registry.is_pending(id) == (self.queue.count(id) == 1)
            && self.queue.count(id) <= 1
    }
}

impl<const N: usize> SchedClass for FifoClass<N> {
    type Params = ();

    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn capacity(&self) -> usize {
        N
    }

    fn post(&mut self, id: TaskId, _: ()) -> Enqueue {
        if !self.registry.contains(id) {
            return Enqueue::OutOfRange;
        }
        if !self.registry.try_mark_pending(id) {
            return Enqueue::Posted(PostResult::AlreadyPending);
        }
        match self.queue.push(id) {
            Ok(()) => Enqueue::Posted(PostResult::Accepted),
            Err(_) => {
                self.registry.unmark(id);
                Enqueue::Overflow
            }
        }
    }

    fn pop(&mut self) -> Option<Queued> {
        let id = self.queue.pop()?;
        self.registry.clear_pending(id);
        Some(Queued { id, deadline: None })
    }

    fn finish(&mut self, id: TaskId) {
        self.registry.finish(id);
    }

    fn state(&self, id: TaskId) -> Option<TaskState> {
        self.registry.state(id)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn reset(&mut self) {
        self.registry.reset();
        self.queue.clear();
    }
}

/// Earliest-deadline-first class
///
/// A duplicate post keeps the stored (oldest) deadline.
pub struct DeadlineClass<const N: usize> {
    namespace: Namespace,
    registry: PendingRegistry<N>,
    queue: DeadlineQueue<N>,
}

impl<const N: usize> DeadlineClass<N> {
    pub const fn new(namespace: Namespace) -> Self {
        check_capacity(N);
        Self {
            namespace,
            registry: PendingRegistry::new(),
            queue: DeadlineQueue::new(),
        }
    }

    /// Earliest queued deadline
    pub fn next_deadline(&self) -> Option<Deadline> {
        self.queue.peek().map(|(_, d)| d)
    }

    pub fn is_consistent(&self, id: TaskId) -> bool {
        self.registry.is_pending(id) == (self.queue.count(id) == 1)
            && self.queue.count(id) <= 1
    }
}

impl<const N: usize> SchedClass for DeadlineClass<N> {
    type Params = Deadline;

    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn capacity(&self) -> usize {
        N
    }

    fn post(&mut self, id: TaskId, deadline: Deadline) -> Enqueue {
        if !self.registry.contains(id) {
            return Enqueue::OutOfRange;
        }
        if !self.registry.try_mark_pending(id) {
            return Enqueue::Posted(PostResult::AlreadyPending);
        }
        match self.queue.push(id, deadline) {
            Ok(()) => Enqueue::Posted(PostResult::Accepted),
            Err(_) => {
                self.registry.unmark(id);
                Enqueue::Overflow
            }
        }
    }

    fn pop(&mut self) -> Option<Queued> {
        let (id, deadline) = self.queue.pop()?;
        self.registry.clear_pending(id);
        Some(Queued {
            id,
            deadline: Some(deadline),
        })
    }

    fn finish(&mut self, id: TaskId) {
        self.registry.finish(id);
    }

    fn state(&self, id: TaskId) -> Option<TaskState> {
        self.registry.state(id)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn reset(&mut self) {
        self.registry.reset();
        self.queue.clear();
    }
}

/// Placeholder for policies without an extended class
pub struct NoClass;

impl SchedClass for NoClass {
    type Params = ();

    fn namespace(&self) -> Namespace {
        Namespace::new("none")
    }

    fn capacity(&self) -> usize {
        0
    }

    fn post(&mut self, _: TaskId, _: ()) -> Enqueue {
        Enqueue::OutOfRange
    }

    fn pop(&mut self) -> Option<Queued> {
        None
    }

    fn finish(&mut self, _: TaskId) {}

    fn state(&self, _: TaskId) -> Option<TaskState> {
        None
    }

    fn len(&self) -> usize {
        0
    }

    fn reset(&mut self) {}
}

/// Map a class-level outcome to the public result
pub(crate) fn to_result(
    class: ClassId,
    id: TaskId,
    capacity: usize,
    outcome: Enqueue,
) -> crate::error::Result<PostResult> {
    use crate::error::SchedError;
    match outcome {
        Enqueue::Posted(result) => Ok(result),
        Enqueue::OutOfRange => Err(SchedError::UnknownTask {
            class,
            id,
            capacity,
        }),
        Enqueue::Overflow => Err(SchedError::QueueFull { class }),
    }
}
