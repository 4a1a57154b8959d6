//! Task identity and lifecycle — static, no-alloc descriptors
//!
//! A task is a deferred run-to-completion body identified by a small
//! integer. Ids are assigned before the scheduler starts and never change.
//!
//! Author: Moroya Sakamoto

use core::fmt;

/// Maximum task identities per scheduling class
///
/// `u8` ids, with 255 kept free as the "no task" marker.
pub const MAX_TASK_IDS: usize = 255;

/// Task identifier, unique inside one class namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u8);

impl TaskId {
    /// Reserved marker, never a valid task
    pub const NONE: TaskId = TaskId(u8::MAX);

    /// Create an id (build-time assignment)
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw id value
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Slot index in per-class tables
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task execution state
///
/// ```text
/// Idle ──post──► Pending ──dispatch──► Running ──return──► Idle
///                   ▲                     │
///                   └──── self-repost ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Not queued, not running
    #[default]
    Idle,
    /// Posted, waiting in its class queue
    Pending,
    /// Body is executing (pending flag already cleared)
    Running,
}

/// Scheduling class a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassId {
    /// Mandatory FIFO class, protected from starvation
    Basic,
    /// Optional class selected by the policy (priority FIFO, EDF)
    Extended,
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassId::Basic => write!(f, "basic"),
            ClassId::Extended => write!(f, "extended"),
        }
    }
}

/// Outcome of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum PostResult {
    /// Task queued; it will run exactly once for this post
    Accepted,
    /// Task already queued; the earlier post still runs it
    AlreadyPending,
}

impl PostResult {
    pub fn is_accepted(self) -> bool {
        self == PostResult::Accepted
    }
}

/// Absolute scheduling deadline in ticks
///
/// Only an ordering hint. Comparison is wrap-aware, so deadlines stay
/// correctly ordered across `u32` overflow as long as all live deadlines
/// lie within 2^31 ticks of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deadline(pub u32);

impl Deadline {
    /// Deadline at an absolute tick
    pub const fn at(tick: u32) -> Self {
        Self(tick)
    }

    /// Deadline `delta` ticks after `now`
    pub const fn after(now: u32, delta: u32) -> Self {
        Self(now.wrapping_add(delta))
    }

    /// Strictly earlier than `other`
    pub const fn is_before(self, other: Deadline) -> bool {
        (self.0.wrapping_sub(other.0) as i32) < 0
    }

    /// Ticks left at `now` (0 once passed)
    pub const fn remaining(self, now: u32) -> u32 {
        let diff = self.0.wrapping_sub(now) as i32;
        if diff <= 0 {
            0
        } else {
            diff as u32
        }
    }
}

/// Record handed to a task body on dispatch (`runTask`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Class the task was queued in
    pub class: ClassId,
    /// Task id within that class
    pub id: TaskId,
    /// Stored deadline for deadline-ordered classes
    pub deadline: Option<Deadline>,
}

impl Dispatch {
    pub const fn basic(id: TaskId) -> Self {
        Self {
            class: ClassId::Basic,
            id,
            deadline: None,
        }
    }
}
