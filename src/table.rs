//! Task tables — build-time id → body assignment
//!
//! A table is built with a `const fn` chain, so a duplicate or
//! out-of-range id stops the build when the table is a `const` or `static`:
//!
//! ```ignore
//! const BLINK: TaskId = TaskId::new(0);
//! const SAMPLE: TaskId = TaskId::new(1);
//!
//! static BASIC_TASKS: TaskTable<Fifo<2>, 2> = TaskTable::new(class::BASIC)
//!     .with(BLINK, b"blink", blink)
//!     .with(SAMPLE, b"sample", sample);
//! ```
//!
//! Author: Moroya Sakamoto

use crate::class::Namespace;
use crate::policy::Policy;
use crate::scheduler::Scheduler;
use crate::task::{Dispatch, TaskId, MAX_TASK_IDS};

/// Task body (`runTask`)
///
/// Receives the scheduler so it can post itself or other tasks.
pub type TaskFn<P> = fn(&Scheduler<P>, Dispatch);

/// One registered task
pub struct TaskEntry<P: Policy> {
    /// Task name (8 ASCII chars max)
    pub name: [u8; 8],
    pub body: TaskFn<P>,
}

impl<P: Policy> Clone for TaskEntry<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Policy> Copy for TaskEntry<P> {}

impl<P: Policy> TaskEntry<P> {
    /// Name without trailing padding
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|b| *b == 0).unwrap_or(8);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}

/// Bodies of one class namespace, indexed by id
pub struct TaskTable<P: Policy, const N: usize> {
    namespace: Namespace,
    slots: [Option<TaskEntry<P>>; N],
}

impl<P: Policy, const N: usize> TaskTable<P, N> {
    /// Empty table for a namespace
    pub const fn new(namespace: Namespace) -> Self {
        assert!(N <= MAX_TASK_IDS, "task table exceeds 255 task ids");
        Self {
            namespace,
            slots: [None; N],
        }
    }

    /// Register `body` under `id`
    ///
    /// Panics (a build error in const context) on a reused or
    /// out-of-range id.
    pub const fn with(mut self, id: TaskId, name: &[u8], body: TaskFn<P>) -> Self {
        let idx = id.index();
        assert!(idx < N, "task id outside table capacity");
        assert!(self.slots[idx].is_none(), "task id assigned twice");

        let mut n = [0u8; 8];
        let mut i = 0;
        while i < name.len() && i < 8 {
            n[i] = name[i];
            i += 1;
        }
        self.slots[idx] = Some(TaskEntry { name: n, body });
        self
    }

    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Registered entry for `id`
    pub fn get(&self, id: TaskId) -> Option<&TaskEntry<P>> {
        self.slots.get(id.index())?.as_ref()
    }

    /// Number of registered ids
    pub fn registered(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Borrowed view for the run loop
    pub fn view(&self) -> Tasks<'_, P> {
        Tasks {
            namespace: self.namespace,
            slots: &self.slots,
        }
    }
}

/// Capacity-erased view of a [`TaskTable`]
pub struct Tasks<'a, P: Policy> {
    pub(crate) namespace: Namespace,
    pub(crate) slots: &'a [Option<TaskEntry<P>>],
}

impl<'a, P: Policy> Clone for Tasks<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P: Policy> Copy for Tasks<'a, P> {}

impl<'a, P: Policy> Tasks<'a, P> {
    /// View with no tasks (for a class the application does not use)
    pub const fn empty(namespace: Namespace) -> Self {
        Self {
            namespace,
            slots: &[],
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&'a TaskEntry<P>> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
